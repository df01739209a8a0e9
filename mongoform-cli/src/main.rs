use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::debug;

use mongoform_core::provider::Provider;
use mongoform_core::resource::{Resource, State, Value};
use mongoform_core::schema::ResourceSchema;
use mongoform_provider_mongodb::schemas::{self, DATABASE_USER};
use mongoform_provider_mongodb::{ConnectionConfig, MongodbProvider};

const SENSITIVE: &str = "(sensitive)";

#[derive(Parser)]
#[command(name = "mongoform")]
#[command(about = "Declarative MongoDB user management", long_about = None)]
struct Cli {
    /// MongoDB connection string
    #[arg(long, env = "MONGODB_URI", global = true, hide_env_values = true)]
    uri: Option<String>,

    /// Application name reported to the server
    #[arg(long, env = "MONGOFORM_APP_NAME", global = true)]
    app_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a user spec without connecting
    Validate {
        /// Path to the JSON user spec
        file: PathBuf,
    },
    /// Create the user described by a spec
    Create {
        /// Path to the JSON user spec
        file: PathBuf,
    },
    /// Show the current state of a tracked user
    Read {
        /// Persisted identifier
        #[arg(long)]
        id: String,

        /// JSON user spec to take write-only values from
        file: Option<PathBuf>,
    },
    /// Replace a tracked user with the one described by a spec
    Update {
        /// Persisted identifier
        #[arg(long)]
        id: String,

        /// Path to the JSON user spec
        file: PathBuf,
    },
    /// Drop a tracked user
    Delete {
        /// Persisted identifier
        #[arg(long)]
        id: String,

        /// Path to the JSON user spec (its auth_database scopes the drop)
        file: PathBuf,
    },
    /// Attach an existing user by its identifier
    Import {
        /// Persisted identifier
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Validate { file } => run_validate(file),
        Commands::Create { file } => run_create(&cli, file).await,
        Commands::Read { id, file } => run_read(&cli, id, file.as_deref()).await,
        Commands::Update { id, file } => run_update(&cli, id, file).await,
        Commands::Delete { id, file } => run_delete(&cli, id, file).await,
        Commands::Import { id } => run_read(&cli, id, None).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn connect(cli: &Cli) -> Result<Box<dyn Provider>, String> {
    let uri = cli
        .uri
        .as_deref()
        .ok_or("No connection string given (use --uri or MONGODB_URI)")?;
    let mut config = ConnectionConfig::new(uri);
    if let Some(app_name) = &cli.app_name {
        config = config.with_app_name(app_name.as_str());
    }
    let provider = MongodbProvider::connect(&config)
        .await
        .map_err(|e| e.to_string())?;
    Ok(Box::new(provider))
}

/// Load a user spec from a JSON file
///
/// The resource is named after the file stem.
fn load_resource(path: &Path) -> Result<Resource, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    let serde_json::Value::Object(object) = json else {
        return Err(format!("{}: expected a JSON object", path.display()));
    };

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "user".to_string());
    let mut resource = Resource::new(DATABASE_USER, name);
    for (key, value) in &object {
        let converted = Value::from_json(value)
            .map_err(|e| format!("{}: attribute '{}': {}", path.display(), key, e))?;
        if let Some(value) = converted {
            resource.attributes.insert(key.clone(), value);
        }
    }
    debug!(
        "loaded {} attributes from {}",
        resource.attributes.len(),
        path.display()
    );
    Ok(resource)
}

fn validate_resource(resource: &Resource, schema: &ResourceSchema) -> Result<(), String> {
    schema.validate(&resource.attributes).map_err(|errors| {
        errors
            .iter()
            .map(|error| {
                format!(
                    "{}.{}: {}",
                    resource.id.resource_type, resource.id.name, error
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn load_valid_resource(path: &Path) -> Result<Resource, String> {
    let resource = load_resource(path)?;
    validate_resource(&resource, &schemas::database_user())?;
    Ok(resource)
}

/// Treat a spec file as the last tracked state of the user behind `identifier`
fn tracked_state(resource: &Resource, identifier: &str) -> State {
    State::existing(resource.id.clone(), resource.attributes.clone()).with_identifier(identifier)
}

/// Render a state as JSON, masking write-only attributes
fn state_to_json(state: &State, schema: &ResourceSchema) -> serde_json::Value {
    let mut attributes = serde_json::Map::new();
    for (key, value) in &state.attributes {
        let is_write_only = schema.attributes.get(key).is_some_and(|a| a.write_only);
        let rendered = if is_write_only {
            serde_json::Value::String(SENSITIVE.to_string())
        } else {
            value.to_json()
        };
        attributes.insert(key.clone(), rendered);
    }
    serde_json::Value::Object(attributes)
}

fn print_state(state: &State) {
    let schema = schemas::database_user();
    if let Some(identifier) = &state.identifier {
        println!("{} {}", "id:".bold(), identifier.cyan());
    }
    let json = state_to_json(state, &schema);
    match serde_json::to_string_pretty(&json) {
        Ok(rendered) => println!("{}", rendered),
        Err(e) => eprintln!("{} {}", "Warning:".yellow().bold(), e),
    }
}

fn run_validate(path: &Path) -> Result<(), String> {
    let resource = load_valid_resource(path)?;
    println!(
        "{} {}.{}",
        "Valid:".green().bold(),
        resource.id.resource_type,
        resource.id.name
    );
    Ok(())
}

async fn run_create(cli: &Cli, path: &Path) -> Result<(), String> {
    let resource = load_valid_resource(path)?;
    let provider = connect(cli).await?;

    let state = provider
        .create(&resource)
        .await
        .map_err(|e| e.to_string())?;
    println!("{} {}", "Created".green().bold(), resource.id.name);
    print_state(&state);
    Ok(())
}

async fn run_read(cli: &Cli, identifier: &str, path: Option<&Path>) -> Result<(), String> {
    let (resource, prior) = match path {
        Some(path) => {
            let resource = load_resource(path)?;
            let prior = tracked_state(&resource, identifier);
            (resource, Some(prior))
        }
        None => (Resource::new(DATABASE_USER, "imported"), None),
    };
    let provider = connect(cli).await?;

    let state = provider
        .read(&resource.id, Some(identifier), prior.as_ref())
        .await
        .map_err(|e| {
            if e.is_not_found() {
                format!("{} (remove it from tracked state)", e)
            } else {
                e.to_string()
            }
        })?;
    print_state(&state);
    Ok(())
}

async fn run_update(cli: &Cli, identifier: &str, path: &Path) -> Result<(), String> {
    let resource = load_valid_resource(path)?;
    let provider = connect(cli).await?;

    let from = State::existing(resource.id.clone(), Default::default()).with_identifier(identifier);
    let state = provider
        .update(&resource.id, identifier, &from, &resource)
        .await
        .map_err(|e| e.to_string())?;
    println!("{} {}", "Updated".yellow().bold(), resource.id.name);
    print_state(&state);
    Ok(())
}

async fn run_delete(cli: &Cli, identifier: &str, path: &Path) -> Result<(), String> {
    let resource = load_resource(path)?;
    let provider = connect(cli).await?;

    let tracked = tracked_state(&resource, identifier);
    provider
        .delete(&resource.id, identifier, &tracked)
        .await
        .map_err(|e| e.to_string())?;
    println!("{} {}", "Deleted".red().bold(), resource.id.name);
    Ok(())
}
