//! Mongoform Core
//!
//! Resource model, provider trait and attribute schemas shared by the
//! mongoform providers and the command line host.

pub mod provider;
pub mod resource;
pub mod schema;
