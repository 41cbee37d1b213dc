//! Table registry and session settings

mod registry;
mod settings;

pub use registry::{ConfigRegistry, TableConfig, TableDefinition};
pub use settings::{DatabaseConfig, DEFAULT_CONFIG_PATH};
