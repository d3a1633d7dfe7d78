pub mod app_config;
pub mod database;
pub mod dispatcher_agent;
pub mod observability;
pub mod security;

// Re-export main types for easier imports
pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use dispatcher_agent::{AgentConfig, DispatcherConfig};
pub use observability::ObservabilityConfig;
pub use security::TlsConfig;
