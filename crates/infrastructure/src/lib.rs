pub mod connection_pool;
pub mod database;
pub mod executors;
pub mod notifier;
pub mod observability;

pub use connection_pool::{AgentChannel, AgentConnectionPool};
pub use database::SqliteRecordStore;
pub use executors::{HttpExecutor, RemoteAgentExecutor, ShellExecutor};
pub use notifier::LoggingNotifier;
pub use observability::MetricsCollector;
