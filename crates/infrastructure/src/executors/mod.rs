pub mod http;
pub mod remote_agent;
pub mod shell;

pub use http::HttpExecutor;
pub use remote_agent::RemoteAgentExecutor;
pub use shell::ShellExecutor;
