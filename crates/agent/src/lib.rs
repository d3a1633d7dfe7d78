//! 远程 Agent
//!
//! 部署在执行主机上的 HTTP 服务，调度器通过连接池向它下发命令。

pub mod handlers;
pub mod server;

pub use handlers::AgentState;
pub use server::{create_router, AgentServer};
