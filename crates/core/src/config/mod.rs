//! 配置管理
//!
//! 配置按以下顺序合并：默认值、TOML 配置文件、`SCHEDULER__` 前缀的环境变量。
//!
//! ```rust,no_run
//! use scheduler_core::config::AppConfig;
//!
//! let config = AppConfig::load(Some("config/scheduler.toml")).unwrap();
//! println!("Agent 监听地址: {}", config.agent.bind_address);
//! ```

pub mod models;

pub use models::*;
