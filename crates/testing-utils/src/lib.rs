//! # Scheduler Testing Utils
//!
//! Shared testing utilities for the cron scheduler workspace: in-memory
//! repositories, a scripted executor, a recording notifier, entity
//! builders and polling helpers.
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! scheduler-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! ```rust
//! use scheduler_testing_utils::{MockTaskRepository, TaskBuilder};
//!
//! let repo = MockTaskRepository::with_tasks(vec![TaskBuilder::new().with_id(7).build()]);
//! assert_eq!(repo.count(), 1);
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
