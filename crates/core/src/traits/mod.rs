pub mod notifier;
pub mod repository;
pub mod task_executor;

pub use notifier::*;
pub use repository::*;
pub use task_executor::*;
