pub mod config;
pub mod error;
pub mod menu;
pub mod report;
pub mod store;
pub mod task;

pub use error::{Result, TodoError};
pub use store::{LoadOutcome, TaskFilter, TaskStats, TaskStore};
pub use task::{Priority, Task};
