//! Tool system: capabilities, external tasks, registry.

pub mod creation;
pub mod registry;
pub mod task;
pub mod tool;
pub mod types;

pub use creation::{Creation, CreationRegistrar, InMemoryCreationRegistrar};
pub use registry::{ToolCategories, ToolRegistry, BASE_CATEGORY};
pub use task::{TaskHandle, TaskOutcome, TaskStatus};
pub use tool::{FnTool, Tool, ToolContext};
pub use types::ToolParameters;
