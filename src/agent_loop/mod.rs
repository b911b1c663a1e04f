//! Thread orchestration: intent step, model rounds, tool dispatch and the
//! update stream.

pub mod dispatch;
pub mod events;
pub mod prompts;
pub mod rate_limit;
pub mod runner;
pub mod thinking;
pub mod title;

pub use dispatch::{ToolDispatcher, DEFAULT_BATCH_SIZE};
pub use events::ThreadUpdate;
pub use rate_limit::{ChatRateLimiter, FixedWindowRateLimiter};
pub use runner::ThreadRunner;
pub use thinking::{fallback_thought, think, Intention, Thought};
pub use title::title_thread;
