//! Core types for threadloop.

pub mod generation;
pub mod message;
pub mod stream;
pub mod thread;

pub use generation::*;
pub use message::*;
pub use stream::*;
pub use thread::*;
