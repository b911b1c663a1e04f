//! Model invocation, streaming, and structured output.

pub mod client;
pub mod object;

pub use client::{ModelCall, ModelClient};
