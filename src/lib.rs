//! threadloop: conversation-turn orchestration for tool-using chat agents.
//!
//! A [`ThreadRunner`](agent_loop::ThreadRunner) takes incoming user
//! messages, decides whether the agent should answer, runs model rounds
//! against OpenAI or Anthropic, dispatches requested tool calls in
//! concurrent batches and reports everything as a stream of
//! [`ThreadUpdate`](agent_loop::ThreadUpdate)s.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use futures::StreamExt;
//! use threadloop::prelude::*;
//!
//! # async fn example() {
//! let client = ModelClient::new(EngineConfig::from_env());
//! let store = Arc::new(InMemoryThreadStore::new());
//! let runner = ThreadRunner::new(client, store, ToolRegistry::new());
//!
//! let user = User::new("u1").with_name("Bob");
//! let agent = Agent::new("a1", "Eve");
//! let updates = runner.prompt_thread(
//!     &user,
//!     &agent,
//!     uuid::Uuid::new_v4(),
//!     vec![UserMessage::new("Eve, say hi").with_name("Bob")],
//!     PromptOptions::builder().stream(true).build(),
//! );
//! futures::pin_mut!(updates);
//! while let Some(update) = updates.next().await {
//!     println!("{update:?}");
//! }
//! # }
//! ```

pub mod agent;
pub mod agent_loop;
pub mod config;
pub mod error;
pub mod generation;
pub mod prelude;
pub mod provider;
pub mod store;
pub mod tools;
pub mod types;
pub mod util;
