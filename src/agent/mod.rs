//! Agent profiles and the users they talk to.

pub mod agent;

pub use agent::{Agent, KnowledgeDescription, User};
