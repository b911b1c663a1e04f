//! Thread persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Result, ThreadError};
use crate::types::{ActiveChange, Message, MessageId, Thread, ThreadId, ToolCallPatch};

/// Durable storage for threads. Every call must be applied atomically and
/// be durable before it returns. Threads are created on first append.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Append messages and apply an active-set change in one step.
    async fn append(
        &self,
        thread_id: ThreadId,
        messages: Vec<Message>,
        change: ActiveChange,
    ) -> Result<()>;

    /// Patch the mutable fields of one tool call.
    async fn update_tool_call(
        &self,
        thread_id: ThreadId,
        message_id: MessageId,
        index: usize,
        patch: ToolCallPatch,
    ) -> Result<()>;

    /// The last `limit` messages in transcript order.
    async fn recent_messages(&self, thread_id: ThreadId, limit: usize) -> Result<Vec<Message>>;

    async fn load(&self, thread_id: ThreadId) -> Result<Option<Thread>>;

    async fn set_title(&self, thread_id: ThreadId, title: String) -> Result<()>;
}

/// Store keeping every thread in process memory.
#[derive(Debug, Default)]
pub struct InMemoryThreadStore {
    threads: RwLock<HashMap<ThreadId, Thread>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write<T>(&self, f: impl FnOnce(&mut HashMap<ThreadId, Thread>) -> Result<T>) -> Result<T> {
        let mut threads = self
            .threads
            .write()
            .map_err(|_| ThreadError::Persistence("thread store poisoned".into()))?;
        f(&mut threads)
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<ThreadId, Thread>) -> T) -> Result<T> {
        let threads = self
            .threads
            .read()
            .map_err(|_| ThreadError::Persistence("thread store poisoned".into()))?;
        Ok(f(&threads))
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn append(
        &self,
        thread_id: ThreadId,
        messages: Vec<Message>,
        change: ActiveChange,
    ) -> Result<()> {
        self.write(|threads| {
            threads
                .entry(thread_id)
                .or_insert_with(|| Thread::with_id(thread_id))
                .push(messages, change);
            Ok(())
        })
    }

    async fn update_tool_call(
        &self,
        thread_id: ThreadId,
        message_id: MessageId,
        index: usize,
        patch: ToolCallPatch,
    ) -> Result<()> {
        self.write(|threads| {
            threads
                .get_mut(&thread_id)
                .ok_or_else(|| ThreadError::Persistence(format!("thread {thread_id} not found")))?
                .update_tool_call(message_id, index, &patch)
        })
    }

    async fn recent_messages(&self, thread_id: ThreadId, limit: usize) -> Result<Vec<Message>> {
        self.read(|threads| {
            threads
                .get(&thread_id)
                .map(|t| t.recent_messages(limit))
                .unwrap_or_default()
        })
    }

    async fn load(&self, thread_id: ThreadId) -> Result<Option<Thread>> {
        self.read(|threads| threads.get(&thread_id).cloned())
    }

    async fn set_title(&self, thread_id: ThreadId, title: String) -> Result<()> {
        self.write(|threads| {
            threads
                .entry(thread_id)
                .or_insert_with(|| Thread::with_id(thread_id))
                .title = Some(title);
            Ok(())
        })
    }
}
