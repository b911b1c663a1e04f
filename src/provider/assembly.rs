//! Reassembles tool calls whose arguments arrive as streamed fragments.

use serde_json::{Map, Value};

use crate::types::ToolCall;

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    args: Map<String, Value>,
    raw: String,
}

/// Collects streamed tool-call fragments keyed by the provider's index.
///
/// Every fragment that parses as a JSON object on its own is merged into the
/// arguments. When the stream ends, the concatenated fragments are parsed as
/// a whole and merged last; unparseable fragments are dropped.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    slots: Vec<Option<PartialToolCall>>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one delta. Id and name are only present on the first delta of a
    /// call; later deltas carry argument text only.
    pub fn push(
        &mut self,
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) {
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        let slot = self.slots[index].get_or_insert_with(PartialToolCall::default);
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            slot.id = Some(id.to_string());
        }
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            slot.name = name.to_string();
        }
        if let Some(fragment) = arguments.filter(|f| !f.is_empty()) {
            slot.raw.push_str(fragment);
            match serde_json::from_str::<Map<String, Value>>(fragment) {
                Ok(parsed) => slot.args.extend(parsed),
                Err(_) => tracing::trace!(index, "partial tool argument fragment"),
            }
        }
    }

    /// Take the finished call at `index`, if any.
    pub fn take(&mut self, index: usize) -> Option<ToolCall> {
        self.slots.get_mut(index).and_then(Option::take).map(finish)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Drain all calls in index order.
    pub fn finish(self) -> Vec<ToolCall> {
        self.slots.into_iter().flatten().map(finish).collect()
    }
}

fn finish(mut partial: PartialToolCall) -> ToolCall {
    if let Ok(whole) = serde_json::from_str::<Map<String, Value>>(&partial.raw) {
        partial.args.extend(whole);
    }
    let mut call = ToolCall::new(partial.name, partial.args);
    call.id = partial.id;
    call
}
