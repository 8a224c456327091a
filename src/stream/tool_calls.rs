//! Reassembly of tool calls whose arguments arrive fragmented across chunks.

use serde::Serialize;

use super::delta::ToolCallFragment;

/// A complete (or, for an abandoned stream, partial) tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw concatenated argument text, not validated as JSON.
    pub arguments: String,
}

#[derive(Debug)]
struct Slot {
    index: u32,
    call: ToolCall,
}

/// Tool-call slots in first-seen order, keyed by stream-local index.
#[derive(Debug, Default)]
pub struct ToolCallReassembler {
    slots: Vec<Slot>,
}

impl ToolCallReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment.
    ///
    /// A fragment for an unseen index must carry both `id` and `name` to open
    /// a slot; otherwise it is dropped. For a known index, `id`/`name` are ignored
    /// (first write wins) and argument text is appended.
    pub fn apply(&mut self, fragment: ToolCallFragment) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.index == fragment.index) {
            if let Some(args) = fragment.arguments_fragment {
                slot.call.arguments.push_str(&args);
            }
            return;
        }

        let (Some(id), Some(name)) = (fragment.id, fragment.name) else {
            tracing::warn!(
                index = fragment.index,
                "dropping tool-call fragment for unopened slot without id and name"
            );
            return;
        };

        self.slots.push(Slot {
            index: fragment.index,
            call: ToolCall {
                id,
                name,
                arguments: fragment.arguments_fragment.unwrap_or_default(),
            },
        });
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Frozen copy of every slot in first-seen order.
    pub fn snapshot(&self) -> Vec<ToolCall> {
        self.slots.iter().map(|s| s.call.clone()).collect()
    }
}
