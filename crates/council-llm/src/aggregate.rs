//! Ordered block building for streamed responses
//!
//! Backends interleave content blocks and address them by index or item
//! id. Blocks are collected into an index-ordered map so the terminal
//! aggregate lists them in arrival order no matter how events interleave.

use std::collections::{BTreeMap, HashMap};

use crate::types::{FunctionCall, Part};
use crate::vendor::VendorToolCallParser;

/// A content block under construction
#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Text(String),
    Thought(String),
    ToolCall { id: String, name: String, args: String },
}

/// Collects streamed content blocks keyed by explicit index
#[derive(Debug, Default)]
pub struct BlockAggregator {
    blocks: BTreeMap<usize, Block>,
    keyed: HashMap<String, usize>,
    next_keyed: usize,
}

impl BlockAggregator {
    /// Empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Index for a block addressed by item id, assigned in first-seen order
    pub fn index_for(&mut self, key: &str) -> usize {
        if let Some(&index) = self.keyed.get(key) {
            return index;
        }
        let index = self.next_keyed;
        self.next_keyed += 1;
        self.keyed.insert(key.to_owned(), index);
        index
    }

    /// Index already assigned to `key`, without assigning a new one
    pub fn known_index(&self, key: &str) -> Option<usize> {
        self.keyed.get(key).copied()
    }

    /// Open a text block
    pub fn start_text(&mut self, index: usize, initial: &str) {
        self.blocks.insert(index, Block::Text(initial.to_owned()));
    }

    /// Open a reasoning block
    pub fn start_thought(&mut self, index: usize, initial: &str) {
        self.blocks.insert(index, Block::Thought(initial.to_owned()));
    }

    /// Open a tool call block, or fill in identity on one created by an
    /// earlier argument fragment
    pub fn start_tool_call(&mut self, index: usize, id: &str, name: &str) {
        match self.blocks.get_mut(&index) {
            Some(Block::ToolCall {
                id: existing_id,
                name: existing_name,
                ..
            }) => {
                if !id.is_empty() {
                    id.clone_into(existing_id);
                }
                if !name.is_empty() {
                    name.clone_into(existing_name);
                }
            }
            _ => {
                self.blocks.insert(
                    index,
                    Block::ToolCall {
                        id: id.to_owned(),
                        name: name.to_owned(),
                        args: String::new(),
                    },
                );
            }
        }
    }

    /// Append reply text; opens a text block if none exists at `index`
    pub fn push_text(&mut self, index: usize, fragment: &str) {
        match self.blocks.entry(index).or_insert_with(|| Block::Text(String::new())) {
            Block::Text(text) | Block::Thought(text) => text.push_str(fragment),
            Block::ToolCall { .. } => {
                tracing::debug!(index, "text fragment addressed to a tool call block, ignoring");
            }
        }
    }

    /// Append reasoning text; opens a reasoning block if none exists at `index`
    pub fn push_thought(&mut self, index: usize, fragment: &str) {
        match self.blocks.entry(index).or_insert_with(|| Block::Thought(String::new())) {
            Block::Thought(text) | Block::Text(text) => text.push_str(fragment),
            Block::ToolCall { .. } => {
                tracing::debug!(index, "thought fragment addressed to a tool call block, ignoring");
            }
        }
    }

    /// Append a tool argument fragment; opens an anonymous tool call block
    /// if none exists at `index`
    pub fn push_args(&mut self, index: usize, fragment: &str) {
        let block = self.blocks.entry(index).or_insert_with(|| Block::ToolCall {
            id: String::new(),
            name: String::new(),
            args: String::new(),
        });
        if let Block::ToolCall { args, .. } = block {
            args.push_str(fragment);
        }
    }

    /// Replace a tool call's arguments with the complete string
    pub fn set_args(&mut self, index: usize, complete: &str) {
        if let Some(Block::ToolCall { args, .. }) = self.blocks.get_mut(&index) {
            complete.clone_into(args);
        }
    }

    /// The tool call at `index` with its arguments parsed, if that block is a call
    pub fn function_call(&self, index: usize) -> Option<FunctionCall> {
        match self.blocks.get(&index)? {
            Block::ToolCall { id, name, args } => Some(FunctionCall {
                id: id.clone(),
                name: name.clone(),
                args: parse_args(name, args),
            }),
            _ => None,
        }
    }

    /// Every tool call collected so far, in index order
    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.blocks.keys().filter_map(|&index| self.function_call(index)).collect()
    }

    /// Whether nothing has been collected
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Assemble blocks sorted by index
    ///
    /// Empty text and reasoning blocks are dropped. Tool arguments that do
    /// not parse become an empty object.
    pub fn finish(self) -> Vec<Part> {
        self.blocks
            .into_values()
            .filter_map(|block| match block {
                Block::Text(text) if !text.is_empty() => Some(Part::Text { text }),
                Block::Thought(text) if !text.is_empty() => Some(Part::Thought { text }),
                Block::Text(_) | Block::Thought(_) => None,
                Block::ToolCall { id, name, args } => {
                    let args = parse_args(&name, &args);
                    Some(Part::FunctionCall(FunctionCall { id, name, args }))
                }
            })
            .collect()
    }
}

/// Parse accumulated tool arguments
pub(crate) fn parse_args(name: &str, raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::Value::Object(serde_json::Map::new());
    }

    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        Ok(other) => {
            tracing::warn!(tool = %name, "tool arguments are not an object: {other}");
            serde_json::Value::Object(serde_json::Map::new())
        }
        Err(e) => {
            tracing::warn!(tool = %name, error = %e, "failed to parse tool arguments");
            serde_json::Value::Object(serde_json::Map::new())
        }
    }
}

/// Final part list for backends that stream reply text as one channel
///
/// Order is reasoning, reply text with inline vendor calls removed, the
/// vendor calls, then the natively streamed calls.
pub fn assemble_reply(
    thought: &str,
    text: &str,
    native_calls: Vec<Part>,
    vendor: &dyn VendorToolCallParser,
) -> Vec<Part> {
    let mut parts = Vec::with_capacity(native_calls.len() + 2);

    if !thought.is_empty() {
        parts.push(Part::thought(thought));
    }

    let (vendor_calls, residual) = vendor.parse(text);
    if !residual.is_empty() {
        parts.push(Part::text(residual));
    }
    parts.extend(vendor_calls.into_iter().map(Part::FunctionCall));
    parts.extend(native_calls);

    parts
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::vendor::NoVendorCalls;

    #[test]
    fn out_of_order_blocks_come_out_sorted() {
        let mut agg = BlockAggregator::new();

        agg.start_tool_call(2, "toolu_1", "get_kline");
        agg.start_text(1, "");
        agg.push_args(2, r#"{"code":"#);
        agg.start_thought(0, "");
        agg.push_text(1, "answer");
        agg.push_thought(0, "thinking");
        agg.push_args(2, r#""sh600519"}"#);

        let parts = agg.finish();

        assert_eq!(
            parts,
            vec![
                Part::thought("thinking"),
                Part::text("answer"),
                Part::FunctionCall(FunctionCall {
                    id: "toolu_1".into(),
                    name: "get_kline".into(),
                    args: json!({"code": "sh600519"}),
                }),
            ]
        );
    }

    #[test]
    fn keyed_blocks_keep_first_seen_order() {
        let mut agg = BlockAggregator::new();

        let b = agg.index_for("item_b");
        let a = agg.index_for("item_a");
        assert_eq!(agg.index_for("item_b"), b);

        agg.push_args(a, "{}");
        agg.start_tool_call(a, "call_a", "a");
        agg.start_tool_call(b, "call_b", "b");

        let names: Vec<_> = agg
            .finish()
            .into_iter()
            .filter_map(|p| match p {
                Part::FunctionCall(call) => Some(call.name),
                _ => None,
            })
            .collect();

        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn broken_arguments_become_empty_object() {
        let mut agg = BlockAggregator::new();
        agg.start_tool_call(0, "1", "search");
        agg.push_args(0, "{\"q\": ");

        assert_eq!(agg.function_call(0).unwrap().args, json!({}));
    }

    #[test]
    fn empty_text_blocks_are_dropped() {
        let mut agg = BlockAggregator::new();
        agg.start_text(0, "");
        agg.start_text(1, "kept");

        assert_eq!(agg.finish(), vec![Part::text("kept")]);
    }

    #[test]
    fn assembled_reply_orders_thought_text_then_calls() {
        let native = vec![Part::FunctionCall(FunctionCall {
            id: "c1".into(),
            name: "n".into(),
            args: json!({}),
        })];

        let parts = assemble_reply("why", "what", native.clone(), &NoVendorCalls);

        assert_eq!(parts[0], Part::thought("why"));
        assert_eq!(parts[1], Part::text("what"));
        assert_eq!(parts[2], native[0]);
    }
}
