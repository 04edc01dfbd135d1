//! Inline tool-call conventions for backends without native function calling
//!
//! Each convention is a [`VendorToolCallParser`]. Parsers pull calls out of
//! the final reply text and hand back what remains as the actual reply.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::types::FunctionCall;

/// Extracts inline tool calls from reply text
pub trait VendorToolCallParser: Send + Sync {
    /// Calls found in `text` and the text with their markup removed
    fn parse(&self, text: &str) -> (Vec<FunctionCall>, String);
}

/// Parser that never finds calls
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVendorCalls;

impl VendorToolCallParser for NoVendorCalls {
    fn parse(&self, text: &str) -> (Vec<FunctionCall>, String) {
        (Vec::new(), text.to_owned())
    }
}

#[derive(Debug, Deserialize)]
struct InlineCall {
    name: String,
    #[serde(default, alias = "parameters", alias = "args")]
    arguments: Option<serde_json::Value>,
}

impl InlineCall {
    fn into_call(self, id: String) -> FunctionCall {
        let args = match self.arguments {
            // Some backends double-encode the arguments object
            Some(serde_json::Value::String(raw)) => crate::aggregate::parse_args(&self.name, &raw),
            Some(value @ serde_json::Value::Object(_)) => value,
            _ => serde_json::Value::Object(serde_json::Map::new()),
        };
        FunctionCall {
            id,
            name: self.name,
            args,
        }
    }
}

/// `<tool_call>{"name": ..., "arguments": {...}}</tool_call>`
#[derive(Debug, Default, Clone, Copy)]
pub struct ToolCallTags;

fn tool_call_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<tool_call>\s*(.*?)\s*</tool_call>").expect("must be valid regex"))
}

impl VendorToolCallParser for ToolCallTags {
    fn parse(&self, text: &str) -> (Vec<FunctionCall>, String) {
        extract(text, tool_call_tag(), |body| {
            serde_json::from_str::<InlineCall>(body).map(|call| vec![call])
        })
    }
}

/// `<|FunctionCallBegin|>[{"name": ..., "parameters": {...}}]<|FunctionCallEnd|>`
#[derive(Debug, Default, Clone, Copy)]
pub struct FunctionCallBlocks;

fn function_call_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<\|FunctionCallBegin\|>\s*(.*?)\s*<\|FunctionCallEnd\|>").expect("must be valid regex")
    })
}

impl VendorToolCallParser for FunctionCallBlocks {
    fn parse(&self, text: &str) -> (Vec<FunctionCall>, String) {
        extract(text, function_call_block(), |body| {
            serde_json::from_str::<Vec<InlineCall>>(body)
                .or_else(|_| serde_json::from_str::<InlineCall>(body).map(|call| vec![call]))
        })
    }
}

/// Runs several conventions in order over the residual text
pub struct VendorParsers {
    parsers: Vec<Box<dyn VendorToolCallParser>>,
}

impl VendorParsers {
    /// Chain of the given parsers
    pub fn new(parsers: Vec<Box<dyn VendorToolCallParser>>) -> Self {
        Self { parsers }
    }
}

impl Default for VendorParsers {
    fn default() -> Self {
        Self::new(vec![Box::new(ToolCallTags), Box::new(FunctionCallBlocks)])
    }
}

impl VendorToolCallParser for VendorParsers {
    fn parse(&self, text: &str) -> (Vec<FunctionCall>, String) {
        let mut calls = Vec::new();
        let mut residual = text.to_owned();

        for parser in &self.parsers {
            let (found, rest) = parser.parse(&residual);
            calls.extend(found);
            residual = rest;
        }

        for (i, call) in calls.iter_mut().enumerate() {
            call.id = format!("vendor_call_{i}");
        }

        (calls, residual)
    }
}

/// Remove every match of `pattern`, decoding its body into calls
///
/// Bodies that do not decode are left in the text untouched.
fn extract<F>(text: &str, pattern: &Regex, decode: F) -> (Vec<FunctionCall>, String)
where
    F: Fn(&str) -> serde_json::Result<Vec<InlineCall>>,
{
    let mut calls = Vec::new();
    let mut residual = String::with_capacity(text.len());
    let mut last_end = 0;

    for captures in pattern.captures_iter(text) {
        let (Some(whole), Some(body)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        match decode(body.as_str()) {
            Ok(found) => {
                residual.push_str(&text[last_end..whole.start()]);
                last_end = whole.end();
                calls.extend(found.into_iter().map(|call| call.into_call(String::new())));
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring undecodable inline tool call");
            }
        }
    }

    if calls.is_empty() {
        return (calls, text.to_owned());
    }

    residual.push_str(&text[last_end..]);
    (calls, residual.trim().to_owned())
}
