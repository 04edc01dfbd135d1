//! Namespacing of MCP tool names

/// Separator between server label and tool name
pub const SEPARATOR: char = ':';

/// Qualified name for `tool` served by `server`
pub fn prefix(server: &str, tool: &str) -> String {
    format!("{server}{SEPARATOR}{tool}")
}

/// Split a qualified name into (`server`, `tool`)
///
/// Server labels never contain the separator, so the first occurrence is
/// the split point and tool names may contain it freely.
pub fn unprefix(qualified: &str) -> Option<(&str, &str)> {
    qualified.split_once(SEPARATOR)
}
