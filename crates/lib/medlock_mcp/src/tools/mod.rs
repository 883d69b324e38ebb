//! MCP tool definitions: parameter types and response payloads.

pub mod vitals;

#[cfg(test)]
mod tests;
