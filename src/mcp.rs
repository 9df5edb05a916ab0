//! JSON-RPC 2.0 (MCP) server over stdio exposing the search operations as tools.

pub mod handlers;
pub mod protocol;
pub mod server;

#[cfg(test)]
pub(crate) mod test_utils;
