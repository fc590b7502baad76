//! Model Context Protocol surface for the Tether engine.
//!
//! Exposes the gateway's two caller-facing operations, `call` and
//! `list_operations`, as MCP tools over stdio.

mod schemas;
mod server;

pub use schemas::CallRequest;
pub use server::{TetherMcpServer, serve_stdio};
