// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON-RPC 2.0 envelope parsing, MCP method routing, and the tool/
//! resource wire types the dispatcher exchanges with clients.

mod envelope;
mod initialize;
mod method;
mod tools;

pub use envelope::{parse_request, JsonRpcId, JsonRpcRequest, JsonRpcResponse};
pub use initialize::{InitializeResult, ServerCapabilities, ServerInfo, ResourcesCapability, ToolsCapability, PROTOCOL_VERSION};
pub use method::McpMethod;
pub use tools::{
    skills_resource_uri, CallToolParams, CallToolResult, ContentBlock, ReadResourceParams, ReadResourceResult,
    ResourceContent, ResourceEntry, ResourcesListResult, ToolDefinition, ToolsListResult, SDK_TOOL_NAMES,
};
