//! Result shape for the `initialize` method (spec §4.1, §6).

use serde::{Deserialize, Serialize};

/// `MCP-Protocol-Version` this host speaks.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesCapability {
    pub subscribe: bool,
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
    pub resources: ResourcesCapability,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: ToolsCapability { list_changed: false },
            resources: ResourcesCapability { subscribe: false, list_changed: false },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    pub instructions: String,
}

impl InitializeResult {
    /// Build the result for app `app_name`, falling back to a generic
    /// instructions string when the app has no `skills_md`.
    #[must_use]
    pub fn for_app(app_name: impl Into<String>, skills_md: Option<&str>) -> Self {
        const FALLBACK_INSTRUCTIONS: &str = "No documentation is available for this app.";
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: ServerInfo { name: app_name.into(), version: "1.0.0".to_string() },
            instructions: skills_md.unwrap_or(FALLBACK_INSTRUCTIONS).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_app_uses_skills_md_when_present() {
        let result = InitializeResult::for_app("demo", Some("# Demo\nDoes things."));
        assert_eq!(result.instructions, "# Demo\nDoes things.");
    }

    #[test]
    fn for_app_falls_back_without_skills_md() {
        let result = InitializeResult::for_app("demo", None);
        assert!(result.instructions.contains("No documentation"));
    }

    #[test]
    fn capabilities_default_to_no_list_changed_no_subscribe() {
        let caps = ServerCapabilities::default();
        assert!(!caps.tools.list_changed);
        assert!(!caps.resources.subscribe);
        assert!(!caps.resources.list_changed);
    }

    #[test]
    fn serializes_with_expected_field_names() {
        let result = InitializeResult::for_app("demo", None);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(json["serverInfo"]["version"], "1.0.0");
        assert_eq!(json["capabilities"]["tools"]["listChanged"], false);
    }
}
