//! MCP method routing (spec §6 "JSON-RPC methods").

/// The fixed set of methods the dispatcher routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpMethod {
    Initialize,
    NotificationsInitialized,
    ToolsList,
    ToolsCall,
    ResourcesList,
    ResourcesRead,
}

impl McpMethod {
    /// Parse a JSON-RPC `method` string, returning `None` for anything
    /// not in the fixed method table (spec's `-32601` unknown method).
    #[must_use]
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "initialize" => Some(Self::Initialize),
            "notifications/initialized" => Some(Self::NotificationsInitialized),
            "tools/list" => Some(Self::ToolsList),
            "tools/call" => Some(Self::ToolsCall),
            "resources/list" => Some(Self::ResourcesList),
            "resources/read" => Some(Self::ResourcesRead),
            _ => None,
        }
    }

    /// `true` for methods that are notifications (no `id`, no response
    /// body expected even when one is sent with an `id`).
    #[must_use]
    pub fn is_notification(&self) -> bool {
        matches!(self, Self::NotificationsInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_routed_method() {
        assert_eq!(McpMethod::parse("initialize"), Some(McpMethod::Initialize));
        assert_eq!(McpMethod::parse("notifications/initialized"), Some(McpMethod::NotificationsInitialized));
        assert_eq!(McpMethod::parse("tools/list"), Some(McpMethod::ToolsList));
        assert_eq!(McpMethod::parse("tools/call"), Some(McpMethod::ToolsCall));
        assert_eq!(McpMethod::parse("resources/list"), Some(McpMethod::ResourcesList));
        assert_eq!(McpMethod::parse("resources/read"), Some(McpMethod::ResourcesRead));
    }

    #[test]
    fn unknown_method_parses_to_none() {
        assert_eq!(McpMethod::parse("tools/delete"), None);
    }

    #[test]
    fn only_notifications_initialized_is_a_notification() {
        assert!(McpMethod::NotificationsInitialized.is_notification());
        assert!(!McpMethod::ToolsCall.is_notification());
    }
}
