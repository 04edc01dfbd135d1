use std::collections::HashSet;
use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, expansion or parsing
    /// fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded = crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// Binding references that are spelled out must resolve. An agent with
    /// no binding and no default is left for the orchestrator to reject at
    /// meeting time.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_llm_config()?;
        self.validate_mcp_config()?;
        self.validate_meeting_config()?;
        self.validate_memory_config()?;
        Ok(())
    }

    fn validate_llm_config(&self) -> anyhow::Result<()> {
        if self.llm.providers.is_empty() {
            anyhow::bail!("at least one model binding must be configured under [llm.providers]");
        }

        if let Some(ref default) = self.llm.default_provider
            && !self.llm.providers.contains_key(default)
        {
            anyhow::bail!("llm.default_provider '{default}' is not a configured binding");
        }

        for (id, provider) in &self.llm.providers {
            if provider.model.trim().is_empty() {
                anyhow::bail!("binding '{id}' must name a model");
            }
        }

        Ok(())
    }

    fn validate_mcp_config(&self) -> anyhow::Result<()> {
        let mut labels = HashSet::new();

        for (id, server) in &self.mcp.servers {
            let label = server.label(id);
            if label.is_empty() || label.contains(':') {
                anyhow::bail!("MCP server '{id}' label '{label}' must be non-empty and contain no ':'");
            }
            if !labels.insert(label) {
                anyhow::bail!("MCP server label '{label}' is used more than once");
            }
        }

        Ok(())
    }

    fn validate_meeting_config(&self) -> anyhow::Result<()> {
        let meeting = &self.meeting;

        if meeting.max_rounds == 0 {
            anyhow::bail!("meeting.max_rounds must be at least 1");
        }
        if meeting.max_tool_iterations == 0 {
            anyhow::bail!("meeting.max_tool_iterations must be at least 1");
        }
        if meeting.event_buffer == 0 {
            anyhow::bail!("meeting.event_buffer must be at least 1");
        }

        self.check_binding("meeting.moderator", meeting.moderator.as_deref())?;

        let mut ids = HashSet::new();
        for agent in &meeting.agents {
            if agent.id.is_empty() || agent.id.contains(|c: char| c.is_whitespace() || c == '@') {
                anyhow::bail!("agent id '{}' must be non-empty without whitespace or '@'", agent.id);
            }
            if !ids.insert(agent.id.as_str()) {
                anyhow::bail!("agent id '{}' is used more than once", agent.id);
            }

            self.check_binding(&format!("agent '{}'", agent.id), agent.provider.as_deref())?;

            for server in &agent.mcp_servers {
                if !self.mcp.servers.contains_key(server) {
                    anyhow::bail!("agent '{}' references unknown MCP server '{server}'", agent.id);
                }
            }
        }

        Ok(())
    }

    fn validate_memory_config(&self) -> anyhow::Result<()> {
        let memory = &self.memory;

        if memory.max_recent_rounds == 0 {
            anyhow::bail!("memory.max_recent_rounds must be at least 1");
        }
        if memory.compress_threshold < memory.max_recent_rounds {
            anyhow::bail!(
                "memory.compress_threshold ({}) must not be below memory.max_recent_rounds ({})",
                memory.compress_threshold,
                memory.max_recent_rounds
            );
        }

        self.check_binding("memory.provider", memory.provider.as_deref())
    }

    fn check_binding(&self, owner: &str, id: Option<&str>) -> anyhow::Result<()> {
        match id {
            Some(id) if !self.llm.providers.contains_key(id) => {
                anyhow::bail!("{owner} references unknown binding '{id}'")
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::{Config, LlmProviderType, LogFormat, McpServerType};

    const BASE: &str = indoc! {r#"
        [llm]
        default_provider = "main"

        [llm.providers.main]
        type = "openai"
        model = "gpt-4o-mini"
        api_key = "sk-test"

        [llm.providers.claude]
        type = "anthropic"
        model = "claude-sonnet-4"
    "#};

    fn parse(extra: &str) -> anyhow::Result<Config> {
        Config::parse(&format!("{BASE}\n{extra}"))
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse("").unwrap();

        assert_eq!(config.llm.providers.len(), 2);
        assert_eq!(config.llm.providers["claude"].provider_type, LlmProviderType::Anthropic);
        assert_eq!(config.memory.max_recent_rounds, 3);
        assert_eq!(config.memory.compress_threshold, 5);
        assert_eq!(config.meeting.max_rounds, 3);
        assert!(config.meeting.agents.is_empty());
        assert_eq!(config.telemetry.format, LogFormat::Text);
    }

    #[test]
    fn resolve_falls_back_to_default_binding() {
        let config = parse("").unwrap();

        assert_eq!(config.llm.resolve(None).map(|(id, _)| id), Some("main"));
        assert_eq!(config.llm.resolve(Some("claude")).map(|(id, _)| id), Some("claude"));
        assert!(config.llm.resolve(Some("nope")).is_none());
    }

    #[test]
    fn agents_and_servers_parse() {
        let config = parse(indoc! {r#"
            [mcp.servers.web]
            name = "search"
            type = { transport = "streamable_http", url = "http://localhost:9000/mcp" }

            [mcp.servers.local]
            enabled = false
            type = { transport = "stdio", command = "quotes-mcp", args = ["--fast"] }

            [[meeting.agents]]
            id = "technical"
            name = "K线王"
            role = "技术分析师"
            tools = ["get_stock_realtime"]
            mcp_servers = ["web"]
            provider = "claude"
        "#})
        .unwrap();

        let enabled: Vec<_> = config.mcp.enabled().map(|(id, _)| id).collect();
        assert_eq!(enabled, ["web"]);
        assert_eq!(config.mcp.servers["web"].label("web"), "search");
        assert!(matches!(config.mcp.servers["local"].server_type, McpServerType::Stdio(_)));
        assert_eq!(config.meeting.agents[0].mcp_servers, ["web"]);
        assert!(config.meeting.agents[0].enabled);
    }

    #[test]
    fn unknown_agent_binding_is_rejected() {
        let err = parse(indoc! {r#"
            [[meeting.agents]]
            id = "risk"
            name = "风控李"
            role = "风险控制师"
            provider = "missing"
        "#})
        .unwrap_err();

        assert!(err.to_string().contains("unknown binding 'missing'"));
    }

    #[test]
    fn colliding_server_labels_are_rejected() {
        let err = parse(indoc! {r#"
            [mcp.servers.a]
            name = "search"
            type = { transport = "stdio", command = "a" }

            [mcp.servers.b]
            name = "search"
            type = { transport = "stdio", command = "b" }
        "#})
        .unwrap_err();

        assert!(err.to_string().contains("used more than once"));
    }

    #[test]
    fn colon_in_server_label_is_rejected() {
        let err = parse(indoc! {r#"
            [mcp.servers."web:v2"]
            type = { transport = "stdio", command = "a" }
        "#})
        .unwrap_err();

        assert!(err.to_string().contains("contain no ':'"));
    }

    #[test]
    fn threshold_below_window_is_rejected() {
        let err = parse(indoc! {"
            [memory]
            max_recent_rounds = 4
            compress_threshold = 2
        "})
        .unwrap_err();

        assert!(err.to_string().contains("compress_threshold"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(parse("[meeting]\nmax_roundz = 2\n").is_err());
    }

    #[test]
    fn no_bindings_is_rejected() {
        let err = Config::parse("").unwrap_err();
        assert!(err.to_string().contains("at least one model binding"));
    }
}
