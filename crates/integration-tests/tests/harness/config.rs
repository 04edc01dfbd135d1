//! Fluent builder for council configuration in tests

use std::fmt::Write as _;
use std::path::Path;

use council_config::Config;

/// Builder for test configurations
///
/// Renders TOML and runs it through the normal parser so tests exercise
/// the same validation as the binary.
pub struct ConfigBuilder {
    providers: Vec<(String, String, String)>,
    default_provider: Option<String>,
    moderator: Option<String>,
    memory_provider: Option<String>,
    agents: Vec<(String, String, String)>,
    max_rounds: u32,
    keep_rounds: usize,
    compress_threshold: usize,
    memory_enabled: bool,
    data_dir: String,
}

impl ConfigBuilder {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            providers: Vec::new(),
            default_provider: None,
            moderator: None,
            memory_provider: None,
            agents: Vec::new(),
            max_rounds: 3,
            keep_rounds: 3,
            compress_threshold: 5,
            memory_enabled: true,
            data_dir: data_dir.display().to_string(),
        }
    }

    /// Add an `OpenAI`-compatible binding pointing at a mock
    pub fn openai(mut self, name: &str, base_url: &str) -> Self {
        self.providers.push((name.into(), "openai".into(), base_url.into()));
        self
    }

    /// Add an Anthropic binding pointing at a mock
    pub fn anthropic(mut self, name: &str, base_url: &str) -> Self {
        self.providers.push((name.into(), "anthropic".into(), base_url.into()));
        self
    }

    pub fn default_provider(mut self, name: &str) -> Self {
        self.default_provider = Some(name.into());
        self
    }

    pub fn moderator(mut self, name: &str) -> Self {
        self.moderator = Some(name.into());
        self
    }

    pub fn memory_provider(mut self, name: &str) -> Self {
        self.memory_provider = Some(name.into());
        self
    }

    pub fn agent(mut self, id: &str, name: &str, role: &str) -> Self {
        self.agents.push((id.into(), name.into(), role.into()));
        self
    }

    pub fn max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn memory_window(mut self, keep: usize, threshold: usize) -> Self {
        self.keep_rounds = keep;
        self.compress_threshold = threshold;
        self
    }

    pub fn without_memory(mut self) -> Self {
        self.memory_enabled = false;
        self
    }

    pub fn render(&self) -> String {
        let mut toml = String::from("[llm]\n");
        if let Some(default) = &self.default_provider {
            let _ = writeln!(toml, "default_provider = \"{default}\"");
        }

        for (name, kind, base_url) in &self.providers {
            let _ = write!(
                toml,
                "\n[llm.providers.{name}]\ntype = \"{kind}\"\nmodel = \"mock-{kind}\"\napi_key = \"test-key\"\n\
                 base_url = \"{base_url}\"\nno_system_role = false\n"
            );
        }

        let _ = write!(
            toml,
            "\n[memory]\nenabled = {}\nmax_recent_rounds = {}\ncompress_threshold = {}\n",
            self.memory_enabled, self.keep_rounds, self.compress_threshold
        );
        if let Some(provider) = &self.memory_provider {
            let _ = writeln!(toml, "provider = \"{provider}\"");
        }

        let _ = write!(toml, "\n[meeting]\nmax_rounds = {}\nevent_buffer = 1024\n", self.max_rounds);
        if let Some(moderator) = &self.moderator {
            let _ = writeln!(toml, "moderator = \"{moderator}\"");
        }

        for (id, name, role) in &self.agents {
            let _ = write!(
                toml,
                "\n[[meeting.agents]]\nid = \"{id}\"\nname = \"{name}\"\nrole = \"{role}\"\n\
                 instruction = \"你是{name}，请从{role}的角度回答。\"\n"
            );
        }

        let _ = write!(toml, "\n[storage]\ndata_dir = '{}'\n", self.data_dir);
        toml
    }

    pub fn build(self) -> anyhow::Result<Config> {
        Config::parse(&self.render())
    }
}
