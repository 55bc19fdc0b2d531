use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use mwtool_core::config::{DEFAULT_API_LIMIT, DEFAULT_TIMEOUT_MS};
use mwtool_core::{ClientConfig, Credentials, ProtocolVersion};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = ".mwtool/config.toml";
pub const CREDENTIALS_ENV: &str = "MEDIAWIKI_CREDENTIALS";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ToolConfig {
    #[serde(default)]
    pub wiki: WikiSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub url: Option<String>,
    pub api_version: Option<String>,
    pub user_agent: Option<String>,
    pub request_interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub api_limit: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub api_version: Option<String>,
    pub user_agent: Option<String>,
    pub request_interval_ms: Option<u64>,
    pub api_limit: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub client: ClientConfig,
    pub version: ProtocolVersion,
    pub api_limit: u32,
}

pub fn load_config(config_path: &Path) -> Result<ToolConfig> {
    if !config_path.exists() {
        return Ok(ToolConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: ToolConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

impl ToolConfig {
    pub fn resolve(&self, overrides: &Overrides) -> Result<Resolved> {
        self.resolve_with(overrides, env_value)
    }

    /// Per key: flag > environment > file > default.
    pub fn resolve_with(
        &self,
        overrides: &Overrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Resolved> {
        let Some(url) = overrides
            .url
            .clone()
            .or_else(|| lookup("WIKI_URL"))
            .or_else(|| self.wiki.url.clone())
        else {
            bail!("wiki URL not set (use --url, WIKI_URL or [wiki].url)");
        };

        let version = match overrides
            .api_version
            .clone()
            .or_else(|| lookup("MEDIAWIKI_VERSION"))
            .or_else(|| self.wiki.api_version.clone())
        {
            Some(raw) => raw.parse::<ProtocolVersion>().map_err(anyhow::Error::msg)?,
            None => ProtocolVersion::V1_31,
        };

        let user_agent = overrides
            .user_agent
            .clone()
            .or_else(|| lookup("WIKI_USER_AGENT"))
            .or_else(|| self.wiki.user_agent.clone());

        let interval_ms = match overrides.request_interval_ms {
            Some(value) => value,
            None => match lookup("WIKI_REQUEST_INTERVAL_MS") {
                Some(raw) => raw
                    .parse::<u64>()
                    .with_context(|| format!("WIKI_REQUEST_INTERVAL_MS is not a number: {raw}"))?,
                None => self.wiki.request_interval_ms.unwrap_or(0),
            },
        };

        let mut client = ClientConfig::new(&url)
            .with_request_interval(Duration::from_millis(interval_ms))
            .with_timeout(Duration::from_millis(
                self.wiki.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            ));
        if let Some(user_agent) = user_agent {
            client = client.with_user_agent(user_agent);
        }

        Ok(Resolved {
            client,
            version,
            api_limit: overrides
                .api_limit
                .or(self.wiki.api_limit)
                .unwrap_or(DEFAULT_API_LIMIT),
        })
    }
}

/// `--credentials` beats `MEDIAWIKI_CREDENTIALS`. Either must be `USER:SECRET`.
pub fn resolve_credentials(
    flag: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<Credentials>> {
    let raw = match flag {
        Some(value) => value.to_string(),
        None => match lookup(CREDENTIALS_ENV) {
            Some(value) => value,
            None => return Ok(None),
        },
    };
    match Credentials::from_pair(&raw) {
        Some(credentials) => Ok(Some(credentials)),
        None => bail!("bad credentials format, expected USER:SECRET"),
    }
}

pub fn env_value(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
