use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "mwtool/0.1";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_API_LIMIT: u32 = 500;
pub const DEFAULT_IMAGE_IDS_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub request_interval: Duration,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_interval: Duration::ZERO,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_url(&self) -> String {
        format!("{}/api.php", self.base_url)
    }

    pub fn index_url(&self) -> String {
        format!("{}/index.php", self.base_url)
    }
}

/// Reduce a wiki URL to its script base by stripping `/api.php`, `/index.php`
/// and trailing slashes, so either form can be passed on the command line.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim();
    let stripped = trimmed
        .strip_suffix("/api.php")
        .or_else(|| trimmed.strip_suffix("/index.php"))
        .unwrap_or(trimmed);
    stripped.trim_end_matches('/').to_string()
}
