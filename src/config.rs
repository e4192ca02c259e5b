use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

/// Desktop Chrome identity sent to the origin by both the renderer and the proxy.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub origin: OriginConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

/// Listen address and the public URL clients reach the proxy under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL written into rewritten documents. Defaults to
    /// `http://localhost:<port>`.
    #[serde(default)]
    pub public_url: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

impl ServerConfig {
    pub fn proxy_base(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }

    /// Listen address. `host` may be an IP literal or a resolvable name
    /// such as `localhost`; the first resolved address is used.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))?
            .next()
            .with_context(|| format!("{} did not resolve to any address", self.host))
    }
}

/// The third-party site profiles are rendered from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    #[serde(default = "default_origin_url")]
    pub base_url: String,
    #[serde(default = "default_referer")]
    pub referer: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_origin_url() -> String {
    "https://www.instagram.com".to_string()
}

fn default_referer() -> String {
    "https://www.instagram.com/".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: default_origin_url(),
            referer: default_referer(),
            user_agent: default_user_agent(),
        }
    }
}

impl OriginConfig {
    /// URL of the profile page for `id`, e.g. `https://www.instagram.com/nasa/`.
    pub fn profile_url(&self, id: &str) -> String {
        format!("{}/{}/", self.base_url.trim_end_matches('/'), id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub timeout_secs: u64,
    pub cache_max_age_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            cache_max_age_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Browser rendering policy: viewport, wait strategy and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub headless: bool,
    pub navigation_timeout_secs: u64,
    /// CSS selector awaited after navigation; empty disables the wait.
    pub wait_selector: String,
    pub wait_selector_timeout_secs: u64,
    pub desktop_viewport: Viewport,
    pub mobile_viewport: Viewport,
    pub chrome_args: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout_secs: 30,
            wait_selector: "main".to_string(),
            wait_selector_timeout_secs: 10,
            desktop_viewport: Viewport {
                width: 1200,
                height: 800,
            },
            mobile_viewport: Viewport {
                width: 375,
                height: 812,
            },
            chrome_args: [
                "--no-sandbox",
                "--disable-setuid-sandbox",
                "--disable-dev-shm-usage",
                "--disable-accelerated-2d-canvas",
                "--disable-gpu",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl RenderConfig {
    pub fn viewport(&self, mobile: bool) -> Viewport {
        if mobile {
            self.mobile_viewport
        } else {
            self.desktop_viewport
        }
    }
}

impl Config {
    /// Default config location: `~/.profile-lens/config.toml`.
    pub fn default_path() -> PathBuf {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir.join(".profile-lens").join("config.toml")
    }

    /// Load configuration from file; a missing file yields defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(Self::default_path);
        Self::load_from(&config_path)
    }

    fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        Ok(config)
    }
}
