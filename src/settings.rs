use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, ensure};
use serde::Deserialize;
use tracing::info;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_env")]
    pub env: String, // file / server
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub prefix: Option<String>,
    #[serde(default)]
    pub allow_all_origins: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Renderer command line, e.g. `mmdc` or `npx -y @mermaid-js/mermaid-cli`
    #[serde(default = "default_mermaid_cli")]
    pub mermaid_cli: String,
    pub puppeteer_config: Option<PathBuf>,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    pub log_dir: Option<String>,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_env() -> String {
    "file".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    80
}

fn default_output_dir() -> PathBuf {
    env::temp_dir().join("diagrams")
}

fn default_mermaid_cli() -> String {
    "mmdc".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: default_env(),
            host: default_host(),
            port: default_port(),
            prefix: None,
            allow_all_origins: false,
            output_dir: default_output_dir(),
            mermaid_cli: default_mermaid_cli(),
            puppeteer_config: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            log_dir: None,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl Config {
    pub fn from_vars<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Config =
            envy::from_iter(vars).context("could not read configuration from environment")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.cache_ttl_secs > 0, "cache_ttl_secs must be at least 1");
        ensure!(
            self.cleanup_interval_secs > 0,
            "cleanup_interval_secs must be at least 1"
        );
        ensure!(
            !self.mermaid_cli.trim().is_empty(),
            "mermaid_cli must not be empty"
        );
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

pub fn get_config() -> anyhow::Result<Config> {
    let env_var = env::var("env").unwrap_or("file".to_string());
    if env_var == "file" {
        info!("using .env file as environtment variable");
        let _ = dotenvy::dotenv();
    } else {
        info!("using server environtment as environtment variable");
    }
    Config::from_vars(env::vars())
}
