use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};
use twin_bot_core::config::SubmitConfig;

/// Environment variable holding the GitHub token. Never read from the YAML file.
pub const TOKEN_VAR: &str = "GITHUB_TOKEN";

/// Everything the CLI needs, merged from the YAML file and the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub github: GithubConfig,
    pub submit: SubmitConfig,
    pub template: TemplateConfig,
}

#[derive(Clone)]
pub struct GithubConfig {
    pub endpoint: String,
    pub token: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    /// Raw-content URL of the `template` directory on the upstream primary branch.
    #[serde(default = "default_template_base_url")]
    pub base_url: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        TemplateConfig {
            base_url: default_template_base_url(),
        }
    }
}

#[derive(Deserialize)]
struct StaticConfig {
    #[serde(default)]
    github: GithubSection,
    submit: SubmitConfig,
    #[serde(default)]
    template: TemplateConfig,
}

#[derive(Deserialize)]
struct GithubSection {
    #[serde(default = "default_endpoint")]
    endpoint: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    user_agent: String,
}

impl Default for GithubSection {
    fn default() -> Self {
        GithubSection {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.github.com/graphql".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("twin-bot/{}", env!("CARGO_PKG_VERSION"))
}

fn default_template_base_url() -> String {
    "https://raw.githubusercontent.com/phaazon/this-week-in-neovim-contents/master/template"
        .to_string()
}

/// Loads a static YAML config file (no secrets) and takes the GitHub token from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        e
    })
    .with_context(|| format!("Failed to read config file {path_ref:?}"))?;

    let static_conf: StaticConfig = serde_yaml::from_str(&config_content)
        .map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            e
        })
        .context("Failed to parse config YAML")?;

    if static_conf.submit.fork_owner.trim().is_empty() {
        error!("submit.fork_owner is empty");
        anyhow::bail!("submit.fork_owner must not be empty");
    }
    if static_conf.github.timeout_secs == 0 {
        anyhow::bail!("github.timeout_secs must be positive");
    }

    let token = match std::env::var(TOKEN_VAR) {
        Ok(token) if !token.trim().is_empty() => {
            info!("{TOKEN_VAR} found in env");
            token
        }
        Ok(_) => {
            error!("{TOKEN_VAR} is set but empty");
            anyhow::bail!("{TOKEN_VAR} environment variable is empty");
        }
        Err(e) => {
            error!(error = ?e, "{TOKEN_VAR} environment variable not set");
            return Err(anyhow::anyhow!("{TOKEN_VAR} environment variable not set: {e}"));
        }
    };

    let config = AppConfig {
        github: GithubConfig {
            endpoint: static_conf.github.endpoint,
            token,
            timeout_secs: static_conf.github.timeout_secs,
            user_agent: static_conf.github.user_agent,
        },
        submit: static_conf.submit,
        template: static_conf.template,
    };
    config.submit.trace_loaded();

    info!(
        endpoint = %config.github.endpoint,
        template = %config.template.base_url,
        "Config loaded and merged successfully"
    );
    Ok(config)
}
