use std::path::Path;

use anyhow::{Context, Result};
use config::{builder::DefaultState, ConfigBuilder, Environment, File, FileFormat};
use race::{HttpOptions, TargetTemplate};

const CONFIG_FILE: &str = "cep.toml";
const ENV_PREFIX: &str = "CEP";

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default)]
    pub providers: Vec<ConfigProvider>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub reject_error_status: bool,
}

fn default_timeout() -> String {
    "1s".into()
}

impl Config {
    /// Reads `path`, or `cep.toml` when present, then `CEP_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::new(CONFIG_FILE, FileFormat::Toml).required(false),
        };

        let builder = ::config::Config::builder()
            .add_source(file)
            .add_source(environment(std::env::vars_os().filter_map(|(key, value)| {
                Some((key.into_string().ok()?, value.into_string().ok()?))
            })));

        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .build()
            .context("failed to load configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn timeout(&self) -> Result<time::Duration> {
        race::parse_duration(&self.timeout).context("invalid timeout in configuration")
    }

    pub fn templates(&self) -> Vec<TargetTemplate> {
        if self.providers.is_empty() {
            return TargetTemplate::defaults();
        }

        let templates: Vec<TargetTemplate> =
            self.providers.iter().cloned().map(From::from).collect();
        for template in templates.iter().filter(|t| !t.has_placeholder()) {
            tracing::warn!(
                target: "config",
                ?template,
                "provider has no {{id}} placeholder, every lookup hits the same address"
            );
        }

        templates
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            user_agent: self.user_agent.clone(),
            reject_error_status: self.reject_error_status,
        }
    }
}

/// Keys are kebab-case, so `CEP_USER_AGENT` has to land on `user-agent`.
fn environment(vars: impl IntoIterator<Item = (String, String)>) -> Environment {
    let prefix = format!("{ENV_PREFIX}_");
    let vars = vars
        .into_iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(&prefix)?;
            Some((format!("{prefix}{}", name.replace('_', "-")), value))
        })
        .collect();

    Environment::with_prefix(ENV_PREFIX).source(Some(vars))
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(untagged)]
pub enum ConfigProvider {
    Template(String),
    Detailed(ConfigProviderDetailed),
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigProviderDetailed {
    pub name: String,
    pub template: String,
}

impl From<ConfigProvider> for TargetTemplate {
    fn from(value: ConfigProvider) -> Self {
        match value {
            ConfigProvider::Template(template) => TargetTemplate::new(template),
            ConfigProvider::Detailed(detailed) => {
                TargetTemplate::named(detailed.name, detailed.template)
            }
        }
    }
}
