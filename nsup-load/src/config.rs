//! Runtime settings for nsup-load
//!
//! Every setting resolves command line → environment → TOML → default.
//! Credentials have no default and must resolve to non-blank values.

use nsup_common::config::{resolve_setting, TomlConfig, DEFAULT_NS_URL, DEFAULT_SPARQL_ENDPOINT};
use nsup_common::{Error, Result};
use std::time::Duration;
use tracing::{info, warn};

pub const ENV_NS_URL: &str = "NSUP_NS_URL";
pub const ENV_USERNAME: &str = "NSUP_USERNAME";
pub const ENV_PASSWORD: &str = "NSUP_PASSWORD";
pub const ENV_CPU: &str = "NSUP_CPU";
pub const ENV_THREADS: &str = "NSUP_THREADS";

pub const DEFAULT_CPU_CORES: usize = 1;
pub const DEFAULT_THREADS: usize = 20;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SPARQL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SPARQL_REQUESTS_PER_SECOND: u32 = 5;

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliSettings {
    pub ns_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub cpu_cores: Option<usize>,
    pub threads: Option<usize>,
}

/// Fully resolved runtime settings
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub ns_url: String,
    pub username: String,
    pub password: String,
    pub cpu_cores: usize,
    pub threads: usize,
    pub request_timeout: Duration,
    pub sparql_endpoint: String,
    pub sparql_timeout: Duration,
    pub sparql_requests_per_second: u32,
    pub keep_intermediate: bool,
}

impl LoaderSettings {
    pub fn resolve(cli: CliSettings, toml: &TomlConfig) -> Result<Self> {
        let ns_url = resolve_setting(cli.ns_url, ENV_NS_URL, toml.ns_url.clone())?
            .filter(|url| is_valid_value(url))
            .unwrap_or_else(|| DEFAULT_NS_URL.to_string());

        let cpu_cores = resolve_setting(cli.cpu_cores, ENV_CPU, toml.cpu_cores)?
            .unwrap_or(DEFAULT_CPU_CORES)
            .max(1);
        let threads = resolve_setting(cli.threads, ENV_THREADS, toml.threads)?
            .unwrap_or(DEFAULT_THREADS)
            .max(1);

        let username = resolve_credential("username", cli.username, ENV_USERNAME, toml.username.clone())?;
        let password = resolve_credential("password", cli.password, ENV_PASSWORD, toml.password.clone())?;

        let settings = Self {
            ns_url: ns_url.trim_end_matches('/').to_string(),
            username,
            password,
            cpu_cores,
            threads,
            request_timeout: Duration::from_secs(
                toml.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            sparql_endpoint: toml
                .sparql_endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_SPARQL_ENDPOINT.to_string()),
            sparql_timeout: Duration::from_secs(
                toml.sparql_timeout_secs.unwrap_or(DEFAULT_SPARQL_TIMEOUT_SECS),
            ),
            sparql_requests_per_second: toml
                .sparql_requests_per_second
                .unwrap_or(DEFAULT_SPARQL_REQUESTS_PER_SECOND)
                .max(1),
            keep_intermediate: toml.keep_intermediate.unwrap_or(false),
        };

        info!(
            ns_url = %settings.ns_url,
            cpu_cores = settings.cpu_cores,
            threads = settings.threads,
            "Resolved loader settings"
        );
        Ok(settings)
    }
}

/// Non-empty, non-whitespace
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Resolve one credential, naming every source when none provides it
fn resolve_credential(
    name: &str,
    cli: Option<String>,
    env_var: &str,
    toml: Option<String>,
) -> Result<String> {
    let cli = cli.filter(|v| is_valid_value(v));
    let env = std::env::var(env_var).ok().filter(|v| is_valid_value(v));
    let toml = toml.filter(|v| is_valid_value(v));

    let sources = [cli.is_some(), env.is_some(), toml.is_some()]
        .iter()
        .filter(|present| **present)
        .count();
    if sources > 1 {
        warn!("Registry {} found in multiple sources; using the highest priority one", name);
    }

    cli.or(env).or(toml).ok_or_else(|| {
        Error::Config(format!(
            "Registry {name} not configured. Provide it with one of:\n\
             1. Command line: --{name}\n\
             2. Environment: {env_var}\n\
             3. TOML config: {name} = \"...\""
        ))
    })
}
