use anyhow::{Context, Result, bail};
use colored::*;
use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credentials::DiscoverySettings;
use crate::session::{HostKeyPolicy, SessionSettings};
use crate::utils::detect_shell;

pub const CONFIG_FILE: &str = "chainrunner.toml";

#[derive(Debug, Deserialize, Default)]
pub struct RunnerConfig {
    #[serde(default)]
    pub runner: RunnerSection,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RunnerSection {
    pub shell: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyMode {
    #[default]
    AcceptAny,
    KnownHosts,
}

#[derive(Debug, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub host_key_policy: HostKeyMode,
    pub known_hosts: Option<PathBuf>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            host_key_policy: HostKeyMode::default(),
            known_hosts: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Default)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub enabled: bool,
    pub key_dir: Option<String>,
    pub key_patterns: Option<Vec<String>>,
}

impl RunnerConfig {
    /// Resolves the file settings into what the chain compiler consumes.
    pub fn session_settings(&self) -> Result<SessionSettings> {
        let host_key_policy = match self.ssh.host_key_policy {
            HostKeyMode::AcceptAny => HostKeyPolicy::AcceptAny,
            HostKeyMode::KnownHosts => {
                let path = match &self.ssh.known_hosts {
                    Some(path) => path.clone(),
                    None => {
                        let home = env::var("HOME").context("host_key_policy = \"known-hosts\" needs 'known_hosts' or $HOME")?;
                        Path::new(&home).join(".ssh").join("known_hosts")
                    }
                };
                HostKeyPolicy::KnownHosts(path)
            }
        };

        let discovery = self.discovery.enabled.then(|| {
            let defaults = DiscoverySettings::default();
            DiscoverySettings {
                key_dir: self.discovery.key_dir.clone().unwrap_or(defaults.key_dir),
                key_patterns: self.discovery.key_patterns.clone().unwrap_or(defaults.key_patterns),
            }
        });

        Ok(SessionSettings {
            connect_timeout: Duration::from_secs(self.ssh.timeout_secs),
            host_key_policy,
            shell: detect_shell(self.runner.shell.as_ref()),
            env: self.env.clone(),
            discovery,
        })
    }
}

/// Loads `chainrunner.toml` from `dir` if present, defaults otherwise, then
/// applies the `.env` overlay from the same directory.
pub fn load_config(dir: &Path) -> Result<RunnerConfig> {
    let config_path = dir.join(CONFIG_FILE);
    let mut config = if config_path.exists() {
        parse_config_file(&config_path)?
    } else {
        RunnerConfig::default()
    };
    overlay_env(&mut config, dir)?;
    Ok(config)
}

/// Loads an explicitly named config file; it must exist.
pub fn load_config_file(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        bail!("❌ Config file not found: {:?}", path);
    }
    let mut config = parse_config_file(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    overlay_env(&mut config, dir)?;
    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<RunnerConfig> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

// .env (or .env.<CHAINRUNNER_ENV>) overrides the [env] table.
fn overlay_env(config: &mut RunnerConfig, dir: &Path) -> Result<()> {
    let env_filename = env::var("CHAINRUNNER_ENV")
        .map(|v| format!(".env.{}", v))
        .unwrap_or_else(|_| ".env".to_string());
    let env_path = dir.join(&env_filename);

    if env_path.exists() {
        info!("{} Loading environment from: {}", "🌿".green(), env_filename.bold());
        for item in dotenvy::from_path_iter(&env_path)? {
            let (key, val) = item?;
            config.env.insert(key, val);
        }
    }
    Ok(())
}
