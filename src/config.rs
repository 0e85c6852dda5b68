// hepctl - CLI for the HEPIC SIP capture and analysis platform
// Copyright (C) 2025 hepctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};
use thiserror::Error;

pub const DEFAULT_FORMAT: &str = "json";

/// On-disk configuration, stored as YAML in the user config directory.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: Option<String>,
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error("host is not configured; run `hepctl init` or set HEPCTL_HOST")]
    MissingHost,
    #[error("token is not configured; run `hepctl init` or set HEPCTL_TOKEN")]
    MissingToken,
}

/// Fully resolved configuration handed to the client constructor.
/// Precedence: command-line flag, then environment, then config file.
#[derive(Debug)]
pub struct EffectiveConfig {
    pub host: String,
    pub token: String,
    pub format: String,
}

pub fn config_path() -> Result<PathBuf> {
    if let Ok(custom) = env::var("HEPCTL_CONFIG_DIR") {
        return Ok(PathBuf::from(custom).join("config.yaml"));
    }
    let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
    Ok(base.join("hepctl").join("config.yaml"))
}

pub fn load() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
    serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", path))
}

pub fn save(config: &Config) -> Result<PathBuf> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(path)
}

/// Resolves the output format alone, for commands that run without a
/// configured host. Same precedence as [`resolve`]: flag, then
/// HEPCTL_FORMAT, then the config file, then the default.
pub fn resolve_format(format_override: Option<String>) -> String {
    format_override
        .or_else(|| env::var("HEPCTL_FORMAT").ok())
        .or_else(|| load().ok().and_then(|cfg| cfg.format))
        .unwrap_or_else(|| DEFAULT_FORMAT.to_string())
}

pub fn resolve(
    host_override: Option<String>,
    token_override: Option<String>,
    format_override: Option<String>,
) -> Result<EffectiveConfig> {
    let mut merged = load()?;

    if let Ok(host) = env::var("HEPCTL_HOST") {
        merged.host = Some(host);
    }
    if let Ok(token) = env::var("HEPCTL_TOKEN") {
        merged.token = Some(token);
    }
    if let Ok(format) = env::var("HEPCTL_FORMAT") {
        merged.format = Some(format);
    }

    if let Some(host) = host_override {
        merged.host = Some(host);
    }
    if let Some(token) = token_override {
        merged.token = Some(token);
    }
    if let Some(format) = format_override {
        merged.format = Some(format);
    }

    let host = merged
        .host
        .map(|h| h.trim().trim_end_matches('/').to_string())
        .filter(|h| !h.is_empty())
        .ok_or(ConfigError::MissingHost)?;

    let token = merged
        .token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ConfigError::MissingToken)?;

    let format = merged
        .format
        .unwrap_or_else(|| DEFAULT_FORMAT.to_string());

    Ok(EffectiveConfig {
        host,
        token,
        format,
    })
}
