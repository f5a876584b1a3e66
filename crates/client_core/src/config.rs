use std::{fs, io::ErrorKind, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::{contract::ConfirmationPolicy, controller::ControllerConfig};

/// Address of the voting contract on the local development chain.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
pub const DEFAULT_WALLET_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_SETTINGS_FILE: &str = "voting.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `None` means no wallet provider is available.
    pub wallet_url: Option<String>,
    pub contract_address: String,
    pub confirmation_poll_ms: u64,
    pub confirmation_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wallet_url: Some(DEFAULT_WALLET_URL.into()),
            contract_address: DEFAULT_CONTRACT_ADDRESS.into(),
            confirmation_poll_ms: 500,
            confirmation_timeout_secs: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    wallet_url: Option<String>,
    contract_address: Option<String>,
    confirmation_poll_ms: Option<u64>,
    confirmation_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn wallet_endpoint(&self) -> anyhow::Result<Option<Url>> {
        self.wallet_url
            .as_deref()
            .map(|raw| Url::parse(raw).with_context(|| format!("invalid wallet url '{raw}'")))
            .transpose()
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval: Duration::from_millis(self.confirmation_poll_ms.max(1)),
            timeout: self.confirmation_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            confirmation: self.confirmation_policy(),
            ..ControllerConfig::new(self.contract_address.clone())
        }
    }
}

/// Built-in defaults, then the settings file if it exists, then environment.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.wallet_url {
        settings.wallet_url = non_empty(v);
    }
    if let Some(v) = file_cfg.contract_address {
        settings.contract_address = v;
    }
    if let Some(v) = file_cfg.confirmation_poll_ms {
        settings.confirmation_poll_ms = v;
    }
    if file_cfg.confirmation_timeout_secs.is_some() {
        settings.confirmation_timeout_secs = file_cfg.confirmation_timeout_secs;
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    for key in ["VOTING_WALLET_URL", "APP__WALLET_URL"] {
        if let Some(v) = lookup(key) {
            settings.wallet_url = non_empty(v);
        }
    }

    for key in ["VOTING_CONTRACT_ADDRESS", "APP__CONTRACT_ADDRESS"] {
        if let Some(v) = lookup(key) {
            settings.contract_address = v;
        }
    }

    if let Some(v) = lookup("APP__CONFIRMATION_POLL_MS") {
        settings.confirmation_poll_ms = v
            .parse()
            .with_context(|| format!("invalid APP__CONFIRMATION_POLL_MS '{v}'"))?;
    }

    if let Some(v) = lookup("APP__CONFIRMATION_TIMEOUT_SECS") {
        settings.confirmation_timeout_secs = match non_empty(v) {
            Some(v) => Some(
                v.parse()
                    .with_context(|| format!("invalid APP__CONFIRMATION_TIMEOUT_SECS '{v}'"))?,
            ),
            None => None,
        };
    }

    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
