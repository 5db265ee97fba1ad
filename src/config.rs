use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{domain::wallet::EthereumChain, surface::Browser};

pub const CONFIG_FILE_NAME: &str = "agent.toml";

/// Get the data directory for the application.
pub fn get_data_dir() -> PathBuf {
    if let Ok(s) = std::env::var("WALLET_AGENT_DATA") {
        PathBuf::from(s)
    } else if let Some(proj_dirs) = ProjectDirs::from("com", "tokenary", "wallet-agent") {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

/// Get the config directory for the application.
pub fn get_config_dir() -> PathBuf {
    if let Ok(s) = std::env::var("WALLET_AGENT_CONFIG") {
        PathBuf::from(s)
    } else if let Some(proj_dirs) = ProjectDirs::from("com", "tokenary", "wallet-agent") {
        proj_dirs.config_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".config")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Browser to focus after a session connects. `None` means whichever
    /// browser was frontmost.
    pub browser: Option<Browser>,
    pub restart_sessions_on_unlock: bool,
    /// Chain for transactions whose request names none.
    pub default_chain: EthereumChain,
    /// Offer biometrics before falling back to the password.
    pub biometrics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: None,
            restart_sessions_on_unlock: true,
            default_chain: EthereumChain::Ethereum,
            biometrics: true,
        }
    }
}

impl Config {
    /// Create config from CLI args: the given file (or `agent.toml` in the
    /// config dir), with `--no-biometrics` applied on top.
    pub fn new(path: Option<&Path>, no_biometrics: bool) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => get_config_dir().join(CONFIG_FILE_NAME),
        };
        let mut config = Self::load(&path)?;
        if no_biometrics {
            config.biometrics = false;
        }
        Ok(config)
    }

    /// Load from a TOML file. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading {}", path.display()))?;
        Self::from_toml(&text).wrap_err_with(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
