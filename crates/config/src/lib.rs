//! # cadastre-config
//!
//! Persisted Cadastre settings.
//!
//! The settings file is the source of truth for the contract-address override:
//! consumers are expected to [`SettingsStore::load`] a fresh [`Config`] at the
//! point of use rather than hold on to one, since another process (a deploy in
//! a second terminal, a manual reset) can rewrite the file at any time.

#[macro_use]
extern crate tracing;

use alloy_primitives::Address;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
pub use error::ConfigError;

/// Cadastre settings, deserialized from `cadastre.toml` merged with
/// `CADASTRE_`-prefixed environment variables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Contract-address override. When unset, the compiled-in default of the
    /// consuming application applies.
    pub contract_address: Option<Address>,
    /// The account that last deployed the registry contract through this
    /// tool. Used as the owner signal by the default owner rule.
    pub deployer: Option<Address>,
    /// JSON-RPC endpoint of the chain the wallet operates on.
    pub rpc_url: Option<String>,
    /// Interval, in milliseconds, at which the RPC wallet provider polls for
    /// account and chain changes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    4000
}

impl Config {
    /// File name of the settings file.
    pub const FILE_NAME: &'static str = "cadastre.toml";

    /// Prefix of environment variables that override file values.
    pub const ENV_PREFIX: &'static str = "CADASTRE_";

    /// Loads the configuration backed by the given file, with environment
    /// variables taking precedence over file values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        trace!(path = %path.as_ref().display(), "loaded settings");
        Ok(config)
    }

    /// The default settings path: `$CADASTRE_CONFIG` if set, otherwise
    /// `cadastre.toml` under the user's configuration directory, otherwise in
    /// the current directory.
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os("CADASTRE_CONFIG") {
            return path.into();
        }
        match dirs::config_dir() {
            Some(dir) => dir.join("cadastre").join(Self::FILE_NAME),
            None => PathBuf::from(Self::FILE_NAME),
        }
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(Self::ENV_PREFIX))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contract_address: None,
            deployer: None,
            rpc_url: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Capability to read and persist [`Config`].
///
/// `load` must reflect out-of-band writes: implementations read the backing
/// store on every call and never serve a cached snapshot.
pub trait SettingsStore: Send + Sync + 'static {
    /// Reads the current configuration from the backing store.
    fn load(&self) -> Result<Config, ConfigError>;

    /// Persists the given configuration, replacing the previous contents.
    fn store(&self, config: &Config) -> Result<(), ConfigError>;

    /// Read-modify-write helper. Last writer wins; there is no cross-process
    /// locking on the settings file.
    fn update(&self, f: &mut dyn FnMut(&mut Config)) -> Result<Config, ConfigError> {
        let mut config = self.load()?;
        f(&mut config);
        self.store(&config)?;
        Ok(config)
    }
}

/// TOML-file-backed [`SettingsStore`].
#[derive(Clone, Debug)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    /// Creates a store backed by the given file. The file does not have to
    /// exist yet; it is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at [`Config::default_path`].
    pub fn default_location() -> Self {
        Self::new(Config::default_path())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettings {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::from_file(&self.path)
    }

    fn store(&self, config: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(config)?;
        std::fs::write(&self.path, contents)?;
        debug!(path = %self.path.display(), "settings written");
        Ok(())
    }
}
