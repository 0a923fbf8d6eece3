//! Parameter sources and the effective-configuration dump.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{ConfigError, RunConfig};

/// Produces the run configuration at initialisation.
pub trait ParamLoader {
    /// Human-readable description of the source, for logs.
    fn describe(&self) -> String;

    /// Read and parse the configuration.
    fn load(&self) -> Result<RunConfig, ConfigError>;

    /// Where to dump the effective configuration, if anywhere.
    fn dump_path(&self) -> Option<PathBuf> {
        None
    }
}

/// A TOML parameter file.
#[derive(Clone, Debug)]
pub struct TomlParamFile {
    path: PathBuf,
}

impl TomlParamFile {
    /// Options every parameter file must set.
    pub const REQUIRED: &'static [&'static str] = &["linking_length", "min_size"];

    /// Source reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file read by this source.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn invalid(&self, e: toml::de::Error) -> ConfigError {
        ConfigError::Invalid {
            option: self.path.display().to_string(),
            reason: e.message().to_string(),
        }
    }
}

impl ParamLoader for TomlParamFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<RunConfig, ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|_| ConfigError::Missing {
            option: self.path.display().to_string(),
        })?;
        let table: toml::Table = text.parse().map_err(|e| self.invalid(e))?;
        if let Some(key) = Self::REQUIRED.iter().find(|k| !table.contains_key(**k)) {
            return Err(ConfigError::Missing {
                option: (*key).to_string(),
            });
        }
        toml::Value::Table(table)
            .try_into()
            .map_err(|e| self.invalid(e))
    }

    fn dump_path(&self) -> Option<PathBuf> {
        Some(configuration_path(&self.path))
    }
}

/// A configuration prepared in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryParams {
    config: RunConfig,
    dump: Option<PathBuf>,
}

impl InMemoryParams {
    /// Source returning `config`.
    pub fn new(config: RunConfig) -> Self {
        Self { config, dump: None }
    }

    /// Also dump the effective configuration to `path`.
    pub fn with_dump(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump = Some(path.into());
        self
    }
}

impl ParamLoader for InMemoryParams {
    fn describe(&self) -> String {
        "in-memory configuration".to_string()
    }

    fn load(&self) -> Result<RunConfig, ConfigError> {
        Ok(self.config.clone())
    }

    fn dump_path(&self) -> Option<PathBuf> {
        self.dump.clone()
    }
}

/// `<source>.configuration`.
pub fn configuration_path(source: &Path) -> PathBuf {
    let mut s = source.as_os_str().to_os_string();
    s.push(".configuration");
    PathBuf::from(s)
}

/// Write every option of `config` to `path` as TOML.
pub fn write_configuration(config: &RunConfig, path: &Path) -> io::Result<()> {
    let text = toml::to_string_pretty(config).map_err(io::Error::other)?;
    fs::write(path, text)?;
    info!(path = %path.display(), "wrote effective configuration");
    Ok(())
}
