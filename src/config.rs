use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::MalformedPolicy;
use crate::error::HmdbError;

pub const DEFAULT_CONFIG_FILE: &str = "hmdb-assoc.json";
pub const DEFAULT_PROTEIN_FILE: &str = "hmdb_proteins.xml";
pub const DEFAULT_METABOLITE_FILE: &str = "hmdb_metabolites.xml";
const SUPPORTED_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub data_folder: Option<String>,
    #[serde(default)]
    pub protein_file: Option<String>,
    #[serde(default)]
    pub metabolite_file: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub on_malformed: Option<MalformedPolicy>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Config {
    /// Values set in `overrides` replace the ones read from the file.
    pub fn merge(self, overrides: Config) -> Config {
        Config {
            schema_version: overrides.schema_version.or(self.schema_version),
            data_folder: overrides.data_folder.or(self.data_folder),
            protein_file: overrides.protein_file.or(self.protein_file),
            metabolite_file: overrides.metabolite_file.or(self.metabolite_file),
            output: overrides.output.or(self.output),
            on_malformed: overrides.on_malformed.or(self.on_malformed),
            limit: overrides.limit.or(self.limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub protein_path: Utf8PathBuf,
    pub metabolite_path: Utf8PathBuf,
    /// `None` writes documents to stdout.
    pub output: Option<Utf8PathBuf>,
    pub on_malformed: MalformedPolicy,
    pub limit: Option<usize>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: Option<&str>) -> Result<Config, HmdbError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(HmdbError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HmdbError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| HmdbError::ConfigParse(err.to_string()))
    }

    /// Like [`ConfigLoader::load`], but a missing default config file yields
    /// an empty config instead of an error.
    pub fn load_or_default(path: Option<&str>) -> Result<Config, HmdbError> {
        match Self::load(path) {
            Err(HmdbError::MissingConfig) => Ok(Config::default()),
            other => other,
        }
    }

    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HmdbError> {
        Self::resolve_config(Self::load(path)?)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HmdbError> {
        let schema_version = config.schema_version.unwrap_or(SUPPORTED_SCHEMA_VERSION);
        if schema_version != SUPPORTED_SCHEMA_VERSION {
            return Err(HmdbError::InvalidConfig(format!(
                "unsupported schema_version {schema_version}"
            )));
        }
        if config.limit == Some(0) {
            return Err(HmdbError::InvalidConfig(
                "limit must be greater than zero".to_string(),
            ));
        }

        let data_folder = Utf8PathBuf::from(config.data_folder.unwrap_or_else(|| ".".to_string()));
        let protein_path = data_folder.join(
            config
                .protein_file
                .as_deref()
                .unwrap_or(DEFAULT_PROTEIN_FILE),
        );
        let metabolite_path = data_folder.join(
            config
                .metabolite_file
                .as_deref()
                .unwrap_or(DEFAULT_METABOLITE_FILE),
        );

        Ok(ResolvedConfig {
            schema_version,
            protein_path,
            metabolite_path,
            output: config.output.map(Utf8PathBuf::from),
            on_malformed: config.on_malformed.unwrap_or_default(),
            limit: config.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert!(resolved.protein_path.ends_with(DEFAULT_PROTEIN_FILE));
        assert!(resolved.metabolite_path.ends_with(DEFAULT_METABOLITE_FILE));
        assert_eq!(resolved.output, None);
        assert_eq!(resolved.on_malformed, MalformedPolicy::Fail);
        assert_eq!(resolved.limit, None);
    }
}
