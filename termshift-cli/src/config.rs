//! Project configuration
//!
//! A JSON file describing the languages (one resource file each), the
//! business types to generate variants for and where the term dictionary
//! lives. Relative paths are resolved against the directory of the config
//! file itself.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Consulted when `--config` is not given
pub const CONFIG_ENV: &str = "TERMSHIFT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "termshift.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("config declares no languages")]
    NoLanguages,

    #[error("config declares no business types")]
    NoBusinessTypes,

    #[error("language '{0}' is not declared in the config")]
    UnknownLanguage(String),

    #[error("several languages are declared; pick one with --language or set default_language")]
    NoLanguageSelected,

    #[error("business type '{0}' has an empty suffix")]
    EmptySuffix(String),

    #[error("business types '{first}' and '{second}' share the suffix '{suffix}'")]
    DuplicateSuffix {
        suffix: String,
        first: String,
        second: String,
    },

    #[error("resource file '{}' has no usable file name", .0.display())]
    InvalidResourcePath(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub resource_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessTypeConfig {
    pub display_name: String,
    /// Appended to the resource file stem for this business type's output
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub languages: BTreeMap<String, LanguageConfig>,
    pub business_types: BTreeMap<String, BusinessTypeConfig>,
    pub dictionary: PathBuf,
    #[serde(default)]
    pub default_language: Option<String>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(skip)]
    base_dir: PathBuf,
}

/// `--config`, else `$TERMSHIFT_CONFIG`, else `termshift.json`
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

impl ProjectConfig {
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = config_path(explicit);
        debug!(path = %path.display(), "loading config");

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let mut config = Self::from_json_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.languages.is_empty() {
            return Err(ConfigError::NoLanguages);
        }
        if self.business_types.is_empty() {
            return Err(ConfigError::NoBusinessTypes);
        }
        if let Some(code) = &self.default_language
            && !self.languages.contains_key(code)
        {
            return Err(ConfigError::UnknownLanguage(code.clone()));
        }

        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for (code, business_type) in &self.business_types {
            if business_type.suffix.is_empty() {
                return Err(ConfigError::EmptySuffix(code.clone()));
            }
            if let Some(first) = seen.insert(&business_type.suffix, code) {
                return Err(ConfigError::DuplicateSuffix {
                    suffix: business_type.suffix.clone(),
                    first: first.to_string(),
                    second: code.clone(),
                });
            }
        }
        Ok(())
    }

    /// Path relative to the config file, unless already absolute
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn dictionary_path(&self) -> PathBuf {
        self.resolve(&self.dictionary)
    }

    /// Business type codes, sorted
    pub fn business_type_codes(&self) -> Vec<&str> {
        self.business_types.keys().map(String::as_str).collect()
    }

    /// The requested language, else the default, else the only one declared
    pub fn language(&self, requested: Option<&str>) -> Result<(&str, &LanguageConfig), ConfigError> {
        let code = match (requested, &self.default_language) {
            (Some(code), _) => code,
            (None, Some(code)) => code.as_str(),
            (None, None) if self.languages.len() == 1 => {
                return self
                    .languages
                    .iter()
                    .next()
                    .map(|(code, language)| (code.as_str(), language))
                    .ok_or(ConfigError::NoLanguages);
            }
            (None, None) => return Err(ConfigError::NoLanguageSelected),
        };
        self.languages
            .get_key_value(code)
            .map(|(code, language)| (code.as_str(), language))
            .ok_or_else(|| ConfigError::UnknownLanguage(code.to_string()))
    }

    pub fn resource_path(&self, language: &LanguageConfig) -> PathBuf {
        self.resolve(&language.resource_file)
    }

    /// Directory outputs go to: `output_dir`, else next to the resource file
    pub fn output_dir_for(&self, language: &LanguageConfig) -> PathBuf {
        match &self.output_dir {
            Some(dir) => self.resolve(dir),
            None => self
                .resource_path(language)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    /// `<stem><suffix>.json`, e.g. `zh_TW_enterprises.json`
    pub fn output_file_name(
        &self,
        language: &LanguageConfig,
        business_type: &str,
    ) -> Result<String, ConfigError> {
        let suffix = self
            .business_types
            .get(business_type)
            .map(|bt| bt.suffix.as_str())
            .unwrap_or(business_type);
        let stem = language
            .resource_file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| ConfigError::InvalidResourcePath(language.resource_file.clone()))?;
        Ok(format!("{}{}.json", stem, suffix))
    }
}
