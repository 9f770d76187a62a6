// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run configuration loaded from environment variables.
//!
//! All keys are required. They are read in the order of [`CONFIG_KEYS`] and
//! the first missing or invalid one is reported; there is no partially
//! loaded configuration.

use geo2ifc_core::{HeaderMetadata, IfcSchemaVersion};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Required keys, in validation order.
pub const CONFIG_KEYS: [&str; 14] = [
    "ENV",
    "LOGLEVEL",
    "SHIFT_LV95_ORIGIN",
    "AUTHOR_NAME",
    "AUTHOR_EMAIL",
    "ORGANIZATION_NAME",
    "ORGANIZATION_EMAIL",
    "AUTHORIZATION_NAME",
    "HOST_DATA_DIRECTORY",
    "IFC_SCHEMA_IDENTIFIER",
    "OBJECT_NAME",
    "TRACE_FILENAME",
    "DOWNLOAD_TILE",
    "CUSTOM_MESH",
];

/// Data root inside the container image.
pub const CONTAINER_DATA_ROOT: &str = "/data";

/// Configuration errors. Always fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    MissingVariable(&'static str),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidVariable {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Log verbosity requested by `LOGLEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Directive for a tracing `EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err("expected DEBUG, INFO, WARNING, ERROR or CRITICAL".into()),
        }
    }
}

/// Deployment environment from `ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEV" | "DEVELOPMENT" => Ok(Environment::Development),
            "TEST" | "TESTING" => Ok(Environment::Testing),
            "STAGING" => Ok(Environment::Staging),
            "PROD" | "PRODUCTION" => Ok(Environment::Production),
            _ => Err("expected DEV, TEST, STAGING or PROD".into()),
        }
    }
}

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub environment: Environment,
    pub log_level: LogLevel,
    /// Translate coordinates toward the trace centroid.
    pub shift_lv95_origin: bool,
    pub author_name: String,
    pub author_email: String,
    pub organization_name: String,
    pub organization_email: String,
    pub authorization_name: String,
    pub host_data_directory: PathBuf,
    pub schema: IfcSchemaVersion,
    /// Feature property that names each pipe segment.
    pub object_name: String,
    pub trace_filename: String,
    pub download_tile: bool,
    pub custom_mesh: bool,
    /// Directory holding one subdirectory per site.
    pub data_root: PathBuf,
}

/// Reads keys through a lookup function, tagging errors with the key.
struct Reader<F> {
    lookup: F,
}

impl<F> Reader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &'static str) -> Result<String, ConfigError> {
        (self.lookup)(key).ok_or(ConfigError::MissingVariable(key))
    }

    fn non_empty(&self, key: &'static str) -> Result<String, ConfigError> {
        let value = self.raw(key)?;
        if value.trim().is_empty() {
            return Err(invalid(key, &value, "must not be empty"));
        }
        Ok(value.trim().to_string())
    }

    fn flag(&self, key: &'static str) -> Result<bool, ConfigError> {
        let value = self.raw(key)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(invalid(key, &value, "expected true or false")),
        }
    }

    fn parsed<T>(&self, key: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        let value = self.raw(key)?;
        value
            .parse::<T>()
            .map_err(|e| invalid(key, &value, &e.to_string()))
    }

    fn file_name(&self, key: &'static str) -> Result<String, ConfigError> {
        let value = self.non_empty(key)?;
        let bare = !value.contains('/') && !value.contains('\\') && value != "." && value != "..";
        if !bare {
            return Err(invalid(key, &value, "must be a bare file name"));
        }
        Ok(value)
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidVariable {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl RunConfig {
    /// Load from the process environment.
    ///
    /// Inside a container (`/.dockerenv` present) sites are read from
    /// `/data`, the mount point of `HOST_DATA_DIRECTORY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        if Path::new("/.dockerenv").exists() {
            Ok(config.with_data_root(CONTAINER_DATA_ROOT))
        } else {
            Ok(config)
        }
    }

    /// Load through an arbitrary lookup. The data root defaults to
    /// `HOST_DATA_DIRECTORY`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let r = Reader { lookup };
        // Field order follows CONFIG_KEYS so the first bad key is reported
        let environment = r.parsed::<Environment>("ENV")?;
        let log_level = r.parsed::<LogLevel>("LOGLEVEL")?;
        let shift_lv95_origin = r.flag("SHIFT_LV95_ORIGIN")?;
        let author_name = r.raw("AUTHOR_NAME")?;
        let author_email = r.raw("AUTHOR_EMAIL")?;
        let organization_name = r.raw("ORGANIZATION_NAME")?;
        let organization_email = r.raw("ORGANIZATION_EMAIL")?;
        let authorization_name = r.raw("AUTHORIZATION_NAME")?;
        let host_data_directory = PathBuf::from(r.non_empty("HOST_DATA_DIRECTORY")?);
        let schema = r.parsed::<IfcSchemaVersion>("IFC_SCHEMA_IDENTIFIER")?;
        let object_name = r.non_empty("OBJECT_NAME")?;
        let trace_filename = r.file_name("TRACE_FILENAME")?;
        let download_tile = r.flag("DOWNLOAD_TILE")?;
        let custom_mesh = r.flag("CUSTOM_MESH")?;

        Ok(Self {
            environment,
            log_level,
            shift_lv95_origin,
            author_name,
            author_email,
            organization_name,
            organization_email,
            authorization_name,
            data_root: host_data_directory.clone(),
            host_data_directory,
            schema,
            object_name,
            trace_filename,
            download_tile,
            custom_mesh,
        })
    }

    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = root.into();
        self
    }

    /// FILE_NAME author, organization and authorization fields.
    pub fn header_metadata(&self) -> HeaderMetadata {
        HeaderMetadata {
            author: Some((self.author_name.clone(), self.author_email.clone())),
            organization: Some((
                self.organization_name.clone(),
                self.organization_email.clone(),
            )),
            authorization: self.authorization_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, String> {
        [
            ("ENV", "dev"),
            ("LOGLEVEL", "info"),
            ("SHIFT_LV95_ORIGIN", "true"),
            ("AUTHOR_NAME", "Ada"),
            ("AUTHOR_EMAIL", "ada@example.ch"),
            ("ORGANIZATION_NAME", ""),
            ("ORGANIZATION_EMAIL", ""),
            ("AUTHORIZATION_NAME", "none"),
            ("HOST_DATA_DIRECTORY", "/srv/data"),
            ("IFC_SCHEMA_IDENTIFIER", "IFC4X3_ADD2"),
            ("OBJECT_NAME", "obj_id"),
            ("TRACE_FILENAME", "trace.geojson"),
            ("DOWNLOAD_TILE", "False"),
            ("CUSTOM_MESH", " TRUE "),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect()
    }

    fn load(vars: &HashMap<&'static str, String>) -> Result<RunConfig, ConfigError> {
        RunConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn loads_complete_environment() {
        let config = load(&base()).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.shift_lv95_origin);
        assert!(!config.download_tile);
        assert!(config.custom_mesh);
        assert_eq!(config.schema, IfcSchemaVersion::Ifc4x3Add2);
        assert_eq!(config.data_root, PathBuf::from("/srv/data"));
        assert_eq!(config.organization_name, "");
    }

    #[test]
    fn each_missing_key_is_named() {
        for key in CONFIG_KEYS {
            let mut vars = base();
            vars.remove(key);
            assert_eq!(load(&vars), Err(ConfigError::MissingVariable(key)));
        }
    }

    #[test]
    fn first_failing_key_wins() {
        let mut vars = base();
        vars.remove("CUSTOM_MESH");
        vars.insert("LOGLEVEL", "verbose".into());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidVariable { key: "LOGLEVEL", .. })
        ));
    }

    #[test]
    fn rejects_bad_values() {
        for (key, value) in [
            ("SHIFT_LV95_ORIGIN", "yes"),
            ("ENV", "qa"),
            ("IFC_SCHEMA_IDENTIFIER", "IFC2X3"),
            ("TRACE_FILENAME", "../trace.geojson"),
            ("TRACE_FILENAME", ""),
            ("OBJECT_NAME", "  "),
            ("HOST_DATA_DIRECTORY", ""),
        ] {
            let mut vars = base();
            vars.insert(key, value.to_string());
            match load(&vars) {
                Err(ConfigError::InvalidVariable { key: k, .. }) => assert_eq!(k, key),
                other => panic!("{}={:?} gave {:?}", key, value, other),
            }
        }
    }

    #[test]
    fn log_levels_map_to_filters() {
        assert_eq!("CRITICAL".parse::<LogLevel>().unwrap().as_filter(), "error");
        assert_eq!("warning".parse::<LogLevel>().unwrap().as_filter(), "warn");
        assert_eq!("Warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert!("PRODUCTION".parse::<Environment>().unwrap().is_production());
    }

    #[test]
    fn data_root_override() {
        let config = load(&base()).unwrap().with_data_root("/tmp/x");
        assert_eq!(config.data_root, PathBuf::from("/tmp/x"));
        assert_eq!(config.host_data_directory, PathBuf::from("/srv/data"));
    }
}
