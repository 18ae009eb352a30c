//! Configuration
//!
//! A TOML file is read into a sectioned key-value store ([`ParamStore`]).
//! Lookups fail loudly when a key is missing; only the handful of tunables
//! documented on [`AuditConfig`] have defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::database::memory::insert_target;
use crate::lineage::tables::{LINEAGE_TABLES, SELECT_QUERY_KEYS};
use crate::load::tables::{FLATTENED_TABLES, default_insert_sql};
use crate::loader::VersionOrdering;

pub const PATHS: &str = "paths";
pub const DATABASE: &str = "database";
pub const TABLES: &str = "tables";
pub const QUERIES: &str = "queries";

/// Default number of rows per insert batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Parse(String),

    /// A required key is absent
    #[error("Missing configuration parameter [{section}] {key}")]
    MissingParameter { section: String, key: String },

    #[error("Invalid value for [{section}] {key}: {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },
}

impl ConfigError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::MissingParameter { section, key } => format!(
                "Missing configuration parameter '{key}' in section [{section}]\n\n\
                Hint: Run 'job-audit sample-config' for a complete example."
            ),
            ConfigError::Io { path, message } => format!(
                "Cannot read configuration file {}: {message}",
                path.display()
            ),
            _ => self.to_string(),
        }
    }
}

/// Sectioned string parameters
///
/// Scalars of any TOML type are stored as their string form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamStore {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;

        let mut store = Self::new();
        for (section, entries) in table {
            let toml::Value::Table(entries) = entries else {
                return Err(ConfigError::Parse(format!(
                    "'{}' must be a [section], found a bare key",
                    section
                )));
            };
            for (key, value) in entries {
                let value = match value {
                    toml::Value::String(s) => s,
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    toml::Value::Datetime(d) => d.to_string(),
                    toml::Value::Array(_) | toml::Value::Table(_) => {
                        return Err(ConfigError::InvalidValue {
                            section,
                            key,
                            message: "expected a scalar value".to_string(),
                        });
                    }
                };
                store.set_param(&section, &key, value);
            }
        }
        Ok(store)
    }

    /// Look up a required parameter
    pub fn get_param(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        self.get_optional_param(section, key)
            .ok_or_else(|| ConfigError::MissingParameter {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    pub fn get_optional_param(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    pub fn set_param(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Drop a parameter; returns whether it was present
    pub fn remove_param(&mut self, section: &str, key: &str) -> bool {
        self.sections
            .get_mut(section)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false)
    }
}

/// Typed view of the settings the pipeline needs up front
///
/// Query text stays in the [`ParamStore`] and is looked up when a stage
/// needs it, so a missing query fails only the stage that uses it.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub jobs_dir: PathBuf,
    pub job_extension: String,
    /// Properties documents are loaded when set
    pub properties_extension: Option<String>,
    /// Repository context items are loaded from here when set
    pub contexts_dir: Option<PathBuf>,
    pub snapshot_dir: PathBuf,
    /// DuckDB file; in-memory when unset
    pub database_path: Option<String>,
    pub batch_size: usize,
    pub lineage_prefix: String,
    pub version_ordering: VersionOrdering,
    pub snapshot_delimiter: u8,
    pub params: ParamStore,
}

impl AuditConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_params(ParamStore::from_file(path)?)
    }

    pub fn from_params(params: ParamStore) -> Result<Self, ConfigError> {
        let batch_size = match params.get_optional_param(DATABASE, "batch_size") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid(DATABASE, "batch_size", "expected a positive integer")),
            },
            None => DEFAULT_BATCH_SIZE,
        };

        let version_ordering = match params.get_optional_param(TABLES, "version_ordering") {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| invalid(TABLES, "version_ordering", &e))?,
            None => VersionOrdering::default(),
        };

        let snapshot_delimiter = match params.get_optional_param(TABLES, "snapshot_delimiter") {
            Some(raw) => match raw.as_bytes() {
                [byte] => *byte,
                _ => return Err(invalid(TABLES, "snapshot_delimiter", "expected one ASCII character")),
            },
            None => b',',
        };

        let config = Self {
            jobs_dir: PathBuf::from(params.get_param(PATHS, "jobs_dir")?),
            job_extension: params.get_param(PATHS, "job_extension")?.to_string(),
            properties_extension: params
                .get_optional_param(PATHS, "properties_extension")
                .map(str::to_string),
            contexts_dir: params.get_optional_param(PATHS, "contexts_dir").map(PathBuf::from),
            snapshot_dir: PathBuf::from(params.get_param(PATHS, "snapshot_dir")?),
            database_path: params.get_optional_param(DATABASE, "path").map(str::to_string),
            batch_size,
            lineage_prefix: params.get_param(TABLES, "lineage_prefix")?.to_string(),
            version_ordering,
            snapshot_delimiter,
            params,
        };
        config.check_lineage_targets()?;
        Ok(config)
    }

    /// Configured lineage inserts must write `<lineage_prefix>_<table>`
    ///
    /// Absent queries are left to the stage that needs them.
    fn check_lineage_targets(&self) -> Result<(), ConfigError> {
        for spec in LINEAGE_TABLES {
            let key = spec.insert_query_key();
            let Some(sql) = self.params.get_optional_param(QUERIES, &key) else {
                continue;
            };
            let expected = self.lineage_table_name(spec.name);
            let target = insert_target(sql).map_err(|e| invalid(QUERIES, &key, &e.to_string()))?;
            if target != expected {
                return Err(invalid(
                    QUERIES,
                    &key,
                    &format!(
                        "inserts into '{}' but lineage_prefix names the table '{}'",
                        target, expected
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Statement text from the `[queries]` section
    pub fn query(&self, key: &str) -> Result<&str, ConfigError> {
        self.params.get_param(QUERIES, key)
    }

    /// Physical name of a derived lineage table
    pub fn lineage_table_name(&self, name: &str) -> String {
        format!("{}_{}", self.lineage_prefix, name)
    }
}

fn invalid(section: &str, key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// A complete configuration file with every insert and select statement
pub fn sample_config() -> String {
    let prefix = "lineage";
    let mut out = String::new();

    out.push_str("[paths]\n");
    out.push_str("jobs_dir = \"./workspace/process\"\n");
    out.push_str("job_extension = \"item\"\n");
    out.push_str("properties_extension = \"properties\"\n");
    out.push_str("contexts_dir = \"./workspace/context\"\n");
    out.push_str("snapshot_dir = \"./snapshots\"\n\n");

    out.push_str("[database]\n");
    out.push_str("path = \"./audit.duckdb\"\n");
    out.push_str(&format!("batch_size = {}\n\n", DEFAULT_BATCH_SIZE));

    out.push_str("[tables]\n");
    out.push_str(&format!("lineage_prefix = \"{}\"\n", prefix));
    out.push_str("version_ordering = \"lexicographic\"\n");
    out.push_str("snapshot_delimiter = \",\"\n\n");

    out.push_str("[queries]\n");
    out.push_str("# Lineage inserts must target <lineage_prefix>_<table>\n");
    for spec in FLATTENED_TABLES {
        out.push_str(&format!(
            "{} = '{}'\n",
            spec.insert_query_key(),
            default_insert_sql(spec.name, spec.columns)
        ));
    }
    for spec in LINEAGE_TABLES {
        out.push_str(&format!(
            "{} = '{}'\n",
            spec.insert_query_key(),
            default_insert_sql(&format!("{}_{}", prefix, spec.name), spec.columns)
        ));
    }
    for (key, table) in SELECT_QUERY_KEYS {
        out.push_str(&format!("{} = 'SELECT * FROM {}'\n", key, table));
    }

    out
}
