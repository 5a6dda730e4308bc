// Copyright 2023 Remi Bernotavicius

use crate::error::{initialization, ErrorFormat, Result};
use crate::logging::LogDefinition;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransactionOptions {
    /// How long to wait for a connection (and for SQLite's write lock).
    pub max_wait_ms: u64,
    /// How long a transaction may run before it is rolled back.
    pub timeout_ms: u64,
    pub isolation_level: Option<IsolationLevel>,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            max_wait_ms: 2000,
            timeout_ms: 5000,
            isolation_level: None,
        }
    }
}

impl TransactionOptions {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Fields left out of records by default, keyed by model name (`"User" = ["password"]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct OmitConfig(BTreeMap<String, Vec<String>>);

impl OmitConfig {
    pub fn new(rules: BTreeMap<String, Vec<String>>) -> Self {
        Self(rules)
    }

    pub fn omits(&self, model: &str, column: &str) -> bool {
        self.0
            .get(model)
            .is_some_and(|fields| fields.iter().any(|f| f == column))
    }

    /// Every rule must name a known model and one of its columns.
    pub(crate) fn check(&self, known: &[(&'static str, Vec<&'static str>)]) -> Result<()> {
        for (model, fields) in &self.0 {
            let Some((_, columns)) = known.iter().find(|(name, _)| name == model) else {
                return Err(initialization!("omit rule names unknown model `{model}`"));
            };
            if let Some(field) = fields.iter().find(|f| !columns.contains(&f.as_str())) {
                return Err(initialization!(
                    "omit rule names unknown field `{field}` of model `{model}`"
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub datasource_url: Option<String>,
    pub error_format: ErrorFormat,
    pub log: Vec<LogDefinition>,
    pub transaction_options: TransactionOptions,
    pub omit: OmitConfig,
    pub pool_size: u32,
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            datasource_url: None,
            error_format: ErrorFormat::default(),
            log: vec![],
            transaction_options: TransactionOptions::default(),
            omit: OmitConfig::default(),
            pool_size: 10,
            connect_timeout_ms: 5000,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| initialization!("failed to read {}: {e}", path.display()))?;
        toml::from_str(&contents)
            .map_err(|e| initialization!("invalid config {}: {e}", path.display()))
    }

    pub fn with_datasource_url(mut self, url: impl Into<String>) -> Self {
        self.datasource_url = Some(url.into());
        self
    }

    pub fn with_log(mut self, definition: LogDefinition) -> Self {
        self.log.push(definition);
        self
    }

    pub fn with_omit(mut self, model: &str, fields: &[&str]) -> Self {
        self.omit
            .0
            .entry(model.to_owned())
            .or_default()
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn with_transaction_options(mut self, options: TransactionOptions) -> Self {
        self.transaction_options = options;
        self
    }

    /// The database to open: the configured URL, else `DATABASE_URL`, else `data.sqlite` in the
    /// user's data directory.
    pub fn database_url(&self) -> Result<String> {
        let url = match &self.datasource_url {
            Some(url) => url.clone(),
            None => match std::env::var("DATABASE_URL") {
                Ok(url) => url,
                Err(_) => data_path()?.join("data.sqlite").display().to_string(),
            },
        };
        Ok(url
            .strip_prefix("sqlite://")
            .map(str::to_owned)
            .unwrap_or(url))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// This is where the database lives on-disk when nothing else is configured. On Linux it should
/// be like: `~/.local/share/recipe_catalog/`
pub fn data_path() -> Result<PathBuf> {
    let dirs = directories::BaseDirs::new()
        .ok_or_else(|| initialization!("failed to get user home directory"))?;
    let path = dirs.data_dir().join("recipe_catalog");
    std::fs::create_dir_all(&path)
        .map_err(|e| initialization!("failed to create {}: {e}", path.display()))?;
    Ok(path)
}

#[test]
fn parse_toml() {
    use crate::logging::{LogEmit, LogLevel};
    use maplit::btreemap;

    let config: ClientConfig = toml::from_str(
        r#"
        datasource_url = "sqlite://catalog.sqlite"
        error_format = "minimal"
        pool_size = 4

        [[log]]
        level = "query"
        emit = "event"

        [[log]]
        level = "warn"

        [transaction_options]
        timeout_ms = 100
        isolation_level = "serializable"

        [omit]
        User = ["password"]
        "#,
    )
    .unwrap();

    assert_eq!(config.error_format, ErrorFormat::Minimal);
    assert_eq!(config.pool_size, 4);
    assert_eq!(
        config.log,
        vec![
            LogDefinition {
                level: LogLevel::Query,
                emit: LogEmit::Event
            },
            LogDefinition::stdout(LogLevel::Warn),
        ]
    );
    assert_eq!(
        config.transaction_options,
        TransactionOptions {
            max_wait_ms: 2000,
            timeout_ms: 100,
            isolation_level: Some(IsolationLevel::Serializable),
        }
    );
    assert_eq!(
        config.omit,
        OmitConfig::new(btreemap! { "User".into() => vec!["password".into()] })
    );
    assert_eq!(config.database_url().unwrap(), "catalog.sqlite");
}

#[test]
fn omit_rules_are_checked() {
    let known = vec![("User", vec!["id", "email", "password"])];
    assert!(ClientConfig::default()
        .with_omit("User", &["password"])
        .omit
        .check(&known)
        .is_ok());
    assert!(ClientConfig::default()
        .with_omit("User", &["salt"])
        .omit
        .check(&known)
        .is_err());
    assert!(ClientConfig::default()
        .with_omit("Robot", &["id"])
        .omit
        .check(&known)
        .is_err());
}
