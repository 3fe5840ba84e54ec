//! Daemon configuration: TOML file, typed per-section accessor, reload provider.
//!
//! The file has one `[daemon]` table describing the fabric and one table per
//! configured worker:
//!
//! ```toml
//! [daemon]
//! producers = ["uptime"]
//! consumers = ["journal"]
//!
//! [uptime]
//! kind = "heartbeat"
//! priority = 1
//! intervals = ["api=5m"]
//!
//! [journal]
//! priority = 1
//! path = "/var/lib/opswatch/journal.jsonl"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::core::errors::{OpsError, Result};
use crate::gate::parse_duration;
use crate::message::Priority;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/opswatch/opswatch.toml";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_ENV: &str = "OPSWATCH_CONFIG";

// ──────────────────── fabric settings ────────────────────

/// The `[daemon]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonSettings {
    /// Producer section names, started in this order.
    pub producers: Vec<String>,
    /// Consumer section names, started in this order.
    pub consumers: Vec<String>,
    /// Capacity of the shared inbound queue.
    pub inbound_capacity: usize,
    /// Capacity of each consumer queue.
    pub queue_capacity: usize,
    /// Supervisor loop period.
    pub tick_ms: u64,
    /// Pause after starting the dispatcher before wiring workers.
    pub dispatcher_grace_ms: u64,
    /// How long to wait for a stopping worker before logging that it is late.
    pub liveness_ms: u64,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: Option<String>,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            producers: Vec::new(),
            consumers: Vec::new(),
            inbound_capacity: 10_000,
            queue_capacity: 1_000,
            tick_ms: 200,
            dispatcher_grace_ms: 200,
            liveness_ms: 5_000,
            log_level: None,
        }
    }
}

impl DaemonSettings {
    /// Supervisor loop period.
    #[must_use]
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Pause between dispatcher start and worker wiring.
    #[must_use]
    pub const fn dispatcher_grace(&self) -> Duration {
        Duration::from_millis(self.dispatcher_grace_ms)
    }

    /// Interval between "still waiting" warnings during stop.
    #[must_use]
    pub const fn liveness(&self) -> Duration {
        Duration::from_millis(self.liveness_ms)
    }
}

// ──────────────────── values and accessor ────────────────────

/// A resolved setting value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// TOML string (datetimes are kept as their string form).
    String(String),
    /// TOML integer.
    Integer(i64),
    /// TOML float.
    Float(f64),
    /// TOML boolean.
    Bool(bool),
    /// TOML array.
    List(Vec<ConfigValue>),
    /// TOML table, including inline tables inside arrays.
    Table,
}

impl ConfigValue {
    /// Type name used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
            Self::Table => "table",
        }
    }

    fn from_toml(value: &toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Self::String(s.clone()),
            toml::Value::Integer(i) => Self::Integer(*i),
            toml::Value::Float(f) => Self::Float(*f),
            toml::Value::Boolean(b) => Self::Bool(*b),
            toml::Value::Array(items) => {
                Self::List(items.iter().map(Self::from_toml).collect())
            }
            toml::Value::Datetime(dt) => Self::String(dt.to_string()),
            toml::Value::Table(_) => Self::Table,
        }
    }
}

fn field(section: &str, name: &str) -> String {
    format!("{section}.{name}")
}

/// Typed lookup of worker settings keyed by `(section, name)`.
///
/// Implementors supply [`ConfigSource::value`]; the typed helpers turn a
/// missing setting into `Ok(None)` and a mistyped one into
/// [`OpsError::InvalidValue`]. The `require_*` variants also reject missing
/// settings with [`OpsError::MissingSetting`].
pub trait ConfigSource: Send + Sync {
    /// Raw value of `section.name`, if set.
    fn value(&self, section: &str, name: &str) -> Option<ConfigValue>;

    /// A string setting.
    fn string(&self, section: &str, name: &str) -> Result<Option<String>> {
        match self.value(section, name) {
            None => Ok(None),
            Some(ConfigValue::String(s)) => Ok(Some(s)),
            Some(other) => Err(OpsError::invalid_value(
                field(section, name),
                "string",
                other.type_name(),
            )),
        }
    }

    /// An integer setting.
    fn integer(&self, section: &str, name: &str) -> Result<Option<i64>> {
        match self.value(section, name) {
            None => Ok(None),
            Some(ConfigValue::Integer(i)) => Ok(Some(i)),
            Some(other) => Err(OpsError::invalid_value(
                field(section, name),
                "integer",
                other.type_name(),
            )),
        }
    }

    /// A list of strings. A single string is accepted as a one-element list.
    fn string_list(&self, section: &str, name: &str) -> Result<Option<Vec<String>>> {
        match self.value(section, name) {
            None => Ok(None),
            Some(ConfigValue::String(s)) => Ok(Some(vec![s])),
            Some(ConfigValue::List(items)) => items
                .into_iter()
                .map(|item| match item {
                    ConfigValue::String(s) => Ok(s),
                    other => Err(OpsError::invalid_value(
                        field(section, name),
                        "list of strings",
                        format!("list containing {}", other.type_name()),
                    )),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(OpsError::invalid_value(
                field(section, name),
                "list of strings",
                other.type_name(),
            )),
        }
    }

    /// A duration: interval expression string or integer seconds.
    fn duration(&self, section: &str, name: &str) -> Result<Option<Duration>> {
        match self.value(section, name) {
            None => Ok(None),
            Some(ConfigValue::String(s)) => parse_duration(&s).map(Some),
            Some(ConfigValue::Integer(i)) => u64::try_from(i)
                .map(|secs| Some(Duration::from_secs(secs)))
                .map_err(|_| {
                    OpsError::invalid_value(field(section, name), "duration", i.to_string())
                }),
            Some(other) => Err(OpsError::invalid_value(
                field(section, name),
                "duration",
                other.type_name(),
            )),
        }
    }

    /// A routing priority: integer or numeric string.
    fn priority(&self, section: &str, name: &str) -> Result<Option<Priority>> {
        match self.value(section, name) {
            None => Ok(None),
            Some(ConfigValue::Integer(i)) => u32::try_from(i)
                .map(|p| Some(Priority::new(p)))
                .map_err(|_| {
                    OpsError::invalid_value(field(section, name), "priority", i.to_string())
                }),
            Some(ConfigValue::String(s)) => s.parse().map(Some).map_err(|_| {
                OpsError::invalid_value(field(section, name), "priority", s)
            }),
            Some(other) => Err(OpsError::invalid_value(
                field(section, name),
                "priority",
                other.type_name(),
            )),
        }
    }

    /// [`ConfigSource::string`] that must be present.
    fn require_string(&self, section: &str, name: &str) -> Result<String> {
        self.string(section, name)?
            .ok_or_else(|| missing(section, name))
    }

    /// Non-empty [`ConfigSource::string_list`].
    fn require_string_list(&self, section: &str, name: &str) -> Result<Vec<String>> {
        match self.string_list(section, name)? {
            Some(list) if !list.is_empty() => Ok(list),
            _ => Err(missing(section, name)),
        }
    }

    /// [`ConfigSource::priority`] that must be present.
    fn require_priority(&self, section: &str, name: &str) -> Result<Priority> {
        self.priority(section, name)?
            .ok_or_else(|| missing(section, name))
    }
}

fn missing(section: &str, name: &str) -> OpsError {
    OpsError::MissingSetting {
        section: section.to_string(),
        name: name.to_string(),
    }
}

// ──────────────────── daemon config ────────────────────

/// Parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct DaemonConfig {
    /// The `[daemon]` table.
    pub daemon: DaemonSettings,
    sections: BTreeMap<String, toml::Table>,
}

impl DaemonConfig {
    /// Read and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                OpsError::MissingConfig {
                    path: path.to_path_buf(),
                }
            } else {
                OpsError::io(path, err)
            }
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(raw)?;
        let daemon = match table.remove("daemon") {
            Some(value) => value.try_into::<DaemonSettings>()?,
            None => DaemonSettings::default(),
        };

        let mut sections = BTreeMap::new();
        for (name, value) in table {
            match value {
                toml::Value::Table(section) => {
                    sections.insert(name, section);
                }
                other => {
                    return Err(OpsError::InvalidConfig {
                        details: format!(
                            "top-level key {name:?} must be a table, found {}",
                            other.type_str()
                        ),
                    });
                }
            }
        }

        let config = Self { daemon, sections };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for name in self.daemon.producers.iter().chain(&self.daemon.consumers) {
            if !seen.insert(name.as_str()) {
                return Err(OpsError::InvalidConfig {
                    details: format!("worker section {name:?} is listed more than once"),
                });
            }
        }
        if self.daemon.queue_capacity == 0 || self.daemon.inbound_capacity == 0 {
            return Err(OpsError::InvalidConfig {
                details: "queue capacities must be positive".to_string(),
            });
        }
        if self.daemon.tick_ms == 0 {
            return Err(OpsError::InvalidConfig {
                details: "tick_ms must be positive".to_string(),
            });
        }
        if self.daemon.liveness_ms == 0 {
            return Err(OpsError::InvalidConfig {
                details: "liveness_ms must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Factory tag for a worker section: its `kind` setting, or the section
    /// name itself.
    pub fn worker_kind(&self, section: &str) -> Result<String> {
        Ok(self
            .string(section, "kind")?
            .unwrap_or_else(|| section.to_string()))
    }

    /// Whether a `[section]` table exists.
    #[must_use]
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }
}

impl ConfigSource for DaemonConfig {
    fn value(&self, section: &str, name: &str) -> Option<ConfigValue> {
        self.sections
            .get(section)
            .and_then(|table| table.get(name))
            .map(ConfigValue::from_toml)
    }
}

/// Resolve the config path: explicit argument, then [`CONFIG_ENV`], then
/// [`DEFAULT_CONFIG_PATH`].
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(
        || {
            std::env::var_os(CONFIG_ENV)
                .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
        },
        Path::to_path_buf,
    )
}

// ──────────────────── reload provider ────────────────────

/// Source of fresh configuration for startup and reload.
pub trait ConfigProvider: Send {
    /// Produce a fully validated configuration.
    fn load(&self) -> Result<DaemonConfig>;
}

impl<F> ConfigProvider for F
where
    F: Fn() -> Result<DaemonConfig> + Send,
{
    fn load(&self) -> Result<DaemonConfig> {
        self()
    }
}

/// Re-reads one file on every load.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    /// Provider reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File this provider reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfigProvider {
    fn load(&self) -> Result<DaemonConfig> {
        DaemonConfig::load(&self.path)
    }
}
