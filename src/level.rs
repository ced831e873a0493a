use crate::error::ConfigError;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Severity of a [`Record`](crate::record::Record).
///
/// The numeric anchors match the conventional logging scale so values can
/// be exchanged with other logging substrates as plain integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(try_from = "LevelRepr")]
#[repr(i32)]
pub enum Level {
    #[default]
    NotSet = 0,
    Debug = 10,
    Info = 20,
    Warning = 30,
    Error = 40,
    Critical = 50,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::NotSet,
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    /// Numeric value on the shared severity scale.
    pub fn value(self) -> i32 {
        self as i32
    }

    /// Upper-case name, as printed by the basic record format.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::NotSet => "NOTSET",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Level {
        Level::ALL
            .into_iter()
            .find(|l| l.value() == raw as i32)
            .unwrap_or(Level::NotSet)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for Level {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, ConfigError> {
        Level::ALL
            .into_iter()
            .find(|l| i64::from(l.value()) == value)
            .ok_or(ConfigError::UnknownLevelValue(value))
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    /// Accepts a case-insensitive level name (`WARN` and `FATAL` are
    /// aliases) or an integer on the scale.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return Level::try_from(n);
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "NOTSET" => Ok(Level::NotSet),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" | "FATAL" => Ok(Level::Critical),
            _ => Err(ConfigError::UnknownLevelName(s.to_string())),
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Wire shape accepted when deserializing a [`Level`] from configuration.
#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Value(i64),
    Name(String),
}

impl TryFrom<LevelRepr> for Level {
    type Error = ConfigError;

    fn try_from(repr: LevelRepr) -> Result<Self, ConfigError> {
        match repr {
            LevelRepr::Value(n) => Level::try_from(n),
            LevelRepr::Name(name) => name.parse(),
        }
    }
}
