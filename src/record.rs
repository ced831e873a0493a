use crate::level::Level;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::Location;

pub const UNKNOWN_FILE: &str = "(unknown file)";
pub const UNKNOWN_FUNCTION: &str = "(unknown function)";

/// Where a log call came from. Best effort: fields that cannot be
/// determined hold the `UNKNOWN_*` sentinels and line `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl SourceLocation {
    pub fn unknown() -> Self {
        SourceLocation {
            file: UNKNOWN_FILE.to_string(),
            line: 0,
            function: UNKNOWN_FUNCTION.to_string(),
        }
    }

    /// Location of the caller of the outermost `#[track_caller]` frame.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(loc: &Location<'_>) -> Self {
        SourceLocation {
            file: loc.file().to_string(),
            line: loc.line(),
            function: UNKNOWN_FUNCTION.to_string(),
        }
    }
}

/// Immutable snapshot of one log call.
///
/// Records are shared by reference once built; buffering and replay never
/// mutate them.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub logger_name: String,
    pub level: Level,
    pub template: String,
    pub args: Vec<Value>,
    pub fields: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub location: SourceLocation,
    pub exception: Option<String>,
}

impl Record {
    /// Start a record with the current time and an unknown location.
    pub fn builder(level: Level, template: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            level,
            template: template.into(),
            args: Vec::new(),
            fields: BTreeMap::new(),
            location: None,
            exception: None,
        }
    }

    /// Render the template, replacing each `{}` with the next argument.
    ///
    /// Strings are inserted without quotes. Placeholders with no argument
    /// left are kept verbatim and surplus arguments are ignored.
    pub fn message(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut args = self.args.iter();
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            match args.next() {
                Some(Value::String(s)) => out.push_str(s),
                Some(other) => out.push_str(&other.to_string()),
                None => out.push_str("{}"),
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        out
    }
}

/// Collects the optional parts of a [`Record`] before it is handed to
/// [`Logger::log_record`](crate::logger::Logger::log_record), which stamps
/// the logger name and the time.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    pub(crate) level: Level,
    pub(crate) template: String,
    pub(crate) args: Vec<Value>,
    pub(crate) fields: BTreeMap<String, Value>,
    pub(crate) location: Option<SourceLocation>,
    pub(crate) exception: Option<String>,
}

impl RecordBuilder {
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn args<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub(crate) fn build(self, logger_name: &str) -> Record {
        Record {
            logger_name: logger_name.to_string(),
            level: self.level,
            template: self.template,
            args: self.args,
            fields: self.fields,
            timestamp: Utc::now(),
            location: self.location.unwrap_or_else(SourceLocation::unknown),
            exception: self.exception,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_substitutes_args_in_order() {
        let record = Record::builder(Level::Info, "user {} logged in from {}")
            .arg("alice")
            .arg(42)
            .build("auth");
        assert_eq!(record.message(), "user alice logged in from 42");
    }

    #[test]
    fn message_keeps_unmatched_placeholders() {
        let record = Record::builder(Level::Info, "{} and {}").arg(true).build("x");
        assert_eq!(record.message(), "true and {}");
        let plain = Record::builder(Level::Info, "no placeholders").arg(1).build("x");
        assert_eq!(plain.message(), "no placeholders");
    }

    #[test]
    fn missing_location_falls_back_to_sentinels() {
        let record = Record::builder(Level::Debug, "m").build("x");
        assert_eq!(record.location, SourceLocation::unknown());
        assert_eq!(record.location.file, UNKNOWN_FILE);
        assert_eq!(record.location.line, 0);
    }

    #[test]
    fn caller_location_points_here() {
        let loc = SourceLocation::caller();
        assert!(loc.file.ends_with("record.rs"));
        assert!(loc.line > 0);
        assert_eq!(loc.function, UNKNOWN_FUNCTION);
    }
}
