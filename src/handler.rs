use crate::error::HandlerError;
use crate::level::Level;
use crate::record::Record;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Destination for records released by a [`Logger`](crate::logger::Logger).
///
/// A handler may be attached to several loggers at once. It is invoked
/// synchronously on the logging thread with no engine lock held, so it is
/// free to log through the hierarchy itself.
pub trait Handler: Send + Sync {
    /// Minimum severity this handler accepts.
    fn level(&self) -> Level {
        Level::NotSet
    }

    /// Format and deliver a single record.
    ///
    /// **Returns**
    /// - `Ok(())` once the record has been accepted.
    /// - `Err(..)` if delivery failed. The error reaches the caller of
    ///   `log` unchanged.
    fn handle(&self, record: &Record) -> Result<(), HandlerError>;

    /// Flush any output the handler holds back. Default is a no-op.
    fn flush(&self) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// `LEVEL:name:message`, followed by the exception text on its own line
/// when one is attached.
pub fn format_basic(record: &Record) -> String {
    let mut line = format!("{}:{}:{}", record.level, record.logger_name, record.message());
    if let Some(exc) = &record.exception {
        line.push('\n');
        line.push_str(exc);
    }
    line
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handler that keeps every accepted record in memory.
///
/// Clones share the same storage, so one clone can be attached to a logger
/// while another is used to inspect what arrived.
#[derive(Clone, Default)]
pub struct MemoryHandler {
    level: Level,
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            records: Arc::default(),
        }
    }

    pub fn records(&self) -> Vec<Record> {
        lock(&self.records).clone()
    }

    /// Rendered messages, in arrival order.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.records).iter().map(Record::message).collect()
    }

    /// Arrivals rendered with [`format_basic`].
    pub fn lines(&self) -> Vec<String> {
        lock(&self.records).iter().map(format_basic).collect()
    }

    pub fn take(&self) -> Vec<Record> {
        std::mem::take(&mut *lock(&self.records))
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }
}

impl Handler for MemoryHandler {
    fn level(&self) -> Level {
        self.level
    }

    fn handle(&self, record: &Record) -> Result<(), HandlerError> {
        lock(&self.records).push(record.clone());
        Ok(())
    }
}

/// Handler that writes [`format_basic`] lines to any `io::Write`.
pub struct WriterHandler<W> {
    level: Level,
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterHandler<W> {
    pub fn new(writer: W) -> Self {
        Self::with_level(writer, Level::NotSet)
    }

    pub fn with_level(writer: W, level: Level) -> Self {
        Self {
            level,
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WriterHandler<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> Handler for WriterHandler<W> {
    fn level(&self) -> Level {
        self.level
    }

    /// Writes the line and flushes, so buffered writers release an
    /// emitted history immediately.
    fn handle(&self, record: &Record) -> Result<(), HandlerError> {
        let mut writer = lock(&self.writer);
        writeln!(writer, "{}", format_basic(record))?;
        writer.flush()?;
        Ok(())
    }

    fn flush(&self) -> Result<(), HandlerError> {
        lock(&self.writer).flush()?;
        Ok(())
    }
}

/// Used when a record reaches no handler at all: warnings and above still
/// show up on stderr instead of vanishing.
pub(crate) fn last_resort(record: &Record) -> Result<(), HandlerError> {
    if record.level >= Level::Warning {
        let stderr = io::stderr();
        let mut out = stderr.lock();
        writeln!(out, "{}", format_basic(record))?;
    }
    Ok(())
}
