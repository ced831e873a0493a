use crate::buffer::{Capacity, PastBuffer};
use crate::config::PastConfig;
use crate::error::{ConfigError, HandlerError};
use crate::gate::{self, Decision};
use crate::handler::{self, Handler};
use crate::level::Level;
use crate::record::{Record, RecordBuilder, SourceLocation};
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tracing::{debug, trace};

/// State every logger of one hierarchy can see without holding the
/// registry itself.
pub(crate) struct HierarchyState {
    /// Raw level value; calls at or below it are dropped. `0` disables
    /// nothing.
    pub(crate) disabled: AtomicU8,
    pub(crate) last_resort: bool,
    /// Used only when the chain to the root has been torn down.
    pub(crate) fallback_store: Level,
    pub(crate) fallback_emit: Level,
}

impl HierarchyState {
    fn is_disabled(&self, level: Level) -> bool {
        let disabled = self.disabled.load(Ordering::Relaxed);
        disabled != 0 && level.value() <= i32::from(disabled)
    }
}

/// A deferred record together with the logger that produced it, so a
/// shared buffer can replay it through the right handler chain.
pub(crate) struct Buffered {
    origin: Weak<LoggerNode>,
    record: Record,
}

pub(crate) type RecordBuffer = PastBuffer<Buffered>;

struct Settings {
    /// `None` inherits from the nearest ancestor that has a value.
    store: Option<Level>,
    emit: Option<Level>,
    propagate: bool,
}

pub(crate) struct LoggerNode {
    name: String,
    parent: Option<Weak<LoggerNode>>,
    settings: RwLock<Settings>,
    handlers: RwLock<Vec<Arc<dyn Handler>>>,
    buffer: Arc<RecordBuffer>,
    state: Arc<HierarchyState>,
}

impl LoggerNode {
    pub(crate) fn root(
        store: Level,
        emit: Level,
        buffer: Arc<RecordBuffer>,
        state: Arc<HierarchyState>,
    ) -> Self {
        Self::build(crate::hierarchy::ROOT_NAME.to_string(), None, Some(store), Some(emit), buffer, state)
    }

    pub(crate) fn child(
        name: String,
        parent: &Arc<LoggerNode>,
        buffer: Arc<RecordBuffer>,
        state: Arc<HierarchyState>,
    ) -> Self {
        Self::build(name, Some(Arc::downgrade(parent)), None, None, buffer, state)
    }

    fn build(
        name: String,
        parent: Option<Weak<LoggerNode>>,
        store: Option<Level>,
        emit: Option<Level>,
        buffer: Arc<RecordBuffer>,
        state: Arc<HierarchyState>,
    ) -> Self {
        LoggerNode {
            name,
            parent,
            settings: RwLock::new(Settings {
                store,
                emit,
                propagate: true,
            }),
            handlers: RwLock::new(Vec::new()),
            buffer,
            state,
        }
    }

    fn settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn settings_mut(&self) -> RwLockWriteGuard<'_, Settings> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn parent(&self) -> Option<Arc<LoggerNode>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    // Cloned out so no lock is held while handlers run.
    fn handlers(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Handle to a named node of a [`Hierarchy`](crate::hierarchy::Hierarchy).
///
/// Cheap to clone; every clone refers to the same node, buffer and
/// handler set. Obtain one with
/// [`Hierarchy::get_logger`](crate::hierarchy::Hierarchy::get_logger).
#[derive(Clone)]
pub struct Logger {
    node: Arc<LoggerNode>,
}

impl Logger {
    pub(crate) fn from_node(node: Arc<LoggerNode>) -> Self {
        Logger { node }
    }

    pub(crate) fn node(&self) -> &Arc<LoggerNode> {
        &self.node
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Logger one level up the dotted name; `None` for the root.
    pub fn parent(&self) -> Option<Logger> {
        self.node.parent().map(Logger::from_node)
    }

    pub fn is_root(&self) -> bool {
        self.node.is_root()
    }

    /// Records below `level` are dropped without being stored.
    pub fn set_store_threshold(&self, level: Level) {
        self.node.settings_mut().store = Some(level);
        debug!(logger = %self.name(), %level, "store threshold set");
    }

    /// Records at or above `level` flush the buffer and are emitted.
    pub fn set_emit_threshold(&self, level: Level) {
        self.node.settings_mut().emit = Some(level);
        debug!(logger = %self.name(), %level, "emit threshold set");
    }

    /// Go back to inheriting the store threshold. The root always keeps an
    /// explicit value, so this is ignored there.
    pub fn unset_store_threshold(&self) {
        if !self.is_root() {
            self.node.settings_mut().store = None;
        }
    }

    /// Go back to inheriting the emit threshold. Ignored on the root.
    pub fn unset_emit_threshold(&self) {
        if !self.is_root() {
            self.node.settings_mut().emit = None;
        }
    }

    /// This logger's own store threshold, `None` when inherited.
    pub fn store_threshold(&self) -> Option<Level> {
        self.node.settings().store
    }

    /// This logger's own emit threshold, `None` when inherited.
    pub fn emit_threshold(&self) -> Option<Level> {
        self.node.settings().emit
    }

    pub fn effective_store_threshold(&self) -> Level {
        self.resolve(|s| s.store, self.node.state.fallback_store)
    }

    pub fn effective_emit_threshold(&self) -> Level {
        self.resolve(|s| s.emit, self.node.state.fallback_emit)
    }

    fn resolve(&self, pick: impl Fn(&Settings) -> Option<Level>, fallback: Level) -> Level {
        let mut current = Some(Arc::clone(&self.node));
        while let Some(node) = current {
            if let Some(level) = pick(&node.settings()) {
                return level;
            }
            current = node.parent();
        }
        fallback
    }

    /// Bound the buffer to `n` records, or `-1` for no bound.
    ///
    /// `0` keeps nothing: buffered records are evicted as soon as they
    /// arrive. Records already held beyond a smaller bound are trimmed by
    /// the next append, not now.
    ///
    /// **Errors**
    /// - [`ConfigError::InvalidCapacity`] for anything below `-1`; the
    ///   current bound is kept.
    pub fn set_max_buffered(&self, n: i64) -> Result<(), ConfigError> {
        let capacity = Capacity::try_from(n)?;
        self.set_capacity(capacity);
        Ok(())
    }

    pub fn set_capacity(&self, capacity: Capacity) {
        self.node.buffer.set_capacity(capacity);
        debug!(logger = %self.name(), %capacity, "buffer capacity set");
    }

    /// Current bound, `-1` when unbounded.
    pub fn max_buffered(&self) -> i64 {
        self.node.buffer.capacity().as_i64()
    }

    /// Forget everything buffered so far, e.g. at the start of a request.
    pub fn reset(&self) {
        let discarded = self.node.buffer.clear();
        debug!(logger = %self.name(), discarded, "buffer reset");
    }

    pub fn buffered_len(&self) -> usize {
        self.node.buffer.len()
    }

    /// Records lost to capacity eviction since the buffer was created.
    pub fn evicted(&self) -> u64 {
        self.node.buffer.evicted()
    }

    /// Apply every option present in `config`, or none of them if any is
    /// invalid.
    pub fn apply_config(&self, config: &PastConfig) -> Result<(), ConfigError> {
        let capacity = config.capacity()?;
        if let Some(level) = config.store_threshold {
            self.set_store_threshold(level);
        }
        if let Some(level) = config.emit_threshold {
            self.set_emit_threshold(level);
        }
        if let Some(capacity) = capacity {
            self.set_capacity(capacity);
        }
        Ok(())
    }

    pub fn add_handler(&self, handler: Arc<dyn Handler>) {
        self.node
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Detach `handler` (compared by identity). Returns whether it was
    /// attached.
    pub fn remove_handler(&self, handler: &Arc<dyn Handler>) -> bool {
        let mut handlers = self
            .node
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|h| !same_handler(h, handler));
        handlers.len() != before
    }

    pub fn handlers(&self) -> Vec<Arc<dyn Handler>> {
        self.node.handlers()
    }

    /// Whether a record from this logger would reach any handler.
    pub fn has_handlers(&self) -> bool {
        let mut current = Some(Arc::clone(&self.node));
        while let Some(node) = current {
            if !node.handlers().is_empty() {
                return true;
            }
            if !node.settings().propagate {
                break;
            }
            current = node.parent();
        }
        false
    }

    /// When `false`, records stop at this logger's handlers instead of
    /// continuing to its ancestors'.
    pub fn set_propagate(&self, propagate: bool) {
        self.node.settings_mut().propagate = propagate;
    }

    pub fn propagate(&self) -> bool {
        self.node.settings().propagate
    }

    /// Whether a call at `level` would be kept (buffered or emitted).
    pub fn is_enabled_for(&self, level: Level) -> bool {
        !self.node.state.is_disabled(level)
            && gate::decide(
                level,
                self.effective_store_threshold(),
                self.effective_emit_threshold(),
            ) != Decision::Drop
    }

    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>) -> Result<(), HandlerError> {
        self.log_record(Record::builder(level, message))
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) -> Result<(), HandlerError> {
        self.log_record(Record::builder(Level::Debug, message))
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) -> Result<(), HandlerError> {
        self.log_record(Record::builder(Level::Info, message))
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) -> Result<(), HandlerError> {
        self.log_record(Record::builder(Level::Warning, message))
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) -> Result<(), HandlerError> {
        self.log_record(Record::builder(Level::Error, message))
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) -> Result<(), HandlerError> {
        self.log_record(Record::builder(Level::Critical, message))
    }

    /// Log at `ERROR` with `err` and its source chain as exception info.
    #[track_caller]
    pub fn exception(
        &self,
        message: impl Into<String>,
        err: &(dyn Error + 'static),
    ) -> Result<(), HandlerError> {
        let mut text = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        self.log_record(Record::builder(Level::Error, message).exception(text))
    }

    /// Run one log call through the gate.
    ///
    /// Dropped records are discarded, buffered ones are queued, and an
    /// emitting record first replays the buffer oldest-first through
    /// [`Logger::handle`] and is then handled itself.
    ///
    /// **Errors**
    /// - The first [`HandlerError`] raised. A failing handler does not stop
    ///   delivery: every replayed record and this one still reach every
    ///   other handler, and the error is returned once all have run.
    #[track_caller]
    pub fn log_record(&self, mut builder: RecordBuilder) -> Result<(), HandlerError> {
        let level = builder.level;
        if self.node.state.is_disabled(level) {
            return Ok(());
        }
        let decision = gate::decide(
            level,
            self.effective_store_threshold(),
            self.effective_emit_threshold(),
        );
        if decision == Decision::Drop {
            return Ok(());
        }

        if builder.location.is_none() {
            builder.location = Some(SourceLocation::from(Location::caller()));
        }
        let record = builder.build(&self.node.name);

        if decision == Decision::Buffer {
            self.node.buffer.append(Buffered {
                origin: Arc::downgrade(&self.node),
                record,
            });
            return Ok(());
        }

        let past = self.node.buffer.drain();
        if !past.is_empty() {
            trace!(logger = %self.name(), replayed = past.len(), "flushing buffered records");
        }
        let mut first_err = None;
        for entry in past {
            // The origin only disappears when its hierarchy was dropped.
            if let Some(origin) = entry.origin.upgrade() {
                keep_first(&mut first_err, Logger::from_node(origin).handle(&entry.record));
            }
        }
        keep_first(&mut first_err, self.handle(&record));
        first_err.map_or(Ok(()), Err)
    }

    /// Deliver `record` to every handler on this logger and, while
    /// propagation is on, on each ancestor. Handlers whose level is above
    /// the record's are skipped.
    ///
    /// Every accepting handler runs even if an earlier one fails; the
    /// first failure is returned.
    pub fn handle(&self, record: &Record) -> Result<(), HandlerError> {
        let mut first_err = None;
        let mut found = 0usize;
        let mut current = Some(Arc::clone(&self.node));
        while let Some(node) = current {
            let handlers = node.handlers();
            found += handlers.len();
            for h in handlers {
                if record.level >= h.level() {
                    keep_first(&mut first_err, h.handle(record));
                }
            }
            if !node.settings().propagate {
                break;
            }
            current = node.parent();
        }
        if found == 0 && self.node.state.last_resort {
            keep_first(&mut first_err, handler::last_resort(record));
        }
        first_err.map_or(Ok(()), Err)
    }
}

fn keep_first(slot: &mut Option<HandlerError>, result: Result<(), HandlerError>) {
    if let Err(e) = result {
        slot.get_or_insert(e);
    }
}

fn same_handler(a: &Arc<dyn Handler>, b: &Arc<dyn Handler>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = self.node.settings();
        f.debug_struct("Logger")
            .field("name", &self.node.name)
            .field("store", &settings.store)
            .field("emit", &settings.emit)
            .field("propagate", &settings.propagate)
            .field("buffer", &self.node.buffer)
            .finish()
    }
}
