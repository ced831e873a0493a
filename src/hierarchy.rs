use crate::buffer::PastBuffer;
use crate::config::{BufferMode, HierarchyConfig, PastConfig};
use crate::error::{ConfigError, HandlerError};
use crate::handler::WriterHandler;
use crate::level::Level;
use crate::logger::{HierarchyState, Logger, LoggerNode, RecordBuffer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Name of the logger at the top of every hierarchy.
pub const ROOT_NAME: &str = "root";

/// Separator between the levels of a logger name.
pub const DELIMITER: char = '.';

/// A tree of named loggers rooted at [`ROOT_NAME`].
///
/// Each distinct dotted name maps to exactly one [`Logger`] for the
/// lifetime of the hierarchy. Hierarchies are independent of each other:
/// an application normally builds one at startup and passes it around,
/// while tests can build as many as they like.
#[derive(Clone)]
pub struct Hierarchy {
    inner: Arc<Registry>,
}

struct Registry {
    config: HierarchyConfig,
    root: Logger,
    loggers: RwLock<HashMap<String, Logger>>,
    state: Arc<HierarchyState>,
    /// Present only in [`BufferMode::Shared`].
    shared_buffer: Option<Arc<RecordBuffer>>,
}

impl Hierarchy {
    pub fn new(config: HierarchyConfig) -> Self {
        let state = Arc::new(HierarchyState {
            disabled: AtomicU8::new(0),
            last_resort: config.last_resort,
            fallback_store: config.root_store_threshold,
            fallback_emit: config.root_emit_threshold,
        });
        let shared_buffer = match config.buffer_mode {
            BufferMode::Shared => Some(Arc::new(PastBuffer::new(config.default_max_buffered))),
            BufferMode::PerLogger => None,
        };
        let root_buffer = shared_buffer
            .clone()
            .unwrap_or_else(|| Arc::new(PastBuffer::new(config.default_max_buffered)));
        let root = Logger::from_node(Arc::new(LoggerNode::root(
            config.root_store_threshold,
            config.root_emit_threshold,
            root_buffer,
            Arc::clone(&state),
        )));

        let mut loggers = HashMap::new();
        loggers.insert(ROOT_NAME.to_string(), root.clone());

        Hierarchy {
            inner: Arc::new(Registry {
                config,
                root,
                loggers: RwLock::new(loggers),
                state,
                shared_buffer,
            }),
        }
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.inner.config
    }

    pub fn root(&self) -> Logger {
        self.inner.root.clone()
    }

    /// Return the logger called `name`, creating it and any missing
    /// ancestors first. An empty name or [`ROOT_NAME`] yields the root.
    ///
    /// New loggers inherit both thresholds until they are set and start
    /// with the hierarchy's default buffer capacity.
    pub fn get_logger(&self, name: &str) -> Logger {
        if name.is_empty() || name == ROOT_NAME {
            return self.root();
        }
        if let Some(found) = self
            .inner
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return found.clone();
        }

        let mut loggers = self
            .inner
            .loggers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut parent = self.inner.root.clone();
        let ends = name
            .match_indices(DELIMITER)
            .map(|(i, _)| i)
            .chain(std::iter::once(name.len()));
        for end in ends {
            let prefix = &name[..end];
            if prefix.is_empty() {
                continue;
            }
            parent = match loggers.get(prefix) {
                Some(existing) => existing.clone(),
                None => {
                    let created = Logger::from_node(Arc::new(LoggerNode::child(
                        prefix.to_string(),
                        parent.node(),
                        self.new_buffer(),
                        Arc::clone(&self.inner.state),
                    )));
                    loggers.insert(prefix.to_string(), created.clone());
                    debug!(logger = prefix, "logger created");
                    created
                }
            };
        }
        parent
    }

    fn new_buffer(&self) -> Arc<RecordBuffer> {
        match &self.inner.shared_buffer {
            Some(shared) => Arc::clone(shared),
            None => Arc::new(PastBuffer::new(self.inner.config.default_max_buffered)),
        }
    }

    /// Drop every call at or below `level` across the whole hierarchy,
    /// whatever the loggers' thresholds. [`Level::NotSet`] lifts it.
    pub fn disable(&self, level: Level) {
        // Every level value fits in a u8.
        self.inner
            .state
            .disabled
            .store(level.value() as u8, Ordering::Relaxed);
        debug!(%level, "hierarchy disabled at or below level");
    }

    pub fn disabled(&self) -> Level {
        Level::from_u8(self.inner.state.disabled.load(Ordering::Relaxed))
    }

    /// Configure the root from `config` and, if it has no handler yet,
    /// give it one that writes to stderr.
    pub fn basic_config(&self, config: &PastConfig) -> Result<(), ConfigError> {
        let root = self.root();
        root.apply_config(config)?;
        if root.handlers().is_empty() {
            root.add_handler(Arc::new(WriterHandler::stderr()));
        }
        Ok(())
    }

    /// Flush every handler attached anywhere in the hierarchy, e.g. before
    /// shutdown. Returns the first failure after trying them all.
    pub fn flush_handlers(&self) -> Result<(), HandlerError> {
        let mut first_err = None;
        for logger in self.loggers() {
            for handler in logger.handlers() {
                if let Err(e) = handler.flush() {
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Empty the buffer of every logger.
    pub fn reset_all(&self) {
        for logger in self.loggers() {
            logger.reset();
        }
    }

    pub fn loggers(&self) -> Vec<Logger> {
        self.inner
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Names of every logger created so far, sorted.
    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for Hierarchy {
    fn default() -> Self {
        Hierarchy::new(HierarchyConfig::default())
    }
}
