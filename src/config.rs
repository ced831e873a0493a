use crate::buffer::Capacity;
use crate::error::ConfigError;
use crate::level::Level;
use serde::Deserialize;

/// Capacity given to every new logger's buffer unless configured otherwise.
pub const DEFAULT_MAX_BUFFERED: usize = 1000;

/// Per-logger options, typically loaded from a config file or the
/// environment. Absent fields leave the logger's current setting alone.
///
/// **Fields**
/// - `store_threshold`: records below it are dropped outright.
/// - `emit_threshold`: records at or above it flush the buffer and emit.
/// - `max_buffered`: buffer bound, `-1` for unbounded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PastConfig {
    pub store_threshold: Option<Level>,
    pub emit_threshold: Option<Level>,
    pub max_buffered: Option<i64>,
}

impl PastConfig {
    /// Checked form of `max_buffered`.
    pub fn capacity(&self) -> Result<Option<Capacity>, ConfigError> {
        self.max_buffered.map(Capacity::try_from).transpose()
    }
}

/// Where buffered records live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferMode {
    /// Each logger owns its buffer; an emit on one logger replays only
    /// that logger's history.
    #[default]
    PerLogger,
    /// One buffer for the whole hierarchy; an emit on any logger replays
    /// everything buffered anywhere, each record through the handlers of
    /// the logger that produced it.
    Shared,
}

/// Settings fixed when a [`Hierarchy`](crate::hierarchy::Hierarchy) is
/// created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HierarchyConfig {
    pub root_store_threshold: Level,
    pub root_emit_threshold: Level,
    pub default_max_buffered: Capacity,
    pub buffer_mode: BufferMode,
    /// Send warnings that reach no handler to stderr.
    pub last_resort: bool,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            root_store_threshold: Level::Debug,
            root_emit_threshold: Level::Warning,
            default_max_buffered: Capacity::Bounded(DEFAULT_MAX_BUFFERED),
            buffer_mode: BufferMode::PerLogger,
            last_resort: true,
        }
    }
}
