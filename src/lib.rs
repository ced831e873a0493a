//! Hierarchical loggers that hold back low-severity records and replay
//! them, in order, when something severe happens.
//!
//! Every [`Logger`] has two thresholds. Records below the *store*
//! threshold are dropped. Records between the two are kept in the
//! logger's bounded buffer. A record at or above the *emit* threshold
//! first replays the buffer through the handlers and is then handled
//! itself, so an error arrives together with the debug and info lines that
//! led up to it.
//!
//! ```
//! use past_log::{Hierarchy, MemoryHandler};
//! use std::sync::Arc;
//!
//! let hierarchy = Hierarchy::default();
//! let out = MemoryHandler::new();
//! let logger = hierarchy.get_logger("app.db");
//! logger.add_handler(Arc::new(out.clone()));
//!
//! logger.info("connecting").unwrap();
//! assert!(out.is_empty());
//! logger.error("connection refused").unwrap();
//! assert_eq!(out.messages(), vec!["connecting", "connection refused"]);
//! ```

pub mod buffer;
pub mod config;
pub mod env;
pub mod error;
pub mod gate;
pub mod handler;
pub mod hierarchy;
pub mod init;
pub mod layer;
pub mod level;
pub mod logger;
pub mod record;

#[cfg(feature = "sink")]
pub mod sink;

pub use buffer::Capacity;
pub use config::{BufferMode, HierarchyConfig, PastConfig};
pub use error::{ConfigError, HandlerError, InitError};
pub use handler::{Handler, MemoryHandler, WriterHandler};
pub use hierarchy::Hierarchy;
pub use level::Level;
pub use logger::Logger;
pub use record::{Record, RecordBuilder, SourceLocation};
