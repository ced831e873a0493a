use crate::level::Level;

/// What happens to a record once its severity is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Below the store threshold: never kept, never emitted.
    Drop,
    /// Kept in the logger's buffer until something flushes it.
    Buffer,
    /// Flush the buffer, then emit this record.
    Emit,
}

/// Classify `level` against a store threshold (what is kept) and an emit
/// threshold (what is released).
///
/// When `store > emit` the records in between are dropped even though they
/// would otherwise emit; the store gate is always evaluated first.
pub fn decide(level: Level, store: Level, emit: Level) -> Decision {
    if level < store {
        Decision::Drop
    } else if level < emit {
        Decision::Buffer
    } else {
        Decision::Emit
    }
}
