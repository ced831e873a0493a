use crate::hierarchy::{Hierarchy, DELIMITER};
use crate::level::Level;
use crate::record::{Record, SourceLocation, UNKNOWN_FILE, UNKNOWN_FUNCTION};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Events from this crate's own diagnostics carry this target or one of
/// its `::` submodules and are never fed back into the hierarchy.
const OWN_TARGET: &str = "past_log";

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// `tracing_subscriber` layer that routes every `tracing` event into a
/// [`Hierarchy`], so `tracing` macros get store/emit buffering.
///
/// The event target becomes the logger name with `::` turned into the
/// hierarchy delimiter (`app::db` logs through logger `app.db`).
pub struct PastLayer {
    hierarchy: Hierarchy,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Events whose delivery failed in a handler.
    pub failed_events: Arc<AtomicU64>,
}

impl PastLayer {
    pub fn new(hierarchy: Hierarchy) -> Self {
        Self {
            hierarchy,
            total_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }
}

/// `a::b::c` → `a.b.c`.
pub fn logger_name_for_target(target: &str) -> String {
    target.replace("::", &DELIMITER.to_string())
}

impl<S> Layer<S> for PastLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_own_target(meta.target()) {
            return;
        }
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let location = SourceLocation {
            file: meta.file().unwrap_or(UNKNOWN_FILE).to_string(),
            line: meta.line().unwrap_or(0),
            function: meta.module_path().unwrap_or(UNKNOWN_FUNCTION).to_string(),
        };

        let mut builder = Record::builder(Level::from(*meta.level()), message.unwrap_or_default())
            .location(location);
        for (name, value) in fields {
            builder = builder.field(name, value);
        }

        let logger = self.hierarchy.get_logger(&logger_name_for_target(meta.target()));
        if let Err(e) = logger.log_record(builder) {
            self.failed_events.fetch_add(1, Ordering::Relaxed);
            eprintln!("past_log handler failed for event from {}: {}", meta.target(), e);
        }
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // `message` arrives here for format-string events.
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
