use crate::core::Core;
use crate::entry::Entry;
use crate::field::Field;
use chrono::Local;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field as TracingField, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Event field that overrides the entry category. `category = "trace"`
/// marks correlation events.
pub const CATEGORY_FIELD: &str = "category";

const INTERNAL_TARGET: &str = env!("CARGO_CRATE_NAME");

/// `tracing_subscriber` layer that turns events into [`Entry`]s and feeds
/// them through a [`Core`].
///
/// Events emitted by this crate itself are skipped so mirror diagnostics
/// never loop back into the mirror.
pub struct CoreLayer {
    core: Arc<dyn Core>,
    /// Events offered to the core (after internal filtering).
    pub total_events: Arc<AtomicU64>,
    /// Events the core failed to write.
    pub failed_events: Arc<AtomicU64>,
}

impl CoreLayer {
    pub fn new(core: Arc<dyn Core>) -> Self {
        CoreLayer {
            core,
            total_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for CoreLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with(INTERNAL_TARGET) {
            return;
        }
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let level = (*meta.level()).into();
        if !self.core.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let caller = match (meta.file(), meta.line()) {
            (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
            (Some(file), None) => Some(file.to_string()),
            _ => None,
        };
        let entry = Entry {
            level,
            time: Local::now(),
            logger_name: visitor.category.unwrap_or_else(|| meta.target().to_string()),
            message: visitor.message.unwrap_or_default(),
            caller,
        };

        if let Some(ce) = self.core.check(&entry, None) {
            if let Err(e) = ce.write(&visitor.fields) {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("failed to write log entry: {}", e);
            }
        }
    }
}

#[derive(Default)]
pub struct FieldVisitor {
    pub fields: Vec<Field>,
    pub message: Option<String>,
    pub category: Option<String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &TracingField, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            CATEGORY_FIELD => self.category = Some(value.to_string()),
            name => self.fields.push(Field::new(name, value)),
        }
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.fields.push(Field::new(field.name(), value));
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.fields.push(Field::new(field.name(), value));
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.fields.push(Field::new(field.name(), value));
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn std::fmt::Debug) {
        let rendered = format!("{:?}", value);
        match field.name() {
            "message" => self.message = Some(rendered),
            CATEGORY_FIELD => self.category = Some(rendered),
            name => self.fields.push(Field::new(name, rendered)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::TabEncoder;
    use crate::core::IoCore;
    use crate::level::Level;
    use crate::sink::WriteSyncer;
    use parking_lot::Mutex;
    use std::io;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[derive(Default)]
    struct Captured(Mutex<Vec<String>>);

    impl WriteSyncer for Captured {
        fn write(&self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().push(String::from_utf8_lossy(buf).into_owned());
            Ok(buf.len())
        }
    }

    #[test]
    fn events_reach_the_core() {
        let sink = Arc::new(Captured::default());
        let core = IoCore::new(Arc::new(TabEncoder), sink.clone(), Arc::new(Level::Info));
        let layer = CoreLayer::new(Arc::new(core));
        let failed = Arc::clone(&layer.failed_events);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "app", "filtered out");
            tracing::info!(target: "app", category = "trace", "{{\"uid\":7}}");
            tracing::error!(target: "app", attempt = 3, "payment failed");
        });

        let lines = sink.0.lock().clone();
        assert_eq!(lines.len(), 2);

        let columns: Vec<&str> = lines[0].trim_end().split('\t').collect();
        assert_eq!(columns[1], "INFO");
        assert_eq!(columns[3], "trace");
        assert_eq!(columns[4], "{\"uid\":7}");

        let columns: Vec<&str> = lines[1].trim_end().split('\t').collect();
        assert_eq!(columns[1], "ERROR");
        assert_eq!(columns[3], "app");
        assert_eq!(columns[4], "payment failed");
        assert_eq!(columns[5], "{\"attempt\":3}");
        assert_eq!(failed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn internal_events_are_skipped() {
        let sink = Arc::new(Captured::default());
        let core = IoCore::new(Arc::new(TabEncoder), sink.clone(), Arc::new(Level::Debug));
        let subscriber = Registry::default().with(CoreLayer::new(Arc::new(core)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "log_core_mirror::mirror", "dropping mirrored log document");
        });

        assert!(sink.0.lock().is_empty());
    }
}
