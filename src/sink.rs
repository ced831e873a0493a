use crate::error::HandlerError;
use crate::handler::Handler;
use crate::level::Level;
use crate::record::Record;
use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};

/// Asynchronous destination for [`Record`]s released by the engine.
///
/// Implementations transport records to a concrete backend (a database,
/// a message queue, a remote collector). [`SinkHandler`] calls `send`
/// from a background task and never awaits it on the logging thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single record to the underlying backend.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted by the backend.
    /// - `Err(..)` on backend failure. The batch is retried with backoff.
    async fn send(&self, record: &Record) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush anything the backend buffers itself. Default is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// A sink that simply drops all records.
///
/// Useful for measuring the overhead of the engine itself without any
/// external I/O.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn send(&self, _record: &Record) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Buffering and batching settings for [`SinkHandler`].
///
/// **Fields**
/// - `channel_buffer`: records queued before new ones are dropped.
/// - `batch_size`: records sent per batch.
/// - `flush_interval`: longest wait before a partial batch is sent.
/// - `retry_backoff`: first delay after a failed batch; doubles up to
///   ten seconds.
/// - `max_retries`: failed attempts before a batch is given up.
#[derive(Clone, Debug)]
pub struct SinkConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub retry_backoff: Duration,
    pub max_retries: u32,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            retry_backoff: Duration::from_millis(100),
            max_retries: 5,
        }
    }
}

/// [`Handler`] that hands records to a [`LogSink`] through a bounded
/// channel, so slow backends never block the thread that logged.
///
/// When the channel is full the record is dropped and counted rather than
/// failing the log call.
pub struct SinkHandler {
    level: Level,
    sender: mpsc::Sender<Record>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
    /// Delivered to the sink.
    pub sent_events: Arc<AtomicU64>,
}

impl SinkHandler {
    /// Create a handler and spawn the task that drains its channel into
    /// `sink`. Must be called from within a Tokio runtime.
    ///
    /// The task ends, after sending what is left and flushing the sink,
    /// once every clone of the handler's sender is gone, i.e. when the
    /// handler is dropped.
    pub fn new(sink: Arc<dyn LogSink>, config: SinkConfig) -> (Self, JoinHandle<()>) {
        // Enforce minimal thresholds to avoid degenerate configs.
        let buffer = config.channel_buffer.max(16);
        let batch_size = config.batch_size.max(1);
        let flush_interval = config.flush_interval.max(Duration::from_millis(10));
        let retry = Retry {
            backoff: config.retry_backoff,
            max_backoff: Duration::from_secs(10),
            max_retries: config.max_retries,
        };

        let (tx, mut rx) = mpsc::channel::<Record>(buffer);

        let enqueued_events = Arc::new(AtomicU64::new(0));
        let dropped_events = Arc::new(AtomicU64::new(0));
        let sent_events = Arc::new(AtomicU64::new(0));
        let sent_events_bg = Arc::clone(&sent_events);

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            // One deadline across iterations: arrivals must not push a
            // partial batch's send further out.
            let flush_timer = sleep(flush_interval);
            tokio::pin!(flush_timer);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(record) => {
                            batch.push(record);
                            if batch.len() >= batch_size {
                                send_batch(&*sink, &mut batch, &retry, &sent_events_bg).await;
                                flush_timer.as_mut().reset(Instant::now() + flush_interval);
                            }
                        }
                        None => {
                            if !batch.is_empty() {
                                send_batch(&*sink, &mut batch, &retry, &sent_events_bg).await;
                            }
                            if let Err(e) = sink.flush().await {
                                eprintln!("error flushing log sink: {}", e);
                            }
                            break;
                        }
                    },
                    () = &mut flush_timer => {
                        if !batch.is_empty() {
                            send_batch(&*sink, &mut batch, &retry, &sent_events_bg).await;
                        }
                        flush_timer.as_mut().reset(Instant::now() + flush_interval);
                    }
                }
            }
        });

        (
            Self {
                level: Level::NotSet,
                sender: tx,
                enqueued_events,
                dropped_events,
                sent_events,
            },
            handle,
        )
    }

    /// Only forward records at or above `level`.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl Handler for SinkHandler {
    fn level(&self) -> Level {
        self.level
    }

    fn handle(&self, record: &Record) -> Result<(), HandlerError> {
        match self.sender.try_send(record.clone()) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log sink channel full, dropping record");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(HandlerError::Closed),
        }
    }
}

struct Retry {
    backoff: Duration,
    max_backoff: Duration,
    max_retries: u32,
}

/// Send `batch` in order, retrying the whole batch from the first failed
/// record with exponential backoff. The batch is always empty afterwards.
async fn send_batch(sink: &dyn LogSink, batch: &mut Vec<Record>, retry: &Retry, sent: &AtomicU64) {
    let mut backoff = retry.backoff;
    let mut attempts = 0u32;
    let mut delivered = 0usize;

    loop {
        let mut failed = None;
        for record in &batch[delivered..] {
            match sink.send(record).await {
                Ok(()) => {
                    delivered += 1;
                    sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    failed = Some(e);
                    break;
                }
            }
        }

        let Some(err) = failed else {
            batch.clear();
            return;
        };

        attempts += 1;
        if attempts > retry.max_retries {
            eprintln!(
                "log sink send failed after {} attempts, dropping {} records: {}",
                attempts,
                batch.len() - delivered,
                err
            );
            batch.clear();
            return;
        }

        eprintln!("log sink send failed, retrying in {:?}", backoff);
        sleep(backoff).await;
        backoff = std::cmp::min(backoff * 2, retry.max_backoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Hierarchy;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectSink {
        records: Mutex<Vec<String>>,
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl LogSink for CollectSink {
        async fn send(&self, record: &Record) -> Result<(), Box<dyn Error + Send + Sync>> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err("backend unavailable".into());
            }
            self.records.lock().unwrap().push(record.message());
            Ok(())
        }
    }

    fn fast_config() -> SinkConfig {
        SinkConfig {
            flush_interval: Duration::from_millis(10),
            retry_backoff: Duration::from_millis(1),
            ..SinkConfig::default()
        }
    }

    #[tokio::test]
    async fn replayed_history_reaches_sink_in_order() {
        let sink = Arc::new(CollectSink::default());
        let (handler, task) = SinkHandler::new(sink.clone(), fast_config());
        let handler: Arc<dyn Handler> = Arc::new(handler);

        let hierarchy = Hierarchy::default();
        let logger = hierarchy.get_logger("worker");
        logger.add_handler(Arc::clone(&handler));

        logger.debug("loading job").unwrap();
        logger.info("job started").unwrap();
        logger.error("job failed").unwrap();

        assert!(logger.remove_handler(&handler));
        drop(handler);
        task.await.unwrap();

        assert_eq!(
            *sink.records.lock().unwrap(),
            vec!["loading job", "job started", "job failed"]
        );
    }

    #[tokio::test]
    async fn failed_batches_are_retried() {
        let sink = Arc::new(CollectSink {
            failures_left: AtomicU32::new(2),
            ..CollectSink::default()
        });
        let (handler, task) = SinkHandler::new(sink.clone(), fast_config());
        let record = Record::builder(Level::Error, "boom").build("root");
        handler.handle(&record).unwrap();
        let sent = Arc::clone(&handler.sent_events);
        drop(handler);
        task.await.unwrap();

        assert_eq!(*sink.records.lock().unwrap(), vec!["boom"]);
        assert_eq!(sent.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn batch_is_dropped_after_max_retries() {
        let sink = Arc::new(CollectSink {
            failures_left: AtomicU32::new(100),
            ..CollectSink::default()
        });
        let config = SinkConfig {
            max_retries: 2,
            ..fast_config()
        };
        let (handler, task) = SinkHandler::new(sink.clone(), config);
        handler
            .handle(&Record::builder(Level::Error, "lost").build("root"))
            .unwrap();
        drop(handler);
        task.await.unwrap();

        assert!(sink.records.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn partial_batches_go_out_while_records_keep_arriving() {
        let sink = Arc::new(CollectSink::default());
        let config = SinkConfig {
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            ..SinkConfig::default()
        };
        let (handler, task) = SinkHandler::new(sink.clone(), config);

        for i in 0..20 {
            handler
                .handle(&Record::builder(Level::Info, format!("tick {i}")).build("clock"))
                .unwrap();
            sleep(Duration::from_millis(500)).await;
        }
        sleep(Duration::from_millis(1500)).await;

        // Still attached: only the timer can have sent these.
        assert_eq!(sink.records.lock().unwrap().len(), 20);
        drop(handler);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn respects_handler_level() {
        let (handler, task) = SinkHandler::new(Arc::new(NoopSink), fast_config());
        let handler = handler.with_level(Level::Error);
        assert_eq!(handler.level(), Level::Error);
        drop(handler);
        task.await.unwrap();
    }
}
