use std::sync::Arc;
use std::time::Instant;

use past_log::sink::{NoopSink, SinkConfig, SinkHandler};
use past_log::Hierarchy;

#[tokio::main]
async fn main() {
    let hierarchy = Hierarchy::default();
    let (handler, task) = SinkHandler::new(Arc::new(NoopSink), SinkConfig::default());
    let handler = Arc::new(handler);
    let dropped = Arc::clone(&handler.dropped_events);
    let logger = hierarchy.get_logger("load");
    logger.add_handler(handler.clone());

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        logger.debug(format!("iteration {i}")).unwrap();
        if i % 100 == 99 {
            logger.error(format!("iteration {i} failed")).unwrap();
        }
    }

    let elapsed = start.elapsed();
    println!("default config: logged {} records in {:?} (~{:.0} rec/s), {} dropped at the channel",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        dropped.load(std::sync::atomic::Ordering::Relaxed)
    );

    // Dropping every owner of the handler lets the background task drain
    // and exit.
    hierarchy.reset_all();
    drop(logger);
    drop(hierarchy);
    drop(handler);
    task.await.unwrap();
}
