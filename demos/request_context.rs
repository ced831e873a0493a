use std::sync::Arc;

use past_log::{Hierarchy, PastConfig, WriterHandler};

/// Each request starts with a reset, so a failure only replays the
/// debug lines of the request that failed.
fn serve(logger: &past_log::Logger, id: u32, fail: bool) -> Result<(), past_log::HandlerError> {
    logger.reset();
    logger.debug(format!("request {id}: parsing headers"))?;
    logger.info(format!("request {id}: user authenticated"))?;
    if fail {
        logger.error(format!("request {id}: database timeout"))?;
    }
    Ok(())
}

fn main() {
    let hierarchy = Hierarchy::default();
    let config = PastConfig::from_env().unwrap_or_else(|e| {
        eprintln!("ignoring environment: {e}");
        PastConfig::default()
    });
    hierarchy.root().apply_config(&config).unwrap();
    hierarchy.root().add_handler(Arc::new(WriterHandler::stderr()));

    let logger = hierarchy.get_logger("http.handler");
    for id in 1..=5 {
        serve(&logger, id, id == 4).unwrap();
    }
}
