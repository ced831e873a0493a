use std::sync::Arc;

use past_log::init::init_tracing;
use past_log::{Hierarchy, Level, WriterHandler};
use tracing::{debug, error, info};

fn main() {
    let hierarchy = Hierarchy::default();
    hierarchy.root().add_handler(Arc::new(WriterHandler::stderr()));
    hierarchy.get_logger("auth").set_emit_threshold(Level::Error);
    init_tracing(&hierarchy).unwrap();

    debug!(target: "auth", user_id = 42, "looking up user");
    info!(target: "auth", "password hash loaded");
    info!(target: "billing", "nothing printed for this one");

    error!(
        target: "auth",
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );
}
