use crate::error::InitError;
use crate::hierarchy::Hierarchy;
use crate::layer::PastLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Options for the global subscriber installed by
/// [`init_tracing_with_config`].
///
/// **Fields**
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked next to [`PastLayer`], so every event (including this
///   crate's own diagnostics) is also printed immediately.
#[derive(Clone, Debug, Default)]
pub struct LayerConfig {
    pub enable_stdout: bool,
}

/// Install a global `tracing` subscriber that feeds every event into
/// `hierarchy`.
///
/// **Parameters**
/// - `hierarchy`: loggers (and their handlers) that receive the events.
/// - `config`: [`LayerConfig`] selecting additional layers.
///
/// **Errors**
/// - [`InitError::SetGlobalDefault`] if a global subscriber is already set.
pub fn init_tracing_with_config(hierarchy: &Hierarchy, config: LayerConfig) -> Result<(), InitError> {
    let layer = PastLayer::new(hierarchy.clone());

    // The two stacks have different types, hence the two branches.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Equivalent to [`init_tracing_with_config`] with
/// [`LayerConfig::default`]: only the hierarchy's handlers see events.
pub fn init_tracing(hierarchy: &Hierarchy) -> Result<(), InitError> {
    init_tracing_with_config(hierarchy, LayerConfig::default())
}
