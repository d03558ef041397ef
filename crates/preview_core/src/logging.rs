//! Debug-gated logging. Output is either fully on (`debug`) or fully off, switched at
//! runtime by the `debug` setting.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

fn filter_for(debug: bool) -> EnvFilter {
    EnvFilter::new(if debug { "debug" } else { "off" })
}

#[derive(Clone)]
pub struct LogGate {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogGate {
    /// Installs the global subscriber. Call once per process.
    pub fn install(debug: bool) -> anyhow::Result<Self> {
        let (filter, handle) = reload::Layer::new(filter_for(debug));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()?;
        Ok(Self { handle })
    }

    pub fn set_debug(&self, debug: bool) {
        if let Err(err) = self.handle.reload(filter_for(debug)) {
            eprintln!("failed to switch log level: {err}");
        }
    }
}
