//! Provide tracing, tailored to this crate.
//!
//! The library itself only emits events (see [`crate::observer`]); a
//! binary hosting streams should call [`init_journald_or_stdout`] once at
//! startup to install a subscriber.
//!
//! The rest of the crate includes `use crate::tracing::prelude::*` for
//! the `trace!()`, `debug!()`, `info!()`, `warn!()`, and `error!()`
//! macros.

use std::env;
use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Initialize logging.
///
/// Under systemd (detected through `JOURNAL_STREAM`) events go to the
/// journal; otherwise they are printed to stdout.
pub fn init_journald_or_stdout() {
    if env::var("JOURNAL_STREAM").is_ok() {
        match tracing_journald::layer() {
            Ok(layer) => {
                tracing_subscriber::registry()
                    .with(env_filter())
                    .with(layer.with_syslog_identifier("mqtt-io-stream".into()))
                    .init();
            }
            Err(e) => {
                use_stdout();
                error!("Failed to initialize journald logging ({e}), using stdout.");
            }
        }
    } else {
        use_stdout();
    }
}

// Filter according to RUST_LOG, defaulting to INFO. Frame-level detail
// is available with RUST_LOG=mqtt_io_stream=trace.
fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy()
}

fn use_stdout() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_timer(LocalTimer))
        .init();
}

// Local time to the millisecond, which is enough to line up polls and
// writes without the noise of full RFC 3339 UTC stamps.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let stamp = now
            .format(time::macros::format_description!(
                "[hour]:[minute]:[second].[subsecond digits:3]"
            ))
            .map_err(|_| std::fmt::Error)?;
        write!(w, "{stamp}")
    }
}
