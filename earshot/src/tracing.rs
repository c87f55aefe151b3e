//! Logging setup and the crate-wide tracing prelude.
//!
//! Modules pull the macros in with `use crate::tracing::prelude::*` so
//! the facade can be swapped in one place.

use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod prelude {
    pub use tracing::{debug, error, info, trace, warn};
}

/// Install the global subscriber.
///
/// Under systemd (`JOURNAL_STREAM` set) events go straight to the
/// journal, which records its own timestamps. Everywhere else they are
/// written to stdout stamped in `offset`, which the caller reads before
/// any threads exist. `RUST_LOG` overrides the default `info` filter in
/// both cases.
pub fn init(offset: UtcOffset) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if std::env::var_os("JOURNAL_STREAM").is_some() {
        match tracing_journald::layer() {
            Ok(journald) => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(journald.with_syslog_identifier("earshotd".into()))
                    .init();
                return;
            }
            Err(e) => eprintln!("journald unavailable ({e}), logging to stdout"),
        }
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_timer(fmt::time::OffsetTime::new(offset, Rfc3339)))
        .init();
}
