//! Earshot daemon.

use anyhow::{Context, Result};
use time::UtcOffset;

use earshot::config::Config;
use earshot::daemon;
use earshot::types::timestamp;

fn main() -> Result<()> {
    // Must be read before the runtime spawns its worker threads.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    earshot::tracing::init(offset);
    timestamp::set_local_offset(offset);

    let config = Config::from_env().context("invalid configuration")?;

    tokio::runtime::Runtime::new()
        .context("failed to start the async runtime")?
        .block_on(daemon::run(config))
}
