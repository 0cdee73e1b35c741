use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const CRATES: &[&str] = &["bankpost_core", "bankpost_ingest", "bankpost_ledger", "bankpost_cli"];

/// Console logging on stderr. `RUST_LOG` is honoured; `--debug`/`--verbose`
/// raise the workspace crates on top of it.
pub fn init_logging(debug: bool, verbose: bool) -> Result<()> {
    let level = if verbose {
        "trace"
    } else if debug {
        "debug"
    } else {
        "info"
    };

    let from_env = std::env::var_os("RUST_LOG").is_some();
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if debug || verbose || !from_env {
        for krate in CRATES {
            filter = filter.add_directive(format!("{krate}={level}").parse()?);
        }
    }

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(debug || verbose);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow!("init logging: {e}"))
}
