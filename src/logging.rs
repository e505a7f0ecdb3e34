use anyhow::Context as _;

/// Directives used when `RUST_LOG` is unset. The DevTools connection logs
/// every event it cannot decode at error level, which newer Chromium builds
/// trigger constantly.
const DEFAULT_FILTER: &str = "info,chromiumoxide::conn=off";

/// Installs the stderr subscriber. Stdout is reserved for scraped JSON.
pub fn init() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
