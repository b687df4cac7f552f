//! Tracing subscriber setup.

/// Overrides the configured level, e.g. `SIGNALDESK_LOG=signaldesk_runner=debug`.
pub const LOG_ENV: &str = "SIGNALDESK_LOG";

/// `log_format` is `json` or anything else for human-readable output.
pub fn init_tracing(log_level: &str, log_format: &str) -> Result<(), String> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    // Logs go to stderr so command output stays pipeable.
    if log_format.trim().eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
