use time::format_description;
use tracing_subscriber::{fmt, EnvFilter, FmtSubscriber};

// Sets up tracing. Goes to stderr, filtered by the TRACE env var,
// and is off when TRACE is unset.
// Levels are: trace, debug, info, warn, error
//
// EnvFilter examples:
//
// All targets, info level:                  info
// Holdings replay at trace level:           portan::portfolio::bookkeeping=trace
// Global at info, fx lookups at debug:      info,portan::fx=debug
//
// More generally: target[span{field=value}]=level
// https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
pub fn setup_tracing() {
    let Ok(time_format) =
        format_description::parse("[hour]:[minute]:[second].[subsecond digits:5]")
    else {
        return;
    };

    let time_offset =
        crate::util::date::local_utc_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = fmt::time::OffsetTime::new(time_offset, time_format);

    let subscriber = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_env("TRACE"))
        .with_timer(timer)
        .finish();

    // Fails if already set (eg. by another test in the same process).
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Appends `filter` to the TRACE env var, so that a later setup_tracing
/// call picks it up.
pub fn enable_trace_env(filter: &str) {
    const VAR_NAME: &str = "TRACE";
    if let Ok(existing_env) = std::env::var(VAR_NAME) {
        std::env::set_var(VAR_NAME, existing_env + "," + filter);
    } else {
        std::env::set_var(VAR_NAME, filter);
    }
}
