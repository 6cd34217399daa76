//! Logging setup shared by the binary and integration tests.

/// Initialize logging with env_logger.
///
/// Respects RUST_LOG environment variable. Defaults to "info" level.
///
/// # Example
///
/// ```rust,ignore
/// setup_logging();
/// log::info!("Launcher starting...");
/// ```
pub fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Initialize logging for tests. Safe to call more than once.
pub fn setup_test_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
