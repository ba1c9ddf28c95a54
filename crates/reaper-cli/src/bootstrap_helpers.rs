use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Loads `.env` from the working directory when present. Real environment
/// variables always win.
pub(crate) fn load_dotenv() {
    if let Err(error) = dotenvy::dotenv() {
        if !error.not_found() {
            eprintln!("warning: failed to load .env: {error}");
        }
    }
}

/// Logs go to stderr so one-shot modes can print JSON reports on stdout.
pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
