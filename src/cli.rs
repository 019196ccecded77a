use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "trade-ingest", about)]
pub struct Cli {
    /// Path to the JSON config file (Symbols / Postgres / BatchSize).
    #[arg(long, default_value = "config.json")]
    pub config: String,

    /// Tokio worker threads
    #[arg(long, default_value_t = default_workers())]
    pub workers: usize,

    /// Log level filter (passed to tracing-subscriber's EnvFilter).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Validate config and database connectivity, then exit without
    /// subscribing to the upstream feed.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Bind address for the /metrics endpoint.
    #[arg(long, default_value = "0.0.0.0")]
    pub metrics_bind: String,

    /// Port for the /metrics endpoint.
    #[arg(long, default_value_t = 9898)]
    pub metrics_port: u16,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}
