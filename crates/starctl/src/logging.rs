//! Logging setup for the operator CLI.
//!
//! Diagnostics go to stderr so the ASCII progress lines own stdout. The
//! default filter scopes `--log.level` to stardeck's own crates and pins
//! dependencies at `warn`: a chatty driver cannot drown out the
//! pipeline's own events.

/// Crates whose events follow `--log.level`.
const STARDECK_CRATES: &[&str] = &[
    "starctl",
    "orchestrator",
    "scaffold",
    "engines",
    "catalog",
    "manifest",
    "warehouse",
];

#[derive(Debug, clap::Args)]
pub struct LogArgs {
    /// Verbosity of stardeck's own crates: trace|debug|info|warn|error|off.
    /// Dependencies stay at warn.
    #[arg(long = "log.level", default_value = "info", global = true)]
    pub level: String,

    /// Raw tracing filter directives, replacing --log.level entirely.
    #[arg(long = "log.filter", env = "STARDECK_LOG", global = true)]
    pub filter: Option<String>,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long = "log.json", global = true)]
    pub json: bool,
}

impl LogArgs {
    fn directives(&self) -> String {
        if let Some(filter) = &self.filter {
            return filter.clone();
        }
        let mut out = String::from("warn");
        for name in STARDECK_CRATES {
            out.push_str(&format!(",{name}={}", self.level));
        }
        out
    }
}

/// Initializes logging. Panics if called twice.
pub fn init_logging(args: &LogArgs) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(args.directives())
        .with_target(true);

    if args.json {
        builder.json().flatten_event(true).init();
    } else {
        // Colors only on interactive terminals; redirected stderr stays
        // plain ASCII.
        builder
            .compact()
            .with_ansi(atty::is(atty::Stream::Stderr))
            .init();
    }
}
