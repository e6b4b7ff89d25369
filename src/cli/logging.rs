//! `tracing-subscriber` setup (§A.4): `-v` stacks into increasing verbosity,
//! `-E/--encoded-progress` drops ANSI styling in favor of plain, one-line
//! events a script can parse alongside the machine-readable progress lines.

use tracing_subscriber::EnvFilter;

/// Installs the process-wide subscriber. `verbosity` is the repeat count of
/// `-v` (0 = warnings only, 1 = info, 2 = debug, 3+ = trace).
pub fn init(verbosity: u8, machine_readable: bool) {
	let level = match verbosity {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("cpackget={level}")));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_ansi(!machine_readable)
		.with_target(false)
		.without_time()
		.init();
}
