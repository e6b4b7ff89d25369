//! The CLI surface (§6): argument parsing, subcommand dispatch, terminal
//! reporting, and pack-root resolution layered over the library crate.

pub mod args;
pub mod commands;
pub mod eula;
pub mod logging;
pub mod reporters;

use std::path::PathBuf;

/// Resolves the pack root a run should operate on, in priority order: the
/// explicit `-R/--pack-root` flag, then `CMSIS_PACK_ROOT`, then walking up
/// from the current directory looking for an already-initialized root, then
/// `CPACKGET_DEFAULT_MODE_PATH` (§B.3).
pub fn resolve_pack_root(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
	if let Some(root) = flag {
		return Ok(root);
	}
	if let Ok(root) = std::env::var(cpackget::PACK_ROOT_ENV) {
		return Ok(PathBuf::from(root));
	}

	let cwd = std::env::current_dir()?;
	if let Some(root) = cpackget::layout::discover(&cwd) {
		return Ok(root);
	}

	if let Ok(root) = std::env::var(cpackget::DEFAULT_MODE_PATH_ENV) {
		return Ok(PathBuf::from(root));
	}

	anyhow::bail!(
		"no pack root given, no {} set, and none found by walking up from {}; pass -R/--pack-root or run `cpackget init`",
		cpackget::PACK_ROOT_ENV,
		cwd.display()
	)
}

/// Prints an error and its full chain of sources, one `caused by:` line per
/// source.
pub fn display_err(err: &anyhow::Error) {
	use colored::Colorize as _;
	eprintln!("{} {err}", "error:".red().bold());
	for cause in err.chain().skip(1) {
		eprintln!("  {} {cause}", "caused by:".dimmed());
	}
}
