//! Terminal and machine-readable progress reporters (§A.4).
//!
//! [`HumanReporter`] pairs an `indicatif::MultiProgress` root spinner with
//! one child bar per in-flight download. [`MachineReporter`] answers
//! `-E/--encoded-progress` with line-oriented output instead, for scripts
//! that parse `cpackget`'s progress rather than display it.

use std::sync::{atomic::AtomicU64, atomic::Ordering, Arc};
use std::time::Duration;

use cpackget::reporters::{DownloadProgressReporter, InstallReporter};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const TICK_CHARS: &str = "⣷⣯⣟⡿⢿⣻⣽⣾";

fn root_style() -> ProgressStyle {
	ProgressStyle::with_template("{msg:>10.yellow} {spinner} [{elapsed_precise}]").unwrap().tick_chars(TICK_CHARS)
}

fn child_style_with_total() -> ProgressStyle {
	ProgressStyle::with_template("{msg:.dim} {bar:20} {bytes}/{total_bytes}").unwrap()
}

fn child_style_without_total() -> ProgressStyle {
	ProgressStyle::with_template("{msg:.dim} {bytes}").unwrap()
}

/// Renders an `indicatif` terminal UI: one spinner for the current stage,
/// one bar per concurrent download.
pub struct HumanReporter {
	multi_progress: MultiProgress,
	root_progress: ProgressBar,
}

impl Default for HumanReporter {
	fn default() -> Self {
		let multi_progress = MultiProgress::new();
		let root_progress = multi_progress.add(ProgressBar::new(0));
		root_progress.set_style(root_style());
		root_progress.enable_steady_tick(Duration::from_millis(100));
		Self { multi_progress, root_progress }
	}
}

impl InstallReporter for HumanReporter {
	fn stage_started(&self, stage: &str) {
		self.root_progress.set_message(stage.to_string());
	}

	fn stage_finished(&self, _stage: &str) {
		self.root_progress.set_message(String::new());
	}

	fn download_reporter(&self, pack: &str) -> Arc<dyn DownloadProgressReporter> {
		self.root_progress.inc_length(1);

		let progress = self.multi_progress.add(ProgressBar::new(0));
		progress.set_style(child_style_without_total());
		progress.set_message(format!("- {pack}"));

		Arc::new(HumanDownloadProgressReporter { multi_progress: self.multi_progress.clone(), root_progress: self.root_progress.clone(), progress })
	}
}

struct HumanDownloadProgressReporter {
	multi_progress: MultiProgress,
	root_progress: ProgressBar,
	progress: ProgressBar,
}

impl DownloadProgressReporter for HumanDownloadProgressReporter {
	fn set_total(&self, bytes: u64) {
		self.progress.set_length(bytes);
		if bytes > 0 {
			self.progress.set_style(child_style_with_total());
		}
	}

	fn add_progress(&self, bytes: u64) {
		self.progress.inc(bytes);
	}

	fn finish(&self) {
		self.progress.finish_and_clear();
		self.multi_progress.remove(&self.progress);
		self.root_progress.inc(1);
	}
}

/// Emits one line per event for `-E/--encoded-progress`, instead of drawing
/// a terminal UI over them.
#[derive(Default)]
pub struct MachineReporter;

impl InstallReporter for MachineReporter {
	fn stage_started(&self, stage: &str) {
		println!("stage-started {stage}");
	}

	fn stage_finished(&self, stage: &str) {
		println!("stage-finished {stage}");
	}

	fn download_reporter(&self, pack: &str) -> Arc<dyn DownloadProgressReporter> {
		println!("download-started {pack}");
		Arc::new(MachineDownloadProgressReporter { name: pack.to_string(), total: AtomicU64::new(0), received: AtomicU64::new(0) })
	}
}

struct MachineDownloadProgressReporter {
	name: String,
	total: AtomicU64,
	received: AtomicU64,
}

impl DownloadProgressReporter for MachineDownloadProgressReporter {
	fn set_total(&self, bytes: u64) {
		self.total.store(bytes, Ordering::Relaxed);
		println!("download-total {} {bytes}", self.name);
	}

	fn add_progress(&self, bytes: u64) {
		let received = self.received.fetch_add(bytes, Ordering::Relaxed) + bytes;
		println!("download-progress {} {received}/{}", self.name, self.total.load(Ordering::Relaxed));
	}

	fn finish(&self) {
		println!("download-finished {}", self.name);
	}
}
