//! Progress reporting for the stress client
//!
//! A background thread polls the shared counter and signals and renders a
//! single status line with indicatif. Strictly a read-only view: the
//! reporter never participates in coordination.

use crate::coord::SyncDir;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the status line refreshes
const UPDATE_INTERVAL: Duration = Duration::from_millis(300);

/// Live status line fed from the coordination directory
pub struct ProgressReporter {
    bar: ProgressBar,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Start the reporter thread for a running test.
    pub fn spawn(sync: SyncDir, max_files: u64) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread_bar = bar.clone();

        let handle = thread::spawn(move || {
            let counter = sync.counter();
            let stop_signal = sync.stop();
            let mut files = 0u64;

            while !thread_stop.load(Ordering::Relaxed) {
                if let Ok(value) = counter.value() {
                    files = value;
                }

                let phase = if stop_signal.is_set() {
                    "stopping"
                } else if files < max_files {
                    "creating"
                } else {
                    "churning"
                };

                thread_bar.set_message(format!(
                    "Files: {}/{} | Phase: {}",
                    format_number(files),
                    format_number(max_files),
                    phase,
                ));

                thread::sleep(UPDATE_INTERVAL);
            }
        });

        Self {
            bar,
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the reporter and clear the status line.
    pub fn finish(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.bar.finish_and_clear();
    }
}

/// Print the run header before the workload starts.
pub fn print_header(server: &str, export: &str, mounts: usize, workers: usize) {
    println!(
        "{} {} export {} ({} mount{}, {} workers)",
        style("[vfs-stress]").cyan().bold(),
        style(server).green(),
        style(export).green(),
        mounts,
        if mounts == 1 { "" } else { "s" },
        style(workers).yellow(),
    );
    println!();
}

/// Print the final summary after outcomes are collected.
pub fn print_summary(files_created: u64, max_files: u64, workers: usize, failures: usize) {
    println!();
    if failures == 0 {
        println!("{}", style("Test Complete").green().bold());
    } else {
        println!("{}", style("Test Failed").red().bold());
    }
    println!(
        "  Files created: {}/{}",
        style(format_number(files_created)).cyan(),
        format_number(max_files)
    );
    println!("  Workers: {}", style(workers).cyan());
    if failures > 0 {
        println!("  Failed workers: {}", style(failures).red());
    }
}

/// Format a number with thousands separators.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn test_reporter_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let sync = SyncDir::create(tmp.path().join("run")).unwrap();

        let reporter = ProgressReporter::spawn(sync, 100);
        std::thread::sleep(Duration::from_millis(50));
        reporter.finish();
    }
}
