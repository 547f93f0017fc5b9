//! Progress reporting for pipeline runs.
//!
//! Every unit of work is announced as `[index/total]` in the log; an
//! optional terminal progress bar mirrors the same counter.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

pub struct ProgressTracker {
    total: u64,
    current: u64,
    start_time: Instant,
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    pub fn new(total: u64, enable_bar: bool) -> Self {
        let bar = if enable_bar && total > 0 {
            let bar = ProgressBar::new(total);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                bar.set_style(style.progress_chars("#>-"));
            }
            Some(bar)
        } else {
            None
        };

        Self {
            total,
            current: 0,
            start_time: Instant::now(),
            bar,
        }
    }

    /// Announces the next unit and returns its 1-based index.
    pub fn start_unit(&mut self, label: &str) -> u64 {
        self.current += 1;
        info!("[{}/{}] {}", self.current, self.total, label);
        if let Some(ref bar) = self.bar {
            bar.set_message(label.to_string());
        }
        self.current
    }

    pub fn finish_unit(&self) {
        if let Some(ref bar) = self.bar {
            bar.set_position(self.current);
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Clears the bar and returns the total run duration.
    pub fn finish(&self) -> Duration {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
        self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_are_counted_from_one() {
        let mut tracker = ProgressTracker::new(3, false);
        assert_eq!(tracker.start_unit("users"), 1);
        tracker.finish_unit();
        assert_eq!(tracker.start_unit("orders"), 2);
        assert_eq!((tracker.current, tracker.total), (2, 3));
    }

    #[test]
    fn test_empty_run_has_no_bar() {
        let tracker = ProgressTracker::new(0, true);
        assert!(tracker.bar.is_none());
        let _ = tracker.finish();
    }
}
