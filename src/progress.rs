//! Progress reporting

use log::info;

/// A sink for integer percentages in `0..=100`.
pub trait Progress {
    fn report(&mut self, percent: u8);
}

impl<F: FnMut(u8)> Progress for F {
    fn report(&mut self, percent: u8) {
        self(percent)
    }
}

/// Discards every report.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _percent: u8) {}
}

/// Logs every report at the info level, prefixed with a label.
#[derive(Debug, Copy, Clone)]
pub struct LogProgress {
    label: &'static str,
}

impl LogProgress {
    pub fn new(label: &'static str) -> LogProgress {
        LogProgress { label }
    }
}

impl Progress for LogProgress {
    fn report(&mut self, percent: u8) {
        info!("{}: {}%", self.label, percent);
    }
}

/// Turns byte counts into percentages and only forwards values that changed.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    total: u64,
    last: Option<u8>,
}

impl ProgressTracker {
    pub fn new(total: u64) -> ProgressTracker {
        ProgressTracker { total, last: None }
    }

    /// Reports the percentage for `done` bytes unless it equals the previous report.
    pub fn update<P: Progress + ?Sized>(&mut self, done: u64, sink: &mut P) {
        let percent = if self.total == 0 {
            100
        } else {
            (u128::from(done.min(self.total)) * 100 / u128::from(self.total)) as u8
        };

        self.emit(percent, sink);
    }

    /// Reports completion, once.
    pub fn finish<P: Progress + ?Sized>(&mut self, sink: &mut P) {
        self.emit(100, sink);
    }

    fn emit<P: Progress + ?Sized>(&mut self, percent: u8, sink: &mut P) {
        if self.last != Some(percent) {
            self.last = Some(percent);
            sink.report(percent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_suppress_repeated_percentages() {
        let mut seen = Vec::new();
        let mut tracker = ProgressTracker::new(1000);

        for done in (0..=1000).step_by(3) {
            tracker.update(done, &mut |pct: u8| seen.push(pct));
        }
        tracker.finish(&mut |pct: u8| seen.push(pct));

        assert_eq!(seen.first(), Some(&0));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.iter().filter(|pct| **pct == 100).count(), 1);
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn it_should_report_completion_for_empty_totals() {
        let mut seen = Vec::new();
        let mut tracker = ProgressTracker::new(0);

        tracker.finish(&mut |pct: u8| seen.push(pct));

        assert_eq!(seen, vec![100]);
    }
}
