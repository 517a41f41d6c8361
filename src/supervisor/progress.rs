use super::ToolContext;

/// Decides when to report progress over `total` discrete units.
///
/// A report is due whenever completion crosses a 10% boundary not yet
/// reported, and always on the final unit, which bounds a stream to about
/// ten events regardless of `total`. Reported values never decrease and the
/// last one equals `total`.
#[derive(Debug, Clone)]
pub struct ProgressMeter {
    total: u64,
    current: u64,
    last_decile: u64,
    finished: bool,
}

impl ProgressMeter {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            current: 0,
            last_decile: 0,
            finished: false,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Record `units` completed units. Returns the value to report, if any.
    pub fn advance(&mut self, units: u64) -> Option<u64> {
        if self.total == 0 || self.finished {
            return None;
        }
        self.current = self.current.saturating_add(units).min(self.total);
        if self.current == self.total {
            self.finished = true;
            return Some(self.current);
        }
        let decile = (u128::from(self.current) * 10 / u128::from(self.total)) as u64;
        if decile > self.last_decile {
            self.last_decile = decile;
            Some(self.current)
        } else {
            None
        }
    }

    /// Jump to completion, e.g. when a handler stops early. Returns `total`
    /// unless the stream already finished or is indeterminate.
    pub fn finish(&mut self) -> Option<u64> {
        if self.total == 0 || self.finished {
            return None;
        }
        self.current = self.total;
        self.finished = true;
        Some(self.total)
    }
}

/// A [`ProgressMeter`] wired to an invocation's notification stream.
pub struct ProgressReporter {
    cx: ToolContext,
    meter: ProgressMeter,
}

impl ProgressReporter {
    pub(crate) fn new(cx: ToolContext, total: u64) -> Self {
        Self {
            cx,
            meter: ProgressMeter::new(total),
        }
    }

    pub fn advance(&mut self, units: u64) {
        if let Some(current) = self.meter.advance(units) {
            self.cx.emit_progress(current, self.meter.total());
        }
    }

    pub fn finish(&mut self) {
        if let Some(current) = self.meter.finish() {
            self.cx.emit_progress(current, self.meter.total());
        }
    }
}
