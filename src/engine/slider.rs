/// Fraction of the track a drag must cross before release commits.
pub const COMMIT_THRESHOLD: f64 = 0.7;

pub fn should_commit(progress: f64) -> bool {
    progress >= COMMIT_THRESHOLD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideOutcome {
    Committed,
    SpringBack,
}

/// Slide-to-confirm contract: a drag progress in [0, 1] and a release
/// that commits at most once per armed gesture.
#[derive(Debug, Default)]
pub struct SlideToConfirm {
    progress: f64,
    committed: bool,
}

impl SlideToConfirm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drag(&mut self, progress: f64) {
        self.progress = progress.clamp(0.0, 1.0);
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Ends the gesture. Below the threshold the knob springs back; at or
    /// above it the action fires exactly once per gesture.
    pub fn release(&mut self) -> SlideOutcome {
        if self.committed || !should_commit(self.progress) {
            self.progress = 0.0;
            return SlideOutcome::SpringBack;
        }

        self.committed = true;
        SlideOutcome::Committed
    }

    /// Re-arms the slider for the next leg.
    pub fn reset(&mut self) {
        self.progress = 0.0;
        self.committed = false;
    }
}
