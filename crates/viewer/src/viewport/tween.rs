use std::time::Duration;

use super::camera::CameraPose;

/// Length of every camera transition
pub const ANIMATION_DURATION: Duration = Duration::from_millis(500);

pub fn ease_out_cubic(p: f32) -> f32 {
    1.0 - (1.0 - p).powi(3)
}

/// One eased camera transition.
///
/// Time is measured as a `Duration` since an arbitrary frame-clock origin
/// (egui's `input.time` in the app, explicit values in tests).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraTween {
    pub start: Duration,
    pub from: CameraPose,
    pub to: CameraPose,
    pub duration: Duration,
}

impl CameraTween {
    pub fn new(start: Duration, from: CameraPose, to: CameraPose) -> Self {
        Self {
            start,
            from,
            to,
            duration: ANIMATION_DURATION,
        }
    }

    /// Linear progress in [0, 1]
    pub fn progress(&self, now: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    /// Pose at `now` and whether the tween has completed.
    /// The final sample lands exactly on `to`.
    pub fn sample(&self, now: Duration) -> (CameraPose, bool) {
        let p = self.progress(now);
        if p >= 1.0 {
            return (self.to, true);
        }
        (self.from.lerp(&self.to, ease_out_cubic(p)), false)
    }
}
