//! Click classification and camera-animation gating.
//!
//! All pointer-driven camera changes pass through [`transition`], a pure
//! function over [`InteractionState`], so the behaviour is testable without a
//! window or a GPU.

use std::time::Duration;

use glam::Vec3;

use super::camera::CameraPose;
use super::tween::CameraTween;

/// Maximum gap between two clicks of a double-click (inclusive)
pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum InteractionState {
    #[default]
    Idle,
    /// One click seen at `at`, waiting for a second
    ArmedSingle { at: Duration },
    AnimationInFlight(CameraTween),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InteractionEvent {
    Click(Duration),
    /// Request to start a camera animation
    Begin(CameraTween),
    /// Frame tick
    Tick(Duration),
}

/// What the caller must do after a transition
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InteractionAction {
    None,
    /// Click registered as the first of a possible pair
    Armed,
    /// Second click inside the window: hit-test and pick a destination
    ResolveDouble,
    /// Click dropped because an animation is running
    Ignored,
    /// Animation request dropped because another is running
    Rejected,
    Started,
    /// Animation in progress, apply this pose
    Camera(CameraPose),
    /// Animation completed, apply this final pose
    Finished(CameraPose),
}

pub fn transition(state: InteractionState, event: InteractionEvent) -> (InteractionState, InteractionAction) {
    use InteractionAction as A;
    use InteractionEvent as E;
    use InteractionState as S;

    match (state, event) {
        (S::AnimationInFlight(_), E::Click(_)) => (state, A::Ignored),
        (S::AnimationInFlight(_), E::Begin(_)) => (state, A::Rejected),
        (S::AnimationInFlight(tween), E::Tick(now)) => {
            let (pose, done) = tween.sample(now);
            if done {
                (S::Idle, A::Finished(pose))
            } else {
                (state, A::Camera(pose))
            }
        }

        (S::ArmedSingle { at }, E::Click(now)) if now.saturating_sub(at) <= DOUBLE_CLICK_WINDOW => {
            (S::Idle, A::ResolveDouble)
        }
        (S::Idle | S::ArmedSingle { .. }, E::Click(now)) => (S::ArmedSingle { at: now }, A::Armed),

        (S::Idle | S::ArmedSingle { .. }, E::Begin(tween)) => (S::AnimationInFlight(tween), A::Started),

        (S::ArmedSingle { at }, E::Tick(now)) if now.saturating_sub(at) > DOUBLE_CLICK_WINDOW => (S::Idle, A::None),
        (S::Idle | S::ArmedSingle { .. }, E::Tick(_)) => (state, A::None),
    }
}

/// Owned wrapper that keeps the current state
#[derive(Clone, Debug, Default)]
pub struct Interaction {
    state: InteractionState,
}

impl Interaction {
    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn handle(&mut self, event: InteractionEvent) -> InteractionAction {
        let (next, action) = transition(self.state, event);
        self.state = next;
        action
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.state, InteractionState::AnimationInFlight(_))
    }

    pub fn reset(&mut self) {
        self.state = InteractionState::Idle;
    }
}

/// Destination for a double-click on `hit`: look at the hit point from
/// `ratio` of the current camera-to-hit distance, along the same line.
pub fn focus_pose(camera_position: Vec3, hit: Vec3, ratio: f32) -> CameraPose {
    CameraPose {
        position: hit + (camera_position - hit) * ratio,
        target: hit,
    }
}
