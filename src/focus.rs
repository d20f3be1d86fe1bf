// focus.rs — picks the panel most aligned with the camera and starts the focus sweep

use crate::animation::{Easing, ParamAnimation, Shape};
use crate::media::Tuning;
use crate::params::ParamKey;
use glam::Vec3;

/// Edge-biased pointer values the sweep travels between.
pub const SWEEP_LOW: f32 = 0.1;
pub const SWEEP_HIGH: f32 = 0.9;
/// The parallax boost outlasts the sweep slightly.
const BOOST_DURATION_FACTOR: f32 = 1.25;

/// Index of the position whose flattened direction from `eye` has the largest
/// dot product with the flattened `forward`. The first maximum wins.
pub fn most_aligned(eye: Vec3, forward: Vec3, positions: impl IntoIterator<Item = Vec3>) -> Option<usize> {
    let forward = Vec3::new(forward.x, 0.0, forward.z).normalize_or_zero();
    let mut best: Option<(usize, f32)> = None;
    for (i, position) in positions.into_iter().enumerate() {
        let to_panel = position - eye;
        let dir = Vec3::new(to_panel.x, 0.0, to_panel.z).normalize_or_zero();
        let score = dir.dot(forward);
        match best {
            Some((_, s)) if s >= score => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusChange {
    pub previous: Option<usize>,
    pub current: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FocusState {
    pub focused: Option<usize>,
    pub previous: Option<usize>,
}

impl FocusState {
    /// Records this frame's result; reports a change when it differs from the last one.
    pub fn update(&mut self, resolved: Option<usize>) -> Option<FocusChange> {
        self.previous = self.focused;
        self.focused = resolved;
        match resolved {
            Some(current) if self.previous != Some(current) => Some(FocusChange {
                previous: self.previous,
                current,
            }),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.focused = None;
        self.previous = None;
    }
}

/// The pointer sweep and parallax boost played on a newly focused panel.
/// The sweep runs low→high after a rightward drag and high→low otherwise.
pub fn sweep_animations(panel: usize, direction: f32, now_s: f64, tuning: &Tuning) -> [ParamAnimation; 2] {
    let (from, to) = if direction >= 0.0 {
        (SWEEP_LOW, SWEEP_HIGH)
    } else {
        (SWEEP_HIGH, SWEEP_LOW)
    };
    [
        ParamAnimation {
            panel,
            key: ParamKey::PointerX,
            shape: Shape::Tween { from, to },
            easing: Easing::Smoothstep,
            start_s: now_s,
            duration_s: tuning.sweep_duration_s,
        },
        ParamAnimation {
            panel,
            key: ParamKey::ParallaxStrength,
            shape: Shape::Pulse {
                base: tuning.parallax_base,
                peak: tuning.parallax_boost,
            },
            easing: Easing::EaseOutCubic,
            start_s: now_s,
            duration_s: tuning.sweep_duration_s * BOOST_DURATION_FACTOR,
        },
    ]
}
