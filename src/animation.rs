// animation.rs — fixed-duration parameter animations
//
// Each animation owns exactly one (panel, parameter) pair. Starting a new one on
// the same pair supersedes the old one; animations on different pairs run side by side.

use crate::params::{ease_out_cubic, smoothstep3, ParamKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Smoothstep,
    EaseOutCubic,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        match self {
            Easing::Smoothstep => smoothstep3(t),
            Easing::EaseOutCubic => ease_out_cubic(t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// from → to
    Tween { from: f32, to: f32 },
    /// base → peak → base
    Pulse { base: f32, peak: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamAnimation {
    pub panel: usize,
    pub key: ParamKey,
    pub shape: Shape,
    pub easing: Easing,
    pub start_s: f64,
    pub duration_s: f32,
}

impl ParamAnimation {
    fn progress(&self, now_s: f64) -> f32 {
        if self.duration_s <= 0.0 {
            return 1.0;
        }
        (((now_s - self.start_s) as f32) / self.duration_s).clamp(0.0, 1.0)
    }

    pub fn value_at(&self, now_s: f64) -> f32 {
        let t = self.progress(now_s);
        match self.shape {
            Shape::Tween { from, to } => from + (to - from) * self.easing.apply(t),
            Shape::Pulse { base, peak } => {
                let k = (self.easing.apply(t) * std::f32::consts::PI).sin();
                base + (peak - base) * k
            }
        }
    }

    pub fn final_value(&self) -> f32 {
        match self.shape {
            Shape::Tween { to, .. } => to,
            Shape::Pulse { base, .. } => base,
        }
    }

    pub fn is_done(&self, now_s: f64) -> bool {
        self.progress(now_s) >= 1.0
    }
}

/// A sampled animation value for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub panel: usize,
    pub key: ParamKey,
    pub value: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Animations {
    running: Vec<ParamAnimation>,
}

impl Animations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, animation: ParamAnimation) {
        self.running
            .retain(|a| !(a.panel == animation.panel && a.key == animation.key));
        self.running.push(animation);
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Stops every animation driving `panel`; its parameters go back to plain smoothing.
    pub fn cancel_panel(&mut self, panel: usize) {
        self.running.retain(|a| a.panel != panel);
    }

    /// Drops everything, e.g. when the ring the panel indices refer to is rebuilt.
    pub fn clear(&mut self) {
        self.running.clear();
    }

    /// Samples every running animation. Finished animations report their final
    /// value once and are then removed.
    pub fn sample(&mut self, now_s: f64) -> Vec<Sample> {
        let samples = self
            .running
            .iter()
            .map(|a| Sample {
                panel: a.panel,
                key: a.key,
                value: if a.is_done(now_s) {
                    a.final_value()
                } else {
                    a.value_at(now_s)
                },
            })
            .collect();
        self.running.retain(|a| !a.is_done(now_s));
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(panel: usize, start_s: f64) -> ParamAnimation {
        ParamAnimation {
            panel,
            key: ParamKey::PointerX,
            shape: Shape::Tween { from: 0.1, to: 0.9 },
            easing: Easing::Smoothstep,
            start_s,
            duration_s: 0.8,
        }
    }

    #[test]
    fn tween_runs_edge_to_edge_then_finishes() {
        let mut animations = Animations::new();
        animations.start(sweep(2, 0.0));

        let first = animations.sample(0.0);
        assert_eq!(first[0].value, 0.1);
        let mid = animations.sample(0.4);
        assert!((mid[0].value - 0.5).abs() < 1e-5);
        let last = animations.sample(0.8);
        assert_eq!(last[0].value, 0.9);
        assert!(animations.is_empty());
        assert!(animations.sample(1.0).is_empty());
    }

    #[test]
    fn pulse_returns_to_base() {
        let pulse = ParamAnimation {
            panel: 0,
            key: ParamKey::ParallaxStrength,
            shape: Shape::Pulse { base: 0.03, peak: 0.06 },
            easing: Easing::Smoothstep,
            start_s: 0.0,
            duration_s: 1.0,
        };
        assert!((pulse.value_at(0.5) - 0.06).abs() < 1e-6);
        assert!((pulse.value_at(0.0) - 0.03).abs() < 1e-6);
        assert_eq!(pulse.final_value(), 0.03);
    }

    #[test]
    fn same_parameter_is_superseded() {
        let mut animations = Animations::new();
        animations.start(sweep(1, 0.0));
        animations.start(sweep(1, 0.5));
        animations.start(ParamAnimation {
            key: ParamKey::ParallaxStrength,
            ..sweep(1, 0.5)
        });
        assert_eq!(animations.len(), 2);
        // the surviving sweep started at 0.5
        let samples = animations.sample(0.5);
        assert!(samples.iter().all(|s| s.panel == 1));
        let x = samples.iter().find(|s| s.key == ParamKey::PointerX).unwrap();
        assert_eq!(x.value, 0.1);
    }

    #[test]
    fn cancelling_a_panel_leaves_others_running() {
        let mut animations = Animations::new();
        animations.start(sweep(0, 0.0));
        animations.start(ParamAnimation {
            key: ParamKey::ParallaxStrength,
            ..sweep(0, 0.0)
        });
        animations.start(sweep(1, 0.0));
        animations.cancel_panel(0);
        assert_eq!(animations.len(), 1);
        assert!(animations.sample(0.1).iter().all(|s| s.panel == 1));
        animations.cancel_panel(7);
        assert_eq!(animations.len(), 1);
    }
}
