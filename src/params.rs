// params.rs — effect parameter bus: smoothing helpers, per-panel parameter sets, post-process parameters

/// Reference refresh rate the per-tick constants were tuned for.
pub const REFERENCE_HZ: f32 = 60.0;

/// `grayscale` value of the focused panel (full colour).
pub const FOCUSED_GRAYSCALE: f32 = 0.0;
/// `grayscale` value of every other panel (full grayscale).
pub const UNFOCUSED_GRAYSCALE: f32 = 1.0;

/// Neutral pointer position in panel parameter space (0..1).
pub const POINTER_CENTER: f32 = 0.5;

/// `current += (target - current) * rate`
pub fn lerp_toward(current: f32, target: f32, rate: f32) -> f32 {
    current + (target - current) * rate
}

/// Converts a per-tick rate tuned at 60 Hz into the rate for a frame of `dt` seconds,
/// so `n` short frames move exactly as far as one frame of `n * dt`.
pub fn frame_rate(rate: f32, dt: f32) -> f32 {
    let rate = rate.clamp(0.0, 1.0);
    if rate >= 1.0 {
        return 1.0;
    }
    1.0 - (1.0 - rate).powf(dt.max(0.0) * REFERENCE_HZ)
}

/// Exponential approach normalized by frame time.
pub fn smooth_toward(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    lerp_toward(current, target, frame_rate(rate, dt))
}

pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

pub fn smoothstep3(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Holds the middle of the scroll range longer: `sin(t·π/2)^3`.
pub fn sticky_ease(t: f32) -> f32 {
    (t.clamp(0.0, 1.0) * std::f32::consts::FRAC_PI_2).sin().powi(3)
}

/// Zero inside `±threshold`, the remainder rescaled so the output still spans -1..1
/// and is continuous at the boundary.
pub fn dead_zone(value: f32, threshold: f32) -> f32 {
    let threshold = threshold.clamp(0.0, 0.999);
    let magnitude = value.abs();
    if magnitude <= threshold {
        return 0.0;
    }
    value.signum() * (magnitude - threshold) / (1.0 - threshold)
}

/// Single-step velocity integrator for cosmetic secondary motion.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Spring {
    pub value: f32,
    pub velocity: f32,
}

impl Spring {
    pub fn new(value: f32) -> Self {
        Self { value, velocity: 0.0 }
    }

    /// `velocity = velocity * damping + (target - value) * stiffness; value += velocity`
    pub fn step(&mut self, target: f32, stiffness: f32, damping: f32) -> f32 {
        self.velocity = self.velocity * damping + (target - self.value) * stiffness;
        self.value += self.velocity;
        self.value
    }

    /// Same integrator advanced by `dt` seconds worth of 60 Hz ticks.
    pub fn step_dt(&mut self, target: f32, stiffness: f32, damping: f32, dt: f32) -> f32 {
        let ticks = dt.max(0.0) * REFERENCE_HZ;
        let whole = ticks.floor() as u32;
        for _ in 0..whole {
            self.step(target, stiffness, damping);
        }
        let frac = ticks - whole as f32;
        if frac > 0.0 {
            self.velocity = self.velocity * damping.powf(frac) + (target - self.value) * stiffness * frac;
            self.value += self.velocity * frac;
        }
        self.value
    }
}

/// Names of the numeric inputs a panel shader may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    ParallaxStrength,
    PointerX,
    PointerY,
    Grayscale,
}

/// The numeric inputs one panel exposes. A `None` field is a parameter the
/// panel's shader does not declare.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSet {
    pub parallax_strength: Option<f32>,
    pub pointer_x: Option<f32>,
    pub pointer_y: Option<f32>,
    pub grayscale: Option<f32>,
}

impl ParameterSet {
    pub fn parallax(strength: f32) -> Self {
        Self {
            parallax_strength: Some(strength),
            pointer_x: Some(POINTER_CENTER),
            pointer_y: Some(POINTER_CENTER),
            grayscale: Some(FOCUSED_GRAYSCALE),
        }
    }

    pub fn flat() -> Self {
        Self {
            parallax_strength: None,
            pointer_x: None,
            pointer_y: None,
            grayscale: Some(FOCUSED_GRAYSCALE),
        }
    }

    pub fn video() -> Self {
        Self {
            parallax_strength: None,
            pointer_x: None,
            pointer_y: None,
            grayscale: None,
        }
    }

    pub fn has_parallax(&self) -> bool {
        self.parallax_strength.is_some()
    }

    /// Writes `value` if the panel declares `key`; returns whether it did.
    pub fn set(&mut self, key: ParamKey, value: f32) -> bool {
        let slot = match key {
            ParamKey::ParallaxStrength => &mut self.parallax_strength,
            ParamKey::PointerX => &mut self.pointer_x,
            ParamKey::PointerY => &mut self.pointer_y,
            ParamKey::Grayscale => &mut self.grayscale,
        };
        match slot {
            Some(v) => {
                *v = value;
                true
            }
            None => false,
        }
    }
}

/// Everything the orchestrator wants written into one panel during one tick.
#[derive(Debug, Clone, Default)]
pub struct PanelFrame {
    /// Pointer target in 0..1, approached with `pointer_rate`.
    pub pointer_target: Option<(f32, f32)>,
    pub pointer_rate: f32,
    /// Parallax strength target, approached with `pointer_rate`.
    pub strength_target: Option<f32>,
    pub grayscale: f32,
    /// Values owned by running animations. They are written verbatim and
    /// take precedence over the smoothed targets above.
    pub overrides: Vec<(ParamKey, f32)>,
}

impl PanelFrame {
    fn overridden(&self, key: ParamKey) -> bool {
        self.overrides.iter().any(|(k, _)| *k == key)
    }
}

/// Applies one tick's writes to a panel. This is the only place panel parameters change.
pub fn apply_frame(params: &mut ParameterSet, frame: &PanelFrame, dt: f32) {
    if let Some((tx, ty)) = frame.pointer_target {
        if !frame.overridden(ParamKey::PointerX) {
            if let Some(x) = params.pointer_x {
                params.pointer_x = Some(smooth_toward(x, tx, frame.pointer_rate, dt));
            }
        }
        if !frame.overridden(ParamKey::PointerY) {
            if let Some(y) = params.pointer_y {
                params.pointer_y = Some(smooth_toward(y, ty, frame.pointer_rate, dt));
            }
        }
    }
    if let Some(target) = frame.strength_target {
        if !frame.overridden(ParamKey::ParallaxStrength) {
            if let Some(s) = params.parallax_strength {
                params.parallax_strength = Some(smooth_toward(s, target, frame.pointer_rate, dt));
            }
        }
    }
    params.set(ParamKey::Grayscale, frame.grayscale);
    for (key, value) in &frame.overrides {
        params.set(*key, *value);
    }
}

/// Parameters of the full-screen post chain (ripple → fisheye → edge blur).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostParams {
    pub time: f32,
    pub scroll: f32,
    pub mouse_x: f32,
    pub segment_width: f32,
    pub ripple_edge: f32,
    pub fisheye_strength: f32,
    pub edge_size: f32,
    pub blur_amount: f32,
    pub resolution: [f32; 2],
}

impl Default for PostParams {
    fn default() -> Self {
        Self {
            time: 0.0,
            scroll: 0.0,
            mouse_x: 0.0,
            segment_width: 0.05,
            ripple_edge: 0.15,
            fisheye_strength: 0.1,
            edge_size: 0.2,
            blur_amount: 0.02,
            resolution: [1.0, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easing_endpoints() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert_eq!(smoothstep3(0.0), 0.0);
        assert_eq!(smoothstep3(1.0), 1.0);
        assert!((smoothstep3(0.5) - 0.5).abs() < 1e-6);
        assert!(ease_out_cubic(0.5) > 0.5);
        assert!((sticky_ease(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dead_zone_is_continuous_at_threshold() {
        assert_eq!(dead_zone(0.05, 0.1), 0.0);
        assert_eq!(dead_zone(-0.1, 0.1), 0.0);
        assert!(dead_zone(0.1001, 0.1) < 1e-3);
        assert!((dead_zone(1.0, 0.1) - 1.0).abs() < 1e-6);
        assert!((dead_zone(-1.0, 0.1) + 1.0).abs() < 1e-6);
        assert!((dead_zone(0.55, 0.1) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn frame_rate_matches_reference_tick() {
        let dt = 1.0 / REFERENCE_HZ;
        assert!((frame_rate(0.1, dt) - 0.1).abs() < 1e-5);
        // two half frames cover the same distance as one full frame
        let one = smooth_toward(0.0, 1.0, 0.1, dt);
        let half = smooth_toward(smooth_toward(0.0, 1.0, 0.1, dt / 2.0), 1.0, 0.1, dt / 2.0);
        assert!((one - half).abs() < 1e-5);
    }

    #[test]
    fn spring_settles_on_target() {
        let mut spring = Spring::new(0.0);
        for _ in 0..600 {
            spring.step(1.0, 0.08, 0.6);
        }
        assert!((spring.value - 1.0).abs() < 1e-3);
        assert!(spring.velocity.abs() < 1e-3);
    }

    #[test]
    fn video_params_ignore_writes() {
        let mut params = ParameterSet::video();
        assert!(!params.set(ParamKey::Grayscale, 1.0));
        assert_eq!(params.grayscale, None);

        let mut flat = ParameterSet::flat();
        assert!(flat.set(ParamKey::Grayscale, 1.0));
        assert!(!flat.set(ParamKey::PointerX, 0.2));
    }

    #[test]
    fn overrides_win_over_smoothing() {
        let mut params = ParameterSet::parallax(0.03);
        let frame = PanelFrame {
            pointer_target: Some((1.0, 1.0)),
            pointer_rate: 0.1,
            strength_target: None,
            grayscale: UNFOCUSED_GRAYSCALE,
            overrides: vec![(ParamKey::PointerX, 0.1)],
        };
        apply_frame(&mut params, &frame, 1.0 / REFERENCE_HZ);
        assert_eq!(params.pointer_x, Some(0.1));
        assert!(params.pointer_y.unwrap() > POINTER_CENTER);
        assert_eq!(params.grayscale, Some(UNFOCUSED_GRAYSCALE));
    }
}
