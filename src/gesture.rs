// gesture.rs — drag / momentum / snap state machine for the ring rotation

use crate::media::Tuning;
use crate::params::{ease_out_cubic, smooth_toward, REFERENCE_HZ};
use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Dragging,
    Momentum,
    Snapping,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SnapTween {
    from: f32,
    to: f32,
    start_ms: f64,
}

/// For every rest angle, the congruent angle (mod 2π) nearest to `rotation`;
/// returns the index and value of the globally nearest one.
pub fn nearest_congruent(angles: &[f32], rotation: f32) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32, f32)> = None;
    for (i, &angle) in angles.iter().enumerate() {
        let turns = ((rotation - angle) / TAU).round();
        let candidate = angle + turns * TAU;
        let distance = (candidate - rotation).abs();
        match best {
            Some((_, _, d)) if d <= distance => {}
            _ => best = Some((i, candidate, distance)),
        }
    }
    best.map(|(i, candidate, _)| (i, candidate))
}

#[derive(Debug, Clone)]
pub struct RotationController {
    /// Rendered ring angle (radians), smoothed.
    pub current: f32,
    /// Angle `current` eases toward.
    pub target: f32,
    /// Signed angular velocity in radians per 60 Hz tick.
    pub velocity: f32,
    mode: Mode,
    tuning: Tuning,
    drag_scale: f32,
    last_x: f32,
    last_sample_ms: f64,
    drag_start_x: f32,
    direction: f32,
    momentum_start_ms: f64,
    snap: Option<SnapTween>,
}

impl RotationController {
    pub fn new(tuning: Tuning, drag_scale: f32) -> Self {
        Self {
            current: 0.0,
            target: 0.0,
            velocity: 0.0,
            mode: Mode::Idle,
            tuning,
            drag_scale,
            last_x: 0.0,
            last_sample_ms: 0.0,
            drag_start_x: 0.0,
            direction: 0.0,
            momentum_start_ms: 0.0,
            snap: None,
        }
    }

    /// Starts at rest on `angle`.
    pub fn at_rest(mut self, angle: f32) -> Self {
        self.current = angle;
        self.target = angle;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_drag_scale(&mut self, drag_scale: f32) {
        self.drag_scale = drag_scale;
    }

    /// Sign of the last non-zero drag movement, 0 before any.
    pub fn drag_direction(&self) -> f32 {
        self.direction
    }

    /// Horizontal pixels moved since the current drag began; 0 when not dragging.
    pub fn drag_offset_px(&self) -> f32 {
        if self.mode == Mode::Dragging {
            self.last_x - self.drag_start_x
        } else {
            0.0
        }
    }

    /// Ambient tilt must not fight drag or snap motion.
    pub fn suppresses_tilt(&self) -> bool {
        matches!(self.mode, Mode::Dragging | Mode::Snapping)
    }

    fn enter(&mut self, mode: Mode) {
        if self.mode != mode {
            log::debug!("rotation {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }

    /// Pointer down / single touch start. Pre-empts momentum and snapping.
    pub fn press(&mut self, x: f32, now_ms: f64) {
        self.snap = None;
        self.velocity = 0.0;
        self.target = self.current;
        self.last_x = x;
        self.drag_start_x = x;
        self.last_sample_ms = now_ms;
        self.enter(Mode::Dragging);
    }

    /// Pointer / touch move while held. Ignored outside of a drag.
    pub fn drag(&mut self, x: f32, now_ms: f64) {
        if self.mode != Mode::Dragging {
            return;
        }
        let dx = x - self.last_x;
        let dt = now_ms - self.last_sample_ms;

        self.target += dx * self.drag_scale;
        if dt > 0.0 {
            let max = self.tuning.max_velocity;
            self.velocity = (dx / dt as f32 * self.tuning.velocity_scale).clamp(-max, max);
        }
        if dx != 0.0 {
            self.direction = dx.signum();
        }

        self.last_x = x;
        self.last_sample_ms = now_ms;
    }

    /// Pointer up / touch end. Ignored outside of a drag.
    pub fn release(&mut self, now_ms: f64) {
        if self.mode != Mode::Dragging {
            return;
        }
        let min = self.tuning.min_release_velocity;
        if self.velocity.abs() < min && self.direction != 0.0 {
            self.velocity = self.direction * min;
        }
        self.momentum_start_ms = now_ms;
        self.enter(Mode::Momentum);
    }

    /// Advances one frame. `angles` are the panel rest angles used for snapping.
    pub fn update(&mut self, now_ms: f64, dt: f32, angles: &[f32]) {
        match self.mode {
            Mode::Idle | Mode::Dragging => {
                self.current = smooth_toward(self.current, self.target, self.tuning.idle_rate, dt);
            }
            Mode::Momentum => {
                let ticks = dt.max(0.0) * REFERENCE_HZ;
                self.target += self.velocity * ticks;
                self.velocity *= self.tuning.friction.powf(ticks);
                self.current = smooth_toward(self.current, self.target, self.tuning.idle_rate, dt);

                let slow = self.velocity.abs() <= self.tuning.stop_threshold;
                let long_enough = now_ms - self.momentum_start_ms >= self.tuning.min_momentum_ms;
                if slow && long_enough {
                    self.begin_snap(now_ms, angles);
                }
            }
            Mode::Snapping => self.advance_snap(now_ms, dt),
        }
    }

    fn begin_snap(&mut self, now_ms: f64, angles: &[f32]) {
        self.velocity = 0.0;
        match nearest_congruent(angles, self.current) {
            Some((_, to)) => {
                self.snap = Some(SnapTween {
                    from: self.target,
                    to,
                    start_ms: now_ms,
                });
                self.enter(Mode::Snapping);
            }
            None => self.enter(Mode::Idle),
        }
    }

    fn advance_snap(&mut self, now_ms: f64, dt: f32) {
        let Some(snap) = self.snap else {
            self.enter(Mode::Idle);
            return;
        };
        let duration_ms = self.tuning.snap_duration_s as f64 * 1000.0;
        let t = if duration_ms > 0.0 {
            ((now_ms - snap.start_ms) / duration_ms).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };

        if t >= 1.0 {
            self.current = snap.to;
            self.target = snap.to;
            self.snap = None;
            self.enter(Mode::Idle);
            return;
        }

        self.target = snap.from + (snap.to - snap.from) * ease_out_cubic(t);
        self.current = smooth_toward(self.current, self.target, self.tuning.snap_rate, dt);
    }

    /// Where the running snap will land.
    pub fn snap_target(&self) -> Option<f32> {
        self.snap.map(|s| s.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchRole {
    /// The single touch that drives rotation.
    Primary,
    /// Extra fingers and unknown ids.
    Ignored,
}

/// A touch list untouched for this long is assumed to have lost its end events.
const STALE_TOUCH_MS: f64 = 1500.0;

/// Tracks active touch points so only a lone touch can rotate the ring.
#[derive(Debug, Clone, Default)]
pub struct TouchTracker {
    active: Vec<u64>,
    primary: Option<u64>,
    last_event_ms: f64,
}

impl TouchTracker {
    /// A start that reuses a live id, or arrives after a long silence, means
    /// earlier end events were lost; the stale points are dropped first.
    pub fn begin(&mut self, id: u64, now_ms: f64) -> TouchRole {
        let stale = self.active.contains(&id)
            || (!self.active.is_empty() && now_ms - self.last_event_ms > STALE_TOUCH_MS);
        if stale {
            log::debug!("dropping {} stale touch point(s)", self.active.len());
            self.active.clear();
            self.primary = None;
        }
        self.last_event_ms = now_ms;
        self.active.push(id);
        if self.active.len() == 1 {
            self.primary = Some(id);
            TouchRole::Primary
        } else {
            TouchRole::Ignored
        }
    }

    pub fn moved(&mut self, id: u64, now_ms: f64) -> TouchRole {
        if !self.active.contains(&id) {
            return TouchRole::Ignored;
        }
        self.last_event_ms = now_ms;
        if self.primary == Some(id) && self.active.len() == 1 {
            TouchRole::Primary
        } else {
            TouchRole::Ignored
        }
    }

    pub fn end(&mut self, id: u64) -> TouchRole {
        let Some(pos) = self.active.iter().position(|&t| t == id) else {
            return TouchRole::Ignored;
        };
        self.active.remove(pos);
        if self.primary == Some(id) {
            self.primary = None;
            TouchRole::Primary
        } else {
            TouchRole::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const DT: f32 = 1.0 / 60.0;
    const DT_MS: f64 = 1000.0 / 60.0;

    fn ring_angles(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| crate::panel::normalize_angle(-PI / 2.0 + i as f32 * TAU / n as f32))
            .collect()
    }

    fn run_until_idle(c: &mut RotationController, mut now: f64, angles: &[f32]) -> (f64, Vec<Mode>) {
        let mut modes = Vec::new();
        for _ in 0..10_000 {
            now += DT_MS;
            c.update(now, DT, angles);
            modes.push(c.mode());
            if c.mode() == Mode::Idle {
                break;
            }
        }
        (now, modes)
    }

    #[test]
    fn flick_velocity_is_clamped() {
        let mut c = RotationController::new(Tuning::default(), 0.005);
        c.press(0.0, 0.0);
        c.drag(200.0, 100.0);
        assert_eq!(c.mode(), Mode::Dragging);
        assert!((c.velocity - 0.02).abs() < 1e-7);
        assert!((c.target - 1.0).abs() < 1e-6);
        assert_eq!(c.drag_direction(), 1.0);
        assert_eq!(c.drag_offset_px(), 200.0);

        c.drag(-800.0, 110.0);
        assert!((c.velocity + 0.02).abs() < 1e-7);
    }

    #[test]
    fn momentum_decays_then_snaps_to_panel() {
        let angles = ring_angles(12);
        let mut c = RotationController::new(Tuning::default(), 0.005);
        c.press(0.0, 0.0);
        c.drag(200.0, 100.0);
        c.release(100.0);
        assert_eq!(c.mode(), Mode::Momentum);

        let mut now = 100.0;
        let mut momentum_ticks = 0;
        while c.mode() == Mode::Momentum {
            now += DT_MS;
            c.update(now, DT, &angles);
            momentum_ticks += 1;
            assert!(momentum_ticks < 1000);
        }
        // 0.02 * 0.92^n <= 0.0005 needs n >= 45
        assert!(momentum_ticks >= 44, "{momentum_ticks}");
        assert_eq!(c.mode(), Mode::Snapping);

        let (_, _) = run_until_idle(&mut c, now, &angles);
        assert_eq!(c.mode(), Mode::Idle);
        assert_eq!(c.current, c.target);
        let landed = crate::panel::normalize_angle(c.current);
        assert!(angles.iter().any(|a| (a - landed).abs() < 1e-3 || (a - landed).abs() > TAU - 1e-3));
    }

    #[test]
    fn tiny_drag_still_spins_for_minimum_duration() {
        let angles = ring_angles(12);
        let mut c = RotationController::new(Tuning::default(), 0.005);
        c.press(100.0, 0.0);
        c.drag(101.0, 1000.0);
        c.release(1000.0);
        assert!((c.velocity - 0.002).abs() < 1e-7);

        let start = c.target;
        let mut now = 1000.0;
        while c.mode() == Mode::Momentum {
            now += DT_MS;
            c.update(now, DT, &angles);
        }
        assert!(now - 1000.0 >= 500.0);
        assert!(c.target > start);
    }

    #[test]
    fn snap_lands_on_nearest_angle_within_half_step() {
        let angles = ring_angles(12);
        let step = TAU / 12.0;
        for k in 0..50 {
            let rotation = -7.0 + k as f32 * 0.29;
            let (_, snapped) = nearest_congruent(&angles, rotation).unwrap();
            assert!((snapped - rotation).abs() <= step / 2.0 + 1e-4);
            let norm = crate::panel::normalize_angle(snapped);
            assert!(angles.iter().any(|a| (a - norm).abs() < 1e-3 || (a - norm).abs() > TAU - 1e-3));
        }
        assert_eq!(nearest_congruent(&[], 1.0), None);
    }

    #[test]
    fn idle_convergence_is_monotonic() {
        let mut c = RotationController::new(Tuning::default(), 0.005);
        c.target = 1.5;
        let mut last = (c.target - c.current).abs();
        for i in 0..100 {
            c.update(i as f64 * DT_MS, DT, &[]);
            let distance = (c.target - c.current).abs();
            assert!(distance < last);
            assert!(c.current <= c.target);
            last = distance;
        }
        assert!(last < 1e-3);
    }

    #[test]
    fn press_preempts_snap() {
        let angles = ring_angles(12);
        let mut c = RotationController::new(Tuning::default(), 0.005).at_rest(0.3);
        c.press(0.0, 0.0);
        c.drag(10.0, 16.0);
        c.release(16.0);
        let mut now = 16.0;
        while c.mode() != Mode::Snapping {
            now += DT_MS;
            c.update(now, DT, &angles);
        }
        assert!(c.snap_target().is_some());
        assert!(c.suppresses_tilt());

        c.press(50.0, now);
        assert_eq!(c.mode(), Mode::Dragging);
        assert_eq!(c.snap_target(), None);
        assert_eq!(c.velocity, 0.0);
        now += DT_MS;
        c.update(now, DT, &angles);
        assert_eq!(c.mode(), Mode::Dragging);
    }

    #[test]
    fn moves_and_releases_without_press_are_ignored() {
        let mut c = RotationController::new(Tuning::default(), 0.005);
        c.drag(300.0, 10.0);
        c.release(20.0);
        assert_eq!(c.mode(), Mode::Idle);
        assert_eq!(c.target, 0.0);
    }

    #[test]
    fn only_a_lone_touch_rotates() {
        let mut touches = TouchTracker::default();
        assert_eq!(touches.begin(1, 0.0), TouchRole::Primary);
        assert_eq!(touches.moved(1, 10.0), TouchRole::Primary);
        assert_eq!(touches.begin(2, 20.0), TouchRole::Ignored);
        assert_eq!(touches.moved(1, 30.0), TouchRole::Ignored);
        assert_eq!(touches.moved(2, 30.0), TouchRole::Ignored);
        assert_eq!(touches.end(2), TouchRole::Ignored);
        assert_eq!(touches.end(1), TouchRole::Primary);
        assert_eq!(touches.end(7), TouchRole::Ignored);
        assert_eq!(touches.begin(3, 40.0), TouchRole::Primary);
    }

    #[test]
    fn lost_touch_end_does_not_block_later_touches() {
        let mut touches = TouchTracker::default();
        assert_eq!(touches.begin(1, 0.0), TouchRole::Primary);
        assert_eq!(touches.moved(1, 16.0), TouchRole::Primary);
        // end of touch 1 never arrives
        assert_eq!(touches.begin(2, 16.0 + STALE_TOUCH_MS + 1.0), TouchRole::Primary);
        assert_eq!(touches.moved(2, 3000.0), TouchRole::Primary);
        assert_eq!(touches.end(2), TouchRole::Primary);
        assert_eq!(touches.end(1), TouchRole::Ignored);

        // a start reusing a live id also resets
        assert_eq!(touches.begin(5, 4000.0), TouchRole::Primary);
        assert_eq!(touches.begin(5, 4010.0), TouchRole::Primary);
        assert_eq!(touches.moved(5, 4020.0), TouchRole::Primary);
    }
}
