// orchestrator.rs — carousel state and the per-frame update
//
// All mutation happens on one thread: input handlers change pointer / gesture
// state between frames and `tick` advances everything once per display refresh.

use crate::animation::Animations;
use crate::assets;
use crate::camera::CarouselCamera;
use crate::focus::{self, FocusChange, FocusState};
use crate::gesture::{Mode, RotationController, TouchRole, TouchTracker};
use crate::layout::{Breakpoint, ResizeDebouncer};
use crate::media::{Manifest, MediaDescriptor, PanelMeta, Tuning};
use crate::panel::Ring;
use crate::params::{
    apply_frame, dead_zone, smooth_toward, sticky_ease, PanelFrame, PostParams, Spring,
    FOCUSED_GRAYSCALE, POINTER_CENTER, UNFOCUSED_GRAYSCALE,
};
use glam::{Vec2, Vec3};

/// Scroll distance that maps to full scroll progress.
pub const SCROLL_RANGE: f32 = 3000.0;
/// Upper bound of the locally accumulated scroll value.
pub const MAX_LOCAL_SCROLL: f32 = 5000.0;
/// Camera drop at full scroll progress, in world units.
const MAX_LIFT: f32 = 2.5;
const LIFT_STIFFNESS: f32 = 0.08;
const LIFT_DAMPING: f32 = 0.6;
/// Longest frame step fed into the integrators.
const MAX_FRAME_DT: f32 = 0.1;
/// Idle touch oscillation of the focused panel's pointer.
const IDLE_SWAY_X: (f32, f32) = (0.25, 1.2);
const IDLE_SWAY_Y: (f32, f32) = (0.15, 0.9);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerDevice {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    /// Normalized position in [-1, 1]², +y up.
    pub ndc: Vec2,
    pub device: PointerDevice,
    /// False once the cursor left the window.
    pub inside: bool,
}

impl Default for PointerState {
    fn default() -> Self {
        Self {
            ndc: Vec2::ZERO,
            device: PointerDevice::Mouse,
            inside: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollSource {
    /// Mouse wheel accumulated locally.
    Local,
    /// Values posted by an embedding host.
    External,
}

#[derive(Debug, Clone, Copy)]
struct ScrollState {
    source: ScrollSource,
    local: f32,
    external: f32,
}

impl ScrollState {
    fn value(&self) -> f32 {
        match self.source {
            ScrollSource::Local => self.local,
            ScrollSource::External => self.external,
        }
    }

    fn progress(&self) -> f32 {
        (self.value() / SCROLL_RANGE).clamp(0.0, 1.0)
    }
}

/// What one tick produced that the host may react to.
#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    /// Ring angle to render, including ambient tilt.
    pub rotation: f32,
    pub focus_change: Option<FocusChange>,
    /// The ring was reconstructed this tick; GPU geometry must follow.
    pub rebuilt: bool,
}

pub struct CarouselState {
    pub ring: Ring,
    pub controller: RotationController,
    pub focus: FocusState,
    pub animations: Animations,
    pub camera: CarouselCamera,
    pub pointer: PointerState,
    pub post: PostParams,
    manifest: Manifest,
    descriptors: Vec<MediaDescriptor>,
    tuning: Tuning,
    touches: TouchTracker,
    tilt: f32,
    lift: Spring,
    scroll: ScrollState,
    viewport: (u32, u32),
    debouncer: ResizeDebouncer,
    hovered: bool,
    start_s: f64,
    last_tick_s: Option<f64>,
    rendered_rotation: f32,
}

fn build_ring(manifest: &Manifest, descriptors: &[MediaDescriptor], width: u32, generation: u64) -> Ring {
    let breakpoint = Breakpoint::from_width(width as f32);
    Ring::build(
        descriptors,
        width as f32,
        manifest.tuning.parallax_base,
        generation,
        |s| assets::tiered_path(manifest.resolve_path(s), breakpoint),
    )
}

impl CarouselState {
    pub fn new(manifest: Manifest, viewport: (u32, u32), now_s: f64) -> Self {
        let descriptors = manifest.descriptors();
        let tuning = manifest.tuning.validated();
        let ring = build_ring(&manifest, &descriptors, viewport.0, 1);
        let rest = ring.panels.first().map(|p| p.angle).unwrap_or(0.0);
        let controller =
            RotationController::new(tuning, ring.layout.breakpoint.drag_to_angle()).at_rest(rest);
        let mut camera = CarouselCamera::for_ring(ring.layout.radius, 1.0);
        camera.set_aspect(viewport.0, viewport.1);

        let mut post = PostParams::default();
        post.fisheye_strength = ring.layout.breakpoint.fisheye_strength();
        post.resolution = [viewport.0 as f32, viewport.1 as f32];

        Self {
            ring,
            controller,
            focus: FocusState::default(),
            animations: Animations::new(),
            camera,
            pointer: PointerState::default(),
            post,
            manifest,
            descriptors,
            tuning,
            touches: TouchTracker::default(),
            tilt: 0.0,
            lift: Spring::new(0.0),
            scroll: ScrollState {
                source: ScrollSource::Local,
                local: 0.0,
                external: 0.0,
            },
            viewport,
            debouncer: ResizeDebouncer::new(tuning.resize_debounce_ms),
            hovered: false,
            start_s: now_s,
            last_tick_s: None,
            rendered_rotation: rest,
        }
    }

    pub fn breakpoint(&self) -> Breakpoint {
        self.ring.layout.breakpoint
    }

    pub fn rendered_rotation(&self) -> f32 {
        self.rendered_rotation
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    pub fn focused_meta(&self) -> Option<&PanelMeta> {
        self.focus
            .focused
            .and_then(|i| self.ring.panels.get(i))
            .map(|p| &p.meta)
    }

    pub fn set_scroll_source(&mut self, source: ScrollSource) {
        self.scroll.source = source;
    }

    /// Replaces the media list and tuning; the ring is rebuilt from scratch.
    pub fn replace_manifest(&mut self, manifest: Manifest) {
        self.descriptors = manifest.descriptors();
        self.tuning = manifest.tuning.validated();
        self.manifest = manifest;
        self.rebuild();
        let rest = self.ring.panels.first().map(|p| p.angle).unwrap_or(0.0);
        self.controller =
            RotationController::new(self.tuning, self.breakpoint().drag_to_angle()).at_rest(rest);
        self.debouncer = ResizeDebouncer::new(self.tuning.resize_debounce_ms);
    }

    fn rebuild(&mut self) {
        let generation = self.ring.generation + 1;
        let ring = build_ring(&self.manifest, &self.descriptors, self.viewport.0, generation);
        // panel indices of the old ring are meaningless from here on
        self.animations.clear();
        self.focus.reset();
        self.ring = ring;
        self.controller.set_drag_scale(self.breakpoint().drag_to_angle());
        let eye_y = self.camera.eye.y;
        self.camera = CarouselCamera::for_ring(self.ring.layout.radius, 1.0);
        self.camera.set_aspect(self.viewport.0, self.viewport.1);
        self.camera.set_lift(eye_y);
        self.post.fisheye_strength = self.breakpoint().fisheye_strength();
    }

    fn to_ndc(&self, x: f32, y: f32) -> Vec2 {
        let (w, h) = (self.viewport.0.max(1) as f32, self.viewport.1.max(1) as f32);
        Vec2::new(x / w * 2.0 - 1.0, -(y / h * 2.0 - 1.0)).clamp(Vec2::splat(-1.0), Vec2::splat(1.0))
    }

    // --- input -----------------------------------------------------------

    pub fn pointer_moved(&mut self, x: f32, y: f32, now_ms: f64) {
        self.pointer.ndc = self.to_ndc(x, y);
        self.pointer.device = PointerDevice::Mouse;
        self.pointer.inside = true;
        self.controller.drag(x, now_ms);
    }

    pub fn pointer_left(&mut self) {
        self.pointer.inside = false;
    }

    pub fn pointer_pressed(&mut self, x: f32, y: f32, now_ms: f64) {
        self.pointer.ndc = self.to_ndc(x, y);
        self.pointer.device = PointerDevice::Mouse;
        self.controller.press(x, now_ms);
    }

    pub fn pointer_released(&mut self, now_ms: f64) {
        self.controller.release(now_ms);
    }

    pub fn touch_started(&mut self, id: u64, x: f32, y: f32, now_ms: f64) {
        self.pointer.device = PointerDevice::Touch;
        if self.touches.begin(id, now_ms) == TouchRole::Primary {
            self.pointer.ndc = self.to_ndc(x, y);
            self.pointer.inside = true;
            self.controller.press(x, now_ms);
        }
    }

    pub fn touch_moved(&mut self, id: u64, x: f32, y: f32, now_ms: f64) {
        if self.touches.moved(id, now_ms) == TouchRole::Primary {
            self.pointer.ndc = self.to_ndc(x, y);
            self.controller.drag(x, now_ms);
        }
    }

    pub fn touch_ended(&mut self, id: u64, now_ms: f64) {
        if self.touches.end(id) == TouchRole::Primary {
            self.controller.release(now_ms);
        }
    }

    pub fn wheel(&mut self, delta_px: f32) {
        self.scroll.local = (self.scroll.local + delta_px).clamp(0.0, MAX_LOCAL_SCROLL);
    }

    pub fn external_scroll(&mut self, scroll_y: f32) {
        self.scroll.external = scroll_y.max(0.0);
    }

    /// Viewport changes apply to the camera at once; ring rebuilds wait for the debounce.
    pub fn resized(&mut self, width: u32, height: u32, now_ms: f64) {
        if width == 0 || height == 0 {
            return;
        }
        self.viewport = (width, height);
        self.camera.set_aspect(width, height);
        self.post.resolution = [width as f32, height as f32];
        self.debouncer.push(width, height, now_ms);
    }

    // --- frame -----------------------------------------------------------

    pub fn tick(&mut self, now_s: f64) -> FrameOutput {
        let dt = match self.last_tick_s {
            Some(last) => ((now_s - last) as f32).clamp(0.0, MAX_FRAME_DT),
            None => 0.0,
        };
        self.last_tick_s = Some(now_s);
        let now_ms = now_s * 1000.0;
        let mut output = FrameOutput::default();

        if let Some((width, _)) = self.debouncer.poll(now_ms) {
            if Breakpoint::from_width(width as f32) != self.breakpoint() {
                self.rebuild();
                output.rebuilt = true;
            }
        }

        // 1. rotation
        let angles = self.ring.angles();
        self.controller.update(now_ms, dt, &angles);

        // 2. ambient tilt, render-only
        self.hovered = self.pointer_over_focused();
        if !self.controller.suppresses_tilt() {
            let target = if self.hovered || !self.pointer.inside {
                0.0
            } else {
                dead_zone(self.pointer.ndc.x, self.tuning.tilt_dead_zone) * self.tuning.tilt_max
            };
            self.tilt = smooth_toward(self.tilt, target, self.tuning.tilt_rate, dt);
        }
        self.rendered_rotation = self.controller.current + self.tilt;

        let progress = self.scroll.progress();
        let lift = self.lift.step_dt(-sticky_ease(progress) * MAX_LIFT, LIFT_STIFFNESS, LIFT_DAMPING, dt);
        self.camera.set_lift(lift);

        // 3. focus
        let resolved = focus::most_aligned(
            self.camera.eye,
            self.camera.flat_forward(),
            (0..self.ring.panels.len()).map(|i| self.ring.world_position(i, self.rendered_rotation)),
        );
        if let Some(change) = self.focus.update(resolved) {
            self.on_focus_change(change, now_s);
            output.focus_change = Some(change);
        }

        // 4. one parameter write per panel
        self.write_panel_params(now_s, dt);

        // 5. post chain
        self.post.time = (now_s - self.start_s) as f32;
        self.post.scroll = progress;
        self.post.mouse_x = self.pointer.ndc.x;

        output.rotation = self.rendered_rotation;
        output
    }

    fn on_focus_change(&mut self, change: FocusChange, now_s: f64) {
        // the old panel relaxes back to centre instead of finishing its sweep
        if let Some(previous) = change.previous {
            self.animations.cancel_panel(previous);
        }
        let panel = &self.ring.panels[change.current];
        log::info!(
            "Focus -> panel {} (item {}){}",
            change.current,
            panel.item,
            panel
                .meta
                .title
                .as_deref()
                .map(|t| format!(" \"{t}\""))
                .unwrap_or_default()
        );
        if panel.params.has_parallax() {
            let direction = self.controller.drag_direction();
            for animation in focus::sweep_animations(change.current, direction, now_s, &self.tuning) {
                self.animations.start(animation);
            }
        }
    }

    /// Pointer target for the focused parallax panel, in 0..1 panel space.
    fn focused_pointer_target(&self, now_s: f64) -> (f32, f32) {
        let dragging = self.controller.mode() == Mode::Dragging;
        let touch = self.pointer.device == PointerDevice::Touch;

        if touch && !dragging {
            let t = (now_s - self.start_s) as f32;
            return (
                POINTER_CENTER + IDLE_SWAY_X.0 * (t * IDLE_SWAY_X.1).sin(),
                POINTER_CENTER + IDLE_SWAY_Y.0 * (t * IDLE_SWAY_Y.1).cos(),
            );
        }

        let mut x = (self.pointer.ndc.x + 1.0) * 0.5;
        let mut y = (self.pointer.ndc.y + 1.0) * 0.5;
        if touch {
            let boost = self.tuning.touch_pointer_boost;
            x = POINTER_CENTER + (x - POINTER_CENTER) * boost;
            y = POINTER_CENTER + (y - POINTER_CENTER) * boost;
        }
        if dragging {
            x += self.controller.drag_offset_px() * self.tuning.drag_grab_scale;
        }
        (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0))
    }

    fn write_panel_params(&mut self, now_s: f64, dt: f32) {
        let samples = if self.animations.is_empty() {
            Vec::new()
        } else {
            self.animations.sample(now_s)
        };
        let focused = self.focus.focused;
        let focused_target = self.focused_pointer_target(now_s);

        for panel in &mut self.ring.panels {
            let is_focused = focused == Some(panel.index);
            let frame = PanelFrame {
                pointer_target: Some(if is_focused {
                    focused_target
                } else {
                    (POINTER_CENTER, POINTER_CENTER)
                }),
                pointer_rate: self.tuning.pointer_rate,
                strength_target: Some(self.tuning.parallax_base),
                grayscale: if is_focused {
                    FOCUSED_GRAYSCALE
                } else {
                    UNFOCUSED_GRAYSCALE
                },
                overrides: samples
                    .iter()
                    .filter(|s| s.panel == panel.index)
                    .map(|s| (s.key, s.value))
                    .collect(),
            };
            apply_frame(&mut panel.params, &frame, dt);
        }
    }

    /// Whether the pointer lies over the focused panel's projected rectangle.
    fn pointer_over_focused(&self) -> bool {
        if !self.pointer.inside {
            return false;
        }
        let Some(index) = self.focus.focused else {
            return false;
        };
        if index >= self.ring.panels.len() {
            return false;
        }
        let model = self.ring.model_matrix(index, self.rendered_rotation);
        let centre = self.ring.world_position(index, self.rendered_rotation);
        let half_w = model.transform_vector3(Vec3::X) * (self.ring.layout.panel_width * 0.5);
        let half_h = Vec3::Y * (self.ring.layout.panel_height * 0.5);

        let corners = [
            centre + half_w + half_h,
            centre + half_w - half_h,
            centre - half_w + half_h,
            centre - half_w - half_h,
        ];
        let mut min = Vec2::splat(f32::MAX);
        let mut max = Vec2::splat(f32::MIN);
        for corner in corners {
            let Some(ndc) = self.camera.project(corner) else {
                return false;
            };
            min = min.min(ndc);
            max = max.max(ndc);
        }
        let p = self.pointer.ndc;
        p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ImageItem, PanelMeta};
    use crate::panel::normalize_angle;
    use std::f32::consts::TAU;

    const DT: f64 = 1.0 / 60.0;

    fn manifest(parallax: bool) -> Manifest {
        let item = |n: usize| ImageItem {
            image: format!("item{n}.png"),
            background: parallax.then(|| format!("item{n}-bg.png")),
            depth: parallax.then(|| format!("item{n}-depth.png")),
            background_depth: None,
            meta: PanelMeta {
                title: Some(format!("Item {n}")),
                ..PanelMeta::default()
            },
        };
        Manifest {
            images: (0..4).map(item).collect(),
            ..Manifest::default()
        }
    }

    fn run(state: &mut CarouselState, now: &mut f64, ticks: usize) -> Vec<FrameOutput> {
        (0..ticks)
            .map(|_| {
                *now += DT;
                state.tick(*now)
            })
            .collect()
    }

    fn assert_spotlight(state: &CarouselState) {
        let focused = state.focus.focused.expect("focus resolved");
        for panel in &state.ring.panels {
            let expected = if panel.index == focused {
                FOCUSED_GRAYSCALE
            } else {
                UNFOCUSED_GRAYSCALE
            };
            assert_eq!(panel.params.grayscale, Some(expected), "panel {}", panel.index);
        }
    }

    #[test_log::test]
    fn first_tick_focuses_front_panel() {
        let mut state = CarouselState::new(manifest(true), (1400, 800), 0.0);
        assert_eq!(state.ring.panels.len(), 12);
        assert!((state.ring.layout.panel_width - 5.76).abs() < 0.01);

        let out = state.tick(0.0);
        let change = out.focus_change.expect("initial focus");
        assert_eq!(change.previous, None);
        assert_eq!(change.current, 0);
        assert_eq!(state.focused_meta().and_then(|m| m.title.as_deref()), Some("Item 0"));
        assert_spotlight(&state);
    }

    #[test]
    fn centred_mouse_relaxes_pointer_to_centre() {
        let mut state = CarouselState::new(manifest(true), (1400, 800), 0.0);
        state.pointer_moved(700.0, 400.0, 0.0);
        let mut now = 0.0;
        run(&mut state, &mut now, 240);

        let focused = state.focus.focused.unwrap();
        let params = state.ring.panels[focused].params;
        assert!((params.pointer_x.unwrap() - 0.5).abs() < 1e-3);
        assert!((params.pointer_y.unwrap() - 0.5).abs() < 1e-3);
        assert!((params.parallax_strength.unwrap() - 0.03).abs() < 1e-4);
        assert!(state.animations.is_empty());
    }

    #[test]
    fn drag_release_settles_on_a_panel_and_keeps_spotlight() {
        let mut state = CarouselState::new(manifest(false), (1400, 800), 0.0);
        let mut now = 0.0;
        run(&mut state, &mut now, 2);

        let t = now * 1000.0;
        state.pointer_pressed(500.0, 400.0, t);
        state.pointer_moved(600.0, 400.0, t + 50.0);
        state.pointer_moved(700.0, 400.0, t + 100.0);
        state.pointer_released(t + 100.0);
        now += 0.1;

        for out in run(&mut state, &mut now, 400) {
            assert!(out.rotation.is_finite());
            assert_spotlight(&state);
        }
        assert_eq!(state.controller.mode(), Mode::Idle);

        let landed = normalize_angle(state.controller.current);
        let angles = state.ring.angles();
        assert!(angles
            .iter()
            .any(|a| (a - landed).abs() < 1e-3 || (a - landed).abs() > TAU - 1e-3));
        // focus follows the panel the ring settled on
        let focused = state.focus.focused.unwrap();
        let d = (normalize_angle(state.ring.panels[focused].angle) - landed).abs();
        assert!(d < TAU / 24.0 || d > TAU - TAU / 24.0);
    }

    #[test]
    fn focus_change_sweeps_exactly_once() {
        let mut state = CarouselState::new(manifest(true), (1400, 800), 0.0);
        let mut now = 0.0;
        state.tick(now);
        run(&mut state, &mut now, 120);
        assert!(state.animations.is_empty());

        // rotate by one panel step without gestures
        let step = state.ring.layout.angle_step;
        state.controller.target += step;
        let outputs = run(&mut state, &mut now, 240);
        let changes: Vec<_> = outputs.iter().filter_map(|o| o.focus_change).collect();
        assert_eq!(changes.len(), 1);
        let b = changes[0].current;
        assert_eq!(changes[0].previous, Some(0));
        assert!(state.animations.is_empty());
        assert_eq!(state.focus.focused, Some(b));
    }

    #[test]
    fn sweep_drives_pointer_while_running() {
        let mut state = CarouselState::new(manifest(true), (1400, 800), 0.0);
        state.pointer_moved(700.0, 400.0, 0.0);
        let out = state.tick(0.0);
        let focused = out.focus_change.unwrap().current;
        assert_eq!(state.animations.len(), 2);
        assert_eq!(state.ring.panels[focused].params.pointer_x, Some(focus::SWEEP_LOW));

        let mut now = 0.0;
        run(&mut state, &mut now, 30);
        let x = state.ring.panels[focused].params.pointer_x.unwrap();
        assert!(x > 0.5 && x < focus::SWEEP_HIGH, "{x}");
    }

    #[test]
    fn previous_panel_relaxes_when_focus_moves_mid_sweep() {
        let mut state = CarouselState::new(manifest(true), (1400, 800), 0.0);
        let a = state.tick(0.0).focus_change.unwrap().current;
        let mut now = 0.0;
        run(&mut state, &mut now, 15);

        let step = state.ring.layout.angle_step;
        state.controller.current += step;
        state.controller.target += step;
        now += DT;
        let change = state.tick(now).focus_change.expect("focus moved");
        assert_eq!(change.previous, Some(a));
        assert_ne!(change.current, a);
        // only the new panel's sweep and boost remain
        assert_eq!(state.animations.len(), 2);

        let mut distance = (state.ring.panels[a].params.pointer_x.unwrap() - POINTER_CENTER).abs();
        for _ in 0..40 {
            now += DT;
            state.tick(now);
            let x = state.ring.panels[a].params.pointer_x.unwrap();
            let d = (x - POINTER_CENTER).abs();
            assert!(d <= distance + 1e-6, "pointer_x {x} moved away from centre");
            distance = d;
        }
        assert!(distance < 0.05, "{distance}");
    }

    #[test]
    fn unsettling_friction_is_replaced_and_the_ring_snaps() {
        let mut manifest = manifest(true);
        manifest.tuning.friction = 1.0;
        let mut state = CarouselState::new(manifest, (1400, 800), 0.0);
        let mut now = 0.0;
        state.tick(now);

        state.pointer_pressed(500.0, 400.0, 0.0);
        state.pointer_moved(600.0, 400.0, 50.0);
        state.pointer_moved(700.0, 400.0, 100.0);
        state.pointer_released(100.0);
        now += 0.1;
        run(&mut state, &mut now, 600);
        assert_eq!(state.controller.mode(), Mode::Idle);
    }

    #[test]
    fn resize_rebuilds_only_on_breakpoint_crossing() {
        let mut state = CarouselState::new(manifest(true), (1400, 800), 0.0);
        let mut now = 0.0;
        run(&mut state, &mut now, 2);

        state.resized(1300, 800, now * 1000.0);
        let outputs = run(&mut state, &mut now, 30);
        assert!(outputs.iter().all(|o| !o.rebuilt));
        assert_eq!(state.ring.generation, 1);

        state.resized(900, 700, now * 1000.0);
        state.resized(500, 700, now * 1000.0 + 10.0);
        let early = run(&mut state, &mut now, 5);
        assert!(early.iter().all(|o| !o.rebuilt));
        let outputs = run(&mut state, &mut now, 30);
        assert_eq!(outputs.iter().filter(|o| o.rebuilt).count(), 1);
        assert_eq!(state.breakpoint(), Breakpoint::Narrow);
        assert_eq!(state.ring.generation, 2);
        assert!((state.ring.layout.radius - 6.0).abs() < 1e-6);
        assert_spotlight(&state);
    }

    #[test]
    fn second_finger_does_not_rotate() {
        let mut state = CarouselState::new(manifest(true), (1400, 800), 0.0);
        state.tick(0.0);
        state.touch_started(1, 500.0, 400.0, 10.0);
        state.touch_started(2, 900.0, 400.0, 12.0);
        let before = state.controller.target;
        state.touch_moved(1, 800.0, 400.0, 30.0);
        state.touch_moved(2, 100.0, 400.0, 30.0);
        assert_eq!(state.controller.target, before);

        state.touch_ended(2, 40.0);
        state.touch_ended(1, 50.0);
        assert_eq!(state.controller.mode(), Mode::Momentum);
        // stray end without a start
        state.touch_ended(9, 60.0);
        assert_eq!(state.controller.mode(), Mode::Momentum);
    }

    #[test]
    fn touch_rotation_recovers_after_a_lost_end() {
        let mut state = CarouselState::new(manifest(true), (1400, 800), 0.0);
        state.tick(0.0);
        state.touch_started(1, 500.0, 400.0, 10.0);
        state.touch_moved(1, 520.0, 400.0, 26.0);
        // the end of touch 1 was swallowed by the host

        state.touch_started(2, 500.0, 400.0, 3000.0);
        let before = state.controller.target;
        state.touch_moved(2, 700.0, 400.0, 3050.0);
        assert!(state.controller.target != before);
        state.touch_ended(2, 3060.0);
        assert_eq!(state.controller.mode(), Mode::Momentum);
    }

    #[test]
    fn idle_touch_keeps_parallax_moving() {
        let mut state = CarouselState::new(manifest(true), (1400, 800), 0.0);
        state.touch_started(1, 700.0, 400.0, 0.0);
        state.touch_ended(1, 0.0);
        let mut now = 0.0;
        run(&mut state, &mut now, 200);
        let focused = state.focus.focused.unwrap();
        let a = state.ring.panels[focused].params.pointer_x.unwrap();
        run(&mut state, &mut now, 60);
        let b = state.ring.panels[focused].params.pointer_x.unwrap();
        assert!((a - b).abs() > 1e-3);
    }

    #[test]
    fn tilt_is_render_only_and_frozen_while_dragging() {
        let mut state = CarouselState::new(manifest(false), (1400, 800), 0.0);
        state.pointer_moved(1400.0, 20.0, 0.0);
        let mut now = 0.0;
        run(&mut state, &mut now, 120);
        let tilt = state.rendered_rotation() - state.controller.current;
        assert!(tilt > 0.01);
        assert_eq!(state.controller.target, state.controller.current);

        state.pointer_pressed(1400.0, 20.0, now * 1000.0);
        run(&mut state, &mut now, 30);
        let frozen = state.rendered_rotation() - state.controller.current;
        assert!((frozen - tilt).abs() < 1e-4);
    }

    #[test]
    fn scroll_lifts_camera() {
        let mut state = CarouselState::new(manifest(false), (1400, 800), 0.0);
        state.wheel(10_000.0);
        let mut now = 0.0;
        run(&mut state, &mut now, 300);
        assert_eq!(state.post.scroll, 1.0);
        assert!((state.camera.eye.y + MAX_LIFT).abs() < 1e-2);

        state.set_scroll_source(ScrollSource::External);
        state.external_scroll(0.0);
        run(&mut state, &mut now, 300);
        assert_eq!(state.post.scroll, 0.0);
        assert!(state.camera.eye.y.abs() < 1e-2);
    }

    #[test]
    fn empty_manifest_ticks_without_focus() {
        let mut state = CarouselState::new(Manifest::default(), (800, 600), 0.0);
        let out = state.tick(0.0);
        assert!(out.focus_change.is_none());
        state.pointer_pressed(10.0, 10.0, 0.0);
        state.pointer_released(20.0);
        let mut now = 0.0;
        run(&mut state, &mut now, 60);
        assert_eq!(state.controller.mode(), Mode::Idle);
    }
}
