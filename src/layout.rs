// layout.rs — responsive ring layout and resize debouncing

use std::f32::consts::TAU;

pub const NARROW_MAX_WIDTH: f32 = 600.0;
pub const MEDIUM_MAX_WIDTH: f32 = 1000.0;

pub const BASE_RADIUS: f32 = 10.0;
/// Adjacent panels overlap slightly so no gap shows between them.
pub const OVERLAP_FACTOR: f32 = 1.1;
pub const PANEL_ASPECT: f32 = 16.0 / 9.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Breakpoint {
    Narrow,
    Medium,
    Wide,
}

impl Breakpoint {
    pub fn from_width(width: f32) -> Self {
        if width < NARROW_MAX_WIDTH {
            Breakpoint::Narrow
        } else if width < MEDIUM_MAX_WIDTH {
            Breakpoint::Medium
        } else {
            Breakpoint::Wide
        }
    }

    pub fn scale(self) -> f32 {
        match self {
            Breakpoint::Narrow => 0.6,
            Breakpoint::Medium => 0.8,
            Breakpoint::Wide => 1.0,
        }
    }

    pub fn segments(self) -> u32 {
        match self {
            Breakpoint::Narrow => 16,
            Breakpoint::Medium => 32,
            Breakpoint::Wide => 64,
        }
    }

    /// Radians of ring rotation per pixel of horizontal drag.
    pub fn drag_to_angle(self) -> f32 {
        match self {
            Breakpoint::Narrow => 0.008,
            Breakpoint::Medium => 0.006,
            Breakpoint::Wide => 0.005,
        }
    }

    pub fn fisheye_strength(self) -> f32 {
        match self {
            Breakpoint::Narrow => 0.05,
            Breakpoint::Medium => 0.08,
            Breakpoint::Wide => 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingLayout {
    pub breakpoint: Breakpoint,
    pub radius: f32,
    pub panel_count: usize,
    pub angle_step: f32,
    pub panel_width: f32,
    pub panel_height: f32,
    pub segments: u32,
}

/// Lays out `panel_count` panels for a viewport `width` pixels wide.
pub fn resolve(width: f32, panel_count: usize) -> RingLayout {
    let breakpoint = Breakpoint::from_width(width);
    let radius = BASE_RADIUS * breakpoint.scale();
    let angle_step = if panel_count == 0 {
        TAU
    } else {
        TAU / panel_count as f32
    };
    let panel_width = radius * angle_step * OVERLAP_FACTOR;

    RingLayout {
        breakpoint,
        radius,
        panel_count,
        angle_step,
        panel_width,
        panel_height: panel_width / PANEL_ASPECT,
        segments: breakpoint.segments(),
    }
}

/// Collapses a burst of resize events into one, delivered after a quiet period.
#[derive(Debug, Clone)]
pub struct ResizeDebouncer {
    quiet_ms: f64,
    pending: Option<(u32, u32)>,
    last_event_ms: f64,
}

impl ResizeDebouncer {
    pub fn new(quiet_ms: f64) -> Self {
        Self {
            quiet_ms,
            pending: None,
            last_event_ms: 0.0,
        }
    }

    pub fn push(&mut self, width: u32, height: u32, now_ms: f64) {
        self.pending = Some((width, height));
        self.last_event_ms = now_ms;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the latest size once no resize arrived for the quiet period.
    pub fn poll(&mut self, now_ms: f64) -> Option<(u32, u32)> {
        if self.is_pending() && now_ms - self.last_event_ms >= self.quiet_ms {
            return self.pending.take();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoints_partition_widths() {
        assert_eq!(Breakpoint::from_width(0.0), Breakpoint::Narrow);
        assert_eq!(Breakpoint::from_width(599.9), Breakpoint::Narrow);
        assert_eq!(Breakpoint::from_width(600.0), Breakpoint::Medium);
        assert_eq!(Breakpoint::from_width(999.0), Breakpoint::Medium);
        assert_eq!(Breakpoint::from_width(1000.0), Breakpoint::Wide);
        assert_eq!(Breakpoint::from_width(4000.0), Breakpoint::Wide);
    }

    #[test]
    fn ring_closes_for_any_count() {
        for count in 1..40 {
            for width in [320.0, 800.0, 1400.0] {
                let layout = resolve(width, count);
                let total = layout.angle_step * count as f32;
                assert!((total - TAU).abs() < 1e-4, "count {count}: {total}");
            }
        }
    }

    #[test]
    fn wide_ring_of_four_tripled() {
        let layout = resolve(1400.0, 12);
        assert_eq!(layout.breakpoint, Breakpoint::Wide);
        assert_eq!(layout.radius, 10.0);
        assert_eq!(layout.segments, 64);
        let expected = 10.0 * (TAU / 12.0) * 1.1;
        assert!((layout.panel_width - expected).abs() < 1e-5);
        assert!((layout.panel_width - 5.76).abs() < 0.01);
        assert!((layout.panel_height - layout.panel_width * 9.0 / 16.0).abs() < 1e-5);
    }

    #[test]
    fn narrow_scales_down() {
        let layout = resolve(400.0, 12);
        assert_eq!(layout.breakpoint, Breakpoint::Narrow);
        assert!((layout.radius - 6.0).abs() < 1e-6);
        assert_eq!(layout.segments, 16);
    }

    #[test]
    fn debouncer_waits_for_quiet_period() {
        let mut debouncer = ResizeDebouncer::new(250.0);
        debouncer.push(800, 600, 0.0);
        debouncer.push(900, 600, 100.0);
        assert_eq!(debouncer.poll(200.0), None);
        debouncer.push(1200, 700, 300.0);
        assert_eq!(debouncer.poll(500.0), None);
        assert_eq!(debouncer.poll(550.0), Some((1200, 700)));
        assert_eq!(debouncer.poll(900.0), None);
        assert!(!debouncer.is_pending());
    }
}
