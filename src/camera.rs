// camera.rs — perspective camera placed inside the ring, looking along +Z

use glam::{Mat4, Vec2, Vec3};

/// Camera sits this fraction of the radius behind the ring centre.
const BACK_OFFSET: f32 = 0.4;
const FOV_Y_DEG: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarouselCamera {
    pub eye: Vec3,
    pub forward: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl CarouselCamera {
    pub fn for_ring(radius: f32, aspect: f32) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, -radius * BACK_OFFSET),
            forward: Vec3::Z,
            fov_y: FOV_Y_DEG.to_radians(),
            aspect: if aspect > 0.0 { aspect } else { 1.0 },
            near: 0.1,
            far: radius * 4.0 + 10.0,
        }
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Vertical offset of the eye; the view direction is unchanged.
    pub fn set_lift(&mut self, y: f32) {
        self.eye.y = y;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.eye, self.forward, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Forward direction with the vertical component removed.
    pub fn flat_forward(&self) -> Vec3 {
        let flat = Vec3::new(self.forward.x, 0.0, self.forward.z);
        let n = flat.normalize_or_zero();
        if n == Vec3::ZERO {
            Vec3::Z
        } else {
            n
        }
    }

    /// Normalized device coordinates of a world point, or `None` behind the camera.
    pub fn project(&self, point: Vec3) -> Option<Vec2> {
        let clip = self.view_proj() * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        Some(Vec2::new(clip.x / clip.w, clip.y / clip.w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ahead_projects_to_centre() {
        let camera = CarouselCamera::for_ring(10.0, 16.0 / 9.0);
        let ndc = camera.project(Vec3::new(0.0, 0.0, 10.0)).unwrap();
        assert!(ndc.length() < 1e-5);
        assert!(camera.project(Vec3::new(0.0, 0.0, -20.0)).is_none());
    }

    #[test]
    fn screen_right_is_negative_x() {
        let camera = CarouselCamera::for_ring(10.0, 1.0);
        let ndc = camera.project(Vec3::new(-1.0, 0.0, 10.0)).unwrap();
        assert!(ndc.x > 0.0);
    }

    #[test]
    fn flat_forward_ignores_pitch() {
        let mut camera = CarouselCamera::for_ring(10.0, 1.0);
        camera.forward = Vec3::new(0.0, -0.5, 1.0).normalize();
        assert!((camera.flat_forward() - Vec3::Z).length() < 1e-6);
        camera.forward = Vec3::Y;
        assert_eq!(camera.flat_forward(), Vec3::Z);
    }
}
