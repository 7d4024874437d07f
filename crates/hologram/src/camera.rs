use glam::{Mat4, Vec3, Vec4};

/// Camera placement before zoom is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    pub eye: Vec3,
    pub center: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraRig {
    /// Places the eye `distance` units in front of `center` along +Z.
    pub fn looking_at(center: Vec3, distance: f32, fov_y_degrees: f32) -> Self {
        Self {
            eye: center + Vec3::Z * distance,
            center,
            up: Vec3::Y,
            fov_y: fov_y_degrees.to_radians(),
            ..Self::default()
        }
    }
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 450.0),
            center: Vec3::new(0.0, 0.0, 50.0),
            up: Vec3::Y,
            fov_y: 45f32.to_radians(),
            near: 1.0,
            far: 6000.0,
        }
    }
}

/// View and projection matrices for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub proj: Mat4,
}

impl CameraMatrices {
    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.view
    }

    pub fn is_finite(&self) -> bool {
        self.view.is_finite() && self.proj.is_finite()
    }

    /// Clip-space position of a world point.
    pub fn project(&self, world: Vec3) -> Vec4 {
        self.view_proj() * world.extend(1.0)
    }

    /// Distance in front of the camera; positive means visible side.
    pub fn view_depth(&self, world: Vec3) -> f32 {
        -(self.view * world.extend(1.0)).z
    }
}

/// Builds right-handed look-at and perspective matrices.
///
/// Zoom moves the eye towards (`zoom > 1`) or away from (`zoom < 1`) the
/// centre along the view axis; the field of view never changes.
pub fn camera_matrices(rig: &CameraRig, aspect: f32, zoom: f32) -> CameraMatrices {
    let zoom = if zoom > 0.0 { zoom } else { f32::EPSILON };
    let eye = rig.center + (rig.eye - rig.center) / zoom;
    CameraMatrices {
        view: Mat4::look_at_rh(eye, rig.center, rig.up),
        proj: Mat4::perspective_rh(rig.fov_y, aspect.max(f32::EPSILON), rig.near, rig.far),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_projects_to_screen_middle() {
        let rig = CameraRig::default();
        let matrices = camera_matrices(&rig, 16.0 / 9.0, 1.0);
        let clip = matrices.project(rig.center);
        assert!(clip.w > 0.0);
        assert!((clip.x / clip.w).abs() < 1e-5);
        assert!((clip.y / clip.w).abs() < 1e-5);
        let ndc_z = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&ndc_z));
    }

    #[test]
    fn zoom_moves_eye_instead_of_fov() {
        let rig = CameraRig::default();
        let base = camera_matrices(&rig, 1.0, 1.0);
        let zoomed = camera_matrices(&rig, 1.0, 2.0);
        assert_eq!(base.proj, zoomed.proj);
        assert!((base.view_depth(rig.center) - 400.0).abs() < 1e-3);
        assert!((zoomed.view_depth(rig.center) - 200.0).abs() < 1e-3);
    }

    #[test]
    fn zoom_out_pushes_eye_back() {
        let rig = CameraRig::default();
        let matrices = camera_matrices(&rig, 1.0, 0.5);
        assert!((matrices.view_depth(rig.center) - 800.0).abs() < 1e-3);
    }

    #[test]
    fn looking_at_places_eye_on_positive_z() {
        let rig = CameraRig::looking_at(Vec3::new(0.0, 0.0, 50.0), 300.0, 60.0);
        assert_eq!(rig.eye, Vec3::new(0.0, 0.0, 350.0));
        assert!((rig.fov_y - 60f32.to_radians()).abs() < 1e-6);
        assert_eq!(rig.far, CameraRig::default().far);
    }
}
