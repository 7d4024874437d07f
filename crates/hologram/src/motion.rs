//! Per-frame motion kernel.
//!
//! Every output is a pure function of a particle's `original_position` and the
//! frame uniforms, so frames never accumulate drift and particles can be
//! updated in any order. `renderer/src/gpu/shaders/motion.wgsl` mirrors this
//! file; keep the constants in sync.

use std::f32::consts::TAU;

use glam::Vec3;
use rayon::prelude::*;

use crate::controls::{wrap_angle, FrameUniforms};
use crate::particle::Particle;
use crate::{Z_BACK, Z_FRONT};

/// How far (world units) a fully-back particle moves per unit of depth scale.
pub const DEPTH_SPREAD: f32 = 50.0;
/// Fixed pivot of the global rotation.
pub const ORBITAL_CENTER: Vec3 = Vec3::new(0.0, 0.0, 50.0);
/// Peak wobble displacement per axis at `wobble = 1`.
pub const WOBBLE_AMPLITUDE: f32 = 8.0;
/// Positions with Z below this are reset.
pub const RECOVERY_Z: f32 = -150.0;
/// Extra push-back applied to a recovered particle.
pub const RECOVERY_OFFSET: f32 = 20.0;

const HASH_DOT: Vec3 = Vec3::new(12.9898, 78.233, 37.719);
const HASH_SCALE: f32 = 43758.5453;
const AXIS_SALTS: [Vec3; 3] = [
    Vec3::new(1.7, 9.2, 4.1),
    Vec3::new(8.3, 2.8, 5.5),
    Vec3::new(3.9, 6.1, 7.4),
];

/// Result of running the kernel for one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionOutput {
    pub position: Vec3,
    pub normalized_depth: f32,
    /// True when the runaway clamp replaced the position.
    pub recovered: bool,
}

/// Reproducible hash of a position into `[0, 1)`.
pub fn position_hash(p: Vec3) -> f32 {
    let v = (p.dot(HASH_DOT)).sin() * HASH_SCALE;
    let f = v - v.floor();
    if f >= 1.0 {
        0.0
    } else {
        f
    }
}

/// Source Z rescaled so the front of the range is 0 and the back is 1.
pub fn normalized_depth(z: f32) -> f32 {
    ((Z_FRONT - z) / (Z_FRONT - Z_BACK)).clamp(0.0, 1.0)
}

fn rotate_about_orbit(p: Vec3, angle: f32) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    let dx = p.x - ORBITAL_CENTER.x;
    let dz = p.z - ORBITAL_CENTER.z;
    Vec3::new(
        ORBITAL_CENTER.x + dx * cos + dz * sin,
        p.y,
        ORBITAL_CENTER.z - dx * sin + dz * cos,
    )
}

fn wobble_offset(original: Vec3, elapsed: f32, wobble: f32) -> Vec3 {
    let weight = 0.5 + 0.5 * position_hash(original);
    let amplitude = wobble * WOBBLE_AMPLITUDE * weight;
    let mut offset = [0.0f32; 3];
    for (axis, salt) in AXIS_SALTS.iter().enumerate() {
        let frequency = 0.5 + position_hash(original + *salt) * 1.5;
        let phase = position_hash(original + *salt * 2.0) * TAU;
        offset[axis] = (elapsed * frequency + phase).sin() * amplitude;
    }
    Vec3::from_array(offset)
}

/// Computes one particle's position and normalized depth for this frame.
pub fn apply_motion(original: Vec3, frame: &FrameUniforms) -> MotionOutput {
    let controls = &frame.controls;
    let depth = normalized_depth(original.z);

    let mut working = original;
    working.z -= depth * controls.depth_scale * DEPTH_SPREAD;

    let rotated = rotate_about_orbit(working, wrap_angle(frame.rotation));
    let mut position = rotated;
    if controls.wobble > 0.0 {
        position += wobble_offset(original, frame.elapsed, controls.wobble);
    }

    if position.z < RECOVERY_Z {
        return MotionOutput {
            position: rotated - Vec3::Z * RECOVERY_OFFSET,
            normalized_depth: depth,
            recovered: true,
        };
    }

    MotionOutput {
        position,
        normalized_depth: depth,
        recovered: false,
    }
}

/// Runs the kernel over every particle in parallel and returns how many were
/// recovered this frame.
pub fn update_particles(particles: &mut [Particle], frame: &FrameUniforms) -> usize {
    particles
        .par_iter_mut()
        .map(|particle| {
            let out = apply_motion(particle.original_position, frame);
            particle.position = out.position;
            particle.normalized_depth = out.normalized_depth;
            if out.recovered {
                particle.velocity = Vec3::ZERO;
            }
            usize::from(out.recovered)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{ControlKind, Controls};

    fn frame(elapsed: f32, rotation: f32, controls: Controls) -> FrameUniforms {
        FrameUniforms::new(elapsed, rotation, controls)
    }

    #[test]
    fn hash_is_stable_and_in_unit_range() {
        let p = Vec3::new(-12.5, 33.0, 47.0);
        assert_eq!(position_hash(p), position_hash(p));
        for i in 0..500 {
            let q = Vec3::new(i as f32 * 0.37, -(i as f32) * 1.3, 20.0 + i as f32 * 0.1);
            let h = position_hash(q);
            assert!((0.0..1.0).contains(&h), "hash {h} out of range");
        }
    }

    #[test]
    fn kernel_is_idempotent() {
        let controls = Controls::default()
            .with(ControlKind::Wobble, 0.7)
            .with(ControlKind::DepthScale, 2.5);
        let f = frame(3.25, 1.1, controls);
        let original = Vec3::new(40.0, -12.0, 33.0);
        let a = apply_motion(original, &f);
        let b = apply_motion(original, &f);
        assert_eq!(a.position.to_array().map(f32::to_bits), b.position.to_array().map(f32::to_bits));
        assert_eq!(a.normalized_depth.to_bits(), b.normalized_depth.to_bits());
    }

    #[test]
    fn zero_depth_scale_keeps_source_depth() {
        let controls = Controls::default()
            .with(ControlKind::DepthScale, 0.0)
            .with(ControlKind::Wobble, 0.0);
        let f = frame(0.0, 0.0, controls);
        for z in [20.0, 35.0, 50.0, 80.0] {
            let original = Vec3::new(5.0, 6.0, z);
            let out = apply_motion(original, &f);
            assert!((out.position.z - z).abs() < 1e-5);
        }
    }

    #[test]
    fn depth_scale_pushes_back_particles_further() {
        let controls = Controls::default().with(ControlKind::DepthScale, 2.0);
        let f = frame(0.0, 0.0, controls);
        let front = apply_motion(Vec3::new(0.0, 0.0, Z_FRONT), &f);
        let back = apply_motion(Vec3::new(0.0, 0.0, Z_BACK), &f);
        assert_eq!(front.normalized_depth, 0.0);
        assert_eq!(back.normalized_depth, 1.0);
        assert!((front.position.z - Z_FRONT).abs() < 1e-5);
        assert!((back.position.z - (Z_BACK - 2.0 * DEPTH_SPREAD)).abs() < 1e-4);
    }

    #[test]
    fn rotation_wraps_modulo_tau() {
        let controls = Controls::default();
        let original = Vec3::new(60.0, 10.0, 30.0);
        let a = apply_motion(original, &frame(0.0, 0.8, controls));
        let b = apply_motion(original, &frame(0.0, 0.8 + TAU, controls));
        assert!((a.position - b.position).length() < 1e-3);
    }

    #[test]
    fn rotation_leaves_y_untouched_and_orbits_center() {
        let controls = Controls::default().with(ControlKind::DepthScale, 0.0);
        let original = Vec3::new(100.0, 42.0, 50.0);
        let out = apply_motion(original, &frame(0.0, std::f32::consts::FRAC_PI_2, controls));
        assert_eq!(out.position.y, 42.0);
        assert!(out.position.x.abs() < 1e-3);
        assert!((out.position.z - (50.0 - 100.0)).abs() < 1e-3);
    }

    #[test]
    fn wobble_is_bounded_and_position_keyed() {
        let still = Controls::default();
        let shaky = still.with(ControlKind::Wobble, 1.0);
        let original = Vec3::new(-25.0, 18.0, 60.0);
        let base = apply_motion(original, &frame(2.0, 0.3, still)).position;
        let moved = apply_motion(original, &frame(2.0, 0.3, shaky)).position;
        let delta = moved - base;
        assert!(delta.abs().max_element() <= WOBBLE_AMPLITUDE + 1e-4);
        assert!(delta.length() > 0.0);
    }

    #[test]
    fn runaway_particles_are_recovered_without_wobble() {
        let controls = Controls::default()
            .with(ControlKind::DepthScale, 5.0)
            .with(ControlKind::Wobble, 1.0);
        let original = Vec3::new(0.0, 0.0, Z_BACK);
        let out = apply_motion(original, &frame(1.0, 0.0, controls));
        assert!(out.recovered);
        let expected_z = Z_BACK - 5.0 * DEPTH_SPREAD - RECOVERY_OFFSET;
        assert!((out.position.z - expected_z).abs() < 1e-3);
        assert_eq!(out.position.x, 0.0);
    }

    #[test]
    fn update_writes_positions_and_zeroes_recovered_velocity() {
        let mut particles = vec![
            Particle::new(Vec3::new(0.0, 0.0, Z_BACK), Vec3::ONE, 0.0, crate::Category::Dark),
            Particle::new(Vec3::new(0.0, 0.0, Z_FRONT), Vec3::ONE, 1.0, crate::Category::Dark),
        ];
        particles[0].velocity = Vec3::splat(3.0);
        let controls = Controls::default().with(ControlKind::DepthScale, 5.0);
        let recovered = update_particles(&mut particles, &frame(0.0, 0.0, controls));
        assert_eq!(recovered, 1);
        assert_eq!(particles[0].velocity, Vec3::ZERO);
        assert_eq!(particles[0].normalized_depth, 1.0);
        assert_eq!(particles[1].normalized_depth, 0.0);
        assert_eq!(particles[1].original_position, Vec3::new(0.0, 0.0, Z_FRONT));
    }
}
