use hologram::{
    build_field, load_field, update_particles, CameraRig, Category, ControlKind, Controls,
    FieldParams, Hologram, Particle, ParticleField, SoftwareTarget, Z_BACK, Z_FRONT,
};
use image::{GrayImage, Luma, Rgb, RgbImage};

fn gray_ramp() -> (RgbImage, GrayImage) {
    let color = RgbImage::from_pixel(4, 4, Rgb([128, 128, 128]));
    let depth = GrayImage::from_fn(4, 4, |_, y| Luma([(y * 85) as u8]));
    (color, depth)
}

fn positions(field: &ParticleField) -> Vec<[u32; 3]> {
    field
        .particles()
        .iter()
        .map(|p| p.position.to_array().map(f32::to_bits))
        .collect()
}

#[test]
fn four_by_four_ramp_builds_sixteen_mid_gray_particles() {
    let (color, depth) = gray_ramp();
    let params = FieldParams {
        target_count: 16,
        ..FieldParams::default()
    };
    let field = build_field(&color, &depth, &params).unwrap();

    assert_eq!(field.len(), 16);
    assert_eq!(field.stride(), 1);
    assert!(field
        .particles()
        .iter()
        .all(|p| p.category() == Category::Bright));
    assert_eq!(field.category_histogram(), [0, 0, 16, 0]);

    // World Y falls as the source row index grows; Z must grow with the row.
    let span = params.world_span / 4.0;
    let mut by_row: Vec<(u32, f32)> = field
        .particles()
        .iter()
        .map(|p| {
            let row = (2.0 - p.original_position.y / span - 0.5).round() as u32;
            (row, p.original_position.z)
        })
        .collect();
    by_row.sort_by_key(|(row, _)| *row);
    for pair in by_row.windows(2) {
        let ((row_a, z_a), (row_b, z_b)) = (pair[0], pair[1]);
        if row_a < row_b {
            assert!(z_a < z_b, "row {row_a} z {z_a} should be behind row {row_b} z {z_b}");
        } else {
            assert_eq!(z_a, z_b);
        }
    }
    assert_eq!(field.depth_bounds(), Some((Z_BACK, Z_FRONT)));
}

#[test]
fn repeating_frame_zero_controls_reproduces_positions() {
    let (color, depth) = gray_ramp();
    let field = build_field(&color, &depth, &FieldParams::default()).unwrap();
    let originals: Vec<_> = field.particles().iter().map(|p| p.original_position).collect();

    let controls = Controls::default()
        .with(ControlKind::Wobble, 0.6)
        .with(ControlKind::DepthScale, 3.0)
        .with(ControlKind::RotationSpeed, 0.0);

    let mut hologram = Hologram::new(field, CameraRig::default());
    let frame_zero_state = hologram.tick(0.0, controls, 1.0);
    let frame_zero = positions(hologram.field());

    // Churn through frames with other settings; time advances, so pin it
    // back by comparing against a fresh hologram at the same clock.
    let busy = Controls::default()
        .with(ControlKind::Wobble, 1.0)
        .with(ControlKind::DepthScale, -5.0)
        .with(ControlKind::RotationSpeed, 3.0);
    for _ in 0..120 {
        hologram.tick(1.0 / 60.0, busy, 1.0);
    }
    assert!(hologram
        .field()
        .particles()
        .iter()
        .zip(&originals)
        .all(|(p, o)| p.original_position == *o));

    // Feeding frame 0's uniforms back into the churned field lands every
    // particle exactly where frame 0 put it.
    let mut replayed = hologram.field().particles().to_vec();
    let bits = |particles: &[Particle]| -> Vec<[u32; 3]> {
        particles
            .iter()
            .map(|p| p.position.to_array().map(f32::to_bits))
            .collect()
    };
    assert_ne!(bits(&replayed), frame_zero);
    let recovered = update_particles(&mut replayed, &frame_zero_state.uniforms);
    assert_eq!(recovered, frame_zero_state.recovered);
    assert_eq!(bits(&replayed), frame_zero);

    let (color, depth) = gray_ramp();
    let mut fresh = Hologram::new(
        build_field(&color, &depth, &FieldParams::default()).unwrap(),
        CameraRig::default(),
    );
    fresh.tick(0.0, controls, 1.0);
    assert_eq!(positions(fresh.field()), frame_zero);
}

#[test]
fn same_clock_and_controls_give_identical_frames() {
    let (color, depth) = gray_ramp();
    let controls = Controls::default().with(ControlKind::Wobble, 0.8);

    let mut a = Hologram::new(
        build_field(&color, &depth, &FieldParams::default()).unwrap(),
        CameraRig::default(),
    );
    let mut b = a.clone();
    for _ in 0..30 {
        a.tick(1.0 / 30.0, controls, 1.0);
    }
    // b takes the same frames but with different sliders in between.
    for i in 0..30 {
        let c = if i < 29 {
            Controls::default().with(ControlKind::DepthScale, -4.0)
        } else {
            controls
        };
        b.tick(1.0 / 30.0, c, 1.0);
    }
    // Rotation speed equals the default in both, so the clocks agree.
    assert_eq!(a.clock(), b.clock());
    assert_eq!(positions(a.field()), positions(b.field()));
}

#[test]
fn missing_assets_render_an_empty_frame() {
    let dir = tempfile::tempdir().unwrap();
    let color = dir.path().join("color.png");
    let depth = dir.path().join("depth.png");
    let field = ParticleField::load_or_empty(&color, &depth, &FieldParams::default());
    assert!(field.is_empty());

    let mut hologram = Hologram::new(field, CameraRig::default());
    let mut target = SoftwareTarget::new(16, 16);
    let (_, stats) = hologram.render_software(1.0 / 60.0, Controls::default(), &mut target);
    assert_eq!(stats.drawn, 0);
    assert!(target
        .to_image()
        .pixels()
        .all(|px| px.0 == [0, 0, 0, 255]));
}

#[test]
fn assets_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (color, depth) = gray_ramp();
    let color_path = dir.path().join("color.png");
    let depth_path = dir.path().join("depth.png");
    color.save(&color_path).unwrap();
    depth.save(&depth_path).unwrap();

    let field = load_field(&color_path, &depth_path, &FieldParams::default()).unwrap();
    assert_eq!(field.len(), 16);
    assert_eq!(field.source_size(), (4, 4));

    let mut hologram = Hologram::new(field, CameraRig::default());
    let mut target = SoftwareTarget::new(96, 96);
    let (state, stats) = hologram.render_software(0.0, Controls::default(), &mut target);
    assert_eq!(state.recovered, 0);
    assert_eq!(stats.drawn, 16);
    assert!(target.covered_pixels() > 0);
}
