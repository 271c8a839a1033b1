//! Renderer front-end tests across the CPU strategies.

use spheretrace::camera::Camera;
use spheretrace::compositor::{FilterKind, FilterParams, GhostParams, SpatialFilter};
use spheretrace::film::Film;
use spheretrace::geom::Sphere;
use spheretrace::level::Level;
use spheretrace::scene::{Material, PlayerAvatar, Scene};
use spheretrace::util::Vec3;
use spheretrace::{Error, RenderConfig, Renderer, RendererKind};

const W: u32 = 24;
const H: u32 = 16;

fn config(renderer: RendererKind, spp: u32) -> RenderConfig {
    RenderConfig {
        width: W,
        height: H,
        samples_per_pass: spp,
        renderer,
        threads: 3,
        ..Default::default()
    }
}

/// Camera looking away from every primitive.
fn empty_view_level() -> Level {
    let mut scene = Scene::new();
    scene.add_material("m", Material::matte(Vec3::splat(0.5))).unwrap();
    scene.add_sphere("behind", Sphere::new(Vec3::new(0.0, 0.0, 50.0), 1.0), "m").unwrap();
    let avatar = PlayerAvatar::new(Sphere::new(Vec3::new(0.0, 0.0, 60.0), 0.5));
    let camera = Camera::new(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, 50.0, W, H);
    Level::new(scene, avatar, camera)
}

fn ball_level() -> Level {
    let mut scene = Scene::new();
    scene.add_material("m", Material::matte(Vec3::splat(0.5))).unwrap();
    scene.add_sphere("ball", Sphere::new(Vec3::ZERO, 1.0), "m").unwrap();
    let avatar = PlayerAvatar::new(Sphere::new(Vec3::new(0.0, -80.0, 0.0), 0.5));
    let camera = Camera::new(Vec3::new(0.0, 0.0, 4.0), Vec3::ZERO, Vec3::Y, 45.0, W, H);
    Level::new(scene, avatar, camera)
}

fn mean(film: &Film) -> Vec3 {
    film.pixels().iter().copied().sum::<Vec3>() / film.pixels().len() as f32
}

#[test]
fn test_environment_only_frame_is_white() {
    for kind in [RendererKind::Sequential, RendererKind::Threaded] {
        let mut renderer = Renderer::new(config(kind, 2)).unwrap();
        let level = empty_view_level();
        renderer.render_frame(&level).unwrap();

        for p in renderer.linear().pixels() {
            assert!((*p - Vec3::ONE).abs().max_element() < 1e-5, "{kind:?}: {p}");
        }
        for px in renderer.display().as_bytes().chunks_exact(4) {
            assert_eq!(px, [255, 255, 255, 255]);
        }
    }
}

#[test]
fn test_strategies_agree_on_average() {
    let level = ball_level();
    let mut means = Vec::new();
    for kind in [RendererKind::Sequential, RendererKind::Threaded] {
        let mut renderer = Renderer::new(config(kind, 16)).unwrap();
        let stats = renderer.render_frame(&level).unwrap();
        assert_eq!(stats.samples, (W * H * 16) as u64);
        means.push(mean(renderer.linear()));
    }
    assert!((means[0] - means[1]).abs().max_element() < 0.03, "{:?}", means);
}

#[test]
fn test_geometry_edits_are_seen_next_frame() {
    let level = ball_level();
    let mut cfg = config(RendererKind::Threaded, 1);
    cfg.ghost = GhostParams { factor_moving: 1.0, factor_static: 1.0, duration_secs: 0.5 };
    let mut renderer = Renderer::new(cfg).unwrap();
    let first = renderer.render_frame(&level).unwrap();

    level.edit(|s| {
        let ball = &mut s.scene.spheres_mut()[0];
        ball.center = Vec3::new(0.0, 0.0, 100.0);
    });
    let second = renderer.render_frame(&level).unwrap();
    assert!(second.geometry_version > first.geometry_version);

    // ball moved behind the camera, so the view is all sky again
    let center = renderer.linear().get(W / 2, H / 2);
    assert!((center - Vec3::ONE).abs().max_element() < 1e-5, "{center}");
}

#[test]
fn test_frame_counter_and_strategy_name() {
    let level = empty_view_level();
    let mut renderer = Renderer::new(config(RendererKind::Sequential, 1)).unwrap();
    assert_eq!(renderer.strategy_name(), "sequential");
    for _ in 0..3 {
        renderer.render_frame(&level).unwrap();
    }
    assert_eq!(renderer.frames(), 3);
}

#[test]
fn test_camera_resolution_must_match_output() {
    // camera built for a smaller raster than the output
    let mut scene = Scene::new();
    scene.add_material("black", Material::matte(Vec3::ZERO)).unwrap();
    scene.add_sphere("ball", Sphere::new(Vec3::ZERO, 1.0), "black").unwrap();
    let avatar = PlayerAvatar::new(Sphere::new(Vec3::new(0.0, -80.0, 0.0), 0.5));
    let camera = Camera::new(Vec3::new(0.0, 0.0, 4.0), Vec3::ZERO, Vec3::Y, 45.0, 8, 6);
    let level = Level::new(scene, avatar, camera);

    let mut renderer = Renderer::new(config(RendererKind::Sequential, 1)).unwrap();
    match renderer.render_frame(&level) {
        Err(Error::Config(msg)) => assert!(msg.contains("8x6"), "{msg}"),
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("mismatched camera rendered"),
    }
    assert_eq!(renderer.frames(), 0);

    // once resized, the ball sits at the center of the output
    level.edit_camera(|c| c.set_resolution(W, H));
    renderer.render_frame(&level).unwrap();
    assert_eq!(renderer.linear().get(W / 2, H / 2), Vec3::ZERO);
}

#[cfg(not(feature = "gpu"))]
#[test]
fn test_gpu_requires_feature() {
    match Renderer::new(config(RendererKind::Gpu, 1)) {
        Err(Error::NoGpuDevice(_)) => {}
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("gpu renderer without the gpu feature"),
    }
}

#[test]
fn test_filters_preserve_flat_field() {
    for (kind, radius) in [
        (FilterKind::LightBlur, 1),
        (FilterKind::HeavyBlur, 1),
        (FilterKind::Box, 1),
        (FilterKind::Box, 3),
    ] {
        let mut filter = SpatialFilter::new(FilterParams { kind, iterations: 2, radius });
        let mut film = Film::filled(13, 7, Vec3::new(0.25, 0.5, 2.0));
        filter.apply(&mut film);
        for p in film.pixels() {
            assert!((*p - Vec3::new(0.25, 0.5, 2.0)).abs().max_element() < 1e-5, "{kind:?} r{radius}");
        }
    }
}
