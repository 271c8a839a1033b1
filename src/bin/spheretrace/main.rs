//! spheretrace CLI - render the demo level headless and write a PNG.

use std::env;
use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use spheretrace::compositor::ToneMapKind;
use spheretrace::prelude::*;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const PILL_COUNT: usize = 8;
const RING_RADIUS: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Render,
    Config,
    Help,
}

#[derive(Debug)]
struct Options {
    command: Command,
    config: Option<PathBuf>,
    renderer: Option<RendererKind>,
    width: Option<u32>,
    height: Option<u32>,
    spp: Option<u32>,
    threads: Option<usize>,
    seed: Option<u64>,
    filter: Option<FilterKind>,
    tone_map: Option<ToneMapKind>,
    frames: u32,
    physics_hz: u32,
    orbit: bool,
    output: PathBuf,
    verbosity: u8,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            command: Command::Render,
            config: None,
            renderer: None,
            width: None,
            height: None,
            spp: None,
            threads: None,
            seed: None,
            filter: None,
            tone_map: None,
            frames: 16,
            physics_hz: 60,
            orbit: false,
            output: PathBuf::from("spheretrace.png"),
            verbosity: 1,
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("spheretrace");

    let opts = match parse_args(&args[1.min(args.len())..]) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {e:#}");
            print_usage(prog);
            std::process::exit(2);
        }
    };

    #[allow(clippy::let_unit_value)]
    let _trace_guard = init_tracing(opts.verbosity);

    let result = match opts.command {
        Command::Help => {
            print_usage(prog);
            Ok(())
        }
        Command::Config => cmd_config(&opts),
        Command::Render => cmd_render(&opts),
    };

    if let Err(e) = result {
        tracing::error!("{e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage(prog: &str) {
    println!(
        "spheretrace {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        env!("SPHERETRACE_BUILD_DATE"),
        env!("SPHERETRACE_BUILD_TIME")
    );
    println!();
    println!("Usage: {} [options] [command]", prog);
    println!();
    println!("Commands:");
    println!("  r, render   Render the demo level and write a PNG (default)");
    println!("  c, config   Print the resolved configuration as JSON");
    println!("  h, help     Show this help");
    println!();
    println!("Options:");
    println!("  --config <file.json>     Load render configuration");
    println!("  --renderer <name>        sequential | threaded | gpu");
    println!("  --size <W>x<H>           Output resolution");
    println!("  --spp <n>                Samples per pixel per pass");
    println!("  --threads <n>            Worker threads (0 = all cores)");
    println!("  --seed <n>               Base random seed");
    println!("  --filter <name>          none | light-blur | heavy-blur | box");
    println!("  --tonemap <name>         linear | reinhard02");
    println!("  --frames <n>             Frames to render (default 16)");
    println!("  --physics-hz <n>         Demo physics rate (default 60)");
    println!("  --orbit                  Orbit the camera while rendering");
    println!("  -o, --output <file.png>  Output image (default spheretrace.png)");
    println!("  -v, --verbose            Debug output");
    println!("  -vv, --trace             Trace output (very verbose)");
    println!("  -q, --quiet              Warnings and errors only");
    println!();
    println!("RUST_LOG overrides the log filter.");
    #[cfg(feature = "profiling")]
    println!("SPHERETRACE_TRACE=1 writes a Chrome trace to trace.json.");
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut opts = Options::default();
    let mut it = args.iter();

    fn value<'a>(it: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<&'a str> {
        match it.next() {
            Some(v) => Ok(v.as_str()),
            None => bail!("{flag} expects a value"),
        }
    }

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-v" | "--verbose" => opts.verbosity = 2,
            "-vv" | "--trace" => opts.verbosity = 3,
            "-q" | "--quiet" => opts.verbosity = 0,
            "--config" => opts.config = Some(PathBuf::from(value(&mut it, arg)?)),
            "--renderer" => opts.renderer = Some(value(&mut it, arg)?.parse()?),
            "--size" => {
                let v = value(&mut it, arg)?;
                let Some((w, h)) = v.split_once(['x', 'X']) else {
                    bail!("--size expects <W>x<H>, got {v:?}");
                };
                opts.width = Some(w.parse().with_context(|| format!("bad width {w:?}"))?);
                opts.height = Some(h.parse().with_context(|| format!("bad height {h:?}"))?);
            }
            "--spp" => opts.spp = Some(value(&mut it, arg)?.parse().context("--spp")?),
            "--threads" => opts.threads = Some(value(&mut it, arg)?.parse().context("--threads")?),
            "--seed" => opts.seed = Some(value(&mut it, arg)?.parse().context("--seed")?),
            "--filter" => opts.filter = Some(value(&mut it, arg)?.parse()?),
            "--tonemap" => opts.tone_map = Some(value(&mut it, arg)?.parse()?),
            "--frames" => opts.frames = value(&mut it, arg)?.parse().context("--frames")?,
            "--physics-hz" => opts.physics_hz = value(&mut it, arg)?.parse().context("--physics-hz")?,
            "--orbit" => opts.orbit = true,
            "-o" | "--output" => opts.output = PathBuf::from(value(&mut it, arg)?),
            "render" | "r" => opts.command = Command::Render,
            "config" | "c" => opts.command = Command::Config,
            "help" | "h" | "-h" | "--help" => opts.command = Command::Help,
            other => bail!("unknown argument {other:?}"),
        }
    }
    Ok(opts)
}

fn env_filter(verbosity: u8) -> EnvFilter {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(feature = "profiling")]
fn init_tracing(verbosity: u8) -> Option<tracing_chrome::FlushGuard> {
    let fmt = tracing_subscriber::fmt::layer().with_target(false);
    if env::var("SPHERETRACE_TRACE").ok().as_deref() != Some("1") {
        tracing_subscriber::registry().with(env_filter(verbosity)).with(fmt).init();
        return None;
    }

    let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .file("trace.json")
        .build();
    tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(fmt)
        .with(chrome_layer)
        .init();
    Some(guard)
}

#[cfg(not(feature = "profiling"))]
fn init_tracing(verbosity: u8) {
    let fmt = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry().with(env_filter(verbosity)).with(fmt).init();
}

/// Configuration file (if any) with command-line overrides applied.
fn resolve_config(opts: &Options) -> Result<RenderConfig> {
    let mut config = match &opts.config {
        Some(path) => RenderConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RenderConfig::default(),
    };
    if let Some(r) = opts.renderer {
        config.renderer = r;
    }
    if let Some(w) = opts.width {
        config.width = w;
    }
    if let Some(h) = opts.height {
        config.height = h;
    }
    if let Some(spp) = opts.spp {
        config.samples_per_pass = spp;
    }
    if let Some(t) = opts.threads {
        config.threads = t;
    }
    if let Some(s) = opts.seed {
        config.seed = s;
    }
    if let Some(f) = opts.filter {
        config.filter.kind = f;
    }
    if let Some(t) = opts.tone_map {
        if config.tone_map.kind() != t {
            config.tone_map = t.default_params();
        }
    }
    config.validate()?;
    Ok(config)
}

fn cmd_config(opts: &Options) -> Result<()> {
    let config = resolve_config(opts)?;
    println!("{}", config.to_json()?);
    Ok(())
}

fn cmd_render(opts: &Options) -> Result<()> {
    let config = resolve_config(opts)?;
    let (width, height) = (config.width, config.height);

    let level = Arc::new(demo_level(width, height).context("building demo level")?);
    let mut renderer = Renderer::new(config).context("creating renderer")?;
    tracing::info!(strategy = renderer.strategy_name(), frames = opts.frames, "rendering demo level");

    let stop = Arc::new(AtomicBool::new(false));
    let physics = {
        let level = Arc::clone(&level);
        let stop = Arc::clone(&stop);
        let hz = opts.physics_hz.max(1);
        let orbit = opts.orbit;
        thread::Builder::new()
            .name("physics".into())
            .spawn(move || physics_loop(&level, &stop, hz, orbit))
            .context("spawning physics thread")?
    };

    let start = Instant::now();
    let mut total_samples = 0u64;
    let mut render_result = Ok(());
    for _ in 0..opts.frames {
        match renderer.render_frame(&level) {
            Ok(stats) => {
                total_samples += stats.samples;
                tracing::info!(
                    frame = renderer.frames(),
                    ms = stats.elapsed.as_secs_f64() * 1e3,
                    msamples_per_sec = stats.samples_per_second() / 1e6,
                    moving = stats.camera_moving,
                    version = stats.geometry_version,
                    "frame"
                );
            }
            Err(e) => {
                render_result = Err(e);
                break;
            }
        }
        if level.is_won() {
            tracing::info!("all pills collected");
        }
    }

    stop.store(true, Ordering::Release);
    if physics.join().is_err() {
        tracing::warn!("physics thread panicked");
    }
    render_result.context("rendering frame")?;

    let elapsed = start.elapsed().as_secs_f64();
    tracing::info!(
        frames = renderer.frames(),
        secs = elapsed,
        msamples_per_sec = if elapsed > 0.0 { total_samples as f64 / elapsed / 1e6 } else { 0.0 },
        "done"
    );

    let display = renderer.display();
    image::save_buffer(
        &opts.output,
        display.as_bytes(),
        display.width(),
        display.height(),
        image::ExtendedColorType::Rgba8,
    )
    .with_context(|| format!("writing {}", opts.output.display()))?;
    println!("wrote {}", opts.output.display());
    Ok(())
}

/// Floor, a ring of pills, three showcase balls and the avatar.
fn demo_level(width: u32, height: u32) -> spheretrace::Result<Level> {
    let mut scene = Scene::new();

    let checker: Vec<Vec3> = (0..64)
        .map(|i| if (i % 8 + i / 8) % 2 == 0 { Vec3::splat(0.9) } else { Vec3::splat(0.25) })
        .collect();
    let checker = scene.add_texture("checker", Texture::new(8, 8, checker)?)?;
    let sky = Texture::new(
        4,
        2,
        vec![
            Vec3::new(0.6, 0.75, 1.0),
            Vec3::new(0.7, 0.8, 1.0),
            Vec3::new(0.6, 0.75, 1.0),
            Vec3::new(0.5, 0.65, 0.95),
            Vec3::splat(0.3),
            Vec3::splat(0.35),
            Vec3::splat(0.3),
            Vec3::splat(0.25),
        ],
    )?;
    let sky = scene.add_texture("sky", sky)?;
    scene.set_light(InfiniteLight::textured(sky, Vec3::splat(1.2), Vec2::ZERO));

    scene.add_material("floor", Material::matte(Vec3::splat(0.7)))?;
    scene.add_material("pill", Material::matte(Vec3::new(0.9, 0.9, 0.6)).with_emission(Vec3::new(4.0, 3.5, 1.5)))?;
    scene.add_material("pill.off", Material::matte(Vec3::splat(0.3)))?;
    scene.add_material("glass", Material::glass(Vec3::ONE, Vec3::splat(0.95), 1.0, 1.5))?;
    scene.add_material("chrome", Material::metal(Vec3::splat(0.9), 40.0))?;
    scene.add_material("gold", Material::alloy(Vec3::new(0.8, 0.55, 0.1), Vec3::new(1.0, 0.8, 0.3), 60.0, 0.2))?;
    scene.add_material("mirror", Material::mirror(Vec3::splat(0.95)))?;
    scene.set_pill_off_material("pill.off")?;

    scene.add_sphere("floor", Sphere::new(Vec3::new(0.0, -1000.0, 0.0), 1000.0), "floor")?;
    scene.set_texture_map("floor", TextureMap::new(checker).with_scale(Vec2::splat(400.0)))?;

    scene.add_sphere("glass", Sphere::new(Vec3::new(-1.5, 0.8, 0.0), 0.8), "glass")?;
    scene.add_sphere("chrome", Sphere::new(Vec3::new(1.5, 0.8, 0.0), 0.8), "chrome")?;
    scene.add_sphere("gold", Sphere::new(Vec3::new(0.0, 0.6, -2.0), 0.6), "gold")?;
    scene.set_bump_map("gold", BumpMap::new(checker, 0.3))?;
    scene.add_sphere("mirror", Sphere::new(Vec3::new(0.0, 2.5, -6.0), 2.0), "mirror")?;

    for i in 0..PILL_COUNT {
        let a = i as f32 / PILL_COUNT as f32 * TAU;
        let center = Vec3::new(RING_RADIUS * a.cos(), 0.25, RING_RADIUS * a.sin());
        scene.add_pill(&format!("pill.{i}"), Sphere::new(center, 0.25), "pill")?;
    }

    let avatar = PlayerAvatar::new(Sphere::new(Vec3::new(RING_RADIUS, 0.5, 0.0), 0.5));
    let camera = Camera::new(Vec3::new(0.0, 3.0, 9.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y, 45.0, width, height);
    Ok(Level::new(scene, avatar, camera))
}

/// Fixed-rate mover standing in for the physics simulation.
///
/// Walks the avatar around the pill ring, collects pills it touches and
/// bobs the glass ball.
fn physics_loop(level: &Level, stop: &AtomicBool, hz: u32, orbit: bool) {
    let dt = 1.0 / hz as f32;
    let tick = Duration::from_secs_f32(dt);
    let glass = level.read(|s| s.scene.sphere_index("glass").ok());
    let mut t = 0.0f32;
    let mut next = Instant::now();

    while !stop.load(Ordering::Acquire) {
        t += dt;
        let angle = 0.8 * t;
        let body = Sphere::new(Vec3::new(RING_RADIUS * angle.cos(), 0.5, RING_RADIUS * angle.sin()), 0.5);
        let forward = Vec3::new(-angle.sin(), 0.0, angle.cos());

        let collected = level.edit(|s| {
            s.avatar.update(body, forward, Vec3::Y);
            if let Some(g) = glass {
                s.scene.spheres_mut()[g].center.y = 0.8 + 0.3 * (2.0 * t).sin();
            }
            let mut collected = 0;
            for i in 0..s.scene.spheres().len() {
                let pill = s.scene.spheres()[i];
                if s.scene.is_pill(i)
                    && pill.center.distance(body.center) < pill.radius + body.radius
                    && s.scene.switch_off_pill(i)
                {
                    collected += 1;
                }
            }
            collected
        });
        if collected > 0 {
            tracing::debug!(collected, "pills collected");
        }

        if orbit {
            level.edit_camera(|c| c.orbit(0.25 * dt, 0.0));
        }

        next += tick;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else {
            next = now;
        }
    }
}
