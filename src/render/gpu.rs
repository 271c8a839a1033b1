//! GPU strategy: WGSL kernel dispatched through wgpu.
//!
//! The kernel program is built once per renderer. Every frame the host
//! uploads the flattened accelerator (only when the geometry version
//! changed), the scene tables (only when the bindings changed) and the
//! camera, then dispatches `trace_pass` once per sample and `update_pixels`
//! once. The stable frame and the packed RGBA8 pixels are read back into the
//! compositor after a full queue drain.
//!
//! ```text
//! FlatBvh ─┐
//! bindings ├─> storage buffers ─> init_tasks (once) ─> trace_pass × spp ─> update_pixels ─> readback
//! camera  ─┘
//! ```

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::accel::FlatNode;
use crate::compositor::{Compositor, ToneMapParams};
use crate::config::RenderConfig;
use crate::integrator::IntegratorParams;
use crate::level::FrameSnapshot;
use crate::scene::{AvatarPart, Bsdf, Material, SceneBindings};
use crate::util::{Error, Result, Vec3};

/// Kernel source embedded at compile time.
const KERNEL_WGSL: &str = include_str!("kernel.wgsl");

/// Workgroup attribute as written in the kernel source.
const KERNEL_WORKGROUP: &str = "@workgroup_size(8, 8, 1)";

const NONE: u32 = u32::MAX;

const KIND_MATTE: u32 = 0;
const KIND_MIRROR: u32 = 1;
const KIND_GLASS: u32 = 2;
const KIND_METAL: u32 = 3;
const KIND_ALLOY: u32 = 4;

/// Per-primitive binding (matches WGSL `Prim`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct GpuPrim {
    material: u32,
    texture_map: u32,
    bump_map: u32,
    _pad: u32,
}

/// Matches WGSL `Material`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct GpuMaterial {
    kind: u32,
    _pad: [u32; 3],
    kd: [f32; 4],
    kr: [f32; 4],
    emission: [f32; 4],
    /// outside_ior, inside_ior, exponent, r0
    params: [f32; 4],
}

/// Texture instance (matches WGSL `Map`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct GpuMap {
    offset: u32,
    width: u32,
    height: u32,
    bump_scale: f32,
    shift: [f32; 2],
    scale: [f32; 2],
}

/// Matches WGSL `Task`. Only its size is used on the host.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[allow(dead_code)]
struct GpuTask {
    rng: [u32; 4],
    sum: [f32; 4],
}

/// Frame uniform (matches WGSL `Params`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[allow(dead_code)]
struct KernelParams {
    raster_to_camera: [[f32; 4]; 4],
    camera_to_world: [[f32; 4]; 4],
    light_gain: [f32; 4],
    /// lens_radius, focal_distance, ray_epsilon, ghost_factor
    lens: [f32; 4],
    light_map: u32,
    scene_sphere_count: u32,
    width: u32,
    height: u32,
    max_diffuse: u32,
    max_specular: u32,
    frame_seed: u32,
    samples_per_pass: u32,
    tone_scale: f32,
    inv_gamma: f32,
    clip_far: f32,
    _pad: u32,
}

fn vec4(v: Vec3, w: f32) -> [f32; 4] {
    [v.x, v.y, v.z, w]
}

impl GpuMaterial {
    fn from_material(m: &Material) -> Self {
        let mut g = GpuMaterial::zeroed();
        g.emission = vec4(m.emission, 0.0);
        match m.bsdf {
            Bsdf::Matte { kd } => {
                g.kind = KIND_MATTE;
                g.kd = vec4(kd, 0.0);
            }
            Bsdf::Mirror { kr } => {
                g.kind = KIND_MIRROR;
                g.kr = vec4(kr, 0.0);
            }
            Bsdf::Glass { refl, refrct, outside_ior, inside_ior } => {
                g.kind = KIND_GLASS;
                g.kr = vec4(refl, 0.0);
                g.kd = vec4(refrct, 0.0);
                g.params = [outside_ior, inside_ior, 0.0, 0.0];
            }
            Bsdf::Metal { kr, exponent } => {
                g.kind = KIND_METAL;
                g.kr = vec4(kr, 0.0);
                g.params = [0.0, 0.0, exponent, 0.0];
            }
            Bsdf::Alloy { kd, kr, exponent, r0 } => {
                g.kind = KIND_ALLOY;
                g.kd = vec4(kd, 0.0);
                g.kr = vec4(kr, 0.0);
                g.params = [0.0, 0.0, exponent, r0];
            }
        }
        g
    }
}

/// Scene tables flattened for upload.
#[derive(Debug, Default)]
struct PackedScene {
    prims: Vec<GpuPrim>,
    materials: Vec<GpuMaterial>,
    maps: Vec<GpuMap>,
    texels: Vec<[f32; 4]>,
    light_map: u32,
}

impl PackedScene {
    fn pack(bindings: &SceneBindings) -> Self {
        let registry = bindings.registry();
        let mut packed = PackedScene {
            materials: registry.materials().iter().map(GpuMaterial::from_material).collect(),
            ..Default::default()
        };

        // texel offset per texture handle index
        let mut offsets = Vec::with_capacity(registry.texture_count());
        let mut sizes = Vec::with_capacity(registry.texture_count());
        for tex in registry.textures() {
            offsets.push(packed.texels.len() as u32);
            sizes.push((tex.width(), tex.height()));
            packed.texels.extend(tex.texels().iter().map(|c| vec4(*c, 1.0)));
        }

        let push_map = |maps: &mut Vec<GpuMap>, texture: usize, bump_scale: f32, shift: [f32; 2], scale: [f32; 2]| {
            let (width, height) = sizes[texture];
            maps.push(GpuMap { offset: offsets[texture], width, height, bump_scale, shift, scale });
            (maps.len() - 1) as u32
        };

        for i in 0..bindings.scene_sphere_count() {
            let texture_map = match bindings.sphere_texture_map(i) {
                Some(m) => push_map(&mut packed.maps, m.texture.index(), 0.0, m.shift.to_array(), m.scale.to_array()),
                None => NONE,
            };
            let bump_map = match bindings.sphere_bump_map(i) {
                Some(b) => push_map(&mut packed.maps, b.texture.index(), b.scale, [0.0; 2], [1.0; 2]),
                None => NONE,
            };
            packed.prims.push(GpuPrim {
                material: bindings.sphere_material(i).index() as u32,
                texture_map,
                bump_map,
                _pad: 0,
            });
        }
        for part in AvatarPart::ALL {
            packed.prims.push(GpuPrim {
                material: bindings.avatar_material(part).index() as u32,
                texture_map: NONE,
                bump_map: NONE,
                _pad: 0,
            });
        }

        let light = bindings.light();
        packed.light_map = match light.texture {
            Some(h) => push_map(&mut packed.maps, h.index(), 0.0, light.shift.to_array(), [1.0; 2]),
            None => NONE,
        };

        // bindings must not be zero-sized
        if packed.maps.is_empty() {
            packed.maps.push(GpuMap::zeroed());
        }
        if packed.texels.is_empty() {
            packed.texels.push([0.0; 4]);
        }
        if packed.materials.is_empty() {
            packed.materials.push(GpuMaterial::zeroed());
        }
        packed
    }
}

/// Storage buffer that is reused while big enough and regrown otherwise.
struct GrowableBuffer {
    label: &'static str,
    buffer: wgpu::Buffer,
    capacity: u64,
}

impl GrowableBuffer {
    fn new(device: &wgpu::Device, label: &'static str, capacity: u64) -> Self {
        let capacity = capacity.max(16);
        Self { label, buffer: Self::create(device, label, capacity), capacity }
    }

    fn create(device: &wgpu::Device, label: &'static str, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Write `bytes`, regrowing first if needed. Returns true if the buffer was replaced.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) -> bool {
        let needed = (bytes.len() as u64).max(16);
        let grown = needed > self.capacity;
        if grown {
            self.capacity = needed.next_power_of_two();
            self.buffer = Self::create(device, self.label, self.capacity);
            tracing::debug!(buffer = self.label, bytes = self.capacity, "device buffer grown");
        }
        queue.write_buffer(&self.buffer, 0, bytes);
        grown
    }
}

struct Pipelines {
    init_tasks: wgpu::ComputePipeline,
    trace_pass: wgpu::ComputePipeline,
    update_pixels: wgpu::ComputePipeline,
}

pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: Pipelines,
    layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,

    nodes: GrowableBuffer,
    prims: GrowableBuffer,
    materials: GrowableBuffer,
    maps: GrowableBuffer,
    texels: GrowableBuffer,
    params: wgpu::Buffer,
    tasks: wgpu::Buffer,
    stable: wgpu::Buffer,
    pixels: wgpu::Buffer,
    stable_readback: wgpu::Buffer,
    pixel_readback: wgpu::Buffer,

    width: u32,
    height: u32,
    workgroup: u32,
    samples_per_pass: u32,
    integrator: IntegratorParams,
    tone_scale: f32,
    inv_gamma: f32,
    seed: u64,

    uploaded_version: Option<u64>,
    uploaded_bindings: Option<Arc<SceneBindings>>,
    light_map: u32,
    initialized: bool,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GpuRenderer {
    /// Open the first high-performance adapter and build the kernel.
    pub fn new(config: &RenderConfig) -> Result<Self> {
        pollster::block_on(Self::new_async(config))
    }

    async fn new_async(config: &RenderConfig) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::NoGpuDevice(e.to_string()))?;
        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "gpu adapter selected");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("spheretrace_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::default(),
            })
            .await
            .map_err(|e| Error::NoGpuDevice(e.to_string()))?;

        let workgroup = config.gpu.workgroup_size.max(1);
        let (layout, pipelines) = Self::build_kernel(&device, workgroup).await?;

        let (tone_scale, gamma) = match config.tone_map {
            ToneMapParams::Linear { scale, gamma } => (scale, gamma),
            ToneMapParams::Reinhard02 { gamma, .. } => {
                tracing::warn!("gpu path maps tones linearly; reinhard02 settings ignored");
                (1.0, gamma)
            }
        };
        if config.filter.kind != crate::compositor::FilterKind::None {
            tracing::warn!(filter = ?config.filter.kind, "gpu path does not run spatial filters");
        }

        let (w, h) = (config.width, config.height);
        let pixels = w as u64 * h as u64;
        let buffer = |label: &'static str, size: u64, usage: wgpu::BufferUsages| {
            device.create_buffer(&wgpu::BufferDescriptor { label: Some(label), size, usage, mapped_at_creation: false })
        };
        use wgpu::BufferUsages as U;

        let renderer = Self {
            nodes: GrowableBuffer::new(&device, "st_nodes", 64 * std::mem::size_of::<FlatNode>() as u64),
            prims: GrowableBuffer::new(&device, "st_prims", 64 * std::mem::size_of::<GpuPrim>() as u64),
            materials: GrowableBuffer::new(&device, "st_materials", 16 * std::mem::size_of::<GpuMaterial>() as u64),
            maps: GrowableBuffer::new(&device, "st_maps", 16 * std::mem::size_of::<GpuMap>() as u64),
            texels: GrowableBuffer::new(&device, "st_texels", 256 * 16),
            params: buffer("st_params", std::mem::size_of::<KernelParams>() as u64, U::UNIFORM | U::COPY_DST),
            tasks: buffer("st_tasks", pixels * std::mem::size_of::<GpuTask>() as u64, U::STORAGE),
            stable: buffer("st_stable", pixels * 16, U::STORAGE | U::COPY_SRC),
            pixels: buffer("st_pixels", pixels * 4, U::STORAGE | U::COPY_SRC),
            stable_readback: buffer("st_stable_readback", pixels * 16, U::MAP_READ | U::COPY_DST),
            pixel_readback: buffer("st_pixel_readback", pixels * 4, U::MAP_READ | U::COPY_DST),
            device,
            queue,
            pipelines,
            layout,
            bind_group: None,
            width: w,
            height: h,
            workgroup,
            samples_per_pass: config.device_samples_per_pass(),
            integrator: config.integrator,
            tone_scale,
            inv_gamma: 1.0 / gamma,
            seed: config.seed,
            uploaded_version: None,
            uploaded_bindings: None,
            light_map: NONE,
            initialized: false,
        };
        Ok(renderer)
    }

    /// Compile the kernel; validation failures come back with the compiler log.
    async fn build_kernel(device: &wgpu::Device, workgroup: u32) -> Result<(wgpu::BindGroupLayout, Pipelines)> {
        let source = KERNEL_WGSL.replace(
            KERNEL_WORKGROUP,
            &format!("@workgroup_size({workgroup}, {workgroup}, 1)"),
        );

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("spheretrace_kernel"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("spheretrace_bgl"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(6, false),
                storage_entry(7, false),
                storage_entry(8, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("spheretrace_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = |entry: &'static str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let pipelines = Pipelines {
            init_tasks: pipeline("init_tasks"),
            trace_pass: pipeline("trace_pass"),
            update_pixels: pipeline("update_pixels"),
        };

        if let Some(err) = device.pop_error_scope().await {
            let info = module.get_compilation_info().await;
            let mut log = err.to_string();
            for msg in info.messages {
                log.push('\n');
                log.push_str(&msg.message);
            }
            return Err(Error::KernelBuild { log });
        }

        tracing::debug!(workgroup, "kernel built");
        Ok((layout, pipelines))
    }

    pub fn samples_per_pass(&self) -> u32 {
        self.samples_per_pass
    }

    fn rebuild_bind_group(&mut self) {
        let entries = [
            self.nodes.buffer.as_entire_binding(),
            self.prims.buffer.as_entire_binding(),
            self.materials.buffer.as_entire_binding(),
            self.maps.buffer.as_entire_binding(),
            self.texels.buffer.as_entire_binding(),
            self.params.as_entire_binding(),
            self.tasks.as_entire_binding(),
            self.stable.as_entire_binding(),
            self.pixels.as_entire_binding(),
        ];
        let entries: Vec<wgpu::BindGroupEntry> = entries
            .into_iter()
            .enumerate()
            .map(|(i, resource)| wgpu::BindGroupEntry { binding: i as u32, resource })
            .collect();

        self.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("spheretrace_bind_group"),
            layout: &self.layout,
            entries: &entries,
        }));
    }

    fn upload(&mut self, frame: &FrameSnapshot) {
        let mut regrown = false;

        if self.uploaded_version != Some(frame.geometry_version) {
            let zero = [FlatNode::zeroed()];
            let nodes: &[u8] = if frame.bvh.is_empty() { bytemuck::cast_slice(&zero) } else { frame.bvh.as_bytes() };
            regrown |= self.nodes.upload(&self.device, &self.queue, nodes);
            self.uploaded_version = Some(frame.geometry_version);
        }

        let same_bindings = self
            .uploaded_bindings
            .as_ref()
            .is_some_and(|b| Arc::ptr_eq(b, &frame.bindings));
        if !same_bindings {
            let packed = PackedScene::pack(&frame.bindings);
            regrown |= self.prims.upload(&self.device, &self.queue, bytemuck::cast_slice(&packed.prims));
            regrown |= self.materials.upload(&self.device, &self.queue, bytemuck::cast_slice(&packed.materials));
            regrown |= self.maps.upload(&self.device, &self.queue, bytemuck::cast_slice(&packed.maps));
            regrown |= self.texels.upload(&self.device, &self.queue, bytemuck::cast_slice(&packed.texels));
            self.light_map = packed.light_map;
            self.uploaded_bindings = Some(Arc::clone(&frame.bindings));
        }

        if regrown || self.bind_group.is_none() {
            self.rebuild_bind_group();
        }
    }

    fn write_params(&self, frame: &FrameSnapshot, ghost_factor: f32, frame_seed: u32) {
        let camera = &frame.camera;
        let params = KernelParams {
            raster_to_camera: camera.raster_to_camera().to_cols_array_2d(),
            camera_to_world: camera.camera_to_world().to_cols_array_2d(),
            light_gain: vec4(frame.bindings.light().gain, 0.0),
            lens: [camera.lens_radius, camera.focal_distance, self.integrator.ray_epsilon, ghost_factor],
            light_map: self.light_map,
            scene_sphere_count: frame.bindings.scene_sphere_count() as u32,
            width: self.width,
            height: self.height,
            max_diffuse: self.integrator.max_diffuse_bounces,
            max_specular: self.integrator.max_specular_bounces,
            frame_seed,
            samples_per_pass: self.samples_per_pass,
            tone_scale: self.tone_scale,
            inv_gamma: self.inv_gamma,
            clip_far: camera.clip_far,
            _pad: 0,
        };
        self.queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
    }

    /// Trace one frame and copy the results into `compositor`.
    pub fn render_frame(&mut self, frame: &FrameSnapshot, ghost_factor: f32, compositor: &mut Compositor) -> Result<()> {
        self.upload(frame);
        self.write_params(frame, ghost_factor, (self.seed ^ (self.seed >> 32)) as u32);

        let Some(bind_group) = &self.bind_group else {
            return Err(Error::device("bind group missing after upload"));
        };

        let groups_x = self.width.div_ceil(self.workgroup);
        let groups_y = self.height.div_ceil(self.workgroup);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("spheretrace_frame"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("spheretrace_trace"),
                timestamp_writes: None,
            });
            pass.set_bind_group(0, bind_group, &[]);
            if !self.initialized {
                pass.set_pipeline(&self.pipelines.init_tasks);
                pass.dispatch_workgroups(groups_x, groups_y, 1);
            }
            pass.set_pipeline(&self.pipelines.trace_pass);
            for _ in 0..self.samples_per_pass {
                pass.dispatch_workgroups(groups_x, groups_y, 1);
            }
            pass.set_pipeline(&self.pipelines.update_pixels);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        let pixels = self.width as u64 * self.height as u64;
        encoder.copy_buffer_to_buffer(&self.stable, 0, &self.stable_readback, 0, pixels * 16);
        encoder.copy_buffer_to_buffer(&self.pixels, 0, &self.pixel_readback, 0, pixels * 4);
        self.queue.submit(Some(encoder.finish()));
        self.initialized = true;

        self.read_back(compositor)
    }

    fn read_back(&self, compositor: &mut Compositor) -> Result<()> {
        let stable_slice = self.stable_readback.slice(..);
        let pixel_slice = self.pixel_readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        let tx2 = tx.clone();
        stable_slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        pixel_slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx2.send(res);
        });

        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| Error::device(e.to_string()))?;
        for _ in 0..2 {
            rx.recv()
                .map_err(|e| Error::device(e.to_string()))?
                .map_err(|e| Error::device(e.to_string()))?;
        }

        {
            let data = stable_slice.get_mapped_range();
            let texels: &[[f32; 4]] = bytemuck::cast_slice(&data);
            for (dst, src) in compositor.stable_mut().pixels_mut().iter_mut().zip(texels) {
                *dst = Vec3::new(src[0], src[1], src[2]);
            }
        }
        {
            let data = pixel_slice.get_mapped_range();
            compositor.display_mut().as_bytes_mut().copy_from_slice(&data);
        }
        self.stable_readback.unmap();
        self.pixel_readback.unmap();
        compositor.prime_ghost();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Sphere;
    use crate::scene::{BumpMap, InfiniteLight, Scene, Texture, TextureMap};
    use crate::util::Vec2;

    #[test]
    fn test_kernel_struct_sizes() {
        assert_eq!(std::mem::size_of::<GpuPrim>(), 16);
        assert_eq!(std::mem::size_of::<GpuMaterial>(), 80);
        assert_eq!(std::mem::size_of::<GpuMap>(), 32);
        assert_eq!(std::mem::size_of::<GpuTask>(), 32);
        assert_eq!(std::mem::size_of::<KernelParams>(), 208);
        assert!(KERNEL_WGSL.contains(KERNEL_WORKGROUP));
    }

    #[test]
    fn test_kernel_params_layout_matches_wgsl() {
        // uniform offsets the kernel reads past the two matrices and two vec4s
        assert_eq!(std::mem::offset_of!(KernelParams, light_map), 160);
        assert_eq!(std::mem::offset_of!(KernelParams, tone_scale), 192);
        assert_eq!(std::mem::offset_of!(KernelParams, clip_far), 200);
        assert!(KERNEL_WGSL.contains("clip_far: f32,"));
        assert!(KERNEL_WGSL.contains("var maxt = params.clip_far;"));
    }

    #[test]
    fn test_kernel_fresnel_base_is_clamped() {
        // pow() with a negative base is undefined in WGSL
        for (i, _) in KERNEL_WGSL.match_indices("pow(c, 5.0)") {
            let before = &KERNEL_WGSL[..i];
            let clamp = before.rfind("clamp(").unwrap_or(0);
            let decl = before.rfind("var c =").max(before.rfind("let c =")).unwrap_or(0);
            assert!(clamp >= decl, "unclamped fresnel base at byte {i}");
        }
    }

    #[test]
    fn test_pack_scene_tables() {
        let mut scene = Scene::new();
        let tex = scene.add_texture("t", Texture::new(2, 1, vec![Vec3::ONE, Vec3::ZERO]).unwrap()).unwrap();
        let sky = scene.add_texture("sky", Texture::constant(Vec3::splat(0.5))).unwrap();
        scene.add_material("glass", Material::glass(Vec3::ONE, Vec3::splat(0.9), 1.0, 1.5)).unwrap();
        scene.add_sphere("a", Sphere::new(Vec3::ZERO, 1.0), "glass").unwrap();
        scene.set_texture_map("a", TextureMap::new(tex).with_shift(Vec2::new(0.25, 0.0))).unwrap();
        scene.set_bump_map("a", BumpMap::new(tex, 2.0)).unwrap();
        scene.set_light(InfiniteLight::textured(sky, Vec3::ONE, Vec2::ZERO));

        let packed = PackedScene::pack(scene.bindings());
        assert_eq!(packed.prims.len(), 1 + 6);
        assert_eq!(packed.texels.len(), 3);
        let a = packed.prims[0];
        assert_eq!(packed.materials[a.material as usize].kind, KIND_GLASS);
        assert_eq!(packed.maps[a.texture_map as usize].shift, [0.25, 0.0]);
        assert_eq!(packed.maps[a.bump_map as usize].bump_scale, 2.0);
        assert_eq!(packed.maps[packed.light_map as usize].offset, 2);
        assert_eq!(packed.prims[6].texture_map, NONE);
    }
}
