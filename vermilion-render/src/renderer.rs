//! Top-level renderer: owns the surface, the shared context, the camera,
//! and a composer built from the feature selection.

use crate::camera::Camera;
use crate::context::RenderContext;
use crate::graph::Composer;
use crate::passes::create_pass;
use crate::plan::{build_plan, validate_plan, RendererSettings};
use crate::profiler::GpuProfiler;
use crate::scene::Scene;

/// How often `render` blocks to read back and log GPU span times.
const PROFILE_INTERVAL: u64 = 300;

fn build_composer(
    ctx: &RenderContext,
    settings: &RendererSettings,
    width: u32,
    height: u32,
    surface_format: wgpu::TextureFormat,
) -> Result<Composer, String> {
    let plan = build_plan(settings);
    validate_plan(&plan)?;
    let mut composer = Composer::new();
    for planned in &plan {
        composer.add_pass(create_pass(ctx, planned, width, height, surface_format));
    }
    Ok(composer)
}

pub struct Renderer {
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    ctx: RenderContext,
    pub camera: Camera,
    composer: Composer,
    profiler: GpuProfiler,
    settings: RendererSettings,
}

impl Renderer {
    /// Create a renderer for a window. Blocks on adapter and device
    /// acquisition.
    pub fn new(
        window: impl raw_window_handle::HasWindowHandle
            + raw_window_handle::HasDisplayHandle
            + Send
            + Sync
            + 'static,
        width: u32,
        height: u32,
        settings: RendererSettings,
    ) -> Result<Self, String> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| format!("Failed to create surface: {e}"))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or("Failed to find suitable GPU adapter")?;

        let timestamps = adapter
            .features()
            .contains(wgpu::Features::TIMESTAMP_QUERY);
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Vermilion Device"),
                required_features: if timestamps {
                    wgpu::Features::TIMESTAMP_QUERY
                } else {
                    wgpu::Features::empty()
                },
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|e| format!("Failed to create device: {e}"))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let ctx = RenderContext::new(device, queue);

        let composer = build_composer(&ctx, &settings, width, height, surface_format)?;
        log::info!(
            "renderer up: {}x{}, {} passes, {:?}",
            width,
            height,
            composer.pass_count(),
            settings
        );

        let profiler = GpuProfiler::new(&ctx, timestamps);

        Ok(Self {
            surface,
            surface_config,
            ctx,
            camera: Camera::new(width, height),
            composer,
            profiler,
            settings,
        })
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Swap the feature selection and rebuild the pass chain on the existing
    /// device. Blocks until the GPU is idle so the dropped passes' resources
    /// are no longer in flight, then reconstructs every pass from a fresh
    /// plan.
    pub fn set_settings(&mut self, settings: RendererSettings) -> Result<(), String> {
        self.settings = settings;
        self.ctx.device.poll(wgpu::Maintain::Wait);
        self.composer = build_composer(
            &self.ctx,
            &self.settings,
            self.surface_config.width,
            self.surface_config.height,
            self.surface_config.format,
        )?;
        self.camera.reset_history();
        log::info!(
            "composer rebuilt: {} passes, {:?}",
            self.composer.pass_count(),
            self.settings
        );
        Ok(())
    }

    pub fn set_ssao_enabled(&mut self, enabled: bool) -> Result<(), String> {
        self.set_settings(RendererSettings {
            ssao: enabled,
            ..self.settings
        })
    }

    pub fn set_ssr_enabled(&mut self, enabled: bool) -> Result<(), String> {
        self.set_settings(RendererSettings {
            ssr: enabled,
            ..self.settings
        })
    }

    pub fn set_taa_enabled(&mut self, enabled: bool) -> Result<(), String> {
        self.set_settings(RendererSettings {
            taa: enabled,
            ..self.settings
        })
    }

    pub fn set_bloom_enabled(&mut self, enabled: bool) -> Result<(), String> {
        self.set_settings(RendererSettings {
            bloom: enabled,
            ..self.settings
        })
    }

    pub fn set_skybox_enabled(&mut self, enabled: bool) -> Result<(), String> {
        self.set_settings(RendererSettings {
            skybox: enabled,
            ..self.settings
        })
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    /// Peak and current VRAM held by the composer's registry.
    pub fn vram(&self) -> &crate::resource::VramTracker {
        self.composer.vram()
    }

    /// Resize the surface and every size-dependent pass target.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        // The outgoing swapchain and pass targets may still be referenced by
        // in-flight work.
        self.ctx.device.poll(wgpu::Maintain::Wait);
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.ctx.device, &self.surface_config);
        self.composer.resize(&self.ctx, width, height);
        self.camera.resize(width, height);
        self.camera.reset_history();
    }

    /// Render one frame and present it.
    pub fn render(&mut self, scene: &dyn Scene) -> Result<(), String> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface
                    .configure(&self.ctx.device, &self.surface_config);
                self.surface
                    .get_current_texture()
                    .map_err(|e| format!("Surface texture error: {e}"))?
            }
            Err(e) => return Err(format!("Surface texture error: {e}")),
        };
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.camera.upload(&self.ctx);

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let profile = self.ctx.frame_index() % PROFILE_INTERVAL == 0;
        self.profiler.begin_frame();
        if profile {
            self.profiler.stamp(&mut encoder, "frame start");
        }
        if let Some(particles) = scene.particles() {
            particles.simulate(&self.ctx, &mut encoder, self.ctx.delta());
        }
        self.composer
            .render(&self.ctx, &mut encoder, scene, &self.camera, &surface_view)?;
        if profile {
            self.profiler.stamp(&mut encoder, "passes");
            self.profiler.resolve(&mut encoder);
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        if profile {
            self.profiler.report(&self.ctx);
        }
        output.present();

        self.ctx.advance_frame();
        Ok(())
    }
}
