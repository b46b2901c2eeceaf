//! Directional + ambient lighting resolve over the G-buffer.

use crate::context::{RenderContext, SamplerKind};
use crate::pass::{PassIo, PassKind, RenderPass};
use crate::pipeline;
use crate::resource::{RenderTexture, HDR_FORMAT};
use crate::scene::Scene;
use vermilion_gpu_shared::shaders;

pub struct DirectionalAmbientPass {
    io: PassIo,
    pipeline: wgpu::RenderPipeline,
    gbuffer_bgl: wgpu::BindGroupLayout,
    light_bgl: wgpu::BindGroupLayout,
    env_bgl: wgpu::BindGroupLayout,
    target: RenderTexture,
    /// 1x1 white AO stand-in when the SSAO pass is not scheduled.
    white_ao: wgpu::TextureView,
    /// 1x1 black cube stand-in when the scene has no environment maps.
    black_cube: wgpu::TextureView,
}

fn create_target(ctx: &RenderContext, width: u32, height: u32) -> RenderTexture {
    RenderTexture::create(
        ctx,
        "Lighting Target",
        width,
        height,
        1,
        1,
        HDR_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

fn create_white_r16(ctx: &RenderContext) -> wgpu::TextureView {
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("White 1x1 R16F"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::R16Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    // f16 1.0
    ctx.queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[0x00, 0x3C],
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(2),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_black_cube(ctx: &RenderContext) -> wgpu::TextureView {
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Black 1x1 Cube"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 6,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba16Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    ctx.queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[0u8; 48],
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(8),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 6,
        },
    );
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("Black Cube View"),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    })
}

impl DirectionalAmbientPass {
    pub fn new(ctx: &RenderContext, io: PassIo, width: u32, height: u32) -> Self {
        let gbuffer_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Lighting GBuffer BGL"),
                entries: &[
                    pipeline::loaded_texture_entry(0, wgpu::ShaderStages::FRAGMENT),
                    pipeline::loaded_texture_entry(1, wgpu::ShaderStages::FRAGMENT),
                    pipeline::depth_texture_entry(
                        2,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureViewDimension::D2,
                    ),
                    pipeline::loaded_texture_entry(3, wgpu::ShaderStages::FRAGMENT),
                ],
            });
        let light_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Lighting Lights BGL"),
                entries: &[
                    pipeline::storage_entry(0, wgpu::ShaderStages::FRAGMENT, true),
                    pipeline::uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
                    pipeline::uniform_entry(2, wgpu::ShaderStages::FRAGMENT),
                    pipeline::depth_texture_entry(
                        3,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureViewDimension::D2Array,
                    ),
                    pipeline::sampler_entry(
                        4,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::SamplerBindingType::Comparison,
                    ),
                ],
            });
        let env_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Lighting Env BGL"),
                entries: &[
                    pipeline::texture_entry(
                        0,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureSampleType::Float { filterable: true },
                        wgpu::TextureViewDimension::Cube,
                    ),
                    pipeline::texture_entry(
                        1,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureSampleType::Float { filterable: true },
                        wgpu::TextureViewDimension::Cube,
                    ),
                    pipeline::sampler_entry(
                        2,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::SamplerBindingType::Filtering,
                    ),
                ],
            });

        let pipeline = pipeline::fullscreen_pipeline(
            ctx,
            "Lighting Pipeline",
            "Lighting Frag",
            shaders::LIGHTING_FRAG,
            &[&ctx.camera_bgl, &gbuffer_bgl, &light_bgl, &env_bgl],
            HDR_FORMAT,
            None,
        );

        Self {
            io,
            pipeline,
            gbuffer_bgl,
            light_bgl,
            env_bgl,
            target: create_target(ctx, width, height),
            white_ao: create_white_r16(ctx),
            black_cube: create_black_cube(ctx),
        }
    }
}

impl RenderPass for DirectionalAmbientPass {
    fn kind(&self) -> PassKind {
        PassKind::DirectionalAmbient
    }

    fn io(&self) -> &PassIo {
        &self.io
    }

    fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        self.target = create_target(ctx, width, height);
    }

    fn render(
        &mut self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        scene: &dyn Scene,
        _camera: &crate::Camera,
        inputs: &[RenderTexture],
        _surface_view: &wgpu::TextureView,
    ) -> Vec<RenderTexture> {
        let normal = &inputs[0];
        let color = &inputs[1];
        let depth = &inputs[2];
        let shadow = &inputs[3];
        let ao_view = inputs.get(4).map(|t| &t.view).unwrap_or(&self.white_ao);

        let gbuffer_bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lighting GBuffer BG"),
            layout: &self.gbuffer_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&depth.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(ao_view),
                },
            ],
        });

        let lights = scene.lights();
        let shadow_sampler = ctx.sampler(SamplerKind::ShadowCompare);
        let light_bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lighting Lights BG"),
            layout: &self.light_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: lights.light_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights.directional_slice_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: lights.cascade_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&shadow.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
        });

        let env_sampler = ctx.sampler(SamplerKind::LinearClamp);
        let (irradiance, reflectance) = match scene.environment() {
            Some(env) => (env.irradiance_view(), env.reflectance_view()),
            None => (&self.black_cube, &self.black_cube),
        };
        let env_bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lighting Env BG"),
            layout: &self.env_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(irradiance),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(reflectance),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&env_sampler),
                },
            ],
        });

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Lighting Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &ctx.camera_bind_group, &[]);
        rpass.set_bind_group(1, &gbuffer_bg, &[]);
        rpass.set_bind_group(2, &light_bg, &[]);
        rpass.set_bind_group(3, &env_bg, &[]);
        rpass.draw(0..3, 0..1);
        drop(rpass);

        vec![self.target.clone()]
    }
}
