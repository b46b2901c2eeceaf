//! Smoke tests on a headless device for behavior only the validation layer
//! can confirm: attachment usage scopes, registry publishing, and the
//! particle dispatch. Every test skips silently when no adapter is present.

use glam::Vec3;
use vermilion_gpu_shared::uniforms::ParticleRaw;
use vermilion_render::lights::{Light, LightCollection};
use vermilion_render::passes::point_lights::{PointLightShadePass, VolumePath};
use vermilion_render::resource::{ALBEDO_FORMAT, DEPTH_FORMAT, HDR_FORMAT};
use vermilion_render::{
    names, Camera, Composer, EnvironmentMaps, ParticleSystem, PassIo, PassKind, RenderContext,
    RenderPass, RenderTexture, Scene,
};

const SIZE: u32 = 64;

fn test_context() -> Option<RenderContext> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter =
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
    let (device, queue) =
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None))
            .ok()?;
    Some(RenderContext::new(device, queue))
}

struct EmptyScene {
    lights: LightCollection,
}

impl Scene for EmptyScene {
    fn render_opaque(&self, _rpass: &mut wgpu::RenderPass<'static>, _ctx: &RenderContext) {}
    fn render_depth_only(&self, _rpass: &mut wgpu::RenderPass<'static>, _ctx: &RenderContext) {}
    fn render_transparent(&self, _rpass: &mut wgpu::RenderPass<'static>, _ctx: &RenderContext) {}
    fn lights(&self) -> &LightCollection {
        &self.lights
    }
    fn environment(&self) -> Option<&dyn EnvironmentMaps> {
        None
    }
}

fn color_target(ctx: &RenderContext, name: &str, format: wgpu::TextureFormat) -> RenderTexture {
    RenderTexture::create(
        ctx,
        name,
        SIZE,
        SIZE,
        1,
        1,
        format,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

#[test]
fn shade_pass_samples_depth_through_a_read_only_attachment() {
    let Some(ctx) = test_context() else {
        return;
    };

    let mut lights = LightCollection::new(&ctx, 8);
    lights.update(
        &ctx,
        &[Light::Point {
            position: Vec3::new(0.0, 0.0, -5.0),
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 2.0,
        }],
        Vec3::ZERO,
        0.1,
    );
    let scene = EmptyScene { lights };

    let normal = color_target(&ctx, names::NORMAL, HDR_FORMAT);
    let color = color_target(&ctx, names::COLOR_REFLECTANCE, ALBEDO_FORMAT);
    let lighting = color_target(&ctx, names::LIGHTING, HDR_FORMAT);
    // Same shape the G-buffer publishes: full depth-stencil allocation,
    // depth-only view for sampling.
    let depth_full = color_target(&ctx, names::DEPTH, DEPTH_FORMAT);
    let depth = depth_full.with_view(depth_full.texture.create_view(&wgpu::TextureViewDescriptor {
        aspect: wgpu::TextureAspect::DepthOnly,
        ..Default::default()
    }));

    let io = PassIo::new(
        vec![
            names::NORMAL,
            names::COLOR_REFLECTANCE,
            names::DEPTH,
            names::LIGHTING,
        ],
        vec![names::LIGHTING],
    );
    let mut pass = PointLightShadePass::new(&ctx, io, VolumePath::StencilCulled);

    let mut camera = Camera::new(SIZE, SIZE);
    camera.upload(&ctx);
    let surface = color_target(&ctx, "surface stand-in", HDR_FORMAT);

    // The depth texture is both sampled in the pass's G-buffer bind group
    // and attached; that is only valid with a read-only attachment.
    ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    let inputs = [normal, color, depth, lighting];
    let outputs = pass.render(&ctx, &mut encoder, &scene, &camera, &inputs, &surface.view);
    ctx.queue.submit(std::iter::once(encoder.finish()));
    let error = pollster::block_on(ctx.device.pop_error_scope());

    assert!(error.is_none(), "validation error: {error:?}");
    assert_eq!(outputs.len(), 1);
}

struct PublishPass {
    io: PassIo,
    texture: RenderTexture,
}

impl RenderPass for PublishPass {
    fn kind(&self) -> PassKind {
        PassKind::GBuffer
    }
    fn io(&self) -> &PassIo {
        &self.io
    }
    fn resize(&mut self, _ctx: &RenderContext, _width: u32, _height: u32) {}
    fn render(
        &mut self,
        _ctx: &RenderContext,
        _encoder: &mut wgpu::CommandEncoder,
        _scene: &dyn Scene,
        _camera: &Camera,
        _inputs: &[RenderTexture],
        _surface_view: &wgpu::TextureView,
    ) -> Vec<RenderTexture> {
        vec![self.texture.clone()]
    }
}

#[test]
fn composer_exposes_published_textures_by_name() {
    let Some(ctx) = test_context() else {
        return;
    };

    let scene = EmptyScene {
        lights: LightCollection::new(&ctx, 4),
    };
    let texture = color_target(&ctx, names::LIGHTING, HDR_FORMAT);
    let expected_id = texture.id;

    let mut composer = Composer::new();
    composer.add_pass(Box::new(PublishPass {
        io: PassIo::new(vec![], vec![names::LIGHTING]),
        texture,
    }));
    assert!(composer.texture(names::LIGHTING).is_none());

    let camera = Camera::new(SIZE, SIZE);
    let surface = color_target(&ctx, "surface stand-in", HDR_FORMAT);
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    composer
        .render(&ctx, &mut encoder, &scene, &camera, &surface.view)
        .unwrap();

    assert_eq!(
        composer.texture(names::LIGHTING).map(|t| t.id),
        Some(expected_id)
    );
    assert!(composer.texture(names::BLOOM).is_none());
}

#[test]
fn particle_simulation_dispatches_into_the_light_array() {
    let Some(ctx) = test_context() else {
        return;
    };

    let mut lights = LightCollection::new(&ctx, 8);
    // One placeholder point light reserves the slot the particle mirrors
    // into.
    lights.update(
        &ctx,
        &[Light::Point {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 3.0,
        }],
        Vec3::new(0.0, 0.0, 30.0),
        0.1,
    );

    let particle = ParticleRaw {
        position: [0.0, 1.0, 0.0, 1.0],
        origin: [0.0, 1.0, 0.0, 1.0],
        velocity: [0.0, 0.5, 0.0, 0.0],
        radius: 3.0,
        life: 0.0,
        life_speed: 0.25,
        _pad: 0.0,
    };
    let system = ParticleSystem::new(&ctx, &lights, &[particle], 0).unwrap();
    assert_eq!(system.count(), 1);

    ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    system.simulate(&ctx, &mut encoder, 1.0 / 60.0);
    ctx.queue.submit(std::iter::once(encoder.finish()));
    let error = pollster::block_on(ctx.device.pop_error_scope());

    assert!(error.is_none(), "validation error: {error:?}");
}
