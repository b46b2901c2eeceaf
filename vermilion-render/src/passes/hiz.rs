//! Hi-Z pass: builds a min-reduced R32Float depth pyramid from the opaque
//! depth buffer. Mip 0 is a straight copy; each further mip is the min of
//! the texels it covers, so a ray marching a coarse mip can never tunnel
//! through geometry a finer mip would have stopped at.

use crate::context::RenderContext;
use crate::pass::{PassIo, PassKind, RenderPass};
use crate::pipeline;
use crate::resource::{names, RenderTexture, HIZ_FORMAT};
use crate::scene::Scene;
use vermilion_gpu_shared::shaders;

fn mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn mip_size(extent: u32, mip: u32) -> u32 {
    (extent >> mip).max(1)
}

struct Pyramid {
    texture: RenderTexture,
    /// One single-mip view per level, used both as reduce source and as the
    /// storage destination of the next level.
    mip_views: Vec<wgpu::TextureView>,
    mips: u32,
    width: u32,
    height: u32,
}

fn create_pyramid(ctx: &RenderContext, width: u32, height: u32) -> Pyramid {
    let mips = mip_count(width, height);
    let texture = RenderTexture::create(
        ctx,
        names::HIZ_DEPTH,
        width,
        height,
        1,
        mips,
        HIZ_FORMAT,
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::STORAGE_BINDING,
    );
    let mip_views = (0..mips)
        .map(|mip| {
            texture.texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Hi-Z Mip"),
                base_mip_level: mip,
                mip_level_count: Some(1),
                ..Default::default()
            })
        })
        .collect();
    Pyramid {
        texture,
        mip_views,
        mips,
        width,
        height,
    }
}

pub struct HiZPass {
    io: PassIo,
    copy_pipeline: wgpu::ComputePipeline,
    reduce_pipeline: wgpu::ComputePipeline,
    copy_bgl: wgpu::BindGroupLayout,
    reduce_bgl: wgpu::BindGroupLayout,
    pyramid: Pyramid,
}

impl HiZPass {
    pub fn new(ctx: &RenderContext, io: PassIo, width: u32, height: u32) -> Self {
        let copy_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Hi-Z Copy BGL"),
                entries: &[
                    pipeline::depth_texture_entry(
                        0,
                        wgpu::ShaderStages::COMPUTE,
                        wgpu::TextureViewDimension::D2,
                    ),
                    pipeline::storage_texture_entry(1, wgpu::ShaderStages::COMPUTE, HIZ_FORMAT),
                ],
            });
        let reduce_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Hi-Z Reduce BGL"),
                entries: &[
                    pipeline::loaded_texture_entry(0, wgpu::ShaderStages::COMPUTE),
                    pipeline::storage_texture_entry(1, wgpu::ShaderStages::COMPUTE, HIZ_FORMAT),
                ],
            });

        let copy_pipeline = pipeline::compute_pipeline(
            ctx,
            "Hi-Z Copy Pipeline",
            shaders::HIZ_COPY_COMPUTE,
            &[&copy_bgl],
        );
        let reduce_pipeline = pipeline::compute_pipeline(
            ctx,
            "Hi-Z Reduce Pipeline",
            shaders::HIZ_DOWNSAMPLE_COMPUTE,
            &[&reduce_bgl],
        );

        Self {
            io,
            copy_pipeline,
            reduce_pipeline,
            copy_bgl,
            reduce_bgl,
            pyramid: create_pyramid(ctx, width, height),
        }
    }
}

impl RenderPass for HiZPass {
    fn kind(&self) -> PassKind {
        PassKind::HiZ
    }

    fn io(&self) -> &PassIo {
        &self.io
    }

    fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        self.pyramid = create_pyramid(ctx, width, height);
    }

    fn render(
        &mut self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        _scene: &dyn Scene,
        _camera: &crate::Camera,
        inputs: &[RenderTexture],
        _surface_view: &wgpu::TextureView,
    ) -> Vec<RenderTexture> {
        let depth = &inputs[0];
        let groups = |extent: u32, mip: u32| mip_size(extent, mip).div_ceil(8);

        let copy_bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Hi-Z Copy BG"),
            layout: &self.copy_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&depth.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.pyramid.mip_views[0]),
                },
            ],
        });
        let reduce_bgs: Vec<_> = (1..self.pyramid.mips)
            .map(|mip| {
                ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Hi-Z Reduce BG"),
                    layout: &self.reduce_bgl,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(
                                &self.pyramid.mip_views[mip as usize - 1],
                            ),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(
                                &self.pyramid.mip_views[mip as usize],
                            ),
                        },
                    ],
                })
            })
            .collect();

        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Hi-Z Pass"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.copy_pipeline);
        cpass.set_bind_group(0, &copy_bg, &[]);
        cpass.dispatch_workgroups(
            groups(self.pyramid.width, 0),
            groups(self.pyramid.height, 0),
            1,
        );

        cpass.set_pipeline(&self.reduce_pipeline);
        for (i, bg) in reduce_bgs.iter().enumerate() {
            let mip = i as u32 + 1;
            cpass.set_bind_group(0, bg, &[]);
            cpass.dispatch_workgroups(
                groups(self.pyramid.width, mip),
                groups(self.pyramid.height, mip),
                1,
            );
        }
        drop(cpass);

        vec![self.pyramid.texture.clone()]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_count_covers_the_full_chain() {
        assert_eq!(mip_count(1, 1), 1);
        assert_eq!(mip_count(2, 2), 2);
        assert_eq!(mip_count(1920, 1080), 11);
        assert_eq!(mip_count(1024, 1024), 11);
    }

    #[test]
    fn mip_sizes_never_reach_zero() {
        let mips = mip_count(1920, 1080);
        for mip in 0..mips {
            assert!(mip_size(1920, mip) >= 1);
            assert!(mip_size(1080, mip) >= 1);
        }
        assert_eq!(mip_size(1920, mips - 1), 1);
    }
}
