//! GPU timestamp profiler. No-op when the adapter lacks TIMESTAMP_QUERY.

use crate::context::RenderContext;

const MAX_STAMPS: u32 = 32;

/// Records timestamps between passes and periodically logs per-span GPU
/// times. Reading the results back blocks on the queue, so `report` should
/// only be called every few hundred frames.
pub struct GpuProfiler {
    query_set: Option<wgpu::QuerySet>,
    resolve_buffer: wgpu::Buffer,
    readback_buffer: wgpu::Buffer,
    timestamp_period: f32,
    labels: Vec<&'static str>,
}

impl GpuProfiler {
    /// `enabled` should be true only when the device was created with
    /// `Features::TIMESTAMP_QUERY`.
    pub fn new(ctx: &RenderContext, enabled: bool) -> Self {
        let query_set = enabled.then(|| {
            ctx.device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("Frame Timestamps"),
                ty: wgpu::QueryType::Timestamp,
                count: MAX_STAMPS,
            })
        });

        let resolve_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Timestamp Resolve"),
            size: MAX_STAMPS as u64 * 8,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Timestamp Readback"),
            size: MAX_STAMPS as u64 * 8,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            query_set,
            resolve_buffer,
            readback_buffer,
            timestamp_period: ctx.queue.get_timestamp_period(),
            labels: Vec::new(),
        }
    }

    pub fn begin_frame(&mut self) {
        self.labels.clear();
    }

    /// Write a timestamp named `label`. Each span is reported as the delta
    /// to the previous stamp.
    pub fn stamp(&mut self, encoder: &mut wgpu::CommandEncoder, label: &'static str) {
        let Some(ref query_set) = self.query_set else {
            return;
        };
        if self.labels.len() as u32 >= MAX_STAMPS {
            return;
        }
        encoder.write_timestamp(query_set, self.labels.len() as u32);
        self.labels.push(label);
    }

    /// Resolve this frame's stamps into the readback buffer.
    pub fn resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        let Some(ref query_set) = self.query_set else {
            return;
        };
        let count = self.labels.len() as u32;
        if count < 2 {
            return;
        }
        encoder.resolve_query_set(query_set, 0..count, &self.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(
            &self.resolve_buffer,
            0,
            &self.readback_buffer,
            0,
            count as u64 * 8,
        );
    }

    /// Block until the GPU is idle, then log per-span times. Call after the
    /// frame's submit.
    pub fn report(&self, ctx: &RenderContext) {
        if self.query_set.is_none() || self.labels.len() < 2 {
            return;
        }
        let count = self.labels.len();

        let slice = self.readback_buffer.slice(0..count as u64 * 8);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        ctx.device.poll(wgpu::Maintain::Wait);

        {
            let data = slice.get_mapped_range();
            let stamps: &[u64] = bytemuck::cast_slice(&data);
            for i in 1..count {
                let ticks = stamps[i].saturating_sub(stamps[i - 1]);
                let ms = ticks as f64 * self.timestamp_period as f64 / 1.0e6;
                log::debug!("gpu span {}: {:.3} ms", self.labels[i], ms);
            }
        }
        self.readback_buffer.unmap();
    }
}
