use std::any::Any;
use std::time::Instant;

use rayon::prelude::*;

use crate::{
    device::context::DeviceContext,
    film::device::DeviceFilm,
    film::store::Film,
    foundation::core::{Resolution, Spectrum},
    foundation::error::LucentResult,
    foundation::math::round_up,
    pipeline::plugin::{Execution, ImagePipelinePlugin, PipelineEnv},
};

const KERNEL_SOURCE: &str = include_str!("shaders/tonemap_autolinear.wgsl");

/// Pixels covered by one reduction work-group (64 lanes, two pixels
/// per lane).
const REDUCE_SPAN: u32 = 128;
const APPLY_GROUP_SIZE: u32 = 256;

/// Auto-exposure linear tone mapping.
///
/// Estimates a single scale from the mean luminance of the valid
/// pixels and multiplies every valid pixel by it, on the host or on an
/// accelerator device with numerically equivalent results.
#[derive(Default)]
pub struct AutoLinearToneMap {
    kernels: Option<ToneMapKernels>,
    device_builds: u32,
}

impl AutoLinearToneMap {
    /// New plugin with no device resources yet; kernels and buffers
    /// are built on the first device invocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times this plugin compiled programs and allocated
    /// device buffers. Stays at 1 while device and resolution are
    /// stable.
    pub fn device_build_count(&self) -> u32 {
        self.device_builds
    }

    /// Mean luminance over the film, skipping pixels with non-positive
    /// or non-finite luminance from the sum. The divisor is always the
    /// total pixel count, which keeps the historical exposure bias.
    fn mean_luminance(tonemapped: &[Spectrum], mask: &[bool]) -> f32 {
        let sum: f32 = tonemapped
            .par_iter()
            .zip(mask.par_iter())
            .map(|(c, &valid)| {
                if !valid {
                    return 0.0;
                }
                let y = c.y();
                if y <= 0.0 || !y.is_finite() { 0.0 } else { y }
            })
            .sum();
        sum / tonemapped.len() as f32
    }

    /// Closed-form scale for a mean luminance, or `None` for the
    /// degenerate no-change case.
    pub(crate) fn scale_for_mean(mean_y: f32, gamma: f32) -> Option<f32> {
        if mean_y <= 0.0 {
            return None;
        }
        // Exposure, f-stop and sensitivity constants cancel out.
        Some(1.25 / mean_y * (118.0f32 / 255.0).powf(gamma))
    }
}

impl ImagePipelinePlugin for AutoLinearToneMap {
    fn name(&self) -> &'static str {
        "tonemap-autolinear"
    }

    fn execution(&self) -> Execution {
        Execution::HostAndDevice
    }

    fn apply_host(&mut self, film: &mut Film, env: &PipelineEnv) -> LucentResult<()> {
        let mean_y = Self::mean_luminance(film.tonemapped(), film.mask());
        let Some(scale) = Self::scale_for_mean(mean_y, env.gamma) else {
            return Ok(());
        };

        // The scale is final here; the apply pass is free to run in any
        // pixel order.
        let (tonemapped, mask) = film.channels_mut();
        tonemapped
            .par_iter_mut()
            .zip(mask.par_iter())
            .for_each(|(c, &valid)| {
                if valid {
                    *c = c.scaled(scale);
                }
            });
        Ok(())
    }

    fn apply_device(
        &mut self,
        mirror: &mut DeviceFilm,
        env: &PipelineEnv,
        ctx: &DeviceContext,
    ) -> LucentResult<()> {
        let rebuild = !self
            .kernels
            .as_ref()
            .is_some_and(|k| k.matches(ctx, mirror));
        if rebuild {
            self.kernels = Some(ToneMapKernels::build(ctx, mirror, env.gamma)?);
            self.device_builds += 1;
        }
        let Some(kernels) = self.kernels.as_mut() else {
            return Ok(());
        };

        kernels.update_gamma(ctx, env.gamma);
        kernels.enqueue(ctx);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ToneMapUniforms {
    width: u32,
    height: u32,
    group_count: u32,
    pixel_count: u32,
    gamma: f32,
    _pad: [u32; 3],
}

/// Per-(device, mirror) kernel cache: three compiled programs, the
/// partial-sums buffer and the statically bound arguments. Built on
/// first use, reused for every following frame, torn down and rebuilt
/// when the device, the resolution or the mirrored buffer set changes.
struct ToneMapKernels {
    context_id: usize,
    mirror_stamp: usize,
    resolution: Resolution,
    group_count: u32,
    gamma: f32,
    uniforms: wgpu::Buffer,
    reduce_pipeline: wgpu::ComputePipeline,
    accumulate_pipeline: wgpu::ComputePipeline,
    apply_pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
}

impl ToneMapKernels {
    fn matches(&self, ctx: &DeviceContext, mirror: &DeviceFilm) -> bool {
        self.context_id == ctx.id()
            && self.resolution == mirror.resolution()
            && self.mirror_stamp == mirror.stamp()
    }

    fn build(ctx: &DeviceContext, mirror: &DeviceFilm, gamma: f32) -> LucentResult<Self> {
        let started = Instant::now();
        let device = ctx.device();
        let resolution = mirror.resolution();
        let pixel_count = resolution.pixel_count() as u32;
        let group_count = round_up(pixel_count, REDUCE_SPAN) / REDUCE_SPAN;

        ctx.push_setup_scope();

        let partials = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tonemap-partial-sums"),
            size: u64::from(group_count) * 16,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tonemap-uniforms"),
            size: std::mem::size_of::<ToneMapUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        ctx.queue().write_buffer(
            &uniforms,
            0,
            bytemuck::bytes_of(&ToneMapUniforms {
                width: resolution.width,
                height: resolution.height,
                group_count,
                pixel_count,
                gamma,
                _pad: [0; 3],
            }),
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tonemap-autolinear-shader"),
            source: wgpu::ShaderSource::Wgsl(KERNEL_SOURCE.into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tonemap-bind-group-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tonemap-pipeline-layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let compute = |label, entry_point| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point,
                compilation_options: Default::default(),
            })
        };
        let reduce_pipeline = compute("tonemap-sum-reduce", "sum_reduce");
        let accumulate_pipeline = compute("tonemap-sum-accumulate", "sum_accumulate");
        let apply_pipeline = compute("tonemap-apply", "apply");

        // Static arguments are bound once; only the gamma uniform is
        // refreshed between frames.
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tonemap-bind-group"),
            layout: &bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: mirror.tonemapped_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: mirror.mask_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: partials.as_entire_binding(),
                },
            ],
        });

        ctx.pop_setup_scope("auto-linear tone map kernels")?;

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            width = resolution.width,
            height = resolution.height,
            group_count,
            "compiled auto-linear tone map kernels"
        );

        Ok(Self {
            context_id: ctx.id(),
            mirror_stamp: mirror.stamp(),
            resolution,
            group_count,
            gamma,
            uniforms,
            reduce_pipeline,
            accumulate_pipeline,
            apply_pipeline,
            bind_group,
        })
    }

    fn update_gamma(&mut self, ctx: &DeviceContext, gamma: f32) {
        if gamma == self.gamma {
            return;
        }
        self.gamma = gamma;
        let pixel_count = self.resolution.pixel_count() as u32;
        ctx.queue().write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&ToneMapUniforms {
                width: self.resolution.width,
                height: self.resolution.height,
                group_count: self.group_count,
                pixel_count,
                gamma,
                _pad: [0; 3],
            }),
        );
    }

    /// Enqueue reduce, accumulate and apply on the context's single
    /// ordered queue; queue order is the only synchronization the
    /// kernels need.
    fn enqueue(&self, ctx: &DeviceContext) {
        let pixel_count = self.resolution.pixel_count() as u32;
        let apply_groups = round_up(pixel_count, APPLY_GROUP_SIZE) / APPLY_GROUP_SIZE;

        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tonemap-autolinear-encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("tonemap-autolinear-pass"),
                timestamp_writes: None,
            });
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.set_pipeline(&self.reduce_pipeline);
            pass.dispatch_workgroups(self.group_count, 1, 1);
            pass.set_pipeline(&self.accumulate_pipeline);
            pass.dispatch_workgroups(1, 1, 1);
            pass.set_pipeline(&self.apply_pipeline);
            pass.dispatch_workgroups(apply_groups, 1, 1);
        }
        ctx.queue().submit(std::iter::once(encoder.finish()));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/autolinear.rs"]
mod tests;
