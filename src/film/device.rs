use crate::{
    device::context::DeviceContext,
    foundation::core::{Resolution, Spectrum},
    foundation::error::{LucentError, LucentResult},
};

static NEXT_MIRROR_STAMP: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

/// Device-resident mirror of the film channels the image pipeline
/// needs: the tonemapped color (as `array<vec4f>`) and the validity
/// mask (as `array<u32>`).
///
/// A mirror is valid for exactly one (device context, resolution)
/// pair; the pipeline driver rebuilds it when either changes. Each
/// mirror carries a unique stamp so plugin kernel caches bound to its
/// buffers can detect that a different mirror is in play.
pub struct DeviceFilm {
    context_id: usize,
    stamp: usize,
    resolution: Resolution,
    tonemapped: wgpu::Buffer,
    mask: wgpu::Buffer,
}

impl DeviceFilm {
    /// Allocate the mirror buffers on `ctx`.
    pub(crate) fn new(ctx: &DeviceContext, resolution: Resolution) -> LucentResult<Self> {
        let pixels = resolution.pixel_count() as u64;
        let color_bytes = pixels * 16;
        let mask_bytes = pixels * 4;

        let limit = ctx.device().limits().max_storage_buffer_binding_size as u64;
        if color_bytes > limit {
            return Err(LucentError::device_setup(format!(
                "film mirror needs {color_bytes} B but storage bindings cap at {limit} B"
            )));
        }

        ctx.push_setup_scope();
        let tonemapped = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("lucent-film-tonemapped"),
            size: color_bytes,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let mask = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("lucent-film-mask"),
            size: mask_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        ctx.pop_setup_scope("film device mirror")?;

        Ok(Self {
            context_id: ctx.id(),
            stamp: NEXT_MIRROR_STAMP.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            resolution,
            tonemapped,
            mask,
        })
    }

    /// Unique identity of this mirror's buffer set.
    pub(crate) fn stamp(&self) -> usize {
        self.stamp
    }

    /// True when this mirror belongs to `ctx` at `resolution`.
    pub(crate) fn matches(&self, ctx: &DeviceContext, resolution: Resolution) -> bool {
        self.context_id == ctx.id() && self.resolution == resolution
    }

    /// Mirrored resolution.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Tonemapped color buffer (`array<vec4f>`, rgb in xyz).
    pub(crate) fn tonemapped_buffer(&self) -> &wgpu::Buffer {
        &self.tonemapped
    }

    /// Validity mask buffer (`array<u32>`, 0 or 1).
    pub(crate) fn mask_buffer(&self) -> &wgpu::Buffer {
        &self.mask
    }

    /// Refresh both mirrored channels from host memory.
    pub(crate) fn upload(&self, ctx: &DeviceContext, tonemapped: &[Spectrum], mask: &[bool]) {
        let mut color = Vec::with_capacity(tonemapped.len() * 4);
        for c in tonemapped {
            color.extend_from_slice(&[c.r, c.g, c.b, 0.0]);
        }
        let mask_words: Vec<u32> = mask.iter().map(|&m| u32::from(m)).collect();

        ctx.queue()
            .write_buffer(&self.tonemapped, 0, bytemuck::cast_slice(&color));
        ctx.queue()
            .write_buffer(&self.mask, 0, bytemuck::cast_slice(&mask_words));
    }

    /// Read the tonemapped channel back into host memory.
    pub(crate) fn download(
        &self,
        ctx: &DeviceContext,
        tonemapped: &mut [Spectrum],
    ) -> LucentResult<()> {
        let bytes = ctx.read_buffer(&self.tonemapped, tonemapped.len() as u64 * 16)?;
        // pod_collect_to_vec tolerates the unaligned byte source.
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
        for (i, c) in tonemapped.iter_mut().enumerate() {
            c.r = floats[i * 4];
            c.g = floats[i * 4 + 1];
            c.b = floats[i * 4 + 2];
        }
        Ok(())
    }
}
