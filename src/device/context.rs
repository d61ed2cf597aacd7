use std::sync::atomic::{AtomicUsize, Ordering};

use crate::foundation::error::{LucentError, LucentResult};

static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Handle to one accelerator device (adapter + device + queue).
///
/// Every context gets a unique id; plugin kernel caches are keyed by
/// (context id, film resolution) and invalidated when either changes.
pub struct DeviceContext {
    id: usize,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl DeviceContext {
    /// Acquire a high-performance adapter with no surface and create a
    /// device with the limits the adapter reports.
    ///
    /// Failure to find an adapter or create the device is a
    /// [`LucentError::DeviceSetup`] condition.
    pub fn new() -> LucentResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY | wgpu::Backends::GL,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| LucentError::device_setup("no compatible accelerator adapter found"))?;

        let info = adapter.get_info();
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("lucent-device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
            },
            None,
        ))
        .map_err(|e| LucentError::device_setup(format!("request_device failed: {e}")))?;

        device.on_uncaptured_error(Box::new(|err| {
            tracing::error!(error = %err, "uncaptured accelerator error");
        }));

        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        tracing::info!(id, adapter = %info.name, backend = ?info.backend, "accelerator context ready");

        Ok(Self { id, device, queue })
    }

    /// Unique id of this context, part of every kernel-cache key.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Underlying wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Submission queue of this context. All pipeline kernels are
    /// issued on this single ordered stream, which is what guarantees
    /// reduce -> accumulate -> apply ordering without extra fences.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Open an error scope covering resource setup (program
    /// compilation, buffer allocation).
    pub(crate) fn push_setup_scope(&self) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    }

    /// Close the matching setup scope. Any captured validation or
    /// out-of-memory fault is fatal for the caller's plugin/device
    /// pair and reported as a setup failure.
    pub(crate) fn pop_setup_scope(&self, label: &str) -> LucentResult<()> {
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        let validation = pollster::block_on(self.device.pop_error_scope());
        match validation.or(out_of_memory) {
            Some(err) => Err(LucentError::device_setup(format!("{label}: {err}"))),
            None => Ok(()),
        }
    }

    /// Copy `size` bytes out of `src` through a staging buffer and
    /// block until the data is mapped.
    pub(crate) fn read_buffer(&self, src: &wgpu::Buffer, size: u64) -> LucentResult<Vec<u8>> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lucent-readback-staging"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lucent-readback-encoder"),
            });
        encoder.copy_buffer_to_buffer(src, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        pollster::block_on(receiver.receive())
            .ok_or_else(|| LucentError::device("map_async callback channel dropped"))?
            .map_err(|e| LucentError::device(format!("buffer map failed: {e:?}")))?;

        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
