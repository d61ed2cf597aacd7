use std::any::Any;

use crate::{
    device::context::DeviceContext,
    film::device::DeviceFilm,
    film::store::Film,
    foundation::error::{LucentError, LucentResult},
    pipeline::gamma::GammaCorrection,
};

/// Display gamma assumed when no gamma-correction plugin is installed.
pub const DEFAULT_GAMMA: f32 = 2.2;

/// Which execution paths a plugin implements.
///
/// Callers query this before dispatch; a plugin is never probed by
/// dynamic type to find out whether it can run on a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Execution {
    /// Host path only.
    HostOnly,
    /// Host path plus a numerically equivalent device path.
    HostAndDevice,
}

/// Pipeline-wide values resolved once per execution and handed to
/// every plugin.
#[derive(Clone, Copy, Debug)]
pub struct PipelineEnv {
    /// Display gamma: the installed [`GammaCorrection`] plugin's value,
    /// or [`DEFAULT_GAMMA`].
    pub gamma: f32,
}

/// A post-processing step over the film's tonemapped channel.
///
/// Plugins are stateless with respect to image content between
/// invocations; the only state a plugin may carry is its lazily built
/// device resource cache. Every plugin reads and writes only pixels
/// whose validity mask is set and must tolerate non-finite or
/// non-positive values in individual pixels.
pub trait ImagePipelinePlugin: Send {
    /// Stable name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Capability tag for dispatch.
    fn execution(&self) -> Execution;

    /// Apply the plugin on the host, in place.
    fn apply_host(&mut self, film: &mut Film, env: &PipelineEnv) -> LucentResult<()>;

    /// Apply the plugin on the device mirror. The default body rejects
    /// the call; only [`Execution::HostAndDevice`] plugins override it.
    fn apply_device(
        &mut self,
        mirror: &mut DeviceFilm,
        env: &PipelineEnv,
        ctx: &DeviceContext,
    ) -> LucentResult<()> {
        let _ = (mirror, env, ctx);
        Err(LucentError::device_setup(format!(
            "plugin '{}' has no device execution path",
            self.name()
        )))
    }

    /// Type-erased self, used only for the by-type gamma lookup.
    fn as_any(&self) -> &dyn Any;
}

/// Ordered sequence of plugins applied to a film once per output.
/// Owns the plugins for its whole lifetime.
#[derive(Default)]
pub struct ImagePipeline {
    plugins: Vec<Box<dyn ImagePipelinePlugin>>,
}

impl ImagePipeline {
    /// Empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `plugin` to the end of the chain.
    pub fn push(&mut self, plugin: Box<dyn ImagePipelinePlugin>) {
        self.plugins.push(plugin);
    }

    /// Builder-style [`ImagePipeline::push`].
    #[must_use]
    pub fn with(mut self, plugin: Box<dyn ImagePipelinePlugin>) -> Self {
        self.push(plugin);
        self
    }

    /// Number of installed plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// True when no plugin is installed.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Gamma of the first installed [`GammaCorrection`] plugin, if any.
    pub fn gamma(&self) -> Option<f32> {
        self.plugins
            .iter()
            .find_map(|p| p.as_any().downcast_ref::<GammaCorrection>())
            .map(|g| g.gamma())
    }

    fn env(&self) -> PipelineEnv {
        PipelineEnv {
            gamma: self.gamma().unwrap_or(DEFAULT_GAMMA),
        }
    }

    /// Run every plugin in order on the host.
    #[tracing::instrument(skip(self, film))]
    pub fn execute_host(&mut self, film: &mut Film) -> LucentResult<()> {
        let env = self.env();
        for plugin in &mut self.plugins {
            plugin.apply_host(film, &env)?;
        }
        Ok(())
    }

    /// Run the chain with device execution for every capable plugin.
    ///
    /// The film's device mirror is (re)built for `ctx`, uploaded once,
    /// kept coherent across host-only plugins in the middle of the
    /// chain, and downloaded at the end. A fully-invalid film skips
    /// device work entirely.
    #[tracing::instrument(skip(self, film, ctx))]
    pub fn execute_device(&mut self, film: &mut Film, ctx: &DeviceContext) -> LucentResult<()> {
        if film.is_empty() {
            return self.execute_host(film);
        }

        let env = self.env();
        {
            let (slot, tonemapped, mask, resolution) = film.mirror_parts();
            if !slot.as_ref().is_some_and(|m| m.matches(ctx, resolution)) {
                *slot = Some(DeviceFilm::new(ctx, resolution)?);
            }
            let Some(mirror) = slot.as_mut() else {
                return Err(LucentError::device("film mirror unavailable"));
            };
            mirror.upload(ctx, tonemapped, mask);
        }

        // Coherence flags: device_dirty = device copy is newer than the
        // host copy; host_dirty = the other way around.
        let mut device_dirty = false;
        let mut host_dirty = false;

        for idx in 0..self.plugins.len() {
            match self.plugins[idx].execution() {
                Execution::HostAndDevice => {
                    let (slot, tonemapped, mask, _resolution) = film.mirror_parts();
                    let Some(mirror) = slot.as_mut() else {
                        return Err(LucentError::device("film mirror unavailable"));
                    };
                    if host_dirty {
                        mirror.upload(ctx, tonemapped, mask);
                        host_dirty = false;
                    }
                    self.plugins[idx].apply_device(mirror, &env, ctx)?;
                    device_dirty = true;
                }
                Execution::HostOnly => {
                    if device_dirty {
                        let (slot, tonemapped, _mask, _resolution) = film.mirror_parts();
                        let Some(mirror) = slot.as_mut() else {
                            return Err(LucentError::device("film mirror unavailable"));
                        };
                        mirror.download(ctx, tonemapped)?;
                        device_dirty = false;
                    }
                    self.plugins[idx].apply_host(film, &env)?;
                    host_dirty = true;
                }
            }
        }

        if device_dirty {
            let (slot, tonemapped, _mask, _resolution) = film.mirror_parts();
            let Some(mirror) = slot.as_mut() else {
                return Err(LucentError::device("film mirror unavailable"));
            };
            mirror.download(ctx, tonemapped)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/plugin.rs"]
mod tests;
