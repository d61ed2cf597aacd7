//! Lucent is a physically based progressive rendering core.
//!
//! Lucent v0.1 covers the two subsystems everything else hangs off:
//! a dual-execution image pipeline that post-processes an accumulated
//! film identically on the host or on a GPU-class accelerator, and a
//! resumable render-engine lifecycle that drives stochastic sampling
//! into that film.
//!
//! # Pipeline overview
//!
//! 1. **Sample**: a [`LightTraceEngine`] draws light paths through the
//!    [`SceneSource`] seam and splats them into the [`Film`]
//!    accumulators from parallel workers.
//! 2. **Develop**: [`Film::develop`] resolves the accumulators into
//!    the tonemapped channel and the validity mask.
//! 3. **Post-process**: an [`ImagePipeline`] runs its plugins in order
//!    (auto-exposure tone map, gamma correction) on the host or, for
//!    capable plugins, on a [`DeviceContext`].
//! 4. **Resume** (optional): a stopped engine yields a [`RenderState`]
//!    that a fresh engine consumes to continue the run with a bumped
//!    seed and the film content preserved.
//!
//! The key design constraints in v0.1:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Reproducible-by-seed**: a run's sample sequences derive from
//!   one bootstrap seed; resuming bumps it deterministically.
//! - **Host/device parity**: both tone-map paths implement the same
//!   closed-form estimator and agree within floating-point tolerance.
//! - **Plugins respect the mask**: image plugins only touch pixels the
//!   accumulation pass marked valid.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod device;
mod engine;
mod film;
mod foundation;
mod pipeline;

pub use device::context::DeviceContext;
pub use engine::config::{
    EngineConfig, KEY_ENGINE_TYPE, KEY_FILTER, KEY_MAX_DEPTH, KEY_RADIANCE_CLAMP_MAX, KEY_RR_CAP,
    KEY_RR_DEPTH, KEY_VARIANCE_CLAMP_MAX, KEY_WORKER_COUNT,
};
pub use engine::light_trace::{LIGHT_TRACE_TAG, LightTraceEngine};
pub use engine::properties::Properties;
pub use engine::scene::{CameraKind, PathContext, PathSample, SceneSource};
pub use engine::splatter::PixelFilter;
pub use engine::state::RenderState;
pub use film::device::DeviceFilm;
pub use film::store::Film;
pub use foundation::core::{Resolution, Spectrum};
pub use foundation::error::{LucentError, LucentResult};
pub use pipeline::autolinear::AutoLinearToneMap;
pub use pipeline::gamma::GammaCorrection;
pub use pipeline::plugin::{
    DEFAULT_GAMMA, Execution, ImagePipeline, ImagePipelinePlugin, PipelineEnv,
};
