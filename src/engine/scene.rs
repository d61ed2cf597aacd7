use rand::RngCore;

use crate::foundation::core::{Resolution, Spectrum};

/// Camera families an engine may be asked to render with.
///
/// The engine only needs the family for compatibility validation;
/// camera models themselves live with the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraKind {
    /// Standard single-eye perspective camera.
    Perspective,
    /// 360-degree environment camera.
    Environment,
    /// Stereo camera pair. Unsupported by the light-trace engine.
    Stereo,
}

/// One radiance contribution landing on the film plane.
#[derive(Clone, Copy, Debug)]
pub struct PathSample {
    /// Horizontal film position in pixel units.
    pub film_x: f32,
    /// Vertical film position in pixel units.
    pub film_y: f32,
    /// Linear RGB radiance carried by the path.
    pub radiance: Spectrum,
}

/// Per-run sampling parameters handed to the scene on every batch.
#[derive(Clone, Copy, Debug)]
pub struct PathContext {
    /// Film resolution the samples land on.
    pub resolution: Resolution,
    /// Maximum number of path vertices.
    pub max_path_depth: u32,
    /// First vertex at which Russian roulette may terminate a path.
    pub rr_depth: u32,
    /// Importance cap for the roulette continuation probability.
    pub rr_cap: f32,
}

/// Narrow seam to the scene: the engine never sees geometry or BSDFs,
/// it only asks for the camera family and for batches of film samples
/// drawn with its deterministic per-worker generator.
pub trait SceneSource: Send + Sync {
    /// Camera family the scene is configured with.
    fn camera(&self) -> CameraKind;

    /// Trace one light path and return its film contributions. May
    /// return an empty batch (occluded path, zero throughput).
    fn sample_path(&self, ctx: &PathContext, rng: &mut dyn RngCore) -> Vec<PathSample>;
}
