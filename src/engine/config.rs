use crate::{
    engine::properties::Properties,
    engine::splatter::PixelFilter,
    foundation::error::{LucentError, LucentResult},
};

/// Property key for the engine type tag.
pub const KEY_ENGINE_TYPE: &str = "engine-type";
/// Property key for the maximum path depth.
pub const KEY_MAX_DEPTH: &str = "max-depth";
/// Property key for the Russian-roulette start depth.
pub const KEY_RR_DEPTH: &str = "rr-depth";
/// Property key for the Russian-roulette importance cap.
pub const KEY_RR_CAP: &str = "rr-cap";
/// Property key for the variance clamp bound.
pub const KEY_VARIANCE_CLAMP_MAX: &str = "variance-clamp-max";
/// Pre-rename key for [`KEY_VARIANCE_CLAMP_MAX`]; accepted as a
/// fallback when the new key is absent.
pub const KEY_RADIANCE_CLAMP_MAX: &str = "radiance-clamp-max";
/// Property key for the reconstruction filter kind.
pub const KEY_FILTER: &str = "filter";
/// Property key for the sampling worker count (0 = auto).
pub const KEY_WORKER_COUNT: &str = "worker-count";

/// Render-engine configuration scalars.
///
/// Bound once when an engine is built and immutable for the lifetime
/// of the run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// Maximum number of path vertices. Default 5.
    pub max_path_depth: u32,
    /// First vertex at which Russian roulette may terminate. Default 3.
    pub rr_depth: u32,
    /// Roulette continuation-probability cap. Default 0.5.
    pub rr_cap: f32,
    /// Square root of the variance clamp bound; 0 disables clamping.
    /// Never negative.
    pub variance_clamp_max: f32,
    /// Reconstruction filter the sample splatter is bound to.
    pub filter: PixelFilter,
    /// Number of sampling workers; 0 resolves to the machine's
    /// available parallelism at start.
    pub worker_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_path_depth: 5,
            rr_depth: 3,
            rr_cap: 0.5,
            variance_clamp_max: 0.0,
            filter: PixelFilter::default_gaussian(),
            worker_count: 0,
        }
    }
}

impl EngineConfig {
    /// Read the configuration scalars out of a flat property set,
    /// applying the documented defaults for absent keys.
    ///
    /// If `engine-type` is present it must match `engine_tag`.
    pub fn from_properties(props: &Properties, engine_tag: &str) -> LucentResult<Self> {
        if let Some(tag) = props.get_str(KEY_ENGINE_TYPE)? {
            if tag != engine_tag {
                return Err(LucentError::config(format!(
                    "properties describe engine '{tag}', not '{engine_tag}'"
                )));
            }
        }

        let defaults = Self::default();

        let max_path_depth = match props.get_i64(KEY_MAX_DEPTH)? {
            None => defaults.max_path_depth,
            Some(v) if v >= 1 => v as u32,
            Some(_) => return Err(LucentError::validation("max-depth must be >= 1")),
        };
        let rr_depth = match props.get_i64(KEY_RR_DEPTH)? {
            None => defaults.rr_depth,
            Some(v) if v >= 1 => v as u32,
            Some(_) => return Err(LucentError::validation("rr-depth must be >= 1")),
        };
        let rr_cap = props.get_f32(KEY_RR_CAP)?.unwrap_or(defaults.rr_cap);

        // The radiance clamp was converted into a variance clamp; the
        // old key still works when the new one is absent.
        let clamp = match props.get_f32(KEY_VARIANCE_CLAMP_MAX)? {
            Some(v) => v,
            None => props
                .get_f32(KEY_RADIANCE_CLAMP_MAX)?
                .unwrap_or(defaults.variance_clamp_max),
        };
        let variance_clamp_max = clamp.max(0.0);

        let filter = match props.get_str(KEY_FILTER)? {
            None => defaults.filter,
            Some("gaussian") => PixelFilter::default_gaussian(),
            Some("box") => PixelFilter::Box { radius: 0.5 },
            Some(other) => {
                return Err(LucentError::validation(format!(
                    "unknown filter kind '{other}'"
                )));
            }
        };

        let worker_count = match props.get_i64(KEY_WORKER_COUNT)? {
            None => defaults.worker_count,
            Some(v) if v >= 0 => v as usize,
            Some(_) => return Err(LucentError::validation("worker-count must be >= 0")),
        };

        Ok(Self {
            max_path_depth,
            rr_depth,
            rr_cap,
            variance_clamp_max,
            filter,
            worker_count,
        })
    }

    /// Write the configuration back into a flat property set. The
    /// result round-trips through [`EngineConfig::from_properties`].
    pub fn to_properties(&self, engine_tag: &str) -> Properties {
        Properties::new()
            .with(KEY_ENGINE_TYPE, engine_tag)
            .with(KEY_MAX_DEPTH, i64::from(self.max_path_depth))
            .with(KEY_RR_DEPTH, i64::from(self.rr_depth))
            .with(KEY_RR_CAP, f64::from(self.rr_cap))
            .with(KEY_VARIANCE_CLAMP_MAX, f64::from(self.variance_clamp_max))
            .with(
                KEY_FILTER,
                match self.filter {
                    PixelFilter::Box { .. } => "box",
                    PixelFilter::Gaussian { .. } => "gaussian",
                },
            )
            .with(KEY_WORKER_COUNT, self.worker_count as i64)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/config.rs"]
mod tests;
