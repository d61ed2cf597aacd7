use std::any::Any;

use crate::{
    film::store::Film,
    foundation::error::{LucentError, LucentResult},
    pipeline::plugin::{Execution, ImagePipelinePlugin, PipelineEnv},
};

/// Gamma-correction plugin.
///
/// Clamps valid pixels to [0, 1] and raises each component to
/// `1 / gamma`. Its configured gamma also drives the auto-exposure
/// scale lookup for the whole pipeline.
pub struct GammaCorrection {
    gamma: f32,
}

impl GammaCorrection {
    /// Build the plugin; `gamma` must be finite and positive.
    pub fn new(gamma: f32) -> LucentResult<Self> {
        if !gamma.is_finite() || gamma <= 0.0 {
            return Err(LucentError::validation("gamma must be finite and > 0"));
        }
        Ok(Self { gamma })
    }

    /// Configured display gamma.
    pub fn gamma(&self) -> f32 {
        self.gamma
    }
}

impl ImagePipelinePlugin for GammaCorrection {
    fn name(&self) -> &'static str {
        "gamma-correction"
    }

    fn execution(&self) -> Execution {
        Execution::HostOnly
    }

    fn apply_host(&mut self, film: &mut Film, _env: &PipelineEnv) -> LucentResult<()> {
        let inv = 1.0 / self.gamma;
        let (tonemapped, mask) = film.channels_mut();
        for (c, &valid) in tonemapped.iter_mut().zip(mask) {
            if !valid {
                continue;
            }
            let correct = |v: f32| {
                // NaN maps to 0 so one bad component can't poison the pow.
                let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
                v.powf(inv)
            };
            c.r = correct(c.r);
            c.g = correct(c.g);
            c.b = correct(c.b);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/gamma.rs"]
mod tests;
