use crate::{engine::scene::PathSample, film::store::Film};

/// Reconstruction filter used when splatting samples onto the film.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PixelFilter {
    /// Constant weight inside the radius.
    Box {
        /// Filter radius in pixels.
        radius: f32,
    },
    /// Truncated gaussian, zero at the radius.
    Gaussian {
        /// Filter radius in pixels.
        radius: f32,
        /// Falloff rate; higher is sharper.
        alpha: f32,
    },
}

impl PixelFilter {
    /// Default reconstruction filter.
    pub fn default_gaussian() -> Self {
        PixelFilter::Gaussian {
            radius: 1.5,
            alpha: 2.0,
        }
    }

    /// Filter support radius in pixels.
    pub fn radius(self) -> f32 {
        match self {
            PixelFilter::Box { radius } | PixelFilter::Gaussian { radius, .. } => radius,
        }
    }

    /// Filter weight at offset (`dx`, `dy`) from the sample position.
    pub fn eval(self, dx: f32, dy: f32) -> f32 {
        match self {
            PixelFilter::Box { radius } => {
                if dx.abs() <= radius && dy.abs() <= radius {
                    1.0
                } else {
                    0.0
                }
            }
            PixelFilter::Gaussian { radius, alpha } => {
                let edge = (-alpha * radius * radius).exp();
                let g = |d: f32| ((-alpha * d * d).exp() - edge).max(0.0);
                g(dx) * g(dy)
            }
        }
    }
}

/// Per-run helper turning film-plane samples into weighted pixel
/// accumulator updates.
///
/// Bound to the pixel filter configured for the run: created by the
/// engine at start, dropped at stop, never used outside that scope.
pub(crate) struct SampleSplatter {
    filter: PixelFilter,
}

impl SampleSplatter {
    pub(crate) fn new(filter: PixelFilter) -> Self {
        Self { filter }
    }

    /// Splat one sample into every pixel whose center lies inside the
    /// filter support.
    pub(crate) fn splat(&self, film: &mut Film, sample: &PathSample) {
        let res = film.resolution();
        let radius = self.filter.radius();

        let x_min = (sample.film_x - radius).floor().max(0.0) as u32;
        let y_min = (sample.film_y - radius).floor().max(0.0) as u32;
        let x_max = ((sample.film_x + radius).ceil() as i64).min(i64::from(res.width) - 1);
        let y_max = ((sample.film_y + radius).ceil() as i64).min(i64::from(res.height) - 1);
        if x_max < 0 || y_max < 0 {
            return;
        }

        for py in y_min..=y_max as u32 {
            for px in x_min..=x_max as u32 {
                let dx = (px as f32 + 0.5) - sample.film_x;
                let dy = (py as f32 + 0.5) - sample.film_y;
                let weight = self.filter.eval(dx, dy);
                if weight > 0.0 {
                    film.add_sample(px, py, sample.radiance, weight);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/splatter.rs"]
mod tests;
