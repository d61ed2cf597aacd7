use std::path::Path;

use crate::{
    film::device::DeviceFilm,
    foundation::core::{Resolution, Spectrum},
    foundation::error::{LucentError, LucentResult},
};

/// Frame buffer store: the per-pixel channels a render accumulates
/// into and the image pipeline reads from.
///
/// Channels (all dense, one element per pixel, row-major):
///
/// - radiance accumulators (`sum`, `weight`): owned by the render
///   engine, read-only to the image pipeline;
/// - `TONEMAPPED`: developed color, mutated by every pipeline plugin
///   in sequence;
/// - `VALID_MASK`: set by [`Film::develop`] from accumulated weight,
///   read-only to plugins. Plugins touch only mask-true pixels.
pub struct Film {
    resolution: Resolution,
    sum: Vec<Spectrum>,
    weight: Vec<f32>,
    tonemapped: Vec<Spectrum>,
    mask: Vec<bool>,
    mirror: Option<DeviceFilm>,
}

impl Film {
    /// Create an empty film at the given resolution.
    pub fn new(resolution: Resolution) -> Self {
        let n = resolution.pixel_count();
        Self {
            resolution,
            sum: vec![Spectrum::BLACK; n],
            weight: vec![0.0; n],
            tonemapped: vec![Spectrum::BLACK; n],
            mask: vec![false; n],
            mirror: None,
        }
    }

    /// Film resolution.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Total pixel count (valid or not).
    pub fn pixel_count(&self) -> usize {
        self.resolution.pixel_count()
    }

    /// Drop all accumulated samples and developed content.
    pub fn clear(&mut self) {
        self.sum.fill(Spectrum::BLACK);
        self.weight.fill(0.0);
        self.tonemapped.fill(Spectrum::BLACK);
        self.mask.fill(false);
    }

    /// Add a filter-weighted radiance sample to one pixel's
    /// accumulator. Addition is associative and commutative; callers
    /// serialize concurrent access (the engine merges worker batches
    /// under a mutex), so no torn writes can occur.
    pub fn add_sample(&mut self, x: u32, y: u32, radiance: Spectrum, weight: f32) {
        if x >= self.resolution.width || y >= self.resolution.height {
            return;
        }
        let i = (y * self.resolution.width + x) as usize;
        self.sum[i] = self.sum[i].added(radiance.scaled(weight));
        self.weight[i] += weight;
    }

    /// Develop the accumulators into the `TONEMAPPED` channel and
    /// recompute the `VALID_MASK`. Pixels with zero accumulated weight
    /// stay invalid and their tonemapped value is left untouched.
    pub fn develop(&mut self) {
        for i in 0..self.pixel_count() {
            if self.weight[i] > 0.0 {
                self.tonemapped[i] = self.sum[i].scaled(1.0 / self.weight[i]);
                self.mask[i] = true;
            } else {
                self.mask[i] = false;
            }
        }
    }

    /// True when no pixel is valid.
    pub fn is_empty(&self) -> bool {
        !self.mask.iter().any(|&m| m)
    }

    /// Read access to the tonemapped channel.
    pub fn tonemapped(&self) -> &[Spectrum] {
        &self.tonemapped
    }

    /// Write access to the tonemapped channel (plugins only; respect
    /// the mask).
    pub fn tonemapped_mut(&mut self) -> &mut [Spectrum] {
        &mut self.tonemapped
    }

    /// Read access to the validity mask.
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Mutable tonemapped channel together with the read-only mask,
    /// borrowed in one call so plugins can filter writes by validity.
    pub fn channels_mut(&mut self) -> (&mut [Spectrum], &[bool]) {
        (&mut self.tonemapped, &self.mask)
    }

    /// Accumulated weight per pixel (diagnostics; read-only).
    pub fn weights(&self) -> &[f32] {
        &self.weight
    }

    /// Split access to the tonemapped channel, the mask and the device
    /// mirror slot. Lets the pipeline driver sync the mirror while the
    /// film stays borrowed once.
    pub(crate) fn mirror_parts(
        &mut self,
    ) -> (&mut Option<DeviceFilm>, &mut [Spectrum], &[bool], Resolution) {
        (
            &mut self.mirror,
            &mut self.tonemapped,
            &self.mask,
            self.resolution,
        )
    }

    /// Dump the tonemapped channel as an 8-bit PNG. Invalid pixels
    /// come out black. Values are clamped to [0, 1]; gamma is whatever
    /// the pipeline left in the channel.
    pub fn write_png(&self, path: impl AsRef<Path>) -> LucentResult<()> {
        let mut img = image::RgbImage::new(self.resolution.width, self.resolution.height);
        for (i, px) in img.pixels_mut().enumerate() {
            let c = if self.mask[i] {
                self.tonemapped[i]
            } else {
                Spectrum::BLACK
            };
            let to8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
            *px = image::Rgb([to8(c.r), to8(c.g), to8(c.b)]);
        }
        img.save(path.as_ref())
            .map_err(|e| LucentError::validation(format!("png write failed: {e}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/film/store.rs"]
mod tests;
