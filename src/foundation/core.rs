use crate::foundation::error::{LucentError, LucentResult};

/// Linear RGB radiance triple.
///
/// All pipeline math stays in linear space; gamma is applied by the
/// gamma-correction plugin at the very end of the image pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Spectrum {
    /// Red component.
    pub r: f32,
    /// Green component.
    pub g: f32,
    /// Blue component.
    pub b: f32,
}

impl Spectrum {
    /// All-zero spectrum.
    pub const BLACK: Spectrum = Spectrum {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Build a spectrum from components.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Grey spectrum with all components equal to `v`.
    pub fn splat(v: f32) -> Self {
        Self { r: v, g: v, b: v }
    }

    /// CIE Y luminance of the linear RGB triple.
    pub fn y(self) -> f32 {
        0.212_671 * self.r + 0.715_160 * self.g + 0.072_169 * self.b
    }

    /// True when every component is exactly zero.
    pub fn is_black(self) -> bool {
        self.r == 0.0 && self.g == 0.0 && self.b == 0.0
    }

    /// True when every component is a finite number.
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }

    /// Component-wise scale.
    #[must_use]
    pub fn scaled(self, s: f32) -> Self {
        Self {
            r: self.r * s,
            g: self.g * s,
            b: self.b * s,
        }
    }

    /// Component-wise addition.
    #[must_use]
    pub fn added(self, other: Spectrum) -> Self {
        Self {
            r: self.r + other.r,
            g: self.g + other.g,
            b: self.b + other.b,
        }
    }

    /// Scale the triple so its luminance does not exceed `max_y`.
    ///
    /// Non-positive and non-finite luminance is left untouched; those
    /// pixels are handled by the mask/skip rules downstream.
    #[must_use]
    pub fn clamped_to_luminance(self, max_y: f32) -> Self {
        let y = self.y();
        if y.is_finite() && y > max_y && max_y > 0.0 {
            self.scaled(max_y / y)
        } else {
            self
        }
    }
}

/// Image resolution, fixed for the lifetime of a film.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Resolution {
    /// Width in pixels. Always > 0.
    pub width: u32,
    /// Height in pixels. Always > 0.
    pub height: u32,
}

impl Resolution {
    /// Build a resolution, rejecting degenerate dimensions.
    pub fn new(width: u32, height: u32) -> LucentResult<Self> {
        if width == 0 || height == 0 {
            return Err(LucentError::validation("resolution must be non-zero"));
        }
        Ok(Self { width, height })
    }

    /// Total number of pixels.
    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}
