use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Fixed texel width of the covariance texture.
pub const TEXTURE_WIDTH: u32 = 2048;
/// u32 words per RGBA32UI texel.
pub const WORDS_PER_TEXEL: usize = 4;
/// Texels occupied by one splat.
pub const TEXELS_PER_SPLAT: usize = 2;

/// Decoded splat attributes as flat column vectors.
#[derive(Debug, Default, Clone)]
pub struct SplatCloud {
    pub splat_count: usize,
    /// xyz per splat.
    pub positions: Vec<f32>,
    /// Exponentiated extents, xyz per splat.
    pub scales: Vec<f32>,
    /// Quantized unit quaternion (w, x, y, z) per splat; decode rule
    /// (v - 128) / 128.
    pub rotations: Vec<u8>,
    /// RGBA per splat, alpha already sigmoid-mapped.
    pub colors: Vec<u8>,
    /// Rows dropped during decode because required fields were missing.
    pub skipped_rows: usize,
}

impl SplatCloud {
    #[inline]
    pub fn position(&self, i: usize) -> [f32; 3] {
        [
            self.positions[i * 3],
            self.positions[i * 3 + 1],
            self.positions[i * 3 + 2],
        ]
    }

    #[inline]
    pub fn scale(&self, i: usize) -> [f32; 3] {
        [
            self.scales[i * 3],
            self.scales[i * 3 + 1],
            self.scales[i * 3 + 2],
        ]
    }

    #[inline]
    pub fn rotation(&self, i: usize) -> [u8; 4] {
        [
            self.rotations[i * 4],
            self.rotations[i * 4 + 1],
            self.rotations[i * 4 + 2],
            self.rotations[i * 4 + 3],
        ]
    }

    #[inline]
    pub fn color(&self, i: usize) -> [u8; 4] {
        [
            self.colors[i * 4],
            self.colors[i * 4 + 1],
            self.colors[i * 4 + 2],
            self.colors[i * 4 + 3],
        ]
    }
}

/// Per-instance GPU record: four vec4 attributes per instanced quad.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct SplatInstance {
    /// Normalized RGBA.
    pub color: [f32; 4],
    /// World-space center, w = 1.
    pub center: [f32; 4],
    /// Scaled covariance row (s00, s01, s02), w unused.
    pub cov_a: [f32; 4],
    /// Scaled covariance row (s11, s12, s22), w unused.
    pub cov_b: [f32; 4],
}

/// Packed position + covariance + color texture, RGBA32UI, 2048 texels wide,
/// two texels per splat.
#[derive(Debug, Clone)]
pub struct CovarianceTexture {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<u32>,
}

impl CovarianceTexture {
    /// Upload view of the texel words.
    pub fn as_bytes(&self) -> &[u8] {
        self.texels.as_bytes()
    }
}

/// Product of a full import: decoded attributes plus both GPU
/// representations.
#[derive(Debug, Clone)]
pub struct SplatAsset {
    pub cloud: SplatCloud,
    pub texture: CovarianceTexture,
    pub instances: Vec<SplatInstance>,
}
