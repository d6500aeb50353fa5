use crate::common::{covariance, pack_half_2x16};
use crate::error::SplatError;
use crate::structures::{
    CovarianceTexture, SplatCloud, SplatInstance, TEXELS_PER_SPLAT, TEXTURE_WIDTH, WORDS_PER_TEXEL,
};
use log::debug;

/// Covariance entries are premultiplied so the shader can halve twice
/// without losing half-float precision near zero.
const COV_SCALE: f32 = 4.0;

/// Packs the cloud into a fixed-width RGBA32UI texture, two texels per
/// splat: position bits, a spare word, three half2-packed covariance pairs
/// and one RGBA byte word.
pub fn build_covariance_texture(cloud: &SplatCloud) -> Result<CovarianceTexture, SplatError> {
    if cloud.splat_count == 0 {
        return Err(SplatError::EmptyCloud);
    }

    let width = TEXTURE_WIDTH as usize;
    let height = (cloud.splat_count * TEXELS_PER_SPLAT).div_ceil(width);
    let mut texels = vec![0u32; width * height * WORDS_PER_TEXEL];

    for i in 0..cloud.splat_count {
        let [x, y, z] = cloud.position(i);
        let sigma = covariance(cloud.scale(i), cloud.rotation(i));
        let [r, g, b, a] = cloud.color(i);

        let base = i * TEXELS_PER_SPLAT * WORDS_PER_TEXEL;
        texels[base] = x.to_bits();
        texels[base + 1] = y.to_bits();
        texels[base + 2] = z.to_bits();
        texels[base + 4] = pack_half_2x16(COV_SCALE * sigma[0], COV_SCALE * sigma[1]);
        texels[base + 5] = pack_half_2x16(COV_SCALE * sigma[2], COV_SCALE * sigma[3]);
        texels[base + 6] = pack_half_2x16(COV_SCALE * sigma[4], COV_SCALE * sigma[5]);
        texels[base + 7] = u32::from_le_bytes([r, g, b, a]);
    }

    debug!(
        "packed {} splats into a {}x{} texture",
        cloud.splat_count,
        TEXTURE_WIDTH,
        height
    );
    Ok(CovarianceTexture {
        width: TEXTURE_WIDTH,
        height: height as u32,
        texels,
    })
}

/// Expands the cloud into per-splat instance records for instanced drawing.
pub fn build_instances(cloud: &SplatCloud) -> Vec<SplatInstance> {
    let mut instances = Vec::with_capacity(cloud.splat_count);
    for i in 0..cloud.splat_count {
        let [x, y, z] = cloud.position(i);
        let sigma = covariance(cloud.scale(i), cloud.rotation(i));
        let [r, g, b, a] = cloud.color(i);

        instances.push(SplatInstance {
            color: [
                r as f32 / 255.0,
                g as f32 / 255.0,
                b as f32 / 255.0,
                a as f32 / 255.0,
            ],
            center: [x, y, z, 1.0],
            cov_a: [
                COV_SCALE * sigma[0],
                COV_SCALE * sigma[1],
                COV_SCALE * sigma[2],
                0.0,
            ],
            cov_b: [
                COV_SCALE * sigma[3],
                COV_SCALE * sigma[4],
                COV_SCALE * sigma[5],
                0.0,
            ],
        });
    }
    instances
}
