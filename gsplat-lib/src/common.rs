use half::f16;

/// Zeroth spherical-harmonics (DC) band coefficient.
pub const SH_C0: f32 = 0.28209479177387814;

#[inline]
pub(crate) fn clamp_u8(x: f32) -> u8 {
    x.round().clamp(0.0, 255.0) as u8
}

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Encodes one normalized quaternion component into the u8 wire form.
#[inline]
pub(crate) fn quantize_rot(x: f32, qlen: f32) -> u8 {
    clamp_u8(x / qlen * 128.0 + 128.0)
}

#[inline]
pub(crate) fn unquantize_rot(x: u8) -> f32 {
    (x as f32 - 128.0) / 128.0
}

/// Packs two f32 values into one u32 as IEEE binary16 halves, low word first.
/// Overflow saturates to infinity; magnitudes below the half subnormal range
/// round to zero.
#[inline]
pub fn pack_half_2x16(a: f32, b: f32) -> u32 {
    let lo = f16::from_f32(a).to_bits() as u32;
    let hi = f16::from_f32(b).to_bits() as u32;
    lo | (hi << 16)
}

#[inline]
pub fn unpack_half_2x16(bits: u32) -> (f32, f32) {
    let lo = f16::from_bits((bits & 0xFFFF) as u16).to_f32();
    let hi = f16::from_bits((bits >> 16) as u16).to_f32();
    (lo, hi)
}

/// 3D covariance of a splat from its decoded scale and quantized rotation
/// (w, x, y, z), as the upper triangle (s00, s01, s02, s11, s12, s22).
///
/// The quaternion was unit length before quantization and is used as stored;
/// rows of `m` are the columns of its rotation matrix, each scaled by the
/// matching extent, so the result is R * diag(scale^2) * R^T.
pub(crate) fn covariance(scale: [f32; 3], rot: [u8; 4]) -> [f32; 6] {
    let w = unquantize_rot(rot[0]);
    let x = unquantize_rot(rot[1]);
    let y = unquantize_rot(rot[2]);
    let z = unquantize_rot(rot[3]);

    let m = [
        scale[0] * (1.0 - 2.0 * (y * y + z * z)),
        scale[0] * (2.0 * (x * y + w * z)),
        scale[0] * (2.0 * (x * z - w * y)),
        scale[1] * (2.0 * (x * y - w * z)),
        scale[1] * (1.0 - 2.0 * (x * x + z * z)),
        scale[1] * (2.0 * (y * z + w * x)),
        scale[2] * (2.0 * (x * z + w * y)),
        scale[2] * (2.0 * (y * z - w * x)),
        scale[2] * (1.0 - 2.0 * (x * x + y * y)),
    ];

    [
        m[0] * m[0] + m[3] * m[3] + m[6] * m[6],
        m[0] * m[1] + m[3] * m[4] + m[6] * m[7],
        m[0] * m[2] + m[3] * m[5] + m[6] * m[8],
        m[1] * m[1] + m[4] * m[4] + m[7] * m[7],
        m[1] * m[2] + m[4] * m[5] + m[7] * m[8],
        m[2] * m[2] + m[5] * m[5] + m[8] * m[8],
    ]
}
