use crate::common::{clamp_u8, quantize_rot, sigmoid, SH_C0};
use crate::error::SplatError;
use crate::header::PlyHeader;
use crate::structures::SplatCloud;
use crate::view::BinaryView;
use log::{debug, warn};

/// Extent of splats whose scale fields are absent (already linear).
const DEFAULT_SCALE: [f32; 3] = [0.01, 0.01, 0.01];
/// Quantized rotation of splats whose rotation fields are absent.
const DEFAULT_ROT: [u8; 4] = [255, 0, 0, 0];

/// Row offsets resolved once from the schema, before the row loop.
#[derive(Debug, Clone, Copy, Default)]
struct FieldPlan {
    position: Option<[usize; 3]>,
    scale: Option<[usize; 3]>,
    rot: Option<[usize; 4]>,
    sh0: Option<[usize; 3]>,
    rgb: Option<[usize; 3]>,
    opacity: Option<usize>,
}

fn triple(header: &PlyHeader, a: &str, b: &str, c: &str) -> Option<[usize; 3]> {
    Some([header.offset(a)?, header.offset(b)?, header.offset(c)?])
}

impl FieldPlan {
    fn resolve(header: &PlyHeader) -> FieldPlan {
        let scale = triple(header, "scale_0", "scale_1", "scale_2");
        let rot = match (
            header.offset("rot_0"),
            header.offset("rot_1"),
            header.offset("rot_2"),
            header.offset("rot_3"),
        ) {
            (Some(r0), Some(r1), Some(r2), Some(r3)) => Some([r0, r1, r2, r3]),
            _ => None,
        };

        // Scale and rotation decode as one group; a partial group falls back
        // to the defaults rather than mixing file data with them.
        let (scale, rot) = match (scale, rot) {
            (Some(s), Some(r)) => (Some(s), Some(r)),
            (None, None) => (None, None),
            _ => {
                warn!("incomplete scale_0..2/rot_0..3 group; using default shape");
                (None, None)
            }
        };

        FieldPlan {
            position: triple(header, "x", "y", "z"),
            scale,
            rot,
            sh0: triple(header, "f_dc_0", "f_dc_1", "f_dc_2"),
            rgb: triple(header, "red", "green", "blue"),
            opacity: header.offset("opacity"),
        }
    }
}

/// Decodes every vertex row into splat attributes.
///
/// Rows whose required fields cannot be resolved are skipped and counted,
/// never read out of bounds; a truncated binary section is fatal. With
/// `presort` set and scale fields present, rows are emitted largest and most
/// opaque first.
pub fn decode_splats(
    raw_data: &[u8],
    header: &PlyHeader,
    presort: bool,
) -> Result<SplatCloud, SplatError> {
    let n = header.vertex_count;
    let view = BinaryView::new(raw_data, header.header_len);
    let plan = FieldPlan::resolve(header);
    let order = row_order(&view, header, &plan, presort)?;

    let mut cloud = SplatCloud {
        splat_count: 0,
        positions: Vec::with_capacity(n * 3),
        scales: Vec::with_capacity(n * 3),
        rotations: Vec::with_capacity(n * 4),
        colors: Vec::with_capacity(n * 4),
        skipped_rows: 0,
    };

    for &row in &order {
        let base = row as usize * header.row_stride;
        match decode_row(&view, base, &plan, &mut cloud) {
            Ok(()) => cloud.splat_count += 1,
            Err(SplatError::MalformedRow(_)) => cloud.skipped_rows += 1,
            Err(e) => return Err(e),
        }
    }

    if cloud.skipped_rows > 0 {
        warn!(
            "skipped {} of {} rows with unresolvable required fields",
            cloud.skipped_rows, n
        );
    }
    debug!(
        "decoded {} splats, {} bytes per row",
        cloud.splat_count, header.row_stride
    );
    Ok(cloud)
}

/// Emission order of the rows: file order, or descending importance when the
/// scale fields exist and presorting is requested.
fn row_order(
    view: &BinaryView,
    header: &PlyHeader,
    plan: &FieldPlan,
    presort: bool,
) -> Result<Vec<u32>, SplatError> {
    let n = header.vertex_count;
    let scale = match plan.scale {
        Some(s) if presort => s,
        _ => return Ok((0..n as u32).collect()),
    };

    // Importance is the exponentiated-scale volume damped by opacity
    let mut sizes = Vec::with_capacity(n);
    for row in 0..n {
        let base = row * header.row_stride;
        let s0: f32 = view.get(base + scale[0])?;
        let s1: f32 = view.get(base + scale[1])?;
        let s2: f32 = view.get(base + scale[2])?;
        let mut size = s0.exp() * s1.exp() * s2.exp();
        if let Some(op) = plan.opacity {
            let opacity: f32 = view.get(base + op)?;
            size *= sigmoid(opacity);
        }
        sizes.push(size);
    }

    let mut order: Vec<u32> = (0..n as u32).collect();
    order.sort_unstable_by(|&a, &b| sizes[b as usize].total_cmp(&sizes[a as usize]));
    Ok(order)
}

fn decode_row(
    view: &BinaryView,
    base: usize,
    plan: &FieldPlan,
    cloud: &mut SplatCloud,
) -> Result<(), SplatError> {
    let pos = match plan.position {
        Some(p) => p,
        None => {
            return Err(SplatError::MalformedRow(
                "required field x/y/z missing from schema".to_string(),
            ))
        }
    };
    let x: f32 = view.get(base + pos[0])?;
    let y: f32 = view.get(base + pos[1])?;
    let z: f32 = view.get(base + pos[2])?;

    let (scale, rot) = match (plan.scale, plan.rot) {
        (Some(so), Some(ro)) => {
            let s0: f32 = view.get(base + so[0])?;
            let s1: f32 = view.get(base + so[1])?;
            let s2: f32 = view.get(base + so[2])?;

            let r0: f32 = view.get(base + ro[0])?;
            let r1: f32 = view.get(base + ro[1])?;
            let r2: f32 = view.get(base + ro[2])?;
            let r3: f32 = view.get(base + ro[3])?;
            let qlen = (r0 * r0 + r1 * r1 + r2 * r2 + r3 * r3).sqrt();
            let rot = if qlen == 0.0 {
                DEFAULT_ROT
            } else {
                [
                    quantize_rot(r0, qlen),
                    quantize_rot(r1, qlen),
                    quantize_rot(r2, qlen),
                    quantize_rot(r3, qlen),
                ]
            };
            ([s0.exp(), s1.exp(), s2.exp()], rot)
        }
        _ => (DEFAULT_SCALE, DEFAULT_ROT),
    };

    // SH0 wins over raw byte colors when a file carries both
    let rgb = if let Some(dc) = plan.sh0 {
        let c0: f32 = view.get(base + dc[0])?;
        let c1: f32 = view.get(base + dc[1])?;
        let c2: f32 = view.get(base + dc[2])?;
        [
            clamp_u8((0.5 + SH_C0 * c0) * 255.0),
            clamp_u8((0.5 + SH_C0 * c1) * 255.0),
            clamp_u8((0.5 + SH_C0 * c2) * 255.0),
        ]
    } else if let Some(raw) = plan.rgb {
        [
            view.get::<u8>(base + raw[0])?,
            view.get::<u8>(base + raw[1])?,
            view.get::<u8>(base + raw[2])?,
        ]
    } else {
        [255, 255, 255]
    };

    let alpha = match plan.opacity {
        Some(op) => {
            let opacity: f32 = view.get(base + op)?;
            clamp_u8(sigmoid(opacity) * 255.0)
        }
        None => 255,
    };

    cloud.positions.extend_from_slice(&[x, y, z]);
    cloud.scales.extend_from_slice(&scale);
    cloud.rotations.extend_from_slice(&rot);
    cloud.colors.extend_from_slice(&[rgb[0], rgb[1], rgb[2], alpha]);
    Ok(())
}
