pub mod common;
pub mod decode;
pub mod error;
pub mod gpu;
pub mod header;
pub mod pack;
pub mod render;
pub mod scene;
pub mod sort;
pub mod structures;
pub mod view;

use decode::decode_splats;
use log::debug;
use pack::build_covariance_texture;
use pack::build_instances;
use std::fs;
use std::path::Path;

pub use error::SplatError;
pub use header::parse_header;
pub use header::PlyHeader;
pub use render::GaussianRenderer;
pub use render::GaussianRendererConfig;
pub use render::RenderPipeline;
pub use render::Renderer;
pub use sort::DepthSorter;
pub use sort::SortOrder;
pub use structures::CovarianceTexture;
pub use structures::SplatAsset;
pub use structures::SplatCloud;
pub use structures::SplatInstance;

/// Knobs for [`import_ply`].
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Emit big opaque splats first so truncated streams stay watchable.
    pub presort_by_importance: bool,
}

impl Default for ImportOptions {
    fn default() -> ImportOptions {
        ImportOptions {
            presort_by_importance: true,
        }
    }
}

/// Parses, decodes and packs a binary PLY splat file into everything the
/// renderer needs: the decoded cloud, the covariance texture and the
/// instance records.
pub fn import_ply(raw_data: &[u8], options: &ImportOptions) -> Result<SplatAsset, SplatError> {
    let header = parse_header(raw_data)?;
    let cloud = decode_splats(raw_data, &header, options.presort_by_importance)?;
    if cloud.splat_count == 0 {
        return Err(SplatError::EmptyCloud);
    }

    let texture = build_covariance_texture(&cloud)?;
    let instances = build_instances(&cloud);
    debug!(
        "imported {} splats, {} rows skipped, {}x{} texture",
        cloud.splat_count, cloud.skipped_rows, texture.width, texture.height
    );
    Ok(SplatAsset {
        cloud,
        texture,
        instances,
    })
}

/// Reads a splat .ply from disk and runs [`import_ply`] on it.
pub fn import_ply_file<P: AsRef<Path>>(
    path: P,
    options: &ImportOptions,
) -> Result<SplatAsset, SplatError> {
    let raw_data = fs::read(path).map_err(SplatError::IoError)?;
    import_ply(&raw_data, options)
}
