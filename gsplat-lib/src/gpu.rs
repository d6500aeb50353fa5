//! Backend seam for the renderer.
//!
//! Everything the splat pipeline needs from a graphics API fits behind
//! [`GraphicsDevice`]: resource creation, asynchronous dynamic-buffer
//! uploads and draw submission. Handles are opaque small integers so a
//! backend can map them straight onto its own id scheme.

use crate::error::SplatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DynamicBufferHandle(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformHandle(pub u16);

/// Render target slot draws are submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u16);

/// Ticket for one dynamic-buffer upload; reported back once the transfer
/// has landed on the device timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadId(pub u64);

/// Vertex stream slot an attribute binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attrib {
    Position,
    TexCoord(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttribKind {
    F32,
    U8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub attrib: Attrib,
    pub count: u8,
    pub kind: AttribKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexLayout {
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Bytes covered by one vertex of this layout.
    pub fn stride(&self) -> usize {
        self.attributes
            .iter()
            .map(|a| {
                let width = match a.kind {
                    AttribKind::F32 => 4,
                    AttribKind::U8 => 1,
                };
                a.count as usize * width
            })
            .sum()
    }
}

/// Shader programs compile asynchronously on some backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    Pending,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Source color already carries its alpha, `ONE + INV_SRC_ALPHA`.
    #[default]
    PremultipliedAlpha,
    /// Straight alpha, `SRC_ALPHA + INV_SRC_ALPHA`.
    Alpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    TriangleStrip,
    TriangleList,
}

/// Fixed-function state for one submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderState {
    pub blend: BlendMode,
    pub topology: Topology,
    pub depth_test: bool,
    pub depth_write: bool,
    pub write_rgb: bool,
    pub write_alpha: bool,
}

impl RenderState {
    /// Splat pass state: blended strips that test depth against opaque
    /// geometry but never write it.
    pub fn splat(blend: BlendMode) -> RenderState {
        RenderState {
            blend,
            topology: Topology::TriangleStrip,
            depth_test: true,
            depth_write: false,
            write_rgb: true,
            write_alpha: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Vec4,
    Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
    Rgba32Uint,
}

/// The device contract the splat renderer draws through.
///
/// `update_dynamic_vertex_buffer` is asynchronous: it returns an
/// [`UploadId`] immediately and the backend reports completed ids through
/// `drain_completed_uploads`, in completion order. Everything else takes
/// effect on the backend's own schedule but in submission order.
pub trait GraphicsDevice {
    fn create_vertex_buffer(
        &mut self,
        data: &[u8],
        layout: &VertexLayout,
    ) -> Result<BufferHandle, SplatError>;

    fn create_dynamic_vertex_buffer(
        &mut self,
        data: &[u8],
        layout: &VertexLayout,
    ) -> Result<DynamicBufferHandle, SplatError>;

    fn create_texture_2d(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
        data: &[u8],
    ) -> Result<TextureHandle, SplatError>;

    fn create_program(&mut self, vs_name: &str, fs_name: &str)
        -> Result<ProgramHandle, SplatError>;

    fn create_uniform(&mut self, name: &str, kind: UniformKind)
        -> Result<UniformHandle, SplatError>;

    fn program_status(&self, program: ProgramHandle) -> ResourceStatus;

    fn update_dynamic_vertex_buffer(
        &mut self,
        buffer: DynamicBufferHandle,
        data: &[u8],
    ) -> UploadId;

    /// Appends every upload finished since the last drain to `out`.
    fn drain_completed_uploads(&mut self, out: &mut Vec<UploadId>);

    fn set_view_transform(&mut self, view: ViewId, view_mtx: &[f32; 16], proj_mtx: &[f32; 16]);

    fn set_transform(&mut self, world: &[f32; 16]);

    fn set_uniform(&mut self, uniform: UniformHandle, value: &[f32; 4]);

    fn set_texture(&mut self, stage: u8, texture: TextureHandle);

    fn set_vertex_buffer(&mut self, buffer: BufferHandle);

    fn set_instance_buffer(&mut self, buffer: DynamicBufferHandle, instance_count: u32);

    fn submit(&mut self, view: ViewId, program: ProgramHandle, state: RenderState);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_stride() {
        let layout = VertexLayout {
            attributes: vec![
                VertexAttribute {
                    attrib: Attrib::Position,
                    count: 3,
                    kind: AttribKind::F32,
                },
                VertexAttribute {
                    attrib: Attrib::TexCoord(0),
                    count: 4,
                    kind: AttribKind::U8,
                },
            ],
        };
        assert_eq!(layout.stride(), 16);
        assert_eq!(VertexLayout::default().stride(), 0);
    }

    #[test]
    fn test_splat_render_state() {
        let state = RenderState::splat(BlendMode::default());
        assert_eq!(state.blend, BlendMode::PremultipliedAlpha);
        assert_eq!(state.topology, Topology::TriangleStrip);
        assert!(state.depth_test);
        assert!(!state.depth_write);
        assert!(state.write_rgb && state.write_alpha);
    }
}
