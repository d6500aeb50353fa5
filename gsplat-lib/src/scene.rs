use crate::error::SplatError;
use crate::gpu::{
    Attrib, AttribKind, BufferHandle, DynamicBufferHandle, GraphicsDevice, TextureFormat,
    TextureHandle, VertexAttribute, VertexLayout,
};
use crate::structures::{SplatAsset, SplatInstance};
use zerocopy::IntoBytes;

/// Scene object id, allocated by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity(pub u32);

#[rustfmt::skip]
pub const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

/// Camera state sampled once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub view: [f32; 16],
    pub projection: [f32; 16],
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub width: f32,
    pub height: f32,
}

impl Camera {
    /// View-space forward axis, read straight out of the view matrix.
    #[inline]
    pub fn forward_axis(&self) -> [f32; 3] {
        [self.view[2], self.view[6], self.view[10]]
    }

    /// Focal lengths in pixels, `[fx, fy]`.
    pub fn focal(&self) -> [f32; 2] {
        let half_tan = (self.fov.to_radians() / 2.0).tan();
        [
            self.width / 2.0 / half_tan,
            self.height * self.aspect / 2.0 / half_tan,
        ]
    }
}

/// One quad in clip-ish space, stretched per splat by the vertex shader.
/// Strip order: right-bottom, left-bottom, right-top, left-top.
#[rustfmt::skip]
pub(crate) const QUAD_VERTICES: [f32; 8] = [
    2.0, -2.0,
    -2.0, -2.0,
    2.0, 2.0,
    -2.0, 2.0,
];

pub(crate) fn quad_layout() -> VertexLayout {
    VertexLayout {
        attributes: vec![VertexAttribute {
            attrib: Attrib::Position,
            count: 2,
            kind: AttribKind::F32,
        }],
    }
}

/// Instance stream layout: color, center and the two covariance rows ride
/// in on high texcoord slots, one vec4 each.
pub(crate) fn instance_layout() -> VertexLayout {
    VertexLayout {
        attributes: [7u8, 6, 5, 4]
            .iter()
            .map(|&slot| VertexAttribute {
                attrib: Attrib::TexCoord(slot),
                count: 4,
                kind: AttribKind::F32,
            })
            .collect(),
    }
}

/// GPU residency of one splat cloud plus the CPU copies the depth sorter
/// rewrites. Two instance buffers alternate so a draw never reads the
/// buffer an upload is still filling.
#[derive(Debug)]
pub struct SplatRenderComponent {
    pub splat_count: u32,
    pub texture: TextureHandle,
    pub quad_vb: BufferHandle,
    pub instance_buffers: [DynamicBufferHandle; 2],
    /// Import-ordered records, the sorter's gather source.
    pub instances: Vec<SplatInstance>,
    /// Staging for sorted records between gather and upload.
    pub scratch: Vec<SplatInstance>,
}

impl SplatRenderComponent {
    /// Uploads an imported asset and returns the component owning its
    /// handles. Both instance buffers start with the import order.
    pub fn build(
        device: &mut dyn GraphicsDevice,
        asset: &SplatAsset,
    ) -> Result<SplatRenderComponent, SplatError> {
        let texture = device.create_texture_2d(
            asset.texture.width,
            asset.texture.height,
            TextureFormat::Rgba32Uint,
            asset.texture.as_bytes(),
        )?;
        let quad_vb = device.create_vertex_buffer(QUAD_VERTICES.as_bytes(), &quad_layout())?;

        let layout = instance_layout();
        let bytes = asset.instances.as_bytes();
        let instance_buffers = [
            device.create_dynamic_vertex_buffer(bytes, &layout)?,
            device.create_dynamic_vertex_buffer(bytes, &layout)?,
        ];

        Ok(SplatRenderComponent {
            splat_count: asset.instances.len() as u32,
            texture,
            quad_vb,
            instance_buffers,
            instances: asset.instances.clone(),
            scratch: asset.instances.clone(),
        })
    }
}

/// What the renderer asks of the host scene each frame.
pub trait SplatScene {
    /// Entities carrying a splat component, in draw order.
    fn splat_entities(&self) -> Vec<Entity>;

    fn splat_component(&self, entity: Entity) -> Option<&SplatRenderComponent>;

    fn splat_component_mut(&mut self, entity: Entity) -> Option<&mut SplatRenderComponent>;

    fn world_transform(&self, _entity: Entity) -> [f32; 16] {
        IDENTITY
    }

    fn camera(&self) -> Camera;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(view: [f32; 16]) -> Camera {
        Camera {
            view,
            projection: IDENTITY,
            fov: 60.0,
            aspect: 1.0,
            width: 1024.0,
            height: 768.0,
        }
    }

    #[test]
    fn test_forward_axis_reads_view_columns() {
        let mut view = IDENTITY;
        view[2] = 0.6;
        view[6] = 0.0;
        view[10] = 0.8;
        assert_eq!(camera(view).forward_axis(), [0.6, 0.0, 0.8]);
    }

    #[test]
    fn test_focal_lengths() {
        let [fx, fy] = camera(IDENTITY).focal();
        let half_tan = 30.0f32.to_radians().tan();
        assert!((fx - 512.0 / half_tan).abs() < 1e-3);
        assert!((fy - 384.0 / half_tan).abs() < 1e-3);
    }

    #[test]
    fn test_layout_strides() {
        assert_eq!(quad_layout().stride(), 8);
        assert_eq!(instance_layout().stride(), size_of::<SplatInstance>());
    }

    #[test]
    fn test_instance_layout_slots_descend() {
        let slots: Vec<u8> = instance_layout()
            .attributes
            .iter()
            .map(|a| match a.attrib {
                Attrib::TexCoord(s) => s,
                Attrib::Position => panic!("unexpected position attribute"),
            })
            .collect();
        assert_eq!(slots, [7, 6, 5, 4]);
    }
}
