// Mesh - device-local vertex and index buffers
//
// Vertex data is uploaded once through the staging path and is immutable
// afterwards. The index buffer is optional; a zero index count means the
// mesh draws non-indexed.

use ash::vk;
use bytemuck::{Pod, Zeroable};

use super::buffer::Buffer;
use super::device::DeviceContext;
use super::error::{GfxError, Result};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex {
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
        ]
    }
}

#[derive(Default)]
pub struct Mesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    vertex_count: u32,
    index_count: u32,
}

impl Mesh {
    pub fn from_data(ctx: &DeviceContext, vertices: &[Vertex], indices: &[u32]) -> Result<Self> {
        if vertices.is_empty() {
            return Err(GfxError::Unsupported("mesh has no vertices".into()));
        }

        let mut vertex_buffer = Buffer::init_device_local(
            ctx,
            bytemuck::cast_slice(vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let index_buffer = if indices.is_empty() {
            Buffer::default()
        } else {
            match Buffer::init_device_local(
                ctx,
                bytemuck::cast_slice(indices),
                vk::BufferUsageFlags::INDEX_BUFFER,
            ) {
                Ok(b) => b,
                Err(e) => {
                    vertex_buffer.shutdown(ctx);
                    return Err(e);
                }
            }
        };

        log::info!(
            "Mesh uploaded: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
        })
    }

    /// Procedural unit cube, used when no model file is configured.
    pub fn cube(ctx: &DeviceContext) -> Result<Self> {
        let (vertices, indices) = cube_geometry();
        Self::from_data(ctx, &vertices, &indices)
    }

    pub fn shutdown(&mut self, ctx: &DeviceContext) {
        self.index_buffer.shutdown(ctx);
        self.vertex_buffer.shutdown(ctx);
        self.vertex_count = 0;
        self.index_count = 0;
    }

    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn index_type(&self) -> vk::IndexType {
        vk::IndexType::UINT32
    }
}

/// Derive a stable pseudo color from a position, like the demo scene does
/// for models that carry no color data.
pub fn position_color(pos: [f32; 3]) -> [f32; 3] {
    [
        0.5 + 0.5 * pos[0],
        0.5 + 0.5 * pos[1],
        0.5 + 0.5 * pos[2],
    ]
}

/// Half-extent 0.5 cube around the origin, counter-clockwise winding seen
/// from outside, position-derived colors.
pub fn cube_geometry() -> (Vec<Vertex>, Vec<u32>) {
    let positions: [[f32; 3]; 8] = [
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, 0.5, -0.5],
    ];

    let vertices = positions
        .iter()
        .map(|&pos| Vertex {
            pos,
            color: position_color(pos),
        })
        .collect();

    #[rustfmt::skip]
    let indices = vec![
        0, 1, 2, 2, 3, 0, // front  (+z)
        1, 5, 6, 6, 2, 1, // right  (+x)
        5, 4, 7, 7, 6, 5, // back   (-z)
        4, 0, 3, 3, 7, 4, // left   (-x)
        3, 2, 6, 6, 7, 3, // top    (+y)
        4, 5, 1, 1, 0, 4, // bottom (-y)
    ];

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_attribute_descriptions() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.stride as usize, std::mem::size_of::<Vertex>());
        assert_eq!(binding.stride, 24);

        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset as usize, std::mem::size_of::<[f32; 3]>());
    }

    #[test]
    fn cube_has_twelve_triangles_with_valid_indices() {
        let (vertices, indices) = cube_geometry();
        assert_eq!(vertices.len(), 8);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn cube_triangles_are_not_degenerate() {
        let (_, indices) = cube_geometry();
        for tri in indices.chunks(3) {
            assert!(tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2]);
        }
    }

    #[test]
    fn position_color_is_stable_and_in_range() {
        let c = position_color([-0.5, 0.0, 0.5]);
        assert_eq!(c, [0.25, 0.5, 0.75]);
    }
}
