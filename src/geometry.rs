//! Geometry reference buffers.
//!
//! Vertex positions and triangle indices are not routed through descriptor
//! tables. The per-dispatch record carries their raw buffer device
//! addresses, and hit shaders dereference them directly with zero
//! indirection. The addresses carry no bounds metadata; whoever builds the
//! record guarantees their validity, and whoever indexes into them supplies
//! indices reachable from the geometry actually hit.
//!
//! Layout contract with the shader side:
//! - vertex buffer: tightly packed 3-component 32-bit float positions,
//!   12 bytes per element, base address aligned to 16 bytes (the declared
//!   buffer reference alignment);
//! - index buffer: tightly packed 32-bit unsigned indices, base address
//!   aligned to 4 bytes.

use ash::{prelude::VkResult, vk};

use crate::{
    Allocator,
    buffer::{Buffer, BufferLike},
};

/// Bytes per vertex position element.
pub const VERTEX_STRIDE: usize = 12;
/// Bytes per triangle index element.
pub const INDEX_STRIDE: usize = 4;
/// Buffer reference alignment the shader declares for the vertex buffer.
pub const VERTEX_BUFFER_ALIGNMENT: u64 = 16;
/// Buffer reference alignment the shader declares for the index buffer.
pub const INDEX_BUFFER_ALIGNMENT: u64 = 4;

/// The pair of raw device addresses carried in the per-dispatch record.
///
/// These are direct memory references, not table indices. Construction
/// checks the alignment contract up front; nothing is checked at
/// dereference time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeometryAddresses {
    pub vertex: vk::DeviceAddress,
    pub index: vk::DeviceAddress,
}

impl GeometryAddresses {
    pub fn new(vertex: vk::DeviceAddress, index: vk::DeviceAddress) -> Self {
        assert_eq!(
            vertex % VERTEX_BUFFER_ALIGNMENT,
            0,
            "vertex buffer address must be {VERTEX_BUFFER_ALIGNMENT} byte aligned"
        );
        assert_eq!(
            index % INDEX_BUFFER_ALIGNMENT,
            0,
            "index buffer address must be {INDEX_BUFFER_ALIGNMENT} byte aligned"
        );
        Self { vertex, index }
    }
}

/// Read-only typed view over the mapped memory of a vertex buffer.
///
/// Mirrors what a hit shader sees through the vertex buffer reference: a
/// contiguous array of positions with no length attached.
#[derive(Clone, Copy)]
pub struct VertexView<'a> {
    data: &'a [u8],
}

impl<'a> VertexView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn element_count(&self) -> u32 {
        (self.data.len() / VERTEX_STRIDE) as u32
    }

    /// Returns the i-th position.
    ///
    /// # Safety
    ///
    /// `i` must index a vertex inside the buffer this view was created
    /// over. The read is unchecked; out-of-range indices are a contract
    /// violation, asserted only in debug builds.
    pub unsafe fn get(&self, i: u32) -> [f32; 3] {
        debug_assert!(i < self.element_count(), "vertex index {i} out of range");
        unsafe {
            self.data
                .as_ptr()
                .add(i as usize * VERTEX_STRIDE)
                .cast::<[f32; 3]>()
                .read_unaligned()
        }
    }
}

/// Read-only typed view over the mapped memory of an index buffer.
#[derive(Clone, Copy)]
pub struct IndexView<'a> {
    data: &'a [u8],
}

impl<'a> IndexView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn element_count(&self) -> u32 {
        (self.data.len() / INDEX_STRIDE) as u32
    }

    /// Returns the i-th index.
    ///
    /// # Safety
    ///
    /// Same contract as [`VertexView::get`].
    pub unsafe fn get(&self, i: u32) -> u32 {
        debug_assert!(i < self.element_count(), "index {i} out of range");
        unsafe {
            self.data
                .as_ptr()
                .add(i as usize * INDEX_STRIDE)
                .cast::<u32>()
                .read_unaligned()
        }
    }
}

/// A vertex/index buffer pair owned by one piece of scene geometry.
///
/// The buffers are host-visible and persistently mapped: the host writes
/// them once, the GPU reads them by device address for the lifetime of the
/// geometry.
pub struct GeometryBuffers {
    vertex: Buffer,
    index: Buffer,
}

impl GeometryBuffers {
    /// Uploads positions and indices into freshly allocated, tightly packed
    /// device-addressable buffers.
    pub fn upload(
        allocator: Allocator,
        positions: &[[f32; 3]],
        indices: &[u32],
    ) -> VkResult<Self> {
        let usage = vk::BufferUsageFlags::STORAGE_BUFFER
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
            | vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR;

        let mut vertex = Buffer::new_host(
            allocator.clone(),
            (positions.len() * VERTEX_STRIDE) as vk::DeviceSize,
            VERTEX_BUFFER_ALIGNMENT,
            usage,
        )?;
        vertex
            .as_slice_mut()
            .unwrap()
            .copy_from_slice(bytemuck::cast_slice(positions));
        vertex.flush(..)?;

        let mut index = Buffer::new_host(
            allocator,
            (indices.len() * INDEX_STRIDE) as vk::DeviceSize,
            INDEX_BUFFER_ALIGNMENT,
            usage,
        )?;
        index
            .as_slice_mut()
            .unwrap()
            .copy_from_slice(bytemuck::cast_slice(indices));
        index.flush(..)?;

        Ok(Self { vertex, index })
    }

    /// The address pair to place in the per-dispatch record.
    pub fn addresses(&self) -> GeometryAddresses {
        GeometryAddresses::new(self.vertex.device_address(), self.index.device_address())
    }

    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex
    }

    pub fn index_buffer(&self) -> &Buffer {
        &self.index
    }

    pub fn vertex_view(&self) -> VertexView<'_> {
        VertexView::new(self.vertex.as_slice().unwrap())
    }

    pub fn index_view(&self) -> IndexView<'_> {
        IndexView::new(self.index.as_slice().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_view_reads_packed_positions() {
        let positions: [[f32; 3]; 3] = [[0.0, 1.0, 2.0], [3.0, 4.0, 5.0], [6.0, 7.0, 8.0]];
        let bytes: &[u8] = bytemuck::cast_slice(&positions);
        let view = VertexView::new(bytes);
        assert_eq!(view.element_count(), 3);
        unsafe {
            assert_eq!(view.get(0), [0.0, 1.0, 2.0]);
            assert_eq!(view.get(2), [6.0, 7.0, 8.0]);
        }
    }

    #[test]
    fn test_index_view_reads_packed_indices() {
        let indices: [u32; 6] = [0, 1, 2, 2, 1, 3];
        let bytes: &[u8] = bytemuck::cast_slice(&indices);
        let view = IndexView::new(bytes);
        assert_eq!(view.element_count(), 6);
        unsafe {
            assert_eq!(view.get(0), 0);
            assert_eq!(view.get(5), 3);
        }
    }

    #[test]
    fn test_views_are_deterministic() {
        let positions: [[f32; 3]; 2] = [[1.5, -2.5, 3.5], [0.25, 0.5, 0.75]];
        let bytes: &[u8] = bytemuck::cast_slice(&positions);
        let view = VertexView::new(bytes);
        unsafe {
            assert_eq!(view.get(1), view.get(1));
        }
    }

    #[test]
    fn test_aligned_addresses_accepted() {
        let addresses = GeometryAddresses::new(0x1000, 0x2004);
        assert_eq!(addresses.vertex, 0x1000);
        assert_eq!(addresses.index, 0x2004);
    }

    #[test]
    #[should_panic(expected = "vertex buffer address must be 16 byte aligned")]
    fn test_misaligned_vertex_address_rejected() {
        GeometryAddresses::new(0x1004, 0x2000);
    }

    #[test]
    #[should_panic(expected = "index buffer address must be 4 byte aligned")]
    fn test_misaligned_index_address_rejected() {
        GeometryAddresses::new(0x1000, 0x2002);
    }
}
