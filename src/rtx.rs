//! Acceleration structure handles.
//!
//! An [`AccelStruct`] owns a `VkAccelerationStructureKHR` together with its
//! backing buffer. Building the structure (geometry commands, scratch
//! memory, compaction) is the embedding application's job; this crate cares
//! about the handle so it can be placed in the bindless
//! [`AccelTable`](crate::bindless::AccelTable) and referenced from TLAS
//! instance records.
//!
//! ```ignore
//! let blas = AccelStruct::new(
//!     allocator.clone(),
//!     sizes.acceleration_structure_size,
//!     vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL,
//! )?;
//! // ... build commands recorded externally ...
//! let instance = blas.instance(Affine3A::IDENTITY, MaterialId::Ground);
//! ```

use ash::{prelude::VkResult, vk};
use glam::Affine3A;

use crate::{
    Allocator, Device, HasDevice,
    buffer::{Buffer, BufferLike},
    material::MaterialId,
    utils::{AsVkHandle, glam_to_vk_transform},
};

/// A Vulkan acceleration structure for ray tracing.
///
/// There are two types:
///
/// - **BLAS (Bottom-Level)**: Contains geometry (triangles or AABBs)
/// - **TLAS (Top-Level)**: Contains instances of BLASes with transforms
///
/// The structure owns its backing buffer and is destroyed on drop. The
/// bindless table holds no reference: the host must keep an [`AccelStruct`]
/// alive for as long as in-flight dispatches may traverse it.
pub struct AccelStruct<T: BufferLike = Buffer> {
    device: Device,
    buffer: T,
    raw: vk::AccelerationStructureKHR,
    device_address: vk::DeviceAddress,
}
impl<T: BufferLike> Drop for AccelStruct<T> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .acceleration_structure()
                .destroy_acceleration_structure(self.raw, None);
        }
    }
}
impl<T: BufferLike> HasDevice for AccelStruct<T> {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl<T: BufferLike> AsVkHandle for AccelStruct<T> {
    fn vk_handle(&self) -> vk::AccelerationStructureKHR {
        self.raw
    }
    type Handle = vk::AccelerationStructureKHR;
}
impl<T: BufferLike> AccelStruct<T> {
    /// Returns the device address for use in TLAS instance records.
    pub fn device_address(&self) -> vk::DeviceAddress {
        self.device_address
    }

    /// Returns the size of the backing buffer in bytes.
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }

    /// Creates an acceleration structure on an existing buffer.
    pub fn create_on_buffer(
        device: Device,
        buffer: T,
        ty: vk::AccelerationStructureTypeKHR,
    ) -> VkResult<Self> {
        unsafe {
            let raw = device.acceleration_structure().create_acceleration_structure(
                &vk::AccelerationStructureCreateInfoKHR {
                    ty,
                    size: buffer.size(),
                    offset: buffer.offset(),
                    buffer: buffer.vk_handle(),
                    ..Default::default()
                },
                None,
            )?;
            let device_address = device
                .acceleration_structure()
                .get_acceleration_structure_device_address(
                    &vk::AccelerationStructureDeviceAddressInfoKHR {
                        acceleration_structure: raw,
                        ..Default::default()
                    },
                );
            Ok(Self {
                device,
                buffer,
                raw,
                device_address,
            })
        }
    }

    /// Builds a TLAS instance record referencing this structure.
    ///
    /// The material identifier travels out-of-band in the instance's 24-bit
    /// custom index, where closest-hit shading reads it back to select a
    /// response. The instance mask is fully open (`0xff`).
    pub fn instance(
        &self,
        transform: Affine3A,
        material: MaterialId,
    ) -> vk::AccelerationStructureInstanceKHR {
        vk::AccelerationStructureInstanceKHR {
            transform: glam_to_vk_transform(transform),
            instance_custom_index_and_mask: vk::Packed24_8::new(material.custom_index(), 0xff),
            instance_shader_binding_table_record_offset_and_flags: vk::Packed24_8::new(0, 0),
            acceleration_structure_reference: vk::AccelerationStructureReferenceKHR {
                device_handle: self.device_address,
            },
        }
    }
}

impl AccelStruct {
    /// Creates a new acceleration structure with a freshly allocated buffer.
    ///
    /// The buffer is allocated with appropriate usage flags for acceleration
    /// structure storage and shader device address access.
    pub fn new(
        allocator: Allocator,
        size: vk::DeviceSize,
        ty: vk::AccelerationStructureTypeKHR,
    ) -> VkResult<Self> {
        let buffer = Buffer::new_private(
            allocator,
            size,
            1,
            vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        )?;
        Self::create_on_buffer(buffer.device().clone(), buffer, ty)
    }
}
