//! Vulkan buffer abstractions with automatic memory management.
//!
//! Two allocation strategies cover what the binding layer needs:
//!
//! - **[`Buffer::new_private`]**: GPU-exclusive memory. Used for acceleration
//!   structure backing storage.
//! - **[`Buffer::new_host`]**: CPU-accessible, persistently mapped memory.
//!   Used for geometry reference buffers that the host writes once and the
//!   GPU reads by device address.
//!
//! Every buffer created with `SHADER_DEVICE_ADDRESS` usage captures its
//! device address at creation time; [`BufferLike::device_address`] is what
//! ends up inside the per-dispatch push constant record.

use std::{fmt::Debug, ops::RangeBounds};

use ash::{prelude::VkResult, vk};
use vk_mem::Alloc;

use crate::{Allocator, Device, HasDevice, utils::AsVkHandle};

/// Common interface for Vulkan buffer types.
///
/// For non-coherent memory, call [`flush`](BufferLike::flush) after CPU
/// writes to make them visible to the GPU.
pub trait BufferLike: AsVkHandle<Handle = vk::Buffer> + Send + Sync + 'static {
    /// Returns the offset within the underlying buffer. Always 0 for
    /// standalone buffers.
    fn offset(&self) -> vk::DeviceSize;

    /// Returns the buffer device address for use in shaders.
    ///
    /// Returns 0 if the buffer was not created with `SHADER_DEVICE_ADDRESS`
    /// usage.
    fn device_address(&self) -> vk::DeviceAddress;

    /// Returns the size of the buffer in bytes.
    fn size(&self) -> vk::DeviceSize;

    /// Returns a read-only slice of the buffer's mapped memory, if
    /// host-visible.
    fn as_slice(&self) -> Option<&[u8]>;

    /// Returns a mutable slice of the buffer's mapped memory, if
    /// host-visible and mapped.
    fn as_slice_mut(&mut self) -> Option<&mut [u8]>;

    /// Flushes the specified range to make CPU writes visible to the GPU.
    ///
    /// This is a no-op for `HOST_COHERENT` memory.
    fn flush(&mut self, range: impl RangeBounds<vk::DeviceSize>) -> VkResult<()>;
}

/// A buffer fully bound to a memory allocation.
pub struct Buffer {
    allocator: Allocator,
    allocation: vk_mem::Allocation,
    buffer: vk::Buffer,
    size: vk::DeviceSize,
    device_address: vk::DeviceAddress,

    memory_properties: vk::MemoryPropertyFlags,
}
impl HasDevice for Buffer {
    fn device(&self) -> &Device {
        self.allocator.device()
    }
}
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}
impl Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("size", &self.size)
            .field("device_address", &self.device_address)
            .field("memory_properties", &self.memory_properties)
            .finish_non_exhaustive()
    }
}
impl AsVkHandle for Buffer {
    fn vk_handle(&self) -> Self::Handle {
        self.buffer
    }
    type Handle = vk::Buffer;
}
impl BufferLike for Buffer {
    fn offset(&self) -> vk::DeviceSize {
        0
    }

    fn device_address(&self) -> vk::DeviceAddress {
        self.device_address
    }

    fn size(&self) -> vk::DeviceSize {
        self.size
    }
    fn as_slice(&self) -> Option<&[u8]> {
        if !self
            .memory_properties
            .contains(vk::MemoryPropertyFlags::HOST_CACHED)
        {
            tracing::warn!("Trying to read from buffer that isn't HOST_CACHED");
        }
        if self
            .memory_properties
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        {
            Some(unsafe {
                std::slice::from_raw_parts(
                    self.allocator
                        .get_allocation_info(&self.allocation)
                        .mapped_data as *const u8,
                    self.size as usize,
                )
            })
        } else {
            None
        }
    }
    fn as_slice_mut(&mut self) -> Option<&mut [u8]> {
        if self
            .memory_properties
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        {
            unsafe {
                let mapped_data = self
                    .allocator
                    .get_allocation_info(&self.allocation)
                    .mapped_data as *mut u8;
                if mapped_data.is_null() {
                    None
                } else {
                    Some(std::slice::from_raw_parts_mut(
                        mapped_data,
                        self.size as usize,
                    ))
                }
            }
        } else {
            None
        }
    }

    fn flush(&mut self, range: impl RangeBounds<vk::DeviceSize>) -> VkResult<()> {
        if self
            .memory_properties
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
        {
            return Ok(());
        }
        let offset = match range.start_bound() {
            std::ops::Bound::Included(start) => *start,
            std::ops::Bound::Excluded(start) => start + 1,
            std::ops::Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            std::ops::Bound::Included(end) => end + 1,
            std::ops::Bound::Excluded(end) => *end,
            std::ops::Bound::Unbounded => self.size,
        };
        self.allocator
            .flush_allocation(&self.allocation, offset, end - offset)
    }
}
impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.allocator
                .destroy_buffer(self.buffer, &mut self.allocation);
        }
    }
}

impl Buffer {
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }
    pub fn from_raw(
        allocator: Allocator,
        buffer: vk::Buffer,
        allocation: vk_mem::Allocation,
        usage: vk::BufferUsageFlags,
        size: vk::DeviceSize,
    ) -> Self {
        let info = allocator.get_allocation_info(&allocation);
        let device_address = if usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS) {
            unsafe {
                allocator
                    .device()
                    .get_buffer_device_address(&vk::BufferDeviceAddressInfo {
                        buffer,
                        ..Default::default()
                    })
            }
        } else {
            0
        };

        Self {
            memory_properties: allocator.device().memory_properties().memory_types
                [info.memory_type as usize]
                .property_flags,
            allocator,
            buffer,
            allocation,
            size,
            device_address,
        }
    }

    /// Create a buffer that is accessible exclusively from the GPU.
    pub fn new_private(
        allocator: Allocator,
        size: vk::DeviceSize,
        alignment: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VkResult<Self> {
        unsafe {
            let (buffer, allocation) = allocator.create_buffer_with_alignment(
                &vk::BufferCreateInfo {
                    size,
                    usage,
                    ..Default::default()
                },
                &vk_mem::AllocationCreateInfo {
                    usage: vk_mem::MemoryUsage::AutoPreferDevice,
                    ..Default::default()
                },
                alignment,
            )?;
            Ok(Self::from_raw(allocator, buffer, allocation, usage, size))
        }
    }

    /// Create a HOST_VISIBLE, persistently mapped buffer.
    ///
    /// Use for data written by the CPU and read by the GPU, like geometry
    /// reference buffers.
    pub fn new_host(
        allocator: Allocator,
        size: vk::DeviceSize,
        alignment: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VkResult<Self> {
        unsafe {
            let (buffer, allocation) = allocator.create_buffer_with_alignment(
                &vk::BufferCreateInfo {
                    size,
                    usage,
                    ..Default::default()
                },
                &vk_mem::AllocationCreateInfo {
                    usage: vk_mem::MemoryUsage::AutoPreferHost,
                    flags: vk_mem::AllocationCreateFlags::MAPPED
                        | vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
                    ..Default::default()
                },
                alignment,
            )?;
            Ok(Self::from_raw(allocator, buffer, allocation, usage, size))
        }
    }
}
