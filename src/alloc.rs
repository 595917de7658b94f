//! GPU memory allocation.
//!
//! This module provides the [`Allocator`] type, a wrapper around the Vulkan
//! Memory Allocator (VMA) library. Geometry reference buffers and
//! acceleration structure backing buffers are allocated through it.
//!
//! Create an allocator once per device and pass it to buffer creation
//! functions. Buffer device address support is always enabled: the whole
//! point of the geometry reference path is handing raw device addresses to
//! shaders.

use std::{ops::Deref, sync::Arc};

use ash::prelude::VkResult;

use crate::{Device, HasDevice};

/// A GPU memory allocator using the Vulkan Memory Allocator (VMA) library.
///
/// Thread-safe and cheaply cloneable.
#[derive(Clone)]
pub struct Allocator(Arc<AllocatorInner>);
struct AllocatorInner {
    device: Device,
    inner: vk_mem::Allocator,
}

impl HasDevice for Allocator {
    fn device(&self) -> &Device {
        &self.0.device
    }
}

impl Allocator {
    /// Creates a new allocator for the given device.
    ///
    /// The device must have the `bufferDeviceAddress` feature enabled.
    pub fn new(device: Device) -> VkResult<Self> {
        let mut info = vk_mem::AllocatorCreateInfo::new(
            device.instance(),
            &device,
            device.physical_device(),
        );
        info.flags |= vk_mem::AllocatorCreateFlags::BUFFER_DEVICE_ADDRESS;
        let alloc = unsafe { vk_mem::Allocator::new(info)? };
        Ok(Self(Arc::new(AllocatorInner {
            device,
            inner: alloc,
        })))
    }
}

impl Deref for Allocator {
    type Target = vk_mem::Allocator;

    fn deref(&self) -> &Self::Target {
        &self.0.inner
    }
}
