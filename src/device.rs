//! Logical device wrapper.
//!
//! [`Device`] wraps an already-created `ash` logical device together with its
//! physical device and the `VK_KHR_acceleration_structure` function table.
//! Device *creation* (instance setup, queue selection, feature negotiation)
//! belongs to the embedding application; this crate only needs a handle it can
//! issue descriptor writes and acceleration structure calls through.
//!
//! The wrapper is reference counted. The logical device is destroyed when the
//! last clone drops, so every resource type in this crate holds a [`Device`]
//! to keep it alive.

use std::{ffi::CStr, ops::Deref, sync::Arc};

use ash::{khr, vk};

/// Types that are created from, and keep alive, a [`Device`].
pub trait HasDevice {
    fn device(&self) -> &Device;
}

/// A required extension or feature was not enabled on the device.
#[derive(Debug, thiserror::Error)]
pub enum MissingFeatureError {
    #[error("missing device extension {0:?}")]
    Extension(&'static CStr),
}

/// A reference-counted Vulkan logical device.
///
/// Dereferences to [`ash::Device`] for raw Vulkan calls.
#[derive(Clone)]
pub struct Device(Arc<DeviceInner>);

struct DeviceInner {
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    acceleration_structure_fn: khr::acceleration_structure::Device,
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        tracing::info!(device = ?self.device.handle(), "drop device");
        unsafe {
            self.device.destroy_device(None);
        }
    }
}

impl Device {
    /// Wraps an already-created logical device, taking ownership of it.
    ///
    /// `enabled_extensions` is the extension list the device was created
    /// with. `VK_KHR_acceleration_structure` must be among them and the
    /// `bufferDeviceAddress` feature must be enabled; the extension check
    /// happens here so a misconfigured device fails at construction rather
    /// than at the first descriptor write.
    pub fn new(
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        enabled_extensions: &[&CStr],
    ) -> Result<Self, MissingFeatureError> {
        if !enabled_extensions.contains(&khr::acceleration_structure::NAME) {
            return Err(MissingFeatureError::Extension(
                khr::acceleration_structure::NAME,
            ));
        }
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let acceleration_structure_fn = khr::acceleration_structure::Device::new(&instance, &device);
        Ok(Self(Arc::new(DeviceInner {
            instance,
            physical_device,
            device,
            memory_properties,
            acceleration_structure_fn,
        })))
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.0.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.0.physical_device
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.0.memory_properties
    }

    /// The `VK_KHR_acceleration_structure` function table.
    pub fn acceleration_structure(&self) -> &khr::acceleration_structure::Device {
        &self.0.acceleration_structure_fn
    }
}

impl HasDevice for Device {
    fn device(&self) -> &Device {
        self
    }
}

impl Deref for Device {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.0.device
    }
}
