//! Vulkan descriptor set and descriptor pool management.
//!
//! The bindless tables in [`crate::bindless`] each own one descriptor set
//! allocated with a variable descriptor count. This module provides the two
//! wrappers they are built from:
//!
//! - [`DescriptorSetLayout`]: a descriptor set layout with optional
//!   per-binding flags.
//! - [`DescriptorPool`]: a pool sized for a single variably-sized set.

use ash::{prelude::VkResult, vk};

use crate::{Device, HasDevice, utils::AsVkHandle};

/// A descriptor set layout.
pub struct DescriptorSetLayout {
    device: Device,
    handle: vk::DescriptorSetLayout,
}
impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.handle, None);
        }
    }
}
impl DescriptorSetLayout {
    /// Creates a descriptor set layout with N bindings.
    ///
    /// # Parameters
    /// - `bindings`: A slice of length `N` describing the bindings to be created in this descriptor set layout.
    /// - `binding_flags`: An empty slice, or a slice of length `N` with flags annotating the bindings.
    pub fn new(
        device: Device,
        bindings: &[vk::DescriptorSetLayoutBinding],
        binding_flags: &[vk::DescriptorBindingFlags],
        flags: vk::DescriptorSetLayoutCreateFlags,
    ) -> VkResult<Self> {
        assert!(binding_flags.is_empty() || binding_flags.len() == bindings.len());
        let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default()
            .binding_flags(binding_flags);
        let mut info = vk::DescriptorSetLayoutCreateInfo {
            flags,
            ..Default::default()
        }
        .bindings(bindings);
        if !binding_flags.is_empty() {
            info = info.push_next(&mut flags_info);
        }
        let raw = unsafe { device.create_descriptor_set_layout(&info, None) }?;

        Ok(Self {
            device,
            handle: raw,
        })
    }
}
impl HasDevice for DescriptorSetLayout {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl AsVkHandle for DescriptorSetLayout {
    type Handle = vk::DescriptorSetLayout;

    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}

/// A pool for allocating descriptor sets.
pub struct DescriptorPool {
    device: Device,
    raw: vk::DescriptorPool,
}
impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.raw, None);
        }
    }
}
impl DescriptorPool {
    pub fn new(
        device: Device,
        pool_sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
        flags: vk::DescriptorPoolCreateFlags,
    ) -> VkResult<Self> {
        let info = vk::DescriptorPoolCreateInfo {
            max_sets,
            flags,
            ..Default::default()
        }
        .pool_sizes(pool_sizes);
        let raw = unsafe { device.create_descriptor_pool(&info, None) }?;
        Ok(Self { device, raw })
    }

    /// Allocates one descriptor set whose last binding has a variable count.
    ///
    /// The layout's variable binding must have been created with
    /// `VARIABLE_DESCRIPTOR_COUNT`, and `count` must not exceed the
    /// descriptor count declared in the layout.
    pub fn allocate_one_variably_sized(
        &mut self,
        layout: &DescriptorSetLayout,
        count: u32,
    ) -> VkResult<vk::DescriptorSet> {
        let counts = [count];
        let mut variable_info = vk::DescriptorSetVariableDescriptorCountAllocateInfo::default()
            .descriptor_counts(&counts);
        let set_layouts = [layout.vk_handle()];
        let info = vk::DescriptorSetAllocateInfo {
            descriptor_pool: self.raw,
            ..Default::default()
        }
        .set_layouts(&set_layouts)
        .push_next(&mut variable_info);
        let mut sets = unsafe { self.device.allocate_descriptor_sets(&info)? };
        Ok(sets.pop().unwrap())
    }
}
impl HasDevice for DescriptorPool {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl AsVkHandle for DescriptorPool {
    type Handle = vk::DescriptorPool;

    fn vk_handle(&self) -> Self::Handle {
        self.raw
    }
}
