//! Bindless resource tables.
//!
//! This module implements a bindless (or "descriptor indexing") architecture
//! where resources live in large descriptor arrays and shaders select among
//! them by integer index, rather than having individual descriptors bound per
//! dispatch.
//!
//! # Overview
//!
//! Two independently-owned tables make up the binding contract:
//!
//! - [`AccelTable`]: acceleration structure handles at set 0, binding
//!   [`ACCEL_TABLE_BINDING`]. A ray generation shader picks its traversal
//!   root with the `accel_index` field of the push constant record.
//! - [`ImageTable`]: storage image descriptors at set 1, binding
//!   [`IMAGE_TABLE_BINDING`]. The `output_image` field selects the write
//!   target for computed samples.
//!
//! Indices stay dense (lowest free slot first), so a small push constant
//! payload is enough to address arbitrary per-instance resources without
//! descriptor rebinding between dispatches.
//!
//! # Mutation model
//!
//! Tables are mutated exclusively by the host between dispatches. Once a
//! dispatch is submitted, every index it carries must reference a live entry
//! until the dispatch completes; the tables do no reference counting or
//! eviction of their own, and synchronizing repopulation against in-flight
//! work (double-buffering, barriers) is the submitting code's job. Shaders
//! only ever read.
//!
//! # Requirements
//!
//! - `VK_EXT_descriptor_indexing` (Vulkan 1.2 core) with
//!   `runtimeDescriptorArray`, `descriptorBindingPartiallyBound`,
//!   `descriptorBindingVariableDescriptorCount` and
//!   `descriptorBindingAccelerationStructureUpdateAfterBind` enabled.

use std::sync::{Arc, Mutex};

use ash::{prelude::VkResult, vk};

use crate::{
    Device, HasDevice,
    buffer::BufferLike,
    descriptor::{DescriptorPool, DescriptorSetLayout},
    rtx::AccelStruct,
    utils::{AsVkHandle, IdAlloc},
};

/// Descriptor set index of the acceleration structure table.
pub const ACCEL_TABLE_SET: u32 = 0;
/// Binding slot of the acceleration structure table, shared by convention
/// with the other bindless resource kinds at adjacent slots of set 0.
pub const ACCEL_TABLE_BINDING: u32 = 5;
/// Descriptor set index of the storage image table.
pub const IMAGE_TABLE_SET: u32 = 1;
/// Binding slot of the storage image table.
pub const IMAGE_TABLE_BINDING: u32 = 0;

const TABLE_BINDING_FLAGS: vk::DescriptorBindingFlags =
    vk::DescriptorBindingFlags::from_raw(
        vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT.as_raw()
            | vk::DescriptorBindingFlags::PARTIALLY_BOUND.as_raw()
            | vk::DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING.as_raw(),
    );

/// Capacities for the bindless tables.
#[derive(Clone, Copy, Debug)]
pub struct BindlessConfig {
    pub accel_capacity: u32,
    pub image_capacity: u32,
}
impl Default for BindlessConfig {
    fn default() -> Self {
        Self {
            accel_capacity: 1024,
            image_capacity: 1024,
        }
    }
}
impl BindlessConfig {
    /// Creates both tables with the configured capacities.
    pub fn build(&self, device: Device) -> VkResult<(AccelTable, ImageTable)> {
        let accel = AccelTable::new(device.clone(), self.accel_capacity)?;
        let image = ImageTable::new(device, self.image_capacity)?;
        Ok((accel, image))
    }
}

/// Host-side mirror of the descriptor array.
///
/// The mirror is what [`AccelTable::resolve`] reads; the descriptor set is
/// what the GPU reads. Both are written together under the slot lock, so the
/// mirror always holds the handle most recently written before a dispatch is
/// submitted.
#[derive(Default)]
struct TableSlots {
    id_alloc: IdAlloc,
    mirror: Vec<vk::AccelerationStructureKHR>,
}
impl TableSlots {
    fn insert(&mut self, handle: vk::AccelerationStructureKHR) -> u32 {
        let index = self.id_alloc.alloc_one();
        if self.mirror.len() <= index as usize {
            self.mirror
                .resize(index as usize + 1, vk::AccelerationStructureKHR::null());
        }
        self.mirror[index as usize] = handle;
        index
    }
    fn replace(&mut self, index: u32, handle: vk::AccelerationStructureKHR) {
        assert!(
            self.id_alloc.is_allocated(index),
            "replacing empty table slot {index}"
        );
        self.mirror[index as usize] = handle;
    }
    fn remove(&mut self, index: u32) {
        self.id_alloc.free(index);
        self.mirror[index as usize] = vk::AccelerationStructureKHR::null();
    }
    fn resolve(&self, index: u32) -> vk::AccelerationStructureKHR {
        debug_assert!(
            (index as usize) < self.mirror.len(),
            "acceleration structure index {index} was never populated"
        );
        unsafe { *self.mirror.get_unchecked(index as usize) }
    }
}

struct AccelTableInner {
    pool: DescriptorPool,
    layout: Arc<DescriptorSetLayout>,
    set: vk::DescriptorSet,
    capacity: u32,

    slots: Mutex<TableSlots>,
}

/// The bindless acceleration structure table.
///
/// A single globally-indexed descriptor array of
/// `VK_DESCRIPTOR_TYPE_ACCELERATION_STRUCTURE_KHR` entries. Entries are
/// inserted and replaced by the host; shaders resolve them by the
/// `accel_index` carried in the push constant record.
///
/// # Thread Safety
///
/// Slot allocation and the host mirror sit behind an internal mutex, so
/// entries can be added from multiple threads concurrently. Descriptor
/// writes still must be ordered against in-flight dispatches by the caller.
#[derive(Clone)]
pub struct AccelTable(Arc<AccelTableInner>);

impl AccelTable {
    pub fn new(device: Device, capacity: u32) -> VkResult<Self> {
        let layout = DescriptorSetLayout::new(
            device.clone(),
            &[vk::DescriptorSetLayoutBinding {
                binding: ACCEL_TABLE_BINDING,
                descriptor_type: vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
                descriptor_count: capacity,
                stage_flags: vk::ShaderStageFlags::ALL,
                ..Default::default()
            }],
            &[TABLE_BINDING_FLAGS],
            vk::DescriptorSetLayoutCreateFlags::empty(),
        )?;
        let mut pool = DescriptorPool::new(
            device,
            &[vk::DescriptorPoolSize {
                ty: vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
                descriptor_count: capacity,
            }],
            1,
            vk::DescriptorPoolCreateFlags::empty(),
        )?;

        let set = pool.allocate_one_variably_sized(&layout, capacity)?;
        tracing::info!(capacity, "created acceleration structure table");

        Ok(Self(Arc::new(AccelTableInner {
            pool,
            layout: Arc::new(layout),
            set,
            capacity,
            slots: Mutex::new(TableSlots::default()),
        })))
    }

    pub fn descriptor_layout(&self) -> &Arc<DescriptorSetLayout> {
        &self.0.layout
    }

    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.0.set
    }

    pub fn capacity(&self) -> u32 {
        self.0.capacity
    }

    /// Number of slots the table has handed out so far, including freed ones
    /// that are eligible for reuse.
    pub fn len(&self) -> u32 {
        self.0.slots.lock().unwrap().mirror.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds an acceleration structure at the lowest free slot and returns
    /// its index.
    ///
    /// The table does not keep `accel` alive: the host must not destroy the
    /// structure while any in-flight dispatch may still resolve this index.
    pub fn insert(&self, accel: &AccelStruct<impl BufferLike>) -> VkResult<u32> {
        let mut slots = self.0.slots.lock().unwrap();
        let index = slots.insert(accel.vk_handle());
        if index >= self.0.capacity {
            slots.remove(index);
            return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
        }
        self.write(index, accel.vk_handle());
        Ok(index)
    }

    /// Overwrites a live slot with a different acceleration structure.
    ///
    /// Panics if the slot was never populated. Must only be called between
    /// dispatches that reference the slot.
    pub fn replace(&self, index: u32, accel: &AccelStruct<impl BufferLike>) {
        let mut slots = self.0.slots.lock().unwrap();
        slots.replace(index, accel.vk_handle());
        self.write(index, accel.vk_handle());
    }

    /// Frees a slot for reuse. The descriptor entry is left stale; the
    /// binding is partially bound and never read through a freed index.
    pub fn remove(&self, index: u32) {
        let mut slots = self.0.slots.lock().unwrap();
        slots.remove(index);
    }

    /// Returns the handle most recently written to `index`.
    ///
    /// This is the host mirror of the lookup the traversal hardware performs.
    /// `index` must be a slot populated before the current dispatch was
    /// submitted; out-of-range indices are a contract violation, checked only
    /// in debug builds.
    pub fn resolve(&self, index: u32) -> vk::AccelerationStructureKHR {
        self.0.slots.lock().unwrap().resolve(index)
    }

    /// Binds the table's descriptor set at set [`ACCEL_TABLE_SET`].
    pub fn bind(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        bind_point: vk::PipelineBindPoint,
    ) {
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                cmd,
                bind_point,
                layout,
                ACCEL_TABLE_SET,
                &[self.0.set],
                &[],
            );
        }
    }

    fn write(&self, index: u32, handle: vk::AccelerationStructureKHR) {
        let handles = [handle];
        let mut accel_write = vk::WriteDescriptorSetAccelerationStructureKHR::default()
            .acceleration_structures(&handles);
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.0.set)
            .dst_binding(ACCEL_TABLE_BINDING)
            .dst_array_element(index)
            .descriptor_count(1)
            .descriptor_type(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
            .push_next(&mut accel_write);
        unsafe {
            self.device().update_descriptor_sets(&[write], &[]);
        }
    }
}
impl HasDevice for AccelTable {
    fn device(&self) -> &Device {
        self.0.pool.device()
    }
}

#[derive(Default)]
struct ImageSlots {
    id_alloc: IdAlloc,
    views: Vec<vk::ImageView>,
}

struct ImageTableInner {
    pool: DescriptorPool,
    layout: Arc<DescriptorSetLayout>,
    set: vk::DescriptorSet,
    capacity: u32,

    slots: Mutex<ImageSlots>,
}
impl Drop for ImageTableInner {
    fn drop(&mut self) {
        let slots = self.slots.get_mut().unwrap();
        for view in slots.views.drain(..) {
            if view != vk::ImageView::null() {
                unsafe {
                    self.pool.device().destroy_image_view(view, None);
                }
            }
        }
    }
}

/// The bindless storage image table.
///
/// Holds `VK_DESCRIPTOR_TYPE_STORAGE_IMAGE` descriptors selected by the
/// `output_image` field of the push constant record. The table owns the
/// image *views* it creates; image memory and lifetime stay with the
/// embedding application.
#[derive(Clone)]
pub struct ImageTable(Arc<ImageTableInner>);

impl ImageTable {
    pub fn new(device: Device, capacity: u32) -> VkResult<Self> {
        let layout = DescriptorSetLayout::new(
            device.clone(),
            &[vk::DescriptorSetLayoutBinding {
                binding: IMAGE_TABLE_BINDING,
                descriptor_type: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: capacity,
                stage_flags: vk::ShaderStageFlags::ALL,
                ..Default::default()
            }],
            &[TABLE_BINDING_FLAGS],
            vk::DescriptorSetLayoutCreateFlags::empty(),
        )?;
        let mut pool = DescriptorPool::new(
            device,
            &[vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: capacity,
            }],
            1,
            vk::DescriptorPoolCreateFlags::empty(),
        )?;

        let set = pool.allocate_one_variably_sized(&layout, capacity)?;
        tracing::info!(capacity, "created storage image table");

        Ok(Self(Arc::new(ImageTableInner {
            pool,
            layout: Arc::new(layout),
            set,
            capacity,
            slots: Mutex::new(ImageSlots::default()),
        })))
    }

    pub fn descriptor_layout(&self) -> &Arc<DescriptorSetLayout> {
        &self.0.layout
    }

    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.0.set
    }

    pub fn capacity(&self) -> u32 {
        self.0.capacity
    }

    /// Creates a view over an externally-owned image, writes it at the
    /// lowest free slot, and returns the slot index.
    ///
    /// The image layout is expected to be `GENERAL` whenever a dispatch
    /// writes through this slot.
    pub fn add_image_view(&self, view_info: &vk::ImageViewCreateInfo) -> VkResult<u32> {
        let device = self.device().clone();
        let image_view = unsafe { device.create_image_view(view_info, None)? };
        let mut slots = self.0.slots.lock().unwrap();
        let index = slots.id_alloc.alloc_one();
        if index >= self.0.capacity {
            slots.id_alloc.free(index);
            unsafe {
                device.destroy_image_view(image_view, None);
            }
            return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
        }
        if slots.views.len() <= index as usize {
            slots
                .views
                .resize(index as usize + 1, vk::ImageView::null());
        }
        slots.views[index as usize] = image_view;

        let image_info = [vk::DescriptorImageInfo {
            sampler: vk::Sampler::null(),
            image_view,
            image_layout: vk::ImageLayout::GENERAL,
        }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.0.set)
            .dst_binding(IMAGE_TABLE_BINDING)
            .dst_array_element(index)
            .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
            .image_info(&image_info);
        unsafe {
            device.update_descriptor_sets(&[write], &[]);
        }
        Ok(index)
    }

    /// Returns the view most recently written to `index`.
    ///
    /// Same indexing discipline as [`AccelTable::resolve`]: the slot must
    /// have been populated before the current dispatch was submitted, and
    /// out-of-range indices are a contract violation checked only in debug
    /// builds.
    pub fn resolve(&self, index: u32) -> vk::ImageView {
        let slots = self.0.slots.lock().unwrap();
        debug_assert!(
            (index as usize) < slots.views.len(),
            "output image index {index} was never populated"
        );
        unsafe { *slots.views.get_unchecked(index as usize) }
    }

    /// Frees a slot and destroys the view written there.
    pub fn remove(&self, index: u32) {
        let mut slots = self.0.slots.lock().unwrap();
        slots.id_alloc.free(index);
        let view = std::mem::replace(
            &mut slots.views[index as usize],
            vk::ImageView::null(),
        );
        if view != vk::ImageView::null() {
            unsafe {
                self.device().destroy_image_view(view, None);
            }
        }
    }

    /// Binds the table's descriptor set at set [`IMAGE_TABLE_SET`].
    pub fn bind(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        bind_point: vk::PipelineBindPoint,
    ) {
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                cmd,
                bind_point,
                layout,
                IMAGE_TABLE_SET,
                &[self.0.set],
                &[],
            );
        }
    }
}
impl HasDevice for ImageTable {
    fn device(&self) -> &Device {
        self.0.pool.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn handle(value: u64) -> vk::AccelerationStructureKHR {
        vk::AccelerationStructureKHR::from_raw(value)
    }

    #[test]
    fn test_insert_uses_lowest_free_slot() {
        let mut slots = TableSlots::default();
        assert_eq!(slots.insert(handle(0x10)), 0);
        assert_eq!(slots.insert(handle(0x20)), 1);
        slots.remove(0);
        assert_eq!(slots.insert(handle(0x30)), 0);
        assert_eq!(slots.resolve(0), handle(0x30));
        assert_eq!(slots.resolve(1), handle(0x20));
    }

    #[test]
    fn test_replace_is_last_write_wins() {
        let mut slots = TableSlots::default();
        slots.insert(handle(0x10));
        slots.insert(handle(0x20));
        let index = slots.insert(handle(0x30));
        assert_eq!(index, 2);
        slots.replace(2, handle(0x40));
        assert_eq!(slots.resolve(2), handle(0x40));
        // untouched slots are unaffected by the repopulation
        assert_eq!(slots.resolve(0), handle(0x10));
        assert_eq!(slots.resolve(1), handle(0x20));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let mut slots = TableSlots::default();
        let index = slots.insert(handle(0xabcd));
        assert_eq!(slots.resolve(index), slots.resolve(index));
    }

    #[test]
    #[should_panic(expected = "replacing empty table slot")]
    fn test_replace_empty_slot_panics() {
        let mut slots = TableSlots::default();
        slots.insert(handle(0x10));
        slots.remove(0);
        slots.replace(0, handle(0x20));
    }

    /// Slot 2 holds structure A; a dispatch record carrying `accel_index=2`
    /// and `output_image=0` must resolve exactly A and target exactly the
    /// first image slot.
    #[test]
    fn test_dispatch_record_selects_populated_slot() {
        use crate::{dispatch::RtPushConstants, geometry::GeometryAddresses};

        let mut slots = TableSlots::default();
        slots.insert(handle(0x10));
        slots.insert(handle(0x20));
        let a = handle(0xa);
        assert_eq!(slots.insert(a), 2);

        let record = RtPushConstants::new(0, 2, GeometryAddresses::new(0x1000, 0x2000), 0.0);
        assert_eq!(slots.resolve(record.accel_index()), a);
        assert_eq!(record.output_image(), 0);
    }
}
