//! # Scoria
//!
//! Bindless resource binding layer for Vulkan ray tracing.
//!
//! Scoria implements the host side of a ray traced renderer's resource
//! binding contract: shaders receive a single small push constant record per
//! dispatch and resolve everything else through globally-indexed bindless
//! tables and raw buffer device addresses, with no descriptor rebinding
//! between dispatches.
//!
//! ## Overview
//!
//! - [`bindless::AccelTable`]: acceleration structure handles, indexed by
//!   the record's `accel_index` field (set 0, binding 5).
//! - [`bindless::ImageTable`]: storage image write targets, indexed by the
//!   record's `output_image` field (set 1, binding 0).
//! - [`dispatch::RtPushConstants`]: the fixed-layout 48-byte per-dispatch
//!   record, bit-exact with the shader side.
//! - [`geometry`]: vertex/index buffers referenced by raw device address,
//!   bypassing descriptors entirely.
//! - [`material`]: the closed material identifier set and lighting
//!   constants shared with shading code.
//!
//! ## Usage
//!
//! ```ignore
//! use scoria::prelude::*;
//!
//! let device = Device::new(instance, physical_device, raw_device, &extensions)?;
//! let allocator = Allocator::new(device.clone())?;
//! let (accel_table, image_table) = BindlessConfig::default().build(device.clone())?;
//!
//! // Host-side scene setup, once per geometry change:
//! let geometry = GeometryBuffers::upload(allocator.clone(), &positions, &indices)?;
//! let tlas_index = accel_table.insert(&tlas)?;
//! let target = image_table.add_image_view(&view_info)?;
//!
//! // Per dispatch:
//! let record = RtPushConstants::new(target, tlas_index, geometry.addresses(), clock.tick());
//! accel_table.bind(cmd, pipeline_layout, vk::PipelineBindPoint::RAY_TRACING_KHR);
//! image_table.bind(cmd, pipeline_layout, vk::PipelineBindPoint::RAY_TRACING_KHR);
//! record.record(&device, cmd, pipeline_layout);
//! // ... vkCmdTraceRaysKHR recorded by the pipeline layer ...
//! ```
//!
//! ## Trust model
//!
//! Indices and addresses inside the record are trusted inputs on the per-ray
//! hot path. Their validity is established where they are produced (slot
//! allocation, address alignment checks, the closed material set), never
//! re-checked where they are consumed. An out-of-range index or stale handle
//! is a contract violation of the embedding application, not a recoverable
//! error.
//!
//! ## Requirements
//!
//! - Vulkan 1.2+ with `VK_KHR_acceleration_structure`, descriptor indexing
//!   and `bufferDeviceAddress` enabled.

mod alloc;
pub mod bindless;
pub mod buffer;
pub mod descriptor;
pub mod device;
pub mod dispatch;
pub mod geometry;
pub mod material;
pub mod rtx;
pub mod utils;

pub use alloc::Allocator;
pub use device::{Device, HasDevice, MissingFeatureError};

pub use ash;

pub mod prelude {
    pub use crate::{
        Allocator, Device, HasDevice, ash,
        ash::vk,
        bindless::{AccelTable, BindlessConfig, ImageTable},
        buffer::{Buffer, BufferLike},
        dispatch::{FrameClock, RtPushConstants},
        geometry::{GeometryAddresses, GeometryBuffers},
        material::MaterialId,
        rtx::AccelStruct,
        utils::AsVkHandle,
    };
}
