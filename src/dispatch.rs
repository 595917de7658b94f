//! The per-dispatch resource descriptor.
//!
//! Every ray tracing dispatch carries one [`RtPushConstants`] record, pushed
//! at offset 0 of the pipeline layout's push constant range. It is the only
//! state a shader invocation needs to resolve its resources: the output
//! image slot, the acceleration structure slot, the two geometry buffer
//! addresses, and the animation clock.
//!
//! The byte layout is a contract shared with compiled shader code and must
//! be preserved bit-exactly: field order and offsets are fixed, reserved
//! padding is zero-filled, and the record occupies 48 bytes placed at a
//! 16-byte-aligned offset. Compile-time assertions below pin the layout.

use std::time::Instant;

use ash::vk;
use bytemuck::{NoUninit, Zeroable};

use crate::{
    Device,
    bindless::{AccelTable, ImageTable},
    geometry::GeometryAddresses,
};

/// The push constant record for one ray tracing dispatch.
///
/// ```
/// # use scoria::{dispatch::RtPushConstants, geometry::GeometryAddresses};
/// let record = RtPushConstants::new(0, 2, GeometryAddresses::new(0x1000, 0x2000), 0.0);
/// assert_eq!(record.accel_index(), 2);
/// assert_eq!(bytemuck::bytes_of(&record).len(), RtPushConstants::SIZE);
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, NoUninit, Zeroable)]
pub struct RtPushConstants {
    output_image: u32,
    accel_index: u32,
    vertex_address: u64,
    index_address: u64,
    time: f32,
    _pad: [f32; 3],
    _reserved: [u32; 2],
}

const _: () = assert!(core::mem::size_of::<RtPushConstants>() == RtPushConstants::SIZE);
const _: () = assert!(core::mem::offset_of!(RtPushConstants, output_image) == 0);
const _: () = assert!(core::mem::offset_of!(RtPushConstants, accel_index) == 4);
const _: () = assert!(core::mem::offset_of!(RtPushConstants, vertex_address) == 8);
const _: () = assert!(core::mem::offset_of!(RtPushConstants, index_address) == 16);
const _: () = assert!(core::mem::offset_of!(RtPushConstants, time) == 24);
const _: () = assert!(core::mem::offset_of!(RtPushConstants, _pad) == 28);

impl RtPushConstants {
    /// Total record size in bytes, reserved padding included.
    pub const SIZE: usize = 48;
    /// Required placement alignment of the record.
    pub const ALIGNMENT: usize = 16;

    /// Builds the record for one dispatch. Reserved padding is zero-filled.
    pub fn new(
        output_image: u32,
        accel_index: u32,
        geometry: GeometryAddresses,
        time: f32,
    ) -> Self {
        Self {
            output_image,
            accel_index,
            vertex_address: geometry.vertex,
            index_address: geometry.index,
            time,
            _pad: [0.0; 3],
            _reserved: [0; 2],
        }
    }

    /// Index into the bindless storage image table identifying the write
    /// target.
    pub fn output_image(&self) -> u32 {
        self.output_image
    }

    /// Index into the bindless acceleration structure table.
    pub fn accel_index(&self) -> u32 {
        self.accel_index
    }

    pub fn vertex_address(&self) -> vk::DeviceAddress {
        self.vertex_address
    }

    pub fn index_address(&self) -> vk::DeviceAddress {
        self.index_address
    }

    /// Elapsed time in seconds, supplied once per dispatch by the host.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Resolves the acceleration structure this dispatch traverses.
    pub fn resolve_accel(&self, table: &AccelTable) -> vk::AccelerationStructureKHR {
        table.resolve(self.accel_index)
    }

    /// Resolves the storage image view this dispatch writes to.
    pub fn resolve_output(&self, table: &ImageTable) -> vk::ImageView {
        table.resolve(self.output_image)
    }

    /// Pushes the record into the command buffer at offset 0.
    pub fn record(&self, device: &Device, cmd: vk::CommandBuffer, layout: vk::PipelineLayout) {
        unsafe {
            device.cmd_push_constants(
                cmd,
                layout,
                vk::ShaderStageFlags::ALL,
                0,
                bytemuck::bytes_of(self),
            );
        }
    }
}

/// Monotonic time source for the `time` field.
///
/// One sample per dispatch. Values never decrease within one rendering
/// session, so time-driven animation stays deterministic across the
/// invocation grid: every invocation of a dispatch reads the same clock
/// value.
pub struct FrameClock {
    origin: Instant,
    last: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last: 0.0,
        }
    }

    /// Samples the clock for the next dispatch.
    pub fn tick(&mut self) -> f32 {
        let time = self.origin.elapsed().as_secs_f32().max(self.last);
        self.last = time;
        time
    }

    /// The most recent sample handed out.
    pub fn last(&self) -> f32 {
        self.last
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout_round_trip() {
        let record = RtPushConstants::new(7, 3, GeometryAddresses::new(0x1000, 0x2000), 1.5);
        let bytes = bytemuck::bytes_of(&record);
        assert_eq!(bytes.len(), 48);
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 7);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 3);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 0x1000);
        assert_eq!(
            u64::from_le_bytes(bytes[16..24].try_into().unwrap()),
            0x2000
        );
        assert_eq!(f32::from_le_bytes(bytes[24..28].try_into().unwrap()), 1.5);
        assert!(bytes[28..48].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_record_accessors() {
        let record = RtPushConstants::new(1, 2, GeometryAddresses::new(0x10, 0x20), 0.5);
        assert_eq!(record.output_image(), 1);
        assert_eq!(record.accel_index(), 2);
        assert_eq!(record.vertex_address(), 0x10);
        assert_eq!(record.index_address(), 0x20);
        assert_eq!(record.time(), 0.5);
    }

    #[test]
    fn test_frame_clock_is_monotonic() {
        let mut clock = FrameClock::new();
        let mut previous = clock.tick();
        for _ in 0..100 {
            let next = clock.tick();
            assert!(next >= previous);
            previous = next;
        }
        assert_eq!(clock.last(), previous);
    }
}
