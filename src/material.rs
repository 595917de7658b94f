//! Material identifiers and lighting constants.
//!
//! Materials are a small closed set shared with the shading pipeline: the
//! host places a [`MaterialId`] in each TLAS instance's custom index, and
//! closest-hit code switches on the same value to pick a response. Adding a
//! material extends the enumeration on both sides at once; an identifier
//! outside the set is a scene configuration error, never silently remapped.

use glam::Vec3;

/// A material identifier carried in a TLAS instance's 24-bit custom index.
///
/// The numeric values are a stable ABI with compiled shading code; they must
/// not be reordered.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaterialId {
    Ground = 0,
    RedMetal = 1,
    BlueReflective = 2,
    Green = 3,
}

/// An identifier outside the supported material set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("material identifier {0} outside the supported set 0..=3")]
pub struct UnknownMaterialError(pub u32);

impl MaterialId {
    pub const COUNT: u32 = 4;

    pub const ALL: [MaterialId; 4] = [
        MaterialId::Ground,
        MaterialId::RedMetal,
        MaterialId::BlueReflective,
        MaterialId::Green,
    ];

    /// The value stored in the instance custom index.
    pub fn custom_index(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for MaterialId {
    type Error = UnknownMaterialError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MaterialId::Ground),
            1 => Ok(MaterialId::RedMetal),
            2 => Ok(MaterialId::BlueReflective),
            3 => Ok(MaterialId::Green),
            other => Err(UnknownMaterialError(other)),
        }
    }
}

/// Sun-like light direction before normalization.
pub const LIGHT_DIRECTION: Vec3 = Vec3::new(0.5, 0.8, -0.3);

/// Warm sunlight color.
pub const LIGHT_COLOR: Vec3 = Vec3::new(1.0, 0.95, 0.8);

/// The unit-length light direction handed to shading code.
pub fn light_dir() -> Vec3 {
    LIGHT_DIRECTION.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_set_round_trips() {
        for material in MaterialId::ALL {
            assert_eq!(
                MaterialId::try_from(material.custom_index()),
                Ok(material)
            );
        }
    }

    #[test]
    fn test_material_set_is_closed() {
        assert_eq!(MaterialId::try_from(4), Err(UnknownMaterialError(4)));
        assert_eq!(
            MaterialId::try_from(u32::MAX),
            Err(UnknownMaterialError(u32::MAX))
        );
    }

    #[test]
    fn test_light_dir_is_unit_length() {
        assert!((light_dir().length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_light_dir_preserves_direction() {
        let normalized = light_dir();
        assert!(normalized.x > 0.0);
        assert!(normalized.y > 0.0);
        assert!(normalized.z < 0.0);
        // same heading as the unnormalized literal
        assert!(normalized.cross(LIGHT_DIRECTION).length() < 1e-6);
    }
}
