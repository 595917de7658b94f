mod idalloc;
pub use idalloc::IdAlloc;

use ash::vk;
use glam::Affine3A;

pub trait AsVkHandle {
    type Handle: ash::vk::Handle + Copy;
    fn vk_handle(&self) -> Self::Handle;
}
impl<T> AsVkHandle for &'_ T
where
    T: AsVkHandle,
{
    type Handle = T::Handle;

    fn vk_handle(&self) -> Self::Handle {
        T::vk_handle(self)
    }
}
impl<T> AsVkHandle for &'_ mut T
where
    T: AsVkHandle,
{
    type Handle = T::Handle;

    fn vk_handle(&self) -> Self::Handle {
        T::vk_handle(self)
    }
}

pub fn glam_to_vk_transform(affine: Affine3A) -> vk::TransformMatrixKHR {
    let x = &affine.matrix3.x_axis;
    let y = &affine.matrix3.y_axis;
    let z = &affine.matrix3.z_axis;
    let w = &affine.translation;
    vk::TransformMatrixKHR {
        // row major
        matrix: [x.x, y.x, z.x, w.x, x.y, y.y, z.y, w.y, x.z, y.z, z.z, w.z],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let transform = glam_to_vk_transform(Affine3A::IDENTITY);
        assert_eq!(
            transform.matrix,
            [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_translation_lands_in_fourth_column() {
        let transform = glam_to_vk_transform(Affine3A::from_translation(glam::Vec3::new(
            1.0, 2.0, 3.0,
        )));
        assert_eq!(transform.matrix[3], 1.0);
        assert_eq!(transform.matrix[7], 2.0);
        assert_eq!(transform.matrix[11], 3.0);
    }
}
