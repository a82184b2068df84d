//! Rigid transform type shared by raw tracks, the clip context, and the
//! decompressor.

use glam::{Quat, Vec3};

/// A single QVV (quaternion rotation, vector translation, vector scale)
/// sample. Scale is a plain `Vec3` rather than a scalar: the format supports
/// non-uniform scale, matching `original_source`'s `rtm::qvv` usage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub rotation: Quat,
    pub translation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn new(rotation: Quat, translation: Vec3, scale: Vec3) -> Self {
        Self {
            rotation,
            translation,
            scale,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.rotation.is_finite() && self.translation.is_finite() && self.scale.is_finite()
    }

    /// Applies this transform to a local-space point, producing the point's
    /// position in the parent's space: scale, then rotate, then translate.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (point * self.scale) + self.translation
    }

    /// Same as [`Self::transform_point`] but without the scale multiply, for
    /// the shell metric's no-scale mode.
    pub fn transform_point_no_scale(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    /// Composes `self` (child, local space) on top of `base` (ancestor),
    /// producing the child's transform in the ancestor's parent space. Used
    /// both to build object-space poses during error measurement and to
    /// layer additive deltas onto a base clip.
    pub fn compose(&self, base: &Transform) -> Transform {
        Transform {
            rotation: (base.rotation * self.rotation).normalize(),
            translation: base.rotation * (self.translation * base.scale) + base.translation,
            scale: base.scale * self.scale,
        }
    }

    /// Inverse of [`Self::compose`]: given an object-space pose and the
    /// already-resolved object-space pose of its parent, recovers the local
    /// transform that would reproduce it. Used by the error-correction pass
    /// to reproject a descendant's local sample after an
    /// ancestor collapsed to a constant or default value.
    pub fn decompose(object: &Transform, parent_object: &Transform) -> Transform {
        let inv_parent_rotation = parent_object.rotation.conjugate();
        let safe_scale = Vec3::select(
            parent_object.scale.abs().cmplt(Vec3::splat(1.0e-8)),
            Vec3::ONE,
            parent_object.scale,
        );

        Transform {
            rotation: (inv_parent_rotation * object.rotation).normalize(),
            translation: (inv_parent_rotation * (object.translation - parent_object.translation))
                / safe_scale,
            scale: object.scale / safe_scale,
        }
    }

    /// Spherical-linearly interpolates rotation and linearly interpolates
    /// translation/scale, applying the short-arc bias so the quaternion lerp
    /// never takes the long way around.
    pub fn lerp(&self, other: &Transform, alpha: f32, normalize_rotation: bool) -> Transform {
        let mut b = other.rotation;
        if self.rotation.dot(b) < 0.0 {
            b = -b;
        }
        let rotation = self.rotation.lerp(b, alpha);
        let rotation = if normalize_rotation {
            rotation.normalize()
        } else {
            rotation
        };

        Transform {
            rotation,
            translation: self.translation.lerp(other.translation, alpha),
            scale: self.scale.lerp(other.scale, alpha),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_transform_point_is_noop() {
        let t = Transform::IDENTITY;
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(t.transform_point(p), p, epsilon = 1e-6);
    }

    #[test]
    fn lerp_at_zero_and_one_matches_endpoints() {
        let a = Transform::new(Quat::IDENTITY, Vec3::ZERO, Vec3::ONE);
        let b = Transform::new(
            Quat::from_rotation_y(1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::splat(2.0),
        );

        let at_zero = a.lerp(&b, 0.0, true);
        let at_one = a.lerp(&b, 1.0, true);

        assert_relative_eq!(at_zero.translation, a.translation, epsilon = 1e-6);
        assert_relative_eq!(at_one.translation, b.translation, epsilon = 1e-6);
    }

    #[test]
    fn decompose_inverts_compose() {
        let parent = Transform::new(Quat::from_rotation_z(0.3), Vec3::new(1.0, 0.0, 0.0), Vec3::splat(1.5));
        let child = Transform::new(Quat::from_rotation_x(0.7), Vec3::new(0.2, 0.3, 0.4), Vec3::splat(0.8));

        let object = child.compose(&parent);
        let recovered = Transform::decompose(&object, &parent);

        assert_relative_eq!(recovered.translation, child.translation, epsilon = 1e-5);
        assert_relative_eq!(recovered.scale, child.scale, epsilon = 1e-5);
    }

    #[test]
    fn compose_with_identity_base_is_noop() {
        let child = Transform::new(
            Quat::from_rotation_x(0.5),
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::splat(1.5),
        );
        let composed = child.compose(&Transform::IDENTITY);
        assert_relative_eq!(composed.translation, child.translation, epsilon = 1e-6);
        assert_relative_eq!(composed.scale, child.scale, epsilon = 1e-6);
    }
}
