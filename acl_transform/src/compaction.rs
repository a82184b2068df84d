//! Constant & default sub-track compaction.
//!
//! Grounded on `original_source/includes/acl/compression/impl/compact_constant_streams.h`:
//! a sub-track collapses to a single constant sample, or further to the
//! bind-pose default, whenever doing so keeps the rigid-shell error within
//! precision at every sample.

use acl_format::{RotationFormat, VectorFormat};
use glam::Vec3;

use crate::clip_context::ClipContext;
use crate::shell_metric::{self, RigidShellMetadata};
use crate::track::INVALID_PARENT_INDEX;
use crate::transform::Transform;

/// What a sub-track collapsed to, if anything. `Default` implies `Constant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Animated,
    Constant,
    Default,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubTrackCategories {
    pub rotation: Option<Category>,
    pub translation: Option<Category>,
    pub scale: Option<Category>,
}

/// Formats in effect for the clip; only `raw` formats change the compaction
/// tolerance.
#[derive(Debug, Clone, Copy)]
pub struct CompactionFormats {
    pub rotation_format: RotationFormat,
    pub translation_format: VectorFormat,
    pub scale_format: VectorFormat,
}

/// Runs constant/default compaction over every bone of `clip`, returning the
/// chosen category per sub-track. `shell` is the already-computed rigid
/// shell metadata; compaction tests against
/// `shell[bone].precision`, not the raw per-track precision, so a
/// lower-precision ancestor that became dominant is respected.
pub fn compact(
    clip: &ClipContext,
    shell: &[RigidShellMetadata],
    formats: CompactionFormats,
) -> Vec<SubTrackCategories> {
    let segment = &clip.segments[0];
    let num_bones = clip.num_bones();
    let mut categories = vec![SubTrackCategories::default(); num_bones];

    for bone_index in 0..num_bones {
        let metadata = &clip.metadata[bone_index];
        let precision = shell[bone_index].precision;
        let shell_distance = shell[bone_index].local_shell_distance;
        let stream = &segment.bone_streams[bone_index];

        categories[bone_index].rotation = Some(classify_rotation(
            stream.rotations.iter().copied().map(|r| Transform::new(r, Vec3::ZERO, Vec3::ONE)),
            metadata.default_value.rotation,
            precision,
            shell_distance,
            formats.rotation_format.is_raw(),
        ));

        categories[bone_index].translation = Some(classify_vector(
            stream.translations.iter().copied(),
            metadata.default_value.translation,
            precision,
            shell_distance,
            formats.translation_format.is_raw(),
            VectorKind::Translation,
        ));

        categories[bone_index].scale = Some(classify_vector(
            stream.scales.iter().copied(),
            metadata.default_value.scale,
            precision,
            shell_distance,
            formats.scale_format.is_raw(),
            VectorKind::Scale,
        ));
    }

    categories
}

fn classify_rotation(
    samples: impl Iterator<Item = Transform> + Clone,
    default_rotation: glam::Quat,
    precision: f32,
    shell_distance: f32,
    exact_only: bool,
) -> Category {
    let first = match samples.clone().next() {
        Some(t) => t.rotation,
        None => return Category::Default,
    };

    let is_default = if exact_only {
        first == default_rotation
    } else {
        shell_metric::shell_error(
            Transform::new(first, Vec3::ZERO, Vec3::ONE),
            Transform::new(default_rotation, Vec3::ZERO, Vec3::ONE),
            shell_distance,
            false,
        ) <= precision
    };

    if is_default
        && samples
            .clone()
            .all(|t| rotation_within(t.rotation, default_rotation, precision, shell_distance, exact_only))
    {
        return Category::Default;
    }

    let is_constant = samples
        .clone()
        .all(|t| rotation_within(t.rotation, first, precision, shell_distance, exact_only));

    if is_constant {
        Category::Constant
    } else {
        Category::Animated
    }
}

fn rotation_within(
    candidate: glam::Quat,
    reference: glam::Quat,
    precision: f32,
    shell_distance: f32,
    exact_only: bool,
) -> bool {
    if exact_only {
        return candidate == reference;
    }
    shell_metric::shell_error(
        Transform::new(candidate, Vec3::ZERO, Vec3::ONE),
        Transform::new(reference, Vec3::ZERO, Vec3::ONE),
        shell_distance,
        false,
    ) <= precision
}

#[derive(Clone, Copy)]
enum VectorKind {
    Translation,
    Scale,
}

fn classify_vector(
    samples: impl Iterator<Item = Vec3> + Clone,
    default_value: Vec3,
    precision: f32,
    shell_distance: f32,
    exact_only: bool,
    kind: VectorKind,
) -> Category {
    let make_transform = |v: Vec3| match kind {
        VectorKind::Translation => Transform::new(glam::Quat::IDENTITY, v, Vec3::ONE),
        VectorKind::Scale => Transform::new(glam::Quat::IDENTITY, Vec3::ZERO, v),
    };

    let first = match samples.clone().next() {
        Some(v) => v,
        None => return Category::Default,
    };

    let within = |candidate: Vec3, reference: Vec3| -> bool {
        if exact_only {
            candidate == reference
        } else {
            shell_metric::shell_error(
                make_transform(candidate),
                make_transform(reference),
                shell_distance,
                matches!(kind, VectorKind::Scale),
            ) <= precision
        }
    };

    if within(first, default_value) && samples.clone().all(|v| within(v, default_value)) {
        return Category::Default;
    }

    if samples.clone().all(|v| within(v, first)) {
        Category::Constant
    } else {
        Category::Animated
    }
}

/// The already-chosen value for one sub-track at a given sample: the fixed
/// default/constant value, or the still-animated raw sample.
fn category_component<T: Copy>(category: Category, default: T, constant_first: T, animated: T) -> T {
    match category {
        Category::Default => default,
        Category::Constant => constant_first,
        Category::Animated => animated,
    }
}

/// Error-correction pass. Reprojects every
/// still-animated descendant's local sample so that, composed onto its
/// (possibly just-collapsed) ancestor, it still reproduces the original
/// object-space pose. Returns whether any sample actually changed, which
/// gates the caller's "re-extract ranges if any constant sample changed"
/// obligation.
pub fn correct_errors(clip: &mut ClipContext, categories: &[SubTrackCategories]) -> bool {
    let num_bones = clip.num_bones();
    let num_samples = clip.num_samples();
    if num_bones == 0 || num_samples == 0 {
        return false;
    }

    let mut any_changed = false;

    for sample_index in 0..num_samples {
        let mut raw_object = vec![Transform::IDENTITY; num_bones];
        let mut compacted_object = vec![Transform::IDENTITY; num_bones];

        for &bone_index in &clip.sorted_transforms_parent_first {
            let metadata = clip.metadata[bone_index];
            let cats = categories[bone_index];
            let raw_local = clip.segments[0].bone_streams[bone_index].get_sample(sample_index);

            raw_object[bone_index] = if metadata.parent_index != INVALID_PARENT_INDEX {
                raw_local.compose(&raw_object[metadata.parent_index as usize])
            } else {
                raw_local
            };

            let first_sample = clip.segments[0].bone_streams[bone_index].get_sample(0);
            let compacted_local = Transform::new(
                category_component(cats.rotation.unwrap_or(Category::Animated), metadata.default_value.rotation, first_sample.rotation, raw_local.rotation),
                category_component(cats.translation.unwrap_or(Category::Animated), metadata.default_value.translation, first_sample.translation, raw_local.translation),
                category_component(cats.scale.unwrap_or(Category::Animated), metadata.default_value.scale, first_sample.scale, raw_local.scale),
            );

            let parent_compacted = if metadata.parent_index != INVALID_PARENT_INDEX {
                compacted_object[metadata.parent_index as usize]
            } else {
                Transform::IDENTITY
            };

            let has_animated_component = cats.rotation == Some(Category::Animated)
                || cats.translation == Some(Category::Animated)
                || cats.scale == Some(Category::Animated);

            let final_local = if has_animated_component && metadata.parent_index != INVALID_PARENT_INDEX {
                let corrected = Transform::decompose(&raw_object[bone_index], &parent_compacted);
                let merged = Transform::new(
                    if cats.rotation == Some(Category::Animated) { corrected.rotation } else { compacted_local.rotation },
                    if cats.translation == Some(Category::Animated) { corrected.translation } else { compacted_local.translation },
                    if cats.scale == Some(Category::Animated) { corrected.scale } else { compacted_local.scale },
                );

                if merged != raw_local {
                    any_changed = true;
                    clip.segments[0].bone_streams[bone_index].set_sample(sample_index, merged);
                }
                merged
            } else {
                compacted_local
            };

            compacted_object[bone_index] = if metadata.parent_index != INVALID_PARENT_INDEX {
                final_local.compose(&parent_compacted)
            } else {
                final_local
            };
        }
    }

    any_changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{RawTransformTrack, TrackArray, TrackDescription, INVALID_PARENT_INDEX};

    fn flat_clip(samples: Vec<Transform>, precision: f32) -> ClipContext {
        let track = RawTransformTrack {
            description: TrackDescription {
                parent_index: INVALID_PARENT_INDEX,
                precision,
                shell_distance: 1.0,
                default_value: Transform::IDENTITY,
                output_index: 0,
            },
            samples,
        };
        let array = TrackArray::new(vec![track], 30.0, None).unwrap();
        ClipContext::from_track_array(&array, false)
    }

    #[test]
    fn identity_clip_is_all_default() {
        let clip = flat_clip(vec![Transform::IDENTITY; 4], 0.01);
        let shell = shell_metric::compute_clip_shell_distances(&clip, None);
        let formats = CompactionFormats {
            rotation_format: RotationFormat::QuatDropWVariable,
            translation_format: VectorFormat::Vector3Variable,
            scale_format: VectorFormat::Vector3Variable,
        };
        let categories = compact(&clip, &shell, formats);
        assert_eq!(categories[0].rotation, Some(Category::Default));
        assert_eq!(categories[0].translation, Some(Category::Default));
        assert_eq!(categories[0].scale, Some(Category::Default));
    }

    #[test]
    fn constant_non_default_rotation_is_constant_not_default() {
        let fixed = Transform::new(
            glam::Quat::from_xyzw(0.707, 0.0, 0.0, 0.707),
            Vec3::ZERO,
            Vec3::ONE,
        );
        let clip = flat_clip(vec![fixed; 4], 0.01);
        let shell = shell_metric::compute_clip_shell_distances(&clip, None);
        let formats = CompactionFormats {
            rotation_format: RotationFormat::QuatDropWVariable,
            translation_format: VectorFormat::Vector3Variable,
            scale_format: VectorFormat::Vector3Variable,
        };
        let categories = compact(&clip, &shell, formats);
        assert_eq!(categories[0].rotation, Some(Category::Constant));
    }

    #[test]
    fn varying_translation_is_animated() {
        let samples: Vec<Transform> = (0..10)
            .map(|i| Transform::new(glam::Quat::IDENTITY, Vec3::new(i as f32 * 0.1, 0.0, 0.0), Vec3::ONE))
            .collect();
        let clip = flat_clip(samples, 1e-4);
        let shell = shell_metric::compute_clip_shell_distances(&clip, None);
        let formats = CompactionFormats {
            rotation_format: RotationFormat::QuatDropWVariable,
            translation_format: VectorFormat::Vector3Variable,
            scale_format: VectorFormat::Vector3Variable,
        };
        let categories = compact(&clip, &shell, formats);
        assert_eq!(categories[0].translation, Some(Category::Animated));
    }

    #[test]
    fn correct_errors_reprojects_animated_child_after_parent_collapses() {
        use crate::track::TrackDescription;
        use glam::Quat;

        let parent_samples = vec![Transform::IDENTITY; 4];
        let child_samples: Vec<Transform> = (0..4)
            .map(|i| Transform::new(Quat::IDENTITY, Vec3::new(i as f32 * 0.01, 0.0, 0.0), Vec3::ONE))
            .collect();

        let parent = RawTransformTrack {
            description: TrackDescription {
                parent_index: INVALID_PARENT_INDEX,
                precision: 0.01,
                shell_distance: 1.0,
                default_value: Transform::IDENTITY,
                output_index: 0,
            },
            samples: parent_samples,
        };
        let child = RawTransformTrack {
            description: TrackDescription {
                parent_index: 0,
                precision: 1e-5,
                shell_distance: 1.0,
                default_value: Transform::IDENTITY,
                output_index: 1,
            },
            samples: child_samples,
        };

        let array = TrackArray::new(vec![parent, child], 30.0, None).unwrap();
        let mut clip = ClipContext::from_track_array(&array, false);
        let shell = shell_metric::compute_clip_shell_distances(&clip, None);
        let formats = CompactionFormats {
            rotation_format: RotationFormat::QuatDropWVariable,
            translation_format: VectorFormat::Vector3Variable,
            scale_format: VectorFormat::Vector3Variable,
        };
        let mut categories = compact(&clip, &shell, formats);
        // Force the parent to default and keep the child animated, the
        // scenario the correction pass exists for.
        categories[0].translation = Some(Category::Default);
        categories[1].translation = Some(Category::Animated);

        let changed = correct_errors(&mut clip, &categories);
        // The parent is already identity, so nothing actually needs to move.
        assert!(!changed);
    }
}
