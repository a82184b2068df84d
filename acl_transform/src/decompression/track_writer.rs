//! Consumer-provided output sink for decompressed poses.
//!
//! A "default" sub-track stores nothing in the blob at all -- its value is
//! whatever the consumer's own bind pose says it should be. `decompress_tracks`/
//! `decompress_track` ask the writer for that value through the
//! `get_variable_default_*` hooks below; a writer that doesn't override them
//! gets the format's built-in fallback (identity rotation, zero translation,
//! and a scale of `1.0` or `0.0` depending on
//! [`acl_format::TracksHeaderFlags::default_scale_is_one`]).
use glam::{Quat, Vec3};

pub trait TrackWriter {
    fn write_rotation(&mut self, track_index: usize, value: Quat);
    fn write_translation(&mut self, track_index: usize, value: Vec3);
    fn write_scale(&mut self, track_index: usize, value: Vec3);

    /// Skips every rotation write -- a writer that only consumes
    /// translations can save the decode work entirely.
    fn skip_rotations(&self) -> bool {
        false
    }

    fn skip_translations(&self) -> bool {
        false
    }

    fn skip_scales(&self) -> bool {
        false
    }

    fn get_variable_default_rotation(&self, track_index: usize) -> Option<Quat> {
        let _ = track_index;
        None
    }

    fn get_variable_default_translation(&self, track_index: usize) -> Option<Vec3> {
        let _ = track_index;
        None
    }

    fn get_variable_default_scale(&self, track_index: usize) -> Option<Vec3> {
        let _ = track_index;
        None
    }
}

/// A plain `Vec`-backed writer, useful for tests and for callers that just
/// want a pose snapshot rather than to stream into their own skeleton buffer.
#[derive(Debug, Clone)]
pub struct PoseBuffer {
    pub rotations: Vec<Quat>,
    pub translations: Vec<Vec3>,
    pub scales: Vec<Vec3>,
}

impl PoseBuffer {
    pub fn new(num_tracks: usize) -> Self {
        Self {
            rotations: vec![Quat::IDENTITY; num_tracks],
            translations: vec![Vec3::ZERO; num_tracks],
            scales: vec![Vec3::ONE; num_tracks],
        }
    }
}

impl TrackWriter for PoseBuffer {
    fn write_rotation(&mut self, track_index: usize, value: Quat) {
        self.rotations[track_index] = value;
    }

    fn write_translation(&mut self, track_index: usize, value: Vec3) {
        self.translations[track_index] = value;
    }

    fn write_scale(&mut self, track_index: usize, value: Vec3) {
        self.scales[track_index] = value;
    }
}
