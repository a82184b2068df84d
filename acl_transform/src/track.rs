//! Raw transform tracks: the input to compression.

use acl_format::AdditiveFormat;

use crate::error::CompressionError;
use crate::transform::Transform;

/// Marks a track as stripped: it contributes to error measurement (through
/// its place in the hierarchy) but has no corresponding output slot.
pub const INVALID_OUTPUT_INDEX: u32 = u32::MAX;

/// Marks a track as having no parent.
pub const INVALID_PARENT_INDEX: u32 = u32::MAX;

/// Per-track metadata carried alongside its samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackDescription {
    pub parent_index: u32,
    /// Allowed object-space error, in linear units, on this bone's shell.
    pub precision: f32,
    /// Radius of the virtual rigid shell used to measure error for this bone.
    pub shell_distance: f32,
    /// Bind pose; substituted in for a "default" sub-track.
    pub default_value: Transform,
    /// Slot in the decompressed output, or [`INVALID_OUTPUT_INDEX`] to strip
    /// the track from the blob entirely.
    pub output_index: u32,
}

impl TrackDescription {
    pub fn is_stripped(&self) -> bool {
        self.output_index == INVALID_OUTPUT_INDEX
    }

    pub fn has_parent(&self) -> bool {
        self.parent_index != INVALID_PARENT_INDEX
    }
}

/// One raw track: a description plus its uniformly-sampled transform
/// sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTransformTrack {
    pub description: TrackDescription,
    pub samples: Vec<Transform>,
}

impl RawTransformTrack {
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }
}

/// A full clip: every bone's raw track, a shared sample rate, and an
/// optional additive relationship to a base clip.
#[derive(Debug, Clone)]
pub struct TrackArray {
    tracks: Vec<RawTransformTrack>,
    sample_rate: f32,
    additive_format: Option<AdditiveFormat>,
}

impl TrackArray {
    pub fn new(
        tracks: Vec<RawTransformTrack>,
        sample_rate: f32,
        additive_format: Option<AdditiveFormat>,
    ) -> Result<Self, CompressionError> {
        let array = Self {
            tracks,
            sample_rate,
            additive_format,
        };
        array.validate()?;
        Ok(array)
    }

    pub fn tracks(&self) -> &[RawTransformTrack] {
        &self.tracks
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn num_samples(&self) -> usize {
        self.tracks.first().map_or(0, RawTransformTrack::num_samples)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn duration(&self) -> f32 {
        if self.num_samples() <= 1 {
            0.0
        } else {
            (self.num_samples() - 1) as f32 / self.sample_rate
        }
    }

    pub fn additive_format(&self) -> Option<AdditiveFormat> {
        self.additive_format
    }

    /// Number of output tracks after stripping.
    pub fn num_output_tracks(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| !t.description.is_stripped())
            .count()
    }

    /// Validates the raw-track invariants: shared sample count and rate,
    /// no parent cycles, contiguous output indices.
    fn validate(&self) -> Result<(), CompressionError> {
        if self.tracks.is_empty() {
            return Err(CompressionError::NoTracks);
        }
        if self.num_samples() == 0 {
            return Err(CompressionError::NoSamples);
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(CompressionError::InvalidSampleRate(self.sample_rate));
        }

        let num_tracks = self.tracks.len();
        let num_samples = self.num_samples();

        for (track_index, track) in self.tracks.iter().enumerate() {
            if track.num_samples() != num_samples {
                return Err(CompressionError::NoSamples);
            }

            let parent_index = track.description.parent_index;
            if track.description.has_parent() {
                if parent_index as usize >= num_tracks {
                    return Err(CompressionError::InvalidParentIndex {
                        track_index,
                        parent_index: parent_index as usize,
                        num_tracks,
                    });
                }
                self.check_no_cycle(track_index)?;
            }

            for (sample_index, sample) in track.samples.iter().enumerate() {
                if !sample.is_finite() {
                    return Err(CompressionError::NonFiniteSample {
                        track_index,
                        sample_index,
                    });
                }
            }
        }

        self.check_output_indices()?;
        Ok(())
    }

    fn check_no_cycle(&self, track_index: usize) -> Result<(), CompressionError> {
        let mut visited = vec![false; self.tracks.len()];
        let mut current = track_index;
        loop {
            if visited[current] {
                return Err(CompressionError::CyclicHierarchy { track_index });
            }
            visited[current] = true;

            let parent = self.tracks[current].description.parent_index;
            if parent == INVALID_PARENT_INDEX {
                return Ok(());
            }
            current = parent as usize;
        }
    }

    fn check_output_indices(&self) -> Result<(), CompressionError> {
        let mut seen: Vec<Option<usize>> = Vec::new();
        for (track_index, track) in self.tracks.iter().enumerate() {
            let output_index = track.description.output_index;
            if output_index == INVALID_OUTPUT_INDEX {
                continue;
            }
            let output_index = output_index as usize;
            if output_index >= seen.len() {
                seen.resize(output_index + 1, None);
            }
            if let Some(first_track) = seen[output_index] {
                return Err(CompressionError::DuplicateOutputIndex {
                    output_index,
                    first_track,
                    second_track: track_index,
                });
            }
            seen[output_index] = Some(track_index);
        }

        for (output_index, owner) in seen.iter().enumerate() {
            if owner.is_none() {
                return Err(CompressionError::NonContiguousOutputIndices(output_index));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(parent_index: u32, output_index: u32, samples: Vec<Transform>) -> RawTransformTrack {
        RawTransformTrack {
            description: TrackDescription {
                parent_index,
                precision: 0.01,
                shell_distance: 1.0,
                default_value: Transform::IDENTITY,
                output_index,
            },
            samples,
        }
    }

    #[test]
    fn rejects_empty_track_array() {
        let err = TrackArray::new(vec![], 30.0, None).unwrap_err();
        assert!(matches!(err, CompressionError::NoTracks));
    }

    #[test]
    fn rejects_cyclic_hierarchy() {
        let samples = vec![Transform::IDENTITY; 2];
        let tracks = vec![
            track(1, 0, samples.clone()),
            track(0, 1, samples),
        ];
        let err = TrackArray::new(tracks, 30.0, None).unwrap_err();
        assert!(matches!(err, CompressionError::CyclicHierarchy { .. }));
    }

    #[test]
    fn rejects_non_contiguous_output_indices() {
        let samples = vec![Transform::IDENTITY; 2];
        let tracks = vec![track(INVALID_PARENT_INDEX, 0, samples.clone()), track(INVALID_PARENT_INDEX, 2, samples)];
        let err = TrackArray::new(tracks, 30.0, None).unwrap_err();
        assert!(matches!(
            err,
            CompressionError::NonContiguousOutputIndices(1)
        ));
    }

    #[test]
    fn accepts_stripped_tracks() {
        let samples = vec![Transform::IDENTITY; 2];
        let tracks = vec![
            track(INVALID_PARENT_INDEX, 0, samples.clone()),
            track(INVALID_PARENT_INDEX, INVALID_OUTPUT_INDEX, samples.clone()),
            track(INVALID_PARENT_INDEX, 1, samples),
        ];
        let array = TrackArray::new(tracks, 30.0, None).unwrap();
        assert_eq!(array.num_output_tracks(), 2);
    }
}
