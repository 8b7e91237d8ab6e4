//! Surface serialization and deserialization via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::SurfaceError;
use crate::surface::ScoreSurface;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for the serialized surface.
#[derive(serde::Serialize, serde::Deserialize)]
struct SurfaceEnvelope {
    /// Format version for compatibility checking.
    format_version: u32,
    /// Number of values in the surface.
    n_values: usize,
    /// The serialized surface.
    surface: ScoreSurface,
}

impl ScoreSurface {
    /// Save the surface to a binary file.
    ///
    /// Axis labels and coordinates are stored alongside the values.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SurfaceError::SerializeSurface`] | bincode encoding failed |
    /// | [`SurfaceError::WriteSurface`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SurfaceError> {
        let path = path.as_ref();

        let envelope = SurfaceEnvelope {
            format_version: FORMAT_VERSION,
            n_values: self.len(),
            surface: self.clone(),
        };

        let bytes = bincode::serialize(&envelope)
            .map_err(|e| SurfaceError::SerializeSurface { source: e })?;

        std::fs::write(path, &bytes).map_err(|e| SurfaceError::WriteSurface {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            variant = self.variant_name(),
            "surface saved"
        );

        Ok(())
    }

    /// Load a surface from a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SurfaceError::ReadSurface`] | file read failed |
    /// | [`SurfaceError::DeserializeSurface`] | bincode decoding failed, or the decoded surface is malformed |
    /// | [`SurfaceError::IncompatibleVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SurfaceError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| SurfaceError::ReadSurface {
            path: path.to_path_buf(),
            source: e,
        })?;

        let envelope: SurfaceEnvelope =
            bincode::deserialize(&bytes).map_err(|e| SurfaceError::DeserializeSurface {
                path: path.to_path_buf(),
                source: e,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(SurfaceError::IncompatibleVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        debug!(
            n_values = envelope.n_values,
            variant = envelope.surface.variant_name(),
            "surface loaded"
        );

        Ok(envelope.surface)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::grid::Axis;
    use crate::surface::{ArraySurface, SurfaceReduction, TableSurface};

    fn array() -> ScoreSurface {
        ArraySurface::new(
            vec![
                Axis::new("strike", vec![45.0, 135.0]),
                Axis::new("depth_in_m", vec![1000.0, 2000.0, 3000.0]),
            ],
            vec![0.1, 0.2, 0.3, 0.4, 0.5, 1.0 / 3.0],
        )
        .unwrap()
        .into()
    }

    #[test]
    fn round_trip_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("surface.bin");

        let surface = array();
        surface.save(&path).unwrap();
        let loaded = ScoreSurface::load(&path).unwrap();

        assert_eq!(loaded, surface);
        assert_eq!(
            loaded.reduce_min("depth_in_m").unwrap(),
            surface.reduce_min("depth_in_m").unwrap()
        );
    }

    #[test]
    fn round_trip_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.bin");

        let surface: ScoreSurface = TableSurface::new(
            vec!["mrr".to_string(), "origin".to_string()],
            vec![vec![1.0, 0.0], vec![-1.0, 1.0]],
            vec![0.25, 0.75],
        )
        .unwrap()
        .into();
        surface.save(&path).unwrap();
        assert_eq!(ScoreSurface::load(&path).unwrap(), surface);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.bin");
        let envelope = SurfaceEnvelope {
            format_version: FORMAT_VERSION + 1,
            n_values: 6,
            surface: array(),
        };
        std::fs::write(&path, bincode::serialize(&envelope).unwrap()).unwrap();
        let err = ScoreSurface::load(&path).unwrap_err();
        assert!(matches!(
            err,
            SurfaceError::IncompatibleVersion { expected: 1, found: 2, .. }
        ));
    }

    #[test]
    fn load_nonexistent_file_error() {
        let dir = TempDir::new().unwrap();
        let err = ScoreSurface::load(dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, SurfaceError::ReadSurface { .. }));
    }

    #[test]
    fn load_corrupt_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.bin");
        std::fs::write(&path, b"not a valid bincode file").unwrap();
        let err = ScoreSurface::load(&path).unwrap_err();
        assert!(matches!(err, SurfaceError::DeserializeSurface { .. }));
    }
}
