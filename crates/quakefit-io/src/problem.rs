//! JSON problem reader.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use quakefit_misfit::{GreensTensorList, Misfit, Wavelet};
use quakefit_search::Band;
use quakefit_waveform::{Dataset, DatasetConfig, Origin, WaveformRecord};

use crate::domain::{EventName, GridSpec, Problem};
use crate::IoError;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ProblemRepr {
    event: String,
    origins: Vec<Origin>,
    #[serde(default)]
    wavelet: Option<Wavelet>,
    grid: GridSpec,
    #[serde(default = "default_warn_mixed_origins")]
    warn_mixed_origins: bool,
    bands: Vec<BandRepr>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BandRepr {
    name: String,
    #[serde(default)]
    misfit: Misfit,
    records: Vec<WaveformRecord>,
    greens: GreensTensorList,
    #[serde(default)]
    tags: Vec<String>,
}

fn default_warn_mixed_origins() -> bool {
    true
}

/// Reads an inversion problem from a JSON file.
///
/// Expected layout:
///
/// ```json
/// {
///   "event": "20090407201255351",
///   "origins": [{"time": 0.0, "latitude": 61.45, "longitude": -149.74, "depth_in_m": 33000.0}],
///   "wavelet": {"type": "trapezoid", "rise_time": 0.5, "half_duration": 1.0},
///   "grid": {"type": "double_couple_regular", "npts_per_axis": 10, "magnitudes": [4.5]},
///   "bands": [
///     {"name": "body_waves", "misfit": {"time_shift_max": 2.0}, "records": [...], "greens": [...]}
///   ]
/// }
/// ```
///
/// `wavelet`, `misfit`, `tags`, and `warn_mixed_origins` are optional.
/// When a wavelet is given, every band's Green's tensors are convolved
/// with it once here.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::JsonParse`] | Malformed JSON, unknown field, or invalid record or tensor |
/// | [`IoError::InvalidEventName`] | Event name outside `[a-zA-Z0-9_-]+` |
/// | [`IoError::InvalidProblem`] | No origins, no bands, duplicate band names, or a band without records or Green's tensors |
/// | [`IoError::Dataset`] | A band's records cannot be appended, or a tag is empty |
/// | [`IoError::Misfit`] | The wavelet is invalid |
pub struct ProblemReader {
    path: PathBuf,
}

impl ProblemReader {
    /// Create a new reader for the given JSON file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the problem file.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Problem, IoError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let repr: ProblemRepr = serde_json::from_str(&text).map_err(|e| IoError::JsonParse {
            path: self.path.clone(),
            line: e.line(),
            column: e.column(),
            source: e,
        })?;

        let event = EventName::new(repr.event)?;
        if repr.origins.is_empty() {
            return Err(self.invalid("no origins"));
        }
        if repr.bands.is_empty() {
            return Err(self.invalid("no bands"));
        }
        if let Some(wavelet) = &repr.wavelet {
            wavelet.validate()?;
        }
        let config = DatasetConfig::new().with_warn_mixed_origins(repr.warn_mixed_origins);

        let mut bands: Vec<Band> = Vec::with_capacity(repr.bands.len());
        for band in repr.bands {
            if bands.iter().any(|b| b.name == band.name) {
                return Err(self.invalid(&format!("band {} appears twice", band.name)));
            }
            if band.records.is_empty() {
                return Err(self.invalid(&format!("band {} has no records", band.name)));
            }
            if band.greens.is_empty() {
                return Err(self.invalid(&format!("band {} has no Green's tensors", band.name)));
            }
            let dataset_err = |source| IoError::Dataset {
                band: band.name.clone(),
                source,
            };

            let mut data = Dataset::new().with_id(event.as_str()).with_config(config);
            for tag in &band.tags {
                data.tag_add(tag).map_err(dataset_err)?;
            }
            for record in band.records {
                data.append(record).map_err(dataset_err)?;
            }

            let mut greens = band.greens;
            for origin in &repr.origins {
                if greens.select(origin).is_empty() {
                    warn!(
                        band = %band.name,
                        depth_in_m = origin.depth_in_m,
                        "no Green's tensors for origin"
                    );
                }
            }
            if let Some(wavelet) = &repr.wavelet {
                greens.convolve(wavelet);
            }
            debug!(
                band = %band.name,
                n_records = data.len(),
                n_greens = greens.len(),
                "band loaded"
            );
            bands.push(Band::new(&band.name, data, greens, band.misfit));
        }

        info!(
            event = %event,
            n_bands = bands.len(),
            n_origins = repr.origins.len(),
            grid = repr.grid.name(),
            "problem loaded"
        );

        Ok(Problem {
            event,
            origins: repr.origins,
            bands,
            grid: repr.grid,
        })
    }

    fn invalid(&self, reason: &str) -> IoError {
        IoError::InvalidProblem {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_json(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    const ORIGIN: &str =
        r#"{"time": 0.0, "latitude": 0.0, "longitude": 0.0, "depth_in_m": 10000.0}"#;

    fn header(channel: &str) -> String {
        format!(
            r#"{{"network": "XX", "station": "A", "location": "", "channel": "{channel}", "starttime": 0.0, "delta": 0.5}}"#
        )
    }

    fn problem(event: &str, bands: &str) -> String {
        format!(
            r#"{{"event": "{event}", "origins": [{ORIGIN}],
                "grid": {{"type": "force_regular", "npts_per_axis": 2, "magnitudes_in_n": [1.0]}},
                "bands": {bands}}}"#
        )
    }

    fn band(name: &str) -> String {
        let z = header("BHZ");
        format!(
            r#"{{"name": "{name}", "tags": ["units:m"],
                "misfit": {{"norm": "l1", "time_shift_max": 1.0}},
                "records": [{{"traces": [{{"header": {z}, "data": [0.0, 1.0, 0.0, -1.0]}}]}}],
                "greens": [{{"kind": "force", "origin": {ORIGIN}, "components": [
                    {{"header": {z}, "basis": [[0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0], [1.0, 0.0, 0.0, 0.0]]}}
                ]}}]}}"#
        )
    }

    #[test]
    fn read_valid_problem() {
        let json = problem("ev_1", &format!("[{}, {}]", band("body"), band("surface")));
        let f = write_json(&json);
        let p = ProblemReader::new(f.path()).read().unwrap();
        assert_eq!(p.event.as_str(), "ev_1");
        assert_eq!(p.origins.len(), 1);
        assert_eq!(p.bands.len(), 2);
        assert_eq!(p.bands[0].name, "body");
        assert_eq!(p.bands[0].data.id(), Some("ev_1"));
        assert!(p.bands[0].data.tags().contains("units:m"));
        assert_eq!(p.bands[0].misfit.time_shift_max(), 1.0);
        assert_eq!(p.grid.name(), "force_regular");
    }

    #[test]
    fn wavelet_is_applied_to_greens() {
        let plain = problem("ev", &format!("[{}]", band("b")));
        let with_wavelet = plain.replacen(
            "\"grid\"",
            r#""wavelet": {"type": "triangle", "half_duration": 1.0}, "grid""#,
            1,
        );
        let a = ProblemReader::new(write_json(&plain).path()).read().unwrap();
        let b = ProblemReader::new(write_json(&with_wavelet).path())
            .read()
            .unwrap();
        assert_ne!(a.bands[0].greens, b.bands[0].greens);
    }

    #[test]
    fn missing_file() {
        let err = ProblemReader::new(Path::new("/nonexistent/problem_abc123.json"))
            .read()
            .unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }

    #[test]
    fn malformed_json() {
        let f = write_json("{\"event\": \"ev\", ");
        let err = ProblemReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::JsonParse { .. }));
    }

    #[test]
    fn unknown_field_rejected() {
        let json = problem("ev", &format!("[{}]", band("b")))
            .replacen("\"grid\"", "\"gird\": 1, \"grid\"", 1);
        let err = ProblemReader::new(write_json(&json).path()).read().unwrap_err();
        assert!(matches!(err, IoError::JsonParse { .. }));
    }

    #[test]
    fn invalid_event_name() {
        let json = problem("bad name", &format!("[{}]", band("b")));
        let err = ProblemReader::new(write_json(&json).path()).read().unwrap_err();
        assert!(matches!(err, IoError::InvalidEventName { .. }));
    }

    #[test]
    fn empty_and_duplicate_bands() {
        let err = ProblemReader::new(write_json(&problem("ev", "[]")).path())
            .read()
            .unwrap_err();
        assert!(matches!(err, IoError::InvalidProblem { .. }));

        let json = problem("ev", &format!("[{}, {}]", band("b"), band("b")));
        let err = ProblemReader::new(write_json(&json).path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::InvalidProblem { ref reason, .. } if reason.contains("twice")
        ));
    }

    #[test]
    fn invalid_wavelet() {
        let json = problem("ev", &format!("[{}]", band("b"))).replacen(
            "\"grid\"",
            r#""wavelet": {"type": "triangle", "half_duration": -1.0}, "grid""#,
            1,
        );
        let err = ProblemReader::new(write_json(&json).path()).read().unwrap_err();
        assert!(matches!(err, IoError::Misfit(_)));
    }
}
