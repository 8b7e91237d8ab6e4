//! JSON and CSV result writer for grid-search outputs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use quakefit_misfit::{MisfitEvaluation, Source};
use quakefit_search::{Profile, ProfileMode, ScoreSurface, SearchResult};
use quakefit_waveform::Origin;

use crate::domain::EventName;
use crate::IoError;

/// Writes search summaries, surfaces, and profiles for one event.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{event}_search.json`, `{event}_surface.json`,
/// `{event}_surface.csv`, `{event}_origins.json`, and
/// `{event}_profile_{mode}.json`.
pub struct ResultWriter {
    output_dir: PathBuf,
    event: EventName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and event name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), event = %event))]
    pub fn new(output_dir: &Path, event: EventName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            event,
        })
    }

    /// Write the search summary to `{event}_search.json`.
    ///
    /// `bands` pairs each band name with the annotated re-evaluation of the
    /// best source; per-trace time shifts, misfits, and correlations are
    /// taken from its synthetics.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_search(
        &self,
        grid: &str,
        result: &SearchResult,
        best_source: &Source,
        bands: &[(&str, &MisfitEvaluation)],
    ) -> Result<PathBuf, IoError> {
        let path = self.path("search.json");

        let best = result.best().map(|b| BestEntry {
            index: b.index,
            source_index: b.source_index,
            origin_index: b.origin_index,
            score: b.score,
            source: best_source,
            magnitude: best_source.magnitude(),
            origin: &result.origins()[b.origin_index],
        });

        let bands: Vec<BandEntry> = bands
            .iter()
            .map(|&(name, eval)| BandEntry {
                name,
                misfit: eval.total,
                n_compared: eval.n_compared,
                skipped: eval
                    .skipped
                    .iter()
                    .map(|s| TraceEntry::bare(s.id.to_string(), &s.channel))
                    .collect(),
                traces: eval
                    .synthetics
                    .iter()
                    .flat_map(|record| {
                        let id = record.id().to_string();
                        record
                            .iter()
                            .filter(|t| t.attributes().misfit.is_some())
                            .map(move |t| {
                                let a = t.attributes();
                                TraceEntry {
                                    id: id.clone(),
                                    channel: t.channel(),
                                    time_shift: a.time_shift,
                                    misfit: a.misfit,
                                    max_cc: a.max_cc,
                                }
                            })
                    })
                    .collect(),
            })
            .collect();

        let artifact = SearchArtifact {
            event: self.event.as_str(),
            grid,
            n_sources: result.n_sources(),
            n_origins: result.n_origins(),
            n_evaluated: result.len(),
            best,
            bands,
        };

        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "search summary written");
        Ok(path)
    }

    /// Write the full score surface to `{event}_surface.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_surface(&self, surface: &ScoreSurface) -> Result<PathBuf, IoError> {
        let path = self.path("surface.json");
        let artifact = SurfaceArtifact {
            event: self.event.as_str(),
            surface,
        };
        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), n_values = surface.len(), "surface written");
        Ok(path)
    }

    /// Write the surface as a CSV table to `{event}_surface.csv`.
    ///
    /// One row per grid point: parameter columns followed by `misfit`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::CsvWrite`] | the file cannot be created or a row cannot be written |
    #[instrument(skip_all)]
    pub fn write_table(&self, surface: &ScoreSurface) -> Result<PathBuf, IoError> {
        let path = self.path("surface.csv");
        let csv_err = |source| IoError::CsvWrite {
            path: path.clone(),
            source,
        };
        let table = surface.to_table();

        let mut wtr = csv::Writer::from_path(&path).map_err(csv_err)?;
        let mut header: Vec<&str> = table.columns().iter().map(String::as_str).collect();
        header.push("misfit");
        wtr.write_record(&header).map_err(csv_err)?;
        for (row, value) in table.rows().iter().zip(table.values()) {
            let cells = row.iter().chain(std::iter::once(value)).map(f64::to_string);
            wtr.write_record(cells).map_err(csv_err)?;
        }
        wtr.flush().map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), n_rows = table.rows().len(), "surface table written");
        Ok(path)
    }

    /// Write the best fit at every candidate origin to `{event}_origins.json`.
    ///
    /// Each entry carries the origin's depth and lateral offsets, so a
    /// lateral origin grid can be read back as an x/y misfit map.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(n_origins = result.n_origins()))]
    pub fn write_origins(&self, result: &SearchResult) -> Result<PathBuf, IoError> {
        let path = self.path("origins.json");
        let fits = result.origin_fits();
        let scores: Vec<f64> = fits.iter().map(|f| f.score).collect();
        let artifact = OriginsArtifact {
            event: self.event.as_str(),
            best_origin_index: quakefit_search::argmin(&scores),
            origins: fits
                .iter()
                .map(|fit| OriginEntry {
                    origin_index: fit.origin_index,
                    origin: &result.origins()[fit.origin_index],
                    source_index: fit.source_index,
                    misfit: fit.score,
                })
                .collect(),
        };
        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "origin fits written");
        Ok(path)
    }

    /// Write a one-dimensional profile to `{event}_profile_{mode}.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(axis = %profile.axis, mode = mode.as_str()))]
    pub fn write_profile(
        &self,
        profile: &Profile,
        mode: ProfileMode,
        sigma: Option<f64>,
    ) -> Result<PathBuf, IoError> {
        let path = self.path(&format!("profile_{}.json", mode.as_str()));
        let best = profile.argmin();
        let artifact = ProfileArtifact {
            event: self.event.as_str(),
            mode,
            sigma,
            axis: &profile.axis,
            coordinates: &profile.coordinates,
            values: &profile.values,
            arg_indices: &profile.arg_indices,
            best_coordinate: match mode {
                ProfileMode::Misfit => best.map(|i| profile.coordinates[i]),
                _ => argmax(&profile.values).map(|i| profile.coordinates[i]),
            },
        };
        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "profile written");
        Ok(path)
    }

    /// Return the path where the binary surface should be saved.
    ///
    /// Does not write anything; just computes `{output_dir}/{event}_surface.bin`.
    #[must_use]
    pub fn surface_path(&self) -> PathBuf {
        self.path("surface.bin")
    }

    fn path(&self, suffix: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{suffix}", self.event.as_str()))
    }

    fn write_json<T: Serialize>(&self, path: &Path, artifact: &T) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::JsonEncode {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, &json).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_nan() && best.is_none_or(|(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct SearchArtifact<'a> {
    event: &'a str,
    grid: &'a str,
    n_sources: usize,
    n_origins: usize,
    n_evaluated: usize,
    best: Option<BestEntry<'a>>,
    bands: Vec<BandEntry<'a>>,
}

#[derive(Serialize)]
struct BestEntry<'a> {
    index: usize,
    source_index: usize,
    origin_index: usize,
    score: f64,
    source: &'a Source,
    magnitude: Option<f64>,
    origin: &'a Origin,
}

#[derive(Serialize)]
struct BandEntry<'a> {
    name: &'a str,
    misfit: f64,
    n_compared: usize,
    skipped: Vec<TraceEntry<'a>>,
    traces: Vec<TraceEntry<'a>>,
}

#[derive(Serialize)]
struct TraceEntry<'a> {
    id: String,
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_shift: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    misfit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_cc: Option<f64>,
}

impl<'a> TraceEntry<'a> {
    fn bare(id: String, channel: &'a str) -> Self {
        Self {
            id,
            channel,
            time_shift: None,
            misfit: None,
            max_cc: None,
        }
    }
}

#[derive(Serialize)]
struct SurfaceArtifact<'a> {
    event: &'a str,
    surface: &'a ScoreSurface,
}

#[derive(Serialize)]
struct OriginsArtifact<'a> {
    event: &'a str,
    best_origin_index: Option<usize>,
    origins: Vec<OriginEntry<'a>>,
}

#[derive(Serialize)]
struct OriginEntry<'a> {
    origin_index: usize,
    origin: &'a Origin,
    source_index: Option<usize>,
    misfit: f64,
}

#[derive(Serialize)]
struct ProfileArtifact<'a> {
    event: &'a str,
    mode: ProfileMode,
    sigma: Option<f64>,
    axis: &'a str,
    coordinates: &'a [f64],
    values: &'a [f64],
    arg_indices: &'a [Option<usize>],
    best_coordinate: Option<f64>,
}

#[cfg(test)]
mod tests {
    use quakefit_search::{ArraySurface, Axis, SurfaceReduction, TableSurface};
    use tempfile::TempDir;

    use super::*;

    fn surface() -> ScoreSurface {
        ArraySurface::new(
            vec![
                Axis::new("strike", vec![90.0, 270.0]),
                Axis::new("depth_in_m", vec![1000.0, 2000.0]),
            ],
            vec![4.0, 3.0, 2.0, 1.0],
        )
        .unwrap()
        .into()
    }

    fn writer(dir: &Path, event: &str) -> ResultWriter {
        ResultWriter::new(dir, EventName::new(event.into()).unwrap()).unwrap()
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn write_surface_json_structure() {
        let dir = TempDir::new().unwrap();
        let path = writer(dir.path(), "ev1").write_surface(&surface()).unwrap();
        assert_eq!(path, dir.path().join("ev1_surface.json"));

        let content = read_json(&path);
        assert_eq!(content["event"], "ev1");
        let axes = content["surface"]["array"]["axes"].as_array().unwrap();
        assert_eq!(axes.len(), 2);
        assert_eq!(axes[1]["name"], "depth_in_m");
        assert_eq!(content["surface"]["array"]["values"].as_array().unwrap().len(), 4);

        let back: ScoreSurface = serde_json::from_value(content["surface"].clone()).unwrap();
        assert_eq!(back, surface());
    }

    #[test]
    fn write_table_has_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = writer(dir.path(), "ev2").write_table(&surface()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "strike,depth_in_m,misfit");
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2], "90,2000,3");
    }

    #[test]
    fn write_profile_reports_best_coordinate() {
        let dir = TempDir::new().unwrap();
        let w = writer(dir.path(), "ev3");
        let s = surface();

        let misfit = s.reduce_min("depth_in_m").unwrap();
        let path = w.write_profile(&misfit, ProfileMode::Misfit, None).unwrap();
        assert!(path.ends_with("ev3_profile_misfit.json"));
        let content = read_json(&path);
        assert_eq!(content["mode"], "misfit");
        assert_eq!(content["best_coordinate"], 2000.0);
        assert!(content["sigma"].is_null());

        let likelihood = s
            .profile("depth_in_m", ProfileMode::Likelihood, Some(1.0))
            .unwrap();
        let path = w
            .write_profile(&likelihood, ProfileMode::Likelihood, Some(1.0))
            .unwrap();
        let content = read_json(&path);
        assert_eq!(content["best_coordinate"], 2000.0);
        assert_eq!(content["sigma"], 1.0);
    }

    #[test]
    fn table_surface_written_as_is() {
        let dir = TempDir::new().unwrap();
        let table: ScoreSurface = TableSurface::new(
            vec!["fr".into(), "ft".into(), "fp".into(), "origin".into()],
            vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]],
            vec![0.5, 0.25],
        )
        .unwrap()
        .into();
        let path = writer(dir.path(), "ev4").write_table(&table).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("fr,ft,fp,origin,misfit\n1,0,0,0,0.5\n"));
    }

    #[test]
    fn creates_output_dir_and_names_binary() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested").join("deep");
        let w = writer(&nested, "ev5");
        assert!(nested.is_dir());
        assert_eq!(w.surface_path(), nested.join("ev5_surface.bin"));
    }

    #[test]
    fn write_origins_lists_lateral_offsets() {
        let dir = TempDir::new().unwrap();
        let base = Origin::new(0.0, 61.0, -150.0, 10_000.0);
        let origins = vec![base.with_offsets(-1000.0, 0.0), base.with_offsets(0.0, 1000.0)];
        // Two sources: origin 0 scores {3, 2}, origin 1 scores {4, 1}.
        let result = SearchResult::new(vec![3.0, 4.0, 2.0, 1.0], 2, origins);

        let path = writer(dir.path(), "ev6").write_origins(&result).unwrap();
        assert_eq!(path, dir.path().join("ev6_origins.json"));
        let content = read_json(&path);
        assert_eq!(content["best_origin_index"], 1);
        let entries = content["origins"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["origin"]["offset_x_in_m"], -1000.0);
        assert_eq!(entries[0]["source_index"], 1);
        assert_eq!(entries[0]["misfit"], 2.0);
        assert_eq!(entries[1]["origin"]["offset_y_in_m"], 1000.0);
        assert_eq!(entries[1]["misfit"], 1.0);
    }

    #[test]
    fn argmax_skips_nan() {
        assert_eq!(argmax(&[f64::NAN, 1.0, 3.0, 3.0]), Some(2));
        assert_eq!(argmax(&[f64::NAN]), None);
    }
}
