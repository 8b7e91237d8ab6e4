//! End-to-end integration tests: JSON problem -> grid search -> artifacts -> read back.

use std::fs;

use quakefit_io::{EventName, GridSpec, ProblemReader, ResultWriter, TableReader};
use quakefit_misfit::{
    Force, GreensComponent, GreensTensor, GreensTensorList, MisfitEvaluation, Source, SourceKind,
};
use quakefit_search::{GridSearchConfig, ProfileMode, ScoreSurface, SurfaceReduction};
use quakefit_waveform::{Origin, Station, TraceHeader};
use serde_json::json;
use tempfile::TempDir;

const DEPTHS: [f64; 2] = [4_000.0, 9_000.0];

fn origins() -> Vec<Origin> {
    DEPTHS
        .iter()
        .map(|&d| Origin::new(0.0, 61.0, -150.0, d))
        .collect()
}

fn basis(station: usize, component: usize, j: usize, depth: usize) -> Vec<f64> {
    let arrival = 30.0 + 6.0 * station as f64 + 4.0 * depth as f64;
    let freq = 0.05 + 0.02 * j as f64 + 0.01 * component as f64;
    (0..120)
        .map(|i| {
            let t = i as f64 - arrival;
            (-t * t / 150.0).exp() * (t * freq).sin()
        })
        .collect()
}

fn greens(origins: &[Origin]) -> GreensTensorList {
    let mut list = GreensTensorList::default();
    for (k, origin) in origins.iter().enumerate() {
        for s in 0..3 {
            let name = format!("S{s}");
            let components = ["BHZ", "BHR", "BHT"]
                .iter()
                .enumerate()
                .map(|(c, ch)| {
                    GreensComponent::new(
                        TraceHeader::new("AK", &name, ch, 0.5),
                        (0..3).map(|j| basis(s, c, j, k)).collect(),
                    )
                    .unwrap()
                })
                .collect();
            list.push(
                GreensTensor::new(SourceKind::Force, origin.clone(), components)
                    .unwrap()
                    .with_station(Station::new("AK", &name, 62.0 + s as f64, -148.0)),
            );
        }
    }
    list
}

/// Write a two-band force problem whose data is the synthetic of `truth` at `DEPTHS[1]`.
fn write_problem(dir: &std::path::Path, truth: &Source) -> std::path::PathBuf {
    let origins = origins();
    let greens = greens(&origins);
    let data = greens.select(&origins[1]).get_synthetics(truth).unwrap();
    let problem = json!({
        "event": "synthetic_force",
        "origins": origins,
        "grid": {"type": "force_regular", "npts_per_axis": 4, "magnitudes_in_n": [1.0, 2.0]},
        "bands": [
            {
                "name": "body_waves",
                "misfit": {"time_shift_max": 0.0},
                "records": data.records(),
                "greens": greens,
            },
            {
                "name": "surface_waves",
                "misfit": {"norm": "l1", "time_shift_max": 1.0, "time_shift_groups": ["ZR", "T"]},
                "tags": ["units:m"],
                "records": data.records(),
                "greens": greens,
            }
        ]
    });
    let path = dir.join("problem.json");
    fs::write(&path, serde_json::to_string_pretty(&problem).unwrap()).unwrap();
    path
}

#[test]
fn search_round_trip() {
    let dir = TempDir::new().unwrap();

    // 1. Build the problem from a grid point so it is exactly recoverable
    let spec = GridSpec::ForceRegular {
        npts_per_axis: 4,
        magnitudes_in_n: vec![1.0, 2.0],
    };
    let grid = spec.build(0).unwrap();
    let truth = grid.get(13).unwrap();
    let problem_path = write_problem(dir.path(), &truth);

    // 2. Read
    let problem = ProblemReader::new(&problem_path).read().expect("problem should parse");
    assert_eq!(problem.event.as_str(), "synthetic_force");
    assert_eq!(problem.bands.len(), 2);
    assert_eq!(problem.grid, spec);
    assert_eq!(problem.bands[1].data.tags().len(), 1);

    // 3. Search
    let grid = problem.grid.build(0).unwrap();
    let result = GridSearchConfig::new()
        .with_workers(3)
        .unwrap()
        .search(&problem.bands, grid.as_ref(), &problem.origins)
        .unwrap();
    let best = result.best().unwrap();
    assert_eq!(best.source_index, 13);
    assert_eq!(best.origin_index, 1);

    // 4. Re-evaluate the best source and write the summary
    let (source, origin) = result.best_source(grid.as_ref()).unwrap();
    assert_eq!(source, truth);
    let evaluations: Vec<MisfitEvaluation> = problem
        .bands
        .iter()
        .map(|b| b.evaluate_annotated(&origin, &source).unwrap())
        .collect();
    let named: Vec<(&str, &MisfitEvaluation)> = problem
        .bands
        .iter()
        .map(|b| b.name.as_str())
        .zip(&evaluations)
        .collect();

    let writer = ResultWriter::new(&dir.path().join("out"), problem.event.clone()).unwrap();
    let summary_path = writer
        .write_search(problem.grid.name(), &result, &source, &named)
        .unwrap();
    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(summary["event"], "synthetic_force");
    assert_eq!(summary["grid"], "force_regular");
    assert_eq!(summary["n_evaluated"].as_u64().unwrap(), 32 * 2);
    assert_eq!(summary["best"]["source_index"], 13);
    assert_eq!(summary["best"]["origin"]["depth_in_m"], DEPTHS[1]);
    assert_eq!(summary["best"]["source"]["type"], "force");
    let bands = summary["bands"].as_array().unwrap();
    assert_eq!(bands.len(), 2);
    for band in bands {
        assert_eq!(band["n_compared"], 9);
        assert_eq!(band["traces"].as_array().unwrap().len(), 9);
        assert!(band["skipped"].as_array().unwrap().is_empty());
        assert!(band["misfit"].as_f64().unwrap().abs() < 1e-12);
        for trace in band["traces"].as_array().unwrap() {
            assert_eq!(trace["time_shift"], 0.0);
        }
    }

    let origins_path = writer.write_origins(&result).unwrap();
    let origins: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&origins_path).unwrap()).unwrap();
    assert_eq!(origins["best_origin_index"], 1);
    assert_eq!(origins["origins"][1]["source_index"], 13);

    // 5. Surface: JSON, CSV, and bincode all agree on the depth profile
    let surface = result.surface(grid.as_ref()).unwrap();
    let expected = surface.reduce_min("depth_in_m").unwrap();
    assert_eq!(expected.argmin(), Some(1));

    let json_path = writer.write_surface(&surface).unwrap();
    let content: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    let from_json: ScoreSurface = serde_json::from_value(content["surface"].clone()).unwrap();
    assert_eq!(from_json, surface);

    let csv_path = writer.write_table(&surface).unwrap();
    let table = TableReader::new(&csv_path).read().unwrap();
    assert_eq!(table.values(), surface.values());
    assert_eq!(table.reduce_min("depth_in_m").unwrap().values, expected.values);

    surface.save(writer.surface_path()).unwrap();
    let loaded = ScoreSurface::load(writer.surface_path()).unwrap();
    assert_eq!(loaded.reduce_min("depth_in_m").unwrap(), expected);

    // 6. Likelihood depth profile
    let sigma = 0.1;
    let profile = surface
        .profile("depth_in_m", ProfileMode::Likelihood, Some(sigma))
        .unwrap();
    let path = writer
        .write_profile(&profile, ProfileMode::Likelihood, Some(sigma))
        .unwrap();
    let content: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(content["best_coordinate"], DEPTHS[1]);
}

#[test]
fn event_name_drives_file_names() {
    let dir = TempDir::new().unwrap();
    let event = EventName::new("20090407201255351".into()).unwrap();
    let writer = ResultWriter::new(dir.path(), event).unwrap();
    assert_eq!(
        writer.surface_path(),
        dir.path().join("20090407201255351_surface.bin")
    );
}

#[test]
fn unstructured_grid_problem_gives_table_surface() {
    let dir = TempDir::new().unwrap();
    let truth = Source::from(Force::new([0.0, 1.0, 0.0]).unwrap());
    let problem_path = write_problem(dir.path(), &truth);

    let mut problem = ProblemReader::new(&problem_path).read().unwrap();
    problem.grid = GridSpec::Unstructured {
        sources: vec![
            Source::from(Force::new([1.0, 0.0, 0.0]).unwrap()),
            truth,
            Source::from(Force::new([0.0, 0.0, 1.0]).unwrap()),
        ],
    };
    let grid = problem.grid.build(0).unwrap();
    let result = GridSearchConfig::new()
        .search(&problem.bands, grid.as_ref(), &problem.origins)
        .unwrap();
    assert_eq!(result.best().map(|b| (b.source_index, b.origin_index)), Some((1, 1)));

    let surface = result.surface(grid.as_ref()).unwrap();
    let ScoreSurface::Table(table) = &surface else {
        panic!("unstructured grid should give a table surface");
    };
    assert_eq!(table.columns(), ["fr", "ft", "fp", "depth_in_m"]);
    assert!(surface.marginal("depth_in_m").is_err());
    let profile = surface
        .profile("depth_in_m", ProfileMode::Misfit, None)
        .unwrap();
    assert_eq!(profile.coordinates, DEPTHS.to_vec());
}
