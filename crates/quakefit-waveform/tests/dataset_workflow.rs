//! Integration tests: records deserialized from JSON -> Dataset -> processing.

use quakefit_waveform::{Dataset, Origin, Station, StationId, WaveformRecord};

const RECORDS_JSON: &str = r#"[
  {
    "traces": [
      {"header": {"network": "AK", "station": "BIGB", "location": "", "channel": "BHZ", "starttime": 0.0, "delta": 0.5}, "data": [0.0, 1.0, -3.0, 0.5]},
      {"header": {"network": "AK", "station": "BIGB", "location": "", "channel": "BHR", "starttime": 0.0, "delta": 0.5}, "data": [0.0, 2.0, -1.0, 0.0], "weight": 0.0}
    ],
    "station": {"network": "AK", "station": "BIGB", "latitude": 61.0, "longitude": -149.0},
    "origin": {"time": 0.0, "latitude": 61.45, "longitude": -149.74, "depth_in_m": 33000.0}
  },
  {
    "traces": [
      {"header": {"network": "AK", "station": "COLA", "location": "", "channel": "BHZ", "starttime": 0.0, "delta": 0.5}, "data": [0.0, -2.5, 2.0, 0.0]}
    ],
    "station": {"network": "AK", "station": "COLA", "latitude": 64.87, "longitude": -147.86},
    "origin": {"time": 0.0, "latitude": 61.45, "longitude": -149.74, "depth_in_m": 33000.0}
  }
]"#;

fn load() -> Dataset {
    let records: Vec<WaveformRecord> =
        serde_json::from_str(RECORDS_JSON).expect("fixture should parse");
    Dataset::from_records(records)
        .expect("records are well formed")
        .with_id("20090407201255351")
}

#[test]
fn deserialized_records_get_geometry() {
    let dataset = load();
    assert_eq!(dataset.len(), 2);
    for record in &dataset {
        let distance = record.distance_in_m().expect("station and origin present");
        assert!(distance > 0.0);
        let azimuth = record.azimuth().unwrap();
        assert!((0.0..360.0).contains(&azimuth));
    }
    let bigb = dataset.get_by_id(&StationId::new("AK", "BIGB", "")).unwrap();
    let cola = dataset.get_by_id(&StationId::new("AK", "COLA", "")).unwrap();
    assert!(bigb.distance_in_m() < cola.distance_in_m());
}

#[test]
fn max_ignores_zero_weight_component() {
    let dataset = load();
    assert_eq!(dataset.max(), 3.0);
}

#[test]
fn select_then_map_with_station_metadata() {
    let dataset = load();
    let origin = Origin::new(0.0, 61.45, -149.74, 33_000.0);
    let selected = dataset.select(Some(&origin), None).unwrap();
    assert_eq!(selected.len(), 2);

    let stations: Vec<Station> = selected
        .get_stations()
        .into_iter()
        .map(|s| s.cloned().expect("station present"))
        .collect();
    let processed = selected
        .map(&stations, |mut record, station| {
            record.tag_add(&format!("station:{}", station.station));
            record
        })
        .unwrap();

    assert_eq!(processed.id(), Some("20090407201255351"));
    let values: Vec<&str> = processed
        .iter()
        .map(|r| r.tag_value("station").unwrap())
        .collect();
    assert_eq!(values, vec!["BIGB", "COLA"]);
    assert!(selected.iter().all(|r| r.tag_value("station").is_none()));
}

#[test]
fn sort_by_azimuth_orders_keyed_records() {
    let mut dataset = load();
    dataset.sort_by_azimuth(false);
    let azimuths: Vec<f64> = dataset.iter().filter_map(WaveformRecord::azimuth).collect();
    assert!(azimuths.windows(2).all(|w| w[0] <= w[1]));
}
