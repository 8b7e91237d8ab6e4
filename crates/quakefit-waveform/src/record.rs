//! Single-station, multi-component waveform records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::DatasetError;
use crate::geodesy::distance_azimuth;
use crate::metadata::{Origin, Station, StationId};
use crate::trace::{component_of, Trace};

/// All components recorded at one station, with attached metadata.
///
/// The identifier is derived from the station metadata when present and
/// from the first trace header otherwise. Distance and azimuth are derived
/// whenever both station and origin are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordRepr")]
pub struct WaveformRecord {
    id: StationId,
    traces: Vec<Trace>,
    station: Option<Station>,
    origin: Option<Origin>,
    distance_in_m: Option<f64>,
    azimuth: Option<f64>,
    back_azimuth: Option<f64>,
    tags: BTreeSet<String>,
}

#[derive(Deserialize)]
struct RecordRepr {
    traces: Vec<Trace>,
    #[serde(default)]
    station: Option<Station>,
    #[serde(default)]
    origin: Option<Origin>,
    #[serde(default)]
    tags: BTreeSet<String>,
}

impl TryFrom<RecordRepr> for WaveformRecord {
    type Error = DatasetError;

    fn try_from(repr: RecordRepr) -> Result<Self, Self::Error> {
        let mut record = Self::new(repr.traces)?;
        record.station = repr.station;
        record.origin = repr.origin;
        record.tags = repr.tags;
        record.identify();
        record.update_geometry();
        Ok(record)
    }
}

impl WaveformRecord {
    /// Create a record from component traces recorded at one station.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::MalformedRecord`] if `traces` is empty or the
    /// traces disagree on network, station, or location.
    pub fn new(traces: Vec<Trace>) -> Result<Self, DatasetError> {
        let Some(first) = traces.first() else {
            return Err(DatasetError::MalformedRecord {
                id: "?".to_string(),
                reason: "record has no traces".to_string(),
            });
        };
        let h = first.header();
        let id = StationId::new(&h.network, &h.station, &h.location);
        check_trace_identity(&id, &traces)?;
        Ok(Self {
            id,
            traces,
            station: None,
            origin: None,
            distance_in_m: None,
            azimuth: None,
            back_azimuth: None,
            tags: BTreeSet::new(),
        })
    }

    /// Attach station metadata and return the record.
    #[must_use]
    pub fn with_station(mut self, station: Station) -> Self {
        self.set_station(station);
        self
    }

    /// Attach origin metadata and return the record.
    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.set_origin(origin);
        self
    }

    /// Attach station metadata, refreshing the identifier and derived geometry.
    pub fn set_station(&mut self, station: Station) {
        self.station = Some(station);
        self.identify();
        self.update_geometry();
    }

    /// Attach origin metadata, refreshing the derived geometry.
    pub fn set_origin(&mut self, origin: Origin) {
        self.origin = Some(origin);
        self.update_geometry();
    }

    /// Recompute the identifier from the station metadata or first trace.
    pub(crate) fn identify(&mut self) {
        self.id = match (&self.station, self.traces.first()) {
            (Some(station), _) => station.id(),
            (None, Some(trace)) => {
                let h = trace.header();
                StationId::new(&h.network, &h.station, &h.location)
            }
            (None, None) => self.id.clone(),
        };
    }

    /// Recompute distance and azimuths when both station and origin are present.
    pub(crate) fn update_geometry(&mut self) {
        match (&self.station, &self.origin) {
            (Some(station), Some(origin)) => {
                let da = distance_azimuth(
                    origin.latitude,
                    origin.longitude,
                    station.latitude,
                    station.longitude,
                );
                self.distance_in_m = Some(da.distance_in_m);
                self.azimuth = Some(da.azimuth);
                self.back_azimuth = Some(da.back_azimuth);
            }
            _ => {
                self.distance_in_m = None;
                self.azimuth = None;
                self.back_azimuth = None;
            }
        }
    }

    /// Validate that the record is still a well-formed station bundle.
    pub(crate) fn validate(&self) -> Result<(), DatasetError> {
        let Some(first) = self.traces.first() else {
            return Err(DatasetError::MalformedRecord {
                id: self.id.to_string(),
                reason: "record has no traces".to_string(),
            });
        };
        let h = first.header();
        check_trace_identity(&StationId::new(&h.network, &h.station, &h.location), &self.traces)
    }

    /// Return the station identifier.
    #[must_use]
    pub fn id(&self) -> &StationId {
        &self.id
    }

    /// Return the component traces in order.
    #[must_use]
    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Return the component traces for in-place modification.
    pub fn traces_mut(&mut self) -> &mut [Trace] {
        &mut self.traces
    }

    /// Iterate over the component traces.
    pub fn iter(&self) -> std::slice::Iter<'_, Trace> {
        self.traces.iter()
    }

    /// Append a trace recorded at the same station.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::MalformedRecord`] if the trace belongs to a
    /// different network, station, or location.
    pub fn push_trace(&mut self, trace: Trace) -> Result<(), DatasetError> {
        if let Some(first) = self.traces.first() {
            let h = first.header();
            let id = StationId::new(&h.network, &h.station, &h.location);
            check_trace_identity(&id, std::slice::from_ref(&trace))?;
        }
        self.traces.push(trace);
        Ok(())
    }

    /// Keep only the traces for which `keep` returns true.
    pub fn retain_traces<F>(&mut self, keep: F)
    where
        F: FnMut(&Trace) -> bool,
    {
        self.traces.retain(keep);
    }

    /// Return the first trace whose component matches `component` (case-insensitive).
    #[must_use]
    pub fn trace(&self, component: char) -> Option<&Trace> {
        let wanted = component.to_ascii_uppercase();
        self.traces.iter().find(|t| t.component() == wanted)
    }

    /// Return the component codes of all traces in order.
    #[must_use]
    pub fn components(&self) -> Vec<char> {
        self.traces
            .iter()
            .map(|t| component_of(t.channel()))
            .collect()
    }

    /// Return the number of component traces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Return true if the record holds no traces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Return the station metadata, if attached.
    #[must_use]
    pub fn station(&self) -> Option<&Station> {
        self.station.as_ref()
    }

    /// Return the origin metadata, if attached.
    #[must_use]
    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Return the great-circle distance from origin to station in meters.
    #[must_use]
    pub fn distance_in_m(&self) -> Option<f64> {
        self.distance_in_m
    }

    /// Return the source-to-station azimuth in degrees.
    #[must_use]
    pub fn azimuth(&self) -> Option<f64> {
        self.azimuth
    }

    /// Return the station-to-source azimuth in degrees.
    #[must_use]
    pub fn back_azimuth(&self) -> Option<f64> {
        self.back_azimuth
    }

    /// Return the maximum absolute amplitude over traces with non-zero weight.
    ///
    /// Returns `None` if every trace has zero weight.
    #[must_use]
    pub fn max_abs(&self) -> Option<f64> {
        self.traces
            .iter()
            .filter(|t| t.is_weighted())
            .map(Trace::max_abs)
            .reduce(f64::max)
    }

    /// Return the tag set.
    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Add a tag. Adding a tag twice has no further effect.
    pub fn tag_add(&mut self, tag: &str) {
        if !self.tags.contains(tag) {
            self.tags.insert(tag.to_string());
        }
    }

    /// Remove a tag if present.
    pub fn tag_remove(&mut self, tag: &str) {
        self.tags.remove(tag);
    }

    /// Return the value of the first `key:value` tag with the given key.
    ///
    /// For tags `{"model:scak", "solver:fk"}`, `tag_value("model")` is `Some("scak")`.
    #[must_use]
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags.iter().find_map(|tag| {
            let (k, v) = tag.split_once(':')?;
            (k == key).then_some(v)
        })
    }
}

impl<'a> IntoIterator for &'a WaveformRecord {
    type Item = &'a Trace;
    type IntoIter = std::slice::Iter<'a, Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.iter()
    }
}

fn check_trace_identity(id: &StationId, traces: &[Trace]) -> Result<(), DatasetError> {
    for trace in traces {
        let h = trace.header();
        if h.network != id.network() || h.station != id.station() || h.location != id.location() {
            return Err(DatasetError::MalformedRecord {
                id: id.to_string(),
                reason: format!(
                    "trace {}.{}.{}.{} recorded at a different station",
                    h.network, h.station, h.location, h.channel
                ),
            });
        }
    }
    Ok(())
}
