//! Per-station Green's function bases and synthetic generation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use quakefit_waveform::{
    component_of, Dataset, DatasetError, Origin, Station, StationId, Trace, TraceHeader,
    WaveformError, WaveformRecord,
};

use crate::error::MisfitError;
use crate::source::{Source, SourceKind};
use crate::wavelet::Wavelet;

/// Basis traces for one recorded component.
///
/// `basis[j]` is the response to a unit value of source component `j`.
/// All basis traces share the header's time base and have equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreensComponent {
    header: TraceHeader,
    basis: Vec<Vec<f64>>,
}

impl GreensComponent {
    /// Create a component from its header and basis traces.
    ///
    /// # Errors
    ///
    /// Returns [`MisfitError::InvalidGreens`] if there are no basis traces,
    /// lengths differ or are zero, a sample is non-finite, or the header has
    /// an empty channel or invalid sample interval.
    pub fn new(header: TraceHeader, basis: Vec<Vec<f64>>) -> Result<Self, MisfitError> {
        let component = Self { header, basis };
        component.validate()?;
        Ok(component)
    }

    fn validate(&self) -> Result<(), MisfitError> {
        let fail = |reason: String| MisfitError::InvalidGreens {
            id: format!(
                "{}.{}.{}",
                self.header.network, self.header.station, self.header.location
            ),
            reason,
        };
        if self.header.channel.is_empty() {
            return Err(fail("empty channel code".to_string()));
        }
        if !(self.header.delta.is_finite() && self.header.delta > 0.0) {
            return Err(fail(format!("invalid sample interval {}", self.header.delta)));
        }
        let Some(first) = self.basis.first() else {
            return Err(fail(format!("channel {} has no basis traces", self.header.channel)));
        };
        if first.is_empty() {
            return Err(fail(format!("channel {} has empty basis traces", self.header.channel)));
        }
        for (j, trace) in self.basis.iter().enumerate() {
            if trace.len() != first.len() {
                return Err(fail(format!(
                    "channel {} basis {j} has {} samples, expected {}",
                    self.header.channel,
                    trace.len(),
                    first.len()
                )));
            }
            if trace.iter().any(|v| !v.is_finite()) {
                return Err(fail(format!(
                    "channel {} basis {j} has a non-finite sample",
                    self.header.channel
                )));
            }
        }
        Ok(())
    }

    /// Return the header shared by the basis traces and the synthetics.
    #[must_use]
    pub fn header(&self) -> &TraceHeader {
        &self.header
    }

    /// Return the upper-cased component code.
    #[must_use]
    pub fn component(&self) -> char {
        component_of(&self.header.channel)
    }

    /// Return the basis traces.
    #[must_use]
    pub fn basis(&self) -> &[Vec<f64>] {
        &self.basis
    }

    /// Return the number of samples per basis trace.
    #[must_use]
    pub fn len(&self) -> usize {
        self.basis.first().map_or(0, Vec::len)
    }

    /// Return true if there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Weighted sum of the basis traces, rejecting samples that overflow.
    pub(crate) fn synthesize_finite(&self, weights: &[f64]) -> Result<Vec<f64>, MisfitError> {
        let out = self.synthesize(weights);
        if let Some(index) = out.iter().position(|v| !v.is_finite()) {
            return Err(WaveformError::NonFiniteSample {
                channel: self.header.channel.clone(),
                index,
            }
            .into());
        }
        Ok(out)
    }

    /// Weighted sum of the basis traces.
    pub(crate) fn synthesize(&self, weights: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.len()];
        for (w, trace) in weights.iter().zip(&self.basis) {
            if *w == 0.0 {
                continue;
            }
            for (o, g) in out.iter_mut().zip(trace) {
                *o += w * g;
            }
        }
        out
    }
}

#[derive(Deserialize)]
struct GreensRepr {
    kind: SourceKind,
    #[serde(default)]
    station: Option<Station>,
    origin: Origin,
    components: Vec<GreensComponent>,
    #[serde(default)]
    tags: BTreeSet<String>,
}

impl TryFrom<GreensRepr> for GreensTensor {
    type Error = MisfitError;

    fn try_from(repr: GreensRepr) -> Result<Self, Self::Error> {
        for component in &repr.components {
            component.validate()?;
        }
        let mut tensor = Self::new(repr.kind, repr.origin, repr.components)?;
        if let Some(station) = repr.station {
            tensor = tensor.with_station(station);
        }
        tensor.tags = repr.tags;
        Ok(tensor)
    }
}

/// Green's functions from one origin to one station, for every recorded component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GreensRepr")]
pub struct GreensTensor {
    id: StationId,
    kind: SourceKind,
    station: Option<Station>,
    origin: Origin,
    components: Vec<GreensComponent>,
    tags: BTreeSet<String>,
}

impl GreensTensor {
    /// Create a tensor for `kind` sources from per-component bases.
    ///
    /// The identifier is taken from the first component header.
    ///
    /// # Errors
    ///
    /// Returns [`MisfitError::InvalidGreens`] if `components` is empty,
    /// component headers disagree on network, station, or location, or a
    /// component does not carry exactly `kind.n_components()` basis traces.
    pub fn new(
        kind: SourceKind,
        origin: Origin,
        components: Vec<GreensComponent>,
    ) -> Result<Self, MisfitError> {
        let Some(first) = components.first() else {
            return Err(MisfitError::InvalidGreens {
                id: "?".to_string(),
                reason: "no components".to_string(),
            });
        };
        let h = first.header();
        let id = StationId::new(&h.network, &h.station, &h.location);
        for component in &components {
            let h = component.header();
            if h.network != id.network() || h.station != id.station() || h.location != id.location()
            {
                return Err(MisfitError::InvalidGreens {
                    id: id.to_string(),
                    reason: format!("component {} belongs to another station", h.channel),
                });
            }
            if component.basis().len() != kind.n_components() {
                return Err(MisfitError::InvalidGreens {
                    id: id.to_string(),
                    reason: format!(
                        "component {} has {} basis traces, a {kind} source needs {}",
                        h.channel,
                        component.basis().len(),
                        kind.n_components()
                    ),
                });
            }
        }
        Ok(Self {
            id,
            kind,
            station: None,
            origin,
            components,
            tags: BTreeSet::new(),
        })
    }

    /// Attach station metadata; the identifier follows the station codes.
    #[must_use]
    pub fn with_station(mut self, station: Station) -> Self {
        self.id = station.id();
        self.station = Some(station);
        self
    }

    /// Return the station identifier.
    #[must_use]
    pub fn id(&self) -> &StationId {
        &self.id
    }

    /// Return the source kind this tensor synthesizes.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Return the station metadata, if attached.
    #[must_use]
    pub fn station(&self) -> Option<&Station> {
        self.station.as_ref()
    }

    /// Return the origin.
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Return the per-component bases.
    #[must_use]
    pub fn components(&self) -> &[GreensComponent] {
        &self.components
    }

    /// Return the first component basis matching `component` (case-insensitive).
    #[must_use]
    pub fn component(&self, component: char) -> Option<&GreensComponent> {
        let wanted = component.to_ascii_uppercase();
        self.components.iter().find(|c| c.component() == wanted)
    }

    pub(crate) fn component_index(&self, component: char) -> Option<usize> {
        self.components.iter().position(|c| c.component() == component)
    }

    /// Return the tag set.
    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Add a tag. Idempotent.
    pub fn tag_add(&mut self, tag: &str) {
        self.tags.insert(tag.to_string());
    }

    pub(crate) fn check_kind(&self, source: &Source) -> Result<(), MisfitError> {
        if source.kind() != self.kind {
            return Err(MisfitError::SourceKindMismatch {
                id: self.id.to_string(),
                expected: self.kind,
                got: source.kind(),
            });
        }
        Ok(())
    }

    /// Convolve every basis trace with `wavelet`, in place.
    pub fn convolve(&mut self, wavelet: &Wavelet) {
        for component in &mut self.components {
            let delta = component.header.delta;
            for trace in &mut component.basis {
                *trace = wavelet.convolve(trace, delta);
            }
        }
    }

    /// Synthetic record for `source`: one trace per component.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`MisfitError::SourceKindMismatch`] | `source` is not of this tensor's kind |
    /// | [`MisfitError::Waveform`] | A synthetic sample overflows to infinity |
    pub fn get_synthetics(&self, source: &Source) -> Result<WaveformRecord, MisfitError> {
        self.check_kind(source)?;
        let weights = source.weights();
        let traces = self
            .components
            .iter()
            .map(|c| Trace::new(c.header.clone(), c.synthesize(weights)))
            .collect::<Result<Vec<_>, _>>()?;
        let mut record = WaveformRecord::new(traces)?.with_origin(self.origin.clone());
        if let Some(station) = &self.station {
            record.set_station(station.clone());
        }
        for tag in &self.tags {
            record.tag_add(tag);
        }
        Ok(record)
    }
}

/// Green's tensors for every station, possibly for several origins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GreensTensorList {
    tensors: Vec<GreensTensor>,
}

impl GreensTensorList {
    /// Create a list from tensors.
    #[must_use]
    pub fn new(tensors: Vec<GreensTensor>) -> Self {
        Self { tensors }
    }

    /// Append a tensor.
    pub fn push(&mut self, tensor: GreensTensor) {
        self.tensors.push(tensor);
    }

    /// Return the tensors computed for `origin`.
    #[must_use]
    pub fn select(&self, origin: &Origin) -> Self {
        Self {
            tensors: self
                .tensors
                .iter()
                .filter(|t| t.origin() == origin)
                .cloned()
                .collect(),
        }
    }

    /// Convolve every tensor with `wavelet`, in place.
    #[instrument(skip(self), fields(n = self.tensors.len()))]
    pub fn convolve(&mut self, wavelet: &Wavelet) {
        for tensor in &mut self.tensors {
            tensor.convolve(wavelet);
        }
        debug!("convolved Green's tensors");
    }

    /// Apply `f` to a copy of each tensor with the matching item of `args`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::SequenceTooShort`] (wrapped) if `args` is
    /// shorter than the list.
    pub fn map<T, F>(&self, args: &[T], mut f: F) -> Result<Self, MisfitError>
    where
        F: FnMut(GreensTensor, &T) -> GreensTensor,
    {
        if args.len() < self.tensors.len() {
            return Err(DatasetError::SequenceTooShort {
                needed: self.tensors.len(),
                got: args.len(),
            }
            .into());
        }
        Ok(Self {
            tensors: self
                .tensors
                .iter()
                .zip(args)
                .map(|(t, a)| f(t.clone(), a))
                .collect(),
        })
    }

    /// Synthetics for `source` at every station, as a Dataset in list order.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`GreensTensor::get_synthetics`].
    pub fn get_synthetics(&self, source: &Source) -> Result<Dataset, MisfitError> {
        let mut dataset = Dataset::new();
        for tensor in &self.tensors {
            dataset.append(tensor.get_synthetics(source)?)?;
        }
        Ok(dataset)
    }

    /// Return the first tensor with identifier `id`.
    #[must_use]
    pub fn get(&self, id: &StationId) -> Option<&GreensTensor> {
        self.tensors.iter().find(|t| t.id() == id)
    }

    /// Return the distinct origins in first-seen order.
    #[must_use]
    pub fn origins(&self) -> Vec<&Origin> {
        let mut out: Vec<&Origin> = Vec::new();
        for tensor in &self.tensors {
            if !out.contains(&tensor.origin()) {
                out.push(tensor.origin());
            }
        }
        out
    }

    /// Iterate over the tensors.
    pub fn iter(&self) -> std::slice::Iter<'_, GreensTensor> {
        self.tensors.iter()
    }

    /// Return the number of tensors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Return true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

impl FromIterator<GreensTensor> for GreensTensorList {
    fn from_iter<I: IntoIterator<Item = GreensTensor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a GreensTensorList {
    type Item = &'a GreensTensor;
    type IntoIter = std::slice::Iter<'a, GreensTensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.iter()
    }
}
