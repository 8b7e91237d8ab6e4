//! Single-component traces with validation guarantees.

use serde::{Deserialize, Serialize};

use crate::error::WaveformError;

/// Identity and time base of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceHeader {
    /// Network code, e.g. `"AK"`.
    pub network: String,
    /// Station code, e.g. `"BIGB"`.
    pub station: String,
    /// Location code, often empty.
    pub location: String,
    /// Channel code, e.g. `"BHZ"`. The last character is the component.
    pub channel: String,
    /// Start time in epoch seconds.
    pub starttime: f64,
    /// Sample interval in seconds.
    pub delta: f64,
}

impl TraceHeader {
    /// Create a header with location `""` and start time `0.0`.
    #[must_use]
    pub fn new(network: &str, station: &str, channel: &str, delta: f64) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: String::new(),
            channel: channel.to_string(),
            starttime: 0.0,
            delta,
        }
    }

    /// Set the location code.
    #[must_use]
    pub fn with_location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    /// Set the start time.
    #[must_use]
    pub fn with_starttime(mut self, starttime: f64) -> Self {
        self.starttime = starttime;
        self
    }
}

/// Annotations written by misfit evaluation for reporting and plotting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceAttributes {
    /// Selected time shift in seconds (positive: synthetic delayed).
    pub time_shift: Option<f64>,
    /// Weighted misfit contributed by this trace.
    pub misfit: Option<f64>,
    /// Normalized cross-correlation at the selected shift.
    pub max_cc: Option<f64>,
}

/// One component of a station recording. Guaranteed non-empty, finite, with
/// a positive sample interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TraceRepr")]
pub struct Trace {
    header: TraceHeader,
    data: Vec<f64>,
    weight: Option<f64>,
    attributes: TraceAttributes,
}

#[derive(Deserialize)]
struct TraceRepr {
    header: TraceHeader,
    data: Vec<f64>,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    attributes: TraceAttributes,
}

impl TryFrom<TraceRepr> for Trace {
    type Error = WaveformError;

    fn try_from(repr: TraceRepr) -> Result<Self, Self::Error> {
        let mut trace = Self::new(repr.header, repr.data)?;
        if let Some(weight) = repr.weight {
            trace.set_weight(weight)?;
        }
        trace.attributes = repr.attributes;
        Ok(trace)
    }
}

impl Trace {
    /// Create a new trace, validating header and samples.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`WaveformError::EmptyChannel`] | `header.channel` is empty |
    /// | [`WaveformError::InvalidDelta`] | `header.delta` is not finite and positive |
    /// | [`WaveformError::EmptyTrace`] | `data` is empty |
    /// | [`WaveformError::NonFiniteSample`] | Any sample is NaN or infinite |
    pub fn new(header: TraceHeader, data: Vec<f64>) -> Result<Self, WaveformError> {
        if header.channel.is_empty() {
            return Err(WaveformError::EmptyChannel);
        }
        if !(header.delta.is_finite() && header.delta > 0.0) {
            return Err(WaveformError::InvalidDelta {
                channel: header.channel,
                delta: header.delta,
            });
        }
        validate_samples(&header.channel, &data)?;
        Ok(Self {
            header,
            data,
            weight: None,
            attributes: TraceAttributes::default(),
        })
    }

    /// Set the weight and return the trace.
    ///
    /// # Errors
    ///
    /// Returns [`WaveformError::InvalidWeight`] if `weight` is negative or non-finite.
    pub fn with_weight(mut self, weight: f64) -> Result<Self, WaveformError> {
        self.set_weight(weight)?;
        Ok(self)
    }

    /// Set the weight in place.
    ///
    /// # Errors
    ///
    /// Returns [`WaveformError::InvalidWeight`] if `weight` is negative or non-finite.
    pub fn set_weight(&mut self, weight: f64) -> Result<(), WaveformError> {
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(WaveformError::InvalidWeight {
                channel: self.header.channel.clone(),
                weight,
            });
        }
        self.weight = Some(weight);
        Ok(())
    }

    /// Replace the samples, keeping header, weight and attributes.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`WaveformError::EmptyTrace`] | `data` is empty |
    /// | [`WaveformError::NonFiniteSample`] | Any sample is NaN or infinite |
    pub fn set_data(&mut self, data: Vec<f64>) -> Result<(), WaveformError> {
        validate_samples(&self.header.channel, &data)?;
        self.data = data;
        Ok(())
    }

    /// Return the header.
    #[must_use]
    pub fn header(&self) -> &TraceHeader {
        &self.header
    }

    /// Return the samples.
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Return the channel code.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.header.channel
    }

    /// Return the component code: the upper-cased last character of the channel.
    #[must_use]
    pub fn component(&self) -> char {
        component_of(&self.header.channel)
    }

    /// Return the sample interval in seconds.
    #[must_use]
    pub fn delta(&self) -> f64 {
        self.header.delta
    }

    /// Return the start time in epoch seconds.
    #[must_use]
    pub fn starttime(&self) -> f64 {
        self.header.starttime
    }

    /// Return the time of the last sample.
    #[must_use]
    pub fn endtime(&self) -> f64 {
        self.header.starttime + (self.data.len() - 1) as f64 * self.header.delta
    }

    /// Return the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Return true if the trace has no samples.
    ///
    /// Always `false` for traces built through [`Trace::new`]; provided to
    /// satisfy the `len_without_is_empty` convention.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Return the weight, defaulting to `1.0` when unset.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }

    /// Return true unless the weight has been set to zero.
    #[must_use]
    pub fn is_weighted(&self) -> bool {
        self.weight() != 0.0
    }

    /// Return the maximum absolute sample value.
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// Return the misfit annotations.
    #[must_use]
    pub fn attributes(&self) -> &TraceAttributes {
        &self.attributes
    }

    /// Return the misfit annotations for writing.
    pub fn attributes_mut(&mut self) -> &mut TraceAttributes {
        &mut self.attributes
    }
}

/// Derive the component code from a channel code.
///
/// Case-insensitive: `"bhz"` and `"BHZ"` both yield `'Z'`. Returns `'?'` for
/// an empty channel.
#[must_use]
pub fn component_of(channel: &str) -> char {
    channel
        .chars()
        .last()
        .map_or('?', |c| c.to_ascii_uppercase())
}

fn validate_samples(channel: &str, data: &[f64]) -> Result<(), WaveformError> {
    if data.is_empty() {
        return Err(WaveformError::EmptyTrace {
            channel: channel.to_string(),
        });
    }
    if let Some(index) = data.iter().position(|v| !v.is_finite()) {
        return Err(WaveformError::NonFiniteSample {
            channel: channel.to_string(),
            index,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(channel: &str) -> TraceHeader {
        TraceHeader::new("XX", "STA", channel, 0.5)
    }

    #[test]
    fn rejects_empty_samples() {
        let result = Trace::new(header("BHZ"), vec![]);
        assert!(matches!(result, Err(WaveformError::EmptyTrace { .. })));
    }

    #[test]
    fn rejects_nan() {
        let result = Trace::new(header("BHZ"), vec![1.0, f64::NAN]);
        assert!(matches!(
            result,
            Err(WaveformError::NonFiniteSample { index: 1, .. })
        ));
    }

    #[test]
    fn rejects_non_positive_delta() {
        let bad = TraceHeader::new("XX", "STA", "BHZ", 0.0);
        let result = Trace::new(bad, vec![1.0]);
        assert!(matches!(result, Err(WaveformError::InvalidDelta { .. })));
    }

    #[test]
    fn rejects_empty_channel() {
        let result = Trace::new(header(""), vec![1.0]);
        assert!(matches!(result, Err(WaveformError::EmptyChannel)));
    }

    #[test]
    fn rejects_negative_weight() {
        let trace = Trace::new(header("BHZ"), vec![1.0]).unwrap();
        assert!(matches!(
            trace.with_weight(-1.0),
            Err(WaveformError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn component_is_case_insensitive_last_char() {
        assert_eq!(component_of("BHZ"), 'Z');
        assert_eq!(component_of("bhr"), 'R');
        assert_eq!(component_of("T"), 'T');
        assert_eq!(component_of(""), '?');
    }

    #[test]
    fn unset_weight_defaults_to_one() {
        let trace = Trace::new(header("BHT"), vec![1.0, -3.0]).unwrap();
        assert_eq!(trace.weight(), 1.0);
        assert!(trace.is_weighted());
        let zeroed = trace.with_weight(0.0).unwrap();
        assert!(!zeroed.is_weighted());
    }

    #[test]
    fn max_abs_uses_absolute_values() {
        let trace = Trace::new(header("BHZ"), vec![2.0, -7.5, 3.0]).unwrap();
        assert_eq!(trace.max_abs(), 7.5);
    }

    #[test]
    fn endtime_from_delta() {
        let trace = Trace::new(header("BHZ").with_starttime(10.0), vec![0.0; 5]).unwrap();
        assert!((trace.endtime() - 12.0).abs() < 1e-12);
    }

    #[test]
    fn deserialize_validates_samples() {
        let json = r#"{"header":{"network":"XX","station":"STA","location":"","channel":"BHZ","starttime":0.0,"delta":0.5},"data":[],"weight":null}"#;
        let result: Result<Trace, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn serde_round_trip_keeps_weight_and_attributes() {
        let mut trace = Trace::new(header("BHR"), vec![1.0, 2.0])
            .unwrap()
            .with_weight(0.25)
            .unwrap();
        trace.attributes_mut().time_shift = Some(0.5);
        let json = serde_json::to_string(&trace).unwrap();
        let back: Trace = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trace);
    }
}
