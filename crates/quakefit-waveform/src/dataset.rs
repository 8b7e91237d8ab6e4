//! Ordered collections of station records with selection, mapping, and tagging.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::DatasetError;
use crate::metadata::{Origin, Station, StationId};
use crate::record::WaveformRecord;

/// Construction-time behavior switches for a [`Dataset`].
///
/// # Defaults
///
/// | Field | Default |
/// |---|---|
/// | `warn_mixed_origins` | `true` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Emit a warning from [`Dataset::get_origins`] when records disagree on origin.
    pub warn_mixed_origins: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            warn_mixed_origins: true,
        }
    }
}

impl DatasetConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the mixed-origin warning.
    #[must_use]
    pub fn with_warn_mixed_origins(mut self, warn: bool) -> Self {
        self.warn_mixed_origins = warn;
        self
    }
}

/// An ordered sequence of [`WaveformRecord`]s, typically all stations of one event.
///
/// Insertion order is preserved and identifiers are not required to be
/// unique. The Dataset's own identifier, tags, and config carry over to
/// every Dataset derived from it by [`select`](Self::select),
/// [`apply`](Self::apply) or [`map`](Self::map).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    id: Option<String>,
    records: Vec<WaveformRecord>,
    tags: BTreeSet<String>,
    config: DatasetConfig,
}

impl Dataset {
    /// Create an empty Dataset with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identifier (usually the event name).
    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Set the config.
    #[must_use]
    pub fn with_config(mut self, config: DatasetConfig) -> Self {
        self.config = config;
        self
    }

    /// Build a Dataset by appending every record in order.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by [`append`](Self::append).
    pub fn from_records<I>(records: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = WaveformRecord>,
    {
        let mut dataset = Self::new();
        for record in records {
            dataset.append(record)?;
        }
        Ok(dataset)
    }

    /// An empty Dataset sharing this one's identifier, tags, and config.
    fn empty_like(&self) -> Self {
        Self {
            id: self.id.clone(),
            records: Vec::with_capacity(self.records.len()),
            tags: self.tags.clone(),
            config: self.config,
        }
    }

    /// Append a record.
    ///
    /// Recomputes the record's identifier, warns if station or origin
    /// metadata is missing, computes distance and azimuths when both are
    /// present, and adds the Dataset's tags to the record.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::MalformedRecord`] if the record holds no
    /// traces or its traces disagree on network, station, or location.
    pub fn append(&mut self, mut record: WaveformRecord) -> Result<(), DatasetError> {
        record.validate()?;
        record.identify();

        if record.station().is_none() {
            warn!(id = %record.id(), "record has no station metadata");
        }
        if record.origin().is_none() {
            warn!(id = %record.id(), "record has no origin metadata");
        }
        record.update_geometry();

        for tag in &self.tags {
            record.tag_add(tag);
        }
        self.records.push(record);
        Ok(())
    }

    /// Return a new Dataset with the records matching `origin` and/or `station`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::NoSelectionCriteria`] if both are `None`.
    pub fn select(
        &self,
        origin: Option<&Origin>,
        station: Option<&Station>,
    ) -> Result<Self, DatasetError> {
        if origin.is_none() && station.is_none() {
            return Err(DatasetError::NoSelectionCriteria);
        }
        let mut selected = self.empty_like();
        selected.records = self
            .records
            .iter()
            .filter(|r| origin.is_none_or(|o| r.origin() == Some(o)))
            .filter(|r| station.is_none_or(|s| r.station() == Some(s)))
            .cloned()
            .collect();
        Ok(selected)
    }

    /// Apply `f` to a copy of each record, in order, collecting a new Dataset.
    ///
    /// The source Dataset is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::MalformedRecord`] if `f` produces a record
    /// that cannot be appended.
    #[instrument(skip(self, f), fields(n = self.records.len()))]
    pub fn apply<F>(&self, mut f: F) -> Result<Self, DatasetError>
    where
        F: FnMut(WaveformRecord) -> WaveformRecord,
    {
        let mut out = self.empty_like();
        for record in &self.records {
            out.append(f(record.clone()))?;
        }
        debug!(n = out.len(), "apply complete");
        Ok(out)
    }

    /// Like [`apply`](Self::apply), but consumes the Dataset and hands `f`
    /// the records themselves.
    ///
    /// # Errors
    ///
    /// Same as [`apply`](Self::apply).
    pub fn apply_owned<F>(mut self, mut f: F) -> Result<Self, DatasetError>
    where
        F: FnMut(WaveformRecord) -> WaveformRecord,
    {
        let records = std::mem::take(&mut self.records);
        for record in records {
            self.append(f(record))?;
        }
        Ok(self)
    }

    /// Apply `f` to a copy of each record together with the matching item of
    /// `args`, in order, collecting a new Dataset.
    ///
    /// Items of `args` beyond the Dataset length are ignored.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DatasetError::SequenceTooShort`] | `args.len() < self.len()` |
    /// | [`DatasetError::MalformedRecord`] | `f` produced a record that cannot be appended |
    #[instrument(skip(self, args, f), fields(n = self.records.len(), n_args = args.len()))]
    pub fn map<T, F>(&self, args: &[T], mut f: F) -> Result<Self, DatasetError>
    where
        F: FnMut(WaveformRecord, &T) -> WaveformRecord,
    {
        self.check_sequence(args.len())?;
        let mut out = self.empty_like();
        for (record, arg) in self.records.iter().zip(args) {
            out.append(f(record.clone(), arg))?;
        }
        debug!(n = out.len(), "map complete");
        Ok(out)
    }

    /// Like [`map`](Self::map), but consumes the Dataset and hands `f` the
    /// records themselves.
    ///
    /// # Errors
    ///
    /// Same as [`map`](Self::map).
    pub fn map_owned<T, F>(mut self, args: &[T], mut f: F) -> Result<Self, DatasetError>
    where
        F: FnMut(WaveformRecord, &T) -> WaveformRecord,
    {
        self.check_sequence(args.len())?;
        let records = std::mem::take(&mut self.records);
        for (record, arg) in records.into_iter().zip(args) {
            self.append(f(record, arg))?;
        }
        Ok(self)
    }

    fn check_sequence(&self, got: usize) -> Result<(), DatasetError> {
        if got < self.records.len() {
            return Err(DatasetError::SequenceTooShort {
                needed: self.records.len(),
                got,
            });
        }
        Ok(())
    }

    /// Return the maximum absolute amplitude over all traces with non-zero weight.
    ///
    /// Returns `f64::NEG_INFINITY` if the Dataset is empty or every trace
    /// has weight zero.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.records
            .iter()
            .filter_map(WaveformRecord::max_abs)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Sort records by source-receiver distance. Records without a distance sort last.
    pub fn sort_by_distance(&mut self, reverse: bool) {
        self.sort_by_key(WaveformRecord::distance_in_m, reverse);
    }

    /// Sort records by source-receiver azimuth. Records without an azimuth sort last.
    pub fn sort_by_azimuth(&mut self, reverse: bool) {
        self.sort_by_key(WaveformRecord::azimuth, reverse);
    }

    /// Stable in-place sort on a numeric key under IEEE total ordering.
    ///
    /// Records for which `key` returns `None` keep their relative order and
    /// sort after all keyed records, in either direction. `reverse` flips
    /// the comparison, so tied records keep their original order.
    pub fn sort_by_key<F>(&mut self, key: F, reverse: bool)
    where
        F: Fn(&WaveformRecord) -> Option<f64>,
    {
        self.records.sort_by(|a, b| match (key(a), key(b)) {
            (Some(x), Some(y)) if reverse => y.total_cmp(&x),
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }

    /// Return the station metadata of each record, in order.
    #[must_use]
    pub fn get_stations(&self) -> Vec<Option<&Station>> {
        self.records.iter().map(WaveformRecord::station).collect()
    }

    /// Return the origin metadata of each record, in order.
    ///
    /// Warns when records disagree on origin, unless disabled through
    /// [`DatasetConfig::warn_mixed_origins`].
    #[must_use]
    pub fn get_origins(&self) -> Vec<Option<&Origin>> {
        let origins: Vec<Option<&Origin>> =
            self.records.iter().map(WaveformRecord::origin).collect();
        if self.config.warn_mixed_origins {
            let mut present = origins.iter().flatten();
            if let Some(first) = present.next()
                && present.any(|o| o != first)
            {
                warn!(
                    dataset = self.id.as_deref().unwrap_or(""),
                    "records in Dataset have different origins"
                );
            }
        }
        origins
    }

    /// Add a tag to the Dataset and every record. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidTag`] if `tag` is empty.
    pub fn tag_add(&mut self, tag: &str) -> Result<(), DatasetError> {
        if tag.is_empty() {
            return Err(DatasetError::InvalidTag);
        }
        self.tags.insert(tag.to_string());
        for record in &mut self.records {
            record.tag_add(tag);
        }
        Ok(())
    }

    /// Remove a tag from the Dataset and every record. Idempotent.
    pub fn tag_remove(&mut self, tag: &str) {
        self.tags.remove(tag);
        for record in &mut self.records {
            record.tag_remove(tag);
        }
    }

    /// Remove and return the first record with the given identifier.
    pub fn remove(&mut self, id: &StationId) -> Option<WaveformRecord> {
        let index = self.records.iter().position(|r| r.id() == id)?;
        Some(self.records.remove(index))
    }

    /// Return the first record with the given identifier.
    #[must_use]
    pub fn get_by_id(&self, id: &StationId) -> Option<&WaveformRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    /// Return the record at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&WaveformRecord> {
        self.records.get(index)
    }

    /// Return the identifier.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Return the Dataset-level tags.
    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Return the config.
    #[must_use]
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Return the records in order.
    #[must_use]
    pub fn records(&self) -> &[WaveformRecord] {
        &self.records
    }

    /// Iterate over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, WaveformRecord> {
        self.records.iter()
    }

    /// Iterate mutably over the records.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, WaveformRecord> {
        self.records.iter_mut()
    }

    /// Return the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Return true if the Dataset holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a WaveformRecord;
    type IntoIter = std::slice::Iter<'a, WaveformRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl IntoIterator for Dataset {
    type Item = WaveformRecord;
    type IntoIter = std::vec::IntoIter<WaveformRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
