//! Seismic waveform containers.
//!
//! Pure data library with no I/O. Provides validated single-component
//! traces, single-station records with station/origin metadata and derived
//! source-receiver geometry, and the ordered `Dataset` collection with
//! selection, mapping, sorting, and tagging.

mod dataset;
mod error;
mod geodesy;
mod metadata;
mod record;
mod trace;

pub use dataset::{Dataset, DatasetConfig};
pub use error::{DatasetError, WaveformError};
pub use geodesy::{distance_azimuth, DistanceAzimuth, EARTH_RADIUS_M};
pub use metadata::{Origin, Station, StationId};
pub use record::WaveformRecord;
pub use trace::{component_of, Trace, TraceAttributes, TraceHeader};
