//! Source grids, parallel grid search, and score-surface reductions.
//!
//! Enumerates candidate sources on regular, random, or explicit grids,
//! evaluates every (source, origin) pair across one or more bands on a
//! dedicated rayon pool, picks the best fit, and reduces the resulting
//! score surface to misfit, likelihood, and marginal profiles.

mod config;
mod error;
mod grid;
mod result;
mod search;
mod serialize;
mod surface;

pub use config::{GridSearchConfig, Partition};
pub use error::{SearchError, SurfaceError};
pub use grid::{
    Axis, DoubleCoupleGridRandom, DoubleCoupleGridRegular, ForceGridRegular, Grid,
    UnstructuredGrid,
};
pub use result::{argmin, BestFit, OriginFit, SearchResult};
pub use search::Band;
pub use surface::{
    ArraySurface, Profile, ProfileMode, ScoreSurface, SurfaceReduction, TableSurface,
};
