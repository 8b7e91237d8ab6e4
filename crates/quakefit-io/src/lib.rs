//! Problem input, score tables, and result artifacts for quakefit.

mod domain;
mod error;
mod problem;
mod table;
mod writer;

pub use domain::{EventName, GridSpec, Problem};
pub use error::IoError;
pub use problem::ProblemReader;
pub use table::TableReader;
pub use writer::ResultWriter;
