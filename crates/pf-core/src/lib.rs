//! Core interpreter for `.pf` pomodoro register files.
//!
//! This crate contains the pipeline that turns register files into
//! per-date unit counts:
//! - Map: the chained hash map every collection is built on
//! - Preprocessing: `#include` expansion
//! - Line parsing and per-file interpretation
//! - Aggregation across files and date/subject filtering

pub mod aggregate;
pub mod date;
pub mod filter;
pub mod interpret;
pub mod line;
pub mod map;
pub mod preprocess;

pub use aggregate::Aggregate;
pub use date::{DateError, DateKey};
pub use filter::{FilterError, FilterSpec};
pub use interpret::{
    Assignments, DEFAULT_POMODORO_MINUTES, InterpretError, InterpretOptions, Interpreter,
    ParsedFile, Registers, interpret,
};
pub use line::{LineError, LineKind};
pub use map::{Map, MapError};
pub use preprocess::{Expansion, MAX_INCLUDE_DEPTH, PreprocessError, Preprocessor};
