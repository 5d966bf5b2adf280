//! CSV dataset reading and JSON result writing for the bosque pipeline.

mod domain;
mod error;
mod reader;
mod writer;

pub use domain::{Dataset, ExperimentName};
pub use error::IoError;
pub use reader::DatasetReader;
pub use writer::{ClassScore, ResultWriter};
