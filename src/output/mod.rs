//! Sample output
//!
//! Engines hand every sample to a [`SampleSink`] as soon as it is measured.
//! The binary streams them to stdout through [`csv::SampleWriter`]; tests
//! collect them in a `Vec<Sample>`.

pub mod csv;

use crate::engine::Sample;
use crate::error::BenchError;

pub use csv::SampleWriter;

/// Destination for samples, fed one at a time in emission order
pub trait SampleSink {
    fn emit(&mut self, sample: Sample) -> Result<(), BenchError>;
}

impl SampleSink for Vec<Sample> {
    fn emit(&mut self, sample: Sample) -> Result<(), BenchError> {
        self.push(sample);
        Ok(())
    }
}

impl<S: SampleSink + ?Sized> SampleSink for &mut S {
    fn emit(&mut self, sample: Sample) -> Result<(), BenchError> {
        (**self).emit(sample)
    }
}
