//! Line-oriented sample output
//!
//! The output contract is one `sector,elapsed_ns` line per probe, both
//! decimal, newline-terminated, no header. Each line is flushed as soon as it
//! is written so an interrupted run still leaves usable data behind.

use super::SampleSink;
use crate::engine::Sample;
use crate::error::BenchError;
use std::io::{self, Write};

/// Writes samples as `sector,elapsed_ns` lines
pub struct SampleWriter<W: Write> {
    writer: W,
    lines: u64,
}

impl SampleWriter<io::Stdout> {
    /// Writer on standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> SampleWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    /// Number of lines written so far
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SampleSink for SampleWriter<W> {
    fn emit(&mut self, sample: Sample) -> Result<(), BenchError> {
        writeln!(self.writer, "{},{}", sample.sector, sample.elapsed_ns).map_err(BenchError::Output)?;
        self.writer.flush().map_err(BenchError::Output)?;
        self.lines += 1;
        Ok(())
    }
}
