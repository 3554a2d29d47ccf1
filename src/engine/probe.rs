//! Timed probe primitive
//!
//! A [`Probe`] owns one device handle and one aligned buffer. Its unit of
//! work is a single read of `read_len` bytes, timed with two clock reads
//! placed immediately around the read syscall and nothing else. The seek is
//! deliberately outside the timed window.

use crate::config::BenchConfig;
use crate::device::DeviceHandle;
use crate::error::BenchError;
use crate::util::buffer::AlignedBuffer;
use crate::util::fast_time::FastInstant;

/// One actor's device handle plus its read buffer
pub struct Probe {
    device: DeviceHandle,
    buffer: AlignedBuffer,
    read_len: usize,
}

impl Probe {
    /// Open the configured device and allocate the read buffer
    pub fn open(config: &BenchConfig) -> Result<Self, BenchError> {
        let device = DeviceHandle::open(&config.device, config.open_flags())?;
        let buffer = AlignedBuffer::new(config.read_len(), config.block_size as usize)?;

        Ok(Self {
            device,
            buffer,
            read_len: config.read_len(),
        })
    }

    /// Position the cursor at `offset` (a multiple of the block size)
    #[inline(always)]
    pub fn seek_to(&mut self, offset: u64) -> Result<(), BenchError> {
        self.device.seek(offset)
    }

    /// Read `read_len` bytes at the cursor without timing it
    #[inline(always)]
    pub fn read_block(&mut self) -> Result<(), BenchError> {
        self.device.read_exact(&mut self.buffer, self.read_len)
    }

    /// Read at the cursor and return the elapsed nanoseconds
    #[inline(always)]
    pub fn timed_read(&mut self) -> Result<u64, BenchError> {
        let start = FastInstant::now();
        self.read_block()?;
        let end = FastInstant::now();
        Ok(end.nanos_since(start))
    }

    /// Seek to `offset`, then time one read there
    pub fn probe(&mut self, offset: u64) -> Result<u64, BenchError> {
        self.seek_to(offset)?;
        self.timed_read()
    }

    pub fn read_len(&self) -> usize {
        self.read_len
    }

    /// Close the device handle; the buffer is freed on return
    pub fn close(self) -> Result<(), BenchError> {
        self.device.close()
    }
}
