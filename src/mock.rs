//! Recording and fault-injecting stand-ins for drivers and allocators

use std::cell::Cell;

use crate::blockdev::{BlockDevice, HeapBlockDevice};
use crate::buffer::{Allocator, HeapAllocator};
use crate::error::DriverError;
use crate::flash::{FlashIap, MemoryFlash};

/// Small deterministic generator for randomized tests.
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> XorShift {
        XorShift(seed.max(1))
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// A value in `0..bound`.
    pub fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

/// Block device that logs every access and can be told to fail.
#[derive(Debug)]
pub struct RecordingDevice {
    pub inner: HeapBlockDevice,
    pub reads: Vec<(u64, usize)>,
    pub programs: Vec<(u64, usize)>,
    read_error: Option<i32>,
    program_error: Option<i32>,
}

impl RecordingDevice {
    pub fn new(size: usize) -> RecordingDevice {
        RecordingDevice {
            inner: HeapBlockDevice::new(size),
            reads: Vec::new(),
            programs: Vec::new(),
            read_error: None,
            program_error: None,
        }
    }

    pub fn fail_read(&mut self, code: i32) {
        self.read_error = Some(code);
    }

    pub fn fail_program(&mut self, code: i32) {
        self.program_error = Some(code);
    }
}

impl BlockDevice for RecordingDevice {
    fn read(&mut self, buf: &mut [u8], address: u64) -> Result<(), DriverError> {
        if let Some(code) = self.read_error {
            return Err(DriverError(code));
        }

        self.reads.push((address, buf.len()));
        self.inner.read(buf, address)
    }

    fn program(&mut self, buf: &[u8], address: u64) -> Result<(), DriverError> {
        if let Some(code) = self.program_error {
            return Err(DriverError(code));
        }

        self.programs.push((address, buf.len()));
        self.inner.program(buf, address)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }
}

/// Flash that logs reads and can fail `init` or the n-th read.
#[derive(Debug)]
pub struct RecordingFlash {
    pub inner: MemoryFlash,
    pub reads: Vec<(usize, usize)>,
    pub init_calls: usize,
    pub deinit_calls: usize,
    init_error: Option<i32>,
    read_error: Option<(usize, i32)>,
}

impl RecordingFlash {
    pub fn new(base: usize, image: Vec<u8>) -> RecordingFlash {
        RecordingFlash {
            inner: MemoryFlash::new(base, image),
            reads: Vec::new(),
            init_calls: 0,
            deinit_calls: 0,
            init_error: None,
            read_error: None,
        }
    }

    pub fn fail_init(&mut self, code: i32) {
        self.init_error = Some(code);
    }

    /// Makes the read with zero-based index `nth` fail with `code`.
    pub fn fail_read(&mut self, nth: usize, code: i32) {
        self.read_error = Some((nth, code));
    }
}

impl FlashIap for RecordingFlash {
    fn init(&mut self) -> Result<(), DriverError> {
        self.init_calls += 1;

        match self.init_error {
            Some(code) => Err(DriverError(code)),
            None => self.inner.init(),
        }
    }

    fn read(&mut self, buf: &mut [u8], address: usize) -> Result<(), DriverError> {
        let index = self.reads.len();

        self.reads.push((address, buf.len()));

        match self.read_error {
            Some((nth, code)) if nth == index => Err(DriverError(code)),
            _ => self.inner.read(buf, address),
        }
    }

    fn deinit(&mut self) -> Result<(), DriverError> {
        self.deinit_calls += 1;
        self.inner.deinit()
    }
}

/// Heap allocator that counts calls and fails the n-th allocation.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    heap: HeapAllocator,
    fail_at: Option<usize>,
    pub allocations: Cell<usize>,
    pub releases: Cell<usize>,
}

impl CountingAllocator {
    pub fn new() -> CountingAllocator {
        CountingAllocator::default()
    }

    /// Makes the allocation with zero-based index `nth` fail.
    pub fn failing_at(nth: usize) -> CountingAllocator {
        CountingAllocator {
            fail_at: Some(nth),
            ..CountingAllocator::default()
        }
    }

    /// Number of bytes handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.heap.in_use()
    }
}

impl Allocator for CountingAllocator {
    fn allocate(&self, len: usize) -> Option<Box<[u8]>> {
        let index = self.allocations.get();

        self.allocations.set(index + 1);

        if self.fail_at == Some(index) {
            return None;
        }

        self.heap.allocate(len)
    }

    fn release(&self, buf: Box<[u8]>) {
        self.releases.set(self.releases.get() + 1);
        self.heap.release(buf)
    }
}
