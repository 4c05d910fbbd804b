//! Fixed-size working buffers
//!
//! All buffers used by an operation are acquired up front through an [`Allocator`] and handed
//! back when the owning [`ScopedBuffer`] goes out of scope, on success and error paths alike.

use std::cell::Cell;
use std::fmt;
use std::ops::{Deref, DerefMut};

use log::trace;

use crate::error::{Error, Result};

/// A source of fixed-size byte buffers.
pub trait Allocator {
    /// Returns a zeroed buffer of exactly `len` bytes, or `None` when memory is exhausted.
    fn allocate(&self, len: usize) -> Option<Box<[u8]>>;

    /// Takes back a buffer previously returned by `allocate`.
    fn release(&self, buf: Box<[u8]>);
}

/// Allocates from the global heap, optionally capped at a fixed number of outstanding bytes.
#[derive(Debug, Default)]
pub struct HeapAllocator {
    limit: Option<usize>,
    in_use: Cell<usize>,
}

impl HeapAllocator {
    pub fn new() -> HeapAllocator {
        HeapAllocator::default()
    }

    /// Creates an allocator that refuses to hand out more than `limit` bytes at a time.
    pub fn with_limit(limit: usize) -> HeapAllocator {
        HeapAllocator {
            limit: Some(limit),
            in_use: Cell::new(0),
        }
    }

    /// Number of bytes currently handed out.
    pub fn in_use(&self) -> usize {
        self.in_use.get()
    }
}

impl Allocator for HeapAllocator {
    fn allocate(&self, len: usize) -> Option<Box<[u8]>> {
        let in_use = self.in_use.get().checked_add(len)?;

        if matches!(self.limit, Some(limit) if in_use > limit) {
            return None;
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(len).ok()?;
        buf.resize(len, 0);

        self.in_use.set(in_use);

        Some(buf.into_boxed_slice())
    }

    fn release(&self, buf: Box<[u8]>) {
        self.in_use.set(self.in_use.get().saturating_sub(buf.len()));
    }
}

/// A buffer that is returned to its allocator exactly once, when dropped.
pub struct ScopedBuffer<'a, A: Allocator + ?Sized> {
    allocator: &'a A,
    buf: Option<Box<[u8]>>,
}

impl<'a, A: Allocator + ?Sized> ScopedBuffer<'a, A> {
    /// Acquires `len` bytes from `allocator`, failing with `Error::NoMemory` when it can't.
    pub fn new(allocator: &'a A, len: usize) -> Result<ScopedBuffer<'a, A>> {
        let buf = allocator.allocate(len).ok_or(Error::NoMemory(len))?;

        trace!("Acquired buffer of {} bytes", len);

        Ok(ScopedBuffer {
            allocator,
            buf: Some(buf),
        })
    }
}

impl<A: Allocator + ?Sized> Deref for ScopedBuffer<'_, A> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl<A: Allocator + ?Sized> DerefMut for ScopedBuffer<'_, A> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl<A: Allocator + ?Sized> Drop for ScopedBuffer<'_, A> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            trace!("Releasing buffer of {} bytes", buf.len());

            self.allocator.release(buf);
        }
    }
}

impl<A: Allocator + ?Sized> fmt::Debug for ScopedBuffer<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedBuffer")
            .field("len", &self.len())
            .finish()
    }
}
