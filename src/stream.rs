//! Buffered, seekable streams over a region of a block device
//!
//! A [`BoundedStream`] gives a patch engine random access to one region of a block device
//! through a single caller-supplied buffer. The buffer caches one aligned window of the
//! region at a time; seeking only moves the cursor, and the device is touched only when a read
//! or write needs a window that isn't cached.

use std::cell::RefCell;
use std::cmp;
use std::io::SeekFrom;

use log::trace;

use crate::blockdev::BlockDevice;
use crate::error::{DeviceOp, DriverError, Error, Result};

/// A fixed address range on a block device.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct Region {
    start: u64,
    len: u64,
}

impl Region {
    pub fn new(start: u64, len: u64) -> Region {
        Region { start, len }
    }

    /// The first device address of the region.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// The length of the region in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if both regions share at least one byte.
    pub fn overlaps(&self, other: &Region) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }

        self.start < other.start.saturating_add(other.len)
            && other.start < self.start.saturating_add(self.len)
    }

    /// Checks that the region lies within a device of `device_size` bytes.
    pub(crate) fn check_within(&self, device_size: u64) -> Result<()> {
        match self.start.checked_add(self.len) {
            Some(end) if end <= device_size => Ok(()),
            _ => Err(Error::OutOfRange {
                offset: self.start,
                len: self.len,
                region_len: device_size,
            }),
        }
    }
}

/// Random-access I/O over a bounded stream, as consumed by patch engines.
pub trait PatchStream {
    /// Reads up to `dst.len()` bytes at the cursor. Returns fewer bytes only at the end of the
    /// stream.
    fn read(&mut self, dst: &mut [u8]) -> Result<usize>;

    /// Writes all of `src` at the cursor, or nothing if it doesn't fit.
    fn write(&mut self, src: &[u8]) -> Result<()>;

    /// Moves the cursor and returns its new offset.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// The current cursor offset.
    fn tell(&self) -> u64;
}

/// A [`PatchStream`] over one region of a shared block device.
#[derive(Debug)]
pub struct BoundedStream<'a, D: BlockDevice> {
    device: &'a RefCell<D>,
    region: Region,
    buffer: &'a mut [u8],
    /// Region offset of the cached window, always a multiple of the buffer length.
    window: Option<u64>,
    dirty: bool,
    cursor: u64,
}

impl<'a, D: BlockDevice> BoundedStream<'a, D> {
    /// Binds `buffer` to `region` of `device`. No device access happens until the first read or
    /// write.
    pub fn new(
        device: &'a RefCell<D>,
        region: Region,
        buffer: &'a mut [u8],
    ) -> Result<BoundedStream<'a, D>> {
        if buffer.is_empty() {
            return Err(Error::InvalidArgument("stream buffer must not be empty"));
        }

        region.check_within(device.borrow().size())?;

        Ok(BoundedStream {
            device,
            region,
            buffer,
            window: None,
            dirty: false,
            cursor: 0,
        })
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Size of the window buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Region offset of the cached window, if any.
    pub fn window(&self) -> Option<u64> {
        self.window
    }

    /// Whether the cached window holds writes that haven't reached the device yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Programs the cached window to the device if it is dirty. The window stays cached.
    pub fn flush(&mut self) -> Result<()> {
        let origin = match self.window {
            Some(origin) if self.dirty => origin,
            _ => return Ok(()),
        };

        let len = self.window_len(origin);
        let address = self.region.start + origin;

        trace!("Flushing {} bytes to {:#x}", len, address);

        self.device
            .borrow_mut()
            .program(&self.buffer[..len], address)
            .map_err(|DriverError(code)| Error::Device {
                op: DeviceOp::Program,
                address,
                len,
                code,
            })?;

        self.dirty = false;

        Ok(())
    }

    /// Flushes pending writes and releases the buffer borrow.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    /// Number of valid bytes in the window starting at `origin`; shorter than the buffer at the
    /// end of the region.
    fn window_len(&self, origin: u64) -> usize {
        cmp::min(self.buffer.len() as u64, self.region.len - origin) as usize
    }

    /// Makes sure the window containing `offset` is cached, flushing the previous one if it was
    /// dirty. Returns the buffer index of `offset` and the number of valid bytes in the window.
    fn fill(&mut self, offset: u64) -> Result<(usize, usize)> {
        let capacity = self.buffer.len() as u64;
        let origin = offset / capacity * capacity;
        let len = self.window_len(origin);

        if self.window != Some(origin) {
            self.flush()?;
            self.window = None;

            let address = self.region.start + origin;

            trace!("Filling {} bytes from {:#x}", len, address);

            self.device
                .borrow_mut()
                .read(&mut self.buffer[..len], address)
                .map_err(|DriverError(code)| Error::Device {
                    op: DeviceOp::Read,
                    address,
                    len,
                    code,
                })?;

            self.window = Some(origin);
        }

        Ok(((offset - origin) as usize, len))
    }
}

impl<D: BlockDevice> PatchStream for BoundedStream<'_, D> {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        let available = self.region.len - self.cursor;
        let total = cmp::min(dst.len() as u64, available) as usize;
        let mut done = 0;

        while done < total {
            let (index, len) = self.fill(self.cursor)?;
            let n = cmp::min(total - done, len - index);

            dst[done..done + n].copy_from_slice(&self.buffer[index..index + n]);

            done += n;
            self.cursor += n as u64;
        }

        Ok(total)
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        let fits = self
            .cursor
            .checked_add(src.len() as u64)
            .map_or(false, |end| end <= self.region.len);

        if !fits {
            return Err(Error::OutOfRange {
                offset: self.cursor,
                len: src.len() as u64,
                region_len: self.region.len,
            });
        }

        let mut done = 0;

        while done < src.len() {
            let (index, len) = self.fill(self.cursor)?;
            let n = cmp::min(src.len() - done, len - index);

            self.buffer[index..index + n].copy_from_slice(&src[done..done + n]);
            self.dirty = true;

            done += n;
            self.cursor += n as u64;
        }

        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => offset_by(self.cursor, delta),
            SeekFrom::End(delta) => offset_by(self.region.len, delta),
        };

        match target {
            Some(offset) if offset <= self.region.len => {
                self.cursor = offset;

                Ok(offset)
            }
            Some(offset) => Err(Error::OutOfRange {
                offset,
                len: 0,
                region_len: self.region.len,
            }),
            None => Err(Error::InvalidArgument("seek outside of the addressable range")),
        }
    }

    fn tell(&self) -> u64 {
        self.cursor
    }
}

fn offset_by(base: u64, delta: i64) -> Option<u64> {
    if delta >= 0 {
        base.checked_add(delta as u64)
    } else {
        base.checked_sub(delta.unsigned_abs())
    }
}
