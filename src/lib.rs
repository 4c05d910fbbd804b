//! Firmware migration and delta updates on block storage
//!
//! Two operations make up an update: [`copy_flash_to_blockdevice`] streams the running
//! firmware out of on-chip flash into a region of a block device, and [`apply_delta_update`]
//! later runs a [`PatchEngine`] over that stored source image and a stored patch to produce a
//! new target image. Both work within a handful of fixed-size buffers that are acquired up
//! front and always released before returning.

pub mod blockdev;
pub mod buffer;
mod copy;
mod dump;
mod error;
pub mod flash;
#[cfg(test)]
mod mock;
mod patch;
pub mod progress;
pub mod stream;

use std::io::Write;

pub use blockdev::{BlockDevice, FileBlockDevice, HeapBlockDevice};
pub use buffer::{Allocator, HeapAllocator, ScopedBuffer};
pub use error::{status, DeviceOp, DriverError, Error, Result, StatusCode};
pub use flash::{FlashIap, MemoryFlash};
pub use patch::PatchEngine;
pub use progress::{LogProgress, NoProgress, Progress};
pub use stream::{BoundedStream, PatchStream, Region};

/// Runs update operations with buffers taken from an [`Allocator`].
#[derive(Debug, Default)]
pub struct Updater<A: Allocator = HeapAllocator> {
    allocator: A,
}

impl Updater<HeapAllocator> {
    /// Creates an updater that allocates from the global heap.
    pub fn new() -> Updater<HeapAllocator> {
        Updater::with_allocator(HeapAllocator::new())
    }
}

impl<A: Allocator> Updater<A> {
    pub fn with_allocator(allocator: A) -> Updater<A> {
        Updater { allocator }
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Copies the firmware image at `flash_address..flash_address + flash_size` to
    /// `device_address` on `device`, using a single buffer of `page_size` bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use delta_update::{HeapBlockDevice, MemoryFlash, NoProgress, Updater};
    ///
    /// let mut flash = MemoryFlash::new(0x0800_0000, vec![0x42u8; 150]);
    /// let mut storage = HeapBlockDevice::new(1024);
    ///
    /// Updater::new().copy_flash_to_blockdevice(
    ///     &mut flash,
    ///     64,
    ///     0x0800_0000,
    ///     150,
    ///     &mut storage,
    ///     512,
    ///     &mut NoProgress,
    /// )?;
    ///
    /// assert_eq!(&storage.as_bytes()[512..662], &[0x42u8; 150][..]);
    /// # Ok::<(), delta_update::Error>(())
    /// ```
    #[allow(clippy::too_many_arguments)]
    pub fn copy_flash_to_blockdevice<F, D, P>(
        &self,
        flash: &mut F,
        page_size: u32,
        flash_address: usize,
        flash_size: usize,
        device: &mut D,
        device_address: u64,
        progress: &mut P,
    ) -> Result<()>
    where
        F: FlashIap + ?Sized,
        D: BlockDevice + ?Sized,
        P: Progress + ?Sized,
    {
        copy::copy_flash_to_blockdevice(
            &self.allocator,
            flash,
            page_size,
            flash_address,
            flash_size,
            device,
            device_address,
            progress,
        )
    }

    /// Runs `engine` over the `source` and `patch` regions of `device`, writing the result to
    /// the `target` region. Each of the three streams gets its own `buffer_size` buffer.
    ///
    /// The regions must not overlap. Errors reported by the engine are returned unchanged.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_delta_update<D, E, P>(
        &self,
        device: &mut D,
        buffer_size: usize,
        source: Region,
        patch: Region,
        target: Region,
        engine: &mut E,
        progress: &mut P,
    ) -> Result<()>
    where
        D: BlockDevice + ?Sized,
        E: PatchEngine + ?Sized,
        P: Progress,
    {
        patch::apply_delta_update(
            &self.allocator,
            device,
            buffer_size,
            source,
            patch,
            target,
            engine,
            progress,
        )
    }

    /// Renders `length` bytes at `address` as hex into `out`, reading `buffer_size` bytes at a
    /// time.
    pub fn print_blockdevice_content<D, W>(
        &self,
        device: &mut D,
        address: u64,
        length: u64,
        buffer_size: usize,
        out: &mut W,
    ) -> Result<()>
    where
        D: BlockDevice + ?Sized,
        W: Write + ?Sized,
    {
        dump::print_blockdevice_content(&self.allocator, device, address, length, buffer_size, out)
    }

    /// Returns the SHA-256 digest of `region`.
    pub fn hash_region<D>(&self, device: &mut D, region: Region, buffer_size: usize) -> Result<[u8; 32]>
    where
        D: BlockDevice + ?Sized,
    {
        dump::hash_region(&self.allocator, device, region, buffer_size)
    }
}

/// Copies a firmware image from flash to a block device with heap-allocated buffers.
///
/// See [`Updater::copy_flash_to_blockdevice`].
#[allow(clippy::too_many_arguments)]
pub fn copy_flash_to_blockdevice<F, D, P>(
    flash: &mut F,
    page_size: u32,
    flash_address: usize,
    flash_size: usize,
    device: &mut D,
    device_address: u64,
    progress: &mut P,
) -> Result<()>
where
    F: FlashIap + ?Sized,
    D: BlockDevice + ?Sized,
    P: Progress + ?Sized,
{
    Updater::new().copy_flash_to_blockdevice(
        flash,
        page_size,
        flash_address,
        flash_size,
        device,
        device_address,
        progress,
    )
}

/// Applies a delta update with heap-allocated buffers.
///
/// See [`Updater::apply_delta_update`].
#[allow(clippy::too_many_arguments)]
pub fn apply_delta_update<D, E, P>(
    device: &mut D,
    buffer_size: usize,
    source: Region,
    patch: Region,
    target: Region,
    engine: &mut E,
    progress: &mut P,
) -> Result<()>
where
    D: BlockDevice + ?Sized,
    E: PatchEngine + ?Sized,
    P: Progress,
{
    Updater::new().apply_delta_update(device, buffer_size, source, patch, target, engine, progress)
}

/// Hex-dumps a range of a block device with a heap-allocated buffer.
pub fn print_blockdevice_content<D, W>(
    device: &mut D,
    address: u64,
    length: u64,
    buffer_size: usize,
    out: &mut W,
) -> Result<()>
where
    D: BlockDevice + ?Sized,
    W: Write + ?Sized,
{
    Updater::new().print_blockdevice_content(device, address, length, buffer_size, out)
}
