use std::cmp;

use log::{debug, warn};

use crate::blockdev::BlockDevice;
use crate::buffer::{Allocator, ScopedBuffer};
use crate::error::{DeviceOp, DriverError, Error, Result};
use crate::flash::FlashIap;
use crate::progress::{Progress, ProgressTracker};

/// Copies `flash_size` bytes of flash starting at `flash_address` to `device_address` on
/// `device`, one page at a time through a single `page_size` buffer.
///
/// The buffer is acquired before the flash is initialized, so running out of memory leaves the
/// flash controller untouched. Progress is reported whenever the completed percentage changes,
/// ending with a single 100%.
#[allow(clippy::too_many_arguments)]
pub(crate) fn copy_flash_to_blockdevice<A, F, D, P>(
    allocator: &A,
    flash: &mut F,
    page_size: u32,
    flash_address: usize,
    flash_size: usize,
    device: &mut D,
    device_address: u64,
    progress: &mut P,
) -> Result<()>
where
    A: Allocator + ?Sized,
    F: FlashIap + ?Sized,
    D: BlockDevice + ?Sized,
    P: Progress + ?Sized,
{
    if page_size == 0 {
        return Err(Error::InvalidArgument("flash page size must not be zero"));
    }

    if flash_address.checked_add(flash_size).is_none() {
        return Err(Error::InvalidArgument("flash range wraps the address space"));
    }

    match device_address.checked_add(flash_size as u64) {
        Some(end) if end <= device.size() => {}
        _ => {
            return Err(Error::OutOfRange {
                offset: device_address,
                len: flash_size as u64,
                region_len: device.size(),
            })
        }
    }

    debug!(
        "Copying {} bytes of flash at {:#010x} to block device at {:#x} in pages of {}",
        flash_size, flash_address, device_address, page_size
    );

    let mut page = ScopedBuffer::new(allocator, page_size as usize)?;

    flash.init().map_err(|DriverError(code)| {
        warn!("Flash initialization failed with code {}", code);
        Error::FlashInit(code)
    })?;

    let mut tracker = ProgressTracker::new(flash_size as u64);
    let mut copied = 0usize;

    while copied < flash_size {
        let len = cmp::min(page.len(), flash_size - copied);
        let address = flash_address + copied;
        let destination = device_address + copied as u64;

        flash
            .read(&mut page[..len], address)
            .map_err(|DriverError(code)| {
                warn!("Flash read at {:#010x} failed with code {}", address, code);
                Error::FlashRead { address, len, code }
            })?;

        device
            .program(&page[..len], destination)
            .map_err(|DriverError(code)| {
                warn!("Programming {:#x} failed with code {}", destination, code);
                Error::Device {
                    op: DeviceOp::Program,
                    address: destination,
                    len,
                    code,
                }
            })?;

        copied += len;
        tracker.update(copied as u64, progress);
    }

    drop(page);

    flash
        .deinit()
        .map_err(|DriverError(code)| Error::FlashDeinit(code))?;

    tracker.finish(progress);

    debug!("Copied {} bytes from flash", copied);

    Ok(())
}
