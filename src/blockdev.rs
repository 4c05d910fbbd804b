//! Block storage devices

mod file;
mod heap;

pub use file::FileBlockDevice;
pub use heap::HeapBlockDevice;

use crate::error::DriverError;

/// Error code reported by a device when the underlying medium fails.
pub const BD_ERROR_DEVICE_ERROR: i32 = -4001;

/// An interface to a storage device that is read and programmed at byte addresses.
///
/// Every call blocks until the device has completed the access.
pub trait BlockDevice {
    /// Reads `buf.len()` bytes starting at `address` into `buf`.
    fn read(&mut self, buf: &mut [u8], address: u64) -> Result<(), DriverError>;

    /// Programs the contents of `buf` at `address`.
    fn program(&mut self, buf: &[u8], address: u64) -> Result<(), DriverError>;

    /// Total size of the device in bytes.
    fn size(&self) -> u64;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    fn read(&mut self, buf: &mut [u8], address: u64) -> Result<(), DriverError> {
        (**self).read(buf, address)
    }

    fn program(&mut self, buf: &[u8], address: u64) -> Result<(), DriverError> {
        (**self).program(buf, address)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}
