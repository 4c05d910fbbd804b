//! In-application access to on-chip flash

use log::trace;

use crate::error::DriverError;

/// Error code reported when a flash access falls outside of the mapped image.
pub const FLASH_ERROR_ADDRESS: i32 = -3001;

/// Error code reported when the flash is accessed before `init` or after `deinit`.
pub const FLASH_ERROR_NOT_INITIALIZED: i32 = -3002;

/// The read path of the on-chip flash controller.
pub trait FlashIap {
    /// Prepares the controller for reads.
    fn init(&mut self) -> Result<(), DriverError>;

    /// Reads `buf.len()` bytes starting at the absolute flash `address`.
    fn read(&mut self, buf: &mut [u8], address: usize) -> Result<(), DriverError>;

    /// Releases the controller.
    fn deinit(&mut self) -> Result<(), DriverError>;
}

impl<T: FlashIap + ?Sized> FlashIap for &mut T {
    fn init(&mut self) -> Result<(), DriverError> {
        (**self).init()
    }

    fn read(&mut self, buf: &mut [u8], address: usize) -> Result<(), DriverError> {
        (**self).read(buf, address)
    }

    fn deinit(&mut self) -> Result<(), DriverError> {
        (**self).deinit()
    }
}

/// Flash emulated by a byte image mapped at a base address.
#[derive(Debug, Clone)]
pub struct MemoryFlash {
    base: usize,
    image: Vec<u8>,
    initialized: bool,
}

impl MemoryFlash {
    pub fn new<T: Into<Vec<u8>>>(base: usize, image: T) -> MemoryFlash {
        MemoryFlash {
            base,
            image: image.into(),
            initialized: false,
        }
    }

    /// The first mapped address.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Number of mapped bytes.
    pub fn size(&self) -> usize {
        self.image.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl FlashIap for MemoryFlash {
    fn init(&mut self) -> Result<(), DriverError> {
        self.initialized = true;

        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], address: usize) -> Result<(), DriverError> {
        if !self.initialized {
            return Err(DriverError(FLASH_ERROR_NOT_INITIALIZED));
        }

        let start = address
            .checked_sub(self.base)
            .ok_or(DriverError(FLASH_ERROR_ADDRESS))?;
        let end = start
            .checked_add(buf.len())
            .filter(|end| *end <= self.image.len())
            .ok_or(DriverError(FLASH_ERROR_ADDRESS))?;

        trace!("flash read {} bytes at {:#010x}", buf.len(), address);

        buf.copy_from_slice(&self.image[start..end]);

        Ok(())
    }

    fn deinit(&mut self) -> Result<(), DriverError> {
        self.initialized = false;

        Ok(())
    }
}
