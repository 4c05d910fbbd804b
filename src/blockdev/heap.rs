use log::trace;

use super::{BlockDevice, BD_ERROR_DEVICE_ERROR};
use crate::error::DriverError;

/// RAM-backed block device.
#[derive(Debug, Clone, Default)]
pub struct HeapBlockDevice {
    data: Vec<u8>,
    reads: usize,
    programs: usize,
}

impl HeapBlockDevice {
    /// Creates a device of `size` bytes, all erased to `0xff`.
    pub fn new(size: usize) -> HeapBlockDevice {
        HeapBlockDevice::from_bytes(vec![0xff; size])
    }

    /// Creates a device holding a copy of `data`.
    pub fn from_bytes<T: Into<Vec<u8>>>(data: T) -> HeapBlockDevice {
        HeapBlockDevice {
            data: data.into(),
            reads: 0,
            programs: 0,
        }
    }

    /// The raw contents of the device.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of read calls issued against the device.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Number of program calls issued against the device.
    pub fn programs(&self) -> usize {
        self.programs
    }

    fn range(&self, address: u64, len: usize) -> Result<std::ops::Range<usize>, DriverError> {
        let start = address as usize;

        match start.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(start..end),
            _ => Err(DriverError(BD_ERROR_DEVICE_ERROR)),
        }
    }
}

impl BlockDevice for HeapBlockDevice {
    fn read(&mut self, buf: &mut [u8], address: u64) -> Result<(), DriverError> {
        let range = self.range(address, buf.len())?;

        trace!("heap read {} bytes at {:#x}", buf.len(), address);

        self.reads += 1;
        buf.copy_from_slice(&self.data[range]);

        Ok(())
    }

    fn program(&mut self, buf: &[u8], address: u64) -> Result<(), DriverError> {
        let range = self.range(address, buf.len())?;

        trace!("heap program {} bytes at {:#x}", buf.len(), address);

        self.programs += 1;
        self.data[range].copy_from_slice(buf);

        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_start_erased() {
        let bd = HeapBlockDevice::new(16);

        assert_eq!(bd.size(), 16);
        assert!(bd.as_bytes().iter().all(|b| *b == 0xff));
    }

    #[test]
    fn it_should_program_and_read_back() {
        let mut bd = HeapBlockDevice::new(16);
        let mut buf = [0u8; 4];

        bd.program(&[1, 2, 3, 4], 6).unwrap();
        bd.read(&mut buf, 6).unwrap();

        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(bd.reads(), 1);
        assert_eq!(bd.programs(), 1);
    }

    #[test]
    fn it_should_reject_access_past_the_end() {
        let mut bd = HeapBlockDevice::new(16);
        let mut buf = [0u8; 4];

        assert_eq!(bd.read(&mut buf, 13), Err(DriverError(BD_ERROR_DEVICE_ERROR)));
        assert_eq!(bd.program(&buf, u64::MAX), Err(DriverError(BD_ERROR_DEVICE_ERROR)));
        assert_eq!(bd.reads(), 0);
    }
}
