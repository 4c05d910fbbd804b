use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, warn};

use super::{BlockDevice, BD_ERROR_DEVICE_ERROR};
use crate::error::DriverError;

/// Block device backed by a file on the host, used to stage images outside of the target.
#[derive(Debug)]
pub struct FileBlockDevice {
    file: File,
    size: u64,
}

impl FileBlockDevice {
    /// Opens an existing file as a device spanning the whole file.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<FileBlockDevice> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let size = file.metadata()?.len();

        debug!("Opened {} as block device of {} bytes", path.as_ref().display(), size);

        Ok(FileBlockDevice { file, size })
    }

    /// Opens `path`, creating it if needed, and makes sure it is at least `size` bytes long.
    pub fn create<P: AsRef<Path>>(path: P, size: u64) -> io::Result<FileBlockDevice> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;

        if file.metadata()?.len() < size {
            file.set_len(size)?;
        }

        let size = file.metadata()?.len();

        debug!("Created {} as block device of {} bytes", path.as_ref().display(), size);

        Ok(FileBlockDevice { file, size })
    }

    fn check(&self, address: u64, len: usize) -> Result<(), DriverError> {
        match address.checked_add(len as u64) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(DriverError(BD_ERROR_DEVICE_ERROR)),
        }
    }
}

fn device_error(err: io::Error) -> DriverError {
    warn!("File block device I/O failed: {}", err);

    DriverError(BD_ERROR_DEVICE_ERROR)
}

impl BlockDevice for FileBlockDevice {
    fn read(&mut self, buf: &mut [u8], address: u64) -> Result<(), DriverError> {
        self.check(address, buf.len())?;
        self.file
            .seek(SeekFrom::Start(address))
            .map_err(device_error)?;
        self.file.read_exact(buf).map_err(device_error)
    }

    fn program(&mut self, buf: &[u8], address: u64) -> Result<(), DriverError> {
        self.check(address, buf.len())?;
        self.file
            .seek(SeekFrom::Start(address))
            .map_err(device_error)?;
        self.file.write_all(buf).map_err(device_error)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_grow_a_new_file_to_the_requested_size() {
        let dir = tempfile::tempdir().unwrap();
        let bd = FileBlockDevice::create(dir.path().join("storage.bin"), 4096).unwrap();

        assert_eq!(bd.size(), 4096);
    }

    #[test]
    fn it_should_persist_programmed_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.bin");

        {
            let mut bd = FileBlockDevice::create(&path, 64).unwrap();
            bd.program(b"firmware", 10).unwrap();
        }

        let mut bd = FileBlockDevice::open(&path).unwrap();
        let mut buf = [0u8; 8];
        bd.read(&mut buf, 10).unwrap();

        assert_eq!(&buf, b"firmware");
    }

    #[test]
    fn it_should_refuse_to_grow_through_program() {
        let dir = tempfile::tempdir().unwrap();
        let mut bd = FileBlockDevice::create(dir.path().join("storage.bin"), 8).unwrap();

        assert_eq!(
            bd.program(&[0u8; 4], 6),
            Err(DriverError(BD_ERROR_DEVICE_ERROR))
        );
        assert_eq!(bd.size(), 8);
    }
}
