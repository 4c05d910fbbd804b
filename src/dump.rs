//! Diagnostics for inspecting block device contents

use std::cell::RefCell;
use std::cmp;
use std::io::Write;

use sha2::{Digest, Sha256};

use crate::blockdev::BlockDevice;
use crate::buffer::{Allocator, ScopedBuffer};
use crate::error::{DeviceOp, DriverError, Error, Result};
use crate::stream::{BoundedStream, PatchStream, Region};

/// Writes `length` bytes at `address` to `out` as lowercase hex, followed by a newline.
pub(crate) fn print_blockdevice_content<A, D, W>(
    allocator: &A,
    device: &mut D,
    address: u64,
    length: u64,
    buffer_size: usize,
    out: &mut W,
) -> Result<()>
where
    A: Allocator + ?Sized,
    D: BlockDevice + ?Sized,
    W: Write + ?Sized,
{
    if buffer_size == 0 {
        return Err(Error::InvalidArgument("dump buffer size must not be zero"));
    }

    Region::new(address, length).check_within(device.size())?;

    let mut buffer = ScopedBuffer::new(allocator, buffer_size)?;
    let mut offset = address;
    let mut left = length;

    while left > 0 {
        let len = cmp::min(buffer.len() as u64, left) as usize;

        device
            .read(&mut buffer[..len], offset)
            .map_err(|DriverError(code)| Error::Device {
                op: DeviceOp::Read,
                address: offset,
                len,
                code,
            })?;

        for byte in &buffer[..len] {
            write!(out, "{:02x}", byte)?;
        }

        offset += len as u64;
        left -= len as u64;
    }

    writeln!(out)?;

    Ok(())
}

/// Computes the SHA-256 digest of `region`, reading it through one `buffer_size` window.
pub(crate) fn hash_region<A, D>(
    allocator: &A,
    device: &mut D,
    region: Region,
    buffer_size: usize,
) -> Result<[u8; 32]>
where
    A: Allocator + ?Sized,
    D: BlockDevice + ?Sized,
{
    let mut window = ScopedBuffer::new(allocator, buffer_size)?;
    let mut chunk = ScopedBuffer::new(allocator, buffer_size)?;

    let device = RefCell::new(device);
    let mut stream = BoundedStream::new(&device, region, &mut window)?;
    let mut hasher = Sha256::new();

    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break;
        }

        hasher.update(&chunk[..n]);
    }

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());

    Ok(digest)
}
