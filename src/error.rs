use std::fmt;
use std::io;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// Status codes owned by this crate.
///
/// Codes reported by flash drivers, block device drivers and patch engines are passed through
/// unchanged and are therefore not part of this enumeration.
#[repr(i32)]
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
pub enum StatusCode {
    #[error("MBED_DELTA_UPDATE_OK")]
    Ok = 0,

    #[error("Could not allocate a buffer")]
    NoMemory = -8401,

    #[error("Access outside of the bound region")]
    OutOfRange = -8402,

    #[error("Invalid argument")]
    InvalidArgument = -8403,

    #[error("Could not render output")]
    Output = -8404,
}

/// A failure reported by a flash or block device driver, carrying the driver's native code.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
#[error("driver error {0}")]
pub struct DriverError(pub i32);

/// The kind of block device access that failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeviceOp {
    Read,
    Program,
}

impl fmt::Display for DeviceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceOp::Read => f.write_str("read"),
            DeviceOp::Program => f.write_str("program"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not allocate a buffer of {0} bytes")]
    NoMemory(usize),

    #[error("Flash initialization failed with code {0}")]
    FlashInit(i32),

    #[error("Flash read of {len} bytes at {address:#010x} failed with code {code}")]
    FlashRead { address: usize, len: usize, code: i32 },

    #[error("Flash deinitialization failed with code {0}")]
    FlashDeinit(i32),

    #[error("Block device {op} of {len} bytes at {address:#x} failed with code {code}")]
    Device {
        op: DeviceOp,
        address: u64,
        len: usize,
        code: i32,
    },

    #[error("Access of {len} bytes at offset {offset} exceeds region length {region_len}")]
    OutOfRange { offset: u64, len: u64, region_len: u64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Patch engine failed with code {0}")]
    Engine(i32),

    #[error("I/O error: {}", _0)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns the status code of this error.
    ///
    /// Driver and engine failures return the code they were reported with.
    pub fn code(&self) -> i32 {
        match *self {
            Error::NoMemory(_) => StatusCode::NoMemory.into(),
            Error::FlashInit(code) | Error::FlashDeinit(code) | Error::Engine(code) => code,
            Error::FlashRead { code, .. } | Error::Device { code, .. } => code,
            Error::OutOfRange { .. } => StatusCode::OutOfRange.into(),
            Error::InvalidArgument(_) => StatusCode::InvalidArgument.into(),
            Error::Io(_) => StatusCode::Output.into(),
        }
    }

    /// Returns the crate status code this error maps to, or `None` for pass-through codes.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Error::FlashInit(_)
            | Error::FlashRead { .. }
            | Error::FlashDeinit(_)
            | Error::Device { .. }
            | Error::Engine(_) => None,
            _ => StatusCode::try_from_primitive(self.code()).ok(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Collapses the result of an operation into a status code, `0` on success and negative on
/// failure.
pub fn status(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => StatusCode::Ok.into(),
        Err(err) => err.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_keep_the_documented_status_values() {
        assert_eq!(i32::from(StatusCode::Ok), 0);
        assert_eq!(i32::from(StatusCode::NoMemory), -8401);
        assert_eq!(StatusCode::try_from_primitive(-8401).unwrap(), StatusCode::NoMemory);
        assert!(StatusCode::try_from_primitive(-1).is_err());
    }

    #[test]
    fn it_should_pass_driver_codes_through() {
        let err = Error::FlashRead {
            address: 0x8000,
            len: 64,
            code: -3002,
        };

        assert_eq!(err.code(), -3002);
        assert_eq!(err.status_code(), None);
        assert_eq!(Error::Engine(-5).code(), -5);
    }

    #[test]
    fn it_should_collapse_results_into_status_codes() {
        assert_eq!(status(&Ok(())), 0);
        assert_eq!(status(&Err(Error::NoMemory(128))), -8401);
        assert_eq!(
            Error::NoMemory(128).status_code(),
            Some(StatusCode::NoMemory)
        );
        assert_eq!(status(&Err(Error::InvalidArgument("zero"))), -8403);
    }
}
