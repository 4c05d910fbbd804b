use std::num::ParseIntError;
use std::path::PathBuf;

use structopt::StructOpt;

/// Parses decimal or `0x`-prefixed hexadecimal numbers.
fn parse_number(src: &str) -> Result<u64, ParseIntError> {
    match src.strip_prefix("0x").or_else(|| src.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => src.parse(),
    }
}

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Copy a flash image into a storage file, as done before a delta update
    Migrate(MigrateOpts),
    /// Print a range of a storage file as hex
    Dump(RangeOpts),
    /// Print the SHA-256 digest of a range of a storage file
    Hash(RangeOpts),
}

#[derive(StructOpt, Debug)]
pub struct MigrateOpts {
    /// The flash image to copy from
    #[structopt(required = true)]
    pub flash_image: PathBuf,
    /// The storage file to copy into, created if it doesn't exist
    #[structopt(required = true)]
    pub storage: PathBuf,
    /// Address the flash image is mapped at
    #[structopt(long = "flash-base", default_value = "0", parse(try_from_str = parse_number))]
    pub flash_base: u64,
    /// First flash address to copy, defaults to the flash base
    #[structopt(long = "flash-address", parse(try_from_str = parse_number))]
    pub flash_address: Option<u64>,
    /// Number of bytes to copy, defaults to the rest of the image
    #[structopt(long = "size", parse(try_from_str = parse_number))]
    pub size: Option<u64>,
    /// Offset in the storage file to copy to
    #[structopt(long = "address", default_value = "0", parse(try_from_str = parse_number))]
    pub address: u64,
    /// Flash page size, also the size of the copy buffer
    #[structopt(
        env = "DELTA_PAGE_SIZE",
        long = "page-size",
        default_value = "4096",
        parse(try_from_str = parse_number)
    )]
    pub page_size: u64,
}

#[derive(StructOpt, Debug)]
pub struct RangeOpts {
    /// The storage file to read
    #[structopt(required = true)]
    pub storage: PathBuf,
    /// Offset of the range
    #[structopt(required = true, parse(try_from_str = parse_number))]
    pub address: u64,
    /// Length of the range
    #[structopt(required = true, parse(try_from_str = parse_number))]
    pub length: u64,
}

#[derive(StructOpt, Debug)]
pub struct Opts {
    #[structopt(subcommand)]
    pub command: Command,

    /// Size of each working buffer
    #[structopt(
        env = "DELTA_BUFFER_SIZE",
        short = "b",
        long = "buffer-size",
        default_value = "512",
        parse(try_from_str = parse_number)
    )]
    pub buffer_size: u64,
    /// Maximum number of buffer bytes in use at once, to mimic a constrained target
    #[structopt(long = "heap-limit", parse(try_from_str = parse_number))]
    pub heap_limit: Option<u64>,
}
