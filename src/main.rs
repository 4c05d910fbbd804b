use std::convert::TryFrom;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, Context};
use log::debug;
use structopt::StructOpt;

use delta_update::{
    FileBlockDevice, HeapAllocator, LogProgress, MemoryFlash, Region, Updater,
};

mod cli;

use cli::{Command, MigrateOpts, RangeOpts};

fn to_usize(value: u64, what: &str) -> Result<usize, anyhow::Error> {
    usize::try_from(value).map_err(|_| anyhow!("{} {} does not fit in memory", what, value))
}

fn migrate(updater: &Updater, opts: &MigrateOpts) -> Result<(), anyhow::Error> {
    let image = fs::read(&opts.flash_image).with_context(|| {
        format!(
            "Failed to read flash image '{}'",
            opts.flash_image.as_path().display()
        )
    })?;

    let flash_base = to_usize(opts.flash_base, "flash base")?;
    let flash_address = to_usize(opts.flash_address.unwrap_or(opts.flash_base), "flash address")?;
    let flash_offset = flash_address
        .checked_sub(flash_base)
        .filter(|offset| *offset <= image.len())
        .ok_or_else(|| anyhow!("Flash address {:#010x} is outside of the image", flash_address))?;
    let flash_size = match opts.size {
        Some(size) => to_usize(size, "size")?,
        None => image.len() - flash_offset,
    };
    let page_size = u32::try_from(opts.page_size)
        .map_err(|_| anyhow!("Page size {} is too large", opts.page_size))?;

    let mut storage = FileBlockDevice::create(&opts.storage, opts.address + flash_size as u64)
        .with_context(|| {
            format!(
                "Failed to open storage file '{}'",
                opts.storage.as_path().display()
            )
        })?;
    let mut flash = MemoryFlash::new(flash_base, image);

    println!(
        "Copying {} bytes of flash at {:#010x} to {} at {:#x}",
        flash_size,
        flash_address,
        opts.storage.as_path().display(),
        opts.address
    );

    updater
        .copy_flash_to_blockdevice(
            &mut flash,
            page_size,
            flash_address,
            flash_size,
            &mut storage,
            opts.address,
            &mut LogProgress::new("Copying from flash to blockdevice"),
        )
        .with_context(|| "Failed to copy flash to block device")?;

    Ok(())
}

fn open_storage<P: AsRef<Path>>(path: P) -> Result<FileBlockDevice, anyhow::Error> {
    FileBlockDevice::open(&path).with_context(|| {
        format!(
            "Failed to open storage file '{}'",
            path.as_ref().display()
        )
    })
}

fn dump(updater: &Updater, opts: &RangeOpts, buffer_size: usize) -> Result<(), anyhow::Error> {
    let mut storage = open_storage(&opts.storage)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    updater
        .print_blockdevice_content(&mut storage, opts.address, opts.length, buffer_size, &mut out)
        .with_context(|| "Failed to dump block device content")?;
    out.flush()?;

    Ok(())
}

fn hash(updater: &Updater, opts: &RangeOpts, buffer_size: usize) -> Result<(), anyhow::Error> {
    let mut storage = open_storage(&opts.storage)?;
    let digest = updater
        .hash_region(
            &mut storage,
            Region::new(opts.address, opts.length),
            buffer_size,
        )
        .with_context(|| "Failed to hash block device region")?;

    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();

    println!("{}  {}", hex, opts.storage.as_path().display());

    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    // Create a logger with a timestamp, filtered through RUST_LOG
    pretty_env_logger::init_timed();

    // Parse the command-line arguments
    let opts = cli::Opts::from_args();
    let buffer_size = to_usize(opts.buffer_size, "buffer size")?;

    let allocator = match opts.heap_limit {
        Some(limit) => HeapAllocator::with_limit(to_usize(limit, "heap limit")?),
        None => HeapAllocator::new(),
    };
    let updater = Updater::with_allocator(allocator);

    debug!("Parsed options: {:?}", opts);

    match &opts.command {
        Command::Migrate(migrate_opts) => migrate(&updater, migrate_opts)?,
        Command::Dump(range) => dump(&updater, range, buffer_size)?,
        Command::Hash(range) => hash(&updater, range, buffer_size)?,
    }

    Ok(())
}
