//! Delta update application

use std::cell::RefCell;

use log::{debug, warn};

use crate::blockdev::BlockDevice;
use crate::buffer::{Allocator, ScopedBuffer};
use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::stream::{BoundedStream, PatchStream, Region};

/// A binary patch algorithm that rebuilds a target image from a source image and a patch.
///
/// The engine drives all I/O through the given streams. Stream failures should be propagated
/// as-is; failures of the engine itself are reported as `Error::Engine` with the engine's own
/// status code.
pub trait PatchEngine {
    fn apply(
        &mut self,
        source: &mut dyn PatchStream,
        patch: &mut dyn PatchStream,
        target: &mut dyn PatchStream,
        progress: &mut dyn Progress,
    ) -> Result<()>;
}

impl<T: PatchEngine + ?Sized> PatchEngine for &mut T {
    fn apply(
        &mut self,
        source: &mut dyn PatchStream,
        patch: &mut dyn PatchStream,
        target: &mut dyn PatchStream,
        progress: &mut dyn Progress,
    ) -> Result<()> {
        (**self).apply(source, patch, target, progress)
    }
}

/// Applies `patch` to `source` and writes the result to `target`, all three being regions of
/// `device`.
///
/// Three `buffer_size` buffers are acquired up front, one per stream, and are released before
/// returning whatever the outcome. The engine's result is returned unchanged.
#[allow(clippy::too_many_arguments)]
pub(crate) fn apply_delta_update<A, D, E, P>(
    allocator: &A,
    device: &mut D,
    buffer_size: usize,
    source: Region,
    patch: Region,
    target: Region,
    engine: &mut E,
    progress: &mut P,
) -> Result<()>
where
    A: Allocator + ?Sized,
    D: BlockDevice + ?Sized,
    E: PatchEngine + ?Sized,
    P: Progress,
{
    if buffer_size == 0 {
        return Err(Error::InvalidArgument("stream buffer size must not be zero"));
    }

    if source.overlaps(&patch) || source.overlaps(&target) || patch.overlaps(&target) {
        return Err(Error::InvalidArgument("source, patch and target regions overlap"));
    }

    let size = device.size();

    source.check_within(size)?;
    patch.check_within(size)?;
    target.check_within(size)?;

    let mut source_buffer = ScopedBuffer::new(allocator, buffer_size)?;
    let mut patch_buffer = ScopedBuffer::new(allocator, buffer_size)?;
    let mut target_buffer = ScopedBuffer::new(allocator, buffer_size)?;

    let device = RefCell::new(device);
    let mut source = BoundedStream::new(&device, source, &mut source_buffer)?;
    let mut patch = BoundedStream::new(&device, patch, &mut patch_buffer)?;
    let mut target = BoundedStream::new(&device, target, &mut target_buffer)?;

    debug!(
        "Applying patch {:?} to {:?} into {:?} with {} byte buffers",
        patch.region(),
        source.region(),
        target.region(),
        buffer_size
    );

    if let Err(err) = engine.apply(&mut source, &mut patch, &mut target, progress) {
        warn!("Patch engine failed: {}", err);

        return Err(err);
    }

    target.close()?;
    patch.close()?;
    source.close()?;

    debug!("Patch applied");

    Ok(())
}
