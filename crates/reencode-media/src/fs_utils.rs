//! File moves and size helpers.

use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Whole mebibytes in `bytes`, rounded down.
pub fn bytes_to_mib(bytes: u64) -> u64 {
    bytes / BYTES_PER_MIB
}

/// Move `src` onto `dst`, replacing it.
///
/// Falls back to copy+delete when a rename crosses filesystems, which is
/// the usual case for a temp dir and a media library.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let (src, dst) = (src.as_ref(), dst.as_ref());

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(EXDEV) => {
            debug!(from = %src.display(), to = %dst.display(), "Rename crosses devices, copying");
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

/// errno for a rename across filesystems (Linux and macOS).
const EXDEV: i32 = 18;

/// Copy into a `.partial` sibling of `dst`, rename it into place, then
/// drop the source. `dst` never holds a half-written file.
async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let partial = dst.with_extension("partial");

    if let Err(e) = fs::copy(src, &partial).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&partial, dst).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!(file = %src.display(), "Moved file but could not remove source: {}", e);
    }
    Ok(())
}
