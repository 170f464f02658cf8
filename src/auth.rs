//! GPU device authentication
//!
//! The host renders with a DRM device it already holds master on. To share
//! it, the bridge opens the same device node, asks the kernel for a magic
//! cookie, and hands that cookie to the host, which authenticates it.
//!
//! The cookie comes straight from the `DRM_IOCTL_GET_MAGIC` wrapper in
//! `drm-ffi`; `drm::Device` only hands it out as an opaque token.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::Path;

use log::debug;

/// Opens GPU device nodes and produces their magic cookies.
pub trait DeviceAuthenticator {
    /// Open the device node read/write.
    fn open(&mut self, path: &Path) -> io::Result<OwnedFd>;

    /// Magic cookie identifying `device` to the DRM master.
    fn magic(&mut self, device: BorrowedFd<'_>) -> io::Result<u32>;
}

/// Authenticator backed by the kernel DRM interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct DrmAuthenticator;

struct Card<'a>(BorrowedFd<'a>);

impl AsFd for Card<'_> {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0
    }
}

impl drm::Device for Card<'_> {}

impl DeviceAuthenticator for DrmAuthenticator {
    fn open(&mut self, path: &Path) -> io::Result<OwnedFd> {
        use drm::Device;

        debug!("🔑 Opening GPU device {}", path.display());
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        match Card(file.as_fd()).get_driver() {
            Ok(driver) => debug!("GPU driver: {}", driver.name().to_string_lossy()),
            Err(e) => debug!("No DRM driver behind {}: {}", path.display(), e),
        }
        Ok(OwnedFd::from(file))
    }

    fn magic(&mut self, device: BorrowedFd<'_>) -> io::Result<u32> {
        let auth = drm_ffi::auth::get_magic_token(device)?;
        debug!("🔑 Got magic {:#x}", auth.magic);
        Ok(auth.magic)
    }
}
