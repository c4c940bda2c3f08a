/* 📖 # Why an IdentityContext object?

Installations that share score and save directories run setgid: files in the shared
directories are written with the elevated group, everything else with the user's own.
The ids captured at startup used to live in globals; here they live in a value that
is passed to whoever switches identity, so tests and non-Unix builds need no special
cases.
*/

use tracing::{debug, instrument};

use zfile_base::ZFileResult;

/// Real and effective group ids captured at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityContext {
    real_gid: u32,
    effective_gid: u32,
}

impl IdentityContext {
    /// Records the current real and effective group ids.
    #[cfg(unix)]
    pub fn capture() -> Self {
        // SAFETY: getgid and getegid cannot fail and have no preconditions.
        let (real_gid, effective_gid) = unsafe { (libc::getgid(), libc::getegid()) };
        let context = Self {
            real_gid,
            effective_gid,
        };
        debug!(?context, "identity captured");
        context
    }

    /// Records the current real and effective group ids.
    #[cfg(not(unix))]
    pub fn capture() -> Self {
        Self {
            real_gid: 0,
            effective_gid: 0,
        }
    }

    pub fn real_gid(&self) -> u32 {
        self.real_gid
    }

    pub fn effective_gid(&self) -> u32 {
        self.effective_gid
    }

    /// True if the process was started with an elevated group.
    pub fn is_elevated(&self) -> bool {
        self.real_gid != self.effective_gid
    }

    /// Switches the effective group id to the real one.
    #[instrument]
    pub fn drop_privileges(&self) -> ZFileResult<()> {
        set_effective_gid(self.real_gid)
    }

    /// Restores the effective group id captured at startup.
    #[instrument]
    pub fn grab_privileges(&self) -> ZFileResult<()> {
        set_effective_gid(self.effective_gid)
    }
}

#[cfg(unix)]
fn set_effective_gid(gid: u32) -> ZFileResult<()> {
    // SAFETY: setegid only reads its argument.
    if unsafe { libc::setegid(gid as libc::gid_t) } != 0 {
        let error = std::io::Error::last_os_error();
        return Err(zfile_base::err!("setegid({}) failed: {}", gid, error));
    }
    debug!(gid, "effective group id set");
    Ok(())
}

#[cfg(not(unix))]
fn set_effective_gid(_gid: u32) -> ZFileResult<()> {
    Ok(())
}
