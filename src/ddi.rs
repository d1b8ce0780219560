//! File-drop command channel (DDI).
//!
//! Two cooperating processes exchange short text commands through four
//! prefix-derived files on a shared filesystem. Writes go to a temp file
//! which is then renamed over the final name; rename is atomic on the
//! underlying filesystem so a reader can never observe a half-written
//! payload. The reader deletes the file after a successful read, giving
//! at-most-once delivery per message.

use std::fs;
use std::io::{self, Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

/// Suffix of the initiator-to-responder file.
pub const OUT_SUFFIX: &str = "ddo";
/// Suffix of the responder-to-initiator file.
pub const IN_SUFFIX: &str = "ddi";

/// Recommended upper bound for a single payload.
pub const MAX_PAYLOAD: usize = 10 * 1024;

/// Attempts made to unlink a picked-up file before giving up. Transient
/// locks (antivirus scanners on Windows filesystems) can hold a file open
/// for a short while after we close it.
const UNLINK_ATTEMPTS: u32 = 10;
const UNLINK_BACKOFF: Duration = Duration::from_millis(20);

/// Sleep granularity of [`DdiChannel::wait`].
const WAIT_GRANULARITY: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum DdiError {
    #[error("channel has no prefix/role configured")]
    NotConfigured,
    #[error("nothing dispatched yet, cannot resend")]
    NothingToResend,
    #[error("peer did not drain {0} within the cycle budget")]
    DrainTimeout(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Which end of the channel we are. The initiator writes `<prefix>.ddo`
/// and reads `<prefix>.ddi`; the responder is the mirror image. Exactly
/// one role may write a given path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdiRole {
    Initiator,
    Responder,
}

#[derive(Debug, Clone)]
struct DdiPaths {
    dispatch: PathBuf,
    dispatch_tmp: PathBuf,
    pickup: PathBuf,
    pickup_tmp: PathBuf,
}

/// One endpoint of the command channel.
///
/// Constructed once at process start, configured with a name prefix and a
/// role before first use, and lives for the life of the process. All
/// operations are non-fatal: filesystem failures come back as `Err` and the
/// caller simply proceeds on its next poll cycle.
#[derive(Debug, Default)]
pub struct DdiChannel {
    role: Option<DdiRole>,
    paths: Option<DdiPaths>,
    last_dispatch: Option<String>,
    last_pickup: Option<String>,
}

impl DdiChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the four channel paths from `prefix` and reset the
    /// last-sent/last-received buffers. Must be called before any
    /// dispatch or pickup.
    pub fn configure(&mut self, prefix: impl AsRef<Path>) {
        let prefix = prefix.as_ref();
        let derive = |suffix: &str, temp: bool| -> PathBuf {
            let mut name = prefix.as_os_str().to_os_string();
            name.push(if temp { ".t" } else { "." });
            name.push(suffix);
            PathBuf::from(name)
        };
        self.paths = Some(DdiPaths {
            dispatch: derive(OUT_SUFFIX, false),
            dispatch_tmp: derive(OUT_SUFFIX, true),
            pickup: derive(IN_SUFFIX, false),
            pickup_tmp: derive(IN_SUFFIX, true),
        });
        self.last_dispatch = None;
        self.last_pickup = None;
    }

    pub fn set_role(&mut self, role: DdiRole) {
        self.role = Some(role);
    }

    pub fn role(&self) -> Option<DdiRole> {
        self.role
    }

    /// The final + temp paths this endpoint writes to.
    fn write_paths(&self) -> Result<(&Path, &Path), DdiError> {
        let paths = self.paths.as_ref().ok_or(DdiError::NotConfigured)?;
        match self.role.ok_or(DdiError::NotConfigured)? {
            DdiRole::Initiator => Ok((&paths.dispatch, &paths.dispatch_tmp)),
            DdiRole::Responder => Ok((&paths.pickup, &paths.pickup_tmp)),
        }
    }

    /// The final path this endpoint reads from (the peer's write path).
    fn read_path(&self) -> Result<&Path, DdiError> {
        let paths = self.paths.as_ref().ok_or(DdiError::NotConfigured)?;
        match self.role.ok_or(DdiError::NotConfigured)? {
            DdiRole::Initiator => Ok(&paths.pickup),
            DdiRole::Responder => Ok(&paths.dispatch),
        }
    }

    /// Write `payload` for the peer to pick up. Remembers the payload so
    /// [`resend`](Self::resend) can replay it verbatim.
    pub fn dispatch(&mut self, payload: &str) -> Result<(), DdiError> {
        self.dispatch_inner(payload)?;
        self.last_dispatch = Some(payload.to_string());
        Ok(())
    }

    /// Re-dispatch the last successfully dispatched payload without
    /// updating the resend buffer.
    pub fn resend(&mut self) -> Result<(), DdiError> {
        let payload = self
            .last_dispatch
            .clone()
            .ok_or(DdiError::NothingToResend)?;
        self.dispatch_inner(&payload)
    }

    fn dispatch_inner(&mut self, payload: &str) -> Result<(), DdiError> {
        let (final_path, tmp_path) = self.write_paths()?;
        debug!("ddi: dispatch '{}' via {}", payload, final_path.display());

        // Temp-then-rename so the peer never sees a partial file.
        let mut f = fs::File::create(tmp_path)?;
        f.write_all(payload.as_bytes())?;
        drop(f);
        fs::rename(tmp_path, final_path)?;
        Ok(())
    }

    /// Read and consume the next incoming payload, truncated at
    /// [`MAX_PAYLOAD`]. `Ok(None)` means no message is waiting, which is
    /// the normal polling outcome, not an error.
    pub fn pickup(&mut self) -> Result<Option<String>, DdiError> {
        let path = self.read_path()?.to_path_buf();

        let mut f = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut buf = Vec::new();
        (&mut f).take(MAX_PAYLOAD as u64).read_to_end(&mut buf)?;
        drop(f);
        let payload = String::from_utf8_lossy(&buf).into_owned();

        // Consume the message so a second pickup sees nothing. Retried a
        // few times to ride out transient filesystem contention.
        let mut removed = false;
        for attempt in 0..UNLINK_ATTEMPTS {
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed = true;
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    removed = true;
                    break;
                }
                Err(e) => {
                    warn!(
                        "ddi: unlink {} failed (attempt {}): {}",
                        path.display(),
                        attempt + 1,
                        e
                    );
                    thread::sleep(UNLINK_BACKOFF);
                }
            }
        }
        if !removed {
            warn!("ddi: giving up removing {}", path.display());
        }

        debug!("ddi: picked up '{payload}'");
        self.last_pickup = Some(payload.clone());
        Ok(Some(payload))
    }

    /// Poll until the peer has consumed our outgoing file, or the cycle
    /// budget runs out.
    pub fn wait(&self, max_cycles: u32) -> Result<(), DdiError> {
        let (final_path, _) = self.write_paths()?;
        for _ in 0..max_cycles {
            if !final_path.exists() {
                return Ok(());
            }
            thread::sleep(WAIT_GRANULARITY);
        }
        Err(DdiError::DrainTimeout(final_path.to_path_buf()))
    }

    /// Remove all four channel files, e.g. at startup to discard stale
    /// messages from a previous session.
    pub fn clear(&self) -> Result<(), DdiError> {
        let paths = self.paths.as_ref().ok_or(DdiError::NotConfigured)?;
        for p in [
            &paths.dispatch,
            &paths.dispatch_tmp,
            &paths.pickup,
            &paths.pickup_tmp,
        ] {
            match fs::remove_file(p) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("ddi: clear {} failed: {}", p.display(), e),
            }
        }
        Ok(())
    }

    pub fn last_pickup(&self) -> Option<&str> {
        self.last_pickup.as_deref()
    }

    pub fn last_dispatch(&self) -> Option<&str> {
        self.last_dispatch.as_deref()
    }
}
