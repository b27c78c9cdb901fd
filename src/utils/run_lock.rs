// Run Lock - keeps overlapping scheduled runs from inspecting concurrently

use crate::Result;
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default age after which a leftover lock is considered abandoned
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(10 * 60);

/// Lock file held for the duration of one run, removed on drop.
///
/// The file holds the owner's pid on the first line and the RFC 3339 start
/// time on the second.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Try to take the lock at `path`.
    ///
    /// Returns `Ok(None)` while another run holds a lock younger than
    /// `stale_after`. An older lock is taken over.
    pub fn acquire<P: AsRef<Path>>(path: P, stale_after: Duration) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();

        match create_lock_file(&path) {
            Ok(()) => return Ok(Some(Self { path })),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        let snapshot = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            // Released in between
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::create(path),
            Err(e) => return Err(e.into()),
        };

        let age = lock_age(&path, &snapshot)?;
        if age < stale_after {
            tracing::info!(
                "Lock {} is held by another run (age {}s)",
                path.display(),
                age.as_secs()
            );
            return Ok(None);
        }

        tracing::warn!(
            "Taking over stale lock {} (age {}s)",
            path.display(),
            age.as_secs()
        );
        Self::take_over(path, &snapshot, stale_after)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create(path: PathBuf) -> Result<Option<Self>> {
        match create_lock_file(&path) {
            Ok(()) => Ok(Some(Self { path })),
            // Another process got there first
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a stale lock that held `snapshot`. Takeovers are serialized
    /// through a `<lock>.takeover` guard file.
    fn take_over(path: PathBuf, snapshot: &str, stale_after: Duration) -> Result<Option<Self>> {
        let guard_path = takeover_guard_path(&path);
        let _guard = match TakeoverGuard::create(&guard_path) {
            Ok(guard) => guard,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // Left behind by a takeover that died; clear it for the next run
                if file_age(&guard_path)? >= stale_after {
                    tracing::warn!("Removing abandoned takeover guard {}", guard_path.display());
                    remove_if_exists(&guard_path)?;
                }
                tracing::info!("Lock {} is being taken over by another run", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        Self::replace_if_unchanged(path, snapshot)
    }

    /// Remove the lock only if it still holds `snapshot`, then create ours
    fn replace_if_unchanged(path: PathBuf, snapshot: &str) -> Result<Option<Self>> {
        match fs::read_to_string(&path) {
            Ok(current) if current == snapshot => remove_if_exists(&path)?,
            Ok(_) => {
                tracing::info!("Lock {} was replaced by another run", path.display());
                return Ok(None);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Self::create(path)
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove lock {}: {}", self.path.display(), e);
        }
    }
}

/// Exclusive marker held while one process replaces a stale lock
struct TakeoverGuard {
    path: PathBuf,
}

impl TakeoverGuard {
    fn create(path: &Path) -> io::Result<Self> {
        OpenOptions::new().write(true).create_new(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for TakeoverGuard {
    fn drop(&mut self) {
        if let Err(e) = remove_if_exists(&self.path) {
            tracing::warn!("Failed to remove takeover guard {}: {}", self.path.display(), e);
        }
    }
}

fn takeover_guard_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".takeover");
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn create_lock_file(path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{}", std::process::id())?;
    writeln!(file, "{}", Utc::now().to_rfc3339())?;
    Ok(())
}

fn file_age(path: &Path) -> io::Result<Duration> {
    Ok(fs::metadata(path)?
        .modified()?
        .elapsed()
        .unwrap_or(Duration::ZERO))
}

/// Age from the recorded start time, falling back to the file's mtime
fn lock_age(path: &Path, contents: &str) -> Result<Duration> {
    let started = contents
        .lines()
        .nth(1)
        .and_then(|line| DateTime::parse_from_rfc3339(line.trim()).ok())
        .map(|t| t.with_timezone(&Utc));

    let age = match started {
        Some(started) => (Utc::now() - started).to_std().unwrap_or(Duration::ZERO),
        None => file_age(path)?,
    };

    Ok(age)
}
