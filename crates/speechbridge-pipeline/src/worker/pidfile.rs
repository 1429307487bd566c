use std::path::{Path, PathBuf};

use speechbridge_core::error::Result;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use tracing::debug;

/// What a PID file currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidContents {
    Missing,
    Pid(u32),
    /// The file exists but does not hold a number.
    Garbage,
}

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write `pid` via a temp file and rename so readers never see a partial write.
    pub fn create(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("pid.tmp");
        std::fs::write(&tmp, pid.to_string())?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), pid, "PID file created");
        Ok(())
    }

    pub fn read(&self) -> PidContents {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map(PidContents::Pid)
                .unwrap_or(PidContents::Garbage),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PidContents::Missing,
            Err(_) => PidContents::Garbage,
        }
    }

    /// Remove the file. Returns whether it existed.
    pub fn remove(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether `pid` names a live process. Zombies count as dead.
pub fn process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid)
        .is_some_and(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = PidFile::new(dir.path().join("live").join("recognition_process.pid"));
        assert_eq!(pid_file.read(), PidContents::Missing);

        pid_file.create(4242).unwrap();
        assert!(pid_file.exists());
        assert_eq!(pid_file.read(), PidContents::Pid(4242));
        assert!(!pid_file.path().with_extension("pid.tmp").exists());

        assert!(pid_file.remove().unwrap());
        assert!(!pid_file.remove().unwrap());
    }

    #[test]
    fn test_garbage_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recognition_process.pid");
        std::fs::write(&path, "not-a-pid").unwrap();
        assert_eq!(PidFile::new(&path).read(), PidContents::Garbage);
    }

    #[test]
    fn test_process_alive() {
        assert!(process_alive(std::process::id()));
        // Above the largest pid_max Linux allows
        assert!(!process_alive(4_194_400));
    }
}
