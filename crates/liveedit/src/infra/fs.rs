//! File storage helpers: whole-file atomic replacement and per-file locks.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tempfile::NamedTempFile;

/// Replace the full contents of `path` in one step.
///
/// The new contents are written to a temporary file in the same directory and
/// renamed over the target, so readers observe either the old or the new file.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        )
    })?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    if let Ok(metadata) = fs::metadata(path) {
        file.as_file().set_permissions(metadata.permissions())?;
    }
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// One mutex per file, handed out by canonical path.
///
/// An entry lives only while some caller holds or waits on its lock.
#[derive(Debug, Default)]
pub struct FileLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `path`.
    pub fn with_lock<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(path);
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        // The map's own handle is the only one left once nobody is waiting.
        self.locks
            .remove_if(path, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let entry = self
            .locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(&entry)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_contents() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("a.tsx");
        fs::write(&path, "old contents that are longer")?;

        write_atomic(&path, "new")?;

        assert_eq!(fs::read_to_string(&path)?, "new");
        let leftovers = fs::read_dir(temp.path())?.count();
        assert_eq!(leftovers, 1);
        Ok(())
    }

    #[test]
    fn same_path_shares_one_lock() {
        let locks = FileLocks::new();
        let a = locks.lock_for(Path::new("/p/a.tsx"));
        let b = locks.lock_for(Path::new("/p/a.tsx"));
        let c = locks.lock_for(Path::new("/p/b.tsx"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(locks.len(), 2);

        let _guard = a.lock();
        assert!(b.try_lock().is_none());
        assert!(c.try_lock().is_some());
    }

    #[test]
    fn released_locks_are_dropped_from_the_map() {
        let locks = FileLocks::new();
        let path = Path::new("/p/a.tsx");

        let inside = locks.with_lock(path, || locks.len());
        assert_eq!(inside, 1);
        assert!(locks.is_empty());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| locks.with_lock(path, std::thread::yield_now));
            }
        });
        assert!(locks.is_empty());
    }
}
