use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Answers whether a watch root can be read.
///
/// The answer is advisory; the session still tries to start and reports its
/// own failure if the root turns out to be unreadable.
pub trait AccessCheck: Send {
    fn has_access(&self, path: &Path) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsAccess;

impl AccessCheck for FsAccess {
    fn has_access(&self, path: &Path) -> bool {
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_dir() => fs::read_dir(path).is_ok(),
            Ok(_) => true,
            // Missing roots are reported by the event source, not here
            Err(e) => e.kind() == ErrorKind::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_directory_has_access() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FsAccess.has_access(dir.path()));
    }

    #[test]
    fn readable_file_has_access() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.md");
        fs::write(&file, "x").unwrap();
        assert!(FsAccess.has_access(&file));
    }

    #[test]
    fn missing_path_is_not_a_permission_problem() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FsAccess.has_access(&dir.path().join("nope")));
    }
}
