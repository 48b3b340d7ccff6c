//! Record directory utilities.
//!
//! Allocation of new sharded resource directories and traversal of existing ones.

use crate::{ResourceError, ResourceResult};
use hsr_uuid::ShortKey;
use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

/// Creates a new, empty sharded directory for a fresh short key.
///
/// Keys come from `key_source`; collisions with existing directories (or external
/// interference) are retried up to 5 times.
///
/// # Errors
///
/// Returns [`ResourceError::ResourceDirCreation`] if no directory could be allocated or a
/// parent directory cannot be created.
pub(crate) fn create_unique_shared_dir(
    base_dir: &Path,
    mut key_source: impl FnMut() -> ShortKey,
) -> ResourceResult<(ShortKey, PathBuf)> {
    for _attempt in 0..5 {
        let key = key_source();
        let candidate = key.sharded_dir(base_dir);

        if candidate.exists() {
            continue;
        }

        if let Some(parent) = candidate.parent() {
            fs::create_dir_all(parent).map_err(ResourceError::ResourceDirCreation)?;
        }

        match fs::create_dir(&candidate) {
            Ok(()) => return Ok((key, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(ResourceError::ResourceDirCreation(e)),
        }
    }

    Err(ResourceError::ResourceDirCreation(io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to allocate a unique resource directory after 5 attempts",
    )))
}

/// Lists `<base>/<s1>/<s2>/<key>/` directories whose leaf is a canonical short key.
///
/// Unreadable shard directories are skipped. A missing base directory yields no entries.
pub(crate) fn record_dirs(base_dir: &Path) -> Vec<(ShortKey, PathBuf)> {
    let mut found = Vec::new();

    let Ok(s1_iter) = fs::read_dir(base_dir) else {
        return found;
    };
    for s1 in s1_iter.flatten() {
        let s1_path = s1.path();
        if !s1_path.is_dir() {
            continue;
        }
        let Ok(s2_iter) = fs::read_dir(&s1_path) else {
            continue;
        };
        for s2 in s2_iter.flatten() {
            let s2_path = s2.path();
            if !s2_path.is_dir() {
                continue;
            }
            let Ok(id_iter) = fs::read_dir(&s2_path) else {
                continue;
            };
            for id_ent in id_iter.flatten() {
                let id_path = id_ent.path();
                if !id_path.is_dir() {
                    continue;
                }
                let Some(key) = id_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| ShortKey::parse(n).ok())
                else {
                    continue;
                };
                if key.sharded_dir(base_dir) == id_path {
                    found.push((key, id_path));
                }
            }
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn allocates_sharded_directory() {
        let temp = TempDir::new().unwrap();
        let (key, dir) = create_unique_shared_dir(temp.path(), ShortKey::new).unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir, key.sharded_dir(temp.path()));
    }

    #[test]
    fn retries_on_collision_then_gives_up() {
        let temp = TempDir::new().unwrap();
        let fixed = ShortKey::parse("550e8400e29b41d4a716446655440000").unwrap();
        fs::create_dir_all(fixed.sharded_dir(temp.path())).unwrap();

        let err = create_unique_shared_dir(temp.path(), || fixed.clone()).unwrap_err();
        assert!(matches!(err, ResourceError::ResourceDirCreation(_)));
    }

    #[test]
    fn record_dirs_skips_noise() {
        let temp = TempDir::new().unwrap();
        let (key, _) = create_unique_shared_dir(temp.path(), ShortKey::new).unwrap();
        fs::create_dir_all(temp.path().join("zz/yy/not-a-key")).unwrap();
        fs::write(temp.path().join("stray.txt"), b"x").unwrap();

        let dirs = record_dirs(temp.path());
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].0, key);
        assert!(record_dirs(&temp.path().join("missing")).is_empty());
    }
}
