//! Packing and unpacking of the local state directory.
//!
//! Compression is CPU-bound and file I/O is blocking, so the async entry
//! points run on tokio's blocking pool and never stall request handling.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::SnapshotError;

/// Pack the contents of `src` into a gzip-compressed tar at `dest`.
/// Returns the archive size in bytes.
pub fn pack_dir_sync(src: &Path, dest: &Path) -> std::io::Result<u64> {
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    // Symlinks are archived as links, never followed out of the tree.
    builder.follow_symlinks(false);
    builder.append_dir_all(".", src)?;
    let mut writer = builder.into_inner()?.finish()?;
    writer.flush()?;
    drop(writer);
    Ok(std::fs::metadata(dest)?.len())
}

/// Extract the archive at `archive` into `dest`, which must exist.
pub fn unpack_sync(archive: &Path, dest: &Path) -> std::io::Result<()> {
    let file = File::open(archive)?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.set_preserve_permissions(true);
    archive.unpack(dest)
}

/// Async wrapper around [`pack_dir_sync`].
pub async fn pack_dir(src: PathBuf, dest: PathBuf) -> Result<u64, SnapshotError> {
    tokio::task::spawn_blocking(move || {
        pack_dir_sync(&src, &dest).map_err(|source| SnapshotError::Archive { path: dest, source })
    })
    .await?
}

/// Async wrapper around [`unpack_sync`].
pub async fn unpack(archive: PathBuf, dest: PathBuf) -> Result<(), SnapshotError> {
    tokio::task::spawn_blocking(move || {
        unpack_sync(&archive, &dest).map_err(|source| SnapshotError::Archive {
            path: archive,
            source,
        })
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate(dir: &Path) {
        std::fs::create_dir_all(dir.join("nested/deeper")).unwrap();
        std::fs::write(dir.join("data.db"), b"sqlite bytes").unwrap();
        std::fs::write(dir.join("nested/config.json"), b"{\"k\":1}").unwrap();
        std::fs::write(dir.join("nested/deeper/empty"), b"").unwrap();
    }

    #[test]
    fn pack_then_unpack_preserves_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("state");
        let out = tmp.path().join("out");
        let archive = tmp.path().join("snap.tar.gz");
        populate(&src);
        std::fs::create_dir_all(&out).unwrap();

        let size = pack_dir_sync(&src, &archive).unwrap();
        assert!(size > 0);
        unpack_sync(&archive, &out).unwrap();

        assert_eq!(std::fs::read(out.join("data.db")).unwrap(), b"sqlite bytes");
        assert_eq!(
            std::fs::read(out.join("nested/config.json")).unwrap(),
            b"{\"k\":1}"
        );
        assert!(out.join("nested/deeper/empty").exists());
    }

    #[test]
    fn pack_missing_source_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = pack_dir_sync(&tmp.path().join("absent"), &tmp.path().join("a.tar.gz"));
        assert!(err.is_err());
    }

    #[test]
    fn unpack_garbage_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("bad.tar.gz");
        std::fs::write(&archive, b"definitely not gzip").unwrap();
        assert!(unpack_sync(&archive, tmp.path()).is_err());
    }

    #[tokio::test]
    async fn async_wrappers_map_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("bad.tar.gz");
        std::fs::write(&archive, b"junk").unwrap();
        let err = unpack(archive.clone(), tmp.path().to_path_buf())
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Archive { path, .. } if path == archive));
    }
}
