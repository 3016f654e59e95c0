//! Archive extraction for function bundles
//!
//! Archives are recognised by suffix only. Plain and gzipped tarballs are
//! unpacked in-process; xz tarballs go through the system `tar`.

use fnexec_core::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::Command;
use tar::Archive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    Gzip,
    Xz,
}

impl ArchiveKind {
    /// Classify a cache entry by file name. `None` means "not an archive".
    pub fn detect(name: &str) -> Option<Self> {
        if name.ends_with(".tar.xz") {
            Some(Self::Xz)
        } else if name.ends_with(".tar.gz") || name.ends_with(".gz") {
            Some(Self::Gzip)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Unpack `archive` into `target`, creating `target` if needed.
pub fn extract_archive(archive: &Path, kind: ArchiveKind, target: &Path) -> Result<()> {
    std::fs::create_dir_all(target)?;
    match kind {
        ArchiveKind::Tar => unpack(archive, target, |file| Box::new(file) as Box<dyn Read>),
        ArchiveKind::Gzip => unpack(archive, target, |file| Box::new(GzDecoder::new(file)) as Box<dyn Read>),
        ArchiveKind::Xz => unpack_with_system_tar(archive, target),
    }
}

fn unpack(
    archive: &Path,
    target: &Path,
    decoder: impl FnOnce(BufReader<File>) -> Box<dyn Read>,
) -> Result<()> {
    let file = File::open(archive)
        .map_err(|e| Error::extraction(archive.display().to_string(), e.to_string()))?;
    let mut tarball = Archive::new(decoder(BufReader::new(file)));
    tarball.set_overwrite(true);
    tarball
        .unpack(target)
        .map_err(|e| Error::extraction(archive.display().to_string(), e.to_string()))
}

fn unpack_with_system_tar(archive: &Path, target: &Path) -> Result<()> {
    let output = Command::new("tar")
        .arg("-xJf")
        .arg(archive)
        .current_dir(target)
        .output()
        .map_err(|e| Error::extraction(archive.display().to_string(), format!("failed to execute tar: {}", e)))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(Error::extraction(
            archive.display().to_string(),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}
