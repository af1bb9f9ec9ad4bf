use flate2::read::GzDecoder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::{IoContext, Result, UpdateError};
use super::verify::VerifiedArchive;

/// A release container format that can pull a single named file out.
pub trait ArchiveCodec {
    /// Copy the first regular entry whose base name is `wanted` to `dest`.
    ///
    /// Returns `false` if the whole archive was scanned without a match;
    /// `dest` is only created on a match.
    fn extract_one(&self, archive: &Path, wanted: &str, dest: &Path) -> Result<bool>;
}

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

pub struct TarGz;
pub struct Zip;

/// Pick the codec from the archive's file name.
pub fn codec_for(archive: &Path) -> Result<Box<dyn ArchiveCodec>> {
    let fname = archive
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if fname.ends_with(".tar.gz") || fname.ends_with(".tgz") {
        Ok(Box::new(TarGz))
    } else if fname.ends_with(".zip") {
        Ok(Box::new(Zip))
    } else {
        Err(UpdateError::UnsupportedArchiveFormat(archive.to_path_buf()))
    }
}

/// Extract the `binary` entry of a verified archive into `dest_dir`.
pub fn extract_executable(
    archive: &VerifiedArchive,
    dest_dir: &Path,
    binary: &str,
) -> Result<PathBuf> {
    extract_from(archive.path(), dest_dir, binary)
}

fn extract_from(archive: &Path, dest_dir: &Path, binary: &str) -> Result<PathBuf> {
    let codec = codec_for(archive)?;
    let out = dest_dir.join(binary);
    if codec.extract_one(archive, binary, &out)? {
        debug!(path = %out.display(), "extracted binary");
        Ok(out)
    } else {
        Err(UpdateError::BinaryNotFoundInArchive {
            archive: archive.to_path_buf(),
            binary: binary.to_string(),
        })
    }
}

fn write_entry(reader: &mut impl io::Read, dest: &Path) -> Result<()> {
    let mut of = fs::File::create(dest).fs_context(|| format!("creating {}", dest.display()))?;
    io::copy(reader, &mut of).fs_context(|| format!("extracting to {}", dest.display()))?;
    Ok(())
}

impl ArchiveCodec for TarGz {
    fn extract_one(&self, archive: &Path, wanted: &str, dest: &Path) -> Result<bool> {
        let ctx = || format!("reading {}", archive.display());
        let f = fs::File::open(archive).fs_context(ctx)?;
        let mut ar = tar::Archive::new(GzDecoder::new(f));
        for entry in ar.entries().fs_context(ctx)? {
            let mut e = entry.fs_context(ctx)?;
            if !e.header().entry_type().is_file() {
                continue;
            }
            let matches = e
                .path()
                .fs_context(ctx)?
                .file_name()
                .and_then(|s| s.to_str())
                == Some(wanted);
            if matches {
                write_entry(&mut e, dest)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl ArchiveCodec for Zip {
    fn extract_one(&self, archive: &Path, wanted: &str, dest: &Path) -> Result<bool> {
        let ctx = || format!("reading {}", archive.display());
        let zip_err = |e: zip::result::ZipError| {
            UpdateError::fs(ctx(), io::Error::new(io::ErrorKind::InvalidData, e))
        };
        let f = fs::File::open(archive).fs_context(ctx)?;
        let mut zip = zip::ZipArchive::new(f).map_err(zip_err)?;
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).map_err(zip_err)?;
            let is_link = file.unix_mode().is_some_and(|m| m & S_IFMT == S_IFLNK);
            if file.is_dir() || is_link {
                continue;
            }
            let name = file.name().rsplit(['/', '\\']).next().unwrap_or("");
            if name == wanted {
                write_entry(&mut file, dest)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}
