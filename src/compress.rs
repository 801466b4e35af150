// Pre-upload hook: gzip the firmware image in place for compressed OTA

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::{Compression, GzBuilder};
use log::{debug, info, warn};
use thiserror::Error;

use crate::context::BuildContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CompressMode {
    /// Move and compress on every run, even if the image is already gzipped
    Always,
    /// Skip when a `.bak` backup shows the image was already compressed
    #[default]
    Once,
}

impl CompressMode {
    pub fn backup_suffix(self) -> &'static str {
        match self {
            CompressMode::Always => "uncompressed",
            CompressMode::Once => "bak",
        }
    }
}

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("firmware image not found at {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("firmware image at {} is empty", .0.display())]
    EmptyArtifact(PathBuf),
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CompressError {
    fn io(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| CompressError::Io {
            action,
            path,
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionReport {
    pub artifact: PathBuf,
    pub backup: PathBuf,
    pub original_size: u64,
    pub compressed_size: u64,
}

impl CompressionReport {
    /// Compressed size as a percentage of the original
    pub fn ratio_percent(&self) -> f64 {
        self.compressed_size as f64 / self.original_size as f64 * 100.0
    }
}

impl fmt::Display for CompressionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Compression reduced firmware size to {:.0}% of original (was {} bytes, now {} bytes)",
            self.ratio_percent(),
            self.original_size,
            self.compressed_size
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionOutcome {
    Compressed(CompressionReport),
    Skipped { backup: PathBuf },
}

/// `<artifact>.<suffix>` next to the artifact
pub fn backup_path(artifact: &Path, mode: CompressMode) -> PathBuf {
    let mut path = OsString::from(artifact.as_os_str());
    path.push(".");
    path.push(mode.backup_suffix());
    PathBuf::from(path)
}

/// `<artifact>.partial`, where the gzip stream is staged until it is complete
pub fn staging_path(artifact: &Path) -> PathBuf {
    let mut path = OsString::from(artifact.as_os_str());
    path.push(".partial");
    PathBuf::from(path)
}

/// Move `<build_dir>/<prog_name>.bin` aside and gzip it back into place.
///
/// The gzip stream is written to a staging sibling first. The artifact is
/// only moved to its backup once that stream is complete, so a failed run
/// leaves the original image and no backup marker behind. Any failure is
/// returned to the caller, which must abort the upload.
pub fn compress_firmware(
    ctx: &BuildContext,
    mode: CompressMode,
) -> Result<CompressionOutcome, CompressError> {
    let artifact = ctx.artifact_path();
    let backup = backup_path(&artifact, mode);

    if mode == CompressMode::Once && backup.exists() {
        info!("Firmware already compressed, {} exists", backup.display());
        return Ok(CompressionOutcome::Skipped { backup });
    }

    let metadata = fs::metadata(&artifact).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => CompressError::MissingArtifact(artifact.clone()),
        _ => CompressError::io("inspect", &artifact)(err),
    })?;
    if metadata.len() == 0 {
        return Err(CompressError::EmptyArtifact(artifact));
    }

    let staging = staging_path(&artifact);
    debug!(
        "{} -> {} via {}",
        artifact.display(),
        backup.display(),
        staging.display()
    );

    if let Err(err) = stage_gzip(&artifact, &staging, &ctx.prog_name) {
        discard_staging(&staging);
        return Err(err);
    }

    if let Err(err) = fs::rename(&artifact, &backup) {
        discard_staging(&staging);
        return Err(CompressError::io("move", &artifact)(err));
    }

    if let Err(err) = fs::rename(&staging, &artifact) {
        discard_staging(&staging);
        if let Err(restore) = fs::rename(&backup, &artifact) {
            warn!(
                "Could not restore {} from {}: {}",
                artifact.display(),
                backup.display(),
                restore
            );
        }
        return Err(CompressError::io("move into place", &artifact)(err));
    }

    let original_size = fs::metadata(&backup)
        .map_err(CompressError::io("inspect", &backup))?
        .len();
    let compressed_size = fs::metadata(&artifact)
        .map_err(CompressError::io("inspect", &artifact))?
        .len();

    Ok(CompressionOutcome::Compressed(CompressionReport {
        artifact,
        backup,
        original_size,
        compressed_size,
    }))
}

fn stage_gzip(artifact: &Path, staging: &Path, prog_name: &str) -> Result<(), CompressError> {
    let source = File::open(artifact).map_err(CompressError::io("open", artifact))?;
    let target = File::create(staging).map_err(CompressError::io("create", staging))?;
    let writer = gzip_stream(BufReader::new(source), BufWriter::new(target), prog_name)
        .map_err(CompressError::io("compress into", staging))?;
    writer
        .into_inner()
        .map_err(|err| CompressError::io("compress into", staging)(err.into_error()))?
        .sync_all()
        .map_err(CompressError::io("sync", staging))
}

fn discard_staging(staging: &Path) {
    match fs::remove_file(staging) {
        Ok(()) => debug!("Removed partial {}", staging.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!("Could not remove partial {}: {}", staging.display(), err),
    }
}

/// Gzip everything from `reader` into `writer` at maximum compression,
/// recording `<prog_name>.bin` as the original file name.
pub fn gzip_stream<R: Read, W: Write>(
    mut reader: R,
    writer: W,
    prog_name: &str,
) -> io::Result<W> {
    let mut encoder = GzBuilder::new()
        .filename(format!("{prog_name}.bin"))
        .write(writer, Compression::best());
    io::copy(&mut reader, &mut encoder)?;
    let mut writer = encoder.finish()?;
    writer.flush()?;
    Ok(writer)
}
