//! PlatformIO build hooks for compressed OTA firmware uploads.
//!
//! Two independent hooks:
//! - [`compress::compress_firmware`] runs before `upload` and gzips the
//!   built image in place, keeping the original as a sibling backup.
//! - [`ota::upload_firmware`] replaces the upload command and POSTs the
//!   image with its MD5 to the project's `upload_url`.
//!
//! Both take an explicit [`BuildContext`] instead of reading the build
//! tool's environment themselves.

pub mod compress;
pub mod context;
pub mod logging;
pub mod ota;
pub mod project;
pub mod version;

pub use compress::{
    compress_firmware, CompressError, CompressMode, CompressionOutcome, CompressionReport,
};
pub use context::BuildContext;
pub use ota::{upload_firmware, UploadError, UploadReceipt};
pub use project::{ProjectConfig, ProjectConfigError};
