// OTA (Over-The-Air) upload module

pub mod payload;
pub mod uploader;

pub use payload::FirmwarePayload;
pub use uploader::{upload_firmware, UploadError, UploadReceipt};

// OTA upload flow:
// 1. Read the (possibly gzipped) firmware image
// 2. Hash it so the device can verify what it flashed
// 3. POST both as multipart/form-data to upload_url
// 4. Any non-2xx answer or transport failure stops the pipeline

/// Form field carrying the hex MD5 digest
pub const FIELD_MD5: &str = "MD5";
/// Form field carrying the image
pub const FIELD_FIRMWARE: &str = "firmware";
/// File name sent with the image part
pub const FIRMWARE_FILE_NAME: &str = "firmware";
pub const FIRMWARE_MIME: &str = "application/octet-stream";
