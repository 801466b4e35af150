// Multipart body for the device's /update endpoint

use std::fs;
use std::io;
use std::path::Path;

use md5::{Digest, Md5};
use reqwest::blocking::multipart::{Form, Part};

use super::{FIELD_FIRMWARE, FIELD_MD5, FIRMWARE_FILE_NAME, FIRMWARE_MIME};

/// Firmware bytes plus the digest the device checks them against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwarePayload {
    bytes: Vec<u8>,
    md5: String,
}

impl FirmwarePayload {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let md5 = md5_hex(&bytes);
        Self { bytes, md5 }
    }

    pub fn read(path: &Path) -> io::Result<Self> {
        Ok(Self::from_bytes(fs::read(path)?))
    }

    pub fn md5(&self) -> &str {
        &self.md5
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `MD5` text field followed by the `firmware` file part
    pub fn into_form(self) -> reqwest::Result<Form> {
        let firmware = Part::bytes(self.bytes)
            .file_name(FIRMWARE_FILE_NAME)
            .mime_str(FIRMWARE_MIME)?;
        Ok(Form::new()
            .text(FIELD_MD5, self.md5)
            .part(FIELD_FIRMWARE, firmware))
    }
}

/// Lowercase hex MD5, the format the device's updater expects
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}
