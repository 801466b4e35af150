// Upload hook: POST a firmware image to the device's OTA endpoint

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;

use super::payload::FirmwarePayload;
use crate::context::BuildContext;
use crate::version;

/// Longest slice of the device's error page kept in [`UploadError::Status`]
const DETAIL_MAX_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no upload_url configured for this project")]
    MissingUploadUrl,
    #[error("failed to read firmware {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode multipart body: {0}")]
    Encode(#[source] reqwest::Error),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("upload to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("upload to {url} rejected with HTTP {status}{}", render_detail(.detail))]
    Status {
        url: String,
        status: StatusCode,
        detail: String,
    },
}

fn render_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub url: String,
    pub md5: String,
    pub firmware_size: usize,
    pub status: StatusCode,
}

/// Send `firmware` to the context's `upload_url` in a single attempt.
///
/// There is no retry: the caller is expected to stop the pipeline on error.
pub fn upload_firmware(ctx: &BuildContext, firmware: &Path) -> Result<UploadReceipt, UploadError> {
    let url = ctx
        .upload_url
        .clone()
        .ok_or(UploadError::MissingUploadUrl)?;

    let payload = FirmwarePayload::read(firmware).map_err(|source| UploadError::Read {
        path: firmware.to_path_buf(),
        source,
    })?;
    let md5 = payload.md5().to_string();
    let firmware_size = payload.len();
    info!(
        "Uploading {} ({} bytes, md5 {}) to {}",
        firmware.display(),
        firmware_size,
        md5,
        url
    );

    let form = payload.into_form().map_err(UploadError::Encode)?;
    let client = Client::builder()
        .user_agent(version::user_agent())
        .timeout(ctx.upload_timeout)
        .build()
        .map_err(UploadError::Client)?;

    let spinner = upload_spinner(&url);
    let result = client.post(&url).multipart(form).send();
    spinner.finish_and_clear();

    let response = result.map_err(|source| UploadError::Transport {
        url: url.clone(),
        source,
    })?;

    let status = response.status();
    debug!("OTA endpoint answered HTTP {}", status);
    if !status.is_success() {
        let body = match response.text() {
            Ok(body) => body,
            Err(err) => {
                debug!("Could not read error body from {}: {}", url, err);
                String::new()
            }
        };
        return Err(UploadError::Status {
            url,
            status,
            detail: body_excerpt(&body),
        });
    }

    Ok(UploadReceipt {
        url,
        md5,
        firmware_size,
        status,
    })
}

fn upload_spinner(url: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Uploading firmware to {url}"));
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Plain-text digest of an error page: tags dropped, whitespace collapsed,
/// truncated to [`DETAIL_MAX_CHARS`].
fn body_excerpt(body: &str) -> String {
    let mut text = String::with_capacity(body.len().min(DETAIL_MAX_CHARS * 2));
    let mut in_tag = false;
    for c in body.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= DETAIL_MAX_CHARS {
        collapsed
    } else {
        let mut truncated: String = collapsed.chars().take(DETAIL_MAX_CHARS).collect();
        truncated.push('…');
        truncated
    }
}
