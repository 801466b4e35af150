mod common;

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use axum::http::StatusCode;

use common::{firmware_image, refused_url, MockOta};

const SUCCESS_LINE: &str = "OTA finished successfully";

fn hooks() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pio-ota-hooks"));
    for var in [
        "BUILD_DIR",
        "PROGNAME",
        "UPLOAD_URL",
        "PIOENV",
        "PIO_PROJECT_CONFIG",
        "PIO_OTA_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_firmware(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("firmware.bin");
    fs::write(&path, firmware_image(4096)).unwrap();
    path
}

#[test]
fn upload_success_prints_confirmation() {
    let server = MockOta::ok();
    let dir = tempfile::tempdir().unwrap();
    let firmware = write_firmware(dir.path());

    let output = hooks()
        .arg("upload")
        .arg(&firmware)
        .args(["--upload-url", &server.url])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains(SUCCESS_LINE));
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn upload_rejected_by_device_exits_nonzero() {
    let server = MockOta::start(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Update error: Magic byte is wrong",
    );
    let dir = tempfile::tempdir().unwrap();
    let firmware = write_firmware(dir.path());

    let output = hooks()
        .arg("upload")
        .arg(&firmware)
        .env("UPLOAD_URL", &server.url)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!stdout(&output).contains(SUCCESS_LINE));
    let stderr = stderr(&output);
    assert!(stderr.contains("HTTP 500"), "{stderr}");
    assert!(stderr.contains("Magic byte is wrong"), "{stderr}");
    assert!(!stderr.contains("panicked"), "{stderr}");
}

#[test]
fn upload_connection_refused_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let firmware = write_firmware(dir.path());

    let output = hooks()
        .arg("upload")
        .arg(&firmware)
        .args(["--upload-url", &refused_url(), "--timeout", "10"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!stdout(&output).contains(SUCCESS_LINE));
    let stderr = stderr(&output);
    assert!(stderr.contains("OTA upload failed"), "{stderr}");
    assert!(!stderr.contains("panicked"), "{stderr}");
    assert!(!stderr.contains("RUST_BACKTRACE"), "{stderr}");
}

#[test]
fn upload_without_url_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let firmware = write_firmware(dir.path());

    let output = hooks().arg("upload").arg(&firmware).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("no upload_url configured"));
}

#[test]
fn upload_url_from_project_config() {
    let server = MockOta::ok();
    let dir = tempfile::tempdir().unwrap();
    let firmware = write_firmware(dir.path());
    let config = dir.path().join("project.json");
    fs::write(
        &config,
        format!(
            r#"[["platformio", [["default_envs", ["owie"]]]], ["env:owie", [["upload_url", "{}"]]]]"#,
            server.url
        ),
    )
    .unwrap();

    let output = hooks()
        .arg("upload")
        .arg(&firmware)
        .arg("--project-config")
        .arg(&config)
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn compress_reports_ratio() {
    let dir = tempfile::tempdir().unwrap();
    write_firmware(dir.path());

    let output = hooks()
        .arg("compress")
        .arg("--build-dir")
        .arg(dir.path())
        .args(["--progname", "firmware"])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert_eq!(stdout.matches("Compressing firmware for upload...").count(), 1, "{stdout}");
    let announced = stdout.find("Compressing firmware for upload...").unwrap();
    let reported = stdout.find("% of original (was 4096 bytes, now ").unwrap();
    assert!(announced < reported, "{stdout}");
    assert!(dir.path().join("firmware.bin.bak").exists());

    let again = hooks()
        .arg("compress")
        .env("BUILD_DIR", dir.path())
        .output()
        .unwrap();
    assert!(again.status.success());
    assert!(crate::stdout(&again).contains("Firmware already compressed"));
}

#[test]
fn compress_always_mode_uses_uncompressed_backup() {
    let dir = tempfile::tempdir().unwrap();
    write_firmware(dir.path());

    let output = hooks()
        .args(["compress", "--mode", "always"])
        .arg("--build-dir")
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("firmware.bin.uncompressed").exists());
    assert!(!dir.path().join("firmware.bin.bak").exists());
}

#[test]
fn compress_missing_firmware_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();

    let output = hooks()
        .arg("compress")
        .arg("--build-dir")
        .arg(dir.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("firmware image not found"));
}

#[test]
fn compress_build_dir_from_project_environment() {
    let dir = tempfile::tempdir().unwrap();
    let build_root = dir.path().join("build");
    let env_dir = build_root.join("owie");
    fs::create_dir_all(&env_dir).unwrap();
    write_firmware(&env_dir);

    let config = dir.path().join("project.json");
    fs::write(
        &config,
        serde_json::json!([["platformio", [["build_dir", build_root.to_string_lossy()]]]])
            .to_string(),
    )
    .unwrap();

    let output = hooks()
        .args(["compress", "-e", "owie"])
        .arg("--project-config")
        .arg(&config)
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(env_dir.join("firmware.bin.bak").exists());
}
