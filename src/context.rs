// Build environment handed to each hook by the caller
use std::path::{Path, PathBuf};
use std::time::Duration;

/// PlatformIO's default `$PROGNAME`
pub const DEFAULT_PROG_NAME: &str = "firmware";

/// PlatformIO's default `build_dir`, one sub-directory per environment
pub const DEFAULT_BUILD_ROOT: &str = ".pio/build";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// `$BUILD_DIR` of the environment being built
    pub build_dir: PathBuf,
    /// `$PROGNAME`, without extension
    pub prog_name: String,
    /// `upload_url` project option
    pub upload_url: Option<String>,
    /// None waits on the OTA endpoint for as long as it takes
    pub upload_timeout: Option<Duration>,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from(DEFAULT_BUILD_ROOT),
            prog_name: DEFAULT_PROG_NAME.to_string(),
            upload_url: None,
            upload_timeout: None,
        }
    }
}

impl BuildContext {
    pub fn new(build_dir: impl Into<PathBuf>, prog_name: impl Into<String>) -> Self {
        Self {
            build_dir: build_dir.into(),
            prog_name: prog_name.into(),
            ..Self::default()
        }
    }

    /// Build directory PlatformIO uses for `environment` under `build_root`
    pub fn for_environment(build_root: &Path, environment: &str) -> Self {
        Self::new(build_root.join(environment), DEFAULT_PROG_NAME)
    }

    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = Some(url.into());
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// `<build_dir>/<prog_name>.bin`
    pub fn artifact_path(&self) -> PathBuf {
        self.build_dir.join(format!("{}.bin", self.prog_name))
    }
}
