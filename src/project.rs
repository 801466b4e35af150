//! Reader for `pio project config --json-output` dumps.
//!
//! The dump is a list of `[section, [[option, value], ...]]` pairs, where a
//! value is a string, a list of strings for multi-line options, or a scalar.
//! Hooks use it as the fallback behind explicit flags and environment
//! variables, mirroring `env.GetProjectOption`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

const PLATFORMIO_SECTION: &str = "platformio";
const COMMON_ENV_SECTION: &str = "env";

#[derive(Debug, Error)]
pub enum ProjectConfigError {
    #[error("failed to open project config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed project config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Text(String),
    List(Vec<String>),
    Other(serde_json::Value),
}

impl OptionValue {
    /// Value as PlatformIO would substitute it into a command line
    pub fn as_text(&self) -> Option<String> {
        match self {
            OptionValue::Text(text) => Some(text.clone()),
            OptionValue::List(items) if items.is_empty() => None,
            OptionValue::List(items) => Some(items.join("\n")),
            OptionValue::Other(serde_json::Value::Null) => None,
            OptionValue::Other(value) => Some(value.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Section(String, Vec<(String, OptionValue)>);

#[derive(Debug, Default)]
pub struct ProjectConfig {
    sections: Vec<Section>,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<Self, ProjectConfigError> {
        let file = File::open(path).map_err(|source| ProjectConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ProjectConfigError> {
        let sections: Vec<Section> = serde_json::from_reader(reader)?;
        log::debug!("Loaded project config with {} sections", sections.len());
        Ok(Self { sections })
    }

    pub fn from_json_str(json: &str) -> Result<Self, ProjectConfigError> {
        Self::from_reader(json.as_bytes())
    }

    pub fn get(&self, section: &str, option: &str) -> Option<&OptionValue> {
        self.sections
            .iter()
            .filter(|s| s.0 == section)
            .flat_map(|s| s.1.iter())
            .find(|(name, _)| name == option)
            .map(|(_, value)| value)
    }

    /// First entry of `[platformio] default_envs`
    pub fn default_env(&self) -> Option<String> {
        match self.get(PLATFORMIO_SECTION, "default_envs")? {
            OptionValue::List(envs) => envs.first().cloned(),
            OptionValue::Text(envs) => envs
                .split(|c: char| c == ',' || c.is_whitespace())
                .find(|e| !e.is_empty())
                .map(str::to_string),
            OptionValue::Other(_) => None,
        }
    }

    /// Option from `[env:<environment>]`, falling back to the shared `[env]`
    pub fn env_option(&self, environment: &str, option: &str) -> Option<String> {
        let section = format!("{COMMON_ENV_SECTION}:{environment}");
        self.get(&section, option)
            .or_else(|| self.get(COMMON_ENV_SECTION, option))
            .and_then(OptionValue::as_text)
    }

    /// `[platformio] build_dir`, if the project overrides it
    pub fn build_root(&self) -> Option<PathBuf> {
        self.get(PLATFORMIO_SECTION, "build_dir")
            .and_then(OptionValue::as_text)
            .map(PathBuf::from)
    }
}

/// Resolve an environment option: explicit value (flag or env var) first,
/// then the project config for the selected or default environment.
pub fn resolve_option(
    explicit: Option<String>,
    project: Option<&ProjectConfig>,
    environment: Option<&str>,
    option: &str,
) -> Option<String> {
    if explicit.is_some() {
        return explicit;
    }

    let project = project?;
    let environment = match environment {
        Some(env) => env.to_string(),
        None => project.default_env()?,
    };
    let value = project.env_option(&environment, option);
    if let Some(value) = &value {
        log::debug!("Using {option} = {value} from [env:{environment}]");
    }
    value
}
