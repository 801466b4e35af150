// Centralized version information

// Cargo package version from Cargo.toml
pub const CARGO_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const TOOL_NAME: &str = env!("CARGO_PKG_NAME");

// User-Agent sent to the OTA endpoint
pub fn user_agent() -> String {
    format!("{}/{}", TOOL_NAME, CARGO_VERSION)
}
