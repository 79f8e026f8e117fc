// Operating System Family Classification

use serde::{Deserialize, Serialize};

/// Release-identifier file read during detection
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Operating system family of a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    DebianLike,
    RhelLike,
    /// Carries the raw identifier for error reporting
    Unsupported(String),
}

impl OsFamily {
    /// Map a normalized `ID` value to a family
    pub fn from_id(id: &str) -> Self {
        match id {
            "debian" | "ubuntu" => OsFamily::DebianLike,
            "centos" | "almalinux" | "rhel" => OsFamily::RhelLike,
            other => OsFamily::Unsupported(other.to_string()),
        }
    }

    /// Classify the output of reading the release file
    ///
    /// Accepts either the full file or a bare `ID` value.
    pub fn classify(release_output: &str) -> Self {
        Self::from_id(&extract_id(release_output))
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsFamily::DebianLike => write!(f, "debian-like"),
            OsFamily::RhelLike => write!(f, "rhel-like"),
            OsFamily::Unsupported(id) => write!(f, "unsupported({})", id),
        }
    }
}

/// Extract the `ID` field: quotes and whitespace stripped, lower-cased
pub fn extract_id(release_output: &str) -> String {
    let raw = release_output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("ID="))
        .unwrap_or(release_output);

    normalize_id(raw)
}

fn normalize_id(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_lowercase()
}
