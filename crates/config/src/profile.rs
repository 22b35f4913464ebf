// Dataset profile
// Loaded from a TOML file (conventionally tallysheet.toml next to the data)

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Describes one tracked dataset: where the source spreadsheet lives,
/// where the store goes, and which columns the engine treats as the
/// identifier and the check-off attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Source spreadsheet/CSV for `init`.
    pub source: Option<PathBuf>,

    /// Store file location. Defaults to the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Identifier column injected at import and used to key updates.
    pub id_column: String,

    /// The single mutable attribute column.
    pub attr_column: String,

    /// Columns dropped at import; unknown names are ignored.
    pub drop_columns: Vec<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Profile {
            source: None,
            db_path: None,
            id_column: "record_id".into(),
            attr_column: "checked".into(),
            drop_columns: Vec::new(),
        }
    }
}

impl Profile {
    pub fn from_toml(text: &str) -> Result<Profile, ProfileError> {
        toml::from_str(text).map_err(|e| ProfileError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Profile, ProfileError> {
        let text = fs::read_to_string(path).map_err(|e| ProfileError::Io(e.to_string()))?;
        Profile::from_toml(&text)
    }

    /// The store file this profile resolves to.
    pub fn database_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }
}

/// Default store location under the platform data directory, falling
/// back to the working directory when none exists.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("tallysheet").join("records.db"))
        .unwrap_or_else(|| PathBuf::from("records.db"))
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileError {
    Io(String),
    Parse(String),
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "profile IO error: {msg}"),
            Self::Parse(msg) => write!(f, "profile parse error: {msg}"),
        }
    }
}

impl std::error::Error for ProfileError {}
