//! Settings file loading.
//!
//! A settings file describes one title:
//!
//! ```json
//! {
//!     "table_names": ["system.tbl", "pkg0.tbl"],
//!     "multiplier": 25214903917,
//!     "divisor": 4294967291,
//!     "truth": "0a1b2c...",
//!     "lenient": false
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use kunai::prelude::*;

/// On-disk shape of a title's settings.
#[derive(Debug, Deserialize)]
pub struct SettingsFile {
    pub table_names: Vec<String>,
    pub multiplier: u64,
    pub divisor: u64,
    /// Truth table as hex.
    pub truth: String,
    #[serde(default)]
    pub lenient: bool,
}

impl SettingsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid settings file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build store settings; `force_lenient` overrides the file.
    pub fn into_settings(self, force_lenient: bool) -> Result<StoreSettings> {
        let truth = hex::decode(self.truth.trim()).context("Truth table is not valid hex")?;
        let key = KeyParameters::new(truth, self.multiplier, self.divisor);

        let size_check = if force_lenient || self.lenient {
            SizeCheck::Lenient
        } else {
            SizeCheck::Strict
        };

        Ok(StoreSettings::new(key)
            .with_tables(self.table_names)
            .with_size_check(size_check))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        let file = SettingsFile::parse(
            r#"{
                "table_names": ["system.tbl"],
                "multiplier": 7,
                "divisor": 11,
                "truth": "00ff10"
            }"#,
        )
        .unwrap();
        assert!(!file.lenient);

        let settings = file.into_settings(false).unwrap();
        assert_eq!(settings.table_names, ["system.tbl"]);
        assert_eq!(settings.key.truth.as_bytes(), [0x00, 0xFF, 0x10]);
        assert_eq!(settings.key.multiplier, 7);
        assert_eq!(settings.key.divisor, 11);
        assert_eq!(settings.size_check, SizeCheck::Strict);
    }

    #[test]
    fn test_lenient_override() {
        let file = SettingsFile::parse(
            r#"{"table_names": [], "multiplier": 1, "divisor": 1, "truth": "01"}"#,
        )
        .unwrap();
        assert_eq!(
            file.into_settings(true).unwrap().size_check,
            SizeCheck::Lenient
        );
    }

    #[test]
    fn test_bad_truth_hex() {
        let file = SettingsFile::parse(
            r#"{"table_names": [], "multiplier": 1, "divisor": 1, "truth": "xyz"}"#,
        )
        .unwrap();
        assert!(file.into_settings(false).is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("title.json");
        fs::write(
            &path,
            r#"{"table_names": ["a"], "multiplier": 2, "divisor": 3, "truth": "aa", "lenient": true}"#,
        )
        .unwrap();

        let settings = SettingsFile::load(&path).unwrap().into_settings(false).unwrap();
        assert_eq!(settings.size_check, SizeCheck::Lenient);
        assert!(SettingsFile::load(&dir.path().join("missing.json")).is_err());
    }
}
