// src/config/file.rs
//! Optional TOML overrides for phrase lists, so clinical staff can tune them
//! without touching deployment env.
//!
//! ```toml
//! crisis_keywords = ["suicide", "kill myself", "no way out"]
//! help_phrases = ["talk to someone", "counselor"]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::Settings;
use crate::risk::KeywordMatcher;

pub const DEFAULT_CONFIG_PATH: &str = "config/arc.toml";
pub const ENV_CONFIG_PATH: &str = "ARC_CONFIG_PATH";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileOverrides {
    #[serde(default)]
    pub crisis_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub help_phrases: Option<Vec<String>>,
}

impl FileOverrides {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("parse arc config TOML")
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content)
    }

    /// `$ARC_CONFIG_PATH`, else `config/arc.toml` when present, else nothing.
    pub fn load_default() -> Result<Option<Self>> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load_from(&PathBuf::from(p)).map(Some);
        }
        let p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if p.exists() {
            return Self::load_from(&p).map(Some);
        }
        Ok(None)
    }

    /// Empty lists are ignored rather than disabling detection.
    pub fn apply(self, settings: &mut Settings) {
        if let Some(list) = self.crisis_keywords.filter(|l| !l.is_empty()) {
            settings.crisis_keywords = KeywordMatcher::new(list);
        }
        if let Some(list) = self.help_phrases.filter(|l| !l.is_empty()) {
            settings.help_phrases = KeywordMatcher::new(list);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_lists() {
        let mut s = Settings::for_tests();
        let o = FileOverrides::parse(
            r#"
            crisis_keywords = ["No Way Out", "suicide"]
            "#,
        )
        .unwrap();
        o.apply(&mut s);
        assert_eq!(
            s.crisis_keywords.phrases(),
            &["no way out".to_string(), "suicide".to_string()]
        );
        assert!(s.help_phrases.matches_any("I want a counselor"));
    }

    #[test]
    fn empty_list_is_ignored() {
        let mut s = Settings::for_tests();
        FileOverrides::parse("crisis_keywords = []").unwrap().apply(&mut s);
        assert_eq!(s.crisis_keywords.phrases().len(), 5);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileOverrides::parse("crisis = [\"x\"]").is_err());
    }
}
