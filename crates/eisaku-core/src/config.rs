use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::locale::Locale;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_MIN_WORDS: u32 = 40;
pub const DEFAULT_MAX_WORDS: u32 = 60;
pub const DEFAULT_REVEAL_DELAY_MS: u64 = 450;

const DEFAULT_INSTITUTIONS: &[&str] = &[
    "東京大学",
    "京都大学",
    "大阪大学",
    "一橋大学",
    "名古屋大学",
    "早稲田大学",
    "慶應義塾大学",
];

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub base_url: Option<String>,
    pub institutions: Option<Vec<String>>,
    pub institution: Option<String>,
    pub min_words: Option<u32>,
    pub max_words: Option<u32>,
    pub locale: Option<String>,
    pub reveal_delay_ms: Option<u64>,
    pub status_badges: Option<bool>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_institution(institution: &str) -> Result<()> {
        Self::save_institution_to(&Self::get_config_path()?, institution)
    }

    /// Update only `institution` in the file at `path`. An unreadable file is
    /// left untouched so the other settings survive.
    pub fn save_institution_to(path: &Path, institution: &str) -> Result<()> {
        let mut config = Self::load_from(path)?;
        config.institution = Some(institution.to_string());
        config.save_to(path)
    }

    /// Exam service URL: `EISAKU_BASE_URL` wins over the file.
    pub fn base_url(&self) -> String {
        std::env::var("EISAKU_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn institutions(&self) -> Vec<String> {
        match &self.institutions {
            Some(list) if !list.is_empty() => list.clone(),
            _ => DEFAULT_INSTITUTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn institution(&self) -> String {
        self.institution
            .clone()
            .or_else(|| self.institutions().into_iter().next())
            .unwrap_or_default()
    }

    /// `(min_words, max_words)`, swapped into order if configured backwards.
    pub fn word_limits(&self) -> (u32, u32) {
        let min = self.min_words.unwrap_or(DEFAULT_MIN_WORDS);
        let max = self.max_words.unwrap_or(DEFAULT_MAX_WORDS);
        if min <= max { (min, max) } else { (max, min) }
    }

    pub fn locale(&self) -> Locale {
        self.locale
            .as_deref()
            .and_then(Locale::from_str)
            .unwrap_or_default()
    }

    pub fn reveal_delay_ms(&self) -> u64 {
        self.reveal_delay_ms.unwrap_or(DEFAULT_REVEAL_DELAY_MS)
    }

    pub fn status_badges(&self) -> bool {
        self.status_badges.unwrap_or(true)
    }

    /// Log level: `EISAKU_LOG` wins over the file.
    pub fn log_level(&self) -> String {
        std::env::var("EISAKU_LOG")
            .ok()
            .or_else(|| self.log_level.clone())
            .unwrap_or_else(|| "info".to_string())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("eisaku"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
