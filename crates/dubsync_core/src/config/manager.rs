//! Config manager for loading, saving, and atomic updates.
//!
//! - Atomic writes (write to temp file, then rename)
//! - Section-level updates that leave other tables and their comments alone
//! - Missing keys are filled from defaults on load

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    EditParseError(#[from] toml_edit::TomlError),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Manages the dubsync settings file.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Create a manager for the given file. Nothing is read until `load()`
    /// or `load_or_create()`.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Changes stay in memory until `save()` or `update_section()`.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Load config from file. Fails if the file doesn't exist.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        self.settings = toml::from_str(&content)?;
        Ok(())
    }

    /// Load config from file, creating it with defaults if missing.
    ///
    /// Sections or keys missing from an existing file are filled in and the
    /// file is rewritten.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            tracing::info!("Creating default config at '{}'", self.config_path.display());
            self.settings = Settings::default();
            return self.save();
        }

        let content = fs::read_to_string(&self.config_path)?;
        let (settings, missing) = self.parse_and_find_missing(&content)?;
        self.settings = settings;

        if !missing.is_empty() {
            tracing::info!(
                "Filling missing config section(s): {}",
                missing
                    .iter()
                    .map(|s| s.table_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            for section in missing {
                self.update_section(section)?;
            }
        }
        Ok(())
    }

    /// Parse settings and report sections that are absent or incomplete.
    fn parse_and_find_missing(
        &self,
        content: &str,
    ) -> ConfigResult<(Settings, Vec<ConfigSection>)> {
        let doc: DocumentMut = content.parse()?;
        let settings: Settings = toml::from_str(content)?;

        let mut missing = Vec::new();
        for section in ConfigSection::ALL {
            let expected = section_table(&settings, section)?;
            let complete = doc
                .get(section.table_name())
                .and_then(Item::as_table)
                .is_some_and(|table| expected.iter().all(|(key, _)| table.contains_key(key)));
            if !complete {
                missing.push(section);
            }
        }

        Ok((settings, missing))
    }

    /// Save the entire config atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.generate_config_with_comments()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Update a specific section atomically.
    ///
    /// Re-reads the file from disk and replaces only the given table, so
    /// edits made to other sections since loading are kept.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let current_content = if self.config_path.exists() {
            fs::read_to_string(&self.config_path)?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = if current_content.is_empty() {
            DocumentMut::new()
        } else {
            current_content.parse()?
        };

        let table = section_table(&self.settings, section)?;
        match doc
            .get_mut(section.table_name())
            .and_then(Item::as_table_mut)
        {
            // Merge key by key so the table header keeps its comments
            Some(existing) => {
                existing.retain(|key, _| table.contains_key(key));
                for (key, item) in table.iter() {
                    existing[key] = item.clone();
                }
            }
            None => doc[section.table_name()] = Item::Table(table),
        }
        self.atomic_write(&doc.to_string())?;

        Ok(())
    }

    /// Generate config content with a comment above every section.
    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let mut output = String::new();

        output.push_str("# dubsync configuration\n");
        output.push_str("# Sections are rewritten individually; comments elsewhere are kept.\n");

        for section in ConfigSection::ALL {
            output.push_str(&format!("\n# {}\n", section.description()));
            output.push_str(&format!("[{}]\n", section.table_name()));
            output.push_str(&section_toml(&self.settings, section)?);
        }

        Ok(output)
    }

    /// Write content to config file atomically.
    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Temp file in the same directory so the rename stays on one filesystem
        let temp_path = self.config_path.with_extension("toml.tmp");

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

/// Serialize one section's keys (no table header).
fn section_toml(settings: &Settings, section: ConfigSection) -> ConfigResult<String> {
    let content = match section {
        ConfigSection::Detection => toml::to_string_pretty(&settings.detection)?,
        ConfigSection::Merge => toml::to_string_pretty(&settings.merge)?,
        ConfigSection::Tools => toml::to_string_pretty(&settings.tools)?,
        ConfigSection::Logging => toml::to_string_pretty(&settings.logging)?,
    };
    Ok(content)
}

/// One section as an editable table.
fn section_table(settings: &Settings, section: ConfigSection) -> ConfigResult<toml_edit::Table> {
    let doc: DocumentMut = section_toml(settings, section)?.parse()?;
    Ok(doc.as_table().clone())
}
