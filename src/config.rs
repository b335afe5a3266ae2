use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::pr::github::DEFAULT_API_URL as DEFAULT_GITHUB_API_URL;
use crate::store::notion::DEFAULT_API_URL as DEFAULT_NOTION_API_URL;

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = ".pr-notion-sync.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("notion-token is required")]
    MissingNotionToken,

    #[error("notion-database-id is required")]
    MissingDatabaseId,

    #[error("github-token is required")]
    MissingGithubToken,

    #[error("notion-database-id must be a valid Notion database ID, got {0:?}")]
    InvalidDatabaseId(String),

    #[error("{0:?} is not a valid Notion page ID")]
    InvalidPageId(String),

    #[error("{} must map to a Notion property", .0.input_name())]
    MissingFieldMapping(LogicalField),
}

/// Credential string whose `Debug` output never shows the value.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// PR attribute written to the store, independent of the column label used there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalField {
    Title,
    Url,
    Status,
    Number,
    Author,
    Repository,
    Branch,
}

impl LogicalField {
    pub const ALL: [LogicalField; 7] = [
        LogicalField::Title,
        LogicalField::Url,
        LogicalField::Status,
        LogicalField::Number,
        LogicalField::Author,
        LogicalField::Repository,
        LogicalField::Branch,
    ];

    /// Fields that must stay mapped: the title, and the lookup key.
    pub const REQUIRED: [LogicalField; 3] = [
        LogicalField::Title,
        LogicalField::Number,
        LogicalField::Repository,
    ];

    pub fn default_label(self) -> &'static str {
        match self {
            LogicalField::Title => "Title",
            LogicalField::Url => "GitHub URL",
            LogicalField::Status => "Status",
            LogicalField::Number => "PR Number",
            LogicalField::Author => "Author",
            LogicalField::Repository => "Repository",
            LogicalField::Branch => "Branch",
        }
    }

    /// Name of the action input that overrides this field's column label.
    pub fn input_name(self) -> &'static str {
        match self {
            LogicalField::Title => "pr-title-property",
            LogicalField::Url => "pr-url-property",
            LogicalField::Status => "pr-status-property",
            LogicalField::Number => "pr-number-property",
            LogicalField::Author => "pr-author-property",
            LogicalField::Repository => "pr-repository-property",
            LogicalField::Branch => "pr-branch-property",
        }
    }
}

/// Which store column each logical field is written to.
/// A field without an entry is never written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    names: BTreeMap<LogicalField, String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            names: LogicalField::ALL
                .iter()
                .map(|field| (*field, field.default_label().to_string()))
                .collect(),
        }
    }
}

impl FieldMapping {
    pub fn get(&self, field: LogicalField) -> Option<&str> {
        self.names.get(&field).map(String::as_str)
    }

    pub fn set(&mut self, field: LogicalField, name: impl Into<String>) {
        self.names.insert(field, name.into());
    }

    pub fn remove(&mut self, field: LogicalField) {
        self.names.remove(&field);
    }

    /// Column name of a field that must be mapped.
    pub fn require(&self, field: LogicalField) -> Result<&str, ConfigError> {
        self.get(field).ok_or(ConfigError::MissingFieldMapping(field))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for field in LogicalField::REQUIRED {
            self.require(field)?;
        }
        Ok(())
    }
}

/// Top-level configuration loaded from .pr-notion-sync.toml, then overlaid
/// with action inputs and environment variables.
/// All fields are optional here; `into_settings` enforces what a sync needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notion: NotionConfig,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub fields: FieldsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotionConfig {
    pub token: Option<Secret>,
    pub database_id: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<Secret>,
    pub api_url: Option<String>,
}

/// Column label overrides, plus fields that should not be written at all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldsConfig {
    pub title: Option<String>,
    pub url: Option<String>,
    pub status: Option<String>,
    pub number: Option<String>,
    pub author: Option<String>,
    pub repository: Option<String>,
    pub branch: Option<String>,
    #[serde(default)]
    pub skip: Vec<LogicalField>,
}

impl FieldsConfig {
    fn slot_mut(&mut self, field: LogicalField) -> &mut Option<String> {
        match field {
            LogicalField::Title => &mut self.title,
            LogicalField::Url => &mut self.url,
            LogicalField::Status => &mut self.status,
            LogicalField::Number => &mut self.number,
            LogicalField::Author => &mut self.author,
            LogicalField::Repository => &mut self.repository,
            LogicalField::Branch => &mut self.branch,
        }
    }

    fn label_for(&self, field: LogicalField) -> Option<&str> {
        match field {
            LogicalField::Title => self.title.as_deref(),
            LogicalField::Url => self.url.as_deref(),
            LogicalField::Status => self.status.as_deref(),
            LogicalField::Number => self.number.as_deref(),
            LogicalField::Author => self.author.as_deref(),
            LogicalField::Repository => self.repository.as_deref(),
            LogicalField::Branch => self.branch.as_deref(),
        }
    }

    fn to_mapping(&self) -> FieldMapping {
        let mut mapping = FieldMapping::default();
        for field in LogicalField::ALL {
            if let Some(name) = self.label_for(field).filter(|n| !n.trim().is_empty()) {
                mapping.set(field, name);
            }
        }
        for field in &self.skip {
            mapping.remove(*field);
        }
        mapping
    }
}

/// Validated settings for a sync run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub notion_token: Secret,
    pub database_id: String,
    pub github_token: Secret,
    pub notion_api_url: String,
    pub github_api_url: String,
    pub mapping: FieldMapping,
}

impl Config {
    /// Load configuration from `path`, or from .pr-notion-sync.toml in the
    /// current directory when it exists, then overlay the environment.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None if default_path.exists() => Self::load_from(default_path)?,
            None => Config::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Overlay workflow inputs (`INPUT_<NAME>`) and the plain `NOTION_TOKEN` /
    /// `GITHUB_TOKEN` fallbacks. Inputs win over the file; the fallbacks only
    /// fill gaps. Blank values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let input = |name: &str| get(&format!("INPUT_{}", name.to_uppercase()));

        if let Some(token) = input("notion-token") {
            self.notion.token = Some(Secret::new(token));
        }
        if let Some(id) = input("notion-database-id") {
            self.notion.database_id = Some(id);
        }
        if let Some(token) = input("github-token") {
            self.github.token = Some(Secret::new(token));
        }
        for field in LogicalField::ALL {
            if let Some(name) = input(field.input_name()) {
                *self.fields.slot_mut(field) = Some(name);
            }
        }

        if self.notion.token.is_none() {
            self.notion.token = get("NOTION_TOKEN").map(Secret::new);
        }
        if self.github.token.is_none() {
            self.github.token = get("GITHUB_TOKEN").map(Secret::new);
        }
    }

    pub fn notion_token(&self) -> Result<Secret, ConfigError> {
        self.notion.token.clone().ok_or(ConfigError::MissingNotionToken)
    }

    pub fn notion_api_url(&self) -> &str {
        self.notion.api_url.as_deref().unwrap_or(DEFAULT_NOTION_API_URL)
    }

    pub fn field_mapping(&self) -> FieldMapping {
        self.fields.to_mapping()
    }

    /// Check everything a sync needs before any network call is made.
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let notion_token = self.notion_token()?;
        let database_id = self
            .notion
            .database_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingDatabaseId)?;
        let github_token = self.github.token.clone().ok_or(ConfigError::MissingGithubToken)?;

        if !is_valid_notion_id(&database_id) {
            return Err(ConfigError::InvalidDatabaseId(database_id));
        }

        let mapping = self.field_mapping();
        mapping.validate()?;

        Ok(Settings {
            notion_token,
            database_id,
            github_token,
            notion_api_url: self.notion_api_url().to_string(),
            github_api_url: self
                .github
                .api_url
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            mapping,
        })
    }
}

/// Notion IDs are 32 lowercase hex digits, optionally grouped 8-4-4-4-12.
pub fn is_valid_notion_id(id: &str) -> bool {
    let is_hex = |s: &str| s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'));
    if id.len() == 32 {
        return is_hex(id);
    }

    let groups: Vec<&str> = id.split('-').collect();
    groups.iter().map(|g| g.len()).eq([8, 4, 4, 4, 12]) && groups.iter().copied().all(is_hex)
}
