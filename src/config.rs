use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::types::SubmitType;

/// Configuration for the submission engine
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the fjall database directory
    pub db_path: PathBuf,
    /// Bound on pipeline retries after optimistic-lock failures
    pub max_submission_attempts: u32,
    /// Whether submitting a change with a topic pulls in the whole topic
    pub topic_submission_enabled: bool,
    /// Identity used as author/committer of server-synthesized merge commits
    pub server_name: String,
    pub server_email: String,
    /// Enable debug logging
    debug: bool,
}

impl Config {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        let db_path = Self::get_db_path();
        tracing::info!("Submission engine database path: {:?}", db_path);
        Self {
            db_path,
            max_submission_attempts: env::var("TRIBUTARY_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            topic_submission_enabled: env::var("TRIBUTARY_TOPIC_SUBMISSION")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            server_name: env::var("TRIBUTARY_SERVER_NAME")
                .unwrap_or_else(|_| "tributary".to_string()),
            server_email: env::var("TRIBUTARY_SERVER_EMAIL")
                .unwrap_or_else(|_| "tributary@localhost".to_string()),
            debug: env::var("TRIBUTARY_DEBUG")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Create a new config with an explicit database path (useful for testing)
    pub fn with_db_path(db_path: PathBuf) -> Self {
        Self {
            db_path,
            max_submission_attempts: 3,
            topic_submission_enabled: true,
            server_name: "tributary".to_string(),
            server_email: "tributary@localhost".to_string(),
            debug: false,
        }
    }

    pub fn is_debug_enabled(&self) -> bool {
        self.debug
    }

    /// Get the database path from environment or use default
    fn get_db_path() -> PathBuf {
        env::var("TRIBUTARY_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let mut path = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                path.push("tributary-db");
                path
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Per-project integration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub submit_type: SubmitType,
    /// Attempt per-file content merges instead of failing on any path touched
    /// by both sides
    pub content_merge: bool,
    /// Force author date to equal committer date on synthesized commits
    pub match_author_to_committer_date: bool,
    /// Collapse a cleanly-merging same-topic batch into one multi-parent
    /// merge commit
    pub batch_topic_merges: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            submit_type: SubmitType::MergeIfNecessary,
            content_merge: true,
            match_author_to_committer_date: false,
            batch_topic_merges: false,
        }
    }
}

/// Project-name-keyed settings map, loadable from a YAML document:
///
/// ```yaml
/// infra:
///   submit_type: CHERRY_PICK
///   content_merge: false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectsConfig {
    projects: BTreeMap<String, ProjectSettings>,
}

impl ProjectsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for a project, falling back to defaults for unknown projects
    pub fn for_project(&self, project: &str) -> ProjectSettings {
        self.projects.get(project).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, project: impl Into<String>, settings: ProjectSettings) {
        self.projects.insert(project.into(), settings);
    }

    /// Parse a YAML settings document
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load settings from a YAML file on disk
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&contents)?)
    }
}
