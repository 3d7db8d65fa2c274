//! Application configuration
//!
//! Central location for configuration constants plus the startup
//! configuration that selects and addresses the remote document store.
//! Configuration is read once at process start and never reloaded.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ===== Remote Collections =====

/// Collection holding class documents
pub const CLASSES_COLLECTION: &str = "classes";
/// Collection holding student documents
pub const STUDENTS_COLLECTION: &str = "students";
/// Collection holding attendance records
pub const ATTENDANCE_COLLECTION: &str = "attendance";

// ===== Local Storage Keys =====

pub const USER_PROFILE_KEY: &str = "classdesk_user_profile";
pub const APP_SETTINGS_KEY: &str = "classdesk_app_settings";
pub const LESSON_PLANS_KEY: &str = "classdesk_lesson_plans";
pub const NOTES_KEY: &str = "classdesk_notes";

// ===== Hosted Store =====

/// Firestore REST base URL, without the `/projects/...` suffix
pub const DEFAULT_FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

/// Database id used when the configuration does not name one
pub const DEFAULT_DATABASE_ID: &str = "(default)";

/// Page size used when listing a whole collection.
/// The hosted store caps a single page at 300 documents.
pub const LIST_PAGE_SIZE: u32 = 300;

/// Length of generated document ids, matching the hosted store's auto-ids
pub const DOCUMENT_ID_LENGTH: usize = 20;

// ===== Files =====

pub const CONFIG_FILE_NAME: &str = "classdesk.json";
pub const SQLITE_FILE_NAME: &str = "classdesk.db";
pub const LOCAL_STORAGE_DIR: &str = "local-storage";

/// Client configuration object of a hosted Firebase project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseConfig {
    pub api_key: String,
    #[serde(default)]
    pub auth_domain: String,
    pub project_id: String,
    #[serde(default)]
    pub storage_bucket: String,
    #[serde(default)]
    pub messaging_sender_id: String,
    #[serde(default)]
    pub app_id: String,
    /// Overrides the REST endpoint, e.g. `http://localhost:8080/v1` for the emulator
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_database_id")]
    pub database_id: String,
}

fn default_database_id() -> String {
    DEFAULT_DATABASE_ID.to_string()
}

impl FirebaseConfig {
    /// Base URL for document paths:
    /// `{endpoint}/projects/{project}/databases/{database}/documents`
    pub fn documents_url(&self) -> String {
        let endpoint = self
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_FIRESTORE_ENDPOINT)
            .trim_end_matches('/');
        format!(
            "{}/projects/{}/databases/{}/documents",
            endpoint, self.project_id, self.database_id
        )
    }
}

/// Which remote document store backs classes, students and attendance.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteConfig {
    Firestore(FirebaseConfig),
    Sqlite { path: PathBuf },
}

/// On-disk shape of `classdesk.json`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    data_dir: Option<PathBuf>,
    #[serde(default)]
    firebase: Option<FirebaseConfig>,
    #[serde(default)]
    sqlite_path: Option<PathBuf>,
}

/// Startup configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub remote: RemoteConfig,
}

impl AppConfig {
    /// Load configuration from `path` (or `<data_dir>/classdesk.json` when
    /// absent), then apply `CLASSDESK_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let default_dir = env("CLASSDESK_DATA_DIR")
            .map(PathBuf::from)
            .or_else(default_data_dir)
            .ok_or_else(|| AppError::Config("Cannot determine a data directory".into()))?;

        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_dir.join(CONFIG_FILE_NAME));

        let file = if config_path.exists() {
            tracing::info!("Loading configuration from {:?}", config_path);
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str::<ConfigFile>(&content).map_err(|e| {
                AppError::Config(format!("Failed to parse {}: {}", config_path.display(), e))
            })?
        } else if path.is_some() {
            return Err(AppError::Config(format!(
                "Configuration file not found: {}",
                config_path.display()
            )));
        } else {
            ConfigFile::default()
        };

        let data_dir = match env("CLASSDESK_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => file.data_dir.clone().unwrap_or(default_dir),
        };

        let mut firebase = file.firebase;
        if let Some(project_id) = env("CLASSDESK_FIREBASE_PROJECT_ID") {
            let config = firebase.get_or_insert_with(|| FirebaseConfig {
                api_key: String::new(),
                auth_domain: String::new(),
                project_id: String::new(),
                storage_bucket: String::new(),
                messaging_sender_id: String::new(),
                app_id: String::new(),
                endpoint: None,
                database_id: default_database_id(),
            });
            config.project_id = project_id;
        }
        if let Some(config) = firebase.as_mut() {
            if let Some(api_key) = env("CLASSDESK_FIREBASE_API_KEY") {
                config.api_key = api_key;
            }
            if let Some(endpoint) = env("CLASSDESK_FIRESTORE_ENDPOINT") {
                config.endpoint = Some(endpoint);
            }
        }

        let remote = match firebase {
            Some(config) => {
                if config.project_id.is_empty() {
                    return Err(AppError::Config("firebase.projectId is empty".into()));
                }
                RemoteConfig::Firestore(config)
            }
            None => RemoteConfig::Sqlite {
                path: file
                    .sqlite_path
                    .unwrap_or_else(|| data_dir.join(SQLITE_FILE_NAME)),
            },
        };

        Ok(Self { data_dir, remote })
    }

    /// Directory backing the persistent key-value store
    pub fn local_storage_dir(&self) -> PathBuf {
        self.data_dir.join(LOCAL_STORAGE_DIR)
    }
}

fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "classdesk").map(|dirs| dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firebase(endpoint: Option<&str>) -> FirebaseConfig {
        FirebaseConfig {
            api_key: "key".to_string(),
            auth_domain: String::new(),
            project_id: "demo-school".to_string(),
            storage_bucket: String::new(),
            messaging_sender_id: String::new(),
            app_id: String::new(),
            endpoint: endpoint.map(str::to_string),
            database_id: DEFAULT_DATABASE_ID.to_string(),
        }
    }

    #[test]
    fn test_documents_url_default_endpoint() {
        assert_eq!(
            firebase(None).documents_url(),
            "https://firestore.googleapis.com/v1/projects/demo-school/databases/(default)/documents"
        );
    }

    #[test]
    fn test_documents_url_emulator_endpoint() {
        assert_eq!(
            firebase(Some("http://localhost:8080/v1/")).documents_url(),
            "http://localhost:8080/v1/projects/demo-school/databases/(default)/documents"
        );
    }

    #[test]
    fn test_firebase_config_parses_client_object() {
        let json = r#"{
            "apiKey": "abc",
            "authDomain": "demo.firebaseapp.com",
            "projectId": "demo",
            "storageBucket": "demo.appspot.com",
            "messagingSenderId": "123",
            "appId": "1:123:web:456"
        }"#;

        let config: FirebaseConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.project_id, "demo");
        assert_eq!(config.database_id, "(default)");
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_load_explicit_file_with_sqlite_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("custom.json");
        let db = temp.path().join("school.db");
        std::fs::write(
            &path,
            serde_json::json!({
                "dataDir": temp.path(),
                "sqlitePath": db,
            })
            .to_string(),
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        if std::env::var("CLASSDESK_FIREBASE_PROJECT_ID").is_err() {
            assert_eq!(config.remote, RemoteConfig::Sqlite { path: db });
        }
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let result = AppConfig::load(Some(&temp.path().join("nope.json")));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
