//! Persistent key-value store for first-party data
//!
//! Holds four records under fixed keys: the user profile, app settings,
//! lesson plans and notes. Every write serializes the whole record and
//! every read decodes it again. When no backend is available the getters
//! return empty/default values and the setters do nothing.

use super::backend::{FileBackend, KeyValueBackend};
use crate::config::{APP_SETTINGS_KEY, LESSON_PLANS_KEY, NOTES_KEY, USER_PROFILE_KEY};
use crate::database::{AppSettings, LessonPlan, Note, UserProfile};
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct LocalStore {
    backend: Option<Arc<dyn KeyValueBackend>>,
}

impl LocalStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// A store with no persistent storage behind it
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    /// Open a file-backed store in `dir`, degrading to unavailable when
    /// the directory cannot be used.
    pub fn open(dir: &Path) -> Self {
        match FileBackend::open(dir) {
            Ok(backend) => Self::new(Arc::new(backend)),
            Err(e) => {
                tracing::warn!("Local storage unavailable at {:?}: {}", dir, e);
                Self::unavailable()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(backend) = &self.backend else {
            return Ok(None);
        };
        match backend.get_item(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let Some(backend) = &self.backend else {
            tracing::debug!("Local storage unavailable, dropping write to {}", key);
            return Ok(());
        };
        let raw = serde_json::to_string(value)?;
        backend.set_item(key, &raw)
    }

    // ===== User profile =====

    pub fn get_user_profile(&self) -> Result<Option<UserProfile>> {
        self.read(USER_PROFILE_KEY)
    }

    pub fn save_user_profile(&self, profile: &UserProfile) -> Result<()> {
        self.write(USER_PROFILE_KEY, profile)
    }

    // ===== App settings =====

    /// Stored settings, or the defaults when nothing was saved
    pub fn get_app_settings(&self) -> Result<AppSettings> {
        Ok(self.read(APP_SETTINGS_KEY)?.unwrap_or_default())
    }

    pub fn save_app_settings(&self, settings: &AppSettings) -> Result<()> {
        self.write(APP_SETTINGS_KEY, settings)
    }

    // ===== Lesson plans =====

    pub fn get_lesson_plans(&self) -> Result<Vec<LessonPlan>> {
        Ok(self.read(LESSON_PLANS_KEY)?.unwrap_or_default())
    }

    /// Append a plan to the stored list
    pub fn save_lesson_plan(&self, plan: &LessonPlan) -> Result<()> {
        let mut plans = self.get_lesson_plans()?;
        plans.push(plan.clone());
        self.write(LESSON_PLANS_KEY, &plans)
    }

    pub fn delete_lesson_plan(&self, id: &str) -> Result<()> {
        let mut plans = self.get_lesson_plans()?;
        plans.retain(|plan| plan.id != id);
        self.write(LESSON_PLANS_KEY, &plans)
    }

    // ===== Notes =====

    pub fn get_notes(&self) -> Result<Vec<Note>> {
        Ok(self.read(NOTES_KEY)?.unwrap_or_default())
    }

    /// Insert or replace by id. A replaced note keeps its position.
    pub fn save_note(&self, note: &Note) -> Result<()> {
        let mut notes = self.get_notes()?;
        match notes.iter_mut().find(|existing| existing.id == note.id) {
            Some(existing) => *existing = note.clone(),
            None => notes.push(note.clone()),
        }
        self.write(NOTES_KEY, &notes)
    }

    pub fn delete_note(&self, id: &str) -> Result<()> {
        let mut notes = self.get_notes()?;
        notes.retain(|note| note.id != id);
        self.write(NOTES_KEY, &notes)
    }
}
