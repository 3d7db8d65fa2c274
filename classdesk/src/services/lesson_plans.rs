//! Lesson plan files
//!
//! Plans are stored inline in the local store as base64 data URLs, so an
//! upload reads the whole file into memory.

use super::data_url;
use crate::database::{time_based_id, LessonPlan};
use crate::error::{AppError, Result};
use crate::storage::LocalStore;
use chrono::Utc;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct LessonPlanService {
    store: LocalStore,
}

/// Strip path separators so a stored name cannot escape the target dir
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0')
        .take(255)
        .collect();

    match cleaned.trim_matches('.') {
        "" => "lesson-plan".to_string(),
        _ => cleaned,
    }
}

impl LessonPlanService {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<LessonPlan>> {
        self.store.get_lesson_plans()
    }

    pub fn get(&self, id: &str) -> Result<LessonPlan> {
        self.list()?
            .into_iter()
            .find(|plan| plan.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Lesson plan {}", id)))
    }

    /// Store a file as a new plan. The title defaults to the file name
    /// without its extension.
    pub fn upload(&self, path: &Path, title: Option<&str>) -> Result<LessonPlan> {
        let bytes = std::fs::read(path)?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::Validation(format!("{} is not a file", path.display())))?;

        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => title.to_string(),
            None => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.clone()),
        };

        let file_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let plan = LessonPlan {
            id: time_based_id(),
            title,
            file_content: data_url::encode(&file_type, &bytes),
            file_name,
            file_type,
            upload_date: Utc::now(),
        };

        self.store.save_lesson_plan(&plan)?;
        tracing::info!(
            "Lesson plan uploaded: {} ({}, {} bytes)",
            plan.id,
            plan.file_type,
            bytes.len()
        );

        Ok(plan)
    }

    /// Write a plan's file into `dir`; returns the written path
    pub fn download(&self, id: &str, dir: &Path) -> Result<PathBuf> {
        let plan = self.get(id)?;
        let (_, bytes) = data_url::decode(&plan.file_content)?;

        std::fs::create_dir_all(dir)?;
        let target = dir.join(sanitize_filename(&plan.file_name));
        std::fs::write(&target, &bytes)?;

        tracing::info!("Lesson plan {} written to {:?}", id, target);
        Ok(target)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.get(id)?;
        self.store.delete_lesson_plan(id)?;
        tracing::info!("Lesson plan deleted: {}", id);
        Ok(())
    }
}
