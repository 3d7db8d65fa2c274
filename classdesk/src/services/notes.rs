//! Notes service
//!
//! Note lifecycle on top of the local key-value store.

use super::data_url;
use crate::database::{time_based_id, Note, NoteColor};
use crate::error::{AppError, Result};
use crate::storage::LocalStore;
use chrono::Utc;

/// Fields to change on an existing note; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct NoteEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub color: Option<NoteColor>,
}

/// Service for managing notes
#[derive(Clone)]
pub struct NotesService {
    store: LocalStore,
}

fn note_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Note title is required".into()));
    }
    Ok(title.to_string())
}

impl NotesService {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Create a new note
    pub fn create_note(&self, title: &str, content: &str, color: NoteColor) -> Result<Note> {
        let now = Utc::now();
        let note = Note {
            id: time_based_id(),
            title: note_title(title)?,
            content: content.trim().to_string(),
            color,
            has_image: false,
            image_data: None,
            created_at: now,
            updated_at: now,
        };

        self.store.save_note(&note)?;
        tracing::info!("Note created: {}", note.id);

        Ok(note)
    }

    /// Get a note by ID
    pub fn get_note(&self, id: &str) -> Result<Note> {
        self.store
            .get_notes()?
            .into_iter()
            .find(|note| note.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Note {}", id)))
    }

    pub fn list_notes(&self) -> Result<Vec<Note>> {
        self.store.get_notes()
    }

    pub fn edit_note(&self, id: &str, edit: NoteEdit) -> Result<Note> {
        let mut note = self.get_note(id)?;

        if let Some(title) = edit.title {
            note.title = note_title(&title)?;
        }
        if let Some(content) = edit.content {
            note.content = content.trim().to_string();
        }
        if let Some(color) = edit.color {
            note.color = color;
        }
        note.updated_at = Utc::now();

        self.store.save_note(&note)?;
        tracing::debug!("Note updated: {}", id);

        Ok(note)
    }

    /// Attach an image, replacing any previous one
    pub fn attach_image(&self, id: &str, bytes: &[u8], mime: &str) -> Result<Note> {
        if !mime.starts_with("image/") {
            return Err(AppError::Validation(format!("{} is not an image type", mime)));
        }

        let mut note = self.get_note(id)?;
        note.has_image = true;
        note.image_data = Some(data_url::encode(mime, bytes));
        note.updated_at = Utc::now();

        self.store.save_note(&note)?;
        tracing::info!("Image attached to note {} ({} bytes)", id, bytes.len());

        Ok(note)
    }

    pub fn remove_image(&self, id: &str) -> Result<Note> {
        let mut note = self.get_note(id)?;
        note.has_image = false;
        note.image_data = None;
        note.updated_at = Utc::now();

        self.store.save_note(&note)?;
        Ok(note)
    }

    pub fn delete_note(&self, id: &str) -> Result<()> {
        self.get_note(id)?;
        self.store.delete_note(id)?;
        tracing::info!("Note deleted: {}", id);
        Ok(())
    }

    /// Search notes by title or content
    pub fn search_notes(&self, query: &str) -> Result<Vec<Note>> {
        let query_lower = query.trim().to_lowercase();

        Ok(self
            .list_notes()?
            .into_iter()
            .filter(|note| {
                note.title.to_lowercase().contains(&query_lower)
                    || note.content.to_lowercase().contains(&query_lower)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use std::sync::Arc;

    fn create_test_service() -> NotesService {
        NotesService::new(LocalStore::new(Arc::new(MemoryBackend::new())))
    }

    #[test]
    fn test_create_and_get_note() {
        let service = create_test_service();

        let note = service
            .create_note("  Parent meeting ", "Friday 15:00", NoteColor::Blue)
            .unwrap();

        let fetched = service.get_note(&note.id).unwrap();
        assert_eq!(fetched.title, "Parent meeting");
        assert_eq!(fetched.color, NoteColor::Blue);
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[test]
    fn test_empty_title_rejected() {
        let service = create_test_service();
        let result = service.create_note("   ", "body", NoteColor::Yellow);
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(service.list_notes().unwrap().is_empty());
    }

    #[test]
    fn test_edit_keeps_created_at_and_position() {
        let service = create_test_service();
        let first = service.create_note("First", "", NoteColor::Yellow).unwrap();
        service.create_note("Second", "", NoteColor::Yellow).unwrap();

        let edited = service
            .edit_note(
                &first.id,
                NoteEdit {
                    content: Some("Updated".to_string()),
                    ..NoteEdit::default()
                },
            )
            .unwrap();

        assert_eq!(edited.created_at, first.created_at);
        assert!(edited.updated_at >= first.updated_at);

        let notes = service.list_notes().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].id, first.id);
        assert_eq!(notes[0].content, "Updated");
    }

    #[test]
    fn test_attach_and_remove_image() {
        let service = create_test_service();
        let note = service.create_note("Board", "", NoteColor::Green).unwrap();

        let with_image = service.attach_image(&note.id, b"\x89PNG", "image/png").unwrap();
        assert!(with_image.has_image);
        assert!(with_image
            .image_data
            .as_deref()
            .unwrap()
            .starts_with("data:image/png;base64,"));

        assert!(matches!(
            service.attach_image(&note.id, b"%PDF", "application/pdf"),
            Err(AppError::Validation(_))
        ));

        let cleared = service.remove_image(&note.id).unwrap();
        assert!(!cleared.has_image);
        assert!(cleared.image_data.is_none());
    }

    #[test]
    fn test_delete_note() {
        let service = create_test_service();
        let note = service.create_note("Temp", "", NoteColor::Pink).unwrap();

        service.delete_note(&note.id).unwrap();

        assert!(service.list_notes().unwrap().is_empty());
        assert!(matches!(
            service.delete_note(&note.id),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_search_notes() {
        let service = create_test_service();
        service
            .create_note("Exam dates", "Math on Monday", NoteColor::Yellow)
            .unwrap();
        service
            .create_note("Trip", "Museum visit", NoteColor::Orange)
            .unwrap();

        let results = service.search_notes("MATH").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Exam dates");

        assert_eq!(service.search_notes("").unwrap().len(), 2);
    }
}
