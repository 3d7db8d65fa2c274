//! Note board commands

use super::read_image;
use crate::app::AppState;
use crate::cli::NotesCommand;
use crate::database::Note;
use crate::error::Result;
use crate::services::NoteEdit;

pub fn notes<S>(state: &AppState<S>, cmd: NotesCommand) -> Result<String> {
    let service = &state.notes;

    match cmd {
        NotesCommand::List => Ok(format_note_list(&service.list_notes()?)),
        NotesCommand::Add {
            title,
            content,
            color,
            image,
        } => {
            let mut note = service.create_note(&title, &content, color)?;
            if let Some(path) = image {
                let (bytes, mime) = read_image(&path)?;
                note = service.attach_image(&note.id, &bytes, &mime)?;
            }
            Ok(format!("Created note {}", note.id))
        }
        NotesCommand::Edit {
            id,
            title,
            content,
            color,
            image,
            remove_image,
        } => {
            service.edit_note(
                &id,
                NoteEdit {
                    title,
                    content,
                    color,
                },
            )?;
            if let Some(path) = image {
                let (bytes, mime) = read_image(&path)?;
                service.attach_image(&id, &bytes, &mime)?;
            } else if remove_image {
                service.remove_image(&id)?;
            }
            Ok(format!("Updated note {}", id))
        }
        NotesCommand::Delete { id } => {
            service.delete_note(&id)?;
            Ok(format!("Deleted note {}", id))
        }
        NotesCommand::Search { query } => Ok(format_note_list(&service.search_notes(&query)?)),
    }
}

pub fn format_note_list(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "No notes found".to_string();
    }

    let mut output = String::new();
    for note in notes {
        output.push_str(&format!(
            "{}  [{}] {}{}\n",
            note.id,
            note.color.as_str(),
            note.title,
            if note.has_image { " (image)" } else { "" }
        ));
        for line in note.content.lines().filter(|l| !l.trim().is_empty()) {
            output.push_str(&format!("    {}\n", line));
        }
    }
    output
}
