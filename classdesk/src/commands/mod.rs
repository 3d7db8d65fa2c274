//! Command handlers for the `classdesk` binary
//!
//! Each handler calls into the services on [`AppState`] and renders the
//! result as plain text:
//! - `roster`: dashboard, classes and students
//! - `attendance`: daily sheets and reports
//! - `notes`: note board
//! - `plans`: lesson plan files
//! - `settings`: profile and preferences

pub mod attendance;
pub mod notes;
pub mod plans;
pub mod roster;
pub mod settings;

use crate::app::AppState;
use crate::cli::Command;
use crate::database::DocumentStore;
use crate::error::{AppError, Result};
use std::path::Path;

/// Run one command and return what should be printed
pub async fn run<S: DocumentStore>(state: &AppState<S>, command: Command) -> Result<String> {
    match command {
        Command::Dashboard => roster::dashboard(state).await,
        Command::Classes(cmd) => roster::classes(state, cmd).await,
        Command::Students(cmd) => roster::students(state, cmd).await,
        Command::Attendance(cmd) => attendance::attendance(state, cmd).await,
        Command::Report(cmd) => attendance::report(state, cmd).await,
        Command::Notes(cmd) => notes::notes(state, cmd),
        Command::Plans(cmd) => plans::plans(state, cmd),
        Command::Settings(cmd) => settings::settings(state, cmd),
    }
}

/// Read an image file and guess its media type from the extension
fn read_image(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes = std::fs::read(path)?;
    let mime = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    if !mime.starts_with("image/") {
        return Err(AppError::Validation(format!(
            "{} does not look like an image",
            path.display()
        )));
    }
    Ok((bytes, mime))
}
