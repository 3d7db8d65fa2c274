//! Services module
//!
//! Business logic services that coordinate between commands and the two
//! stores. Roster, attendance and reports work against the remote
//! document store; notes, lesson plans and settings against local storage.

pub mod attendance;
pub mod data_url;
pub mod lesson_plans;
pub mod notes;
pub mod reports;
pub mod roster;
pub mod settings;

pub use attendance::{AttendanceService, AttendanceSheet, SaveSummary, SheetEntry};
pub use lesson_plans::LessonPlanService;
pub use notes::{NoteEdit, NotesService};
pub use reports::{ClassReport, ReportService, StatusCounts, StudentReport, StudentSummary};
pub use roster::{ClassRoster, Dashboard, RosterService};
pub use settings::SettingsService;
