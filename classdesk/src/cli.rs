//! CLI command definitions

use crate::database::{AttendanceStatus, NoteColor, Theme};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "classdesk")]
#[command(about = "Class rosters, attendance, notes and lesson plans for teachers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: <data dir>/classdesk.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summary of classes, students and today's attendance
    Dashboard,

    /// Manage classes
    #[command(subcommand)]
    Classes(ClassesCommand),

    /// Manage the students of a class
    #[command(subcommand)]
    Students(StudentsCommand),

    /// Daily attendance sheets
    #[command(subcommand)]
    Attendance(AttendanceCommand),

    /// Attendance reports
    #[command(subcommand)]
    Report(ReportCommand),

    /// Personal notes
    #[command(subcommand)]
    Notes(NotesCommand),

    /// Lesson plan files
    #[command(subcommand)]
    Plans(PlansCommand),

    /// Profile and preferences
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand, Debug)]
pub enum ClassesCommand {
    /// List classes with their student counts
    #[command(alias = "ls")]
    List,

    /// Create a class
    Add { name: String, grade: String },

    /// Rename a class or change its grade
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        grade: Option<String>,
    },

    /// Delete a class and all of its students
    #[command(alias = "rm")]
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum StudentsCommand {
    /// List the students of a class
    #[command(alias = "ls")]
    List { class_id: String },

    /// Add a student to a class
    Add {
        class_id: String,
        first_name: String,
        last_name: String,
        /// School number
        #[arg(short, long, default_value = "")]
        number: String,
    },

    /// Remove a student
    #[command(alias = "rm")]
    Remove { id: String },
}

/// Date selection shared by attendance commands
#[derive(Args, Debug, Clone)]
pub struct DateArg {
    /// Date as YYYY-MM-DD (default: today)
    #[arg(short, long)]
    pub date: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
pub enum AttendanceCommand {
    /// Show the attendance sheet of a class
    Show {
        class_id: String,
        #[command(flatten)]
        date: DateArg,
    },

    /// Mark students and save the sheet
    Mark {
        class_id: String,
        #[command(flatten)]
        date: DateArg,
        /// Give every student this status first
        #[arg(long, value_name = "STATUS")]
        all: Option<AttendanceStatus>,
        /// Per-student marks as STUDENT_ID=STATUS
        #[arg(value_name = "STUDENT_ID=STATUS")]
        marks: Vec<String>,
        /// Note for a student as STUDENT_ID=TEXT
        #[arg(long = "note", value_name = "STUDENT_ID=TEXT")]
        notes: Vec<String>,
    },
}

/// Inclusive date window for reports
#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// First day (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Last day (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Per-student totals for a class
    Class {
        class_id: String,
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Day-by-day record of one student
    Student {
        student_id: String,
        #[command(flatten)]
        range: RangeArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum NotesCommand {
    #[command(alias = "ls")]
    List,

    Add {
        title: String,
        #[arg(default_value = "")]
        content: String,
        #[arg(short, long, default_value = "yellow")]
        color: NoteColor,
        /// Image file to attach
        #[arg(long)]
        image: Option<PathBuf>,
    },

    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(short, long)]
        color: Option<NoteColor>,
        /// Image file to attach
        #[arg(long, conflicts_with = "remove_image")]
        image: Option<PathBuf>,
        #[arg(long)]
        remove_image: bool,
    },

    #[command(alias = "rm")]
    Delete { id: String },

    /// Case-insensitive search in titles and contents
    Search { query: String },
}

#[derive(Subcommand, Debug)]
pub enum PlansCommand {
    #[command(alias = "ls")]
    List,

    /// Store a file as a lesson plan
    Upload {
        path: PathBuf,
        /// Title (default: file name without extension)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Write a stored plan back to disk
    Download {
        id: String,
        /// Target directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    #[command(alias = "rm")]
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Show profile and settings
    Show,

    /// Set the color theme (light or dark)
    Theme { theme: Theme },

    /// Turn notification channels on or off
    Notifications {
        #[arg(long)]
        email: Option<bool>,
        #[arg(long)]
        push: Option<bool>,
    },

    /// Update the teacher profile
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        /// Profile picture file
        #[arg(long)]
        image: Option<PathBuf>,
    },
}
