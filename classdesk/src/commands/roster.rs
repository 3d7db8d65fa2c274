//! Dashboard, class and student commands

use crate::app::AppState;
use crate::cli::{ClassesCommand, StudentsCommand};
use crate::database::{DocumentStore, Student};
use crate::error::Result;
use crate::services::Dashboard;

pub async fn dashboard<S: DocumentStore>(state: &AppState<S>) -> Result<String> {
    let dashboard = state.roster.dashboard().await?;
    let profile = state.settings.get_profile()?;
    Ok(format_dashboard(&dashboard, profile.as_ref().map(|p| p.name.as_str())))
}

pub async fn classes<S: DocumentStore>(state: &AppState<S>, cmd: ClassesCommand) -> Result<String> {
    match cmd {
        ClassesCommand::List => {
            let classes = state.roster.list_classes().await?;
            if classes.is_empty() {
                return Ok("No classes found".to_string());
            }
            let mut output = String::new();
            for class in classes {
                output.push_str(&format!(
                    "{}  {:<12} grade {:<4} {} students\n",
                    class.id, class.name, class.grade, class.total_students
                ));
            }
            Ok(output)
        }
        ClassesCommand::Add { name, grade } => {
            let class = state.roster.create_class(&name, &grade).await?;
            Ok(format!("Created class {} ({})", class.name, class.id))
        }
        ClassesCommand::Edit { id, name, grade } => {
            state
                .roster
                .edit_class(&id, name.as_deref(), grade.as_deref())
                .await?;
            Ok(format!("Updated class {}", id))
        }
        ClassesCommand::Delete { id } => {
            state.roster.delete_class(&id).await?;
            Ok(format!("Deleted class {} and its students", id))
        }
    }
}

pub async fn students<S: DocumentStore>(
    state: &AppState<S>,
    cmd: StudentsCommand,
) -> Result<String> {
    match cmd {
        StudentsCommand::List { class_id } => {
            let students = state.roster.list_students(&class_id).await?;
            Ok(format_student_list(&students))
        }
        StudentsCommand::Add {
            class_id,
            first_name,
            last_name,
            number,
        } => {
            let student = state
                .roster
                .add_student(&class_id, &first_name, &last_name, &number)
                .await?;
            Ok(format!("Added {} ({})", student.full_name(), student.id))
        }
        StudentsCommand::Remove { id } => {
            state.roster.remove_student(&id).await?;
            Ok(format!("Removed student {}", id))
        }
    }
}

pub fn format_dashboard(dashboard: &Dashboard, teacher: Option<&str>) -> String {
    let mut output = String::new();
    if let Some(name) = teacher {
        output.push_str(&format!("Hello, {}\n\n", name));
    }
    output.push_str(&format!("Date:        {}\n", dashboard.date));
    output.push_str(&format!("Classes:     {}\n", dashboard.class_count));
    output.push_str(&format!("Students:    {}\n", dashboard.student_count));
    output.push_str(&format!(
        "Marked:      {} / {}\n",
        dashboard.marked_today, dashboard.student_count
    ));
    output.push_str(&format!("Present:     {}\n", dashboard.present_today));
    output.push_str(&format!("Attendance:  {}%\n", dashboard.attendance_rate));
    output
}

pub fn format_student_list(students: &[Student]) -> String {
    if students.is_empty() {
        return "No students found".to_string();
    }

    let mut output = String::new();
    for student in students {
        output.push_str(&format!(
            "{}  {:<6} {}\n",
            student.id,
            student.school_number,
            student.full_name()
        ));
    }
    output
}
