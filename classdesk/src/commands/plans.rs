//! Lesson plan commands

use crate::app::AppState;
use crate::cli::PlansCommand;
use crate::error::Result;

pub fn plans<S>(state: &AppState<S>, cmd: PlansCommand) -> Result<String> {
    let service = &state.lesson_plans;

    match cmd {
        PlansCommand::List => {
            let plans = service.list()?;
            if plans.is_empty() {
                return Ok("No lesson plans found".to_string());
            }
            let mut output = String::new();
            for plan in plans {
                output.push_str(&format!(
                    "{}  {}  {} ({}, uploaded {})\n",
                    plan.id,
                    plan.title,
                    plan.file_name,
                    plan.file_type,
                    plan.upload_date.format("%Y-%m-%d")
                ));
            }
            Ok(output)
        }
        PlansCommand::Upload { path, title } => {
            let plan = service.upload(&path, title.as_deref())?;
            Ok(format!("Uploaded {} as {}", plan.file_name, plan.id))
        }
        PlansCommand::Download { id, out } => {
            let path = service.download(&id, &out)?;
            Ok(format!("Saved {}", path.display()))
        }
        PlansCommand::Delete { id } => {
            service.delete(&id)?;
            Ok(format!("Deleted lesson plan {}", id))
        }
    }
}
