//! Attendance sheet and report commands

use crate::app::AppState;
use crate::cli::{AttendanceCommand, DateArg, RangeArgs, ReportCommand};
use crate::database::{AttendanceStatus, DateRange, DocumentStore};
use crate::error::{AppError, Result};
use crate::services::{AttendanceSheet, ClassReport, StudentReport};
use chrono::{Local, NaiveDate};

fn sheet_date(arg: &DateArg) -> NaiveDate {
    arg.date.unwrap_or_else(|| Local::now().date_naive())
}

/// Split `KEY=VALUE`
fn split_pair(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| AppError::Validation(format!("expected STUDENT_ID=VALUE, got '{}'", raw)))
}

pub async fn attendance<S: DocumentStore>(
    state: &AppState<S>,
    cmd: AttendanceCommand,
) -> Result<String> {
    match cmd {
        AttendanceCommand::Show { class_id, date } => {
            let sheet = state
                .attendance
                .load_sheet(&class_id, sheet_date(&date))
                .await?;
            Ok(format_sheet(&sheet))
        }
        AttendanceCommand::Mark {
            class_id,
            date,
            all,
            marks,
            notes,
        } => {
            let mut sheet = state
                .attendance
                .load_sheet(&class_id, sheet_date(&date))
                .await?;

            if let Some(status) = all {
                sheet.apply_to_all(status);
            }
            for mark in &marks {
                let (student_id, status) = split_pair(mark)?;
                let status: AttendanceStatus = status.parse().map_err(AppError::Validation)?;
                sheet.set_status(student_id, status)?;
            }
            for note in &notes {
                let (student_id, text) = split_pair(note)?;
                sheet.set_note(student_id, text)?;
            }

            let summary = state.attendance.save_sheet(&sheet).await?;
            Ok(format!(
                "Saved attendance for {}: {} new, {} updated",
                sheet.date, summary.inserted, summary.updated
            ))
        }
    }
}

pub async fn report<S: DocumentStore>(state: &AppState<S>, cmd: ReportCommand) -> Result<String> {
    let to_range = |range: RangeArgs| DateRange::new(range.from, range.to);

    match cmd {
        ReportCommand::Class { class_id, range } => {
            let report = state.reports.class_report(&class_id, to_range(range)).await?;
            Ok(format_class_report(&report))
        }
        ReportCommand::Student { student_id, range } => {
            let report = state
                .reports
                .student_report(&student_id, to_range(range))
                .await?;
            Ok(format_student_report(&report))
        }
    }
}

fn format_range(range: &DateRange) -> String {
    let bound = |date: Option<NaiveDate>| date.map_or_else(|| "...".to_string(), |d| d.to_string());
    format!("{} to {}", bound(range.from), bound(range.to))
}

pub fn format_sheet(sheet: &AttendanceSheet) -> String {
    if sheet.students.is_empty() {
        return "No students found".to_string();
    }

    let mut output = format!(
        "Attendance {} ({} of {} marked)\n",
        sheet.date,
        sheet.marked_count(),
        sheet.students.len()
    );
    for student in &sheet.students {
        let marker = if sheet.entry(&student.id).is_some() { ' ' } else { '*' };
        output.push_str(&format!(
            "{}  {:<24} {:<8}{}",
            student.id,
            student.full_name(),
            sheet.status_of(&student.id),
            marker
        ));
        if let Some(note) = sheet.note_of(&student.id) {
            output.push_str(&format!("  {}", note));
        }
        output.push('\n');
    }
    output
}

pub fn format_class_report(report: &ClassReport) -> String {
    let mut output = format!(
        "Class {} ({})\n",
        report.class.name,
        format_range(&report.range)
    );
    output.push_str("student                   plus half minus absent excused  rate\n");
    for row in &report.students {
        let counts = &row.counts;
        output.push_str(&format!(
            "{:<25} {:>4} {:>4} {:>5} {:>6} {:>7} {:>4}%\n",
            row.student.full_name(),
            counts.plus,
            counts.half,
            counts.minus,
            counts.absent,
            counts.excused,
            counts.attendance_rate()
        ));
    }
    let totals = &report.totals;
    output.push_str(&format!(
        "{:<25} {:>4} {:>4} {:>5} {:>6} {:>7} {:>4}%\n",
        "total",
        totals.plus,
        totals.half,
        totals.minus,
        totals.absent,
        totals.excused,
        totals.attendance_rate()
    ));
    output
}

pub fn format_student_report(report: &StudentReport) -> String {
    let mut output = format!(
        "{} ({})\n",
        report.student.full_name(),
        format_range(&report.range)
    );
    if report.records.is_empty() {
        output.push_str("No attendance records\n");
        return output;
    }
    for record in &report.records {
        output.push_str(&format!("{}  {}", record.date, record.status));
        if let Some(note) = record.note.as_deref().filter(|n| !n.is_empty()) {
            output.push_str(&format!("  {}", note));
        }
        output.push('\n');
    }
    output.push_str(&format!(
        "{} records, attendance {}%\n",
        report.counts.total(),
        report.counts.attendance_rate()
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pair() {
        assert_eq!(split_pair("s1 = absent").unwrap(), ("s1", "absent"));
        assert_eq!(split_pair("s1=Left early=ok").unwrap(), ("s1", "Left early=ok"));
        assert!(split_pair("s1").is_err());
        assert!(split_pair("=plus").is_err());
    }

    #[test]
    fn test_format_range() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert_eq!(
            format_range(&DateRange::new(from, None)),
            "2024-01-01 to ..."
        );
    }
}
