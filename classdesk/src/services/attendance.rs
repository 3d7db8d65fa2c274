//! Attendance service
//!
//! Loads a class's daily attendance sheet, lets the caller edit it in
//! memory, then writes it back. Records that already existed are updated
//! in place; everything else is inserted.

use super::reports::latest_per_student;
use crate::database::{
    join_all, AttendancePatch, AttendanceStatus, DocumentStore, NewAttendanceRecord, Repository,
    Student,
};
use crate::error::{AppError, Result, StoreError};
use chrono::NaiveDate;
use std::collections::HashMap;

/// One student's mark on a sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub status: AttendanceStatus,
    pub note: Option<String>,
    /// Id of the stored record this entry came from
    pub record_id: Option<String>,
}

/// Attendance for one class on one date
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceSheet {
    pub class_id: String,
    pub date: NaiveDate,
    pub students: Vec<Student>,
    entries: HashMap<String, SheetEntry>,
}

impl AttendanceSheet {
    fn check_rostered(&self, student_id: &str) -> Result<()> {
        if self.students.iter().any(|s| s.id == student_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "Student {} in class {}",
                student_id, self.class_id
            )))
        }
    }

    fn entry_mut(&mut self, student_id: &str) -> &mut SheetEntry {
        self.entries
            .entry(student_id.to_string())
            .or_insert_with(|| SheetEntry {
                status: AttendanceStatus::default(),
                note: None,
                record_id: None,
            })
    }

    pub fn entry(&self, student_id: &str) -> Option<&SheetEntry> {
        self.entries.get(student_id)
    }

    pub fn set_status(&mut self, student_id: &str, status: AttendanceStatus) -> Result<()> {
        self.check_rostered(student_id)?;
        self.entry_mut(student_id).status = status;
        Ok(())
    }

    /// Set or clear (empty text) a student's note
    pub fn set_note(&mut self, student_id: &str, note: &str) -> Result<()> {
        self.check_rostered(student_id)?;
        let note = note.trim();
        self.entry_mut(student_id).note = (!note.is_empty()).then(|| note.to_string());
        Ok(())
    }

    /// Give every student on the roster the same status, keeping notes
    pub fn apply_to_all(&mut self, status: AttendanceStatus) {
        let ids: Vec<String> = self.students.iter().map(|s| s.id.clone()).collect();
        for id in ids {
            self.entry_mut(&id).status = status;
        }
    }

    /// Status to show for a student; unmarked students show the default
    pub fn status_of(&self, student_id: &str) -> AttendanceStatus {
        self.entries
            .get(student_id)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    pub fn note_of(&self, student_id: &str) -> Option<&str> {
        self.entries
            .get(student_id)
            .and_then(|entry| entry.note.as_deref())
    }

    pub fn marked_count(&self) -> usize {
        self.students
            .iter()
            .filter(|s| self.entries.contains_key(&s.id))
            .count()
    }
}

/// Outcome of writing a sheet back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Clone)]
pub struct AttendanceService<S> {
    repo: Repository<S>,
}

impl<S: DocumentStore> AttendanceService<S> {
    pub fn new(repo: Repository<S>) -> Self {
        Self { repo }
    }

    /// Roster plus existing marks for `date`. When a student was marked
    /// more than once that day, the last record is used.
    pub async fn load_sheet(&self, class_id: &str, date: NaiveDate) -> Result<AttendanceSheet> {
        let (students, records) = tokio::try_join!(
            self.repo.get_students_by_class_id(class_id),
            self.repo.get_attendance_by_date_and_class(date, class_id),
        )?;

        let entries = latest_per_student(records)
            .into_iter()
            .filter(|record| students.iter().any(|s| s.id == record.student_id))
            .map(|record| {
                let entry = SheetEntry {
                    status: record.status,
                    note: record.note.filter(|note| !note.is_empty()),
                    record_id: Some(record.id),
                };
                (record.student_id, entry)
            })
            .collect();

        Ok(AttendanceSheet {
            class_id: class_id.to_string(),
            date,
            students,
            entries,
        })
    }

    /// Write every marked entry concurrently
    pub async fn save_sheet(&self, sheet: &AttendanceSheet) -> Result<SaveSummary> {
        tracing::info!(
            "Saving attendance for class {} on {} ({} marks)",
            sheet.class_id,
            sheet.date,
            sheet.marked_count()
        );

        let writes = sheet
            .students
            .iter()
            .filter_map(|student| sheet.entries.get(&student.id).map(|e| (student, e)))
            .map(|(student, entry)| {
                let repo = self.repo.clone();
                let entry = entry.clone();
                let record = NewAttendanceRecord {
                    student_id: student.id.clone(),
                    class_id: sheet.class_id.clone(),
                    date: sheet.date,
                    status: entry.status,
                    note: entry.note.clone(),
                };
                async move {
                    match entry.record_id {
                        Some(id) => {
                            let patch = AttendancePatch {
                                status: Some(entry.status),
                                // An empty string clears a stored note
                                note: Some(entry.note.unwrap_or_default()),
                            };
                            repo.update_attendance(&id, &patch).await?;
                            Ok::<_, StoreError>(false)
                        }
                        None => {
                            repo.save_attendance(&record).await?;
                            Ok(true)
                        }
                    }
                }
            });

        let mut summary = SaveSummary::default();
        for inserted in join_all(writes).await? {
            if inserted {
                summary.inserted += 1;
            } else {
                summary.updated += 1;
            }
        }

        tracing::info!(
            "Attendance saved: {} inserted, {} updated",
            summary.inserted,
            summary.updated
        );
        Ok(summary)
    }

    /// Mark a single student and save right away
    pub async fn mark(
        &self,
        class_id: &str,
        date: NaiveDate,
        student_id: &str,
        status: AttendanceStatus,
        note: Option<&str>,
    ) -> Result<SaveSummary> {
        let mut sheet = self.load_sheet(class_id, date).await?;
        sheet.set_status(student_id, status)?;
        if let Some(note) = note {
            sheet.set_note(student_id, note)?;
        }
        self.save_sheet(&sheet).await
    }
}
