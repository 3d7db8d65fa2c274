//! Attendance reports
//!
//! Aggregates attendance records client-side. The store does not stop a
//! student from being marked twice on the same day, so every report first
//! collapses records to one per (student, date), keeping the last one.

use crate::database::{
    AttendanceRecord, AttendanceStatus, Class, DateRange, DocumentStore, Repository, Student,
};
use crate::error::{AppError, Result};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Keep one record per (student, date): the last one in store order.
/// The surviving records keep the position of their first occurrence.
pub fn latest_per_student(records: Vec<AttendanceRecord>) -> Vec<AttendanceRecord> {
    let mut slots: HashMap<(String, NaiveDate), usize> = HashMap::new();
    let mut kept: Vec<AttendanceRecord> = Vec::with_capacity(records.len());

    for record in records {
        let key = (record.student_id.clone(), record.date);
        match slots.get(&key) {
            Some(&slot) => kept[slot] = record,
            None => {
                slots.insert(key, kept.len());
                kept.push(record);
            }
        }
    }

    kept
}

/// `part` as a rounded percentage of `whole`; 0 when `whole` is 0
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

/// Number of marks per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub plus: usize,
    pub half: usize,
    pub minus: usize,
    pub absent: usize,
    pub excused: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Plus => self.plus += 1,
            AttendanceStatus::Half => self.half += 1,
            AttendanceStatus::Minus => self.minus += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Excused => self.excused += 1,
        }
    }

    pub fn get(&self, status: AttendanceStatus) -> usize {
        match status {
            AttendanceStatus::Plus => self.plus,
            AttendanceStatus::Half => self.half,
            AttendanceStatus::Minus => self.minus,
            AttendanceStatus::Absent => self.absent,
            AttendanceStatus::Excused => self.excused,
        }
    }

    pub fn total(&self) -> usize {
        self.plus + self.half + self.minus + self.absent + self.excused
    }

    pub fn present(&self) -> usize {
        self.plus + self.half + self.minus
    }

    /// Present marks as a rounded percentage of all marks
    pub fn attendance_rate(&self) -> u32 {
        percent(self.present(), self.total())
    }

    fn merge(&mut self, other: &StatusCounts) {
        self.plus += other.plus;
        self.half += other.half;
        self.minus += other.minus;
        self.absent += other.absent;
        self.excused += other.excused;
    }
}

impl<'a> FromIterator<&'a AttendanceRecord> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = &'a AttendanceRecord>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for record in iter {
            counts.add(record.status);
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentSummary {
    pub student: Student,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassReport {
    pub class: Class,
    pub range: DateRange,
    /// One row per rostered student, in roster order
    pub students: Vec<StudentSummary>,
    pub totals: StatusCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentReport {
    pub student: Student,
    pub range: DateRange,
    /// Ordered by date
    pub records: Vec<AttendanceRecord>,
    pub counts: StatusCounts,
}

#[derive(Clone)]
pub struct ReportService<S> {
    repo: Repository<S>,
}

impl<S: DocumentStore> ReportService<S> {
    pub fn new(repo: Repository<S>) -> Self {
        Self { repo }
    }

    /// Per-student counts for a class. Records of students no longer on
    /// the roster are left out.
    pub async fn class_report(&self, class_id: &str, range: DateRange) -> Result<ClassReport> {
        let class = self
            .repo
            .get_class(class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Class {}", class_id)))?;

        let (students, records) = tokio::try_join!(
            self.repo.get_students_by_class_id(class_id),
            self.repo.get_attendance_by_class_in_range(class_id, &range),
        )?;

        let mut by_student: HashMap<String, StatusCounts> = HashMap::new();
        for record in latest_per_student(records) {
            by_student
                .entry(record.student_id.clone())
                .or_default()
                .add(record.status);
        }

        let mut totals = StatusCounts::default();
        let students: Vec<StudentSummary> = students
            .into_iter()
            .map(|student| {
                let counts = by_student.get(&student.id).copied().unwrap_or_default();
                totals.merge(&counts);
                StudentSummary { student, counts }
            })
            .collect();

        tracing::debug!(
            "Class report for {}: {} students, {} marks",
            class_id,
            students.len(),
            totals.total()
        );

        Ok(ClassReport {
            class,
            range,
            students,
            totals,
        })
    }

    pub async fn student_report(&self, student_id: &str, range: DateRange) -> Result<StudentReport> {
        let student = self
            .repo
            .get_student(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Student {}", student_id)))?;

        let mut records =
            latest_per_student(self.repo.get_attendance_by_student(student_id, &range).await?);
        records.sort_by_key(|record| record.date);

        let counts = records.iter().collect();

        Ok(StudentReport {
            student,
            range,
            records,
            counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{NewAttendanceRecord, NewClass, NewStudent, SqliteDocumentStore};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn record(id: &str, student: &str, date: NaiveDate, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: id.to_string(),
            student_id: student.to_string(),
            class_id: "c1".to_string(),
            date,
            status,
            note: None,
        }
    }

    struct Fixture {
        service: ReportService<SqliteDocumentStore>,
        repo: Repository<SqliteDocumentStore>,
        class_id: String,
        students: Vec<String>,
    }

    async fn fixture() -> Fixture {
        let repo = Repository::new(SqliteDocumentStore::in_memory().await.unwrap());
        let class_id = repo.add_class(&NewClass::new("7-C", "7")).await.unwrap();

        let mut students = Vec::new();
        for first in ["Ali", "Ece"] {
            let id = repo
                .add_student(&NewStudent {
                    first_name: first.to_string(),
                    last_name: "Sahin".to_string(),
                    school_number: "1".to_string(),
                    class_id: class_id.clone(),
                })
                .await
                .unwrap();
            students.push(id);
        }

        Fixture {
            service: ReportService::new(repo.clone()),
            repo,
            class_id,
            students,
        }
    }

    async fn mark(f: &Fixture, student: &str, date: NaiveDate, status: AttendanceStatus) {
        f.repo
            .save_attendance(&NewAttendanceRecord {
                student_id: student.to_string(),
                class_id: f.class_id.clone(),
                date,
                status,
                note: None,
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_latest_per_student_keeps_last() {
        let records = vec![
            record("1", "s1", day(1), AttendanceStatus::Absent),
            record("2", "s2", day(1), AttendanceStatus::Plus),
            record("3", "s1", day(1), AttendanceStatus::Half),
            record("4", "s1", day(2), AttendanceStatus::Plus),
        ];

        let ids: Vec<_> = latest_per_student(records)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["3", "2", "4"]);
    }

    #[test]
    fn test_percent_rounds() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(4, 4), 100);
    }

    #[tokio::test]
    async fn test_class_report() {
        let f = fixture().await;
        let (ali, ece) = (f.students[0].clone(), f.students[1].clone());

        mark(&f, &ali, day(1), AttendanceStatus::Plus).await;
        mark(&f, &ali, day(2), AttendanceStatus::Absent).await;
        mark(&f, &ali, day(2), AttendanceStatus::Excused).await;
        mark(&f, &ece, day(1), AttendanceStatus::Half).await;
        mark(&f, &ece, day(9), AttendanceStatus::Minus).await;

        let report = f
            .service
            .class_report(&f.class_id, DateRange::new(Some(day(1)), Some(day(5))))
            .await
            .unwrap();

        assert_eq!(report.students.len(), 2);
        assert_eq!(report.students[0].student.id, ali);
        assert_eq!(report.students[0].counts.plus, 1);
        assert_eq!(report.students[0].counts.excused, 1);
        assert_eq!(report.students[0].counts.absent, 0);
        assert_eq!(report.students[0].counts.attendance_rate(), 50);
        assert_eq!(report.students[1].counts.total(), 1);
        assert_eq!(report.totals.total(), 3);
        assert_eq!(report.totals.present(), 2);
    }

    #[tokio::test]
    async fn test_class_report_missing_class() {
        let f = fixture().await;
        let result = f.service.class_report("nope", DateRange::default()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_student_report_orders_by_date() {
        let f = fixture().await;
        let ali = f.students[0].clone();

        mark(&f, &ali, day(3), AttendanceStatus::Minus).await;
        mark(&f, &ali, day(1), AttendanceStatus::Plus).await;
        mark(&f, &ali, day(2), AttendanceStatus::Absent).await;

        let report = f
            .service
            .student_report(&ali, DateRange::default())
            .await
            .unwrap();

        let dates: Vec<_> = report.records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
        assert_eq!(report.counts.get(AttendanceStatus::Absent), 1);
        assert_eq!(report.student.first_name, "Ali");
    }
}
