//! Repository layer for the remote document store
//!
//! Typed CRUD over the `classes`, `students` and `attendance` collections.
//! Every failure is logged and handed back to the caller unchanged; there
//! are no retries and no transactions. Multi-document operations are
//! sequences of independent requests and may stop halfway.

use super::models::*;
use super::{encode, join_all, Direction, Document, DocumentStore, FilterOp, Query};
use crate::config::{ATTENDANCE_COLLECTION, CLASSES_COLLECTION, STUDENTS_COLLECTION};
use crate::error::{StoreError, StoreResult};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;

/// Repository over any document store backend
#[derive(Clone)]
pub struct Repository<S> {
    store: S,
}

fn decode_all<T: DeserializeOwned>(collection: &str, docs: Vec<Document>) -> StoreResult<Vec<T>> {
    docs.into_iter().map(|doc| doc.decode(collection)).collect()
}

fn date_value(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn with_range(mut query: Query, range: &DateRange) -> Query {
    if let Some(from) = range.from {
        query = query.filter("date", FilterOp::GreaterThanOrEqual, date_value(from));
    }
    if let Some(to) = range.to {
        query = query.filter("date", FilterOp::LessThanOrEqual, date_value(to));
    }
    query
}

impl<S: DocumentStore> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ===== Classes =====

    /// Create a class; returns the id the store assigned
    pub async fn add_class(&self, class: &NewClass) -> StoreResult<String> {
        let id = self
            .store
            .add(CLASSES_COLLECTION, encode(class)?)
            .await
            .inspect_err(|e| tracing::error!("Error adding class: {}", e))?;

        tracing::debug!("Created class: {}", id);
        Ok(id)
    }

    /// All classes, in store order
    pub async fn get_classes(&self) -> StoreResult<Vec<Class>> {
        async {
            let docs = self.store.list(CLASSES_COLLECTION).await?;
            decode_all(CLASSES_COLLECTION, docs)
        }
        .await
        .inspect_err(|e| tracing::error!("Error getting classes: {}", e))
    }

    pub async fn get_class(&self, id: &str) -> StoreResult<Option<Class>> {
        async {
            self.store
                .get(CLASSES_COLLECTION, id)
                .await?
                .map(|doc| doc.decode(CLASSES_COLLECTION))
                .transpose()
        }
        .await
        .inspect_err(|e| tracing::error!("Error getting class {}: {}", id, e))
    }

    /// Merge the set fields of `patch` into an existing class
    pub async fn update_class(&self, id: &str, patch: &ClassPatch) -> StoreResult<()> {
        self.store
            .update(CLASSES_COLLECTION, id, encode(patch)?)
            .await
            .inspect_err(|e| tracing::error!("Error updating class {}: {}", id, e))
    }

    /// Delete a class together with its students.
    ///
    /// Students go first. If that phase fails the class document is kept,
    /// but students deleted before the failure stay deleted.
    pub async fn delete_class(&self, id: &str) -> StoreResult<()> {
        async {
            let removed = self.delete_students_by_class_id(id).await?;
            self.store.delete(CLASSES_COLLECTION, id).await?;
            tracing::debug!("Deleted class {} and {} students", id, removed);
            Ok::<_, StoreError>(())
        }
        .await
        .inspect_err(|e| tracing::error!("Error deleting class {}: {}", id, e))
    }

    // ===== Students =====

    pub async fn add_student(&self, student: &NewStudent) -> StoreResult<String> {
        let id = self
            .store
            .add(STUDENTS_COLLECTION, encode(student)?)
            .await
            .inspect_err(|e| tracing::error!("Error adding student: {}", e))?;

        tracing::debug!("Created student: {} in class: {}", id, student.class_id);
        Ok(id)
    }

    pub async fn get_student(&self, id: &str) -> StoreResult<Option<Student>> {
        async {
            self.store
                .get(STUDENTS_COLLECTION, id)
                .await?
                .map(|doc| doc.decode(STUDENTS_COLLECTION))
                .transpose()
        }
        .await
        .inspect_err(|e| tracing::error!("Error getting student {}: {}", id, e))
    }

    /// Students of a class, ordered by first name
    pub async fn get_students_by_class_id(&self, class_id: &str) -> StoreResult<Vec<Student>> {
        let query = Query::new()
            .where_eq("classId", class_id)
            .order_by("firstName", Direction::Ascending);

        async {
            let docs = self.store.query(STUDENTS_COLLECTION, &query).await?;
            decode_all(STUDENTS_COLLECTION, docs)
        }
        .await
        .inspect_err(|e| tracing::error!("Error getting students of class {}: {}", class_id, e))
    }

    pub async fn count_students_by_class_id(&self, class_id: &str) -> StoreResult<usize> {
        let query = Query::new().where_eq("classId", class_id);

        self.store
            .query(STUDENTS_COLLECTION, &query)
            .await
            .map(|docs| docs.len())
            .inspect_err(|e| tracing::error!("Error counting students of class {}: {}", class_id, e))
    }

    pub async fn update_student(&self, id: &str, patch: &StudentPatch) -> StoreResult<()> {
        self.store
            .update(STUDENTS_COLLECTION, id, encode(patch)?)
            .await
            .inspect_err(|e| tracing::error!("Error updating student {}: {}", id, e))
    }

    pub async fn delete_student(&self, id: &str) -> StoreResult<()> {
        self.store
            .delete(STUDENTS_COLLECTION, id)
            .await
            .inspect_err(|e| tracing::error!("Error deleting student {}: {}", id, e))?;

        tracing::debug!("Deleted student: {}", id);
        Ok(())
    }

    /// Delete every student of a class; returns how many were deleted.
    ///
    /// Deletes are issued concurrently. The first failure is returned while
    /// the other requests carry on, so the class may end up partially emptied.
    pub async fn delete_students_by_class_id(&self, class_id: &str) -> StoreResult<usize> {
        async {
            let students = self.get_students_by_class_id(class_id).await?;

            let deletes = students.into_iter().map(|student| {
                let repo = self.clone();
                async move { repo.delete_student(&student.id).await }
            });

            Ok::<_, StoreError>(join_all(deletes).await?.len())
        }
        .await
        .inspect_err(|e| tracing::error!("Error deleting students of class {}: {}", class_id, e))
    }

    // ===== Attendance =====

    /// Insert an attendance record.
    ///
    /// Always creates a new document, even when the student already has a
    /// record for that date.
    pub async fn save_attendance(&self, record: &NewAttendanceRecord) -> StoreResult<String> {
        let id = self
            .store
            .add(ATTENDANCE_COLLECTION, encode(record)?)
            .await
            .inspect_err(|e| tracing::error!("Error saving attendance: {}", e))?;

        tracing::debug!(
            "Saved attendance {} for student {} on {}",
            id,
            record.student_id,
            record.date
        );
        Ok(id)
    }

    pub async fn get_attendance_by_date_and_class(
        &self,
        date: NaiveDate,
        class_id: &str,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let query = Query::new()
            .where_eq("date", date_value(date))
            .where_eq("classId", class_id);

        async {
            let docs = self.store.query(ATTENDANCE_COLLECTION, &query).await?;
            decode_all(ATTENDANCE_COLLECTION, docs)
        }
        .await
        .inspect_err(|e| tracing::error!("Error getting attendance: {}", e))
    }

    /// Records of a class within a date window, in store order
    pub async fn get_attendance_by_class_in_range(
        &self,
        class_id: &str,
        range: &DateRange,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let query = with_range(Query::new().where_eq("classId", class_id), range);

        async {
            let docs = self.store.query(ATTENDANCE_COLLECTION, &query).await?;
            decode_all(ATTENDANCE_COLLECTION, docs)
        }
        .await
        .inspect_err(|e| tracing::error!("Error getting attendance of class {}: {}", class_id, e))
    }

    /// Records of one student within a date window, in store order
    pub async fn get_attendance_by_student(
        &self,
        student_id: &str,
        range: &DateRange,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let query = with_range(Query::new().where_eq("studentId", student_id), range);

        async {
            let docs = self.store.query(ATTENDANCE_COLLECTION, &query).await?;
            decode_all(ATTENDANCE_COLLECTION, docs)
        }
        .await
        .inspect_err(|e| {
            tracing::error!("Error getting attendance of student {}: {}", student_id, e)
        })
    }

    pub async fn update_attendance(&self, id: &str, patch: &AttendancePatch) -> StoreResult<()> {
        self.store
            .update(ATTENDANCE_COLLECTION, id, encode(patch)?)
            .await
            .inspect_err(|e| tracing::error!("Error updating attendance {}: {}", id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Fields, SqliteDocumentStore};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    async fn create_test_repo() -> Repository<SqliteDocumentStore> {
        Repository::new(SqliteDocumentStore::in_memory().await.unwrap())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn new_student(first: &str, class_id: &str) -> NewStudent {
        NewStudent {
            first_name: first.to_string(),
            last_name: "Demir".to_string(),
            school_number: format!("{}-no", first),
            class_id: class_id.to_string(),
        }
    }

    fn mark(student: &str, class_id: &str, date: NaiveDate, status: AttendanceStatus) -> NewAttendanceRecord {
        NewAttendanceRecord {
            student_id: student.to_string(),
            class_id: class_id.to_string(),
            date,
            status,
            note: None,
        }
    }

    /// Store whose deletes fail for chosen document ids
    #[derive(Clone)]
    struct FailingDeletes {
        inner: SqliteDocumentStore,
        failing: Arc<Mutex<HashSet<String>>>,
    }

    impl DocumentStore for FailingDeletes {
        async fn add(&self, collection: &str, fields: Fields) -> StoreResult<String> {
            self.inner.add(collection, fields).await
        }

        async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
            self.inner.get(collection, id).await
        }

        async fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
            self.inner.list(collection).await
        }

        async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
            self.inner.query(collection, query).await
        }

        async fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
            self.inner.update(collection, id, fields).await
        }

        async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
            let fails = self.failing.lock().unwrap().contains(id);
            if fails {
                return Err(StoreError::Remote {
                    status: 503,
                    code: "UNAVAILABLE".to_string(),
                    message: "backend unavailable".to_string(),
                });
            }
            self.inner.delete(collection, id).await
        }
    }

    #[tokio::test]
    async fn test_add_and_get_classes() {
        let repo = create_test_repo().await;

        let input = NewClass::new("5-A", "5");
        let id = repo.add_class(&input).await.unwrap();
        assert!(!id.is_empty());

        let classes = repo.get_classes().await.unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].id, id);
        assert_eq!(classes[0].name, "5-A");
        assert_eq!(classes[0].grade, "5");
        assert_eq!(classes[0].total_students, 0);
        assert_eq!(classes[0].created_at, input.created_at);
    }

    #[tokio::test]
    async fn test_update_class_merges_fields() {
        let repo = create_test_repo().await;
        let id = repo.add_class(&NewClass::new("5-A", "5")).await.unwrap();

        repo.update_class(
            &id,
            &ClassPatch {
                name: Some("5-B".to_string()),
                ..ClassPatch::default()
            },
        )
        .await
        .unwrap();

        let class = repo.get_class(&id).await.unwrap().unwrap();
        assert_eq!(class.name, "5-B");
        assert_eq!(class.grade, "5");
    }

    #[tokio::test]
    async fn test_update_missing_class_fails() {
        let repo = create_test_repo().await;

        let err = repo
            .update_class("nope", &ClassPatch::default())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_students_ordered_by_first_name() {
        let repo = create_test_repo().await;

        for first in ["Zeynep", "Ali", "Mert"] {
            repo.add_student(&new_student(first, "c1")).await.unwrap();
        }
        repo.add_student(&new_student("Burak", "c2")).await.unwrap();

        let names: Vec<_> = repo
            .get_students_by_class_id("c1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.first_name)
            .collect();

        assert_eq!(names, vec!["Ali", "Mert", "Zeynep"]);
        assert_eq!(repo.count_students_by_class_id("c2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_student() {
        let repo = create_test_repo().await;
        let id = repo.add_student(&new_student("Ali", "c1")).await.unwrap();

        repo.update_student(
            &id,
            &StudentPatch {
                school_number: Some("4521".to_string()),
                ..StudentPatch::default()
            },
        )
        .await
        .unwrap();

        let students = repo.get_students_by_class_id("c1").await.unwrap();
        assert_eq!(students[0].school_number, "4521");

        repo.delete_student(&id).await.unwrap();
        assert!(repo.get_students_by_class_id("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_class_cascades_to_students() {
        let repo = create_test_repo().await;

        let doomed = repo.add_class(&NewClass::new("5-A", "5")).await.unwrap();
        let kept = repo.add_class(&NewClass::new("6-B", "6")).await.unwrap();
        for first in ["Ali", "Can", "Ece"] {
            repo.add_student(&new_student(first, &doomed)).await.unwrap();
        }
        repo.add_student(&new_student("Deniz", &kept)).await.unwrap();

        repo.delete_class(&doomed).await.unwrap();

        let classes = repo.get_classes().await.unwrap();
        assert!(classes.iter().all(|c| c.id != doomed));
        assert!(repo.get_students_by_class_id(&doomed).await.unwrap().is_empty());
        assert_eq!(repo.get_students_by_class_id(&kept).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_class_keeps_class_when_student_phase_fails() {
        let inner = SqliteDocumentStore::in_memory().await.unwrap();
        let failing = Arc::new(Mutex::new(HashSet::new()));
        let repo = Repository::new(FailingDeletes {
            inner,
            failing: failing.clone(),
        });

        let class_id = repo.add_class(&NewClass::new("5-A", "5")).await.unwrap();
        let stuck = repo.add_student(&new_student("Ali", &class_id)).await.unwrap();
        repo.add_student(&new_student("Can", &class_id)).await.unwrap();
        failing.lock().unwrap().insert(stuck.clone());

        let err = repo.delete_class(&class_id).await.unwrap_err();
        assert!(matches!(err, StoreError::Remote { status: 503, .. }));

        assert!(repo.get_class(&class_id).await.unwrap().is_some());
        let remaining = repo.get_students_by_class_id(&class_id).await.unwrap();
        assert!(remaining.iter().any(|s| s.id == stuck));
    }

    #[tokio::test]
    async fn test_delete_students_of_empty_class() {
        let repo = create_test_repo().await;
        assert_eq!(repo.delete_students_by_class_id("empty").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_attendance_twice_creates_two_records() {
        let repo = create_test_repo().await;
        let record = mark("s1", "c1", day(15), AttendanceStatus::Plus);

        let first = repo.save_attendance(&record).await.unwrap();
        let second = repo.save_attendance(&record).await.unwrap();
        assert_ne!(first, second);

        let records = repo
            .get_attendance_by_date_and_class(day(15), "c1")
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.student_id == "s1"));
    }

    #[tokio::test]
    async fn test_attendance_filters_on_date_and_class() {
        let repo = create_test_repo().await;

        repo.save_attendance(&mark("s1", "c1", day(15), AttendanceStatus::Plus))
            .await
            .unwrap();
        repo.save_attendance(&mark("s1", "c1", day(16), AttendanceStatus::Half))
            .await
            .unwrap();
        repo.save_attendance(&mark("s9", "c2", day(15), AttendanceStatus::Absent))
            .await
            .unwrap();

        let records = repo
            .get_attendance_by_date_and_class(day(15), "c1")
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttendanceStatus::Plus);
    }

    #[tokio::test]
    async fn test_attendance_range_queries() {
        let repo = create_test_repo().await;

        for d in [5, 10, 15, 20] {
            repo.save_attendance(&mark("s1", "c1", day(d), AttendanceStatus::Plus))
                .await
                .unwrap();
        }
        repo.save_attendance(&mark("s2", "c1", day(10), AttendanceStatus::Minus))
            .await
            .unwrap();

        let range = DateRange::new(Some(day(10)), Some(day(15)));
        assert_eq!(
            repo.get_attendance_by_class_in_range("c1", &range)
                .await
                .unwrap()
                .len(),
            3
        );
        assert_eq!(
            repo.get_attendance_by_student("s1", &range)
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            repo.get_attendance_by_student("s1", &DateRange::default())
                .await
                .unwrap()
                .len(),
            4
        );
    }

    #[tokio::test]
    async fn test_update_attendance() {
        let repo = create_test_repo().await;
        let id = repo
            .save_attendance(&mark("s1", "c1", day(15), AttendanceStatus::Plus))
            .await
            .unwrap();

        repo.update_attendance(
            &id,
            &AttendancePatch {
                status: Some(AttendanceStatus::Excused),
                note: Some("Doctor visit".to_string()),
            },
        )
        .await
        .unwrap();

        let records = repo
            .get_attendance_by_date_and_class(day(15), "c1")
            .await
            .unwrap();
        assert_eq!(records[0].status, AttendanceStatus::Excused);
        assert_eq!(records[0].note.as_deref(), Some("Doctor visit"));
    }
}
