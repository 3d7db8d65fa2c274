//! Roster service
//!
//! Classes and their students, plus the dashboard summary.
//! Keeps each class's `totalStudents` in line with its actual roster.

use super::reports::{latest_per_student, percent};
use crate::database::{
    join_all, Class, ClassPatch, DocumentStore, NewClass, NewStudent, Repository, Student,
};
use crate::error::{AppError, Result, StoreError};
use chrono::{Local, NaiveDate};

/// A class together with its students
#[derive(Debug, Clone, PartialEq)]
pub struct ClassRoster {
    pub class: Class,
    pub students: Vec<Student>,
}

/// Numbers shown on the home screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub date: NaiveDate,
    pub class_count: usize,
    pub student_count: usize,
    /// Students with a mark for `date`
    pub marked_today: usize,
    pub present_today: usize,
    /// Present students as a rounded percentage of all students
    pub attendance_rate: u32,
}

#[derive(Clone)]
pub struct RosterService<S> {
    repo: Repository<S>,
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

impl<S: DocumentStore> RosterService<S> {
    pub fn new(repo: Repository<S>) -> Self {
        Self { repo }
    }

    pub async fn create_class(&self, name: &str, grade: &str) -> Result<Class> {
        let new_class = NewClass::new(required("Class name", name)?, required("Grade", grade)?);
        tracing::info!("Creating class: {}", new_class.name);

        let id = self.repo.add_class(&new_class).await?;

        Ok(Class {
            id,
            name: new_class.name,
            grade: new_class.grade,
            total_students: new_class.total_students,
            created_at: new_class.created_at,
        })
    }

    pub async fn edit_class(&self, id: &str, name: Option<&str>, grade: Option<&str>) -> Result<()> {
        let patch = ClassPatch {
            name: name.map(|n| required("Class name", n)).transpose()?,
            grade: grade.map(|g| required("Grade", g)).transpose()?,
            total_students: None,
        };

        self.repo.update_class(id, &patch).await?;
        tracing::info!("Class updated: {}", id);
        Ok(())
    }

    pub async fn delete_class(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting class: {}", id);
        self.repo.delete_class(id).await?;
        Ok(())
    }

    pub async fn get_class(&self, id: &str) -> Result<Class> {
        self.repo
            .get_class(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Class {}", id)))
    }

    pub async fn list_classes(&self) -> Result<Vec<Class>> {
        Ok(self.repo.get_classes().await?)
    }

    pub async fn list_students(&self, class_id: &str) -> Result<Vec<Student>> {
        Ok(self.repo.get_students_by_class_id(class_id).await?)
    }

    /// Every class with its students; rosters are fetched concurrently
    pub async fn list_rosters(&self) -> Result<Vec<ClassRoster>> {
        let classes = self.repo.get_classes().await?;

        let fetches = classes.iter().enumerate().map(|(index, class)| {
            let repo = self.repo.clone();
            let class_id = class.id.clone();
            async move {
                let students = repo.get_students_by_class_id(&class_id).await?;
                Ok::<_, StoreError>((index, students))
            }
        });
        let mut fetched = join_all(fetches).await?;
        fetched.sort_by_key(|(index, _)| *index);

        Ok(classes
            .into_iter()
            .zip(fetched)
            .map(|(class, (_, students))| ClassRoster { class, students })
            .collect())
    }

    pub async fn add_student(
        &self,
        class_id: &str,
        first_name: &str,
        last_name: &str,
        school_number: &str,
    ) -> Result<Student> {
        // Fail before inserting an orphan
        self.get_class(class_id).await?;

        let new_student = NewStudent {
            first_name: required("First name", first_name)?,
            last_name: required("Last name", last_name)?,
            school_number: school_number.trim().to_string(),
            class_id: class_id.to_string(),
        };

        let id = self.repo.add_student(&new_student).await?;
        tracing::info!("Student {} added to class {}", id, class_id);

        self.sync_total_students(class_id).await?;

        Ok(Student {
            id,
            first_name: new_student.first_name,
            last_name: new_student.last_name,
            school_number: new_student.school_number,
            class_id: new_student.class_id,
        })
    }

    pub async fn remove_student(&self, id: &str) -> Result<()> {
        let student = self
            .repo
            .get_student(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Student {}", id)))?;

        self.repo.delete_student(id).await?;
        tracing::info!("Student {} removed from class {}", id, student.class_id);

        // The class may already be gone
        match self.sync_total_students(&student.class_id).await {
            Err(AppError::Store(e)) if e.is_not_found() => Ok(()),
            other => other.map(|_| ()),
        }
    }

    /// Overwrite a class's `totalStudents` with its live student count
    pub async fn sync_total_students(&self, class_id: &str) -> Result<u32> {
        let count = self.repo.count_students_by_class_id(class_id).await? as u32;

        self.repo
            .update_class(
                class_id,
                &ClassPatch {
                    total_students: Some(count),
                    ..ClassPatch::default()
                },
            )
            .await?;

        tracing::debug!("Class {} now has {} students", class_id, count);
        Ok(count)
    }

    /// Dashboard for today's local date
    pub async fn dashboard(&self) -> Result<Dashboard> {
        self.dashboard_on(Local::now().date_naive()).await
    }

    pub async fn dashboard_on(&self, date: NaiveDate) -> Result<Dashboard> {
        let classes = self.repo.get_classes().await?;

        let per_class = classes.iter().map(|class| {
            let repo = self.repo.clone();
            let class_id = class.id.clone();
            async move {
                let students = repo.get_students_by_class_id(&class_id).await?;
                let records = repo.get_attendance_by_date_and_class(date, &class_id).await?;
                // Marks left behind by removed students do not count
                let on_roster: Vec<_> = latest_per_student(records)
                    .into_iter()
                    .filter(|record| students.iter().any(|s| s.id == record.student_id))
                    .collect();
                Ok::<_, StoreError>((students.len(), on_roster))
            }
        });

        let mut dashboard = Dashboard {
            date,
            class_count: classes.len(),
            student_count: 0,
            marked_today: 0,
            present_today: 0,
            attendance_rate: 0,
        };
        for (students, records) in join_all(per_class).await? {
            dashboard.student_count += students;
            dashboard.marked_today += records.len();
            dashboard.present_today += records.iter().filter(|r| r.status.is_present()).count();
        }
        dashboard.attendance_rate = percent(dashboard.present_today, dashboard.student_count);

        Ok(dashboard)
    }
}
