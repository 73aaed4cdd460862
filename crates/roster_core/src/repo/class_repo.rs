//! Class/subject enrolment repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Create and load classes and subjects.
//! - Own the `class_subjects` and `class_students` link tables.
//!
//! # Invariants
//! - Each link table holds a pair at most once; a second insert fails with
//!   `DuplicateLink`.
//! - Links to unknown classes, subjects or students fail with `*NotFound`.

use crate::model::class::{Class, ClassId, ClassStudent, ClassSubject};
use crate::model::student::{Student, StudentId};
use crate::model::subject::{Subject, SubjectId};
use crate::repo::roster_repo::{
    is_unique_violation, parse_student_row, row_exists, table_exists, RepoError, RepoResult,
    RosterRepository, SqliteRosterRepository, STUDENT_SELECT_SQL,
};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

/// Repository interface for classes, subjects and their enrolment links.
pub trait ClassRepository {
    fn create_class(&self, name: &str, description: &str) -> RepoResult<Class>;
    fn create_subject(&self, name: &str) -> RepoResult<Subject>;
    fn find_class(&self, class_id: ClassId) -> RepoResult<Option<Class>>;
    fn find_subject(&self, subject_id: SubjectId) -> RepoResult<Option<Subject>>;
    /// Loads one student by email from the roster tables.
    fn find_student_by_email(&self, email: &str) -> RepoResult<Option<Student>>;
    fn class_has_subject(&self, class_id: ClassId, subject_id: SubjectId) -> RepoResult<bool>;
    fn class_has_student(&self, class_id: ClassId, student_id: StudentId) -> RepoResult<bool>;
    /// Counts students enrolled in one class.
    fn count_class_students(&self, class_id: ClassId) -> RepoResult<u64>;
    /// Links one subject to one class.
    fn link_subject(&self, class_id: ClassId, subject_id: SubjectId) -> RepoResult<ClassSubject>;
    /// Enrols one student in one class.
    fn enrol_student(&self, class_id: ClassId, student_id: StudentId)
        -> RepoResult<ClassStudent>;
    /// Lists students enrolled in one class, by student id.
    fn students_in_class(&self, class_id: ClassId) -> RepoResult<Vec<Student>>;

    /// Runs `work` inside one write transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back every write otherwise.
    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<RepoError>,
        F: FnOnce(&dyn ClassRepository) -> Result<T, E>;
}

/// SQLite-backed class repository.
#[derive(Clone, Copy)]
pub struct SqliteClassRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteClassRepository<'conn> {
    /// Constructs a repository from a connection migrated with class tables.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        for table in ["classes", "subjects", "class_subjects", "class_students"] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        let _ = SqliteRosterRepository::try_new(conn)?;
        Ok(Self { conn })
    }

    fn ensure_class_exists(&self, class_id: ClassId) -> RepoResult<()> {
        if row_exists(self.conn, "classes", class_id)? {
            Ok(())
        } else {
            Err(RepoError::ClassNotFound(class_id))
        }
    }

    fn link_exists(
        &self,
        table: &'static str,
        column: &'static str,
        class_id: ClassId,
        other_id: i64,
    ) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE class_id = ?1 AND {column} = ?2);"),
            params![class_id, other_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

impl ClassRepository for SqliteClassRepository<'_> {
    fn create_class(&self, name: &str, description: &str) -> RepoResult<Class> {
        self.conn.execute(
            "INSERT INTO classes (name, description) VALUES (?1, ?2);",
            params![name, description],
        )?;
        Ok(Class {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            description: description.to_string(),
        })
    }

    fn create_subject(&self, name: &str) -> RepoResult<Subject> {
        self.conn
            .execute("INSERT INTO subjects (name) VALUES (?1);", [name])?;
        Ok(Subject {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn find_class(&self, class_id: ClassId) -> RepoResult<Option<Class>> {
        let class = self
            .conn
            .query_row(
                "SELECT id, name, description FROM classes WHERE id = ?1;",
                [class_id],
                parse_class_row,
            )
            .optional()?;
        Ok(class)
    }

    fn find_subject(&self, subject_id: SubjectId) -> RepoResult<Option<Subject>> {
        let subject = self
            .conn
            .query_row(
                "SELECT id, name FROM subjects WHERE id = ?1;",
                [subject_id],
                |row| {
                    Ok(Subject {
                        id: row.get("id")?,
                        name: row.get("name")?,
                    })
                },
            )
            .optional()?;
        Ok(subject)
    }

    fn find_student_by_email(&self, email: &str) -> RepoResult<Option<Student>> {
        SqliteRosterRepository::try_new(self.conn)?.find_student_by_email(email)
    }

    fn class_has_subject(&self, class_id: ClassId, subject_id: SubjectId) -> RepoResult<bool> {
        self.link_exists("class_subjects", "subject_id", class_id, subject_id)
    }

    fn class_has_student(&self, class_id: ClassId, student_id: StudentId) -> RepoResult<bool> {
        self.link_exists("class_students", "student_id", class_id, student_id)
    }

    fn count_class_students(&self, class_id: ClassId) -> RepoResult<u64> {
        self.ensure_class_exists(class_id)?;
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM class_students WHERE class_id = ?1;",
            [class_id],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative enrolment count `{count}`")))
    }

    fn link_subject(&self, class_id: ClassId, subject_id: SubjectId) -> RepoResult<ClassSubject> {
        self.ensure_class_exists(class_id)?;
        if !row_exists(self.conn, "subjects", subject_id)? {
            return Err(RepoError::SubjectNotFound(subject_id));
        }
        self.conn
            .execute(
                "INSERT INTO class_subjects (class_id, subject_id) VALUES (?1, ?2);",
                params![class_id, subject_id],
            )
            .map_err(|err| map_link_error(err, "class_subjects"))?;

        Ok(ClassSubject {
            id: self.conn.last_insert_rowid(),
            class_id,
            subject_id,
        })
    }

    fn enrol_student(
        &self,
        class_id: ClassId,
        student_id: StudentId,
    ) -> RepoResult<ClassStudent> {
        self.ensure_class_exists(class_id)?;
        if !row_exists(self.conn, "students", student_id)? {
            return Err(RepoError::StudentNotFound(student_id));
        }
        self.conn
            .execute(
                "INSERT INTO class_students (class_id, student_id) VALUES (?1, ?2);",
                params![class_id, student_id],
            )
            .map_err(|err| map_link_error(err, "class_students"))?;

        Ok(ClassStudent {
            id: self.conn.last_insert_rowid(),
            class_id,
            student_id,
        })
    }

    fn students_in_class(&self, class_id: ClassId) -> RepoResult<Vec<Student>> {
        self.ensure_class_exists(class_id)?;
        let sql = format!(
            "{STUDENT_SELECT_SQL}
             INNER JOIN class_students cs ON cs.student_id = s.id
             WHERE cs.class_id = ?1
             ORDER BY s.id ASC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([class_id])?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(parse_student_row(row)?);
        }
        Ok(students)
    }

    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<RepoError>,
        F: FnOnce(&dyn ClassRepository) -> Result<T, E>,
    {
        // Immediate: the capacity check and the insert must see one snapshot.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let scoped = SqliteClassRepository { conn: &tx };

        match work(&scoped) {
            Ok(value) => {
                tx.commit().map_err(RepoError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=tx_rollback module=class_repo status=error error={}",
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}

fn parse_class_row(row: &Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
    })
}

fn map_link_error(err: rusqlite::Error, table: &'static str) -> RepoError {
    if is_unique_violation(&err) {
        return RepoError::DuplicateLink { table };
    }
    RepoError::from(err)
}
