//! Roster repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide find/create/batch-find APIs for teachers and students.
//! - Own the teacher/student edge set: add, list, count and intersect.
//! - Offer a transaction boundary for multi-row use-cases.
//!
//! # Invariants
//! - At most one row exists per email within each kind, even under racing
//!   find-or-create calls (unique constraint + re-read on conflict).
//! - An edge exists at most once; re-adding a linked pair is a no-op.
//! - Direct references to unknown primary keys fail with `*NotFound`.

use crate::db::DbError;
use crate::model::class::ClassId;
use crate::model::student::{Student, StudentId};
use crate::model::subject::SubjectId;
use crate::model::teacher::{Teacher, TeacherId};
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TEACHER_SELECT_SQL: &str = "SELECT
    t.id AS id,
    t.email AS email
FROM teachers t";

pub(crate) const STUDENT_SELECT_SQL: &str = "SELECT
    s.id AS id,
    s.email AS email,
    s.is_suspended AS is_suspended
FROM students s";

/// Upper bound on bound parameters per `IN (...)` list. Longer inputs are
/// split into several statements; SQLite caps one statement at 32766.
pub const MAX_BIND_BATCH: usize = 500;

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity table addressed by a repository error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Teacher,
    Student,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

/// Repository error for roster persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite failure, including busy-timeout expiry.
    Db(DbError),
    TeacherNotFound(TeacherId),
    StudentNotFound(StudentId),
    ClassNotFound(ClassId),
    SubjectNotFound(SubjectId),
    /// Insert collided with the unique email constraint.
    DuplicateEmail { kind: EntityKind, email: String },
    /// Insert collided with a unique pair in a link table.
    DuplicateLink { table: &'static str },
    /// Connection was not migrated to the roster schema.
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::TeacherNotFound(id) => write!(f, "teacher not found: {id}"),
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::ClassNotFound(id) => write!(f, "class not found: {id}"),
            Self::SubjectNotFound(id) => write!(f, "subject not found: {id}"),
            Self::DuplicateEmail { kind, email } => {
                write!(f, "{} with email `{email}` already exists", kind.as_str())
            }
            Self::DuplicateLink { table } => write!(f, "pair already present in `{table}`"),
            Self::MissingRequiredTable(table) => {
                write!(f, "roster repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted roster data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for teachers, students and their edge set.
pub trait RosterRepository {
    /// Loads one teacher by email.
    fn find_teacher_by_email(&self, email: &str) -> RepoResult<Option<Teacher>>;
    /// Loads the teachers matching `emails`; unknown emails are omitted.
    fn find_teachers_by_emails(&self, emails: &[String]) -> RepoResult<Vec<Teacher>>;
    /// Loads one student by email.
    fn find_student_by_email(&self, email: &str) -> RepoResult<Option<Student>>;
    /// Loads the students matching `emails`; unknown emails are omitted.
    fn find_students_by_emails(&self, emails: &[String]) -> RepoResult<Vec<Student>>;
    /// Loads the non-suspended students matching `emails`.
    fn find_students_by_emails_not_suspended(&self, emails: &[String])
        -> RepoResult<Vec<Student>>;
    /// Inserts one teacher. Fails with `DuplicateEmail` when present.
    fn create_teacher(&self, email: &str) -> RepoResult<Teacher>;
    /// Inserts one student. Fails with `DuplicateEmail` when present.
    fn create_student(&self, email: &str, suspended: bool) -> RepoResult<Student>;
    /// Returns the subset of `student_ids` already linked to the teacher.
    fn existing_edges(
        &self,
        teacher_id: TeacherId,
        student_ids: &[StudentId],
    ) -> RepoResult<BTreeSet<StudentId>>;
    /// Links students to the teacher, skipping linked pairs.
    ///
    /// Returns the number of edges inserted.
    fn add_edges(&self, teacher_id: TeacherId, student_ids: &[StudentId]) -> RepoResult<usize>;
    /// Counts edges of one teacher.
    fn count_edges_for_teacher(&self, teacher_id: TeacherId) -> RepoResult<u64>;
    /// Lists non-suspended students linked to one teacher.
    fn students_for_teacher_not_suspended(&self, teacher_id: TeacherId)
        -> RepoResult<Vec<Student>>;
    /// Lists students linked to every teacher in `teacher_ids`.
    fn students_linked_to_all_teachers(&self, teacher_ids: &[TeacherId])
        -> RepoResult<Vec<Student>>;
    /// Lists teachers linked to one student.
    fn teachers_for_student(&self, student_id: StudentId) -> RepoResult<Vec<Teacher>>;
    /// Marks one student suspended. Already suspended rows are left as is.
    fn suspend_student(&self, student_id: StudentId) -> RepoResult<()>;

    /// Runs `work` inside one write transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back every write otherwise.
    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<RepoError>,
        F: FnOnce(&dyn RosterRepository) -> Result<T, E>;

    /// Returns the teacher for `email`, creating it when absent.
    fn find_or_create_teacher(&self, email: &str) -> RepoResult<Teacher> {
        if let Some(teacher) = self.find_teacher_by_email(email)? {
            return Ok(teacher);
        }
        match self.create_teacher(email) {
            Err(RepoError::DuplicateEmail { .. }) => {
                debug!("event=find_or_create module=repo status=conflict_retry kind=teacher");
                self.find_teacher_by_email(email)?.ok_or_else(|| {
                    RepoError::InvalidData(
                        "teacher vanished after unique email conflict".to_string(),
                    )
                })
            }
            other => other,
        }
    }

    /// Returns the student for `email`, creating an active one when absent.
    fn find_or_create_student(&self, email: &str) -> RepoResult<Student> {
        if let Some(student) = self.find_student_by_email(email)? {
            return Ok(student);
        }
        match self.create_student(email, false) {
            Err(RepoError::DuplicateEmail { .. }) => {
                debug!("event=find_or_create module=repo status=conflict_retry kind=student");
                self.find_student_by_email(email)?.ok_or_else(|| {
                    RepoError::InvalidData(
                        "student vanished after unique email conflict".to_string(),
                    )
                })
            }
            other => other,
        }
    }
}

/// SQLite-backed roster repository.
///
/// Borrows one connection; concurrent callers use one connection each.
#[derive(Clone, Copy)]
pub struct SqliteRosterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRosterRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        for table in ["teachers", "students", "teacher_students"] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    fn ensure_teacher_exists(&self, teacher_id: TeacherId) -> RepoResult<()> {
        if row_exists(self.conn, "teachers", teacher_id)? {
            Ok(())
        } else {
            Err(RepoError::TeacherNotFound(teacher_id))
        }
    }

    fn ensure_student_exists(&self, student_id: StudentId) -> RepoResult<()> {
        if row_exists(self.conn, "students", student_id)? {
            Ok(())
        } else {
            Err(RepoError::StudentNotFound(student_id))
        }
    }

    fn query_teachers(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Teacher>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut teachers = Vec::new();
        while let Some(row) = rows.next()? {
            teachers.push(parse_teacher_row(row)?);
        }
        Ok(teachers)
    }

    /// Batched `IN (...)` lookup by email, ordered by id and free of repeats.
    fn query_students_by_emails(
        &self,
        emails: &[String],
        extra_filter: &str,
    ) -> RepoResult<Vec<Student>> {
        let mut found = BTreeMap::new();
        for batch in emails.chunks(MAX_BIND_BATCH) {
            let sql = format!(
                "{STUDENT_SELECT_SQL}
                 WHERE s.email IN ({})
                 {extra_filter};",
                placeholders(batch.len())
            );
            for student in self.query_students(&sql, text_values(batch))? {
                found.insert(student.id, student);
            }
        }
        Ok(found.into_values().collect())
    }

    fn query_students(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Student>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(parse_student_row(row)?);
        }
        Ok(students)
    }
}

impl RosterRepository for SqliteRosterRepository<'_> {
    fn find_teacher_by_email(&self, email: &str) -> RepoResult<Option<Teacher>> {
        let sql = format!("{TEACHER_SELECT_SQL} WHERE t.email = ?1;");
        let teachers = self.query_teachers(&sql, vec![Value::Text(email.to_string())])?;
        Ok(teachers.into_iter().next())
    }

    fn find_teachers_by_emails(&self, emails: &[String]) -> RepoResult<Vec<Teacher>> {
        let mut found = BTreeMap::new();
        for batch in emails.chunks(MAX_BIND_BATCH) {
            let sql = format!(
                "{TEACHER_SELECT_SQL} WHERE t.email IN ({});",
                placeholders(batch.len())
            );
            for teacher in self.query_teachers(&sql, text_values(batch))? {
                found.insert(teacher.id, teacher);
            }
        }
        Ok(found.into_values().collect())
    }

    fn find_student_by_email(&self, email: &str) -> RepoResult<Option<Student>> {
        let sql = format!("{STUDENT_SELECT_SQL} WHERE s.email = ?1;");
        let students = self.query_students(&sql, vec![Value::Text(email.to_string())])?;
        Ok(students.into_iter().next())
    }

    fn find_students_by_emails(&self, emails: &[String]) -> RepoResult<Vec<Student>> {
        self.query_students_by_emails(emails, "")
    }

    fn find_students_by_emails_not_suspended(
        &self,
        emails: &[String],
    ) -> RepoResult<Vec<Student>> {
        self.query_students_by_emails(emails, "AND s.is_suspended = 0")
    }

    fn create_teacher(&self, email: &str) -> RepoResult<Teacher> {
        self.conn
            .execute("INSERT INTO teachers (email) VALUES (?1);", [email])
            .map_err(|err| map_insert_error(err, EntityKind::Teacher, email))?;

        Ok(Teacher {
            id: self.conn.last_insert_rowid(),
            email: email.to_string(),
        })
    }

    fn create_student(&self, email: &str, suspended: bool) -> RepoResult<Student> {
        self.conn
            .execute(
                "INSERT INTO students (email, is_suspended) VALUES (?1, ?2);",
                params![email, bool_to_int(suspended)],
            )
            .map_err(|err| map_insert_error(err, EntityKind::Student, email))?;

        Ok(Student {
            id: self.conn.last_insert_rowid(),
            email: email.to_string(),
            suspended,
        })
    }

    fn existing_edges(
        &self,
        teacher_id: TeacherId,
        student_ids: &[StudentId],
    ) -> RepoResult<BTreeSet<StudentId>> {
        self.ensure_teacher_exists(teacher_id)?;

        let mut linked = BTreeSet::new();
        for batch in student_ids.chunks(MAX_BIND_BATCH) {
            let sql = format!(
                "SELECT student_id
                 FROM teacher_students
                 WHERE teacher_id = ?
                   AND student_id IN ({});",
                placeholders(batch.len())
            );
            let mut bind_values = vec![Value::Integer(teacher_id)];
            bind_values.extend(batch.iter().map(|id| Value::Integer(*id)));

            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            while let Some(row) = rows.next()? {
                linked.insert(row.get::<_, StudentId>(0)?);
            }
        }
        Ok(linked)
    }

    fn add_edges(&self, teacher_id: TeacherId, student_ids: &[StudentId]) -> RepoResult<usize> {
        self.ensure_teacher_exists(teacher_id)?;
        let unique: BTreeSet<StudentId> = student_ids.iter().copied().collect();

        let mut added = 0;
        for student_id in unique {
            self.ensure_student_exists(student_id)?;
            added += self.conn.execute(
                "INSERT OR IGNORE INTO teacher_students (teacher_id, student_id)
                 VALUES (?1, ?2);",
                params![teacher_id, student_id],
            )?;
        }
        Ok(added)
    }

    fn count_edges_for_teacher(&self, teacher_id: TeacherId) -> RepoResult<u64> {
        self.ensure_teacher_exists(teacher_id)?;
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM teacher_students WHERE teacher_id = ?1;",
            [teacher_id],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative edge count `{count}`")))
    }

    fn students_for_teacher_not_suspended(
        &self,
        teacher_id: TeacherId,
    ) -> RepoResult<Vec<Student>> {
        self.ensure_teacher_exists(teacher_id)?;
        let sql = format!(
            "{STUDENT_SELECT_SQL}
             INNER JOIN teacher_students ts ON ts.student_id = s.id
             WHERE ts.teacher_id = ?
               AND s.is_suspended = 0
             ORDER BY s.id ASC;"
        );
        self.query_students(&sql, vec![Value::Integer(teacher_id)])
    }

    fn students_linked_to_all_teachers(
        &self,
        teacher_ids: &[TeacherId],
    ) -> RepoResult<Vec<Student>> {
        let unique: BTreeSet<TeacherId> = teacher_ids.iter().copied().collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }
        for teacher_id in &unique {
            self.ensure_teacher_exists(*teacher_id)?;
        }

        // Each batch yields the students linked to all of its teachers; the
        // answer is the intersection over batches.
        let unique: Vec<TeacherId> = unique.into_iter().collect();
        let mut common: Option<BTreeMap<StudentId, Student>> = None;
        for batch in unique.chunks(MAX_BIND_BATCH) {
            let sql = format!(
                "{STUDENT_SELECT_SQL}
                 INNER JOIN teacher_students ts ON ts.student_id = s.id
                 WHERE ts.teacher_id IN ({})
                 GROUP BY s.id
                 HAVING COUNT(DISTINCT ts.teacher_id) = ?;",
                placeholders(batch.len())
            );
            let required = i64::try_from(batch.len())
                .map_err(|_| RepoError::InvalidData("teacher batch too large".to_string()))?;
            let mut bind_values: Vec<Value> = batch.iter().copied().map(Value::Integer).collect();
            bind_values.push(Value::Integer(required));

            let linked = self.query_students(&sql, bind_values)?;
            let next: BTreeMap<StudentId, Student> = match common.take() {
                None => linked
                    .into_iter()
                    .map(|student| (student.id, student))
                    .collect(),
                Some(mut previous) => {
                    let ids: BTreeSet<StudentId> =
                        linked.iter().map(|student| student.id).collect();
                    previous.retain(|id, _| ids.contains(id));
                    previous
                }
            };
            if next.is_empty() {
                return Ok(Vec::new());
            }
            common = Some(next);
        }
        Ok(common.map(|map| map.into_values().collect()).unwrap_or_default())
    }

    fn teachers_for_student(&self, student_id: StudentId) -> RepoResult<Vec<Teacher>> {
        self.ensure_student_exists(student_id)?;
        let sql = format!(
            "{TEACHER_SELECT_SQL}
             INNER JOIN teacher_students ts ON ts.teacher_id = t.id
             WHERE ts.student_id = ?
             ORDER BY t.id ASC;"
        );
        self.query_teachers(&sql, vec![Value::Integer(student_id)])
    }

    fn suspend_student(&self, student_id: StudentId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE students
             SET
                is_suspended = 1,
                updated_at = CASE
                    WHEN is_suspended = 0 THEN (strftime('%s', 'now') * 1000)
                    ELSE updated_at
                END
             WHERE id = ?1;",
            [student_id],
        )?;

        if changed == 0 {
            return Err(RepoError::StudentNotFound(student_id));
        }

        Ok(())
    }

    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<RepoError>,
        F: FnOnce(&dyn RosterRepository) -> Result<T, E>,
    {
        // Immediate: take the write lock up front so concurrent registrations
        // queue on the busy timeout instead of failing on lock upgrade.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let scoped = SqliteRosterRepository { conn: &tx };

        match work(&scoped) {
            Ok(value) => {
                tx.commit().map_err(RepoError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=tx_rollback module=repo status=error error={}",
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}

fn parse_teacher_row(row: &Row<'_>) -> RepoResult<Teacher> {
    Ok(Teacher {
        id: row.get("id")?,
        email: row.get("email")?,
    })
}

pub(crate) fn parse_student_row(row: &Row<'_>) -> RepoResult<Student> {
    let suspended = match row.get::<_, i64>("is_suspended")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_suspended value `{other}` in students.is_suspended"
            )));
        }
    };

    Ok(Student {
        id: row.get("id")?,
        email: row.get("email")?,
        suspended,
    })
}

fn map_insert_error(err: rusqlite::Error, kind: EntityKind, email: &str) -> RepoError {
    if is_unique_violation(&err) {
        return RepoError::DuplicateEmail {
            kind,
            email: email.to_string(),
        };
    }
    RepoError::from(err)
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn text_values(values: &[String]) -> Vec<Value> {
    values.iter().map(|value| Value::Text(value.clone())).collect()
}

pub(crate) fn row_exists(conn: &Connection, table: &'static str, id: i64) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"),
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
