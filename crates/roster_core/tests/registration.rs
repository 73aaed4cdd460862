use roster_core::db::open_db_in_memory;
use roster_core::{
    DuplicatePolicy, RegistrationService, RosterError, RosterErrorKind, RosterRepository,
    SqliteRosterRepository,
};

#[test]
fn register_creates_teacher_students_and_edges() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let service = RegistrationService::new(repo);

    let summary = service
        .register_students(
            "teacherken@gmail.com",
            &emails(&["studentjon@gmail.com", "studenthon@gmail.com"]),
        )
        .unwrap();
    assert_eq!(summary.edges_added, 2);
    assert_eq!(summary.student_ids.len(), 2);
    assert!(summary.already_registered.is_empty());

    let teacher = repo
        .find_teacher_by_email("teacherken@gmail.com")
        .unwrap()
        .unwrap();
    assert_eq!(teacher.id, summary.teacher_id);
    assert_eq!(repo.count_edges_for_teacher(teacher.id).unwrap(), 2);
}

#[test]
fn skip_policy_accepts_repeated_registration_as_noop() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let service = RegistrationService::new(repo);
    assert_eq!(service.policy(), DuplicatePolicy::Skip);

    service
        .register_students("teacherken@gmail.com", &emails(&["studentjon@gmail.com"]))
        .unwrap();
    let again = service
        .register_students(
            "teacherken@gmail.com",
            &emails(&["studentjon@gmail.com", "studentbob@gmail.com"]),
        )
        .unwrap();

    assert_eq!(again.edges_added, 1);
    assert_eq!(again.already_registered, emails(&["studentjon@gmail.com"]));
    assert_eq!(repo.count_edges_for_teacher(again.teacher_id).unwrap(), 2);
}

#[test]
fn reject_policy_fails_whole_call_and_persists_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let service = RegistrationService::with_policy(repo, DuplicatePolicy::Reject);

    let first = service
        .register_students(
            "teacherken@gmail.com",
            &emails(&["studentjon@gmail.com", "studenthon@gmail.com"]),
        )
        .unwrap();

    let err = service
        .register_students(
            "teacherken@gmail.com",
            &emails(&[
                "studentjon@gmail.com",
                "studentnew@gmail.com",
                "studenthon@gmail.com",
            ]),
        )
        .unwrap_err();
    assert_eq!(err.kind(), RosterErrorKind::Conflict);
    match err {
        RosterError::AlreadyRegistered { teacher, students } => {
            assert_eq!(teacher, "teacherken@gmail.com");
            assert_eq!(
                students,
                emails(&["studentjon@gmail.com", "studenthon@gmail.com"])
            );
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(repo
        .find_student_by_email("studentnew@gmail.com")
        .unwrap()
        .is_none());
    assert_eq!(repo.count_edges_for_teacher(first.teacher_id).unwrap(), 2);
}

#[test]
fn reject_policy_allows_new_students_only() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let service = RegistrationService::with_policy(repo, DuplicatePolicy::Reject);

    service
        .register_students("teacherken@gmail.com", &emails(&["studentjon@gmail.com"]))
        .unwrap();
    let summary = service
        .register_students("teacherken@gmail.com", &emails(&["studentbob@gmail.com"]))
        .unwrap();
    assert_eq!(summary.edges_added, 1);
    assert_eq!(repo.count_edges_for_teacher(summary.teacher_id).unwrap(), 2);
}

#[test]
fn same_student_can_join_several_teachers() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let service = RegistrationService::new(repo);

    let first = service
        .register_students("teacher1@gmail.com", &emails(&["shared@gmail.com"]))
        .unwrap();
    let second = service
        .register_students("teacher2@gmail.com", &emails(&["shared@gmail.com"]))
        .unwrap();
    assert_eq!(first.student_ids, second.student_ids);
    assert_ne!(first.teacher_id, second.teacher_id);

    let student = repo.find_student_by_email("shared@gmail.com").unwrap().unwrap();
    assert_eq!(repo.teachers_for_student(student.id).unwrap().len(), 2);
}

#[test]
fn repeated_emails_in_one_request_are_collapsed() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let service = RegistrationService::with_policy(repo, DuplicatePolicy::Reject);

    let summary = service
        .register_students(
            "teacherken@gmail.com",
            &emails(&["studentjon@gmail.com", "StudentJon@gmail.com"]),
        )
        .unwrap();
    assert_eq!(summary.student_ids.len(), 1);
    assert_eq!(summary.edges_added, 1);
}

#[test]
fn invalid_input_is_rejected_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let service = RegistrationService::new(repo);

    let err = service
        .register_students("  ", &emails(&["studentjon@gmail.com"]))
        .unwrap_err();
    assert_eq!(err.kind(), RosterErrorKind::Validation);

    let err = service
        .register_students("teacherken@gmail.com", &[])
        .unwrap_err();
    assert_eq!(err.kind(), RosterErrorKind::Validation);

    assert!(repo
        .find_student_by_email("studentjon@gmail.com")
        .unwrap()
        .is_none());
}

#[test]
fn failed_edge_insert_rolls_back_whole_registration() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TEMP TRIGGER fail_edge_insert
         BEFORE INSERT ON teacher_students
         WHEN NEW.student_id = (SELECT id FROM students WHERE email = 'boom@gmail.com')
         BEGIN
             SELECT RAISE(ABORT, 'edge insert failed');
         END;",
    )
    .unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let service = RegistrationService::new(repo);

    let err = service
        .register_students(
            "teacherken@gmail.com",
            &emails(&["fine@gmail.com", "boom@gmail.com"]),
        )
        .unwrap_err();
    assert_eq!(err.kind(), RosterErrorKind::StoreUnavailable);

    assert!(repo
        .find_teacher_by_email("teacherken@gmail.com")
        .unwrap()
        .is_none());
    assert!(repo
        .find_students_by_emails(&emails(&["fine@gmail.com", "boom@gmail.com"]))
        .unwrap()
        .is_empty());
    let edges: i64 = conn
        .query_row("SELECT COUNT(*) FROM teacher_students;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(edges, 0);
}

fn emails(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
