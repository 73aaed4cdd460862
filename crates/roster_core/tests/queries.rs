use roster_core::db::open_db_in_memory;
use roster_core::{
    QueryService, RegistrationService, RosterErrorKind, RosterRepository, SqliteRosterRepository,
    SuspensionService,
};
use std::collections::BTreeSet;

#[test]
fn single_teacher_excludes_suspended_students() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "t@school.com", &["a@school.com", "b@school.com", "c@school.com"]);
    SuspensionService::new(repo)
        .suspend_student("b@school.com")
        .unwrap();

    let students = QueryService::new(repo)
        .common_students(&emails(&["t@school.com"]))
        .unwrap();
    assert_eq!(students, emails(&["a@school.com", "c@school.com"]));
}

#[test]
fn several_teachers_return_intersection() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "t1@school.com", &["a@school.com", "b@school.com", "c@school.com"]);
    register(repo, "t2@school.com", &["a@school.com", "b@school.com", "d@school.com"]);

    let students = QueryService::new(repo)
        .common_students(&emails(&["t1@school.com", "t2@school.com"]))
        .unwrap();
    assert_eq!(as_set(students), as_set(emails(&["a@school.com", "b@school.com"])));
}

#[test]
fn intersection_keeps_suspended_students() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "t1@school.com", &["a@school.com", "b@school.com"]);
    register(repo, "t2@school.com", &["a@school.com", "b@school.com"]);
    SuspensionService::new(repo)
        .suspend_student("a@school.com")
        .unwrap();

    let students = QueryService::new(repo)
        .common_students(&emails(&["t1@school.com", "t2@school.com"]))
        .unwrap();
    assert_eq!(students, emails(&["a@school.com", "b@school.com"]));
}

#[test]
fn unknown_teacher_makes_result_empty() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "t1@school.com", &["a@school.com"]);
    let service = QueryService::new(repo);

    assert!(service
        .common_students(&emails(&["ghost@school.com"]))
        .unwrap()
        .is_empty());
    assert!(service
        .common_students(&emails(&["t1@school.com", "ghost@school.com"]))
        .unwrap()
        .is_empty());
    assert!(repo.find_teacher_by_email("ghost@school.com").unwrap().is_none());
}

#[test]
fn repeated_teacher_email_counts_once() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "t1@school.com", &["a@school.com"]);

    let students = QueryService::new(repo)
        .common_students(&emails(&["t1@school.com", "T1@school.com"]))
        .unwrap();
    assert_eq!(students, emails(&["a@school.com"]));
}

#[test]
fn common_students_requires_teachers() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let service = QueryService::new(repo);

    let err = service.common_students(&[]).unwrap_err();
    assert_eq!(err.kind(), RosterErrorKind::Validation);
    let err = service
        .common_students(&emails(&["t1@school.com", ""]))
        .unwrap_err();
    assert_eq!(err.kind(), RosterErrorKind::Validation);
}

#[test]
fn recipients_union_registered_and_mentioned_students() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "teacherken@gmail.com", &["studentbob@gmail.com"]);
    register(repo, "teacherjoe@gmail.com", &["studentagnes@gmail.com", "studentmiche@gmail.com"]);

    let recipients = QueryService::new(repo)
        .notification_recipients(
            "teacherken@gmail.com",
            "Hello students! @studentagnes@gmail.com @studentmiche@gmail.com @stranger@gmail.com",
        )
        .unwrap();
    assert_eq!(
        as_set(recipients),
        as_set(emails(&[
            "studentbob@gmail.com",
            "studentagnes@gmail.com",
            "studentmiche@gmail.com",
        ]))
    );
    assert!(repo
        .find_student_by_email("stranger@gmail.com")
        .unwrap()
        .is_none());
}

#[test]
fn recipients_without_mentions_are_registered_students() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "teacherken@gmail.com", &["studentbob@gmail.com"]);

    let recipients = QueryService::new(repo)
        .notification_recipients("teacherken@gmail.com", "Hey everybody")
        .unwrap();
    assert_eq!(recipients, emails(&["studentbob@gmail.com"]));
}

#[test]
fn recipients_are_deduplicated() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "teacherken@gmail.com", &["studentbob@gmail.com"]);
    register(repo, "teacherjoe@gmail.com", &["studentagnes@gmail.com"]);

    let recipients = QueryService::new(repo)
        .notification_recipients(
            "teacherken@gmail.com",
            "@studentbob@gmail.com @studentagnes@gmail.com and again @studentagnes@gmail.com",
        )
        .unwrap();
    assert_eq!(
        recipients,
        emails(&["studentbob@gmail.com", "studentagnes@gmail.com"])
    );
}

#[test]
fn suspended_students_never_receive_notifications() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "teacherken@gmail.com", &["studentbob@gmail.com", "studentmary@gmail.com"]);
    SuspensionService::new(repo)
        .suspend_student("studentmary@gmail.com")
        .unwrap();

    let recipients = QueryService::new(repo)
        .notification_recipients("teacherken@gmail.com", "Hi @studentmary@gmail.com")
        .unwrap();
    assert_eq!(recipients, emails(&["studentbob@gmail.com"]));
}

#[test]
fn notifying_unknown_teacher_creates_it() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "other@gmail.com", &["studentagnes@gmail.com"]);

    let recipients = QueryService::new(repo)
        .notification_recipients("newteacher@gmail.com", "Welcome @studentagnes@gmail.com")
        .unwrap();
    assert_eq!(recipients, emails(&["studentagnes@gmail.com"]));
    let teacher = repo
        .find_teacher_by_email("newteacher@gmail.com")
        .unwrap()
        .unwrap();
    assert_eq!(repo.count_edges_for_teacher(teacher.id).unwrap(), 0);
}

#[test]
fn teachers_of_student_lists_linked_teachers() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "t1@school.com", &["a@school.com"]);
    register(repo, "t2@school.com", &["a@school.com", "b@school.com"]);
    let service = QueryService::new(repo);

    assert_eq!(
        service.teachers_of_student("a@school.com").unwrap(),
        emails(&["t1@school.com", "t2@school.com"])
    );
    let err = service.teachers_of_student("ghost@school.com").unwrap_err();
    assert_eq!(err.kind(), RosterErrorKind::NotFound);
}

#[test]
fn case_variant_mention_of_registered_student_appears_once() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "teacherken@gmail.com", &["studentbob@gmail.com"]);
    register(repo, "teacherjoe@gmail.com", &["studentagnes@gmail.com"]);

    let recipients = QueryService::new(repo)
        .notification_recipients(
            "teacherken@gmail.com",
            "@StudentBob@gmail.com @studentagnes@gmail.com @STUDENTAGNES@GMAIL.COM",
        )
        .unwrap();
    assert_eq!(
        recipients,
        emails(&["studentbob@gmail.com", "studentagnes@gmail.com"])
    );
}

#[test]
fn mention_list_longer_than_bind_limit_resolves() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "other@school.com", &["m7@school.com", "m32999@school.com"]);

    let notification: String = (0..33_000)
        .map(|index| format!("@m{index}@school.com "))
        .collect();
    let recipients = QueryService::new(repo)
        .notification_recipients("t@school.com", &notification)
        .unwrap();
    assert_eq!(recipients, emails(&["m7@school.com", "m32999@school.com"]));
}

#[test]
fn teacher_list_longer_than_bind_limit_resolves() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    register(repo, "t0@school.com", &["a@school.com"]);

    let teachers: Vec<String> = (0..33_000)
        .map(|index| format!("t{index}@school.com"))
        .collect();
    let students = QueryService::new(repo).common_students(&teachers).unwrap();
    assert!(students.is_empty());
}

#[test]
fn intersection_spans_several_teacher_batches() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let teachers: Vec<String> = (0..1_200)
        .map(|index| format!("t{index}@school.com"))
        .collect();
    let shared = emails(&["shared@school.com", "also@school.com"]);
    let service = RegistrationService::new(repo);
    for teacher in &teachers {
        service.register_students(teacher, &shared).unwrap();
    }
    register(repo, &teachers[0], &["only-first@school.com"]);
    register(repo, &teachers[1_199], &["only-last@school.com"]);

    let students = QueryService::new(repo).common_students(&teachers).unwrap();
    assert_eq!(students, shared);
}

fn register(repo: SqliteRosterRepository<'_>, teacher: &str, students: &[&str]) {
    RegistrationService::new(repo)
        .register_students(teacher, &emails(students))
        .unwrap();
}

fn emails(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn as_set(values: Vec<String>) -> BTreeSet<String> {
    values.into_iter().collect()
}
