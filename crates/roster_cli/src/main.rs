//! `roster` command line entry point.
//!
//! # Responsibility
//! - Expose the roster endpoints as subcommands over a SQLite file.
//! - Validate request shape before calling `roster_core`.
//! - Print response bodies as JSON on stdout and `{"message": ...}` on
//!   stderr for failures.
//!
//! # Usage
//!
//! ```bash
//! roster --db school.sqlite3 register --teacher teacherken@gmail.com \
//!     --student studentjon@gmail.com --student studenthon@gmail.com
//! roster --db school.sqlite3 common-students --teacher teacherken@gmail.com
//! roster --db school.sqlite3 suspend --student studentmary@gmail.com
//! roster --db school.sqlite3 notify --teacher teacherken@gmail.com \
//!     --notification "Hello students! @studentagnes@gmail.com"
//! roster --db school.sqlite3 create-class --name "P5 Integrity"
//! roster --db school.sqlite3 register-class-student --class-id 1 \
//!     --student studentjon@gmail.com
//! ```

use clap::{Parser, Subcommand};
use log::debug;
use roster_core::db::open_db_with_timeout;
use roster_core::{
    init_logging, is_email_address, ClassId, ClassService, DuplicatePolicy, QueryService,
    RegistrationService, RosterConfig, RosterError, RosterErrorKind, SqliteClassRepository,
    SqliteRosterRepository, SubjectId, SuspensionService,
};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_DB_FILE: &str = "roster.sqlite3";

/// Teacher/student roster commands
#[derive(Parser, Debug)]
#[command(name = "roster")]
#[command(version)]
struct Args {
    /// SQLite database file (overrides config and ROSTER_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Handling of already registered students (skip, reject)
    #[arg(long, global = true)]
    duplicate_policy: Option<DuplicatePolicy>,

    /// Enrolment limit of one class
    #[arg(long, global = true)]
    max_students_per_class: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register students to a teacher
    Register {
        #[arg(long)]
        teacher: String,
        #[arg(long = "student", required = true)]
        students: Vec<String>,
    },
    /// List students common to all given teachers
    CommonStudents {
        #[arg(long = "teacher", required = true)]
        teachers: Vec<String>,
    },
    /// Suspend a student
    Suspend {
        #[arg(long)]
        student: String,
    },
    /// List recipients of a teacher's notification
    Notify {
        #[arg(long)]
        teacher: String,
        #[arg(long)]
        notification: String,
    },
    /// List teachers a student is registered to
    TeachersOf {
        #[arg(long)]
        student: String,
    },
    /// Create a class
    CreateClass {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Create a subject
    CreateSubject {
        #[arg(long)]
        name: String,
    },
    /// Register a subject to a class
    RegisterSubject {
        #[arg(long)]
        class_id: ClassId,
        #[arg(long)]
        subject_id: SubjectId,
    },
    /// Enrol a student in a class
    RegisterClassStudent {
        #[arg(long)]
        class_id: ClassId,
        #[arg(long)]
        student: String,
    },
    /// List students enrolled in a class
    ClassStudents {
        #[arg(long)]
        class_id: ClassId,
    },
}

#[derive(Serialize)]
struct StudentsResponse {
    students: Vec<String>,
}

#[derive(Serialize)]
struct RecipientsResponse {
    recipients: Vec<String>,
}

#[derive(Serialize)]
struct TeachersResponse {
    teachers: Vec<String>,
}

#[derive(Serialize)]
struct CreatedResponse<T: Serialize> {
    message: &'static str,
    data: T,
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug)]
enum CliError {
    Startup(String),
    Request(String),
    Roster(RosterError),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Startup(_) => 1,
            Self::Request(_) => 2,
            Self::Roster(err) => match err.kind() {
                RosterErrorKind::Validation => 2,
                RosterErrorKind::NotFound => 3,
                RosterErrorKind::Conflict => 4,
                RosterErrorKind::StoreUnavailable => 5,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Startup(message) | Self::Request(message) => message.clone(),
            Self::Roster(err) => err.to_string(),
        }
    }
}

impl From<RosterError> for CliError {
    fn from(value: RosterError) -> Self {
        Self::Roster(value)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(Some(body)) => {
            println!("{body}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(err) => {
            let body = serde_json::to_string(&ErrorResponse {
                message: err.message(),
            })
            .unwrap_or_else(|_| err.message());
            eprintln!("{body}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(args: Args) -> Result<Option<String>, CliError> {
    let config = load_config(&args)?;
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir).map_err(CliError::Startup)?;
    }

    let db_path = config
        .db_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));
    let conn = open_db_with_timeout(&db_path, config.busy_timeout())
        .map_err(|err| CliError::Startup(format!("failed to open database: {err}")))?;
    let repo = SqliteRosterRepository::try_new(&conn)
        .map_err(|err| CliError::Startup(format!("database is not usable: {err}")))?;

    match args.command {
        Command::Register { teacher, students } => {
            require_valid_email(&teacher, "Teacher must be a valid email address")?;
            for student in &students {
                require_valid_email(student, "Each student must be a valid email address")?;
            }
            let service = RegistrationService::with_policy(repo, config.duplicate_policy);
            let summary = service.register_students(&teacher, &students)?;
            debug!(
                "event=cli_register module=cli status=ok edges_added={}",
                summary.edges_added
            );
            Ok(None)
        }
        Command::CommonStudents { teachers } => {
            for teacher in &teachers {
                require_valid_email(teacher, "Each teacher must be a valid email address")?;
            }
            let students = QueryService::new(repo).common_students(&teachers)?;
            render(&StudentsResponse { students })
        }
        Command::Suspend { student } => {
            require_valid_email(&student, "Student must be a valid email address")?;
            SuspensionService::new(repo).suspend_student(&student)?;
            Ok(None)
        }
        Command::Notify {
            teacher,
            notification,
        } => {
            require_valid_email(&teacher, "Teacher must be a valid email address")?;
            if notification.trim().is_empty() {
                return Err(CliError::Request(
                    "Notification text is required".to_string(),
                ));
            }
            let recipients =
                QueryService::new(repo).notification_recipients(&teacher, &notification)?;
            render(&RecipientsResponse { recipients })
        }
        Command::TeachersOf { student } => {
            require_valid_email(&student, "Student must be a valid email address")?;
            let teachers = QueryService::new(repo).teachers_of_student(&student)?;
            render(&TeachersResponse { teachers })
        }
        Command::CreateClass { name, description } => {
            let class = class_service(&conn, &config)?.create_class(&name, &description)?;
            render(&CreatedResponse {
                message: "Class created successfully",
                data: class,
            })
        }
        Command::CreateSubject { name } => {
            let subject = class_service(&conn, &config)?.create_subject(&name)?;
            render(&CreatedResponse {
                message: "Subject created successfully",
                data: subject,
            })
        }
        Command::RegisterSubject {
            class_id,
            subject_id,
        } => {
            let link = class_service(&conn, &config)?.register_subject(class_id, subject_id)?;
            render(&CreatedResponse {
                message: "Subject registered to class successfully",
                data: link,
            })
        }
        Command::RegisterClassStudent { class_id, student } => {
            require_valid_email(&student, "Student must be a valid email address")?;
            let link = class_service(&conn, &config)?.register_student(class_id, &student)?;
            render(&CreatedResponse {
                message: "Student registered to class successfully",
                data: link,
            })
        }
        Command::ClassStudents { class_id } => {
            let students = class_service(&conn, &config)?.class_students(class_id)?;
            render(&StudentsResponse { students })
        }
    }
}

fn class_service<'conn>(
    conn: &'conn Connection,
    config: &RosterConfig,
) -> Result<ClassService<SqliteClassRepository<'conn>>, CliError> {
    let repo = SqliteClassRepository::try_new(conn)
        .map_err(|err| CliError::Startup(format!("database is not usable: {err}")))?;
    Ok(ClassService::with_capacity(
        repo,
        config.max_students_per_class,
    ))
}

fn load_config(args: &Args) -> Result<RosterConfig, CliError> {
    let base = match args.config.as_deref() {
        Some(path) => RosterConfig::from_json_file(path),
        None => Ok(RosterConfig::default()),
    };
    let mut config = base
        .and_then(RosterConfig::apply_env)
        .map_err(|err| CliError::Startup(err.to_string()))?;

    if let Some(db) = args.db.clone() {
        config.db_path = Some(db);
    }
    if let Some(level) = args.log_level.clone() {
        config.log_level = level;
    }
    if let Some(log_dir) = args.log_dir.clone() {
        config.log_dir = Some(log_dir);
    }
    if let Some(policy) = args.duplicate_policy {
        config.duplicate_policy = policy;
    }
    if let Some(limit) = args.max_students_per_class {
        config.max_students_per_class = limit;
    }

    config
        .validate()
        .map_err(|err| CliError::Startup(err.to_string()))?;
    Ok(config)
}

fn require_valid_email(value: &str, message: &str) -> Result<(), CliError> {
    if is_email_address(value) {
        Ok(())
    } else {
        Err(CliError::Request(message.to_string()))
    }
}

fn render(body: &impl Serialize) -> Result<Option<String>, CliError> {
    serde_json::to_string(body)
        .map(Some)
        .map_err(|err| CliError::Startup(format!("failed to encode response: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{Args, CliError, Command};
    use clap::Parser;
    use roster_core::{DuplicatePolicy, RosterError};

    #[test]
    fn register_accepts_repeated_student_flags() {
        let args = Args::try_parse_from([
            "roster",
            "--duplicate-policy",
            "reject",
            "register",
            "--teacher",
            "teacherken@gmail.com",
            "--student",
            "studentjon@gmail.com",
            "--student",
            "studenthon@gmail.com",
        ])
        .unwrap();

        assert_eq!(args.duplicate_policy, Some(DuplicatePolicy::Reject));
        match args.command {
            Command::Register { teacher, students } => {
                assert_eq!(teacher, "teacherken@gmail.com");
                assert_eq!(students.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn common_students_requires_a_teacher() {
        assert!(Args::try_parse_from(["roster", "common-students"]).is_err());
    }

    #[test]
    fn class_student_registration_takes_class_id_and_email() {
        let args = Args::try_parse_from([
            "roster",
            "--max-students-per-class",
            "12",
            "register-class-student",
            "--class-id",
            "3",
            "--student",
            "studentjon@gmail.com",
        ])
        .unwrap();

        assert_eq!(args.max_students_per_class, Some(12));
        match args.command {
            Command::RegisterClassStudent { class_id, student } => {
                assert_eq!(class_id, 3);
                assert_eq!(student, "studentjon@gmail.com");
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Args::try_parse_from(["roster", "register-subject", "--class-id", "x"]).is_err());
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(CliError::Request("bad".to_string()).exit_code(), 2);
        let not_found = CliError::from(RosterError::StudentNotFound("x@y.com".to_string()));
        assert_eq!(not_found.exit_code(), 3);
        let conflict = CliError::from(RosterError::AlreadyRegistered {
            teacher: "t@y.com".to_string(),
            students: vec!["x@y.com".to_string()],
        });
        assert_eq!(conflict.exit_code(), 4);
        let full = CliError::from(RosterError::ClassFull {
            class_id: 1,
            limit: 30,
        });
        assert_eq!(full.exit_code(), 4);
        assert_eq!(CliError::from(RosterError::ClassNotFound(9)).exit_code(), 3);
    }
}
