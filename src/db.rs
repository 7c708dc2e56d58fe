use rusqlite::Connection;
use std::path::Path;
use uuid::Uuid;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("forgeed.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            gpa REAL NOT NULL DEFAULT 0.0,
            completion_rate INTEGER NOT NULL DEFAULT 0,
            chat_sessions INTEGER NOT NULL DEFAULT 0,
            career_goal TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Older workspaces predate the background/admin columns. Add if needed.
    ensure_students_educational_background(&conn)?;
    ensure_students_is_admin(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            course_code TEXT NOT NULL UNIQUE,
            course_name TEXT NOT NULL,
            credits INTEGER NOT NULL DEFAULT 3,
            description TEXT,
            instructor TEXT,
            semester TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS available_courses(
            id TEXT PRIMARY KEY,
            course_code TEXT NOT NULL,
            course_name TEXT NOT NULL,
            credits INTEGER NOT NULL DEFAULT 3,
            description TEXT,
            semester TEXT,
            prerequisites TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrolled_courses(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            progress INTEGER NOT NULL DEFAULT 0,
            grade TEXT,
            modules_completed INTEGER NOT NULL DEFAULT 0,
            pending_assignments INTEGER NOT NULL DEFAULT 0,
            enrolled_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            UNIQUE(student_id, course_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrolled_courses_student ON enrolled_courses(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS chat_history(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            message TEXT NOT NULL,
            response TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_chat_history_student ON chat_history(student_id)",
        [],
    )?;

    // One quiz row per student per date. The UNIQUE constraint (not a
    // check-then-write) is what guards concurrent generation.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS academic_quiz_history(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            quiz_date TEXT NOT NULL,
            questions TEXT NOT NULL,
            answers TEXT,
            score INTEGER NOT NULL DEFAULT 0,
            total_questions INTEGER NOT NULL DEFAULT 0,
            completed INTEGER NOT NULL DEFAULT 0,
            ai_feedback TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(student_id, quiz_date)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_academic_quiz_student_date
         ON academic_quiz_history(student_id, quiz_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS career_quiz_history(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            day_number INTEGER NOT NULL,
            topic TEXT NOT NULL,
            quiz_date TEXT NOT NULL,
            questions TEXT NOT NULL,
            answers TEXT,
            score INTEGER NOT NULL DEFAULT 0,
            total_questions INTEGER NOT NULL DEFAULT 0,
            completed INTEGER NOT NULL DEFAULT 0,
            ai_feedback TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(student_id, quiz_date)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_career_quiz_student_date
         ON career_quiz_history(student_id, quiz_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS wellbeing_assessments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            assessment_date TEXT NOT NULL,
            happiness_score INTEGER NOT NULL,
            stress_score INTEGER NOT NULL,
            energy_score INTEGER NOT NULL,
            motivation_score INTEGER NOT NULL,
            sleep_quality INTEGER NOT NULL,
            responses TEXT,
            total_score INTEGER NOT NULL,
            ai_insights TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(student_id, assessment_date)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_wellbeing_student_date
         ON wellbeing_assessments(student_id, assessment_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS daily_roadmap(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            day_number INTEGER NOT NULL,
            topic TEXT NOT NULL,
            theory_content TEXT,
            study_duration INTEGER NOT NULL DEFAULT 120,
            is_completed INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(student_id, day_number)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_daily_roadmap_student ON daily_roadmap(student_id)",
        [],
    )?;

    seed_bootstrap_admin(&conn)?;

    Ok(conn)
}

fn ensure_students_educational_background(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "educational_background")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE students ADD COLUMN educational_background TEXT",
        [],
    )?;
    Ok(())
}

fn ensure_students_is_admin(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "is_admin")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE students ADD COLUMN is_admin INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

/// A fresh workspace has no accounts, so nothing could ever log in to
/// provision one. Seed a single admin; rotate the password through the admin
/// surface before real use.
fn seed_bootstrap_admin(conn: &Connection) -> anyhow::Result<()> {
    let admin_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM students WHERE is_admin = 1",
        [],
        |r| r.get(0),
    )?;
    if admin_count > 0 {
        return Ok(());
    }
    conn.execute(
        "INSERT INTO students(id, email, password, first_name, last_name, is_admin, career_goal, created_at)
         VALUES(?, 'admin', 'admin123', 'System', 'Administrator', 1, 'System Administration', ?)",
        (Uuid::new_v4().to_string(), chrono::Utc::now().to_rfc3339()),
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
