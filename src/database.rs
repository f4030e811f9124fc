use std::fs;
use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::grader::SubmissionStatus;
use crate::routes::{
    ProblemCreate, ProblemRecord, ProblemUpdate, ProfileUpdate, SubmissionRecord, TestCaseCreate,
    TestCaseRecord, TestCaseUpdate, User,
};

const DATABASE_NAME: &str = "codedrill.sqlite3";

pub fn get_db_path() -> PathBuf {
    use directories::ProjectDirs;

    let proj_dirs = ProjectDirs::from("", "", "codedrill").expect("Unable to find user directory");
    let data_dir = proj_dirs.data_local_dir();

    fs::create_dir_all(data_dir).expect("Failed to create local data dir");

    data_dir.join(DATABASE_NAME)
}

pub async fn init_db(db_path: impl AsRef<Path>) -> sqlx::Result<SqlitePool> {
    let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display()); // rwc = read/write/create
    let db_pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect(&db_url)
        .await?;

    // PRAGMA statements cannot run inside a transaction
    for pragma_sql in &[
        "PRAGMA foreign_keys = ON;",
        "PRAGMA busy_timeout = 2000;", // 2 seconds timeout for lock contention
        "PRAGMA journal_mode = WAL;",  // Write-Ahead Logging for better concurrency
        "PRAGMA synchronous = NORMAL;", // Balance between safety and performance
    ] {
        sqlx::query(pragma_sql).execute(&db_pool).await?;
    }

    let mut tx = db_pool.begin().await?;

    for sql in &[
        r"
        CREATE TABLE IF NOT EXISTS users (
            id             INTEGER  PRIMARY KEY AUTOINCREMENT,
            username       TEXT     NOT NULL UNIQUE,
            email          TEXT     NOT NULL UNIQUE,
            password_hash  TEXT     NOT NULL,
            bio            TEXT,
            linkedin_url   TEXT,
            github_url     TEXT,
            portfolio_url  TEXT,
            is_private     INTEGER  NOT NULL DEFAULT 0
        );",
        r"
        CREATE TABLE IF NOT EXISTS problems (
            id                 INTEGER  PRIMARY KEY AUTOINCREMENT,
            title              TEXT     NOT NULL,
            description        TEXT     NOT NULL,
            concept            TEXT     NOT NULL,
            stars              INTEGER  NOT NULL,
            series_id          INTEGER,
            series_index       INTEGER,
            is_daily_candidate INTEGER  NOT NULL DEFAULT 1
        );",
        r"
        CREATE TABLE IF NOT EXISTS testcases (
            id               INTEGER  PRIMARY KEY AUTOINCREMENT,
            problem_id       INTEGER  NOT NULL,
            input_data       TEXT     NOT NULL,
            expected_output  TEXT     NOT NULL,
            is_sample        INTEGER  NOT NULL DEFAULT 0,
            FOREIGN KEY (problem_id)  REFERENCES problems (id) ON DELETE CASCADE
        );",
        "CREATE INDEX IF NOT EXISTS idx_testcases_problem_id ON testcases(problem_id);",
        r"
        CREATE TABLE IF NOT EXISTS submissions (
            id            INTEGER  PRIMARY KEY AUTOINCREMENT,
            problem_id    INTEGER  NOT NULL,
            user_id       INTEGER  NOT NULL,
            source_code   TEXT     NOT NULL,
            language      TEXT     NOT NULL,
            status        TEXT     NOT NULL,
            created_time  TEXT     NOT NULL,
            updated_time  TEXT     NOT NULL,
            FOREIGN KEY (problem_id)  REFERENCES problems (id) ON DELETE CASCADE,
            FOREIGN KEY (user_id)     REFERENCES users (id)
        );",
        "CREATE INDEX IF NOT EXISTS idx_submissions_user_id ON submissions(user_id);",
    ] {
        sqlx::query(sql).execute(tx.as_mut()).await?;
    }

    tx.commit().await?;

    log::info!("Initialized database at {}", db_path.as_ref().display());

    Ok(db_pool)
}

pub fn remove_db(db_path: impl AsRef<Path>) {
    // Remove WAL and SHM files (ignore errors as they might not exist)
    let wal_path = format!("{}-wal", db_path.as_ref().display());
    let shm_path = format!("{}-shm", db_path.as_ref().display());
    let _ = fs::remove_file(wal_path);
    let _ = fs::remove_file(shm_path);

    if let Err(e) = std::fs::remove_file(&db_path) {
        log::warn!(
            "Unable to remove database at {}: {e}",
            db_path.as_ref().display()
        );
    } else {
        log::info!("Removed database at {}", db_path.as_ref().display());
    }
}

// ===== users =====

pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Checks whether the username or the email is already taken.
pub async fn user_identity_taken(
    pool: &SqlitePool,
    username: &str,
    email: &str,
) -> sqlx::Result<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM users WHERE username = ? OR email = ?")
            .bind(username)
            .bind(email)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}

/// Looks a user up by username or email, for login.
pub async fn find_user_by_identity(
    pool: &SqlitePool,
    username_or_email: &str,
) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash,
               bio, linkedin_url, github_url, portfolio_url, is_private
        FROM users
        WHERE username = ? OR email = ?
        "#,
    )
    .bind(username_or_email)
    .bind(username_or_email)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_user(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash,
               bio, linkedin_url, github_url, portfolio_url, is_private
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn user_exists(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

/// Partial profile update: absent fields keep their current value.
pub async fn update_profile(
    pool: &SqlitePool,
    id: i64,
    update: &ProfileUpdate,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET bio           = COALESCE(?, bio),
            linkedin_url  = COALESCE(?, linkedin_url),
            github_url    = COALESCE(?, github_url),
            portfolio_url = COALESCE(?, portfolio_url),
            is_private    = COALESCE(?, is_private)
        WHERE id = ?
        "#,
    )
    .bind(&update.bio)
    .bind(&update.linkedin_url)
    .bind(&update.github_url)
    .bind(&update.portfolio_url)
    .bind(update.is_private)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

// ===== problems =====

pub async fn create_problem(pool: &SqlitePool, problem: &ProblemCreate) -> sqlx::Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO problems (title, description, concept, stars, series_id, series_index, is_daily_candidate)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&problem.title)
    .bind(&problem.description)
    .bind(&problem.concept)
    .bind(problem.stars)
    .bind(problem.series_id)
    .bind(problem.series_index)
    .bind(problem.is_daily_candidate)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn list_problems(pool: &SqlitePool) -> sqlx::Result<Vec<ProblemRecord>> {
    sqlx::query_as::<_, ProblemRecord>(
        r#"
        SELECT id, title, description, concept, stars, series_id, series_index, is_daily_candidate
        FROM problems
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn fetch_problem(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<ProblemRecord>> {
    sqlx::query_as::<_, ProblemRecord>(
        r#"
        SELECT id, title, description, concept, stars, series_id, series_index, is_daily_candidate
        FROM problems
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Partial problem update: absent fields keep their current value. Returns
/// whether a row matched.
pub async fn update_problem(
    pool: &SqlitePool,
    id: i64,
    update: &ProblemUpdate,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE problems
        SET title              = COALESCE(?, title),
            description        = COALESCE(?, description),
            concept            = COALESCE(?, concept),
            stars              = COALESCE(?, stars),
            series_id          = COALESCE(?, series_id),
            series_index       = COALESCE(?, series_index),
            is_daily_candidate = COALESCE(?, is_daily_candidate)
        WHERE id = ?
        "#,
    )
    .bind(&update.title)
    .bind(&update.description)
    .bind(&update.concept)
    .bind(update.stars)
    .bind(update.series_id)
    .bind(update.series_index)
    .bind(update.is_daily_candidate)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_problem(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM problems WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn problem_exists(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM problems WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

// ===== test cases =====

pub async fn create_testcase(
    pool: &SqlitePool,
    problem_id: i64,
    testcase: &TestCaseCreate,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO testcases (problem_id, input_data, expected_output, is_sample)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(problem_id)
    .bind(&testcase.input_data)
    .bind(&testcase.expected_output)
    .bind(testcase.is_sample)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Test cases for a problem, in insertion order. The grading run relies on
/// this order being stable.
pub async fn fetch_testcases(
    pool: &SqlitePool,
    problem_id: i64,
) -> sqlx::Result<Vec<TestCaseRecord>> {
    sqlx::query_as::<_, TestCaseRecord>(
        r#"
        SELECT id, problem_id, input_data, expected_output, is_sample
        FROM testcases
        WHERE problem_id = ?
        ORDER BY id
        "#,
    )
    .bind(problem_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_testcase(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<TestCaseRecord>> {
    sqlx::query_as::<_, TestCaseRecord>(
        r#"
        SELECT id, problem_id, input_data, expected_output, is_sample
        FROM testcases
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Partial test-case update: absent fields keep their current value.
/// Returns whether a row matched.
pub async fn update_testcase(
    pool: &SqlitePool,
    id: i64,
    update: &TestCaseUpdate,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE testcases
        SET input_data      = COALESCE(?, input_data),
            expected_output = COALESCE(?, expected_output),
            is_sample       = COALESCE(?, is_sample)
        WHERE id = ?
        "#,
    )
    .bind(&update.input_data)
    .bind(&update.expected_output)
    .bind(update.is_sample)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_testcase(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM testcases WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// ===== submissions =====

pub async fn create_submission(
    pool: &SqlitePool,
    problem_id: i64,
    user_id: i64,
    source_code: &str,
    language: &str,
) -> sqlx::Result<i64> {
    let now = crate::create_timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO submissions (problem_id, user_id, source_code, language, status, created_time, updated_time)
        VALUES (?, ?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(problem_id)
    .bind(user_id)
    .bind(source_code)
    .bind(language)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn fetch_submission(
    pool: &SqlitePool,
    id: i64,
) -> sqlx::Result<Option<SubmissionRecord>> {
    sqlx::query_as::<_, SubmissionRecord>(
        r#"
        SELECT id, problem_id, user_id, source_code, language, status, created_time, updated_time
        FROM submissions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Commits the single `pending -> terminal` transition for a submission.
///
/// The update is guarded on the row still being `pending`; returns whether
/// it applied. `false` means the submission had already reached a terminal
/// state, which the grading path treats as a programming error.
pub async fn commit_submission_status(
    pool: &SqlitePool,
    id: i64,
    status: SubmissionStatus,
) -> sqlx::Result<bool> {
    debug_assert!(status.is_terminal(), "cannot commit a non-terminal status");

    let now = crate::create_timestamp();

    let result = sqlx::query(
        r#"
        UPDATE submissions
        SET status = ?, updated_time = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(status.as_str())
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
