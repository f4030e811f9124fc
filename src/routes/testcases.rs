use actix_web::{HttpResponse, Responder, delete, get, post, put, web};
use serde_json::json;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::{external_error, not_found};
use crate::auth::AuthUser;
use crate::database as db;

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct TestCaseRecord {
    pub id: i64,
    pub problem_id: i64,
    pub input_data: String,
    pub expected_output: String,
    pub is_sample: bool,
}

#[derive(Deserialize, Debug)]
pub struct TestCaseCreate {
    pub input_data: String,
    pub expected_output: String,
    #[serde(default)]
    pub is_sample: bool,
}

/// Partial update payload: every field optional, absent ones untouched.
#[derive(Deserialize, Debug, Default)]
pub struct TestCaseUpdate {
    pub input_data: Option<String>,
    pub expected_output: Option<String>,
    pub is_sample: Option<bool>,
}

/// Public projection of a test case: the expected output is only present
/// for sample cases.
#[derive(Serialize, Debug)]
pub struct TestCasePublicView {
    pub id: i64,
    pub problem_id: i64,
    pub input_data: String,
    pub is_sample: bool,
    pub expected_output: Option<String>,
}

impl From<TestCaseRecord> for TestCasePublicView {
    fn from(record: TestCaseRecord) -> Self {
        Self {
            id: record.id,
            problem_id: record.problem_id,
            input_data: record.input_data,
            is_sample: record.is_sample,
            expected_output: record.is_sample.then_some(record.expected_output),
        }
    }
}

#[post("/problems/{id}/testcases")]
pub async fn post_testcase_handler(
    _user: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
    body: web::Json<TestCaseCreate>,
) -> impl Responder {
    let problem_id = path.into_inner().0;

    match db::problem_exists(&pool, problem_id).await {
        Ok(true) => {}
        Ok(false) => return not_found(format!("Problem {problem_id} not found.")),
        Err(e) => {
            log::error!("Failed to check problem existence: {e}");
            return external_error();
        }
    }

    match db::create_testcase(&pool, problem_id, &body).await {
        Ok(id) => {
            log::info!("Inserted test case {id} for problem {problem_id}");
            match db::fetch_testcase(&pool, id).await {
                Ok(Some(record)) => HttpResponse::Ok().json(record),
                Ok(None) | Err(_) => external_error(),
            }
        }
        Err(e) => {
            log::error!("Failed to insert test case into database: {e}");
            external_error()
        }
    }
}

#[get("/problems/{id}/testcases")]
pub async fn get_problem_testcases_handler(
    _user: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
) -> impl Responder {
    let problem_id = path.into_inner().0;

    match db::problem_exists(&pool, problem_id).await {
        Ok(true) => {}
        Ok(false) => return not_found(format!("Problem {problem_id} not found.")),
        Err(e) => {
            log::error!("Failed to check problem existence: {e}");
            return external_error();
        }
    }

    match db::fetch_testcases(&pool, problem_id).await {
        Ok(records) => {
            let public: Vec<TestCasePublicView> =
                records.into_iter().map(TestCasePublicView::from).collect();
            HttpResponse::Ok().json(public)
        }
        Err(e) => {
            log::error!("Failed to retrieve test cases: {e}");
            external_error()
        }
    }
}

/// Privileged listing: full records, expected outputs included for every
/// case. Any authenticated user qualifies, same as creation.
#[get("/problems/{id}/testcases/admin")]
pub async fn get_problem_testcases_admin_handler(
    _user: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
) -> impl Responder {
    let problem_id = path.into_inner().0;

    match db::problem_exists(&pool, problem_id).await {
        Ok(true) => {}
        Ok(false) => return not_found(format!("Problem {problem_id} not found.")),
        Err(e) => {
            log::error!("Failed to check problem existence: {e}");
            return external_error();
        }
    }

    match db::fetch_testcases(&pool, problem_id).await {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(e) => {
            log::error!("Failed to retrieve test cases: {e}");
            external_error()
        }
    }
}

#[get("/testcases/{id}")]
pub async fn get_testcase_by_id_handler(
    _user: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
) -> impl Responder {
    let testcase_id = path.into_inner().0;

    match db::fetch_testcase(&pool, testcase_id).await {
        Ok(Some(record)) => HttpResponse::Ok().json(record),
        Ok(None) => not_found(format!("TestCase {testcase_id} not found.")),
        Err(e) => {
            log::error!("Failed to retrieve test case record: {e}");
            external_error()
        }
    }
}

#[put("/testcases/{id}")]
pub async fn put_testcase_handler(
    _user: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
    body: web::Json<TestCaseUpdate>,
) -> impl Responder {
    let testcase_id = path.into_inner().0;

    match db::update_testcase(&pool, testcase_id, &body).await {
        Ok(true) => {
            log::info!("Updated test case {testcase_id}");
            match db::fetch_testcase(&pool, testcase_id).await {
                Ok(Some(record)) => HttpResponse::Ok().json(record),
                Ok(None) | Err(_) => external_error(),
            }
        }
        Ok(false) => not_found(format!("TestCase {testcase_id} not found.")),
        Err(e) => {
            log::error!("Failed to update test case {testcase_id}: {e}");
            external_error()
        }
    }
}

#[delete("/testcases/{id}")]
pub async fn delete_testcase_handler(
    _user: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
) -> impl Responder {
    let testcase_id = path.into_inner().0;

    match db::delete_testcase(&pool, testcase_id).await {
        Ok(true) => {
            log::info!("Deleted test case {testcase_id}");
            HttpResponse::Ok().json(json!({ "message": "TestCase deleted successfully" }))
        }
        Ok(false) => not_found(format!("TestCase {testcase_id} not found.")),
        Err(e) => {
            log::error!("Failed to delete test case {testcase_id}: {e}");
            external_error()
        }
    }
}
