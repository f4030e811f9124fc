use actix_web::{HttpResponse, Responder, delete, get, post, put, web};
use serde_json::json;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::{external_error, not_found};
use crate::auth::AuthUser;
use crate::database as db;

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct ProblemRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub concept: String,
    pub stars: i64,
    pub series_id: Option<i64>,
    pub series_index: Option<i64>,
    pub is_daily_candidate: bool,
}

#[derive(Deserialize, Debug)]
pub struct ProblemCreate {
    pub title: String,
    pub description: String,
    pub concept: String,
    pub stars: i64,
    pub series_id: Option<i64>,
    pub series_index: Option<i64>,
    #[serde(default = "default_daily_candidate")]
    pub is_daily_candidate: bool,
}

fn default_daily_candidate() -> bool {
    true
}

/// Partial update payload: every field optional, absent ones untouched.
#[derive(Deserialize, Debug, Default)]
pub struct ProblemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub concept: Option<String>,
    pub stars: Option<i64>,
    pub series_id: Option<i64>,
    pub series_index: Option<i64>,
    pub is_daily_candidate: Option<bool>,
}

#[post("/problems")]
pub async fn post_problem_handler(
    _user: AuthUser,
    pool: web::Data<SqlitePool>,
    body: web::Json<ProblemCreate>,
) -> impl Responder {
    match db::create_problem(&pool, &body).await {
        Ok(id) => {
            log::info!("Inserted problem {id} into database");
            match db::fetch_problem(&pool, id).await {
                Ok(Some(record)) => HttpResponse::Ok().json(record),
                Ok(None) | Err(_) => external_error(),
            }
        }
        Err(e) => {
            log::error!("Failed to insert problem into database: {e}");
            external_error()
        }
    }
}

#[get("/problems")]
pub async fn get_problems_handler(pool: web::Data<SqlitePool>) -> impl Responder {
    match db::list_problems(&pool).await {
        Ok(records) => {
            log::debug!("Got {} problem records", records.len());
            HttpResponse::Ok().json(records)
        }
        Err(e) => {
            log::error!("Failed to retrieve problem records: {e}");
            external_error()
        }
    }
}

#[get("/problems/{id}")]
pub async fn get_problem_by_id_handler(
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
) -> impl Responder {
    let problem_id = path.into_inner().0;

    match db::fetch_problem(&pool, problem_id).await {
        Ok(Some(record)) => HttpResponse::Ok().json(record),
        Ok(None) => not_found(format!("Problem {problem_id} not found.")),
        Err(e) => {
            log::error!("Failed to retrieve problem record: {e}");
            external_error()
        }
    }
}

#[put("/problems/{id}")]
pub async fn put_problem_handler(
    _user: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
    body: web::Json<ProblemUpdate>,
) -> impl Responder {
    let problem_id = path.into_inner().0;

    match db::update_problem(&pool, problem_id, &body).await {
        Ok(true) => {
            log::info!("Updated problem {problem_id}");
            match db::fetch_problem(&pool, problem_id).await {
                Ok(Some(record)) => HttpResponse::Ok().json(record),
                Ok(None) | Err(_) => external_error(),
            }
        }
        Ok(false) => not_found(format!("Problem {problem_id} not found.")),
        Err(e) => {
            log::error!("Failed to update problem {problem_id}: {e}");
            external_error()
        }
    }
}

#[delete("/problems/{id}")]
pub async fn delete_problem_handler(
    _user: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
) -> impl Responder {
    let problem_id = path.into_inner().0;

    match db::delete_problem(&pool, problem_id).await {
        Ok(true) => {
            log::info!("Deleted problem {problem_id}");
            HttpResponse::Ok().json(json!({ "message": "Problem deleted successfully" }))
        }
        Ok(false) => not_found(format!("Problem {problem_id} not found.")),
        Err(e) => {
            log::error!("Failed to delete problem {problem_id}: {e}");
            external_error()
        }
    }
}
