use actix_web::{HttpResponse, Responder, get, post, web};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::{ErrorResponse, ErrorResponseWithMessage, external_error, not_found};
use crate::auth::AuthUser;
use crate::config::LanguageConfig;
use crate::database as db;
use crate::grader::{self, SubmissionStatus};
use crate::sandbox::ProcessSandbox;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubmissionRecord {
    pub id: i64,
    pub problem_id: i64,
    pub user_id: i64,
    pub source_code: String,
    pub language: String,
    pub status: String,
    pub created_time: String,
    pub updated_time: String,
}

#[derive(Deserialize, Debug)]
pub struct SubmitRequest {
    pub code: String,
    pub language: String,
}

#[derive(Serialize, Debug)]
pub struct SubmitResponse {
    pub id: i64,
    pub status: SubmissionStatus,
}

#[derive(Serialize, Debug)]
pub struct SubmissionDetail {
    pub id: i64,
    pub problem_id: i64,
    pub user_id: i64,
    pub code: String,
    pub language: String,
    pub status: String,
}

impl From<SubmissionRecord> for SubmissionDetail {
    fn from(record: SubmissionRecord) -> Self {
        Self {
            id: record.id,
            problem_id: record.problem_id,
            user_id: record.user_id,
            code: record.source_code,
            language: record.language,
            status: record.status,
        }
    }
}

/// Accepts a submission and grades it synchronously: the response carries
/// the terminal status. Precondition failures (unknown problem, no test
/// cases) are errors; grading outcomes, `unsupported_language` included,
/// are 200s.
#[post("/submissions/problems/{problem_id}/submit")]
pub async fn submit_handler(
    user: AuthUser,
    pool: web::Data<SqlitePool>,
    sandbox: web::Data<ProcessSandbox>,
    languages: web::Data<Vec<LanguageConfig>>,
    path: web::Path<(i64,)>,
    body: web::Json<SubmitRequest>,
) -> impl Responder {
    let problem_id = path.into_inner().0;

    match db::user_exists(&pool, user.id).await {
        Ok(true) => {}
        Ok(false) => {
            return HttpResponse::Unauthorized().json(ErrorResponse {
                reason: "ERR_UNAUTHENTICATED",
                code: 4,
            });
        }
        Err(e) => {
            log::error!("Failed to check user existence: {e}");
            return external_error();
        }
    }

    match db::problem_exists(&pool, problem_id).await {
        Ok(true) => {}
        Ok(false) => return not_found(format!("Problem {problem_id} not found.")),
        Err(e) => {
            log::error!("Failed to check problem existence: {e}");
            return external_error();
        }
    }

    let submission_id =
        match db::create_submission(&pool, problem_id, user.id, &body.code, &body.language).await {
            Ok(id) => {
                log::info!("Inserted submission {id} into database");
                id
            }
            Err(e) => {
                log::error!("Failed to insert submission into database: {e}");
                return external_error();
            }
        };

    let testcases = match db::fetch_testcases(&pool, problem_id).await {
        Ok(records) => records,
        Err(e) => {
            log::error!("Failed to fetch test cases for problem {problem_id}: {e}");
            return external_error();
        }
    };

    // No test cases is a client error, not a verdict; the submission stays
    // pending.
    if testcases.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponseWithMessage {
            reason: "ERR_INVALID_ARGUMENT",
            code: 1,
            message: "No testcases for this problem".to_string(),
        });
    }

    let status = match grader::grade(
        sandbox.get_ref(),
        languages.get_ref(),
        &body.language,
        &body.code,
        &testcases,
    )
    .await
    {
        Ok(status) => status,
        Err(e) => {
            log::error!("Sandbox fault while grading submission {submission_id}: {e}");
            return HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_INTERNAL",
                code: 6,
            });
        }
    };

    match db::commit_submission_status(&pool, submission_id, status).await {
        Ok(true) => {
            log::info!("Submission {submission_id} graded: {status}");
            HttpResponse::Ok().json(SubmitResponse {
                id: submission_id,
                status,
            })
        }
        Ok(false) => {
            // The pending guard failed: something else finalized this row.
            log::error!("Submission {submission_id} was not pending at commit time");
            HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_INTERNAL",
                code: 6,
            })
        }
        Err(e) => {
            log::error!("Failed to commit status of submission {submission_id}: {e}");
            external_error()
        }
    }
}

/// Owner-only read of a submission. Never re-grades.
#[get("/submissions/{id}")]
pub async fn get_submission_handler(
    user: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
) -> impl Responder {
    let submission_id = path.into_inner().0;

    match db::fetch_submission(&pool, submission_id).await {
        Ok(Some(record)) => {
            if record.user_id != user.id {
                return HttpResponse::Forbidden().json(ErrorResponseWithMessage {
                    reason: "ERR_FORBIDDEN",
                    code: 7,
                    message: "Not allowed to view this submission".to_string(),
                });
            }
            HttpResponse::Ok().json(SubmissionDetail::from(record))
        }
        Ok(None) => not_found(format!("Submission {submission_id} not found.")),
        Err(e) => {
            log::error!("Failed to retrieve submission record: {e}");
            external_error()
        }
    }
}
