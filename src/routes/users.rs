use actix_web::{HttpResponse, Responder, get, post, put, web};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::{ErrorResponse, ErrorResponseWithMessage, external_error};
use crate::auth::{self, AuthKeys, AuthUser};
use crate::database as db;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub is_private: bool,
}

#[derive(Deserialize, Debug)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Serialize, Debug)]
pub struct RegisterResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Serialize, Debug)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Deserialize, Debug, Default)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub is_private: Option<bool>,
}

#[derive(Serialize, Debug)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub is_private: bool,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            bio: user.bio,
            linkedin_url: user.linkedin_url,
            github_url: user.github_url,
            portfolio_url: user.portfolio_url,
            is_private: user.is_private,
        }
    }
}

#[post("/auth/register")]
pub async fn register_handler(
    pool: web::Data<SqlitePool>,
    body: web::Json<RegisterRequest>,
) -> impl Responder {
    let taken = match db::user_identity_taken(&pool, &body.username, &body.email).await {
        Ok(taken) => taken,
        Err(e) => {
            log::error!("Failed to check registration conflict: {e}");
            return external_error();
        }
    };

    if taken {
        return HttpResponse::BadRequest().json(ErrorResponseWithMessage {
            reason: "ERR_INVALID_ARGUMENT",
            code: 1,
            message: "Username or email already exists".to_string(),
        });
    }

    let password_hash = match auth::hash_password(&body.password) {
        Ok(hash) => hash,
        Err(e) => {
            log::error!("Failed to hash password: {e}");
            return HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_INTERNAL",
                code: 6,
            });
        }
    };

    match db::create_user(&pool, &body.username, &body.email, &password_hash).await {
        Ok(id) => {
            log::info!("Registered user {id} ({})", body.username);
            let body = body.into_inner();
            HttpResponse::Ok().json(RegisterResponse {
                id,
                username: body.username,
                email: body.email,
            })
        }
        Err(e) => {
            log::error!("Failed to insert user into database: {e}");
            external_error()
        }
    }
}

#[post("/auth/login")]
pub async fn login_handler(
    pool: web::Data<SqlitePool>,
    keys: web::Data<AuthKeys>,
    body: web::Json<LoginRequest>,
) -> impl Responder {
    let user = match db::find_user_by_identity(&pool, &body.username_or_email).await {
        Ok(user) => user,
        Err(e) => {
            log::error!("Failed to look up user for login: {e}");
            return external_error();
        }
    };

    let Some(user) = user else {
        return invalid_credentials();
    };
    if !auth::verify_password(&user.password_hash, &body.password) {
        return invalid_credentials();
    }

    match keys.issue(user.id) {
        Ok(token) => {
            log::info!("Issued token for user {}", user.id);
            HttpResponse::Ok().json(LoginResponse {
                access_token: token,
                token_type: "bearer",
            })
        }
        Err(e) => {
            log::error!("Failed to issue token: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_INTERNAL",
                code: 6,
            })
        }
    }
}

fn invalid_credentials() -> HttpResponse {
    HttpResponse::Unauthorized().json(ErrorResponseWithMessage {
        reason: "ERR_UNAUTHENTICATED",
        code: 4,
        message: "Invalid credentials".to_string(),
    })
}

#[get("/auth/profile")]
pub async fn get_profile_handler(user: AuthUser, pool: web::Data<SqlitePool>) -> impl Responder {
    match db::fetch_user(&pool, user.id).await {
        Ok(Some(record)) => HttpResponse::Ok().json(ProfileResponse::from(record)),
        // Token subject no longer exists in the store
        Ok(None) => HttpResponse::Unauthorized().json(ErrorResponse {
            reason: "ERR_UNAUTHENTICATED",
            code: 4,
        }),
        Err(e) => {
            log::error!("Failed to fetch profile of user {}: {e}", user.id);
            external_error()
        }
    }
}

#[put("/auth/profile")]
pub async fn put_profile_handler(
    user: AuthUser,
    pool: web::Data<SqlitePool>,
    body: web::Json<ProfileUpdate>,
) -> impl Responder {
    match db::fetch_user(&pool, user.id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::Unauthorized().json(ErrorResponse {
                reason: "ERR_UNAUTHENTICATED",
                code: 4,
            });
        }
        Err(e) => {
            log::error!("Failed to fetch user {} for update: {e}", user.id);
            return external_error();
        }
    }

    if let Err(e) = db::update_profile(&pool, user.id, &body).await {
        log::error!("Failed to update profile of user {}: {e}", user.id);
        return external_error();
    }

    match db::fetch_user(&pool, user.id).await {
        Ok(Some(record)) => HttpResponse::Ok().json(ProfileResponse::from(record)),
        Ok(None) | Err(_) => external_error(),
    }
}
