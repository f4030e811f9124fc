use actix_web::{App, HttpServer, dev::Server, middleware, web};
use sqlx::sqlite::SqlitePool;

use crate::auth::AuthKeys;
use crate::config::Config;
use crate::routes::{
    delete_problem_handler, delete_testcase_handler, get_problem_by_id_handler,
    get_problem_testcases_admin_handler, get_problem_testcases_handler, get_problems_handler,
    get_profile_handler, get_submission_handler, get_testcase_by_id_handler, json_error_handler,
    login_handler, post_problem_handler, post_testcase_handler, put_problem_handler,
    put_profile_handler, put_testcase_handler, register_handler, submit_handler,
};
use crate::sandbox::ProcessSandbox;

pub fn build_server(
    config: Config,
    db_pool: SqlitePool,
    sandbox: ProcessSandbox,
) -> std::io::Result<Server> {
    let Config {
        server: server_config,
        auth: auth_config,
        judge: _,
        languages,
    } = config;

    let auth_keys = web::Data::new(AuthKeys::new(
        &auth_config.jwt_secret,
        auth_config.token_hours.unwrap_or(12),
    ));
    let db_pool = web::Data::new(db_pool);
    let languages = web::Data::new(languages);
    let sandbox = web::Data::new(sandbox);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(auth_keys.clone())
            .app_data(db_pool.clone())
            .app_data(languages.clone())
            .app_data(sandbox.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(middleware::Logger::default())
            .service(register_handler)
            .service(login_handler)
            .service(get_profile_handler)
            .service(put_profile_handler)
            .service(post_problem_handler)
            .service(get_problems_handler)
            .service(get_problem_by_id_handler)
            .service(put_problem_handler)
            .service(delete_problem_handler)
            .service(post_testcase_handler)
            .service(get_problem_testcases_admin_handler)
            .service(get_problem_testcases_handler)
            .service(get_testcase_by_id_handler)
            .service(put_testcase_handler)
            .service(delete_testcase_handler)
            .service(submit_handler)
            .service(get_submission_handler)
    })
    .bind((
        server_config
            .bind_address
            .unwrap_or("127.0.0.1".to_string()),
        server_config.bind_port.unwrap_or(12345),
    ))?
    .run();

    Ok(server)
}
