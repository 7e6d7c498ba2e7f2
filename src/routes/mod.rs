pub mod analytics;
pub mod auth;
pub mod comments;
pub mod files;
pub mod health;
pub mod tasks;

use actix_web::web;

/// Mounts every `/api` route group. Callers wrap the enclosing scope with
/// `AuthMiddleware`; register/login are exempted inside the middleware.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::register)
            .service(auth::login)
            .service(auth::me),
    )
    .service(
        web::scope("/tasks")
            .service(tasks::list_tasks)
            .service(tasks::create_task)
            .service(tasks::bulk_create)
            .service(tasks::get_task)
            .service(tasks::update_task)
            .service(tasks::delete_task),
    )
    .service(
        web::scope("/comments")
            .service(comments::add_comment)
            .service(comments::get_comments)
            .service(comments::update_comment)
            .service(comments::delete_comment),
    )
    .service(
        web::scope("/files")
            .service(files::upload_files)
            .service(files::get_task_files)
            .service(files::download_file)
            .service(files::delete_file),
    )
    .service(
        web::scope("/analytics")
            .service(analytics::overview)
            .service(analytics::user_performance)
            .service(analytics::trends),
    );
}
