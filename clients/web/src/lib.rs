//! Person CRUD web client: list, create and delete person documents through
//! server-rendered pages.

use actix_web::web::ServiceConfig;

pub mod error;
pub mod models;
pub mod routes;
pub mod views;

/// Registers every route. Expects `Data<Persons>` and `Data<Views>` as app data.
pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(routes::index)
        .service(routes::list)
        .service(routes::new_form)
        .service(routes::create)
        .service(routes::delete);
}
