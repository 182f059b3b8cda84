// web-server/src/api/mod.rs
pub mod auth;
pub mod profile;

use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "Wallet Sign-In Service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(
            web::scope("/auth")
                .service(auth::get_nonce)
                .service(auth::create_challenge)
                .service(auth::verify)
                .service(auth::get_session)
                .service(auth::logout)
        )
        .service(
            web::scope("/api")
                .service(profile::me)
        );
}
