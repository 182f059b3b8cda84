// web-server/src/api/profile.rs
use actix_web::{get, web, HttpResponse};
use common::models::identity::ProfileView;
use common::AuthError;
use crate::identity::IdentityResolver;
use crate::session_context::Authenticated;

/// The caller's own profile. The user is looked up from the session only.
#[get("/me")]
pub async fn me(
    Authenticated(session): Authenticated,
    resolver: web::Data<IdentityResolver>,
) -> Result<HttpResponse, AuthError> {
    let user = resolver
        .store()
        .find_by_address(&session.address)
        .await?
        .ok_or_else(|| AuthError::IdentityResolution(format!("no user for {}", session.address)))?;

    Ok(HttpResponse::Ok().json(ProfileView::from(&user)))
}
