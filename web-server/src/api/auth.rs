// web-server/src/api/auth.rs
use actix::Addr;
use actix_web::{get, post, web, HttpRequest, HttpResponse, cookie::{Cookie, SameSite}};
use actix_web::cookie::time::Duration as CookieDuration;
use chrono::Utc;
use common::models::nonce::Nonce;
use common::models::session::SessionResponse;
use common::challenge::{ChallengeBuilder, ChallengeRequest};
use common::{AuthError, Config, WalletAddress};
use serde::Deserialize;
use serde_json::json;
use crate::nonce_registry::{IssueNonce, NonceRegistryActor};
use crate::session_context::{Authenticated, SessionContext, SESSION_COOKIE_NAME};
use crate::session_issuer::SessionIssuer;
use crate::utils::token::create_session_id;
use crate::verifier::SignatureVerifier;

/// Cookie binding a nonce to the browser that requested it
pub const ATTEMPT_COOKIE_NAME: &str = "siwe_attempt";

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub message: String,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeBody {
    pub address: String,
    pub chain_id: Option<u64>,
}

fn build_cookie(name: &'static str, value: String, max_age: i64, config: &Config) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .secure(config.auth.secure_cookies)
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(max_age))
        .finish()
}

fn clear_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name, "")
        .path("/")
        .max_age(CookieDuration::seconds(0))
        .finish()
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, AuthError> {
    serde_json::from_slice(body).map_err(|e| AuthError::MalformedRequest(e.to_string()))
}

fn attempt_id(req: &HttpRequest) -> Option<String> {
    req.cookie(ATTEMPT_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| v.len() == 64 && v.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Issue a nonce to the caller's sign-in attempt, starting one if needed
async fn start_attempt(
    req: &HttpRequest,
    nonces: &Addr<NonceRegistryActor>,
) -> Result<(String, Nonce), AuthError> {
    let attempt_id = attempt_id(req).unwrap_or_else(create_session_id);
    let nonce = nonces
        .send(IssueNonce {
            attempt_id: attempt_id.clone(),
        })
        .await?;
    Ok((attempt_id, nonce))
}

#[get("/nonce")]
pub async fn get_nonce(
    req: HttpRequest,
    nonces: web::Data<Addr<NonceRegistryActor>>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AuthError> {
    let (attempt_id, nonce) = start_attempt(&req, &nonces).await?;

    Ok(HttpResponse::Ok()
        .cookie(build_cookie(ATTEMPT_COOKIE_NAME, attempt_id, config.auth.nonce_ttl_seconds, &config))
        .json(json!({ "nonce": nonce.value })))
}

/// Issue a nonce and return the exact message the wallet should sign
#[post("/challenge")]
pub async fn create_challenge(
    req: HttpRequest,
    body: web::Bytes,
    nonces: web::Data<Addr<NonceRegistryActor>>,
    challenges: web::Data<ChallengeBuilder>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AuthError> {
    let request: ChallengeBody = parse_body(&body)?;
    let chain_id = request.chain_id.unwrap_or(config.auth.chain_id);

    // Validate before spending a nonce
    WalletAddress::parse(&request.address)?;
    if chain_id != challenges.chain_id() {
        return Err(AuthError::DomainMismatch(format!("chain {}", chain_id)));
    }

    let (attempt_id, nonce) = start_attempt(&req, &nonces).await?;
    let statement = Some(config.auth.statement.as_str()).filter(|s| !s.is_empty());

    let message = challenges.build(ChallengeRequest {
        address: &request.address,
        chain_id,
        nonce: &nonce.value,
        domain: challenges.domain(),
        uri: challenges.origin().as_str(),
        statement,
        issued_at: Utc::now(),
        expiration_time: Some(nonce.expires_at),
        not_before: None,
        resources: Vec::new(),
    })?;

    Ok(HttpResponse::Ok()
        .cookie(build_cookie(ATTEMPT_COOKIE_NAME, attempt_id, config.auth.nonce_ttl_seconds, &config))
        .json(json!({
            "nonce": nonce.value,
            "message": message.to_string()
        })))
}

#[post("/verify")]
pub async fn verify(
    req: HttpRequest,
    body: web::Bytes,
    verifier: web::Data<SignatureVerifier>,
    issuer: web::Data<SessionIssuer>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AuthError> {
    let request: VerifyRequest = parse_body(&body)?;

    let verified = verifier
        .verify(&request.message, &request.signature, attempt_id(&req))
        .await?;
    let issued = issuer.issue(verified).await?;

    Ok(HttpResponse::Ok()
        .cookie(build_cookie(SESSION_COOKIE_NAME, issued.token, config.auth.session_ttl_seconds, &config))
        .cookie(clear_cookie(ATTEMPT_COOKIE_NAME))
        .json(json!({ "ok": true })))
}

#[get("/session")]
pub async fn get_session(Authenticated(session): Authenticated) -> HttpResponse {
    HttpResponse::Ok().json(SessionResponse::from(&session))
}

/// Sign out. Succeeds whether or not a session was present.
#[post("/logout")]
pub async fn logout(
    req: HttpRequest,
    context: web::Data<SessionContext>,
    issuer: web::Data<SessionIssuer>,
) -> Result<HttpResponse, AuthError> {
    if let Some(claims) = context.claims(&req) {
        if issuer.revoke(&claims.sid).await? {
            tracing::info!("Signed out {}", claims.sub);
        }
    }

    Ok(HttpResponse::Ok()
        .cookie(clear_cookie(SESSION_COOKIE_NAME))
        .json(json!({ "ok": true })))
}
