use axum::extract::{Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::core::errors::{ConfigError, ConfigResult};
use crate::core::types::SessionId;

/// Name of the cookie carrying the signed session id
pub const SESSION_COOKIE: &str = "session";

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies session cookie values of the form `<uuid>.<hex hmac>`.
#[derive(Clone)]
pub struct SessionSigner {
    mac: HmacSha256,
}

impl SessionSigner {
    pub fn new(secret: &str) -> ConfigResult<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ConfigError::InvalidSessionSecret(e.to_string()))?;
        Ok(Self { mac })
    }

    pub fn sign(&self, session: &SessionId) -> String {
        let id = session.to_string();
        format!("{}.{}", id, hex::encode(self.tag(id.as_bytes())))
    }

    /// Session id from a cookie value, or None if malformed or forged
    pub fn verify(&self, value: &str) -> Option<SessionId> {
        let (id, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        SessionId::parse(id)
    }

    fn tag(&self, message: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Attach a `SessionId` extension to every request.
///
/// Requests without a valid signed cookie get a fresh session, and the
/// response carries the new cookie.
pub async fn session_middleware(
    State(signer): State<SessionSigner>,
    mut req: Request,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let presented = jar.get(SESSION_COOKIE).map(|cookie| cookie.value());
    let existing = presented.and_then(|value| signer.verify(value));
    if presented.is_some() && existing.is_none() {
        warn!("Rejected session cookie with invalid signature");
    }

    let session = existing.unwrap_or_else(|| {
        let session = SessionId::generate();
        debug!("Starting session {}", session);
        session
    });
    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;
    if existing.is_none() {
        let cookie = Cookie::build((SESSION_COOKIE, signer.sign(&session)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}
