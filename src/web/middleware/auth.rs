use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use tracing::warn;

use crate::services::{user_service, ArbitrationEngine};

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize)]
struct JwtPayload {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

/// Reads the caller from the `access_token` cookie or an `Authorization: Bearer` header.
/// The token was issued and checked by the identity gateway in front of us; only its
/// payload is decoded here.
pub async fn require_auth(
    State(engine): State<ArbitrationEngine>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(user) = bearer_token(request.headers()).and_then(decode_payload) else {
        return unauthorized();
    };

    if let Err(err) = user_service::ensure_user(
        engine.pool(),
        &user.id,
        user.email.as_deref(),
        user.name.as_deref(),
        engine.now(),
    )
    .await
    {
        warn!(user_id = %user.id, error = %err, "could not record authenticated user");
        return err.into_response();
    }

    request.extensions_mut().insert(user);
    next.run(request).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let from_cookie = headers
        .get(header::COOKIE)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .map(str::trim)
                .find_map(|c| c.strip_prefix("access_token="))
        });
    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|hv| hv.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
    })
}

fn decode_payload(token: &str) -> Option<AuthenticatedUser> {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let payload: JwtPayload = serde_json::from_slice(&bytes).ok()?;
    if payload.sub.trim().is_empty() {
        return None;
    }
    Some(AuthenticatedUser {
        id: payload.sub,
        email: payload.email,
        name: payload.name,
    })
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthenticated",
            "message": "a valid access token is required",
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(payload: &str) -> String {
        format!(
            "e30.{}.sig",
            general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes())
        )
    }

    #[test]
    fn cookie_wins_over_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; access_token=a.b.c".parse().unwrap());
        headers.insert(header::AUTHORIZATION, "Bearer x.y.z".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("a.b.c"));

        headers.remove(header::COOKIE);
        assert_eq!(bearer_token(&headers), Some("x.y.z"));
    }

    #[test]
    fn payload_needs_a_subject() {
        let user = decode_payload(&token(r#"{"sub":"u-1","email":"a@b.io"}"#)).unwrap();
        assert_eq!(user.id, "u-1");
        assert_eq!(user.email.as_deref(), Some("a@b.io"));

        assert!(decode_payload(&token(r#"{"sub":"  "}"#)).is_none());
        assert!(decode_payload(&token(r#"{"email":"a@b.io"}"#)).is_none());
        assert!(decode_payload("not-a-jwt").is_none());
    }
}
