//! Bearer credential resolution.
//!
//! Handlers only ever see an [`Identity`]; how a credential maps to an owner
//! is decided by the [`AuthGate`] installed in the application state.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::OwnerId;
use store::Store;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Resolves a bearer credential to the owner it identifies.
pub trait AuthGate: Send + Sync {
    /// Returns the owner for `credential`, or None if it is not recognised.
    fn resolve(&self, credential: &str) -> Option<OwnerId>;
}

/// Treats the bearer credential as the owner's UUID.
///
/// Suitable when an upstream gateway has already verified the caller and
/// forwards only the owner id.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerOwnerGate;

impl AuthGate for BearerOwnerGate {
    fn resolve(&self, credential: &str) -> Option<OwnerId> {
        Uuid::parse_str(credential).ok().map(OwnerId::from_uuid)
    }
}

/// The authenticated owner of the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub OwnerId);

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let credential = bearer_credential(&parts.headers).ok_or(ApiError::Unauthorized)?;

        match state.auth.resolve(credential) {
            Some(owner_id) => Ok(Identity(owner_id)),
            None => {
                tracing::warn!("rejected unrecognised bearer credential");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

/// Extracts the credential from an `Authorization: Bearer <credential>` header.
fn bearer_credential(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credential) = value.split_once(' ')?;
    let credential = credential.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !credential.is_empty()).then_some(credential)
}
