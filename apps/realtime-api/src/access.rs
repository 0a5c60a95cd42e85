//! Room authorization: who may join which room.
//!
//! Membership/ownership facts live in the main Callboard application; this
//! module only asks yes/no questions through [`MembershipStore`] and applies
//! the per-room-type rules. Lookup failures are fail-closed: an unreachable
//! directory denies the join.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::rooms::Room;

/// Abstraction over the membership directory.
///
/// Backed by the Callboard application's internal access endpoints in
/// production and by in-memory stubs in tests.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Is the user an attendee, an invitee, or the creator of the rehearsal?
    async fn rehearsal_access(&self, user_id: &str, rehearsal_id: &str)
        -> Result<bool, ApiError>;

    /// Is the user cast on a character of the show, or an attendee/invitee
    /// of one of its rehearsals?
    async fn show_access(&self, user_id: &str, show_id: &str) -> Result<bool, ApiError>;
}

// ---------------------------------------------------------------------------
// HTTP-backed directory
// ---------------------------------------------------------------------------

/// `MembershipStore` backed by the Callboard app's internal access API.
#[derive(Clone)]
pub struct HttpDirectory {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
struct AccessResponse {
    allowed: bool,
}

impl HttpDirectory {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        }
    }

    async fn query(&self, kind: &str, entity_id: &str, user_id: &str) -> Result<bool, ApiError> {
        let url = format!("{}/internal/access/{kind}/{entity_id}", self.base_url);
        let mut req = self.http.get(&url).query(&[("userId", user_id)]);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|err| {
            tracing::error!(?err, %url, "membership directory unreachable");
            ApiError::internal("Membership directory unreachable")
        })?;

        if !resp.status().is_success() {
            tracing::error!(status = %resp.status(), %url, "membership directory error");
            return Err(ApiError::internal("Membership directory error"));
        }

        let body: AccessResponse = resp.json().await.map_err(|err| {
            tracing::error!(?err, %url, "membership directory returned invalid body");
            ApiError::internal("Membership directory returned invalid body")
        })?;

        Ok(body.allowed)
    }
}

#[async_trait]
impl MembershipStore for HttpDirectory {
    async fn rehearsal_access(
        &self,
        user_id: &str,
        rehearsal_id: &str,
    ) -> Result<bool, ApiError> {
        self.query("rehearsals", rehearsal_id, user_id).await
    }

    async fn show_access(&self, user_id: &str, show_id: &str) -> Result<bool, ApiError> {
        self.query("shows", show_id, user_id).await
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Applies the room-type authorization rules on top of a [`MembershipStore`].
pub struct RoomAuthorizer {
    store: Arc<dyn MembershipStore>,
}

impl RoomAuthorizer {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self { store }
    }

    /// May `user_id` join `room`? Every denial is logged; this is the only
    /// audit trail for unauthorized join attempts.
    pub async fn ensure_room_access(
        &self,
        socket_id: &str,
        user_id: Option<&str>,
        room: &str,
    ) -> bool {
        let user_desc = user_id.unwrap_or("unauthenticated");

        match Room::parse(room) {
            Room::Global => true,
            Room::User(owner_id) => {
                let allowed = user_id == Some(owner_id.as_str());
                if !allowed {
                    tracing::warn!(
                        socket_id,
                        user = user_desc,
                        room,
                        "denied join: user room belongs to someone else"
                    );
                }
                allowed
            }
            Room::Rehearsal(rehearsal_id) => {
                let Some(user_id) = user_id else {
                    tracing::warn!(
                        socket_id,
                        user = user_desc,
                        room,
                        "denied join: rehearsal room requires authentication"
                    );
                    return false;
                };
                match self.store.rehearsal_access(user_id, &rehearsal_id).await {
                    Ok(true) => true,
                    Ok(false) => {
                        tracing::warn!(
                            socket_id,
                            user = user_id,
                            room,
                            "denied join: no attendance, invite, or creator relation"
                        );
                        false
                    }
                    Err(err) => {
                        tracing::error!(
                            socket_id,
                            user = user_id,
                            room,
                            %err,
                            "denied join: rehearsal access lookup failed"
                        );
                        false
                    }
                }
            }
            Room::Show(show_id) => {
                let Some(user_id) = user_id else {
                    tracing::warn!(
                        socket_id,
                        user = user_desc,
                        room,
                        "denied join: show room requires authentication"
                    );
                    return false;
                };
                match self.store.show_access(user_id, &show_id).await {
                    Ok(true) => true,
                    Ok(false) => {
                        tracing::warn!(
                            socket_id,
                            user = user_id,
                            room,
                            "denied join: no casting or rehearsal relation to show"
                        );
                        false
                    }
                    Err(err) => {
                        tracing::error!(
                            socket_id,
                            user = user_id,
                            room,
                            %err,
                            "denied join: show access lookup failed"
                        );
                        false
                    }
                }
            }
            // Forward-compatible default: unknown room types are joinable by
            // any authenticated user.
            Room::Other(_) => {
                let allowed = user_id.is_some();
                if !allowed {
                    tracing::warn!(
                        socket_id,
                        user = user_desc,
                        room,
                        "denied join: room requires authentication"
                    );
                }
                allowed
            }
        }
    }
}
