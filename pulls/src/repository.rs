//! Pull repository: the reconciliation engine between the local cache and
//! the remote authority.
//!
//! Guarantees:
//! - Every public operation returns `PullResult`; gateway, decoding and
//!   cache failures are converted, never propagated as panics.
//! - The acting buyer is always derived from the session credential.
//!   Caller-supplied buyer ids are ignored and there is no fallback id.
//! - Duplicate prevention is remote-authoritative: before creating, the
//!   buyer's pulls are listed from the backend and the cache is only
//!   populated from that answer, never consulted as the gate.
//! - Reads fall back to cached records when the remote call fails; writes
//!   never do.
//!
//! The duplicate check is advisory. Two devices may pass it concurrently
//! for the same `(gig, buyer)`; the backend's unique constraint decides and
//! its rejection is reported as a conflict.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::logger::warn_if_slow;
use corelib::{GigId, NewPull, Price, Pull, PullId, PullState, Role, UserId};
use serde_json::Value;
use tracing::{Span, debug, field, info, instrument, warn};

use crate::cache::PullCache;
use crate::error::{PullError, PullResult};
use crate::identity;
use crate::remote::payload::{self, Normalized};
use crate::remote::{Auth, CreatePullRequest, GatewayError, PullDto, PullGateway, UpdatePullRequest};
use crate::session::TokenProvider;

/// Fragments of a 400 body that mean "this pull already exists".
/// "existente" is left out: it also matches "inexistente".
const CONFLICT_MARKERS: [&str; 4] = ["already exists", "ya existe", "duplicate", "unique"];

const DEFAULT_SLOW_CALL: Duration = Duration::from_millis(1_500);

pub struct PullRepository {
    gateway: Arc<dyn PullGateway>,
    cache: Arc<dyn PullCache>,
    tokens: Arc<dyn TokenProvider>,
    slow_call: Duration,
}

/// Outcome of scanning the buyer's remote pulls for a gig.
struct DuplicateScan {
    existing: Option<Pull>,
    gig_ids: Vec<GigId>,
}

impl PullRepository {
    pub fn new(
        gateway: Arc<dyn PullGateway>,
        cache: Arc<dyn PullCache>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            gateway,
            cache,
            tokens,
            slow_call: DEFAULT_SLOW_CALL,
        }
    }

    pub fn with_slow_call_threshold(mut self, threshold: Duration) -> Self {
        self.slow_call = threshold;
        self
    }

    /// Id of the signed-in user, decoded from the session credential.
    pub async fn current_user_id(&self) -> PullResult<UserId> {
        let auth = self.auth().await?;
        Ok(identity::extract_user_id(auth.token())?)
    }

    /* =========================
    Writes
    ========================= */

    #[instrument(
        skip(self, req),
        target = "repository",
        fields(gig_id = req.gig_id, seller_id = req.seller_id, buyer_id = field::Empty)
    )]
    pub async fn create_pull(&self, req: NewPull) -> PullResult<Pull> {
        validate_new_pull(&req)?;

        let auth = self.auth().await?;

        let buyer_id = identity::extract_user_id(auth.token()).map_err(|e| {
            warn!(error = %e, "refusing to create pull without a resolvable buyer");
            PullError::from(e)
        })?;
        Span::current().record("buyer_id", buyer_id);

        if req.claimed_buyer_id != 0 && req.claimed_buyer_id != buyer_id {
            warn!(
                claimed = req.claimed_buyer_id,
                resolved = buyer_id,
                "ignoring caller-supplied buyer id"
            );
        }

        let scan = self.scan_buyer_pulls(&auth, req.gig_id, buyer_id).await?;
        if let Some(existing) = scan.existing {
            info!(existing_pull_id = existing.id, "duplicate pull blocked");
            return Err(PullError::Conflict {
                pull_id: Some(existing.id),
                gig_id: req.gig_id,
                existing_gig_ids: scan.gig_ids,
            });
        }

        let request = CreatePullRequest {
            seller_id: req.seller_id,
            gig_id: req.gig_id,
            price_init: req.price_init.to_major(),
            price_update: req.price_update.to_major(),
            buyer_id,
            state: req.state.encode().to_string(),
        };

        let created = warn_if_slow(
            "gateway_create",
            self.slow_call,
            self.gateway.create(&auth, &request),
        )
        .await;

        match created {
            Ok(dto) => {
                let pull = to_domain(dto)?;
                if !pull.is_assigned() || !pull.has_valid_parties() {
                    return Err(PullError::Decode(format!(
                        "the created pull came back incomplete (id {})",
                        pull.id
                    )));
                }
                self.cache_one(&pull).await;
                info!(pull_id = pull.id, "pull created");
                Ok(pull)
            }
            Err(e) => Err(self.classify_create_failure(&auth, req.gig_id, buyer_id, e).await),
        }
    }

    /// Sets the negotiated price and state. Does not re-check the
    /// one-pull-per-gig rule: updates never open a negotiation.
    #[instrument(skip(self), target = "repository", fields(new_state = %new_state))]
    pub async fn update_pull(
        &self,
        id: PullId,
        new_price: Price,
        new_state: PullState,
    ) -> PullResult<Pull> {
        validate_pull_id(id)?;
        if new_price.is_negative() {
            return Err(PullError::validation("The price cannot be negative."));
        }
        if !new_state.is_known() {
            return Err(PullError::validation(format!(
                "Unknown pull state `{new_state}`."
            )));
        }

        let auth = self.auth().await?;
        let request = UpdatePullRequest::new(new_price, &new_state);

        let dto = warn_if_slow(
            "gateway_update",
            self.slow_call,
            self.gateway.update(id, &auth, &request),
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "pull update rejected");
            PullError::from(e)
        })?;

        let pull = to_domain(dto)?;
        self.cache_one(&pull).await;
        Ok(pull)
    }

    /// Force-closes a pull into its terminal state.
    #[instrument(skip(self), target = "repository")]
    pub async fn close_pull(&self, id: PullId) -> PullResult<Pull> {
        validate_pull_id(id)?;
        let auth = self.auth().await?;

        let dto = warn_if_slow("gateway_close", self.slow_call, self.gateway.close(id, &auth))
            .await
            .map_err(|e| {
                warn!(error = %e, "pull close rejected");
                PullError::from(e)
            })?;

        let pull = to_domain(dto)?;
        self.cache_one(&pull).await;
        Ok(pull)
    }

    /* =========================
    Reads
    ========================= */

    /// Full list. A fully decoded answer replaces the cache wholesale; a
    /// partial one is only merged, so unreadable records keep their cached copy.
    #[instrument(skip(self), target = "repository")]
    pub async fn get_all_pulls(&self) -> PullResult<Vec<Pull>> {
        let auth = self.auth().await?;

        let listed = self
            .fetch_list(warn_if_slow(
                "gateway_list_all",
                self.slow_call,
                self.gateway.list_all(&auth),
            ))
            .await;

        match listed {
            Ok(listed) => {
                let refreshed = if listed.is_complete() {
                    self.cache.replace_all(&listed.pulls).await
                } else {
                    self.cache.upsert_many(&listed.pulls).await
                };
                if let Err(e) = refreshed {
                    warn!(error = ?e, "failed to refresh pull cache");
                }
                Ok(listed.pulls)
            }
            Err(e) => {
                let cached = self.cache.get_all().await;
                serve_cached_list(e, cached)
            }
        }
    }

    #[instrument(skip(self), target = "repository")]
    pub async fn get_pull_by_id(&self, id: PullId) -> PullResult<Pull> {
        validate_pull_id(id)?;
        let auth = self.auth().await?;

        let fetched = warn_if_slow(
            "gateway_get_by_id",
            self.slow_call,
            self.gateway.get_by_id(id, &auth),
        )
        .await
        .map_err(PullError::from)
        .and_then(to_domain);

        match fetched {
            Ok(pull) => {
                self.cache_one(&pull).await;
                Ok(pull)
            }
            Err(e) => match self.cache.get_by_id(id).await {
                Ok(Some(cached)) => {
                    warn!(error = %e, "remote lookup failed; serving cached pull");
                    Ok(cached)
                }
                Ok(None) => Err(e),
                Err(cache_err) => {
                    warn!(error = ?cache_err, "cache lookup failed");
                    Err(e)
                }
            },
        }
    }

    /// Pulls where `user_id` plays `role`; merged into the cache (partial view,
    /// so nothing else is evicted).
    #[instrument(skip(self), target = "repository")]
    pub async fn get_pulls_for_role(&self, role: Role, user_id: UserId) -> PullResult<Vec<Pull>> {
        if user_id <= 0 {
            return Err(PullError::validation(format!(
                "The {role} id is not valid."
            )));
        }
        let auth = self.auth().await?;

        let listed = self
            .fetch_list(warn_if_slow(
                "gateway_list_by_role",
                self.slow_call,
                self.gateway.list_by_role(&auth, role, user_id),
            ))
            .await
            .map(|listed| keep_role(listed.pulls, role, user_id));

        match listed {
            Ok(pulls) => {
                if let Err(e) = self.cache.upsert_many(&pulls).await {
                    warn!(error = ?e, "failed to merge pulls into cache");
                }
                Ok(pulls)
            }
            Err(e) => {
                let cached = match role {
                    Role::Buyer => self.cache.get_by_buyer(user_id).await,
                    Role::Seller => self
                        .cache
                        .get_all()
                        .await
                        .map(|all| keep_role(all, role, user_id)),
                };
                serve_cached_list(e, cached)
            }
        }
    }

    pub async fn get_pulls_by_buyer_id(&self, buyer_id: UserId) -> PullResult<Vec<Pull>> {
        self.get_pulls_for_role(Role::Buyer, buyer_id).await
    }

    pub async fn get_pulls_by_seller_id(&self, seller_id: UserId) -> PullResult<Vec<Pull>> {
        self.get_pulls_for_role(Role::Seller, seller_id).await
    }

    /// Buyer-side pulls of the signed-in user.
    pub async fn get_my_pulls(&self) -> PullResult<Vec<Pull>> {
        let me = self.current_user_id().await?;
        self.get_pulls_by_buyer_id(me).await
    }

    /* =========================
    Internals
    ========================= */

    async fn auth(&self) -> PullResult<Auth> {
        let token = self.tokens.token().await.map_err(|e| {
            warn!(error = ?e, "failed to read session");
            PullError::sign_in_required()
        })?;

        token
            .and_then(Auth::bearer)
            .ok_or_else(PullError::sign_in_required)
    }

    async fn fetch_list<F>(&self, call: F) -> PullResult<Normalized>
    where
        F: Future<Output = Result<Value, GatewayError>>,
    {
        let raw = call.await?;
        let listed = payload::normalize(&raw).map_err(|e| PullError::Decode(e.to_string()))?;

        if !listed.is_complete() {
            warn!(
                skipped = listed.skipped,
                kept = listed.pulls.len(),
                "some listed pulls could not be decoded"
            );
        }
        Ok(listed)
    }

    /// Lists the buyer's pulls remotely and looks for one on `gig_id`.
    ///
    /// Fails closed: if the list cannot be fully read, creation is refused
    /// rather than risking a duplicate.
    async fn scan_buyer_pulls(
        &self,
        auth: &Auth,
        gig_id: GigId,
        buyer_id: UserId,
    ) -> PullResult<DuplicateScan> {
        let raw = warn_if_slow(
            "gateway_list_by_role",
            self.slow_call,
            self.gateway.list_by_role(auth, Role::Buyer, buyer_id),
        )
        .await
        .map_err(verification_failed)?;

        let listed = payload::normalize(&raw)
            .map_err(|e| PullError::Decode(format!("could not verify your existing pulls: {e}")))?;
        if !listed.is_complete() {
            return Err(PullError::Decode(format!(
                "could not verify your existing pulls: {} unreadable",
                listed.skipped
            )));
        }

        // the backend has been seen returning other buyers' pulls here
        let mine = keep_role(listed.pulls, Role::Buyer, buyer_id);

        if let Err(e) = self.cache.upsert_many(&mine).await {
            warn!(error = ?e, "failed to populate cache from buyer list");
        }

        debug!(count = mine.len(), "buyer pulls scanned");

        Ok(DuplicateScan {
            existing: mine.iter().find(|p| p.gig_id == gig_id).cloned(),
            gig_ids: mine.iter().map(|p| p.gig_id).collect(),
        })
    }

    async fn classify_create_failure(
        &self,
        auth: &Auth,
        gig_id: GigId,
        buyer_id: UserId,
        err: GatewayError,
    ) -> PullError {
        warn!(error = %err, "pull creation rejected");

        match err {
            GatewayError::Status { status: 404, .. } => {
                PullError::EndpointNotFound("POST on the pull collection".to_string())
            }
            GatewayError::Status { status, ref body }
                if status == 409 || (status == 400 && mentions_conflict(body)) =>
            {
                // lost a race, or the cache and backend disagree: find the winner
                match self.scan_buyer_pulls(auth, gig_id, buyer_id).await {
                    Ok(scan) => PullError::Conflict {
                        pull_id: scan.existing.map(|p| p.id),
                        gig_id,
                        existing_gig_ids: scan.gig_ids,
                    },
                    Err(_) => PullError::Conflict {
                        pull_id: None,
                        gig_id,
                        existing_gig_ids: Vec::new(),
                    },
                }
            }
            other => PullError::from(other),
        }
    }

    /// Best effort: the remote write already happened, so a cache failure
    /// must not turn it into an error.
    async fn cache_one(&self, pull: &Pull) {
        if let Err(e) = self.cache.upsert(pull).await {
            warn!(error = ?e, pull_id = pull.id, "failed to cache pull");
        }
    }
}

/* =========================
Helpers
========================= */

fn validate_new_pull(req: &NewPull) -> PullResult<()> {
    if req.gig_id <= 0 {
        return Err(PullError::validation(
            "The gig id is not valid. The pull cannot be created.",
        ));
    }
    if req.seller_id <= 0 {
        return Err(PullError::validation(
            "The seller id is not valid. The pull cannot be created.",
        ));
    }
    if req.price_init.is_negative() || req.price_update.is_negative() {
        return Err(PullError::validation("The price cannot be negative."));
    }
    if !req.state.is_known() {
        return Err(PullError::validation(format!(
            "Unknown pull state `{}`.",
            req.state
        )));
    }
    Ok(())
}

fn validate_pull_id(id: PullId) -> PullResult<()> {
    if id <= 0 {
        return Err(PullError::validation("The pull id is not valid."));
    }
    Ok(())
}

fn to_domain(dto: PullDto) -> PullResult<Pull> {
    Pull::try_from(dto).map_err(|e| PullError::Decode(e.to_string()))
}

fn keep_role(pulls: Vec<Pull>, role: Role, user_id: UserId) -> Vec<Pull> {
    let before = pulls.len();
    let kept: Vec<Pull> = pulls
        .into_iter()
        .filter(|p| match role {
            Role::Buyer => p.buyer_id == user_id,
            Role::Seller => p.seller_id == user_id,
        })
        .collect();

    if kept.len() != before {
        warn!(
            dropped = before - kept.len(),
            %role,
            user_id,
            "backend returned pulls of other users"
        );
    }
    kept
}

fn mentions_conflict(body: &str) -> bool {
    let body = body.to_lowercase();
    CONFLICT_MARKERS.iter().any(|m| body.contains(m))
}

fn verification_failed(e: GatewayError) -> PullError {
    match e {
        GatewayError::Status { status, body } if status != 401 => PullError::Remote {
            status,
            body: format!("could not verify your existing pulls. {body}")
                .trim_end()
                .to_string(),
        },
        other => PullError::from(other),
    }
}

fn serve_cached_list(err: PullError, cached: anyhow::Result<Vec<Pull>>) -> PullResult<Vec<Pull>> {
    match cached {
        Ok(pulls) if !pulls.is_empty() => {
            warn!(error = %err, count = pulls.len(), "remote list failed; serving cached pulls");
            Ok(pulls)
        }
        Ok(_) => Err(err),
        Err(cache_err) => {
            warn!(error = ?cache_err, "cache read failed");
            Err(err)
        }
    }
}
