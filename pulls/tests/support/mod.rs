#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use corelib::{GigId, Price, Pull, PullId, PullState, Role, UserId};
use parking_lot::Mutex;
use serde_json::{Value, json};

use pulls::cache::InMemoryPullCache;
use pulls::identity::SUBJECT_CLAIM;
use pulls::remote::{
    Auth, CreatePullRequest, GatewayError, PullDto, PullGateway, UpdatePullRequest,
};
use pulls::repository::PullRepository;
use pulls::session::MemoryTokens;

// -----------------------
// Credentials
// -----------------------

/// Unsigned three-segment token carrying `user_id` in the subject claim.
pub fn token_for(user_id: UserId) -> String {
    token_with_claims(json!({ SUBJECT_CLAIM: user_id.to_string(), "email": "buyer@gigu.test" }))
}

pub fn token_with_claims(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

pub fn pull(id: PullId, gig_id: GigId, buyer_id: UserId) -> Pull {
    Pull {
        id,
        seller_id: 5,
        buyer_id,
        gig_id,
        price_init: Price::from_minor(2_000),
        price_update: Price::from_minor(2_000),
        state: PullState::Pending,
    }
}

// -----------------------
// Fake backend
// -----------------------

#[derive(Default)]
struct State {
    pulls: Vec<PullDto>,
    next_id: PullId,
    failures: HashMap<&'static str, VecDeque<GatewayError>>,
    calls: Vec<&'static str>,
    created: Vec<CreatePullRequest>,
    wrapper: Option<&'static str>,
    leak_other_users: bool,
    list_override: Option<Value>,
    blind_lists: usize,
}

/// In-process stand-in for the pull backend, with a unique (gig, buyer)
/// constraint and scriptable failures.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, pull: &Pull) {
        let mut s = self.state.lock();
        s.next_id = s.next_id.max(pull.id);
        s.pulls.push(PullDto::from(pull));
    }

    /// Queues an error returned by the next call of `op`.
    pub fn fail_next(&self, op: &'static str, err: GatewayError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    pub fn status(status: u16, body: &str) -> GatewayError {
        GatewayError::Status {
            status,
            body: body.to_string(),
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn created_requests(&self) -> Vec<CreatePullRequest> {
        self.state.lock().created.clone()
    }

    pub fn stored(&self) -> Vec<PullDto> {
        self.state.lock().pulls.clone()
    }

    pub fn wrap_lists_in(&self, key: &'static str) {
        self.state.lock().wrapper = Some(key);
    }

    /// Role-scoped lists return every pull, like a misbehaving backend.
    pub fn leak_other_users(&self) {
        self.state.lock().leak_other_users = true;
    }

    pub fn answer_lists_with(&self, payload: Value) {
        self.state.lock().list_override = Some(payload);
    }

    /// The next `n` list answers are empty, as if another device's pull
    /// had not been committed yet.
    pub fn blind_next_lists(&self, n: usize) {
        self.state.lock().blind_lists = n;
    }

    fn enter(&self, op: &'static str) -> Result<parking_lot::MutexGuard<'_, State>, GatewayError> {
        let mut s = self.state.lock();
        s.calls.push(op);
        if let Some(err) = s.failures.get_mut(op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(s)
    }

    fn list_payload(s: &mut State, items: Vec<PullDto>) -> Value {
        if let Some(v) = &s.list_override {
            return v.clone();
        }
        let items = if s.blind_lists > 0 {
            s.blind_lists -= 1;
            Vec::new()
        } else {
            items
        };
        let arr = serde_json::to_value(items).unwrap_or(Value::Null);
        match s.wrapper {
            Some(key) => json!({ key: arr }),
            None => arr,
        }
    }
}

fn not_found() -> GatewayError {
    FakeBackend::status(404, "")
}

#[async_trait]
impl PullGateway for FakeBackend {
    async fn create(
        &self,
        _auth: &Auth,
        request: &CreatePullRequest,
    ) -> Result<PullDto, GatewayError> {
        let mut s = self.enter("create")?;
        s.created.push(request.clone());

        if s
            .pulls
            .iter()
            .any(|p| p.gig_id == request.gig_id && p.buyer_id == request.buyer_id)
        {
            return Err(FakeBackend::status(
                400,
                "A pull already exists for this gig and buyer",
            ));
        }

        s.next_id += 1;
        let dto = PullDto {
            id: s.next_id,
            seller_id: request.seller_id,
            buyer_id: request.buyer_id,
            gig_id: request.gig_id,
            price_init: request.price_init,
            price_update: request.price_update,
            state: request.state.clone(),
        };
        s.pulls.push(dto.clone());
        Ok(dto)
    }

    async fn list_all(&self, _auth: &Auth) -> Result<Value, GatewayError> {
        let mut s = self.enter("list_all")?;
        let items = s.pulls.clone();
        Ok(Self::list_payload(&mut s, items))
    }

    async fn get_by_id(&self, id: PullId, _auth: &Auth) -> Result<PullDto, GatewayError> {
        let s = self.enter("get_by_id")?;
        s.pulls.iter().find(|p| p.id == id).cloned().ok_or_else(not_found)
    }

    async fn list_by_role(
        &self,
        _auth: &Auth,
        role: Role,
        user_id: UserId,
    ) -> Result<Value, GatewayError> {
        let mut s = self.enter("list_by_role")?;
        let items: Vec<PullDto> = s
            .pulls
            .iter()
            .filter(|p| {
                s.leak_other_users
                    || match role {
                        Role::Buyer => p.buyer_id == user_id,
                        Role::Seller => p.seller_id == user_id,
                    }
            })
            .cloned()
            .collect();
        Ok(Self::list_payload(&mut s, items))
    }

    async fn update(
        &self,
        id: PullId,
        _auth: &Auth,
        request: &UpdatePullRequest,
    ) -> Result<PullDto, GatewayError> {
        let mut s = self.enter("update")?;
        let p = s.pulls.iter_mut().find(|p| p.id == id).ok_or_else(not_found)?;
        p.price_update = request.new_price;
        p.state = request.new_state.clone();
        Ok(p.clone())
    }

    async fn close(&self, id: PullId, _auth: &Auth) -> Result<PullDto, GatewayError> {
        let mut s = self.enter("close")?;
        let p = s.pulls.iter_mut().find(|p| p.id == id).ok_or_else(not_found)?;
        p.state = PullState::COMPLETE.to_string();
        Ok(p.clone())
    }
}

// -----------------------
// Wiring
// -----------------------

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub cache: Arc<InMemoryPullCache>,
    pub tokens: Arc<MemoryTokens>,
    pub repo: Arc<PullRepository>,
}

/// Repository over a fake backend and in-memory cache, signed in as `user_id`.
pub fn signed_in_as(user_id: UserId) -> Harness {
    with_tokens(MemoryTokens::signed_in(token_for(user_id)))
}

pub fn with_tokens(tokens: MemoryTokens) -> Harness {
    let backend = FakeBackend::new();
    let cache = Arc::new(InMemoryPullCache::new());
    let tokens = Arc::new(tokens);
    let repo = Arc::new(PullRepository::new(
        backend.clone(),
        cache.clone(),
        tokens.clone(),
    ));

    Harness {
        backend,
        cache,
        tokens,
        repo,
    }
}
