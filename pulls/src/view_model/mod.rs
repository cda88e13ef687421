//! Presentation adapter over [`PullRepository`].
//!
//! Every operation publishes immutable snapshots on a `watch` channel:
//! first a loading snapshot (synchronously, before the call returns), then
//! the terminal one. A new operation on the same slot aborts the one it
//! supersedes and bumps the slot's generation; a result is only published
//! while its generation is current, so a stale answer that finished before
//! the abort landed is dropped instead of overwriting a newer one.
//!
//! Must be used from within a tokio runtime.

pub mod state;

use std::future::Future;
use std::sync::Arc;

use common::logger::{TraceId, child_span, root_span};
use corelib::{NewPull, Price, Pull, PullId, PullState, UserId};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, warn};

use crate::error::PullResult;
use crate::repository::PullRepository;

pub use state::{CreateState, UiState};

pub const PULL_CREATED: &str = "Pull created successfully.";
pub const PULL_UPDATED: &str = "Pull updated.";
pub const PULL_CLOSED: &str = "Pull closed.";

#[derive(Clone, Copy, Debug)]
enum Slot {
    List = 0,
    Detail = 1,
    Create = 2,
}

#[derive(Default)]
struct SlotTask {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

/// Per-slot task handles and generations, behind one lock so that starting
/// an operation and publishing a result are ordered.
#[derive(Default)]
struct Slots(Mutex<[SlotTask; 3]>);

impl Slots {
    /// Starts a new generation on `slot`, runs `on_start` under the lock and
    /// returns the ticket the operation must present to publish.
    fn begin(&self, slot: Slot, on_start: impl FnOnce()) -> u64 {
        let mut slots = self.0.lock();
        let entry = &mut slots[slot as usize];
        entry.generation += 1;
        on_start();
        entry.generation
    }

    /// Runs `publish` only if nothing newer started on `slot` since `ticket`.
    fn publish(&self, slot: Slot, ticket: u64, publish: impl FnOnce()) -> bool {
        let slots = self.0.lock();
        if slots[slot as usize].generation != ticket {
            debug!(?slot, "dropping superseded result");
            return false;
        }
        publish();
        true
    }

    fn install(&self, slot: Slot, handle: JoinHandle<()>) {
        if let Some(previous) = self.0.lock()[slot as usize].handle.replace(handle) {
            if !previous.is_finished() {
                debug!(?slot, "superseding in-flight operation");
            }
            previous.abort();
        }
    }

    fn abort(&self, slot: Slot) {
        let mut slots = self.0.lock();
        let entry = &mut slots[slot as usize];
        entry.generation += 1;
        if let Some(handle) = entry.handle.take() {
            handle.abort();
        }
    }
}

struct Shared {
    repo: Arc<PullRepository>,
    list: watch::Sender<UiState<Vec<Pull>>>,
    detail: watch::Sender<UiState<Pull>>,
    create: watch::Sender<CreateState>,
    slots: Slots,
}

pub struct PullViewModel {
    shared: Arc<Shared>,
}

impl PullViewModel {
    pub fn new(repo: Arc<PullRepository>) -> Self {
        let (list, _) = watch::channel(UiState::idle());
        let (detail, _) = watch::channel(UiState::idle());
        let (create, _) = watch::channel(CreateState::default());

        Self {
            shared: Arc::new(Shared {
                repo,
                list,
                detail,
                create,
                slots: Slots::default(),
            }),
        }
    }

    /* =========================
    Subscriptions
    ========================= */

    pub fn list_state(&self) -> watch::Receiver<UiState<Vec<Pull>>> {
        self.shared.list.subscribe()
    }

    pub fn detail_state(&self) -> watch::Receiver<UiState<Pull>> {
        self.shared.detail.subscribe()
    }

    pub fn create_state(&self) -> watch::Receiver<CreateState> {
        self.shared.create.subscribe()
    }

    /* =========================
    Reads
    ========================= */

    pub fn load_pulls(&self) {
        let span = root_span("load_pulls", &TraceId::new());
        Shared::load_list(&self.shared, span, |repo| async move {
            repo.get_all_pulls().await
        });
    }

    pub fn load_pulls_by_buyer(&self, buyer_id: UserId) {
        let span = root_span("load_pulls_by_buyer", &TraceId::new());
        span.record("user_id", buyer_id);
        Shared::load_list(&self.shared, span, move |repo| async move {
            repo.get_pulls_by_buyer_id(buyer_id).await
        });
    }

    pub fn load_my_pulls(&self) {
        Shared::load_my_pulls(&self.shared, root_span("load_my_pulls", &TraceId::new()));
    }

    pub fn load_pull_detail(&self, id: PullId) {
        let shared = &self.shared;
        let ticket = shared
            .slots
            .begin(Slot::Detail, || shared.detail.send_modify(|s| *s = s.loading()));

        let task_shared = Arc::clone(shared);
        let span = root_span("load_pull_detail", &TraceId::new());
        span.record("pull_id", id);

        shared.spawn(
            Slot::Detail,
            async move {
                let next = match task_shared.repo.get_pull_by_id(id).await {
                    Ok(pull) => UiState::succeeded(pull, None),
                    Err(e) => UiState::failed(e.to_string()),
                };
                task_shared.slots.publish(Slot::Detail, ticket, || {
                    task_shared.detail.send_replace(next);
                });
            }
            .instrument(span),
        );
    }

    /* =========================
    Writes
    ========================= */

    pub fn create_pull(&self, req: NewPull) {
        Shared::write(&self.shared, "create_pull", PULL_CREATED, move |repo| async move {
            repo.create_pull(req).await
        });
    }

    pub fn update_pull(&self, id: PullId, new_price: Price, new_state: PullState) {
        Shared::write(&self.shared, "update_pull", PULL_UPDATED, move |repo| async move {
            repo.update_pull(id, new_price, new_state).await
        });
    }

    pub fn close_pull(&self, id: PullId) {
        Shared::write(&self.shared, "close_pull", PULL_CLOSED, move |repo| async move {
            repo.close_pull(id).await
        });
    }

    /// Clears the negotiation screen's flags, dropping any in-flight
    /// write result. The screen is reused across gigs.
    pub fn reset_create_state(&self) {
        self.shared.slots.abort(Slot::Create);
        self.shared.create.send_replace(CreateState::default());
    }

    pub async fn current_user_id(&self) -> PullResult<UserId> {
        self.shared.repo.current_user_id().await
    }
}

impl Drop for PullViewModel {
    fn drop(&mut self) {
        for slot in [Slot::List, Slot::Detail, Slot::Create] {
            self.shared.slots.abort(slot);
        }
    }
}

impl Shared {
    fn spawn<F>(&self, slot: Slot, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.slots.install(slot, tokio::spawn(fut));
    }

    fn load_list<F, Fut>(this: &Arc<Self>, span: Span, call: F)
    where
        F: FnOnce(Arc<PullRepository>) -> Fut + Send + 'static,
        Fut: Future<Output = PullResult<Vec<Pull>>> + Send + 'static,
    {
        let ticket = this
            .slots
            .begin(Slot::List, || this.list.send_modify(|s| *s = s.loading()));

        let shared = Arc::clone(this);

        this.spawn(
            Slot::List,
            async move {
                let next = match call(Arc::clone(&shared.repo)).await {
                    Ok(pulls) => UiState::succeeded(pulls, None),
                    Err(e) => UiState::failed(e.to_string()),
                };
                shared.slots.publish(Slot::List, ticket, || {
                    shared.list.send_replace(next);
                });
            }
            .instrument(span),
        );
    }

    fn load_my_pulls(this: &Arc<Self>, span: Span) {
        Self::load_list(this, span, |repo| async move {
            repo.get_my_pulls().await
        });
    }

    fn write<F, Fut>(this: &Arc<Self>, name: &'static str, done: &'static str, call: F)
    where
        F: FnOnce(Arc<PullRepository>) -> Fut + Send + 'static,
        Fut: Future<Output = PullResult<Pull>> + Send + 'static,
    {
        let ticket = this
            .slots
            .begin(Slot::Create, || {
                this.create.send_replace(CreateState::loading());
            });

        let shared = Arc::clone(this);
        let span = root_span(name, &TraceId::new());

        this.spawn(
            Slot::Create,
            async move {
                match call(Arc::clone(&shared.repo)).await {
                    Ok(pull) => {
                        Span::current().record("pull_id", pull.id);
                        let published = shared.slots.publish(Slot::Create, ticket, || {
                            shared.create.send_replace(CreateState::succeeded(pull, done));
                        });

                        if published {
                            // child of this write's root span, so the reload keeps its trace id
                            Self::load_my_pulls(&shared, child_span("reload_buyer_pulls"));
                        }
                    }
                    Err(e) => {
                        if e.requires_sign_in() {
                            warn!(error = %e, "write needs a fresh sign-in");
                        }
                        shared.slots.publish(Slot::Create, ticket, || {
                            shared.create.send_replace(CreateState::failed(e.to_string()));
                        });
                    }
                }
            }
            .instrument(span),
        );
    }
}
