//! In-memory activity registry plus the UI flags that follow its remote
//! synchronization.

use std::{
    collections::BTreeMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::domain::{Activity, ActivityId};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::{
    agent::{ActivityAgent, AgentResult},
    error::StoreError,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreAction {
    LoadAll,
    Select,
    Create,
    OpenCreateForm,
    Edit,
    Remove,
    OpenEditForm,
    CancelFormOpen,
    CancelSelection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionPhase {
    Pending,
    Committed,
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub action: StoreAction,
    pub phase: ActionPhase,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub loading_initial: bool,
    pub submitting: bool,
    pub edit_mode: bool,
    pub selected: Option<ActivityId>,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusyFlag {
    LoadingInitial,
    Submitting,
}

#[derive(Default)]
struct StoreState {
    registry: BTreeMap<ActivityId, Activity>,
    // Counters so overlapping actions on the same flag keep it raised until
    // the last one finishes.
    loading_initial: usize,
    submitting: usize,
    edit_mode: bool,
    selected: Option<ActivityId>,
    target: String,
}

impl StoreState {
    fn raise(&mut self, flag: BusyFlag, target: Option<&str>) {
        match flag {
            BusyFlag::LoadingInitial => self.loading_initial += 1,
            BusyFlag::Submitting => self.submitting += 1,
        }
        if let Some(target) = target {
            self.target = target.to_string();
        }
    }

    fn lower(&mut self, flag: BusyFlag, target: Option<&str>) {
        match flag {
            BusyFlag::LoadingInitial => {
                self.loading_initial = self.loading_initial.saturating_sub(1)
            }
            BusyFlag::Submitting => self.submitting = self.submitting.saturating_sub(1),
        }
        if target.is_some_and(|target| target == self.target) {
            self.target.clear();
        }
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            loading_initial: self.loading_initial > 0,
            submitting: self.submitting > 0,
            edit_mode: self.edit_mode,
            selected: self.selected.clone(),
            target: self.target.clone(),
        }
    }
}

pub struct ActivityStore {
    agent: Arc<dyn ActivityAgent>,
    state: Mutex<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl ActivityStore {
    pub fn new(agent: Arc<dyn ActivityAgent>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            agent,
            state: Mutex::new(StoreState::default()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn activity(&self, id: &ActivityId) -> Option<Activity> {
        self.lock().registry.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().registry.is_empty()
    }

    pub fn selected_activity(&self) -> Option<Activity> {
        let state = self.lock();
        state
            .selected
            .as_ref()
            .and_then(|id| state.registry.get(id))
            .cloned()
    }

    pub fn loading_initial(&self) -> bool {
        self.lock().loading_initial > 0
    }

    pub fn submitting(&self) -> bool {
        self.lock().submitting > 0
    }

    pub fn edit_mode(&self) -> bool {
        self.lock().edit_mode
    }

    pub fn target(&self) -> String {
        self.lock().target.clone()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().snapshot()
    }

    /// Every registry entry ordered by parsed date, ascending. Entries with
    /// an unparseable date come last. Rebuilt on each call.
    pub fn by_date(&self) -> Vec<Activity> {
        let mut activities: Vec<Activity> =
            self.lock().registry.values().cloned().collect();
        activities.sort_by_key(|activity| {
            let date = activity.parsed_date();
            (date.is_none(), date)
        });
        activities
    }

    pub async fn load_all(&self) -> Result<(), StoreError> {
        self.run_guarded(
            StoreAction::LoadAll,
            BusyFlag::LoadingInitial,
            None,
            self.agent.list(),
            |state, activities| {
                let mut loaded = 0usize;
                for activity in activities {
                    if activity.id.is_empty() {
                        warn!(title = %activity.title, "store: skipping activity without id");
                        continue;
                    }
                    let activity = activity.normalized();
                    state.registry.insert(activity.id.clone(), activity);
                    loaded += 1;
                }
                info!(
                    count = loaded,
                    total = state.registry.len(),
                    "store: activities loaded"
                );
            },
        )
        .await
    }

    pub fn select(&self, id: &ActivityId) {
        self.apply(StoreAction::Select, |state| {
            state.selected = state.registry.contains_key(id).then(|| id.clone());
            state.edit_mode = false;
        });
    }

    /// The caller assigns the id; the store never generates one.
    pub async fn create(&self, activity: Activity) -> Result<(), StoreError> {
        if activity.id.is_empty() {
            warn!(title = %activity.title, "store: refusing to create activity without id");
            return Err(StoreError::MissingId);
        }

        let stored = activity.clone();
        self.run_guarded(
            StoreAction::Create,
            BusyFlag::Submitting,
            None,
            self.agent.create(&activity),
            move |state, _| {
                info!(activity_id = %stored.id, "store: activity created");
                state.registry.insert(stored.id.clone(), stored);
                state.edit_mode = false;
            },
        )
        .await
    }

    pub fn open_create_form(&self) {
        self.apply(StoreAction::OpenCreateForm, |state| {
            state.selected = None;
            state.edit_mode = true;
        });
    }

    pub async fn edit(&self, activity: Activity) -> Result<(), StoreError> {
        if activity.id.is_empty() {
            return Err(StoreError::MissingId);
        }
        if !self.lock().registry.contains_key(&activity.id) {
            warn!(activity_id = %activity.id, "store: edit of unknown activity");
            return Err(StoreError::NotFound(activity.id));
        }

        let stored = activity.clone();
        self.run_guarded(
            StoreAction::Edit,
            BusyFlag::Submitting,
            None,
            self.agent.update(&activity),
            move |state, _| {
                info!(activity_id = %stored.id, "store: activity updated");
                state.selected = Some(stored.id.clone());
                state.registry.insert(stored.id.clone(), stored);
                state.edit_mode = false;
            },
        )
        .await
    }

    /// `target` names the control that triggered the removal so the UI can
    /// show a spinner on that row only.
    pub async fn remove(
        &self,
        id: &ActivityId,
        target: impl Into<String>,
    ) -> Result<(), StoreError> {
        self.run_guarded(
            StoreAction::Remove,
            BusyFlag::Submitting,
            Some(target.into()),
            self.agent.delete(id),
            |state, ()| {
                state.registry.remove(id);
                if state.selected.as_ref() == Some(id) {
                    state.selected = None;
                }
                info!(activity_id = %id, "store: activity removed");
            },
        )
        .await
    }

    pub fn open_edit_form(&self, id: &ActivityId) {
        self.apply(StoreAction::OpenEditForm, |state| {
            state.selected = state.registry.contains_key(id).then(|| id.clone());
            state.edit_mode = true;
        });
    }

    pub fn cancel_form_open(&self) {
        self.apply(StoreAction::CancelFormOpen, |state| state.edit_mode = false);
    }

    pub fn cancel_selection(&self) {
        self.apply(StoreAction::CancelSelection, |state| state.selected = None);
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, action: StoreAction, phase: ActionPhase) {
        let _ = self.events.send(StoreEvent { action, phase });
    }

    fn apply(&self, action: StoreAction, mutate: impl FnOnce(&mut StoreState)) {
        mutate(&mut *self.lock());
        self.publish(action, ActionPhase::Committed);
    }

    /// Raises `flag`, awaits `work`, then either commits its output or
    /// aborts, lowering the flag in the same locked step. The registry is
    /// only touched by `commit`.
    async fn run_guarded<T, W, C>(
        &self,
        action: StoreAction,
        flag: BusyFlag,
        target: Option<String>,
        work: W,
        commit: C,
    ) -> Result<(), StoreError>
    where
        W: Future<Output = AgentResult<T>>,
        C: FnOnce(&mut StoreState, T),
    {
        let guard = BusyGuard::raise(self, action, flag, target);
        match work.await {
            Ok(value) => {
                guard.commit(|state| commit(state, value));
                Ok(())
            }
            Err(err) => {
                error!(?action, "store: action failed: {err}");
                guard.abort(err.to_string());
                Err(err.into())
            }
        }
    }
}

/// Keeps a busy flag raised for the lifetime of one action. Dropping the
/// guard without committing lowers the flag and reports an abort.
struct BusyGuard<'a> {
    store: &'a ActivityStore,
    action: StoreAction,
    flag: BusyFlag,
    target: Option<String>,
    released: bool,
}

impl<'a> BusyGuard<'a> {
    fn raise(
        store: &'a ActivityStore,
        action: StoreAction,
        flag: BusyFlag,
        target: Option<String>,
    ) -> Self {
        store.lock().raise(flag, target.as_deref());
        store.publish(action, ActionPhase::Pending);
        Self {
            store,
            action,
            flag,
            target,
            released: false,
        }
    }

    fn commit(mut self, apply: impl FnOnce(&mut StoreState)) {
        {
            let mut state = self.store.lock();
            apply(&mut *state);
            state.lower(self.flag, self.target.as_deref());
        }
        self.released = true;
        self.store.publish(self.action, ActionPhase::Committed);
    }

    fn abort(mut self, message: String) {
        self.release();
        self.store.publish(self.action, ActionPhase::Aborted(message));
    }

    fn release(&mut self) {
        if !self.released {
            self.store
                .lock()
                .lower(self.flag, self.target.as_deref());
            self.released = true;
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.release();
            self.store.publish(
                self.action,
                ActionPhase::Aborted("action dropped before completion".into()),
            );
        }
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
