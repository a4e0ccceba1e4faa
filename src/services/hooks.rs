use crate::models::FileEntity;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// Extension points fired around mutating coordinator operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    BeforeUpload,
    AfterUpload,
    BeforeDelete,
    AfterDelete,
    BeforeRename,
    AfterRename,
}

impl HookEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HookEvent::BeforeUpload => "beforeUpload",
            HookEvent::AfterUpload => "afterUpload",
            HookEvent::BeforeDelete => "beforeDelete",
            HookEvent::AfterDelete => "afterDelete",
            HookEvent::BeforeRename => "beforeRename",
            HookEvent::AfterRename => "afterRename",
        }
    }

    /// Only delete and rename can be vetoed; upload hooks are notifications.
    pub fn is_stoppable(&self) -> bool {
        matches!(self, HookEvent::BeforeDelete | HookEvent::BeforeRename)
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata of a normalized source, as seen by `beforeUpload` listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub filename: String,
    pub size: u64,
    pub mime: String,
    pub hash: String,
}

/// Named-field payload carried by every hook event.
#[derive(Debug, Clone, Default)]
pub struct HookPayload {
    pub entity: Option<FileEntity>,
    pub source: Option<SourceSummary>,
    /// Destination key for uploads, current key for delete/rename.
    pub path: Option<String>,
    pub new_path: Option<String>,
}

/// What a listener wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Continue,
    StopWith(bool),
}

pub type Listener = Arc<dyn Fn(HookEvent, &HookPayload) -> HookOutcome + Send + Sync>;

/// In-process, synchronous event bus.
///
/// Listeners run inline in registration order. Dispatch stops at the first
/// listener returning [`HookOutcome::StopWith`]; for events that cannot be
/// stopped the outcome is still [`HookOutcome::Continue`].
#[derive(Clone, Default)]
pub struct HookBus {
    listeners: Arc<DashMap<HookEvent, Vec<Listener>>>,
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<(HookEvent, usize)> = self
            .listeners
            .iter()
            .map(|entry| (*entry.key(), entry.value().len()))
            .collect();
        f.debug_struct("HookBus").field("listeners", &counts).finish()
    }
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen<F>(&self, event: HookEvent, listener: F)
    where
        F: Fn(HookEvent, &HookPayload) -> HookOutcome + Send + Sync + 'static,
    {
        self.listeners
            .entry(event)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Registers a listener that never stops the operation.
    pub fn observe<F>(&self, event: HookEvent, observer: F)
    where
        F: Fn(HookEvent, &HookPayload) + Send + Sync + 'static,
    {
        self.listen(event, move |event, payload| {
            observer(event, payload);
            HookOutcome::Continue
        });
    }

    pub fn listener_count(&self, event: HookEvent) -> usize {
        self.listeners.get(&event).map(|l| l.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        self.listeners.clear();
    }

    pub fn dispatch(&self, event: HookEvent, payload: &HookPayload) -> HookOutcome {
        // Snapshot so listeners may register further listeners without
        // deadlocking on the map shard.
        let snapshot: Vec<Listener> = match self.listeners.get(&event) {
            Some(listeners) => listeners.value().clone(),
            None => return HookOutcome::Continue,
        };

        for listener in snapshot {
            if let HookOutcome::StopWith(result) = listener(event, payload) {
                if !event.is_stoppable() {
                    tracing::debug!("Hook {} cannot be stopped; ignoring {}", event, result);
                    return HookOutcome::Continue;
                }
                tracing::debug!("Hook {} stopped with result {}", event, result);
                return HookOutcome::StopWith(result);
            }
        }
        HookOutcome::Continue
    }
}
