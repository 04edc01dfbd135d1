//! One running meeting per topic

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;

use crate::error::MeetingError;

type Slots = Arc<Mutex<HashMap<String, Slot>>>;

struct Slot {
    running: Arc<tokio::sync::Mutex<()>>,
    token: CancellationToken,
    /// Bumped by every `begin`; only the newest meeting may release the slot
    generation: u64,
}

/// Tracks the live meeting of each topic
///
/// Starting a meeting cancels the previous one for the same topic and then
/// waits until that meeting has released its slot. A topic's slot is
/// dropped once its newest meeting ends.
#[derive(Clone, Default)]
pub struct MeetingRegistry {
    slots: Slots,
}

/// Held for the lifetime of a running meeting
pub struct MeetingGuard {
    token: CancellationToken,
    slots: Slots,
    topic: String,
    generation: u64,
    _running: OwnedMutexGuard<()>,
}

impl MeetingGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for MeetingGuard {
    fn drop(&mut self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.get(&self.topic).is_some_and(|slot| slot.generation == self.generation) {
            slots.remove(&self.topic);
        }
    }
}

impl MeetingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new meeting for `topic`, superseding any running one
    ///
    /// Returns `Cancelled` if yet another meeting superseded this one while
    /// it waited for the previous teardown.
    pub async fn begin(&self, topic: &str) -> Result<MeetingGuard, MeetingError> {
        let token = CancellationToken::new();
        let (running, generation) = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = slots.entry(topic.to_owned()).or_insert_with(|| Slot {
                running: Arc::default(),
                token: CancellationToken::new(),
                generation: 0,
            });
            slot.token.cancel();
            slot.token = token.clone();
            slot.generation += 1;
            (Arc::clone(&slot.running), slot.generation)
        };

        let running = running.lock_owned().await;
        if token.is_cancelled() {
            tracing::debug!(topic = %topic, "meeting superseded before start");
            return Err(MeetingError::Cancelled);
        }

        Ok(MeetingGuard {
            token,
            slots: Arc::clone(&self.slots),
            topic: topic.to_owned(),
            generation,
            _running: running,
        })
    }

    /// Cancel the running meeting of `topic`, if any
    pub fn cancel(&self, topic: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get(topic) {
            Some(slot) if !slot.token.is_cancelled() => {
                slot.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Whether a meeting currently holds the slot of `topic`
    pub fn is_running(&self, topic: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(topic).is_some_and(|slot| slot.running.try_lock().is_err())
    }

    /// Cancel every running meeting
    pub fn cancel_all(&self) {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        for slot in slots.values() {
            slot.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn second_meeting_cancels_and_waits_for_first() {
        let registry = MeetingRegistry::new();
        let first = registry.begin("t").await.unwrap();
        assert!(registry.is_running("t"));

        let second = tokio::spawn({
            let registry = registry.clone();
            async move { registry.begin("t").await }
        });

        tokio::time::timeout(Duration::from_secs(1), first.token().cancelled())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.is_finished());

        drop(first);
        let second = second.await.unwrap().unwrap();
        assert!(!second.is_cancelled());
    }

    #[tokio::test]
    async fn superseded_waiter_gives_up() {
        let registry = MeetingRegistry::new();
        let first = registry.begin("t").await.unwrap();

        let second = tokio::spawn({
            let registry = registry.clone();
            async move { registry.begin("t").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let third = tokio::spawn({
            let registry = registry.clone();
            async move { registry.begin("t").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert!(matches!(second.await.unwrap(), Err(MeetingError::Cancelled)));
        assert!(third.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn finished_meeting_releases_its_slot() {
        let registry = MeetingRegistry::new();
        let first = registry.begin("t").await.unwrap();

        let second = tokio::spawn({
            let registry = registry.clone();
            async move { registry.begin("t").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        let second = second.await.unwrap().unwrap();
        assert_eq!(registry.slots.lock().unwrap().len(), 1);

        drop(second);
        assert!(registry.slots.lock().unwrap().is_empty());
        assert!(!registry.is_running("t"));
        assert!(!registry.cancel("t"));

        let third = registry.begin("t").await.unwrap();
        assert!(registry.is_running("t"));
        assert!(!third.is_cancelled());
    }

    #[tokio::test]
    async fn topics_are_independent() {
        let registry = MeetingRegistry::new();
        let a = registry.begin("a").await.unwrap();
        let b = registry.begin("b").await.unwrap();

        assert!(!a.is_cancelled());
        assert!(registry.cancel("b"));
        assert!(b.is_cancelled());
        assert!(!registry.cancel("b"));
        assert!(!registry.cancel("missing"));
    }
}
