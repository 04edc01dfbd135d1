//! Observer channel

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::message::{ChatMessage, MeetingEvent, Progress, ProgressKind};

/// Sends one meeting's events, going quiet once the meeting is cancelled
#[derive(Clone)]
pub(crate) struct EventSink {
    topic: String,
    tx: mpsc::Sender<MeetingEvent>,
    token: CancellationToken,
}

impl EventSink {
    pub(crate) fn new(topic: &str, tx: mpsc::Sender<MeetingEvent>, token: CancellationToken) -> Self {
        Self {
            topic: topic.to_owned(),
            tx,
            token,
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) async fn progress(&self, agent_id: &str, round: u32, kind: ProgressKind) {
        let progress = Progress {
            agent_id: agent_id.to_owned(),
            round,
            kind,
        };
        self.send(MeetingEvent::Progress {
            topic: self.topic.clone(),
            progress,
        })
        .await;
    }

    pub(crate) async fn message(&self, message: ChatMessage) {
        self.send(MeetingEvent::Message {
            topic: self.topic.clone(),
            message,
        })
        .await;
    }

    async fn send(&self, event: MeetingEvent) {
        tokio::select! {
            biased;
            () = self.token.cancelled() => {}
            sent = self.tx.send(event) => {
                if sent.is_err() {
                    tracing::trace!(topic = %self.topic, "event receiver dropped");
                }
            }
        }
    }
}
