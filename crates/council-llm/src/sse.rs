//! Shared server-sent-event plumbing for streaming adapters

use std::collections::VecDeque;
use std::pin::Pin;

use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures_util::{Stream, StreamExt};

use crate::error::LlmError;
use crate::provider::ResponseStream;
use crate::types::{Aggregate, GenerateResponse};

/// Backend-specific event interpretation
pub(crate) trait StreamDecoder: Send + 'static {
    /// Handle one event and return the increments it produces
    ///
    /// `event` is the SSE event name, `"message"` when the backend sends none.
    fn on_event(&mut self, event: &str, data: &str) -> Result<Vec<GenerateResponse>, LlmError>;

    /// Increments released once the stream has closed, before the aggregate
    fn drain(&mut self) -> Vec<GenerateResponse> {
        Vec::new()
    }

    /// Assemble the terminal aggregate after the stream has closed
    fn finish(&mut self) -> Result<Aggregate, LlmError>;
}

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, EventStreamError<reqwest::Error>>> + Send>>;

struct DecodeState<D> {
    events: EventStream,
    decoder: D,
    pending: VecDeque<Result<GenerateResponse, LlmError>>,
    closed: bool,
}

/// Drive `decoder` over the SSE body of `response`
///
/// Yields the decoder's increments as they arrive, then exactly one
/// `Final` once the body ends. The first error ends the stream.
pub(crate) fn decode_sse<D: StreamDecoder>(response: reqwest::Response, decoder: D) -> ResponseStream {
    let state = DecodeState {
        events: Box::pin(response.bytes_stream().eventsource()),
        decoder,
        pending: VecDeque::new(),
        closed: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.closed {
                return None;
            }

            match state.events.next().await {
                Some(Ok(event)) => {
                    let data = event.data.trim();
                    if data.is_empty() || data == "[DONE]" {
                        continue;
                    }
                    match state.decoder.on_event(&event.event, data) {
                        Ok(items) => state.pending.extend(items.into_iter().map(Ok)),
                        Err(e) => {
                            state.closed = true;
                            state.pending.push_back(Err(e));
                        }
                    }
                }
                Some(Err(e)) => {
                    state.closed = true;
                    state.pending.push_back(Err(stream_error(e)));
                }
                None => {
                    state.closed = true;
                    state.pending.extend(state.decoder.drain().into_iter().map(Ok));
                    state.pending.push_back(state.decoder.finish().map(GenerateResponse::Final));
                }
            }
        }
    }))
}

fn stream_error(e: EventStreamError<reqwest::Error>) -> LlmError {
    match e {
        EventStreamError::Transport(e) => LlmError::from(e),
        other => LlmError::Protocol(other.to_string()),
    }
}

/// Deserialize one event payload
pub(crate) fn parse_event<T: serde::de::DeserializeOwned>(data: &str) -> Result<T, LlmError> {
    serde_json::from_str(data).map_err(|e| LlmError::Protocol(format!("malformed stream event: {e}")))
}
