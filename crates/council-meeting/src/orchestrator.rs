//! Meeting dispatch: participant selection, concurrent rounds, persistence

use std::fmt::Write as _;
use std::sync::Arc;

use council_config::{AgentConfig, MeetingConfig};
use council_llm::{LlmState, Provider};
use council_memory::{MemoryContext, MemoryManager, RoundEntry, RoundRecord};
use council_tools::{McpManager, ToolBox, ToolRegistry};
use futures_util::future::join_all;
use jiff::Timestamp;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::agents::Panel;
use crate::error::MeetingError;
use crate::events::EventSink;
use crate::instruction::{InstructionContext, exchange_now};
use crate::message::{ChatMessage, MeetingEvent, MeetingRequest, MessageKind, ProgressKind, USER_AGENT_ID, USER_AGENT_NAME};
use crate::moderator;
use crate::registry::MeetingRegistry;
use crate::transcript::TranscriptStore;
use crate::turn::{AgentReply, AgentTurn};

const MAX_ATTEMPTS: u32 = 2;

/// Services a meeting draws on
pub struct Collaborators {
    pub llm: LlmState,
    pub tools: ToolRegistry,
    pub mcp: McpManager,
    pub memory: Arc<MemoryManager>,
    pub transcripts: TranscriptStore,
}

/// Result of a completed meeting
#[derive(Debug)]
pub struct MeetingOutcome {
    /// Agent messages in round order
    pub messages: Vec<ChatMessage>,
    /// Background memory update, if any rounds produced replies
    pub memory: Option<JoinHandle<()>>,
}

/// Runs meetings and publishes their events
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    config: MeetingConfig,
    panel: Panel,
    llm: LlmState,
    tools: ToolRegistry,
    mcp: McpManager,
    memory: Arc<MemoryManager>,
    transcripts: TranscriptStore,
    registry: MeetingRegistry,
    events: mpsc::Sender<MeetingEvent>,
}

struct Participants {
    seats: Vec<(AgentConfig, Arc<dyn Provider>)>,
    rounds: u32,
}

/// One agent's slot in a round
struct Seat<'a> {
    agent: &'a AgentConfig,
    provider: Arc<dyn Provider>,
    round: u32,
    quoted: Option<String>,
    reply_to: Option<&'a str>,
}

impl Seat<'_> {
    fn message(&self, content: String, kind: MessageKind) -> ChatMessage {
        let mut message = ChatMessage::new(&self.agent.id, &self.agent.name, &self.agent.role, content);
        message.kind = kind;
        message.round = self.round;
        message.reply_to = self.reply_to.map(str::to_owned);
        message
    }
}

impl Orchestrator {
    /// Build the orchestrator and the receiving end of its event channel
    pub fn new(config: MeetingConfig, collaborators: Collaborators) -> (Self, mpsc::Receiver<MeetingEvent>) {
        let (tx, rx) = mpsc::channel(config.event_buffer.max(1));
        let Collaborators {
            llm,
            tools,
            mcp,
            memory,
            transcripts,
        } = collaborators;

        let inner = OrchestratorInner {
            panel: Panel::from_config(&config),
            config,
            llm,
            tools,
            mcp,
            memory,
            transcripts,
            registry: MeetingRegistry::new(),
            events: tx,
        };
        (Self { inner: Arc::new(inner) }, rx)
    }

    pub fn panel(&self) -> &Panel {
        &self.inner.panel
    }

    /// Persisted messages of a topic
    pub async fn transcript(&self, topic: &str) -> Result<Vec<ChatMessage>, MeetingError> {
        Ok(self.inner.transcripts.load(topic).await?)
    }

    /// Cancel the running meeting of a topic
    pub fn cancel(&self, topic: &str) -> bool {
        self.inner.registry.cancel(topic)
    }

    /// Cancel every running meeting
    pub fn shutdown(&self) {
        self.inner.registry.cancel_all();
    }

    /// Cancel any meeting on `topic`, then delete its transcript and memory
    pub async fn forget(&self, topic: &str) -> Result<(), MeetingError> {
        let _guard = self.inner.registry.begin(topic).await?;
        self.inner.transcripts.clear(topic).await?;
        self.inner.memory.delete(topic).await?;
        tracing::info!(topic = %topic, "topic forgotten");
        Ok(())
    }

    /// Run one meeting for a user query
    ///
    /// Supersedes a meeting already running on the same topic. Returns
    /// `Cancelled` when this meeting is itself superseded.
    pub async fn ask(&self, request: MeetingRequest) -> Result<MeetingOutcome, MeetingError> {
        let inner = &self.inner;
        let topic = request.topic.as_str();
        let guard = inner.registry.begin(topic).await?;
        let events = EventSink::new(topic, inner.events.clone(), guard.token().clone());

        let mentions = self.mentions(&request);
        let mut user = ChatMessage::new(USER_AGENT_ID, USER_AGENT_NAME, "", request.query.clone());
        user.reply_to.clone_from(&request.reply_to);
        user.mentions.clone_from(&mentions);
        inner.transcripts.append(topic, &user).await?;
        events.message(user).await;

        let directed = !mentions.is_empty();
        let Participants { seats: bound, rounds } = self.participants(&request, &mentions, guard.token()).await?;

        tracing::info!(
            topic = %topic,
            mode = if directed { "directed" } else { "open" },
            agents = bound.len(),
            rounds,
            "meeting started"
        );

        let memory = match inner.memory.relevant_context(topic, &request.query).await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "memory unavailable for this meeting");
                MemoryContext::default()
            }
        };

        let reply_to = if directed { request.reply_to.as_deref() } else { None };
        let mut messages = Vec::new();
        let mut records: Vec<RoundRecord> = Vec::new();
        let mut writer = MemoryWriter::new(topic, &inner.memory);

        for round in 1..=rounds {
            let previous = records.last().map(|record| record.entries.as_slice());
            let seats = bound.iter().map(|(agent, provider)| Seat {
                agent,
                provider: Arc::clone(provider),
                round,
                quoted: match previous {
                    Some(entries) => peer_quote(entries, &agent.id),
                    None => request.reply_content.clone().filter(|quoted| !quoted.is_empty()),
                },
                reply_to,
            });

            let spoken = join_all(seats.map(|seat| self.speak(&events, &request, &memory, seat))).await;
            if guard.is_cancelled() {
                tracing::info!(topic = %topic, round, "meeting cancelled");
                return Err(MeetingError::Cancelled);
            }

            let spoken: Vec<ChatMessage> = spoken.into_iter().flatten().collect();
            records.push(RoundRecord {
                round,
                query: request.query.clone(),
                entries: spoken
                    .iter()
                    .filter(|message| message.kind == MessageKind::Normal)
                    .map(|message| RoundEntry {
                        agent_id: message.agent_id.clone(),
                        agent_name: message.agent_name.clone(),
                        role: message.role.clone(),
                        content: message.content.clone(),
                    })
                    .collect(),
                timestamp: Timestamp::now(),
            });
            if let Some(record) = records.last() {
                writer.record(record);
            }
            messages.extend(spoken);
        }

        tracing::info!(topic = %topic, messages = messages.len(), "meeting finished");

        Ok(MeetingOutcome {
            messages,
            memory: writer.finish(),
        })
    }

    /// Agents taking part and their bindings
    ///
    /// Directed meetings run one round with the mentioned agents; open
    /// meetings let the moderator choose. Every binding is resolved before
    /// any agent runs.
    async fn participants(
        &self,
        request: &MeetingRequest,
        mentions: &[String],
        token: &CancellationToken,
    ) -> Result<Participants, MeetingError> {
        let inner = &self.inner;
        let (agents, rounds) = if mentions.is_empty() {
            let moderator = inner
                .llm
                .resolve(inner.config.moderator.as_deref())
                .ok_or_else(|| MeetingError::ConfigurationMissing("moderator".into()))?;
            let selection = moderator::select(
                moderator.as_ref(),
                &inner.panel,
                &request.stock,
                &request.query,
                inner.config.max_rounds,
                token,
            )
            .await?;
            (selection.agents, selection.rounds)
        } else {
            (inner.panel.select(mentions), 1)
        };

        let mut seats = Vec::with_capacity(agents.len());
        for agent in agents {
            let provider = inner
                .llm
                .resolve(agent.provider.as_deref())
                .ok_or_else(|| MeetingError::ConfigurationMissing(format!("agent {}", agent.id)))?;
            seats.push((agent, provider));
        }
        Ok(Participants { seats, rounds })
    }

    /// Explicit mentions followed by `@` mentions in the query, known agents only
    fn mentions(&self, request: &MeetingRequest) -> Vec<String> {
        let panel = &self.inner.panel;
        let explicit = request.mentions.iter().filter_map(|id| panel.get(id)).map(|agent| agent.id.clone());
        let mut ids: Vec<String> = Vec::new();
        for id in explicit.chain(panel.mentions(&request.query)) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// One agent's turn with a single retry; returns the messages it persisted
    async fn speak(
        &self,
        events: &EventSink,
        request: &MeetingRequest,
        memory: &MemoryContext,
        seat: Seat<'_>,
    ) -> Vec<ChatMessage> {
        let inner = &self.inner;
        let agent = seat.agent;
        let token = events.token();
        if token.is_cancelled() {
            return Vec::new();
        }
        events.progress(&agent.id, seat.round, ProgressKind::AgentStart).await;

        let toolsets = tokio::select! {
            biased;
            () = token.cancelled() => return Vec::new(),
            toolsets = inner.mcp.toolsets_for(&agent.mcp_servers) => toolsets,
        };
        let tools = ToolBox::new(inner.tools.select(&agent.tools), &toolsets);

        let instruction = InstructionContext {
            agent,
            tools: &tools,
            stock: &request.stock,
            position: request.position,
            memory,
            query: &request.query,
            reply_content: seat.quoted.as_deref(),
            now: exchange_now(),
        }
        .render();

        let turn = AgentTurn {
            agent_id: &agent.id,
            round: seat.round,
            provider: Arc::clone(&seat.provider),
            tools: &tools,
            instruction: &instruction,
            query: &request.query,
            max_tool_iterations: inner.config.max_tool_iterations,
            events,
        };
        let outcome = attempt(&turn, &agent.id).await;

        for toolset in toolsets {
            toolset.shutdown().await;
        }

        let mut spoken = Vec::new();
        match outcome {
            None => return spoken,
            Some(Ok(AgentReply { content, tools_used })) => {
                if !tools_used.is_empty() {
                    let notice = format!("调用工具：{}", tools_used.join("、"));
                    spoken.push(seat.message(notice, MessageKind::ToolNotice));
                }
                spoken.push(seat.message(content, MessageKind::Normal));
            }
            Some(Err(e)) => {
                let notice = format!("发言失败：{e}");
                spoken.push(seat.message(notice, MessageKind::Error));
            }
        }

        for message in &spoken {
            if let Err(e) = inner.transcripts.append(&request.topic, message).await {
                tracing::error!(topic = %request.topic, agent = %agent.id, error = %e, "failed to persist message");
            }
            events.message(message.clone()).await;
        }
        events.progress(&agent.id, seat.round, ProgressKind::AgentDone).await;
        spoken
    }
}

/// Feeds each completed round to memory as soon as it ends
///
/// Rounds are appended in order by one background task, started on the
/// first round with replies. Dropping the writer lets the task finish the
/// rounds already sent.
struct MemoryWriter {
    topic: String,
    memory: Option<Arc<MemoryManager>>,
    queue: Option<(mpsc::UnboundedSender<RoundRecord>, JoinHandle<()>)>,
}

impl MemoryWriter {
    fn new(topic: &str, memory: &Arc<MemoryManager>) -> Self {
        Self {
            topic: topic.to_owned(),
            memory: memory.config().enabled.then(|| Arc::clone(memory)),
            queue: None,
        }
    }

    fn record(&mut self, record: &RoundRecord) {
        if record.entries.is_empty() {
            return;
        }
        let Some(memory) = &self.memory else {
            return;
        };

        let (tx, _) = self.queue.get_or_insert_with(|| {
            let (tx, mut rx) = mpsc::unbounded_channel::<RoundRecord>();
            let memory = Arc::clone(memory);
            let topic = self.topic.clone();
            let task = tokio::spawn(async move {
                while let Some(record) = rx.recv().await {
                    let round = record.round;
                    if let Err(e) = memory.append_round(&topic, record).await {
                        tracing::warn!(topic = %topic, round, error = %e, "failed to update memory");
                    }
                }
            });
            (tx, task)
        });
        if tx.send(record.clone()).is_err() {
            tracing::warn!(topic = %self.topic, round = record.round, "memory writer stopped");
        }
    }

    /// Background task appending the sent rounds, if any were sent
    fn finish(self) -> Option<JoinHandle<()>> {
        self.queue.map(|(_, task)| task)
    }
}

/// Run a turn, retrying once; `None` when the meeting was cancelled
async fn attempt(turn: &AgentTurn<'_>, agent_id: &str) -> Option<Result<AgentReply, MeetingError>> {
    let token = turn.events.token();
    let mut tries = 0;
    loop {
        tries += 1;
        match turn.run().await {
            Ok(reply) => return Some(Ok(reply)),
            Err(_) if token.is_cancelled() => return None,
            Err(MeetingError::Cancelled) => return None,
            Err(e) if tries < MAX_ATTEMPTS => {
                tracing::warn!(agent = %agent_id, error = %e, retryable = e.is_retryable(), "agent turn failed, retrying");
            }
            Err(e) => {
                tracing::error!(agent = %agent_id, error = %e, "agent turn failed");
                return Some(Err(e));
            }
        }
    }
}

/// Replies of the other agents in a round, formatted as a quote
fn peer_quote(entries: &[RoundEntry], agent_id: &str) -> Option<String> {
    let mut quote = String::new();
    for entry in entries.iter().filter(|entry| entry.agent_id != agent_id) {
        if !quote.is_empty() {
            quote.push_str("\n\n");
        }
        let _ = write!(quote, "{}（{}）：{}", entry.agent_name, entry.role, entry.content);
    }
    (!quote.is_empty()).then_some(quote)
}
