//! Council wiring for integration tests, assembled the way the binary does it

use std::sync::{Arc, Mutex};

use council_config::Config;
use council_llm::LlmState;
use council_meeting::{Collaborators, MeetingEvent, MeetingRequest, Orchestrator, TranscriptStore};
use council_memory::{LlmSummarizer, MemoryManager, MemoryStore, Summarizer, TopicMemory};
use council_tools::{McpManager, StaticMarketData, StockSnapshot, ToolRegistry};
use tokio::task::JoinHandle;

/// A running orchestrator plus everything it published
pub struct TestCouncil {
    pub orchestrator: Orchestrator,
    pub config: Config,
    events: Arc<Mutex<Vec<MeetingEvent>>>,
    collector: JoinHandle<()>,
}

impl TestCouncil {
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let llm = LlmState::from_config(&config.llm).await?;

        let summarizer = llm
            .resolve(config.memory.provider.as_deref())
            .map(|provider| Arc::new(LlmSummarizer::new(provider)) as Arc<dyn Summarizer>);
        let memory = MemoryManager::new(
            config.memory.clone(),
            MemoryStore::new(config.storage.memory_dir()),
            summarizer,
        );

        let market = StaticMarketData {
            quotes: vec![stock()],
            indices: Vec::new(),
        };

        let (orchestrator, mut rx) = Orchestrator::new(
            config.meeting.clone(),
            Collaborators {
                llm,
                tools: ToolRegistry::with_market_data(Arc::new(market)),
                mcp: McpManager::new(&config.mcp),
                memory: Arc::new(memory),
                transcripts: TranscriptStore::new(config.storage.transcripts_dir()),
            },
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let collector = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sink.lock().unwrap().push(event);
            }
        });

        Ok(Self {
            orchestrator,
            config,
            events,
            collector,
        })
    }

    /// Events received so far
    pub fn events(&self) -> Vec<MeetingEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Stored memory of a topic, read straight from disk
    pub async fn stored_memory(&self, topic: &str) -> Option<TopicMemory> {
        MemoryStore::new(self.config.storage.memory_dir())
            .load(topic)
            .await
            .unwrap()
    }
}

impl Drop for TestCouncil {
    fn drop(&mut self) {
        self.collector.abort();
    }
}

pub fn stock() -> StockSnapshot {
    StockSnapshot {
        symbol: "sh600519".into(),
        name: "贵州茅台".into(),
        price: 1688.0,
        change_percent: 1.25,
        ..StockSnapshot::default()
    }
}

pub fn request(query: &str) -> MeetingRequest {
    MeetingRequest {
        topic: "600519".into(),
        stock: stock(),
        query: query.into(),
        ..MeetingRequest::default()
    }
}
