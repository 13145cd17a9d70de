use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use hyperscan_config::AppConfig;
use hyperscan_llm::{GenerateRequest, GroundedModel, GroundedResponse, ModelError};
use hyperscan_storage::RecentSearches;

use crate::events::{CANCELLED_MESSAGE, EventSender, FAILURE_MESSAGE, SearchEvent, StatusKind};
use crate::extract::{Extraction, ExtractionError, extract, extract_citations};
use crate::prompt_builder::{PromptInputs, build_search_prompt, normalize_scope};
use crate::session::{SearchSession, SessionSnapshot, SessionStatus};
use crate::ticker::{TickerSettings, spawn_tickers};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search query is empty")]
    EmptyQuery,
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Transport(#[from] ModelError),
}

/// Trimmed query, or [`SearchError::EmptyQuery`] for blank input.
pub fn validate_query(query: &str) -> Result<&str, SearchError> {
    let query = query.trim();
    if query.is_empty() {
        Err(SearchError::EmptyQuery)
    } else {
        Ok(query)
    }
}

/// Owns the current search session, its model call and the recent-search
/// list.  At most one session runs at a time.
pub struct SearchController {
    model: Arc<dyn GroundedModel>,
    config: AppConfig,
    events: EventSender,
    recent: RecentSearches,
    current: Option<Arc<Mutex<SearchSession>>>,
    call: Option<JoinHandle<()>>,
}

impl SearchController {
    pub fn new(
        model: Arc<dyn GroundedModel>,
        config: AppConfig,
        recent: RecentSearches,
        events: EventSender,
    ) -> Self {
        Self {
            model,
            config,
            events,
            recent,
            current: None,
            call: None,
        }
    }

    pub fn recent(&self) -> &RecentSearches {
        &self.recent
    }

    pub fn recent_mut(&mut self) -> &mut RecentSearches {
        &mut self.recent
    }

    /// Start a search, cancelling any running one first.
    ///
    /// Returns `None` without touching any state for a blank query.  An
    /// empty `source_scope` falls back to `search.default_sources`.
    #[instrument(skip(self, source_scope))]
    pub async fn start(&mut self, query: &str, source_scope: Vec<String>) -> Option<Uuid> {
        let query = match validate_query(query) {
            Ok(query) => query.to_string(),
            Err(err) => {
                debug!(error = %err, "ignoring search request");
                return None;
            }
        };

        self.cancel().await;

        if let Err(err) = self.recent.record(&query) {
            warn!(error = %err, "failed to persist recent searches");
        }

        let mut scope = normalize_scope(&source_scope);
        if scope.is_empty() {
            scope = normalize_scope(&self.config.search.default_sources);
        }

        let prompt = build_search_prompt(&PromptInputs::new(&query, &scope, &self.config.search));
        let request = GenerateRequest {
            model: self.config.llm.model.clone(),
            prompt,
            web_search: true,
        };

        let session = SearchSession::new(query.clone(), scope, self.events.clone());
        let session = Arc::new(Mutex::new(session));
        let id = {
            let mut guard = session.lock().await;
            guard.emit(SearchEvent::Started {
                session: guard.id(),
                query: query.clone(),
            });
            guard.attach_tickers(spawn_tickers(Arc::downgrade(&session), self.ticker_settings()));
            info!(session = %guard.id(), scope = ?guard.source_scope, "search started");
            guard.id()
        };

        let model = Arc::clone(&self.model);
        let call_session = Arc::clone(&session);
        self.call = Some(tokio::spawn(async move {
            let outcome = model.generate(&request).await;
            resolve(&call_session, outcome).await;
        }));
        self.current = Some(session);

        Some(id)
    }

    /// Cancel the running search.  Returns `false` when nothing is running.
    ///
    /// The model call is left to finish; its result is discarded.
    pub async fn cancel(&mut self) -> bool {
        let Some(session) = &self.current else {
            return false;
        };
        let mut session = session.lock().await;
        if !session.is_running() {
            return false;
        }
        session.cancel_requested = true;
        session.emit_status(StatusKind::Info, CANCELLED_MESSAGE);
        session.finish(SessionStatus::Cancelled);
        info!(session = %session.id(), "search cancelled");
        true
    }

    pub async fn status(&self) -> SessionStatus {
        match &self.current {
            Some(session) => session.lock().await.status,
            None => SessionStatus::Idle,
        }
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        match &self.current {
            Some(session) => Some(session.lock().await.snapshot()),
            None => None,
        }
    }

    /// Wait for the current model call to resolve.
    pub async fn wait(&mut self) {
        let Some(call) = self.call.take() else {
            return;
        };
        if let Err(err) = call.await {
            if !err.is_cancelled() {
                error!(error = %err, "search task panicked");
            }
        }
    }

    fn ticker_settings(&self) -> TickerSettings {
        TickerSettings {
            elapsed_every: Duration::from_millis(self.config.search.elapsed_tick_ms),
            progress_every: Duration::from_millis(self.config.search.progress_tick_ms),
            progress_step: self.config.progress_step_range(),
        }
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        if let Some(call) = self.call.take() {
            call.abort();
        }
    }
}

/// Apply the model outcome to the session it was issued for.
async fn resolve(session: &Mutex<SearchSession>, outcome: Result<GroundedResponse, ModelError>) {
    let mut session = session.lock().await;
    if session.cancel_requested || !session.is_running() {
        debug!(session = %session.id(), "discarding result of finished search");
        return;
    }
    let id = session.id();

    let response = match outcome {
        Ok(response) => response,
        Err(err) => {
            let err = SearchError::from(err);
            error!(session = %id, error = %err, "model call failed");
            session.emit_status(StatusKind::Error, FAILURE_MESSAGE);
            session.finish(SessionStatus::Failed);
            return;
        }
    };

    let chunks = &response.grounding_chunks;
    let Extraction { offers, citations } = match extract(&response.text, chunks) {
        Ok(extraction) => extraction,
        Err(ExtractionError::NoJsonFound) => {
            debug!(session = %id, "model answered without a JSON array");
            Extraction {
                offers: Vec::new(),
                citations: extract_citations(chunks),
            }
        }
        Err(err) => {
            let err = SearchError::from(err);
            error!(session = %id, error = %err, "could not parse model output");
            session.emit_status(StatusKind::Error, FAILURE_MESSAGE);
            session.finish(SessionStatus::Failed);
            return;
        }
    };

    info!(
        session = %id,
        offers = offers.len(),
        citations = citations.len(),
        "search succeeded"
    );
    session.emit(SearchEvent::Offers { session: id, offers });
    session.emit(SearchEvent::Citations { session: id, citations });
    session.finish(SessionStatus::Succeeded);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Semaphore;

    use hyperscan_storage::{KeyValueStore, MemoryStore};

    use crate::events::{EventReceiver, event_channel};

    const SMARTWATCH_REPLY: &str = r#"Aqui estão as ofertas: [{"name":"Smartwatch NeoPulse","store":"WearableFuture","price":"R$ 1.250,00","link":"https://wearable.com.br/p/neo"},{"name":"Smartwatch NeoPulse","store":"Loja","price":"R$ 1.199,00"}]"#;

    type Reply = fn() -> Result<GroundedResponse, ModelError>;

    struct ScriptedModel {
        gate: Arc<Semaphore>,
        reply: Reply,
        prompts: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GroundedModel for ScriptedModel {
        async fn generate(
            &self,
            request: &GenerateRequest,
        ) -> Result<GroundedResponse, ModelError> {
            assert!(request.web_search);
            self.prompts.lock().unwrap().push(request.prompt.clone());
            self.gate.acquire().await.unwrap().forget();
            (self.reply)()
        }
    }

    fn smartwatch_reply() -> Result<GroundedResponse, ModelError> {
        Ok(GroundedResponse {
            text: SMARTWATCH_REPLY.to_string(),
            grounding_chunks: vec![
                json!({"web": {"uri": "https://wearable.com.br/p/neo", "title": "WearableFuture"}}),
                json!({"web": {"uri": "https://wearable.com.br/p/neo", "title": "Duplicate"}}),
                json!({"web": {"uri": "https://loja.com.br/x"}}),
            ],
        })
    }

    struct Harness {
        controller: SearchController,
        model: Arc<ScriptedModel>,
        store: Arc<MemoryStore>,
        rx: EventReceiver,
    }

    fn harness_with(config: AppConfig, reply: Reply, permits: usize) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let recent = RecentSearches::load(store.clone()).unwrap();
        let model = Arc::new(ScriptedModel {
            gate: Arc::new(Semaphore::new(permits)),
            reply,
            prompts: std::sync::Mutex::new(Vec::new()),
        });
        let (tx, rx) = event_channel();
        let controller = SearchController::new(model.clone(), config, recent, tx);
        Harness {
            controller,
            model,
            store,
            rx,
        }
    }

    fn harness(reply: Reply, permits: usize) -> Harness {
        harness_with(AppConfig::default(), reply, permits)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<SearchEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn idle_count(events: &[SearchEvent], session: Uuid) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, SearchEvent::Idle { session: id } if *id == session))
            .count()
    }

    #[tokio::test]
    async fn blank_query_is_ignored() {
        let mut h = harness(smartwatch_reply, 1);
        assert!(h.controller.start("   \t", vec![]).await.is_none());
        assert_eq!(h.controller.status().await, SessionStatus::Idle);
        assert!(drain(&mut h.rx).is_empty());
        assert!(h.store.is_empty());
        assert!(h.model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_search_publishes_offers_then_citations() {
        let mut h = harness(smartwatch_reply, 1);
        let id = h.controller.start("  smartwatch ", vec![]).await.unwrap();
        h.controller.wait().await;

        assert_eq!(h.controller.status().await, SessionStatus::Succeeded);
        assert_eq!(h.controller.recent().items()[0], "Smartwatch");

        let events = drain(&mut h.rx);
        // Only the recent-search tag is capitalised; the session keeps the trimmed query.
        assert_eq!(
            events[0],
            SearchEvent::Started {
                session: id,
                query: "smartwatch".to_string(),
            }
        );

        let offers_at = events
            .iter()
            .position(|event| matches!(event, SearchEvent::Offers { .. }))
            .unwrap();
        let citations_at = events
            .iter()
            .position(|event| matches!(event, SearchEvent::Citations { .. }))
            .unwrap();
        assert!(offers_at < citations_at);

        let SearchEvent::Offers { offers, .. } = &events[offers_at] else {
            unreachable!()
        };
        assert_eq!(offers.len(), 1, "element without link is dropped");
        assert_eq!(offers[0].store, "WearableFuture");

        let SearchEvent::Citations { citations, .. } = &events[citations_at] else {
            unreachable!()
        };
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].title, "WearableFuture");
        assert_eq!(citations[1].title, "loja.com.br");

        assert_eq!(idle_count(&events, id), 1);
        assert!(matches!(events.last(), Some(SearchEvent::Idle { .. })));
        assert!(!events.iter().any(|event| matches!(event, SearchEvent::Status { .. })));
    }

    #[tokio::test]
    async fn reply_without_brackets_is_an_empty_success() {
        fn reply() -> Result<GroundedResponse, ModelError> {
            Ok(GroundedResponse {
                text: "Não encontrei ofertas confiáveis para este produto.".to_string(),
                grounding_chunks: vec![json!({"web": {"uri": "https://a.com.br", "title": "A"}})],
            })
        }
        let mut h = harness(reply, 1);
        let id = h.controller.start("Smartwatch", vec![]).await.unwrap();
        h.controller.wait().await;

        assert_eq!(h.controller.status().await, SessionStatus::Succeeded);
        let events = drain(&mut h.rx);
        assert!(events.contains(&SearchEvent::Offers {
            session: id,
            offers: vec![]
        }));
        assert!(events.iter().any(|event| matches!(
            event,
            SearchEvent::Citations { citations, .. } if citations.len() == 1
        )));
        assert!(!events.iter().any(|event| matches!(event, SearchEvent::Status { .. })));
        assert_eq!(idle_count(&events, id), 1);
    }

    #[tokio::test]
    async fn malformed_json_fails_with_generic_message() {
        fn reply() -> Result<GroundedResponse, ModelError> {
            Ok(GroundedResponse {
                text: r#"[{"name": "X", "store": ]"#.to_string(),
                grounding_chunks: vec![],
            })
        }
        let mut h = harness(reply, 1);
        let id = h.controller.start("Smartwatch", vec![]).await.unwrap();
        h.controller.wait().await;

        assert_eq!(h.controller.status().await, SessionStatus::Failed);
        let events = drain(&mut h.rx);
        assert!(events.contains(&SearchEvent::Status {
            session: id,
            kind: StatusKind::Error,
            message: FAILURE_MESSAGE.to_string(),
        }));
        assert!(!events.iter().any(|event| matches!(event, SearchEvent::Offers { .. })));
        assert_eq!(idle_count(&events, id), 1);
    }

    #[tokio::test]
    async fn transport_error_detail_is_not_shown() {
        fn reply() -> Result<GroundedResponse, ModelError> {
            Err(ModelError::MissingApiKey)
        }
        let mut h = harness(reply, 1);
        let id = h.controller.start("Smartwatch", vec![]).await.unwrap();
        h.controller.wait().await;

        assert_eq!(h.controller.status().await, SessionStatus::Failed);
        let events = drain(&mut h.rx);
        let messages: Vec<&str> = events
            .iter()
            .filter_map(|event| match event {
                SearchEvent::Status { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(messages, [FAILURE_MESSAGE]);
        assert_eq!(idle_count(&events, id), 1);
    }

    #[tokio::test]
    async fn cancel_before_resolution_suppresses_results() {
        let mut h = harness(smartwatch_reply, 0);
        let id = h.controller.start("Smartwatch", vec![]).await.unwrap();

        assert!(h.controller.cancel().await);
        let snapshot = h.controller.snapshot().await.unwrap();
        assert!(snapshot.cancel_requested);
        assert_eq!(snapshot.status, SessionStatus::Cancelled);

        h.model.gate.add_permits(1);
        h.controller.wait().await;

        assert_eq!(h.controller.status().await, SessionStatus::Cancelled);
        let events = drain(&mut h.rx);
        assert!(!events.iter().any(|event| matches!(event, SearchEvent::Offers { .. })));
        assert!(!events.iter().any(|event| matches!(event, SearchEvent::Citations { .. })));
        assert!(events.contains(&SearchEvent::Status {
            session: id,
            kind: StatusKind::Info,
            message: CANCELLED_MESSAGE.to_string(),
        }));
        assert_eq!(idle_count(&events, id), 1);
    }

    #[tokio::test]
    async fn cancel_when_idle_is_a_no_op() {
        let mut h = harness(smartwatch_reply, 1);
        assert!(!h.controller.cancel().await);

        h.controller.start("Smartwatch", vec![]).await.unwrap();
        h.controller.wait().await;
        drain(&mut h.rx);

        assert!(!h.controller.cancel().await);
        assert_eq!(h.controller.status().await, SessionStatus::Succeeded);
        assert!(drain(&mut h.rx).is_empty());
    }

    #[tokio::test]
    async fn new_search_cancels_the_running_one() {
        let mut h = harness(smartwatch_reply, 0);
        let first = h.controller.start("Smartwatch", vec![]).await.unwrap();
        let second = h.controller.start("Smartphone", vec![]).await.unwrap();
        assert_ne!(first, second);

        h.model.gate.add_permits(2);
        h.controller.wait().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let events = drain(&mut h.rx);
        assert!(events.contains(&SearchEvent::Status {
            session: first,
            kind: StatusKind::Info,
            message: CANCELLED_MESSAGE.to_string(),
        }));
        let offers_for = |id: Uuid| {
            events
                .iter()
                .any(|event| matches!(event, SearchEvent::Offers { session, .. } if *session == id))
        };
        assert!(!offers_for(first));
        assert!(offers_for(second));
        assert_eq!(idle_count(&events, first), 1);
        assert_eq!(idle_count(&events, second), 1);
        assert_eq!(h.controller.recent().items()[..2], ["Smartphone", "Smartwatch"]);
    }

    #[tokio::test]
    async fn tickers_run_until_cancel() {
        let mut config = AppConfig::default();
        config.search.elapsed_tick_ms = 10;
        config.search.progress_tick_ms = 5;
        let mut h = harness_with(config, smartwatch_reply, 0);
        h.controller.start("Smartwatch", vec![]).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        let running = h.controller.snapshot().await.unwrap();
        assert!(running.elapsed_seconds >= 1);
        assert!(running.progress_count >= 100);

        h.controller.cancel().await;
        let frozen = h.controller.snapshot().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let later = h.controller.snapshot().await.unwrap();
        assert_eq!(frozen.elapsed_seconds, later.elapsed_seconds);
        assert_eq!(frozen.progress_count, later.progress_count);

        let events = drain(&mut h.rx);
        let last_progress = events
            .iter()
            .rposition(|event| matches!(event, SearchEvent::Progress { .. }))
            .unwrap();
        let idle = events
            .iter()
            .position(|event| matches!(event, SearchEvent::Idle { .. }))
            .unwrap();
        assert!(last_progress < idle);
    }

    #[tokio::test]
    async fn empty_scope_uses_configured_default_sources() {
        let mut config = AppConfig::default();
        config.search.default_sources = vec!["Amazon".to_string(), " ".to_string()];
        // One permit per model call.
        let mut h = harness_with(config, smartwatch_reply, 2);

        h.controller.start("Smartwatch", vec!["  ".to_string()]).await.unwrap();
        h.controller.wait().await;
        assert_eq!(h.controller.snapshot().await.unwrap().source_scope, ["Amazon"]);

        h.controller
            .start("Smartwatch", vec!["Kabum".to_string()])
            .await
            .unwrap();
        h.controller.wait().await;

        assert_eq!(h.controller.status().await, SessionStatus::Succeeded);
        let prompts = h.model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("SOMENTE nestas fontes: Amazon."));
        assert!(prompts[1].contains("SOMENTE nestas fontes: Kabum."));
        assert!(prompts[0].contains("\"Smartwatch\""));
    }

    #[tokio::test]
    async fn recent_persist_failure_does_not_block_search() {
        struct FailingStore;
        impl KeyValueStore for FailingStore {
            fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
                Ok(None)
            }
            fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
                anyhow::bail!("disk full")
            }
            fn remove(&self, _key: &str) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let recent = RecentSearches::load(Arc::new(FailingStore)).unwrap();
        let model = Arc::new(ScriptedModel {
            gate: Arc::new(Semaphore::new(1)),
            reply: smartwatch_reply,
            prompts: std::sync::Mutex::new(Vec::new()),
        });
        let (tx, _rx) = event_channel();
        let mut controller = SearchController::new(model, AppConfig::default(), recent, tx);

        controller.start("Smartwatch", vec![]).await.unwrap();
        controller.wait().await;
        assert_eq!(controller.status().await, SessionStatus::Succeeded);
        assert_eq!(controller.recent().items()[0], "Smartphone");
    }
}
