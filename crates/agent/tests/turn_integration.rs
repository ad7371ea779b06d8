//! End-to-end turns through the orchestrator with scripted tools.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tripclaw_agent::{
    CompactionStage, ContextWindowManager, ConversationMode, DirectiveStage, ExtractiveSummarizer, Flow,
    Middleware, Orchestrator, Pipeline, TurnContext, TurnRequest,
};
use tripclaw_core::checkpoint::CheckpointStatus;
use tripclaw_core::error::{CompactionError, MiddlewareError, ToolError};
use tripclaw_core::event::{DomainEvent, EventBus};
use tripclaw_core::message::Message;
use tripclaw_core::preference::{Budget, Interest, Pace, TravelMode};
use tripclaw_core::session::{SessionState, SessionStore};
use tripclaw_core::summarizer::Summarizer;
use tripclaw_core::tool::{ParamType, Tool, ToolKind, ToolRegistry, ToolResult, ToolSchema};
use tripclaw_session::{FileSessionStore, InMemorySessionStore};

// --- Scripted tools ---

struct Poi {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for Poi {
    fn name(&self) -> &str {
        "poi_search"
    }
    fn kind(&self) -> ToolKind {
        ToolKind::Geo
    }
    fn description(&self) -> &str {
        "scripted"
    }
    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("city", ParamType::String, "")
            .required("keywords", ParamType::String, "")
            .optional("limit", ParamType::Integer, "")
    }
    async fn invoke(&self, args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let kw = args["keywords"].as_str().unwrap_or_default();
        let pois: Vec<Value> = (1..=3)
            .map(|i| json!({ "name": format!("{kw} {i}"), "address": format!("{i} Fuzhou Rd"), "rating": 4.5 }))
            .collect();
        Ok(ToolResult::ok(json!({ "city": args["city"], "keywords": kw, "pois": pois })))
    }
}

struct Search;

#[async_trait]
impl Tool for Search {
    fn name(&self) -> &str {
        "web_search"
    }
    fn kind(&self) -> ToolKind {
        ToolKind::Search
    }
    fn description(&self) -> &str {
        "scripted"
    }
    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("query", ParamType::String, "")
            .optional("num_results", ParamType::Integer, "")
    }
    async fn invoke(&self, args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(json!({
            "query": args["query"],
            "results": [{ "title": "Visitor notes", "url": "https://example.com", "snippet": "Calm in the morning." }],
        })))
    }
}

/// Hotels from 2 to 5 stars; can be switched off to fail the hotel step.
struct Hotels {
    down: Arc<AtomicBool>,
}

#[async_trait]
impl Tool for Hotels {
    fn name(&self) -> &str {
        "hotel_search"
    }
    fn kind(&self) -> ToolKind {
        ToolKind::Hotel
    }
    fn description(&self) -> &str {
        "scripted"
    }
    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("place", ParamType::String, "")
            .optional("star_min", ParamType::Number, "")
            .optional("star_max", ParamType::Number, "")
            .optional("keywords", ParamType::Array, "")
            .optional("size", ParamType::Integer, "")
    }
    async fn invoke(&self, _args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(ToolError::ExecutionFailed {
                tool_name: "hotel_search".into(),
                reason: "hotel service unavailable".into(),
            });
        }
        let hotels: Vec<Value> = [2.0, 3.0, 4.0, 4.5, 5.0]
            .iter()
            .map(|s| json!({ "name": format!("Hotel {s}"), "stars": s, "price": s * 150.0 }))
            .collect();
        Ok(ToolResult::ok(json!({ "hotels": hotels })))
    }
}

struct Route;

#[async_trait]
impl Tool for Route {
    fn name(&self) -> &str {
        "route_directions"
    }
    fn kind(&self) -> ToolKind {
        ToolKind::Geo
    }
    fn description(&self) -> &str {
        "scripted"
    }
    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("origin", ParamType::String, "")
            .required("destination", ParamType::String, "")
            .required("mode", ParamType::String, "")
            .one_of(&["walking", "transit", "driving"])
            .optional("city", ParamType::String, "")
    }
    async fn invoke(&self, args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(json!({
            "origin": args["origin"],
            "destination": args["destination"],
            "mode": args["mode"],
            "distance_m": 900,
            "duration_min": 12,
        })))
    }
}

struct Harness {
    orchestrator: Orchestrator,
    store: Arc<dyn SessionStore>,
    poi_calls: Arc<AtomicUsize>,
    hotels_down: Arc<AtomicBool>,
}

fn harness() -> Harness {
    let poi_calls = Arc::new(AtomicUsize::new(0));
    let hotels_down = Arc::new(AtomicBool::new(false));
    let mut tools = ToolRegistry::new();
    tools.register(Box::new(Poi { calls: poi_calls.clone() }));
    tools.register(Box::new(Search));
    tools.register(Box::new(Hotels { down: hotels_down.clone() }));
    tools.register(Box::new(Route));

    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let orchestrator = Orchestrator::new(store.clone(), Arc::new(tools), Arc::new(EventBus::default())).unwrap();
    Harness {
        orchestrator,
        store,
        poi_calls,
        hotels_down,
    }
}

async fn say(orch: &Orchestrator, session: &str, text: &str) -> tripclaw_agent::TurnResponse {
    orch.handle_turn(TurnRequest::new(session, text)).await.unwrap()
}

// --- Planning ---

#[tokio::test]
async fn shanghai_trip_uses_stated_preferences() {
    let h = harness();
    let orch = &h.orchestrator;

    let resp = say(
        orch,
        "trip",
        "I like history and food, I prefer walking, a relaxed pace and comfort hotels",
    )
    .await;
    assert_eq!(resp.mode, ConversationMode::PreferenceElicitation);
    assert!(resp.assistant_text.starts_with("Noted."));

    let resp = say(orch, "trip", "Plan two days in Shanghai").await;
    assert_eq!(resp.checkpoint_status, Some(CheckpointStatus::Completed));
    assert!(resp.assistant_text.contains("# Shanghai travel plan"));
    assert!(!resp.tool_trace.is_empty());

    let session = orch.session("trip").await.unwrap();
    let cp = session.checkpoint.unwrap();
    assert_eq!(cp.input.days, 2);

    for hotel in cp.output("recommend_hotels").unwrap().payload["hotels"].as_array().unwrap() {
        let stars = hotel["stars"].as_f64().unwrap();
        assert!((3.0..=4.5).contains(&stars), "{stars}");
    }
    let route = cp.output("plan_route").unwrap();
    assert!(route.degraded.is_none());
    for leg in route.payload["legs"].as_array().unwrap() {
        assert_eq!(leg["mode"], "walking");
    }

    assert_eq!(session.preferences.pace, Pace::Relaxed);
    let itinerary = cp.output("synthesize_result").unwrap().payload["itinerary"].clone();
    let itinerary = itinerary.as_array().unwrap();
    assert_eq!(itinerary.len(), 2);
    for day in itinerary {
        assert!(day["stops"].as_array().unwrap().len() <= 3, "{day}");
    }
}

#[tokio::test]
async fn completed_plan_reply_keeps_every_review_line() {
    let h = harness();
    let orch = &h.orchestrator;
    say(orch, "trip", "I like history and food").await;
    let resp = say(orch, "trip", "Plan two days in Shanghai").await;
    assert_eq!(resp.checkpoint_status, Some(CheckpointStatus::Completed));

    let session = orch.session("trip").await.unwrap();
    let cp = session.checkpoint.as_ref().unwrap();
    let summary = cp.output("synthesize_result").unwrap().payload["summary"].as_str().unwrap();
    let reviews = |text: &str| text.lines().filter(|l| l.starts_with("Review: ")).count();

    // Every place gets the same scripted excerpt, so review lines repeat.
    assert!(reviews(summary) > 1);
    assert_eq!(reviews(&resp.assistant_text), reviews(summary));
    assert_eq!(resp.assistant_text, summary);

    let stored = session.turn_history.last().unwrap();
    assert_eq!(stored.content, resp.assistant_text);
}

#[tokio::test]
async fn plan_without_preferences_adds_a_tip() {
    let h = harness();
    let resp = say(&h.orchestrator, "trip", "Plan a trip to Shanghai").await;
    assert_eq!(resp.checkpoint_status, Some(CheckpointStatus::Completed));
    assert!(resp.assistant_text.contains("Tip:"));
}

#[tokio::test]
async fn failed_step_resumes_on_retry() {
    let h = harness();
    let orch = &h.orchestrator;
    h.hotels_down.store(true, Ordering::SeqCst);

    let resp = say(orch, "trip", "Plan two days in Shanghai").await;
    assert_eq!(resp.checkpoint_status, Some(CheckpointStatus::Failed));
    assert!(resp.assistant_text.contains("recommend_hotels"));
    assert!(resp.assistant_text.contains("'retry'"));
    let searches = h.poi_calls.load(Ordering::SeqCst);
    assert!(searches > 0);

    let stored = h.store.load_checkpoint("trip").await.unwrap().unwrap();
    assert_eq!(stored.status, CheckpointStatus::Failed);
    assert_eq!(stored.current_node, "recommend_hotels");

    h.hotels_down.store(false, Ordering::SeqCst);
    let resp = say(orch, "trip", "retry").await;
    assert_eq!(resp.checkpoint_status, Some(CheckpointStatus::Completed));
    // Finished steps are not repeated.
    assert_eq!(h.poi_calls.load(Ordering::SeqCst), searches);
    assert!(resp.tool_trace.iter().all(|(inv, _)| inv.tool_name != "poi_search"));
}

#[tokio::test]
async fn resume_words_without_checkpoint_get_a_general_reply() {
    let h = harness();
    let resp = say(&h.orchestrator, "trip", "continue").await;
    assert!(resp.checkpoint_status.is_none());
    assert_eq!(resp.mode, ConversationMode::General);
    assert!(resp.tool_trace.is_empty());
}

// --- Preferences ---

#[tokio::test]
async fn preferences_merge_field_by_field_across_turns() {
    let h = harness();
    let orch = &h.orchestrator;

    say(orch, "p", "I prefer walking").await;
    say(orch, "p", "My preference is a luxury budget").await;
    say(orch, "p", "I like history").await;
    say(orch, "p", "I like food too").await;

    let prefs = orch.preferences("p").await.unwrap();
    assert_eq!(prefs.travel_mode, TravelMode::Walk);
    assert_eq!(prefs.budget, Budget::Luxury);
    assert!(prefs.interests.contains(&Interest::History));
    assert!(prefs.interests.contains(&Interest::Food));
    assert_eq!(prefs.interaction_count, 4);
}

#[tokio::test]
async fn sessions_do_not_share_preferences() {
    let h = harness();
    say(&h.orchestrator, "a", "I prefer walking").await;
    let other = h.orchestrator.preferences("b").await.unwrap();
    assert_eq!(other.travel_mode, TravelMode::default());
}

// --- Compaction ---

/// Records what the context looked like when it ran.
struct Recorder {
    seen: Arc<Mutex<Vec<(bool, usize, ConversationMode)>>>,
}

#[async_trait]
impl Middleware for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn before_turn(&self, ctx: &mut TurnContext) -> Result<Flow, MiddlewareError> {
        let first_is_summary = ctx
            .session
            .turn_history
            .first()
            .is_some_and(Message::is_compaction_summary);
        self.seen
            .lock()
            .unwrap()
            .push((first_is_summary, ctx.session.token_estimate, ctx.mode));
        Ok(Flow::Continue)
    }
}

struct Unavailable;

#[async_trait]
impl Summarizer for Unavailable {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn summarize(&self, _messages: &[Message]) -> Result<String, CompactionError> {
        Err(CompactionError::SummarizerUnavailable("model offline".into()))
    }
}

async fn seed_long_history(store: &Arc<dyn SessionStore>, session_id: &str) -> usize {
    let mut session = SessionState::new(session_id);
    for i in 0..30 {
        let text = format!(
            "Turn {i}. We talked about the Bund, the old town lanes and where to find soup dumplings near People's Square."
        );
        if i % 2 == 0 {
            session.push(Message::user(text));
        } else {
            session.push(Message::assistant(text));
        }
    }
    let tokens = session.token_estimate;
    store.save_session(session).await.unwrap();
    tokens
}

#[tokio::test]
async fn compaction_runs_before_mode_selection() {
    let h = harness();
    let before = seed_long_history(&h.store, "long").await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let events = h.orchestrator.events();
    let pipeline = Pipeline::new()
        .with_stage(CompactionStage::new(
            ContextWindowManager::new(400, 6),
            Arc::new(ExtractiveSummarizer::default()),
            events,
        ))
        .with_stage(Recorder { seen: seen.clone() })
        .with_stage(DirectiveStage);
    let orch = h.orchestrator.with_pipeline(pipeline);

    let resp = say(&orch, "long", "What attractions are in Shanghai?").await;
    assert_eq!(resp.mode, ConversationMode::DestinationLookup);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let (first_is_summary, tokens, mode) = seen[0];
    assert!(first_is_summary);
    assert!(tokens < before);
    // The directive stage had not run yet.
    assert_eq!(mode, ConversationMode::General);
}

#[tokio::test]
async fn default_pipeline_compacts_and_announces_it() {
    let h = harness();
    seed_long_history(&h.store, "long").await;
    let orch = h
        .orchestrator
        .with_context(ContextWindowManager::new(400, 6), Arc::new(ExtractiveSummarizer::default()));
    let mut rx = orch.events().subscribe();

    let resp = say(&orch, "long", "hello again").await;
    assert!(resp.warnings.is_empty());

    let session = orch.session("long").await.unwrap();
    assert!(session.turn_history[0].is_compaction_summary());
    assert_eq!(session.last_user_message().unwrap().content, "hello again");

    let mut compacted = false;
    while let Ok(event) = rx.try_recv() {
        if let DomainEvent::ContextCompacted {
            tokens_before,
            tokens_after,
            ..
        } = event.as_ref()
        {
            assert!(tokens_after < tokens_before);
            compacted = true;
        }
    }
    assert!(compacted);
}

#[tokio::test]
async fn summarizer_failure_is_only_a_warning() {
    let h = harness();
    let before = seed_long_history(&h.store, "long").await;
    let orch = h
        .orchestrator
        .with_context(ContextWindowManager::new(400, 6), Arc::new(Unavailable));

    let resp = say(&orch, "long", "hello again").await;
    assert_eq!(resp.warnings.len(), 1);
    assert!(resp.warnings[0].contains("context compaction skipped"));

    let session = orch.session("long").await.unwrap();
    assert!(!session.turn_history[0].is_compaction_summary());
    assert!(session.token_estimate > before);
    assert_eq!(session.turn_history.len(), 32);
}

// --- Storage and concurrency ---

#[tokio::test]
async fn concurrent_turns_on_one_session_are_serialized() {
    let h = harness();
    let orch = &h.orchestrator;
    let (a, b) = tokio::join!(
        orch.handle_turn(TurnRequest::new("shared", "I like history")),
        orch.handle_turn(TurnRequest::new("shared", "I prefer walking")),
    );
    a.unwrap();
    b.unwrap();

    let session = orch.session("shared").await.unwrap();
    assert_eq!(session.turn_history.len(), 4);
    assert_eq!(session.preferences.interaction_count, 2);
    assert!(session.preferences.interests.contains(&Interest::History));
    assert_eq!(session.preferences.travel_mode, TravelMode::Walk);
}

#[tokio::test]
async fn corrupt_session_file_fails_the_turn() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(dir.path()));
    let tools = Arc::new(tripclaw_tools::default_registry(std::time::Duration::from_secs(5)));
    let orch = Orchestrator::new(store, tools, Arc::new(EventBus::default())).unwrap();

    let result = orch.handle_turn(TurnRequest::new("broken", "hello")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn file_store_keeps_history_between_orchestrators() {
    let dir = tempfile::tempdir().unwrap();
    let open = || {
        let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(dir.path()));
        let tools = Arc::new(tripclaw_tools::default_registry(std::time::Duration::from_secs(5)));
        Orchestrator::new(store, tools, Arc::new(EventBus::default())).unwrap()
    };

    say(&open(), "kept", "I prefer walking").await;
    let prefs = open().preferences("kept").await.unwrap();
    assert_eq!(prefs.travel_mode, TravelMode::Walk);
    assert_eq!(open().session("kept").await.unwrap().turn_history.len(), 2);
}
