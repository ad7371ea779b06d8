//! The turn orchestrator.
//!
//! One call to [`Orchestrator::handle_turn`] is one logical unit of work:
//!
//! 1. Take the session's turn lock and load (or create) the session
//! 2. Count the interaction and merge preferences stated in the text
//! 3. Append the user message and run the before-turn middleware
//! 4. Ask the [`TurnPolicy`] what to do and do it (reply, tools, workflow)
//! 5. Append the reply, save the session, run the after-turn middleware
//!
//! Turns for the same session are serialized; different sessions run
//! independently.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tripclaw_config::AppConfig;
use tripclaw_core::checkpoint::{CheckpointStatus, WorkflowCheckpoint, WorkflowInput};
use tripclaw_core::error::Error;
use tripclaw_core::event::{DomainEvent, EventBus};
use tripclaw_core::message::Message;
use tripclaw_core::preference::{PreferenceProfile, PreferenceUpdate};
use tripclaw_core::session::{SessionState, SessionStore};
use tripclaw_core::summarizer::Summarizer;
use tripclaw_core::tool::{ToolInvocation, ToolRegistry, ToolResult};
use tripclaw_session::{FileSessionStore, InMemorySessionStore};
use tripclaw_workflow::{RECOMMENDATION_GRAPH, RunControl, WorkflowEngine, recommendation_graph};

use crate::context::{ContextWindowManager, ExtractiveSummarizer};
use crate::middleware::{ConversationMode, Flow, Pipeline, TurnContext};
use crate::policy::{RuleBasedPolicy, TurnAction, TurnPolicy};
use crate::preferences::{extract_preferences, talks_about_preferences};
use crate::reply::{render_checkpoint, render_tool_result};

const PREFERENCE_TIP: &str =
    "Tip: tell me your interests, pace and budget and I'll tailor the next plan to you.";

/// One user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub session_id: String,
    pub user_text: String,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<String>, user_text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_text: user_text.into(),
        }
    }
}

pub type ToolTraceEntry = (ToolInvocation, ToolResult);

#[derive(Debug, Clone)]
pub struct TurnResponse {
    pub assistant_text: String,
    /// Every tool call made during the turn, in completion order.
    pub tool_trace: Vec<ToolTraceEntry>,
    /// Status of the workflow checkpoint if the turn ran or resumed one.
    pub checkpoint_status: Option<CheckpointStatus>,
    pub mode: ConversationMode,
    /// Tolerated problems, such as a skipped compaction.
    pub warnings: Vec<String>,
}

pub struct Orchestrator {
    store: Arc<dyn SessionStore>,
    tools: Arc<ToolRegistry>,
    engine: WorkflowEngine,
    pipeline: Pipeline,
    policy: Box<dyn TurnPolicy>,
    events: Arc<EventBus>,
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    /// Build with the recommendation graph, the standard pipeline and the
    /// rule-based policy.
    pub fn new(store: Arc<dyn SessionStore>, tools: Arc<ToolRegistry>, events: Arc<EventBus>) -> Result<Self, Error> {
        let mut engine = WorkflowEngine::new(store.clone(), tools.clone()).with_event_bus(events.clone());
        engine.register_graph(recommendation_graph()?);

        let pipeline = Pipeline::standard(
            ContextWindowManager::default(),
            Arc::new(ExtractiveSummarizer::default()),
            events.clone(),
        );

        Ok(Self {
            store,
            tools,
            engine,
            pipeline,
            policy: Box::new(RuleBasedPolicy),
            events,
            turn_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Build everything from configuration: the configured session backend,
    /// the built-in tools and the configured limits.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let store: Arc<dyn SessionStore> = match config.session.backend.as_str() {
            "file" => Arc::new(FileSessionStore::new(config.session.resolved_dir())),
            _ => Arc::new(InMemorySessionStore::new()),
        };
        let tools = Arc::new(tripclaw_tools::default_registry(config.tools.call_timeout()));
        info!(
            backend = store.name(),
            tools = tools.names().len(),
            threshold = config.context.threshold,
            "Orchestrator configured"
        );

        Ok(Self::new(store, tools, Arc::new(EventBus::default()))?
            .with_context(
                ContextWindowManager::from_config(&config.context),
                Arc::new(ExtractiveSummarizer::default()),
            )
            .with_engine_limits(config.workflow.max_fan_out, config.workflow.node_deadline()))
    }

    /// Replace the standard pipeline's budget and summarizer.
    pub fn with_context(mut self, manager: ContextWindowManager, summarizer: Arc<dyn Summarizer>) -> Self {
        self.pipeline = Pipeline::standard(manager, summarizer, self.events.clone());
        self
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_policy(mut self, policy: impl TurnPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_engine_limits(mut self, max_fan_out: usize, node_deadline: Duration) -> Self {
        self.engine = self.engine.with_limits(max_fan_out, node_deadline);
        self
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    /// Run `work` holding the session's turn lock. The lock entry is dropped
    /// again once no other caller holds or waits on it.
    async fn serialized<T>(&self, session_id: &str, work: impl Future<Output = T>) -> T {
        let lock = {
            let mut locks = self.turn_locks.lock().await;
            locks.entry(session_id.to_string()).or_default().clone()
        };
        let out = {
            let _turn = lock.lock().await;
            work.await
        };
        drop(lock);

        // Clones are only handed out under the map lock, so a count of one
        // means nobody else can reach this entry.
        let mut locks = self.turn_locks.lock().await;
        if locks.get(session_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(session_id);
        }
        out
    }

    /// Process one user turn.
    ///
    /// Node failures come back as a normal reply offering a retry. Only
    /// store errors (including a corrupt checkpoint) and middleware stage
    /// failures are returned as `Err`.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnResponse, Error> {
        let session_id = request.session_id.clone();
        self.serialized(&session_id, self.run_turn(request)).await
    }

    async fn run_turn(&self, request: TurnRequest) -> Result<TurnResponse, Error> {
        info!(session_id = %request.session_id, "Turn started");
        self.events.publish(DomainEvent::TurnStarted {
            session_id: request.session_id.clone(),
            timestamp: Utc::now(),
        });

        let mut session = self.store.get_or_create(&request.session_id).await?;
        session.preferences.interaction_count += 1;

        let talks = talks_about_preferences(&request.user_text);
        let mut preferences_updated = false;
        if let Some(update) = extract_preferences(&request.user_text, &session.preferences) {
            let changed = session.preferences.merge(update);
            debug!(session_id = %request.session_id, ?changed, "Preferences merged from text");
            preferences_updated = true;
        }
        session.push(Message::user(request.user_text.as_str()));

        let mut ctx = TurnContext::new(session, request.user_text);
        ctx.talks_about_preferences = talks;
        ctx.preferences_updated = preferences_updated;

        let flow = self.pipeline.run_before(&mut ctx).await?;

        let mut trace = Vec::new();
        let mut checkpoint_status = None;
        let reply = match flow {
            Flow::ShortCircuit(reply) => reply,
            Flow::Continue => {
                let action = self.policy.decide(&ctx);
                debug!(policy = self.policy.name(), ?action, "Turn action decided");
                self.execute(action, &mut ctx, &mut trace, &mut checkpoint_status).await?
            }
        };

        ctx.session.push(Message::assistant(reply.as_str()));
        self.store.save_session(ctx.session.clone()).await?;

        let mut reply = reply;
        self.pipeline.run_after(&mut ctx, &mut reply).await?;

        info!(
            session_id = %ctx.session_id(),
            mode = ctx.mode.as_str(),
            tool_calls = trace.len(),
            tokens = ctx.session.token_estimate,
            "Turn completed"
        );
        Ok(TurnResponse {
            assistant_text: reply,
            tool_trace: trace,
            checkpoint_status,
            mode: ctx.mode,
            warnings: ctx.warnings,
        })
    }

    async fn execute(
        &self,
        action: TurnAction,
        ctx: &mut TurnContext,
        trace: &mut Vec<ToolTraceEntry>,
        checkpoint_status: &mut Option<CheckpointStatus>,
    ) -> Result<String, Error> {
        match action {
            TurnAction::Reply(text) => Ok(text),
            TurnAction::CallTools(calls) => {
                ctx.reply_rendered = true;
                let mut sections = Vec::with_capacity(calls.len());
                for invocation in calls {
                    let result = self.call_tool(&invocation).await;
                    ctx.session.push(Message::tool(result.payload.to_string()));
                    sections.push(render_tool_result(&invocation, &result));
                    trace.push((invocation, result));
                }
                Ok(sections.join("\n\n"))
            }
            TurnAction::RunWorkflow(input) => {
                let checkpoint = self.run_workflow(ctx, input, None, trace).await?;
                Ok(self.workflow_reply(ctx, checkpoint, checkpoint_status))
            }
            TurnAction::Resume => match ctx.session.checkpoint.clone() {
                Some(checkpoint) => {
                    info!(
                        session_id = %ctx.session_id(),
                        node = %checkpoint.current_node,
                        status = checkpoint.status.as_str(),
                        "Resuming workflow"
                    );
                    let input = checkpoint.input.clone();
                    let checkpoint = self.run_workflow(ctx, input, Some(checkpoint), trace).await?;
                    Ok(self.workflow_reply(ctx, checkpoint, checkpoint_status))
                }
                None => Ok("There is no unfinished plan to resume.".to_string()),
            },
        }
    }

    async fn call_tool(&self, invocation: &ToolInvocation) -> ToolResult {
        let started = Instant::now();
        let result = self.tools.invoke(invocation).await;
        self.events.publish(DomainEvent::ToolInvoked {
            tool_name: invocation.tool_name.clone(),
            status: format!("{:?}", result.status).to_lowercase(),
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
        result
    }

    async fn run_workflow(
        &self,
        ctx: &TurnContext,
        input: WorkflowInput,
        checkpoint: Option<WorkflowCheckpoint>,
        trace: &mut Vec<ToolTraceEntry>,
    ) -> Result<WorkflowCheckpoint, Error> {
        let control = RunControl::default();
        let result = self
            .engine
            .run_with(
                ctx.session_id(),
                RECOMMENDATION_GRAPH,
                input,
                &ctx.session.preferences,
                checkpoint,
                &control,
            )
            .await;
        trace.extend(control.trace.take());
        Ok(result?)
    }

    fn workflow_reply(
        &self,
        ctx: &mut TurnContext,
        checkpoint: WorkflowCheckpoint,
        checkpoint_status: &mut Option<CheckpointStatus>,
    ) -> String {
        ctx.reply_rendered = true;
        let mut reply = render_checkpoint(&checkpoint);
        match checkpoint.status {
            CheckpointStatus::Completed if !ctx.session.preferences.has_collected_any() => {
                reply.push_str("\n\n");
                reply.push_str(PREFERENCE_TIP);
            }
            CheckpointStatus::Failed => {
                warn!(
                    session_id = %ctx.session_id(),
                    node = %checkpoint.current_node,
                    "Workflow failed; waiting for the user to retry"
                );
            }
            _ => {}
        }
        *checkpoint_status = Some(checkpoint.status);
        ctx.session.checkpoint = Some(checkpoint);
        reply
    }

    /// Run the recommendation workflow outside a conversation turn, using the
    /// session's stored preferences. The checkpoint is saved with the session.
    pub async fn plan(&self, session_id: &str, input: WorkflowInput) -> Result<(WorkflowCheckpoint, Vec<ToolTraceEntry>), Error> {
        self.serialized(session_id, self.plan_unlocked(session_id, input)).await
    }

    async fn plan_unlocked(
        &self,
        session_id: &str,
        input: WorkflowInput,
    ) -> Result<(WorkflowCheckpoint, Vec<ToolTraceEntry>), Error> {
        let session = self.store.get_or_create(session_id).await?;
        let ctx = TurnContext::new(session, input.query.clone());
        let mut trace = Vec::new();
        let checkpoint = self.run_workflow(&ctx, input, None, &mut trace).await?;

        let mut session = ctx.session;
        session.checkpoint = Some(checkpoint.clone());
        self.store.save_session(session).await?;
        Ok((checkpoint, trace))
    }

    pub async fn session(&self, session_id: &str) -> Result<SessionState, Error> {
        Ok(self.store.get_or_create(session_id).await?)
    }

    pub async fn preferences(&self, session_id: &str) -> Result<PreferenceProfile, Error> {
        Ok(self.session(session_id).await?.preferences)
    }

    /// Explicit field-wise preference update, serialized with the session's turns.
    pub async fn update_preferences(
        &self,
        session_id: &str,
        update: PreferenceUpdate,
    ) -> Result<PreferenceProfile, Error> {
        self.serialized(session_id, async {
            Ok::<_, Error>(self.store.update_preferences(session_id, update).await?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripclaw_core::preference::{Budget, TravelMode};

    fn orchestrator() -> Orchestrator {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let tools = Arc::new(tripclaw_tools::default_registry(Duration::from_secs(5)));
        Orchestrator::new(store, tools, Arc::new(EventBus::default())).unwrap()
    }

    #[tokio::test]
    async fn greeting_gets_general_reply() {
        let orch = orchestrator();
        let resp = orch.handle_turn(TurnRequest::new("s1", "hello")).await.unwrap();
        assert_eq!(resp.mode, ConversationMode::General);
        assert!(resp.tool_trace.is_empty());
        assert!(resp.checkpoint_status.is_none());

        let session = orch.session("s1").await.unwrap();
        assert_eq!(session.turn_history.len(), 2);
        assert_eq!(session.preferences.interaction_count, 1);
    }

    #[tokio::test]
    async fn weather_turn_records_trace() {
        let orch = orchestrator();
        let resp = orch
            .handle_turn(TurnRequest::new("s1", "What's the weather in Hangzhou?"))
            .await
            .unwrap();
        assert_eq!(resp.tool_trace.len(), 1);
        assert_eq!(resp.tool_trace[0].0.tool_name, "weather");
        assert!(resp.assistant_text.starts_with("Weather for Hangzhou"));

        // user, tool output, assistant
        let session = orch.session("s1").await.unwrap();
        assert_eq!(session.turn_history.len(), 3);
    }

    #[tokio::test]
    async fn preferences_from_text_are_saved() {
        let orch = orchestrator();
        orch.handle_turn(TurnRequest::new("s1", "I prefer walking and a luxury budget"))
            .await
            .unwrap();
        let prefs = orch.preferences("s1").await.unwrap();
        assert_eq!(prefs.travel_mode, TravelMode::Walk);
        assert_eq!(prefs.budget, Budget::Luxury);
    }

    #[tokio::test]
    async fn explicit_update_is_field_wise() {
        let orch = orchestrator();
        orch.handle_turn(TurnRequest::new("s1", "I prefer walking")).await.unwrap();
        let prefs = orch
            .update_preferences(
                "s1",
                PreferenceUpdate {
                    budget: Some(Budget::Economy),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(prefs.budget, Budget::Economy);
        assert_eq!(prefs.travel_mode, TravelMode::Walk);
    }

    #[tokio::test]
    async fn plan_saves_checkpoint() {
        let orch = orchestrator();
        let (checkpoint, trace) = orch
            .plan("s1", WorkflowInput::new("Hangzhou").with_days(2))
            .await
            .unwrap();
        assert_eq!(checkpoint.status, CheckpointStatus::Completed);
        assert!(!trace.is_empty());
        let session = orch.session("s1").await.unwrap();
        assert_eq!(session.checkpoint, Some(checkpoint));
    }

    #[tokio::test]
    async fn huge_trip_length_is_capped() {
        let orch = orchestrator().with_engine_limits(3, Duration::from_secs(2));
        let (checkpoint, _) = orch
            .plan("s1", WorkflowInput::new("Hangzhou").with_days(20_000_000))
            .await
            .unwrap();
        assert_eq!(checkpoint.status, CheckpointStatus::Completed);
        assert_eq!(checkpoint.input.days, tripclaw_core::checkpoint::MAX_TRIP_DAYS);
        let days = checkpoint.output("synthesize_result").unwrap().payload["itinerary"]
            .as_array()
            .unwrap()
            .len();
        assert_eq!(days, tripclaw_core::checkpoint::MAX_TRIP_DAYS as usize);
    }

    #[tokio::test]
    async fn turn_locks_are_released_after_turns() {
        let orch = orchestrator();
        let (a, b, c) = tokio::join!(
            orch.handle_turn(TurnRequest::new("s0", "hello")),
            orch.handle_turn(TurnRequest::new("s0", "hi there")),
            orch.handle_turn(TurnRequest::new("s1", "hello")),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();
        orch.plan("s2", WorkflowInput::new("Hangzhou")).await.unwrap();
        orch.update_preferences("s3", PreferenceUpdate::default()).await.unwrap();

        assert!(orch.turn_locks.lock().await.is_empty());
        assert_eq!(orch.session("s0").await.unwrap().preferences.interaction_count, 2);
    }
}
