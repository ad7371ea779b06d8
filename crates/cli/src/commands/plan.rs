//! `tripclaw plan`: one workflow run outside a conversation.

use tripclaw_agent::reply::render_checkpoint;
use tripclaw_core::checkpoint::WorkflowInput;

pub async fn run(
    session_id: &str,
    city: String,
    days: u32,
    query: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = super::orchestrator()?;

    let mut input = WorkflowInput::new(city).with_days(days);
    if let Some(query) = query {
        input = input.with_query(query);
    }

    let (checkpoint, trace) = orchestrator.plan(session_id, input).await?;
    println!("{}", render_checkpoint(&checkpoint));
    eprintln!();
    eprintln!(
        "  status: {}, steps: {}, tool calls: {}",
        checkpoint.status.as_str(),
        checkpoint.path.len(),
        trace.len()
    );
    Ok(())
}
