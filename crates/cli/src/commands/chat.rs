//! `tripclaw chat`: line-by-line conversation on stdin.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tripclaw_agent::TurnRequest;

const EXIT_WORDS: &[&str] = &["exit", "quit", "/exit", "/quit"];

pub async fn run(session: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = super::orchestrator()?;
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    println!();
    println!("  tripclaw, interactive mode");
    println!("  Session:  {session_id}");
    println!("  Type your message and press Enter; 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&text.to_lowercase().as_str()) {
            break;
        }

        match orchestrator.handle_turn(TurnRequest::new(&session_id, text)).await {
            Ok(response) => {
                println!();
                for line in response.assistant_text.lines() {
                    println!("  Assistant > {line}");
                }
                for warning in &response.warnings {
                    eprintln!("  [warning] {warning}");
                }
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye.");
    Ok(())
}
