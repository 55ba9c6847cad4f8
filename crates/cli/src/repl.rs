//! REPL and pipe-mode dispatch: reads one line at a time, parses it through
//! the same [`crate::commands::build_cli`] tree as shell mode, executes it
//! against a live [`peacedb_service::ReplicatedDocumentService`], and prints
//! the result.

use crate::commands::build_cli;
use crate::dispatch::execute;
use crate::format::{format_error, OutputMode};
use crate::parse::matches_to_action;
use crate::state::SessionState;
use peacedb_service::ReplicatedDocumentService;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::BufRead;

/// Split a line into argv-like tokens, honoring double-quoted substrings
/// (needed for JSON document bodies typed inline, e.g. `put x "{\"n\":1}"`).
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '\\' if in_quotes && chars.peek() == Some(&'"') => {
                current.push(chars.next().unwrap());
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

async fn run_line(service: &ReplicatedDocumentService, state: &mut SessionState, mode: OutputMode, line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut tokens = vec!["peacedb".to_string()];
    tokens.extend(tokenize(trimmed));

    let matches = match build_cli().try_get_matches_from(&tokens) {
        Ok(m) => m,
        Err(e) => return Some(format_error(mode, e.to_string().trim())),
    };
    let Some((name, sub)) = matches.subcommand() else {
        return Some(format_error(mode, "no command given"));
    };
    if let Some(db) = matches.get_one::<String>("db") {
        state.current_db = db.clone();
    }
    let action = match matches_to_action(name, sub) {
        Ok(a) => a,
        Err(e) => return Some(format_error(mode, e)),
    };
    Some(execute(service, &state.current_db, mode, action).await)
}

/// Interactive REPL: prompt, history, one command per line, until EOF or
/// `exit`/`quit`.
pub async fn run_repl(service: &ReplicatedDocumentService, default_db: &str, mode: OutputMode) -> rustyline::Result<()> {
    let mut state = SessionState::new(default_db);
    let mut rl = DefaultEditor::new()?;
    loop {
        let prompt = format!("peacedb[{}]> ", state.current_db);
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "exit" || trimmed == "quit" {
                    break;
                }
                let _ = rl.add_history_entry(line.as_str());
                if let Some(out) = run_line(service, &mut state, mode, &line).await {
                    println!("{out}");
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }
    Ok(())
}

/// Pipe mode: read commands line-by-line from stdin (e.g. `echo "seq" |
/// peacedb`), no prompt, no history.
pub async fn run_pipe(service: &ReplicatedDocumentService, default_db: &str, mode: OutputMode) {
    let mut state = SessionState::new(default_db);
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if let Some(out) = run_line(service, &mut state, mode, &line).await {
            println!("{out}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_respects_quotes() {
        let tokens = tokenize(r#"put x "{\"n\": 1}" --tags a,b"#);
        assert_eq!(tokens, vec!["put", "x", "{\"n\": 1}", "--tags", "a,b"]);
    }

    #[test]
    fn tokenize_collapses_whitespace() {
        assert_eq!(tokenize("  seq   "), vec!["seq"]);
    }
}
