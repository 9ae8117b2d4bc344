//! Text-mode surface: menu, prompts and turn rendering.

use crate::conversation::ProviderMode;
use crate::llm::Backend;
use crate::normalize::{ContentBlock, block_type_tags};
use crate::session::{ChatSession, TurnOutcome, TurnReport};
use serde_json::Value;
use std::io::Write;
use tokio::io::{AsyncBufRead, Lines};
use tracing::warn;

const RULE: &str = "==================================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Mode(ProviderMode),
    Quit,
}

/// Why a mode loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeExit {
    /// The user typed the exit sentinel; back to the menu.
    Sentinel,
    Interrupted,
    EndOfInput,
}

pub fn menu_text() -> String {
    format!(
        "\n{RULE}\nDual-provider chat\n{RULE}\n\
         1. Chat mode (no reasoning output)\n\
         2. Reasoning mode (shows model reasoning)\n\
         0. Quit\n{RULE}"
    )
}

pub fn parse_menu_choice(input: &str) -> Option<MenuChoice> {
    match input.trim() {
        "1" => Some(MenuChoice::Mode(ProviderMode::Chat)),
        "2" => Some(MenuChoice::Mode(ProviderMode::Reasoning)),
        "0" => Some(MenuChoice::Quit),
        _ => None,
    }
}

pub fn parse_yes_no(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "yes" | "y" | "да" | "д" => Some(true),
        "no" | "n" | "нет" | "н" => Some(false),
        _ => None,
    }
}

fn prompt(label: &str) {
    print!("{label}");
    let _ = std::io::stdout().flush();
}

/// Ask until the answer is yes or no. `None` when input ends.
pub async fn ask_web_search<R>(lines: &mut Lines<R>) -> std::io::Result<Option<bool>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        prompt("Use web search? (yes/no): ");
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        match parse_yes_no(&line) {
            Some(answer) => return Ok(Some(answer)),
            None => println!("Please answer 'yes' or 'no'"),
        }
    }
}

pub fn mode_banner(mode: ProviderMode, web_search: bool) -> String {
    let title = match mode {
        ProviderMode::Chat => "Chat mode",
        ProviderMode::Reasoning => "Reasoning mode",
    };
    let search = if web_search { ", web search on" } else { "" };
    format!("\n=== {title}{search} ===\nType 'exit' to return to the menu, '/clear' to start over\n")
}

pub fn render_turn(mode: ProviderMode, report: &TurnReport) -> String {
    let mut out = String::new();
    let n = &report.normalized;

    for tool in &n.tool_invocations {
        if tool.name == "web_search" {
            out.push_str("\n[Model is searching the web...]\n");
        } else {
            out.push_str(&format!("\n[Model invoked tool: {}]\n", tool.name));
        }
    }

    match mode {
        ProviderMode::Chat => {
            if report.stored {
                out.push_str(&format!("\nAssistant: {}\n", n.answer()));
            }
        }
        ProviderMode::Reasoning => {
            if !n.reasoning_segments.is_empty() {
                out.push_str("\n[Reasoning]:\n\n");
                for segment in &n.reasoning_segments {
                    out.push_str(segment);
                    out.push('\n');
                }
            } else if let Some(tags) = &report.block_tags {
                out.push_str(&format!(
                    "\n[Debug: no reasoning found. Block types in response: {tags:?}]\n"
                ));
            }
            if report.stored {
                out.push_str(&format!("\n[Answer]:\n{}\n", n.answer()));
            }
        }
    }

    if !report.stored && !n.tool_invocations.is_empty() {
        out.push_str("\n[Tool call only; nothing added to the conversation]\n");
    }
    out
}

/// Run one mode's input loop until exit, interrupt or end of input.
pub async fn run_mode<B, R>(
    session: &mut ChatSession<B>,
    lines: &mut Lines<R>,
) -> std::io::Result<ModeExit>
where
    B: Backend,
    R: AsyncBufRead + Unpin,
{
    println!("{}", mode_banner(session.mode(), session.web_search()));
    let resumed = session.conversation().len().saturating_sub(1);
    if resumed > 0 {
        println!("[Resumed conversation with {resumed} earlier messages]\n");
    }

    loop {
        prompt("You: ");
        let line = tokio::select! {
            line = lines.next_line() => Some(line?),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            session.interrupt();
            println!("\n\nLeaving chat...\n");
            return Ok(ModeExit::Interrupted);
        };
        let Some(line) = line else {
            session.interrupt();
            return Ok(ModeExit::EndOfInput);
        };

        let outcome = tokio::select! {
            result = session.submit(&line) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(outcome) = outcome else {
            session.interrupt();
            println!("\n\nLeaving chat...\n");
            return Ok(ModeExit::Interrupted);
        };

        match outcome {
            Ok(TurnOutcome::Skipped) => continue,
            Ok(TurnOutcome::Exit) => {
                println!("\nLeaving chat...\n");
                return Ok(ModeExit::Sentinel);
            }
            Ok(TurnOutcome::Cleared) => println!("\n[Conversation cleared]\n"),
            Ok(TurnOutcome::Completed(report)) => {
                print!("{}", render_turn(session.mode(), &report));
                println!();
            }
            Err(e) => {
                warn!(error = %e, "turn failed");
                println!("\nError: {e}\n");
            }
        }
    }
}

/// Structure summary of a raw reasoning-provider response.
pub fn describe_response(response: &Value) -> String {
    let mut out = String::new();
    let field = |name: &str| {
        response
            .get(name)
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .unwrap_or_else(|| "-".into())
    };
    out.push_str(&format!("model: {}\n", field("model")));
    out.push_str(&format!("stop_reason: {}\n", field("stop_reason")));
    if let Some(usage) = response.get("usage") {
        out.push_str(&format!(
            "usage: input_tokens={} output_tokens={}\n",
            usage.get("input_tokens").unwrap_or(&Value::Null),
            usage.get("output_tokens").unwrap_or(&Value::Null)
        ));
    }

    let tags = block_type_tags(response);
    out.push_str(&format!("blocks: {}\n", tags.len()));
    let blocks = response
        .get("content")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for (i, (block, tag)) in blocks.iter().zip(&tags).enumerate() {
        let kind = match ContentBlock::classify(block) {
            ContentBlock::Text { .. } => "text",
            ContentBlock::Reasoning { .. } => "reasoning",
            ContentBlock::ToolUse { .. } => "tool use",
            ContentBlock::Unknown { .. } => "unclassified",
        };
        out.push_str(&format!("\nblock #{}: type={tag} ({kind})\n", i + 1));
        if let Some(keys) = block.as_object().map(|o| o.keys().cloned().collect::<Vec<_>>()) {
            out.push_str(&format!("  fields: {}\n", keys.join(", ")));
        }
        if let Some(text) = block.get("text").and_then(Value::as_str) {
            let preview: String = text.chars().take(200).collect();
            out.push_str(&format!("  text: {preview}\n"));
        }
    }
    out
}
