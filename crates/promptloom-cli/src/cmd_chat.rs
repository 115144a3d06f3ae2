use anyhow::{Context, Result};
use promptloom_llm::{Backend, ChatMessage};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

const PREAMBLE: &str = "You are the assistant built into the `loom` CLI. You can see the \
project's conventions and specifications, not its sources. You cannot create or modify files \
here — only chat. When the user wants a new spec, emit the text of an XML file for the specs \
folder and let them paste it in themselves: use a <prompt> root node for requirements and a \
<system> root node for context. Be concise.";

/// Readline REPL over the configured backend, with the spec folder's context
/// files folded into the system prompt. Replies stream token by token.
pub fn run() -> Result<()> {
    let config = crate::config::load()?
        .context("no configuration found — run `loom init` first")?;
    anyhow::ensure!(
        !config.api_key.is_empty(),
        "API key not configured — run `loom init` or set LOOM_API_KEY"
    );
    let backend = Backend::for_url(&config.api_url, &config.api_key, &config.model);

    let context = load_chat_context(Path::new(&config.specs_dir));
    let mut messages = vec![ChatMessage::system(chat_system_prompt(&context))];

    println!("Welcome to loom chat. Type a message, or \"exit\" to quit.");
    let stdin = io::stdin();
    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        messages.push(ChatMessage::user(input));
        let streamed = backend.stream_chat(&messages, &mut |text| {
            print!("{text}");
            let _ = io::stdout().flush();
        });
        match streamed {
            Ok(reply) => {
                println!();
                messages.push(ChatMessage::assistant(reply));
            }
            Err(e) => {
                // Keep the session alive; the failed turn is dropped.
                messages.pop();
                eprintln!("\nError: {e}");
            }
        }
    }
    println!("Goodbye.");
    Ok(())
}

/// Gathers the spec folder's well-known context files. Missing files are
/// skipped; `root.xml` and `chat.xml` get wrapping elements so the model can
/// tell them apart.
fn load_chat_context(specs_dir: &Path) -> String {
    let mut parts = Vec::new();
    if let Ok(conventions) = fs::read_to_string(specs_dir.join("conventions.xml")) {
        parts.push(conventions);
    }
    if let Ok(root) = fs::read_to_string(specs_dir.join("root.xml")) {
        parts.push(format!("<root>\n{root}\n</root>"));
    }
    if let Ok(chat) = fs::read_to_string(specs_dir.join("chat.xml")) {
        parts.push(format!("<chat_context>\n{chat}\n</chat_context>"));
    }
    parts.join("\n\n")
}

fn chat_system_prompt(context: &str) -> String {
    format!("{PREAMBLE}\n\n<full_chat_context>{context}</full_chat_context>")
}
