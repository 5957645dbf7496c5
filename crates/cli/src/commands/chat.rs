//! `botty chat`: interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;

use botty_agent::{AgentLoop, Session};
use botty_config::AppConfig;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::render::{Renderer, format_memory};

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early and give a clear error
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set BOTTY_API_KEY, or the variable for provider '{}':", config.default_provider);
        eprintln!("    ANTHROPIC_API_KEY  = 'sk-ant-...'   (anthropic)");
        eprintln!("    OPENAI_API_KEY     = 'sk-...'       (openai)");
        eprintln!("    OPENROUTER_API_KEY = 'sk-or-...'    (openrouter)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = botty_providers::build_from_config(&config)?;
    let tools = Arc::new(botty_tools::default_registry(&config)?);
    let tool_names = tools.names().join(", ");
    let agent = AgentLoop::from_config(&config, provider, tools)?;
    let mut session = Session::new(config.memory.max_entries);
    let mut renderer = Renderer::new();
    info!(
        session_id = %session.id,
        provider = %config.default_provider,
        model = %config.default_model,
        tools = %tool_names,
        "Chat session started"
    );

    if let Some(msg) = message {
        // Single message mode
        let mut updates = agent.run_turn(&mut session, msg);
        while let Some(snapshot) = updates.next().await {
            renderer.render(&snapshot);
        }
        drop(updates);
        debug!(session_id = %session.id, history = session.history.len(), "Turn finished");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          Botty, interactive chat mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     {tool_names}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type '/memory' to show what Botty remembers.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {}
            "exit" | "quit" => break,
            "/memory" => print!("{}", format_memory(&session.memory.render_markdown())),
            _ => {
                println!();
                renderer.reset();
                let mut updates = agent.run_turn(&mut session, input);
                while let Some(snapshot) = updates.next().await {
                    renderer.render(&snapshot);
                }
                drop(updates);
                debug!(session_id = %session.id, history = session.history.len(), "Turn finished");
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    info!(session_id = %session.id, turns = session.history.len(), "Chat session ended");
    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}
