//! Terminal rendering of turn snapshots.
//!
//! Snapshots are cumulative, so the renderer remembers how many display
//! turns it already printed and only prints what is new. A tool call still
//! in flight is shown as a single live status line on stderr that is
//! overwritten until the call settles.

use std::io::Write;

use botty_agent::{DisplayTurn, ToolCallDisplay, ToolCallStatus, TurnSnapshot};

#[derive(Default)]
pub struct Renderer {
    printed: usize,
    live_line: bool,
    memory: String,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new turn; the memory panel carries over.
    pub fn reset(&mut self) {
        self.printed = 0;
        self.live_line = false;
    }

    pub fn render(&mut self, snapshot: &TurnSnapshot) {
        for turn in snapshot.turns.iter().skip(self.printed) {
            if let DisplayTurn::ToolCall(call) = turn {
                if call.status == ToolCallStatus::Pending {
                    self.show_live(call);
                    return;
                }
            }
            self.clear_live();
            print!("{}", format_turn(turn));
            self.printed += 1;
        }

        if snapshot.finished {
            self.clear_live();
            if snapshot.memory != self.memory {
                print!("{}", format_memory(&snapshot.memory));
                self.memory = snapshot.memory.clone();
            }
            let _ = std::io::stdout().flush();
        }
    }

    fn show_live(&mut self, call: &ToolCallDisplay) {
        let body = call.body();
        let last = body.lines().last().unwrap_or_default();
        eprint!("\r\x1b[2K  {} · {last}", call.title);
        let _ = std::io::stderr().flush();
        self.live_line = true;
    }

    fn clear_live(&mut self) {
        if self.live_line {
            eprint!("\r\x1b[2K");
            self.live_line = false;
        }
    }
}

pub fn format_turn(turn: &DisplayTurn) -> String {
    let mut out = String::new();
    match turn {
        DisplayTurn::Assistant { text } => {
            for line in text.lines() {
                out.push_str(&format!("  Botty > {line}\n"));
            }
        }
        DisplayTurn::ToolCall(call) => {
            let cached = if call.cached { " (cached)" } else { "" };
            out.push_str(&format!("  {}{cached}\n", call.title));
            for line in call.body().lines() {
                out.push_str(&format!("      {line}\n"));
            }
        }
        DisplayTurn::Error { message } => {
            out.push_str(&format!("  [Error] {message}\n"));
        }
    }
    out
}

pub fn format_memory(memory: &str) -> String {
    if memory.is_empty() {
        return "  🧠 Memory is empty\n".to_string();
    }
    let mut out = String::from("  🧠 Memory\n");
    for line in memory.lines() {
        out.push_str(&format!("      {line}\n"));
    }
    out
}
