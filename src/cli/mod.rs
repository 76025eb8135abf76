//! Text front end for the navigation shell: screen rendering and REPL commands.

pub mod commands;

use std::io::Write;

use crate::identity::SessionState;
use crate::routing::{Renderer, Screen, View};

pub use commands::{parse_command, Command};

/// Render a screen as a short text block.
pub fn render_screen(screen: &Screen) -> String {
    let mut out = String::new();
    out.push_str(&format!("== {} [{}] ==\n", screen.name.replace('_', " "), screen.location));
    match &screen.viewer {
        Some(p) => out.push_str(&format!("signed in as {} <{}>\n", p.label(), p.email)),
        None => out.push_str("not signed in\n"),
    }
    for (k, v) in &screen.params {
        out.push_str(&format!("  {k}: {v}\n"));
    }
    match screen.name.as_str() {
        "login" => out.push_str("  login <email> <password>  |  forgot <email>  |  open /register\n"),
        "register" => out.push_str("  register <email> <password> [display name]\n"),
        "update_password" => out.push_str("  password <new password>\n"),
        "submit_project" => out.push_str("  score <title> | <description> [| file-url ...]\n"),
        "users" => {
            if let Some(q) = screen.query.get("q") {
                out.push_str(&format!("  search: {q}\n"));
            }
        }
        "not_found" => out.push_str("  nothing registered at this location\n"),
        _ => {}
    }
    out
}

pub fn describe_state(state: &SessionState) -> String {
    match state {
        SessionState::Unknown => "session: resolving".to_string(),
        SessionState::Absent => "session: signed out".to_string(),
        SessionState::Present(s) => format!("session: {} until {}", s.principal.label(), s.expires_at.format("%Y-%m-%d %H:%M:%S UTC")),
    }
}

/// Renderer writing to any `io::Write`; write errors are ignored like terminal
/// output usually is.
pub struct TextRenderer<W: Write> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self { Self { out } }

    pub fn into_inner(self) -> W { self.out }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, view: View<'_>) {
        let text = match view {
            View::Loading { location } => format!("... loading {location}\n"),
            View::Screen(screen) => render_screen(screen),
        };
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}
