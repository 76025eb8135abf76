//!
//! folio shell binary
//! ------------------
//! Interactive client for the portfolio screens. Every `open`, `back` and session
//! change goes through the navigation gate, so signed-out viewers end up on the
//! login screen and signed-in viewers never see guest-only screens.

use std::env;
use std::io::{self, Stdout};
use std::sync::Arc;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use folio::cli::commands::HELP;
use folio::cli::{describe_state, parse_command, Command, TextRenderer};
use folio::config::{arg_value, has_flag, FolioConfig};
use folio::identity::{AccountDirectory, IdentityProvider, LocalIdentityProvider, SessionManager, SessionState, SessionStore};
use folio::routing::{NavigationOutcome, NavigationRequest, NavigationShell, RouteTable};
use folio::scoring::ScoringClient;
use folio::server::UPDATE_PASSWORD_PATH;

struct ShellContext {
    config: FolioConfig,
    provider: Arc<LocalIdentityProvider>,
    shell: NavigationShell,
    scoring: ScoringClient,
    renderer: TextRenderer<Stdout>,
}

enum Flow {
    Continue { navigated: bool },
    Quit,
}

fn report(outcome: &NavigationOutcome) {
    match outcome {
        NavigationOutcome::Rendered(_) => {}
        NavigationOutcome::Cancelled => println!("navigation cancelled"),
        NavigationOutcome::RedirectLoop { location } => println!("redirect loop detected at {location}; giving up"),
    }
}

impl ShellContext {
    async fn open(&mut self, location: &str) {
        let outcome = self.shell.navigate(location, &mut self.renderer).await;
        report(&outcome);
    }

    async fn execute(&mut self, cmd: Command) -> Flow {
        match cmd {
            Command::Empty => {}
            Command::Quit => return Flow::Quit,
            Command::Help => println!("{HELP}"),
            Command::Open(location) => {
                self.open(&location).await;
                return Flow::Continue { navigated: true };
            }
            Command::Back => match self.shell.back(&mut self.renderer).await {
                Some(outcome) => {
                    report(&outcome);
                    return Flow::Continue { navigated: true };
                }
                None => println!("no previous entry"),
            },
            Command::History => {
                let current = self.shell.current_location().map(str::to_string);
                for entry in self.shell.history().entries() {
                    let marker = if Some(entry.as_str()) == current.as_deref() { "*" } else { " " };
                    println!("{marker} {entry}");
                }
            }
            Command::Register { email, password, display_name } => {
                match self.provider.sign_up(&email, &password, display_name) {
                    Ok(_) => {
                        let landing = self.config.landing_path.clone();
                        self.open(&landing).await;
                        return Flow::Continue { navigated: true };
                    }
                    Err(e) => println!("register failed: {e}"),
                }
            }
            Command::Login { email, password } => match self.provider.sign_in_with_password(&email, &password) {
                Ok(_) => {
                    let landing = self.config.landing_path.clone();
                    self.open(&landing).await;
                    return Flow::Continue { navigated: true };
                }
                Err(e) => println!("login failed: {e}"),
            },
            Command::Logout => match self.shell.store().sign_out().await {
                Ok(()) => {
                    let login = self.config.login_path.clone();
                    self.open(&login).await;
                    return Flow::Continue { navigated: true };
                }
                Err(e) => println!("logout failed: {e}"),
            },
            Command::Forgot(email) => {
                // The shell stands in for the mailbox and prints the link directly.
                match self.provider.reset_password_for_email(&email, UPDATE_PASSWORD_PATH, &self.config.credential_param) {
                    Ok(Some(link)) => println!("reset link: {link}\n(open it to choose a new password)"),
                    Ok(None) => println!("if an account exists for {email}, a reset link has been sent"),
                    Err(e) => println!("password reset failed: {e}"),
                }
            }
            Command::Password(new_password) => {
                let token = self.shell.current_location().and_then(|loc| {
                    NavigationRequest::parse(loc)
                        .query()
                        .ok()
                        .and_then(|q| q.get(&self.config.credential_param).map(str::to_string))
                });
                let Some(token) = token else {
                    println!("open a password reset link first");
                    return Flow::Continue { navigated: false };
                };
                match self.provider.update_password(&token, &new_password) {
                    Ok(()) => {
                        println!("password updated; sign in with the new password");
                        let login = self.config.login_path.clone();
                        self.open(&login).await;
                        return Flow::Continue { navigated: true };
                    }
                    Err(e) => println!("password update failed: {e}"),
                }
            }
            Command::WhoAmI => println!("{}", describe_state(&self.shell.store().snapshot())),
            Command::Score(mut submission) => {
                let SessionState::Present(session) = self.shell.store().snapshot() else {
                    println!("sign in before submitting a project");
                    return Flow::Continue { navigated: false };
                };
                submission.student_name = Some(session.principal.label().to_string());
                match self.scoring.score(&submission).await {
                    Ok(fb) => {
                        println!("score: {:.1}/10", fb.ai_score);
                        if !fb.ai_suggestions.is_empty() { println!("suggestions: {}", fb.ai_suggestions); }
                        if !fb.learning_path.is_empty() { println!("learning path: {}", fb.learning_path); }
                    }
                    Err(e) => println!("scoring failed: {e}"),
                }
            }
        }
        Flow::Continue { navigated: false }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("folio shell\n\nUSAGE:\n  folio_shell [--open LOCATION] [--scoring-url URL] [--scoring-timeout-ms N]\n\n{HELP}");
        return Ok(());
    }

    let mut config = FolioConfig::from_env();
    config.apply_args(&args);

    let directory = Arc::new(AccountDirectory::new());
    let sessions = Arc::new(SessionManager::new(config.session_ttl));
    let provider = Arc::new(LocalIdentityProvider::new(directory, sessions));
    let store = SessionStore::new(provider.clone() as Arc<dyn IdentityProvider>);
    let _announce = store.subscribe(|state| println!("{}", describe_state(state)));
    let mut session_rx = store.watch();

    let shell = NavigationShell::new(store.clone(), Arc::new(RouteTable::portfolio()), config.route_policy());
    let scoring = ScoringClient::new(&config.scoring_url, config.scoring_timeout)?;
    let start = arg_value(&args, "--open").unwrap_or_else(|| config.landing_path.clone());
    let mut ctx = ShellContext { config, provider, shell, scoring, renderer: TextRenderer::new(io::stdout()) };

    println!("folio shell - type help for commands, quit to leave");

    // The first navigation waits on the initial session fetch.
    let (_, outcome) = tokio::join!(store.initialize(), ctx.shell.navigate(&start, &mut ctx.renderer));
    report(&outcome);
    let _ = session_rx.borrow_and_update();

    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("folio> ") {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                let cmd = match parse_command(&line) {
                    Ok(cmd) => cmd,
                    Err(msg) => {
                        println!("{msg}");
                        continue;
                    }
                };
                let navigated = match ctx.execute(cmd).await {
                    Flow::Quit => break,
                    Flow::Continue { navigated } => navigated,
                };
                if session_rx.has_changed().unwrap_or(false) {
                    let _ = session_rx.borrow_and_update();
                    if !navigated {
                        if let Some(outcome) = ctx.shell.revalidate(&mut ctx.renderer).await {
                            report(&outcome);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("input error: {e}");
                break;
            }
        }
    }

    store.shutdown();
    Ok(())
}
