use crate::scoring::Submission;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open(String),
    Back,
    History,
    Register { email: String, password: String, display_name: Option<String> },
    Login { email: String, password: String },
    Logout,
    Forgot(String),
    Password(String),
    WhoAmI,
    Score(Submission),
    Help,
    Quit,
    Empty,
}

pub const HELP: &str = "Commands:
  open <location>                          navigate, e.g. open /profile or open /users?q=ana
  back                                     previous history entry
  history                                  list history entries
  register <email> <password> [name...]    create an account and sign in
  login <email> <password>                 sign in
  logout                                   sign out
  forgot <email>                           request a password reset link
  password <new password>                  on the update-password screen, set a new password
  whoami                                   show the session state
  score <title> | <description> [| url..]  ask the scoring service about a project
  help                                     show this help
  quit | exit                              leave";

fn two_args<'a>(cmd: &str, rest: &'a str) -> Result<(&'a str, &'a str, &'a str), String> {
    let mut it = rest.splitn(3, char::is_whitespace).filter(|s| !s.is_empty());
    match (it.next(), it.next()) {
        (Some(a), Some(b)) => Ok((a, b, it.next().unwrap_or("").trim())),
        _ => Err(format!("usage: {cmd} <email> <password>")),
    }
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match head.to_ascii_lowercase().as_str() {
        "open" | "go" => {
            if rest.is_empty() { return Err("usage: open <location>".into()); }
            Ok(Command::Open(rest.to_string()))
        }
        "back" => Ok(Command::Back),
        "history" => Ok(Command::History),
        "register" => {
            let (email, password, name) = two_args("register", rest)?;
            let display_name = if name.is_empty() { None } else { Some(name.to_string()) };
            Ok(Command::Register { email: email.into(), password: password.into(), display_name })
        }
        "login" => {
            let (email, password, extra) = two_args("login", rest)?;
            if !extra.is_empty() { return Err("usage: login <email> <password>".into()); }
            Ok(Command::Login { email: email.into(), password: password.into() })
        }
        "logout" => Ok(Command::Logout),
        "forgot" => {
            if rest.is_empty() { return Err("usage: forgot <email>".into()); }
            Ok(Command::Forgot(rest.to_string()))
        }
        "password" => {
            if rest.is_empty() { return Err("usage: password <new password>".into()); }
            Ok(Command::Password(rest.to_string()))
        }
        "whoami" => Ok(Command::WhoAmI),
        "score" => {
            let parts: Vec<&str> = rest.split('|').map(str::trim).collect();
            if parts.len() < 2 || parts[0].is_empty() || parts[1].is_empty() {
                return Err("usage: score <title> | <description> [| file-url ...]".into());
            }
            let file_urls = parts[2..]
                .iter()
                .flat_map(|p| p.split_whitespace())
                .map(str::to_string)
                .collect();
            Ok(Command::Score(Submission {
                title: parts[0].to_string(),
                description: parts[1].to_string(),
                file_urls,
                ..Default::default()
            }))
        }
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{other}' (try help)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_navigation() {
        assert_eq!(parse_command("open /users?q=ana"), Ok(Command::Open("/users?q=ana".into())));
        assert_eq!(parse_command("  BACK "), Ok(Command::Back));
        assert_eq!(parse_command(""), Ok(Command::Empty));
        assert!(parse_command("open").is_err());
    }

    #[test]
    fn parses_account_commands() {
        assert_eq!(
            parse_command("register ana@example.edu secret1 Ana Lee"),
            Ok(Command::Register { email: "ana@example.edu".into(), password: "secret1".into(), display_name: Some("Ana Lee".into()) })
        );
        assert_eq!(
            parse_command("login ana@example.edu secret1"),
            Ok(Command::Login { email: "ana@example.edu".into(), password: "secret1".into() })
        );
        assert!(parse_command("login ana@example.edu").is_err());
        assert_eq!(parse_command("password brand new"), Ok(Command::Password("brand new".into())));
    }

    #[test]
    fn parses_score() {
        let Ok(Command::Score(s)) = parse_command("score Robot | Line follower | https://f/a.pdf https://f/b.zip") else {
            panic!("expected score");
        };
        assert_eq!(s.title, "Robot");
        assert_eq!(s.description, "Line follower");
        assert_eq!(s.file_urls, vec!["https://f/a.pdf".to_string(), "https://f/b.zip".to_string()]);
        assert!(parse_command("score only-title").is_err());
    }

    #[test]
    fn rejects_unknown() {
        assert!(parse_command("frobnicate").unwrap_err().contains("unknown command"));
    }
}
