//! Command-line parsing.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use gigcache_core::CalendarDay;

pub const USAGE: &str = "\
Usage: gigcache [COMMAND]

Commands:
  discover                 Show nearby events, from cache when fresh (default)
  refresh                  Fetch events even if the cache is fresh
  saved [YYYY-MM-DD]       Show saved events, optionally floating one day to the top
  save <id>                Save an event, or unsave it if already saved
  hide <id>                Hide an event for good
  only <genre>...          Show only events tagged with these genres (\"all\" resets)
  hide-genre <genre>       Hide a genre everywhere
  restore-genre <genre>    Show a hidden genre again
  radius <miles>           Set the search radius (5-150)
  days <n>                 Set the look-ahead window in days (0-60)
  through <YYYY-MM-DD>     Look ahead through a date
  endpoint                 Print the endpoint discovery would use
  login <username> <token> Store a bearer token in the OS keychain
  session <token>          Use a short-lived token for the next hour
  logout                   Forget stored tokens
  help                     Show this message

Environment: API_BASE_URL, SHOWS_ENDPOINT, SHOWS_PROXY_ENDPOINT, GIGCACHE_ORIGIN,
GIGCACHE_LAT, GIGCACHE_LON, GIGCACHE_TOKEN, GIGCACHE_REMOTE_DOC, GIGCACHE_LOG_DIR, RUST_LOG
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Discover,
    Refresh,
    Saved { day: Option<CalendarDay> },
    Save(String),
    Hide(String),
    Only(Vec<String>),
    HideGenre(String),
    RestoreGenre(String),
    Radius(i64),
    Days(i64),
    Through(NaiveDate),
    Endpoint,
    Login { username: String, token: String },
    Session(String),
    Logout,
    Help,
}

impl Command {
    /// Parse arguments after the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Discover);
        };
        let command = match name.as_str() {
            "discover" => Command::Discover,
            "refresh" => Command::Refresh,
            "saved" => Command::Saved {
                day: rest
                    .first()
                    .map(|raw| parse_date(raw).map(CalendarDay::from_date))
                    .transpose()?,
            },
            "save" => Command::Save(required(rest, "save <id>")?),
            "hide" => Command::Hide(required(rest, "hide <id>")?),
            "only" => {
                if rest.is_empty() {
                    bail!("Usage: only <genre>...");
                }
                Command::Only(rest.to_vec())
            }
            "hide-genre" => Command::HideGenre(rest.join(" ")),
            "restore-genre" => Command::RestoreGenre(rest.join(" ")),
            "radius" => Command::Radius(parse_number(rest, "radius <miles>")?),
            "days" => Command::Days(parse_number(rest, "days <n>")?),
            "through" => Command::Through(parse_date(&required(rest, "through <YYYY-MM-DD>")?)?),
            "endpoint" => Command::Endpoint,
            "login" => match rest {
                [username, token] => Command::Login {
                    username: username.clone(),
                    token: token.clone(),
                },
                _ => bail!("Usage: login <username> <token>"),
            },
            "session" => Command::Session(required(rest, "session <token>")?),
            "logout" => Command::Logout,
            "help" | "-h" | "--help" => Command::Help,
            other => bail!("Unknown command: {}\n\n{}", other, USAGE),
        };
        if matches!(command, Command::HideGenre(ref g) | Command::RestoreGenre(ref g) if g.trim().is_empty()) {
            bail!("Usage: {} <genre>", name);
        }
        Ok(command)
    }
}

fn required(rest: &[String], usage: &str) -> Result<String> {
    rest.first()
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| anyhow!("Usage: {}", usage))
}

fn parse_number(rest: &[String], usage: &str) -> Result<i64> {
    let raw = required(rest, usage)?;
    raw.trim()
        .parse()
        .with_context(|| format!("Not a whole number: {}", raw))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("Expected a date like 2030-03-14, got {}", raw))
}
