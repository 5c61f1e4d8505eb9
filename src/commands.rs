//! In-band commands.
//!
//! Any line starting with `@` is a command. Only the first whitespace
//! delimited token is significant; the rest of the line is ignored.
//!
//! ```text
//! @list   -> names of all connected sessions, one per line
//! @quit   -> Bye!\n, then the connection closes
//! @other  -> invalid command
//! ```

use crate::registry::Registry;
use crate::session::Session;
use std::time::Duration;
use tracing::{debug, info};

pub const BYE: &str = "Bye!\n";
pub const INVALID_COMMAND: &str = "invalid command";

/// How long `@quit` waits for room in a backed-up outbound queue
const FAREWELL_TIMEOUT: Duration = Duration::from_secs(1);

/// Classification of an inbound line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    List,
    Quit,
    Unrecognized(&'a str),
    NotACommand,
}

impl<'a> Command<'a> {
    /// Classify an already trimmed line.
    pub fn parse(line: &'a str) -> Self {
        if !line.starts_with('@') {
            return Command::NotACommand;
        }

        let token = line.split_whitespace().next().unwrap_or(line);
        match token {
            "@list" => Command::List,
            "@quit" => Command::Quit,
            other => Command::Unrecognized(other),
        }
    }
}

/// Run `line` as a command on behalf of `session`.
///
/// Returns false when the line is not a command and should be broadcast.
pub async fn try_handle(line: &str, session: &Session, registry: &Registry) -> bool {
    let command = Command::parse(line);
    if command == Command::NotACommand {
        return false;
    }
    info!(?command, "parsing a command");

    let result = match command {
        Command::List => {
            let mut names = registry.list().join("\n");
            names.push('\n');
            session.send(names)
        }
        Command::Quit => {
            let result = session.send_within(BYE, FAREWELL_TIMEOUT).await;
            session.close();
            result
        }
        Command::Unrecognized(token) => {
            debug!(token, "Unrecognized command");
            session.send(INVALID_COMMAND)
        }
        Command::NotACommand => Ok(()),
    };

    if let Err(e) = result {
        debug!(name = session.name(), error = %e, "Failed to queue command reply");
    }
    true
}
