use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::app::{self, Exportable};
use crate::cli::{Flow, ShellCommand, ShellLine, SqlArgs};
use crate::commands::{connect, disconnect, DEFAULT_ADHOC_SQL};
use crate::db::Clock;
use crate::error::AppError;
use crate::models::ConnectionDescriptor;
use crate::output::{self, DEFAULT_MAX_ROWS};
use crate::state::Session;

const PROMPT: &str = "adsview> ";

/// What one typed line asks for.
#[derive(Debug)]
pub enum Input {
    Empty,
    /// `sql` followed by the statement, kept verbatim
    Sql(String),
    Command(ShellCommand),
}

/// Split off `sql` first so the statement never goes through word splitting.
pub fn parse_line(line: &str) -> Result<Input, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Input::Empty);
    }

    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };
    if head.eq_ignore_ascii_case("sql") {
        let sql = if rest.is_empty() { DEFAULT_ADHOC_SQL } else { rest };
        return Ok(Input::Sql(sql.to_string()));
    }

    let words = shlex::split(trimmed).ok_or_else(|| "unbalanced quotes".to_string())?;
    ShellLine::try_parse_from(words)
        .map(|parsed| Input::Command(parsed.command))
        .map_err(|e| e.render().to_string())
}

/// Interactive loop. Errors are printed and the session carries on; only
/// end of input or `quit` leaves.
pub async fn run<C: Clock>(
    session: &Session<C>,
    mut descriptor: ConnectionDescriptor,
    json: bool,
) -> Result<(), AppError> {
    reconnect(session, &descriptor).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last: Option<Exportable> = None;

    loop {
        print!("{}", PROMPT);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let command = match parse_line(&line) {
            Ok(Input::Empty) => continue,
            Ok(Input::Sql(sql)) => ShellCommand::Flow(Flow::Sql(SqlArgs {
                sql: Some(sql),
                rows: DEFAULT_MAX_ROWS,
                ..SqlArgs::default()
            })),
            Ok(Input::Command(command)) => command,
            Err(message) => {
                eprintln!("{}", message.trim_end());
                continue;
            }
        };

        match command {
            ShellCommand::Quit => break,
            ShellCommand::Connect { url } => {
                if let Some(url) = url {
                    descriptor = ConnectionDescriptor::Url(url);
                }
                reconnect(session, &descriptor).await;
            }
            ShellCommand::Disconnect => {
                disconnect(session).await;
                println!("disconnected");
            }
            ShellCommand::ClearCache => {
                let dropped = session.cache_len();
                session.invalidate_cache();
                println!("cleared {} cached results", dropped);
            }
            ShellCommand::Export { path } => match &last {
                Some(exportable) => {
                    let path = path.unwrap_or_else(|| PathBuf::from(&exportable.default_name));
                    if let Err(e) = app::write_export(&exportable.result, Path::new(&path)) {
                        output::print_error(&e);
                    }
                }
                None => eprintln!("nothing to export yet"),
            },
            ShellCommand::Flow(flow) => match app::execute(session, &flow, json).await {
                Ok(Some(exportable)) => last = Some(exportable),
                Ok(None) => {}
                Err(e) => output::print_error(&e),
            },
        }
    }

    Ok(())
}

async fn reconnect<C: Clock>(session: &Session<C>, descriptor: &ConnectionDescriptor) {
    match connect(session, descriptor.clone()).await {
        Ok(info) => println!(
            "connected to {} ({} ms)",
            info.target,
            info.latency_ms.unwrap_or_default()
        ),
        Err(e) => output::print_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::TablesArgs;

    #[test]
    fn sql_keeps_the_rest_of_the_line_verbatim() {
        match parse_line("sql SELECT 'a  b' AS \"x y\" -- note").unwrap() {
            Input::Sql(sql) => assert_eq!(sql, "SELECT 'a  b' AS \"x y\" -- note"),
            other => panic!("expected sql, got {:?}", other),
        }
        match parse_line("  SQL\tselect 1").unwrap() {
            Input::Sql(sql) => assert_eq!(sql, "select 1"),
            other => panic!("expected sql, got {:?}", other),
        }
    }

    #[test]
    fn bare_sql_runs_the_default_statement() {
        match parse_line("sql").unwrap() {
            Input::Sql(sql) => assert_eq!(sql, DEFAULT_ADHOC_SQL),
            other => panic!("expected sql, got {:?}", other),
        }
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert!(matches!(parse_line("   ").unwrap(), Input::Empty));
    }

    #[test]
    fn quoted_words_survive_splitting() {
        let input = parse_line("dashboard --campaign 'Brand Exact' --asin B000TEST01").unwrap();
        let Input::Command(ShellCommand::Flow(Flow::Dashboard(args))) = input else {
            panic!("expected dashboard");
        };
        assert_eq!(args.campaigns, vec!["Brand Exact"]);
        assert_eq!(args.asins, vec!["B000TEST01"]);
    }

    #[test]
    fn shell_commands_parse() {
        assert!(matches!(
            parse_line("tables").unwrap(),
            Input::Command(ShellCommand::Flow(Flow::Tables(TablesArgs { schema: None })))
        ));
        assert!(matches!(
            parse_line("clear-cache").unwrap(),
            Input::Command(ShellCommand::ClearCache)
        ));
        assert!(matches!(
            parse_line("connect postgres://ads@db/ads").unwrap(),
            Input::Command(ShellCommand::Connect { url: Some(_) })
        ));
    }

    #[test]
    fn bad_lines_report_instead_of_failing() {
        assert_eq!(parse_line("dashboard --campaign 'open").unwrap_err(), "unbalanced quotes");
        assert!(parse_line("frobnicate").is_err());
        assert!(parse_line("preview").is_err());
    }
}
