use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

/// Upper bound of `--session-ttl`: one week
const MAX_SESSION_TTL_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Parser)]
#[command(
    name = "paperasse",
    version,
    about = "Fetch URSSAF schedules and KBIS extracts from the command line"
)]
pub struct Cli {
    /// Log every handshake step to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the yearly URSSAF contribution schedule
    Urssaf(UrssafArgs),

    /// Download a company's KBIS extract from monidenum
    Kbis(KbisArgs),
}

#[derive(Debug, Subcommand)]
pub enum Action {
    /// Forget the stored credential (and cached session)
    Logout,
}

#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct UrssafArgs {
    #[command(subcommand)]
    pub action: Option<Action>,

    /// Schedule year, the current year when omitted
    pub year: Option<i32>,
}

#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct KbisArgs {
    #[command(subcommand)]
    pub action: Option<Action>,

    /// Company id or SIREN; lists the companies when omitted
    pub company: Option<String>,

    /// Directory receiving the PDF (defaults to the download directory)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Minutes a portal session is reused before logging in again
    #[arg(
        long,
        env = "PAPERASSE_SESSION_TTL",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SESSION_TTL_MINUTES)
    )]
    pub session_ttl: u64,

    /// Redirects followed after login while looking for the session cookie
    #[arg(long, env = "PAPERASSE_MAX_HOPS", default_value_t = 5)]
    pub max_hops: usize,
}

impl KbisArgs {
    /// `--session-ttl` as a duration, `None` if the minutes overflow
    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl.checked_mul(60).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_urssaf_year() {
        let cli = Cli::try_parse_from(["paperasse", "urssaf", "2024"]).unwrap();
        match cli.command {
            Command::Urssaf(args) => {
                assert_eq!(args.year, Some(2024));
                assert!(args.action.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_logout() {
        let cli = Cli::try_parse_from(["paperasse", "kbis", "logout"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Kbis(KbisArgs {
                action: Some(Action::Logout),
                ..
            })
        ));
    }

    #[test]
    fn test_kbis_options() {
        let cli = Cli::try_parse_from([
            "paperasse", "-v", "kbis", "123456789", "--max-hops", "3", "--out", "/tmp/kbis",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Command::Kbis(args) => {
                assert_eq!(args.company.as_deref(), Some("123456789"));
                assert_eq!(args.max_hops, 3);
                assert_eq!(args.out, Some(PathBuf::from("/tmp/kbis")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_session_ttl_bounds() {
        let cli = Cli::try_parse_from(["paperasse", "kbis", "--session-ttl", "45"]).unwrap();
        match cli.command {
            Command::Kbis(args) => {
                assert_eq!(args.session_ttl(), Some(Duration::from_secs(45 * 60)));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        for ttl in ["0", "10081", "18446744073709551615"] {
            let err = Cli::try_parse_from(["paperasse", "kbis", "--session-ttl", ttl]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation, "ttl {ttl}");
        }
    }

    #[test]
    fn test_help_exits_cleanly() {
        let err = Cli::try_parse_from(["paperasse", "-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
