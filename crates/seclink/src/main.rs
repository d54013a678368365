mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "seclink", version, about = "Security-chip link CLI")]
struct Cli {
    /// Session configuration file (default: ./seclink.json if present).
    #[arg(long, value_name = "PATH", global = true, env = "SECLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, cli.config.as_deref(), format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "seclink", "send", "--ins", "0x2A", "--p1", "1", "--hex", "a1b2",
        ])
        .expect("send args should parse");
        assert!(matches!(cli.command, Command::Send(_)));
    }

    #[test]
    fn rejects_conflicting_body_args() {
        let err = Cli::try_parse_from([
            "seclink", "send", "--ins", "1", "--hex", "a1", "--data", "x",
        ])
        .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_reset_with_mode_and_pin() {
        let cli = Cli::try_parse_from([
            "seclink",
            "reset",
            "--mode",
            "update-pin",
            "--pin",
            "123456",
        ])
        .expect("reset args should parse");
        match cli.command {
            Command::Reset(args) => {
                assert!(matches!(args.mode, cmd::ResetModeArg::UpdatePin));
                assert_eq!(args.pin.as_deref(), Some("123456"));
            }
            other => panic!("expected reset, got {other:?}"),
        }
    }

    #[test]
    fn global_config_flag_is_accepted_anywhere() {
        let cli = Cli::try_parse_from(["seclink", "info", "--config", "/etc/seclink.json"])
            .expect("info args should parse");
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/etc/seclink.json")));
    }
}
