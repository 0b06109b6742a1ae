//! # camstream
//!
//! 暗号化 MJPEG-over-UDP の受信機（`serve`）とテスト用送信機（`send`）。
//!
//! ```text
//! camstream -v serve --key <B64> --iv <B64> --snapshot-dir ./frames
//! camstream send --to 127.0.0.1:20001 --key <B64> --iv <B64> a.jpg b.jpg
//! ```

use anyhow::anyhow;
use clap::{Arg, ArgAction, Command};

mod logger;
mod sink;

mod cmd_send;
mod cmd_serve;

const GLOBAL_ARG_VERBOSE: &str = "verbose";

fn build_cli_args() -> Command {
    Command::new("camstream")
        .about("Encrypted MJPEG-over-UDP frame receiver")
        .arg(
            Arg::new(GLOBAL_ARG_VERBOSE)
                .help("show verbose message")
                .num_args(0)
                .action(ArgAction::Count)
                .short('v')
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(cmd_serve::command())
        .subcommand(cmd_send::command())
}

fn main() -> anyhow::Result<()> {
    let args = build_cli_args().get_matches();

    let verbose_level = args
        .get_one::<u8>(GLOBAL_ARG_VERBOSE)
        .copied()
        .unwrap_or_default();
    let logger = logger::SyncLogger::new(verbose_level);
    logger.into_global_logger()?;

    match args.subcommand() {
        Some((cmd_serve::COMMAND, args)) => cmd_serve::run(args),
        Some((cmd_send::COMMAND, args)) => cmd_send::run(args),
        Some((cmd, _)) => Err(anyhow!("invalid subcommand {cmd}")),
        None => Err(anyhow!("no subcommand found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        build_cli_args().debug_assert();
    }

    #[test]
    fn test_verbose_is_global() {
        let args = build_cli_args()
            .try_get_matches_from(["camstream", "serve", "-vv"])
            .unwrap();
        let (_, sub) = args.subcommand().unwrap();
        assert_eq!(sub.get_one::<u8>(GLOBAL_ARG_VERBOSE).copied(), Some(2));
    }
}
