use std::net::{SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use log::info;

use camstream_crypto::ChainPolicy;
use camstream_decode::ColorMode;
use camstream_pipeline::{FrameBudget, FrameDriver, FrameSink, PipelineConfig};
use camstream_transport::AssemblyPolicy;

use crate::sink::{LogSink, SnapshotSink};

pub(super) const COMMAND: &str = "serve";

const COMMAND_ARG_CONFIG: &str = "config";
const COMMAND_ARG_BIND: &str = "bind";
const COMMAND_ARG_KEY: &str = "key";
const COMMAND_ARG_IV: &str = "iv";
const COMMAND_ARG_CHAIN: &str = "chain";
const COMMAND_ARG_ASSEMBLY: &str = "assembly";
const COMMAND_ARG_GRAYSCALE: &str = "grayscale";
const COMMAND_ARG_MAX_FRAMES: &str = "max-frames";
const COMMAND_ARG_SNAPSHOT_DIR: &str = "snapshot-dir";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("Receive, decrypt and decode camera frames")
        .arg(
            Arg::new(COMMAND_ARG_CONFIG)
                .help("JSON config file")
                .num_args(1)
                .value_name("CONFIG FILE")
                .value_parser(value_parser!(PathBuf))
                .long("config")
                .short('c'),
        )
        .arg(
            Arg::new(COMMAND_ARG_BIND)
                .help("local address to receive on")
                .num_args(1)
                .value_name("ADDRESS")
                .value_parser(value_parser!(SocketAddr))
                .long("bind"),
        )
        .arg(
            Arg::new(COMMAND_ARG_KEY)
                .help("AES-128 key (base64)")
                .num_args(1)
                .value_name("BASE64")
                .long("key"),
        )
        .arg(
            Arg::new(COMMAND_ARG_IV)
                .help("CBC initialization vector (base64)")
                .num_args(1)
                .value_name("BASE64")
                .long("iv"),
        )
        .arg(chain_policy_arg(COMMAND_ARG_CHAIN))
        .arg(
            Arg::new(COMMAND_ARG_ASSEMBLY)
                .help("how fragments are put back together")
                .num_args(1)
                .value_name("POLICY")
                .value_parser(
                    PossibleValuesParser::new(["arrival_order", "indexed"]).map(|s| {
                        match s.as_str() {
                            "indexed" => AssemblyPolicy::Indexed,
                            _ => AssemblyPolicy::ArrivalOrder,
                        }
                    }),
                )
                .long("assembly"),
        )
        .arg(
            Arg::new(COMMAND_ARG_GRAYSCALE)
                .help("decode frames as grayscale")
                .action(ArgAction::SetTrue)
                .long("grayscale"),
        )
        .arg(
            Arg::new(COMMAND_ARG_MAX_FRAMES)
                .help("stop after presenting this many frames")
                .num_args(1)
                .value_name("COUNT")
                .value_parser(value_parser!(u64).range(1..))
                .long("max-frames")
                .short('n'),
        )
        .arg(
            Arg::new(COMMAND_ARG_SNAPSHOT_DIR)
                .help("write the latest frame as PNG into this directory")
                .num_args(1)
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .long("snapshot-dir"),
        )
}

/// `--chain` 引数（serve / send 共通）
pub(super) fn chain_policy_arg(id: &'static str) -> Arg {
    Arg::new(id)
        .help("CBC chaining across frames")
        .num_args(1)
        .value_name("POLICY")
        .value_parser(
            PossibleValuesParser::new(["continuous", "per_frame"]).map(|s| match s.as_str() {
                "per_frame" => ChainPolicy::PerFrame,
                _ => ChainPolicy::Continuous,
            }),
        )
        .long("chain")
}

/// 設定ファイルを読み、コマンドライン引数で上書きする
fn load_config(args: &ArgMatches) -> anyhow::Result<PipelineConfig> {
    let mut config = match args.get_one::<PathBuf>(COMMAND_ARG_CONFIG) {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(bind) = args.get_one::<SocketAddr>(COMMAND_ARG_BIND) {
        config.bind = *bind;
    }
    if let Some(key) = args.get_one::<String>(COMMAND_ARG_KEY) {
        config.key = Some(key.clone());
    }
    if let Some(iv) = args.get_one::<String>(COMMAND_ARG_IV) {
        config.iv = Some(iv.clone());
    }
    if let Some(policy) = args.get_one::<ChainPolicy>(COMMAND_ARG_CHAIN) {
        config.chain_policy = *policy;
    }
    if let Some(policy) = args.get_one::<AssemblyPolicy>(COMMAND_ARG_ASSEMBLY) {
        config.assembly = *policy;
    }
    if args.get_flag(COMMAND_ARG_GRAYSCALE) {
        config.color = ColorMode::Grayscale;
    }

    config.validate()?;
    Ok(config)
}

fn build_sink(snapshot_dir: Option<&Path>) -> anyhow::Result<Box<dyn FrameSink>> {
    match snapshot_dir {
        Some(dir) => {
            let sink = SnapshotSink::create(dir)
                .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;
            info!("writing snapshots to {}", sink.path().display());
            Ok(Box::new(sink))
        }
        None => Ok(Box::new(LogSink::default())),
    }
}

pub(super) fn run(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let stop = match args.get_one::<u64>(COMMAND_ARG_MAX_FRAMES) {
        Some(max) => FrameBudget::new(*max),
        None => FrameBudget::unlimited(),
    };
    let sink = build_sink(
        args.get_one::<PathBuf>(COMMAND_ARG_SNAPSHOT_DIR)
            .map(PathBuf::as_path),
    )?;

    let socket = UdpSocket::bind(config.bind)
        .with_context(|| format!("failed to bind udp socket to {}", config.bind))?;
    info!(
        "listening on {} (chain={:?}, assembly={:?})",
        socket.local_addr()?,
        config.chain_policy,
        config.assembly
    );

    let mut driver = FrameDriver::from_config(&config, socket, sink, stop)?;
    let result = driver.run();
    println!("{}", driver.stats().to_json());
    result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn matches(args: &[&str]) -> ArgMatches {
        command().try_get_matches_from(args).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = matches(&[
            "serve",
            "--bind",
            "127.0.0.1:9000",
            "--key",
            "MDEyMzQ1Njc4OWFiY2RlZg",
            "--iv",
            "AAAAAAAAAAAAAAAAAAAAAA",
            "--chain",
            "per_frame",
            "--assembly",
            "indexed",
            "--grayscale",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.chain_policy, ChainPolicy::PerFrame);
        assert_eq!(config.assembly, AssemblyPolicy::Indexed);
        assert_eq!(config.color, ColorMode::Grayscale);
        assert!(config.key_material().is_ok());
    }

    #[test]
    fn test_flags_override_config_file() {
        let path = std::env::temp_dir().join(format!("camstream-serve-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"{"key": "MDEyMzQ1Njc4OWFiY2RlZg", "iv": "AAAAAAAAAAAAAAAAAAAAAA", "chain_policy": "per_frame"}"#,
        )
        .unwrap();

        let args = matches(&["serve", "--config", path.to_str().unwrap(), "--chain", "continuous"]);
        let config = load_config(&args).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.chain_policy, ChainPolicy::Continuous);
        assert_eq!(config.key.as_deref(), Some("MDEyMzQ1Njc4OWFiY2RlZg"));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(command()
            .try_get_matches_from(["serve", "--chain", "ecb"])
            .is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let args = matches(&["serve", "--config", "/nonexistent/camstream.json"]);
        assert!(load_config(&args).is_err());
    }
}
