//! テスト用送信機
//!
//! JPEG ファイルをカメラ側ファームウェアと同じ手順で送る：
//! PKCS#7 パディング → AES-128-CBC → 1400 バイトごとに分割 → トレーラー付与。

use std::fs;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{Arg, ArgMatches, Command, value_parser};
use log::{debug, info};

use camstream_crypto::{ChainPolicy, FrameSealer, decode_base64_block};
use camstream_transport::{DEFAULT_FRAGMENT_SIZE, Fragmenter};

use crate::cmd_serve::chain_policy_arg;

pub(super) const COMMAND: &str = "send";

const COMMAND_ARG_TO: &str = "to";
const COMMAND_ARG_KEY: &str = "key";
const COMMAND_ARG_IV: &str = "iv";
const COMMAND_ARG_CHAIN: &str = "chain";
const COMMAND_ARG_FRAGMENT_SIZE: &str = "fragment-size";
const COMMAND_ARG_REPEAT: &str = "repeat";
const COMMAND_ARG_INTERVAL: &str = "interval-ms";
const COMMAND_ARG_FILES: &str = "files";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("Encrypt and send JPEG files the way the camera does")
        .arg(
            Arg::new(COMMAND_ARG_TO)
                .help("receiver address")
                .num_args(1)
                .value_name("ADDRESS")
                .value_parser(value_parser!(SocketAddr))
                .long("to")
                .required(true),
        )
        .arg(
            Arg::new(COMMAND_ARG_KEY)
                .help("AES-128 key (base64)")
                .num_args(1)
                .value_name("BASE64")
                .long("key")
                .required(true),
        )
        .arg(
            Arg::new(COMMAND_ARG_IV)
                .help("CBC initialization vector (base64)")
                .num_args(1)
                .value_name("BASE64")
                .long("iv")
                .required(true),
        )
        .arg(chain_policy_arg(COMMAND_ARG_CHAIN))
        .arg(
            Arg::new(COMMAND_ARG_FRAGMENT_SIZE)
                .help("payload bytes per datagram")
                .num_args(1)
                .value_name("BYTES")
                .value_parser(value_parser!(u16).range(1..))
                .default_value("1400")
                .long("fragment-size"),
        )
        .arg(
            Arg::new(COMMAND_ARG_REPEAT)
                .help("send the file list this many times")
                .num_args(1)
                .value_name("COUNT")
                .value_parser(value_parser!(u64))
                .default_value("1")
                .long("repeat"),
        )
        .arg(
            Arg::new(COMMAND_ARG_INTERVAL)
                .help("pause between frames")
                .num_args(1)
                .value_name("MILLISECONDS")
                .value_parser(value_parser!(u64))
                .default_value("100")
                .long("interval-ms"),
        )
        .arg(
            Arg::new(COMMAND_ARG_FILES)
                .help("JPEG files to send, one frame each")
                .num_args(1..)
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
}

/// 1 フレームずつ暗号化・分割して送る
pub(crate) struct FrameSender {
    socket: UdpSocket,
    peer: SocketAddr,
    sealer: FrameSealer,
    fragmenter: Fragmenter,
}

impl FrameSender {
    pub(crate) fn new(
        peer: SocketAddr,
        sealer: FrameSealer,
        fragmenter: Fragmenter,
    ) -> io::Result<Self> {
        let local = match peer {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        Ok(FrameSender {
            socket: UdpSocket::bind(local)?,
            peer,
            sealer,
            fragmenter,
        })
    }

    /// 送ったデータグラム数を返す
    pub(crate) fn send_frame(&mut self, plaintext: &[u8]) -> io::Result<usize> {
        let ciphertext = self.sealer.seal(plaintext);
        let datagrams = self.fragmenter.make_datagrams(&ciphertext);
        for datagram in &datagrams {
            self.socket.send_to(datagram, self.peer)?;
        }
        debug!(
            "sent frame id={:#04x}: {} bytes in {} datagrams",
            self.fragmenter.last_frame_id(),
            ciphertext.len(),
            datagrams.len()
        );
        Ok(datagrams.len())
    }
}

pub(super) fn run(args: &ArgMatches) -> anyhow::Result<()> {
    let decode = |id: &str| -> anyhow::Result<[u8; 16]> {
        let value = args
            .get_one::<String>(id)
            .ok_or_else(|| anyhow!("no --{id} given"))?;
        decode_base64_block(value).map_err(|e| anyhow!("invalid --{id}: {e}"))
    };
    let key = decode(COMMAND_ARG_KEY)?;
    let iv = decode(COMMAND_ARG_IV)?;

    let peer = *args
        .get_one::<SocketAddr>(COMMAND_ARG_TO)
        .ok_or_else(|| anyhow!("no --to given"))?;
    let policy = args
        .get_one::<ChainPolicy>(COMMAND_ARG_CHAIN)
        .copied()
        .unwrap_or_default();
    let fragment_size = args
        .get_one::<u16>(COMMAND_ARG_FRAGMENT_SIZE)
        .map(|&size| usize::from(size))
        .unwrap_or(DEFAULT_FRAGMENT_SIZE);
    let repeat = args.get_one::<u64>(COMMAND_ARG_REPEAT).copied().unwrap_or(1);
    let interval = Duration::from_millis(
        args.get_one::<u64>(COMMAND_ARG_INTERVAL)
            .copied()
            .unwrap_or_default(),
    );

    let frames = args
        .get_many::<PathBuf>(COMMAND_ARG_FILES)
        .into_iter()
        .flatten()
        .map(|path| {
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut sender = FrameSender::new(
        peer,
        FrameSealer::new(key, iv, policy),
        Fragmenter::new(fragment_size),
    )
    .context("failed to open udp socket")?;

    let mut sent_frames = 0u64;
    let mut sent_datagrams = 0usize;
    for _ in 0..repeat {
        for frame in &frames {
            sent_datagrams += sender
                .send_frame(frame)
                .with_context(|| format!("failed to send to {peer}"))?;
            sent_frames += 1;
            thread::sleep(interval);
        }
    }
    info!("sent {sent_frames} frames ({sent_datagrams} datagrams) to {peer}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, RgbImage};

    use camstream_crypto::FrameCipher;
    use camstream_decode::{ColorMode, JpegDecoder};
    use camstream_pipeline::{FrameBudget, FrameDriver, PipelineStats};
    use camstream_transport::{AssemblyPolicy, Reassembler};

    use super::*;
    use crate::sink::LogSink;

    const KEY: [u8; 16] = *b"0123456789abcdef";
    const IV: [u8; 16] = *b"fedcba9876543210";

    fn sample_jpeg() -> Vec<u8> {
        let image = RgbImage::from_fn(40, 30, |x, y| image::Rgb([x as u8 * 6, y as u8 * 8, 0x40]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();
        bytes
    }

    #[test]
    fn test_send_and_receive_over_loopback() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let peer = receiver.local_addr().unwrap();

        let mut sender = FrameSender::new(
            peer,
            FrameSealer::new(KEY, IV, ChainPolicy::Continuous),
            Fragmenter::new(256),
        )
        .unwrap();
        let jpeg = sample_jpeg();
        let first = sender.send_frame(&jpeg).unwrap();
        let second = sender.send_frame(&jpeg).unwrap();
        assert!(first > 1);
        assert_eq!(first, second);

        let mut driver = FrameDriver::new(
            receiver,
            LogSink::default(),
            FrameBudget::new(2),
            JpegDecoder::new(ColorMode::Color),
            FrameCipher::new(KEY, IV, ChainPolicy::Continuous),
            Reassembler::new(AssemblyPolicy::ArrivalOrder),
        );
        let stats: PipelineStats = driver.run().unwrap();
        assert_eq!(stats.frames_presented, 2);
        assert_eq!(stats.datagrams, (first + second) as u64);
    }

    #[test]
    fn test_command_requires_files() {
        let result = command().try_get_matches_from([
            "send", "--to", "127.0.0.1:20001", "--key", "AAAAAAAAAAAAAAAAAAAAAA", "--iv",
            "AAAAAAAAAAAAAAAAAAAAAA",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_fragment_size_rejected() {
        let result = command().try_get_matches_from([
            "send", "--to", "127.0.0.1:20001", "--key", "k", "--iv", "i", "--fragment-size", "0",
            "a.jpg",
        ]);
        assert!(result.is_err());
    }
}
