//! フレームパイプラインの駆動
//!
//! ## 状態遷移
//!
//! ```text
//!                complete = 0
//!               ┌────────────┐
//!               ▼            │
//!   ──▶ Accumulating ────────┘
//!          ▲   │ complete != 0
//!          │   ▼
//!          │ FrameReady ── 復号 / パディング / デコード失敗 ──┐
//!          │   │ 成功                                         │
//!          │   ▼                                              │
//!          ├─ Presenting (シンクに渡す)                       │
//!          └──────────────────────────────────────────────────┘
//! ```
//!
//! 1 スレッドで受信 → 解析 → 追加 →（完成時）復号・デコード・表示を順に行う。
//! 停止シグナルはフレーム 1 サイクルが終わるたびに確認する。

use log::{debug, info, trace, warn};

use camstream_crypto::{BLOCK_SIZE, FrameCipher};
use camstream_decode::{DecodedFrame, ImageDecoder, JpegDecoder};
use camstream_transport::{Datagram, Reassembler, Trailer};

use crate::config::{DEFAULT_MAX_FRAME_BYTES, DEFAULT_RECV_BUFFER_SIZE, PipelineConfig};
use crate::error::{ConfigError, FrameFailure, PipelineError};
use crate::sink::{FrameSink, StopSignal};
use crate::source::DatagramSource;
use crate::stats::PipelineStats;

/// 駆動側の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// フラグメントを蓄積中
    Accumulating,
    /// フレームが揃い、復号・デコード待ち
    FrameReady,
    /// デコード済みフレームをシンクに渡している
    Presenting,
}

/// 表示したフレームの概要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// 完成させたデータグラムのトレーラーにあった frame_id
    pub frame_id: u8,
    pub ciphertext_len: usize,
    pub plaintext_len: usize,
    pub width: u32,
    pub height: u32,
}

/// データグラム 1 つを処理した結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// 不正なデータグラムを捨てた（組み立てバッファは変化なし）
    Dropped,
    /// フラグメントを追加し、フレームはまだ完成していない
    Accumulating,
    /// 上限を超えたフレームの残りのフラグメントを読み捨てている
    Skipping,
    /// フレームを表示した
    Presented(FrameInfo),
    /// フレームを表示せずに捨てた
    Discarded(FrameFailure),
}

impl Step {
    /// フレームの 1 サイクルが終わったか（停止シグナルを確認するタイミング）
    pub fn completes_frame(&self) -> bool {
        matches!(self, Step::Presented(_) | Step::Discarded(_))
    }
}

/// 受信 → 再組み立て → 復号 → デコード → 表示 の駆動ループ
///
/// ソケット・暗号状態・表示シンクはすべて呼び出し側から渡され、
/// このインスタンスが排他的に所有する。
pub struct FrameDriver<S, K, T, D = JpegDecoder> {
    source: S,
    sink: K,
    stop: T,
    decoder: D,
    cipher: FrameCipher,
    reassembler: Reassembler,
    recv_buffer_size: usize,
    max_frame_bytes: usize,
    state: DriverState,
    stats: PipelineStats,
    /// 上限超過で読み捨て中のフレーム
    overflow: Option<Overflow>,
}

/// 読み捨て中フレームの長さと末尾ブロック
///
/// 完了フラグメントが届いたら末尾 16 バイトで暗号の連鎖を進める。
#[derive(Debug, Default)]
struct Overflow {
    len: usize,
    tail: Vec<u8>,
}

impl Overflow {
    fn push(&mut self, payload: &[u8]) {
        self.len += payload.len();
        self.tail.extend_from_slice(payload);
        let excess = self.tail.len().saturating_sub(BLOCK_SIZE);
        self.tail.drain(..excess);
    }
}

impl<S, K, T> FrameDriver<S, K, T, JpegDecoder>
where
    S: DatagramSource,
    K: FrameSink,
    T: StopSignal,
{
    /// 設定から駆動ループを組み立てる
    ///
    /// # エラー
    /// - 鍵・IV が未設定または不正
    /// - 値の範囲が不正
    pub fn from_config(
        config: &PipelineConfig,
        source: S,
        sink: K,
        stop: T,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (key, iv) = config.key_material()?;

        Ok(FrameDriver::new(
            source,
            sink,
            stop,
            JpegDecoder::new(config.color),
            FrameCipher::new(key, iv, config.chain_policy),
            Reassembler::new(config.assembly),
        )
        .with_recv_buffer_size(config.recv_buffer_size)
        .with_max_frame_bytes(config.max_frame_bytes))
    }
}

impl<S, K, T, D> FrameDriver<S, K, T, D>
where
    S: DatagramSource,
    K: FrameSink,
    T: StopSignal,
    D: ImageDecoder,
{
    pub fn new(
        source: S,
        sink: K,
        stop: T,
        decoder: D,
        cipher: FrameCipher,
        reassembler: Reassembler,
    ) -> Self {
        FrameDriver {
            source,
            sink,
            stop,
            decoder,
            cipher,
            reassembler,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            state: DriverState::Accumulating,
            stats: PipelineStats::default(),
            overflow: None,
        }
    }

    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    pub fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    /// 受信元が閉じるか停止シグナルが立つまでブロッキングで処理を続ける
    ///
    /// # エラー
    /// - `PipelineError::Receive`: 受信エラー（致命的）
    /// - `PipelineError::Sink`: 表示シンクのエラー（致命的）
    pub fn run(&mut self) -> Result<PipelineStats, PipelineError> {
        let mut buf = vec![0u8; self.recv_buffer_size];
        loop {
            let Some(len) = self
                .source
                .recv_datagram(&mut buf)
                .map_err(PipelineError::Receive)?
            else {
                info!("datagram source closed");
                break;
            };

            let step = self.handle_datagram(&buf[..len])?;
            if step.completes_frame() && self.stop.should_stop(&self.stats) {
                info!("stop requested after {} frames", self.stats.frames_presented);
                break;
            }
        }
        Ok(self.stats.clone())
    }

    /// データグラム 1 つを処理する
    pub fn handle_datagram(&mut self, bytes: &[u8]) -> Result<Step, PipelineError> {
        self.stats.datagrams += 1;

        let datagram = match Datagram::parse(bytes) {
            Ok(datagram) => datagram,
            Err(e) => {
                self.stats.malformed_datagrams += 1;
                warn!("dropped datagram: {e}");
                return Ok(Step::Dropped);
            }
        };
        let Datagram { payload, trailer } = datagram;
        info!("{trailer} payload={}", payload.len());

        self.stats.payload_bytes += payload.len() as u64;

        // 上限超過したフレームは complete が来るまで読み捨て、1 サイクルとして数える
        if let Some(overflow) = self.overflow.as_mut() {
            overflow.push(payload);
            if !trailer.complete {
                return Ok(Step::Skipping);
            }
            let Overflow { len, tail } = self.overflow.take().unwrap_or_default();
            self.cipher.skip(&tail);
            return Ok(self.discard(&trailer, FrameFailure::TooLarge { len }));
        }

        let Some(ciphertext) = self.reassembler.accept(&trailer, payload) else {
            let buffered = self.reassembler.buffered_len();
            if buffered > self.max_frame_bytes {
                self.reassembler.reset();
                let mut overflow = Overflow {
                    len: buffered - payload.len(),
                    tail: Vec::with_capacity(BLOCK_SIZE),
                };
                overflow.push(payload);
                warn!(
                    "frame id={:#04x} exceeds {} bytes, skipping until complete",
                    trailer.frame_id, self.max_frame_bytes
                );
                self.overflow = Some(overflow);
                return Ok(Step::Skipping);
            }
            return Ok(Step::Accumulating);
        };

        self.transition(DriverState::FrameReady);
        if ciphertext.len() > self.max_frame_bytes {
            // 送信側の連鎖はこのフレームの分だけ進んでいる
            self.cipher.skip(&ciphertext);
            return Ok(self.discard(
                &trailer,
                FrameFailure::TooLarge {
                    len: ciphertext.len(),
                },
            ));
        }

        let frame = match self.unwrap_frame(&ciphertext) {
            Ok(frame) => frame,
            Err(failure) => return Ok(self.discard(&trailer, failure)),
        };

        self.transition(DriverState::Presenting);
        let result = self.sink.present(&frame.decoded);
        self.transition(DriverState::Accumulating);
        result.map_err(PipelineError::Sink)?;

        self.stats.frames_presented += 1;
        let info = FrameInfo {
            frame_id: trailer.frame_id,
            ciphertext_len: ciphertext.len(),
            plaintext_len: frame.plaintext_len,
            width: frame.decoded.width,
            height: frame.decoded.height,
        };
        debug!(
            "presented frame id={:#04x} {}x{} ({} bytes)",
            info.frame_id, info.width, info.height, info.plaintext_len
        );
        Ok(Step::Presented(info))
    }

    /// 復号 → パディング除去 → デコード
    fn unwrap_frame(&mut self, ciphertext: &[u8]) -> Result<UnwrappedFrame, FrameFailure> {
        let plaintext = self.cipher.decrypt_and_unpad(ciphertext)?;
        let decoded = self
            .decoder
            .decode(&plaintext)
            .ok_or(FrameFailure::Decode)?;
        Ok(UnwrappedFrame {
            plaintext_len: plaintext.len(),
            decoded,
        })
    }

    fn discard(&mut self, trailer: &Trailer, failure: FrameFailure) -> Step {
        warn!("discarded frame id={:#04x}: {failure}", trailer.frame_id);
        self.stats.record_failure(&failure);
        self.transition(DriverState::Accumulating);
        Step::Discarded(failure)
    }

    fn transition(&mut self, next: DriverState) {
        if self.state != next {
            trace!("{:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// 組み立て中のバッファ長
    pub fn buffered_len(&self) -> usize {
        self.reassembler.buffered_len()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

struct UnwrappedFrame {
    plaintext_len: usize,
    decoded: DecodedFrame,
}
