//! camstream-pipeline エラー型

use std::io;
use std::path::PathBuf;

use camstream_crypto::CryptoError;

/// パイプラインを止める致命的なエラー
///
/// フレーム単位の失敗（復号・デコード失敗など）は [`FrameFailure`] として扱い、
/// ここには含めない。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// データグラム受信に失敗（ソケットエラー）
    #[error("failed to receive datagram: {0}")]
    Receive(#[source] io::Error),
    /// 表示シンクへの出力に失敗
    #[error("display sink failed: {0}")]
    Sink(#[source] io::Error),
}

/// フレーム単位の継続可能な失敗
///
/// 組み立て済みバッファを捨てて `Accumulating` に戻る。フレームは表示しない。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameFailure {
    /// 組み立て中のバッファが上限を超えた
    #[error("frame buffer of {len} bytes exceeds the configured limit")]
    TooLarge { len: usize },
    /// 復号またはパディング除去に失敗
    #[error("failed to decrypt frame: {0}")]
    Cipher(#[from] CryptoError),
    /// 平文が画像として解釈できない
    #[error("failed to decode frame image")]
    Decode,
}

/// 設定の読み込み・検証エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("missing required setting '{0}'")]
    Missing(&'static str),
    #[error("invalid '{field}': {source}")]
    Key {
        field: &'static str,
        source: CryptoError,
    },
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
