//! camstream-transport エラー型

/// トランスポート層のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// データグラムがトレーラー（3 バイト）より短い
    #[error("Malformed datagram: {len} bytes is shorter than the 3-byte trailer")]
    MalformedDatagram { len: usize },
}
