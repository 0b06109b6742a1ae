//! 暗号エラー型

/// 暗号操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// 鍵または IV の長さが不正（16バイト以外）
    #[error("Invalid key length (expected 16 bytes, got {0})")]
    InvalidKeyLength(usize),
    /// Base64 デコードに失敗
    #[error("Invalid Base64 encoding")]
    InvalidBase64,
    /// 暗号文の長さがブロック長の正の倍数ではない
    #[error("Invalid ciphertext length {len} (expected a positive multiple of 16)")]
    InvalidCiphertextLength { len: usize },
    /// 復号後の PKCS#7 パディングが壊れている
    #[error("Invalid PKCS#7 padding")]
    PaddingError,
}
