//! # camstream-crypto
//!
//! AES-128-CBC フレーム暗号の実装。
//!
//! カメラ側ファームウェアは JPEG フレーム全体を PKCS#7 でパディングしてから
//! AES-128-CBC で暗号化し、その後で UDP 用にフラグメント分割する。
//! 受信側は組み立て済みのバッファをまとめて復号する。
//!
//! ```text
//! 送信:  JPEG → pkcs7_pad → AES-128-CBC encrypt → フラグメント分割
//! 受信:  フラグメント結合 → AES-128-CBC decrypt → pkcs7_unpad → JPEG
//! ```
//!
//! ## 連鎖状態（ChainPolicy）
//!
//! リファレンスのファームウェアは起動時に一度だけ暗号コンテキストを初期化し、
//! 以降のフレームは前フレームの最終暗号ブロックを IV として暗号化を続ける。
//! 既定の `ChainPolicy::Continuous` はこれに合わせる。
//! 送信側がフレームごとに IV をリセットする場合は `ChainPolicy::PerFrame` を使う。

#![no_std]
extern crate alloc;

mod cipher;
mod error;
mod padding;

pub use cipher::{FrameCipher, FrameSealer};
pub use error::CryptoError;
pub use padding::{pkcs7_pad, pkcs7_unpad};

/// AES のブロック長（バイト）
pub const BLOCK_SIZE: usize = 16;

/// フレーム間での CBC 連鎖状態の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ChainPolicy {
    /// フレームごとに設定済み IV から復号する
    PerFrame,
    /// 前フレームの最終暗号ブロックを次フレームの IV とする
    #[default]
    Continuous,
}

/// Base64 文字列を 16 バイトの鍵または IV にデコードする
///
/// URL-safe（パディングなし）を優先し、標準アルファベット（パディングあり）も受け付ける。
/// 例: 16 バイトのゼロ → `AAAAAAAAAAAAAAAAAAAAAA`
pub fn decode_base64_block(b64: &str) -> Result<[u8; BLOCK_SIZE], CryptoError> {
    use base64::Engine as _;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

    let trimmed = b64.trim();
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD.decode(trimmed))
        .map_err(|_| CryptoError::InvalidBase64)?;

    let block: [u8; BLOCK_SIZE] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))?;
    Ok(block)
}
