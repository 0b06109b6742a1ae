//! PKCS#7 パディング
//!
//! 送信側ファームウェアは暗号化前にフレーム末尾を 16 バイト境界まで埋める。
//! 平文がちょうど境界に揃っている場合でも 1 ブロック分（0x10 × 16）を追加するため、
//! パディング長 `p` は常に `1..=16` になる。

use alloc::vec::Vec;

use crate::BLOCK_SIZE;
use crate::error::CryptoError;

/// 平文に PKCS#7 パディングを付与する
pub fn pkcs7_pad(plaintext: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - plaintext.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(plaintext.len() + pad_len);
    padded.extend_from_slice(plaintext);
    padded.resize(plaintext.len() + pad_len, pad_len as u8);
    padded
}

/// 復号済みバッファから PKCS#7 パディングを取り除く
///
/// # エラー
/// - `CryptoError::PaddingError`: 末尾バイト `p` が 0、16 超、バッファ長超、
///   または末尾 `p` バイトがすべて `p` ではない
pub fn pkcs7_unpad(buf: &[u8]) -> Result<&[u8], CryptoError> {
    let Some(&last) = buf.last() else {
        return Err(CryptoError::PaddingError);
    };

    let pad_len = last as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > buf.len() {
        return Err(CryptoError::PaddingError);
    }

    let (body, padding) = buf.split_at(buf.len() - pad_len);
    if padding.iter().any(|&b| b != last) {
        return Err(CryptoError::PaddingError);
    }

    Ok(body)
}
