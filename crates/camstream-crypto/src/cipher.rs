//! AES-128-CBC フレーム暗号
//!
//! 受信側の `FrameCipher` と、送信側（テスト・`camstream send`）の `FrameSealer`。
//! どちらも CBC の連鎖値を [`ChainPolicy`] に従って管理する。

use alloc::vec::Vec;

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::CryptoError;
use crate::padding::{pkcs7_pad, pkcs7_unpad};
use crate::{BLOCK_SIZE, ChainPolicy};

type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;

/// CBC 連鎖値の管理
#[derive(Debug, Clone)]
struct Chain {
    policy: ChainPolicy,
    /// 設定された初期 IV
    iv: [u8; BLOCK_SIZE],
    /// `Continuous` のときの現在の連鎖値（直前フレームの最終暗号ブロック）
    current: [u8; BLOCK_SIZE],
}

impl Chain {
    fn new(iv: [u8; BLOCK_SIZE], policy: ChainPolicy) -> Self {
        Chain { policy, iv, current: iv }
    }

    /// 次のフレームに使う IV
    fn iv(&self) -> [u8; BLOCK_SIZE] {
        match self.policy {
            ChainPolicy::PerFrame => self.iv,
            ChainPolicy::Continuous => self.current,
        }
    }

    /// 暗号文の最終ブロックまで連鎖を進める
    fn advance(&mut self, ciphertext: &[u8]) {
        if self.policy == ChainPolicy::Continuous && ciphertext.len() >= BLOCK_SIZE {
            self.current
                .copy_from_slice(&ciphertext[ciphertext.len() - BLOCK_SIZE..]);
        }
    }

    fn reset(&mut self) {
        self.current = self.iv;
    }
}

/// 受信フレームの復号器
///
/// 組み立て済みの暗号文バッファを AES-128-CBC で復号し、PKCS#7 パディングを除去する。
///
/// ## 連鎖状態
/// - `ChainPolicy::PerFrame`: 毎フレーム設定済み IV から復号する
/// - `ChainPolicy::Continuous`: 直前に復号したフレームの最終暗号ブロックを IV とする。
///   パディング検証に失敗しても連鎖は進む（送信側は常に暗号化を続けているため）
pub struct FrameCipher {
    key: [u8; BLOCK_SIZE],
    chain: Chain,
}

impl FrameCipher {
    /// 16 バイトの鍵と IV から復号器を生成する
    pub fn new(key: [u8; BLOCK_SIZE], iv: [u8; BLOCK_SIZE], policy: ChainPolicy) -> Self {
        FrameCipher {
            key,
            chain: Chain::new(iv, policy),
        }
    }

    /// 暗号文を復号し、パディングを除去した平文を返す
    ///
    /// # エラー
    /// - `CryptoError::InvalidCiphertextLength`: 長さが 16 の正の倍数ではない
    /// - `CryptoError::PaddingError`: 復号結果のパディングが不正
    pub fn decrypt_and_unpad(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut plaintext = self.decrypt_blocks(ciphertext)?;
        let body_len = pkcs7_unpad(&plaintext)?.len();
        plaintext.truncate(body_len);
        Ok(plaintext)
    }

    /// パディングを扱わずにブロック単位で復号する
    fn decrypt_blocks(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            // フラグメント欠落で長さが崩れても、最終フラグメントが届いていれば
            // 末尾 16 バイトは送信側の最終暗号ブロックそのものなので、そこで再同期する
            self.chain.advance(ciphertext);
            return Err(CryptoError::InvalidCiphertextLength {
                len: ciphertext.len(),
            });
        }

        let iv = self.chain.iv();
        let mut decryptor = Aes128CbcDec::new((&self.key).into(), (&iv).into());
        let mut buf = ciphertext.to_vec();
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            decryptor.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }

        self.chain.advance(ciphertext);
        Ok(buf)
    }

    /// 復号せずに連鎖だけを進める
    ///
    /// 受信側で捨てたフレームでも、送信側はそのフレームを暗号化し終えている。
    /// `Continuous` では末尾 16 バイトを次フレームの IV にしないと、
    /// 次の正常なフレームの先頭ブロックが壊れる。16 バイト未満なら何もしない。
    pub fn skip(&mut self, ciphertext: &[u8]) {
        self.chain.advance(ciphertext);
    }

    /// 連鎖状態を設定済み IV に戻す
    pub fn reset(&mut self) {
        self.chain.reset();
    }

    /// 連鎖ポリシー
    pub fn policy(&self) -> ChainPolicy {
        self.chain.policy
    }
}

/// 送信側のフレーム暗号化器
///
/// 平文に PKCS#7 パディングを付与して AES-128-CBC で暗号化する。
/// 連鎖状態の扱いは `FrameCipher` と対になる。
pub struct FrameSealer {
    key: [u8; BLOCK_SIZE],
    chain: Chain,
}

impl FrameSealer {
    pub fn new(key: [u8; BLOCK_SIZE], iv: [u8; BLOCK_SIZE], policy: ChainPolicy) -> Self {
        FrameSealer {
            key,
            chain: Chain::new(iv, policy),
        }
    }

    /// 平文フレームを暗号化する（戻り値の長さは常に 16 の正の倍数）
    pub fn seal(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut buf = pkcs7_pad(plaintext);

        let iv = self.chain.iv();
        let mut encryptor = Aes128CbcEnc::new((&self.key).into(), (&iv).into());
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }

        self.chain.advance(&buf);
        buf
    }
}
