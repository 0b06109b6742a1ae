//! 送信側のフラグメント分割
//!
//! カメラ側ファームウェアと同じ規則で、暗号化済みフレームをデータグラム列に分割する。
//!
//! ```text
//! ciphertext (len = n * size + leftover)
//!   → n 個: [size bytes][id][order=0..n-1][complete=0]
//!   → 1 個: [leftover bytes][id][order=n][complete=1]   ← leftover が 0 でも必ず送る
//! ```

use alloc::vec::Vec;

use crate::trailer::{Trailer, encode_datagram};

/// IP フラグメンテーションを避けるためのフラグメント長（バイト）
pub const DEFAULT_FRAGMENT_SIZE: usize = 1400;

/// 暗号化済みフレームをデータグラム列に分割するクラス
pub struct Fragmenter {
    /// 直前に使った frame_id（最初のフレームは 1）
    last_frame_id: u8,
    /// 1 データグラムあたりのペイロード最大バイト数
    fragment_size: usize,
}

impl Fragmenter {
    /// 新しい Fragmenter を生成する
    ///
    /// `fragment_size` が 0 の場合は 1 として扱う。
    pub fn new(fragment_size: usize) -> Self {
        Fragmenter {
            last_frame_id: 0,
            fragment_size: fragment_size.max(1),
        }
    }

    /// 暗号文を送信用データグラム列に分割する
    ///
    /// 最後のデータグラムだけが `complete = 1`。fragment_order は u8 に切り詰められる。
    pub fn make_datagrams(&mut self, ciphertext: &[u8]) -> Vec<Vec<u8>> {
        self.last_frame_id = self.last_frame_id.wrapping_add(1);
        let frame_id = self.last_frame_id;

        let full = ciphertext.len() / self.fragment_size;
        let (body, leftover) = ciphertext.split_at(full * self.fragment_size);

        let mut datagrams: Vec<Vec<u8>> = body
            .chunks(self.fragment_size)
            .enumerate()
            .map(|(i, chunk)| {
                let trailer = Trailer {
                    frame_id,
                    fragment_order: i as u8,
                    complete: false,
                };
                encode_datagram(chunk, trailer)
            })
            .collect();

        let last = Trailer {
            frame_id,
            fragment_order: full as u8,
            complete: true,
        };
        datagrams.push(encode_datagram(leftover, last));
        datagrams
    }

    /// 直前に使った frame_id（テスト用）
    pub fn last_frame_id(&self) -> u8 {
        self.last_frame_id
    }
}

impl Default for Fragmenter {
    fn default() -> Self {
        Self::new(DEFAULT_FRAGMENT_SIZE)
    }
}
