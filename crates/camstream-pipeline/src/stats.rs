//! 受信統計

use serde::Serialize;

use camstream_crypto::CryptoError;

use crate::error::FrameFailure;

/// パイプラインの累積カウンタ（終了時に JSON で出力する）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// 受信したデータグラム数（不正なものを含む）
    pub datagrams: u64,
    /// トレーラーを持たない短すぎるデータグラム数
    pub malformed_datagrams: u64,
    /// 組み立てバッファに追加したペイロードの総バイト数
    pub payload_bytes: u64,
    /// 表示したフレーム数
    pub frames_presented: u64,
    pub oversized_frames: u64,
    pub invalid_length_frames: u64,
    pub padding_error_frames: u64,
    pub decode_failed_frames: u64,
}

impl PipelineStats {
    pub(crate) fn record_failure(&mut self, failure: &FrameFailure) {
        match failure {
            FrameFailure::TooLarge { .. } => self.oversized_frames += 1,
            FrameFailure::Cipher(CryptoError::InvalidCiphertextLength { .. }) => {
                self.invalid_length_frames += 1
            }
            FrameFailure::Cipher(_) => self.padding_error_frames += 1,
            FrameFailure::Decode => self.decode_failed_frames += 1,
        }
    }

    /// 表示せずに捨てたフレーム数
    pub fn frames_discarded(&self) -> u64 {
        self.oversized_frames
            + self.invalid_length_frames
            + self.padding_error_frames
            + self.decode_failed_frames
    }

    pub fn to_json(&self) -> String {
        // 数値フィールドだけなのでシリアライズは失敗しない
        serde_json::to_string(self).unwrap_or_default()
    }
}
