//! 受信パイプラインの設定
//!
//! JSON ファイルから読み込む。すべての項目に既定値があり、鍵と IV だけは必須。
//!
//! ```json
//! {
//!   "bind": "0.0.0.0:20001",
//!   "recv_buffer_size": 3000,
//!   "key": "MDEyMzQ1Njc4OWFiY2RlZg",
//!   "iv": "ZmVkY2JhOTg3NjU0MzIxMA",
//!   "chain_policy": "continuous",
//!   "assembly": "arrival_order",
//!   "max_frame_bytes": 4194304,
//!   "color": "color"
//! }
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use camstream_crypto::{BLOCK_SIZE, ChainPolicy, decode_base64_block};
use camstream_decode::ColorMode;
use camstream_transport::{AssemblyPolicy, TRAILER_LEN};

use crate::error::ConfigError;

/// リファレンス構成の受信ポート
pub const DEFAULT_PORT: u16 = 20001;

/// 受信バッファ長（最大データグラム長）の既定値
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 3000;

/// 1 フレームの組み立てバッファ上限の既定値（4 MiB）
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// 受信ソケットのバインドアドレス
    pub bind: SocketAddr,
    /// 受信バッファ長。これを超えるデータグラムはトランスポートで切り詰められる
    pub recv_buffer_size: usize,
    /// AES-128 鍵（Base64）
    pub key: Option<String>,
    /// CBC 初期化ベクタ（Base64）
    pub iv: Option<String>,
    pub chain_policy: ChainPolicy,
    pub assembly: AssemblyPolicy,
    /// 組み立て中バッファの上限（バイト）
    pub max_frame_bytes: usize,
    pub color: ColorMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            key: None,
            iv: None,
            chain_policy: ChainPolicy::default(),
            assembly: AssemblyPolicy::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            color: ColorMode::default(),
        }
    }
}

impl PipelineConfig {
    /// JSON ファイルから設定を読み込む
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// JSON 文字列から設定を読み込む
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 値の範囲を検証する（鍵の有無は `key_material` で検証する）
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recv_buffer_size <= TRAILER_LEN {
            return Err(ConfigError::InvalidValue {
                field: "recv_buffer_size",
                reason: format!("must be larger than the {TRAILER_LEN}-byte trailer"),
            });
        }
        if self.max_frame_bytes < BLOCK_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "max_frame_bytes",
                reason: format!("must hold at least one {BLOCK_SIZE}-byte cipher block"),
            });
        }
        Ok(())
    }

    /// Base64 の鍵と IV をデコードする
    pub fn key_material(&self) -> Result<([u8; BLOCK_SIZE], [u8; BLOCK_SIZE]), ConfigError> {
        let key = self.key.as_deref().ok_or(ConfigError::Missing("key"))?;
        let iv = self.iv.as_deref().ok_or(ConfigError::Missing("iv"))?;

        let key = decode_base64_block(key).map_err(|source| ConfigError::Key {
            field: "key",
            source,
        })?;
        let iv = decode_base64_block(iv).map_err(|source| ConfigError::Key {
            field: "iv",
            source,
        })?;
        Ok((key, iv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(config.bind.port(), DEFAULT_PORT);
        assert_eq!(config.recv_buffer_size, 3000);
        assert_eq!(config.chain_policy, ChainPolicy::Continuous);
        assert_eq!(config.assembly, AssemblyPolicy::ArrivalOrder);
        assert_eq!(config.color, ColorMode::Color);
    }

    #[test]
    fn test_full_config() {
        let config = PipelineConfig::from_json(
            r#"{
                "bind": "127.0.0.1:9000",
                "recv_buffer_size": 1600,
                "key": "MDEyMzQ1Njc4OWFiY2RlZg",
                "iv": "AAAAAAAAAAAAAAAAAAAAAA",
                "chain_policy": "per_frame",
                "assembly": "indexed",
                "max_frame_bytes": 65536,
                "color": "grayscale"
            }"#,
        )
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.chain_policy, ChainPolicy::PerFrame);
        assert_eq!(config.assembly, AssemblyPolicy::Indexed);
        assert_eq!(config.color, ColorMode::Grayscale);

        let (key, iv) = config.key_material().unwrap();
        assert_eq!(&key, b"0123456789abcdef");
        assert_eq!(iv, [0u8; 16]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            PipelineConfig::from_json(r#"{"port": 20001}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_tiny_recv_buffer_rejected() {
        assert!(matches!(
            PipelineConfig::from_json(r#"{"recv_buffer_size": 3}"#),
            Err(ConfigError::InvalidValue {
                field: "recv_buffer_size",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_key() {
        let config = PipelineConfig::default();
        assert!(matches!(
            config.key_material(),
            Err(ConfigError::Missing("key"))
        ));
    }

    #[test]
    fn test_bad_iv_length() {
        let config = PipelineConfig {
            key: Some("AAAAAAAAAAAAAAAAAAAAAA".to_string()),
            iv: Some("AAAA".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.key_material(),
            Err(ConfigError::Key { field: "iv", .. })
        ));
    }
}
