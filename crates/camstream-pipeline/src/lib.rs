//! # camstream-pipeline
//!
//! 受信パイプラインの駆動部。
//!
//! ```text
//! DatagramSource ─▶ Datagram::parse ─▶ Reassembler ─(complete)─▶ FrameCipher
//!                                                                   │
//!                          FrameSink ◀── ImageDecoder ◀─────────────┘
//! ```
//!
//! ## 失敗時の扱い
//!
//! | 失敗                       | 扱い                                       |
//! |----------------------------|--------------------------------------------|
//! | 3 バイト未満のデータグラム | 捨てて継続（組み立てバッファは変更しない） |
//! | 暗号文長・パディング不正   | フレームを捨てて継続                       |
//! | フレーム長の上限超過       | complete まで読み捨て、連鎖だけ進めて継続  |
//! | デコード失敗               | フレームを捨てて継続                       |
//! | 受信エラー・シンクエラー   | `PipelineError` でループを抜ける           |

pub mod config;
pub mod driver;
pub mod error;
pub mod sink;
pub mod source;
pub mod stats;

pub use config::PipelineConfig;
pub use driver::{DriverState, FrameDriver, FrameInfo, Step};
pub use error::{ConfigError, FrameFailure, PipelineError};
pub use sink::{FrameBudget, FrameSink, StopFlag, StopSignal};
pub use source::{DatagramSource, MemorySource};
pub use stats::PipelineStats;
