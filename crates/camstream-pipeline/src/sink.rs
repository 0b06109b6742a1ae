//! 表示シンクと停止シグナル

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use camstream_decode::DecodedFrame;

use crate::stats::PipelineStats;

/// デコード済みフレームを表示する能力
pub trait FrameSink {
    fn present(&mut self, frame: &DecodedFrame) -> io::Result<()>;
}

impl<K: FrameSink + ?Sized> FrameSink for &mut K {
    fn present(&mut self, frame: &DecodedFrame) -> io::Result<()> {
        (**self).present(frame)
    }
}

impl<K: FrameSink + ?Sized> FrameSink for Box<K> {
    fn present(&mut self, frame: &DecodedFrame) -> io::Result<()> {
        (**self).present(frame)
    }
}

/// 受信ループを止めるかどうかの問い合わせ
///
/// フレームの 1 サイクル（表示または破棄）が終わるたびに 1 回だけ呼ばれる。
/// 組み立て途中で呼ばれることはない。
pub trait StopSignal {
    fn should_stop(&mut self, stats: &PipelineStats) -> bool;
}

impl<T: StopSignal + ?Sized> StopSignal for &mut T {
    fn should_stop(&mut self, stats: &PipelineStats) -> bool {
        (**self).should_stop(stats)
    }
}

/// 他スレッドからも立てられる停止フラグ
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    raised: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

impl StopSignal for StopFlag {
    fn should_stop(&mut self, _stats: &PipelineStats) -> bool {
        self.is_raised()
    }
}

/// 指定枚数のフレームを表示したら止める
#[derive(Debug, Clone, Copy)]
pub struct FrameBudget {
    max_frames: Option<u64>,
}

impl FrameBudget {
    pub fn new(max_frames: u64) -> Self {
        FrameBudget {
            max_frames: Some(max_frames),
        }
    }

    /// 止まらない（プロセス終了まで受信を続ける）
    pub fn unlimited() -> Self {
        FrameBudget { max_frames: None }
    }
}

impl StopSignal for FrameBudget {
    fn should_stop(&mut self, stats: &PipelineStats) -> bool {
        self.max_frames
            .is_some_and(|max| stats.frames_presented >= max)
    }
}
