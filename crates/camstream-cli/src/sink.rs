//! 表示シンク
//!
//! ウィンドウ表示の代わりに、ログへ出すか PNG として書き出す。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::{ColorType, ImageFormat};
use log::info;

use camstream_decode::{DecodedFrame, PixelLayout};
use camstream_pipeline::FrameSink;

/// フレームの寸法だけをログに出す
#[derive(Debug, Default)]
pub(crate) struct LogSink {
    presented: u64,
}

impl FrameSink for LogSink {
    fn present(&mut self, frame: &DecodedFrame) -> io::Result<()> {
        self.presented += 1;
        info!(
            "frame #{} {}x{} {:?}",
            self.presented, frame.width, frame.height, frame.layout
        );
        Ok(())
    }
}

/// 最新フレームを `<dir>/latest.png` に書き出す
///
/// 一時ファイルに書いてから rename するので、読み手が書きかけの PNG を見ることはない。
#[derive(Debug)]
pub(crate) struct SnapshotSink {
    latest: PathBuf,
    staging: PathBuf,
}

impl SnapshotSink {
    pub(crate) const FILE_NAME: &'static str = "latest.png";

    pub(crate) fn create(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(SnapshotSink {
            latest: dir.join(Self::FILE_NAME),
            staging: dir.join(".latest.png.part"),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.latest
    }
}

impl FrameSink for SnapshotSink {
    fn present(&mut self, frame: &DecodedFrame) -> io::Result<()> {
        let color = match frame.layout {
            PixelLayout::Rgb8 => ColorType::Rgb8,
            PixelLayout::Luma8 => ColorType::L8,
        };
        // エンコーダは長さ不一致で panic するので先に弾く
        let expected = frame.stride() * frame.height as usize;
        if frame.pixels.len() != expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "pixel buffer is {} bytes, expected {expected}",
                    frame.pixels.len()
                ),
            ));
        }
        image::save_buffer_with_format(
            &self.staging,
            &frame.pixels,
            frame.width,
            frame.height,
            color,
            ImageFormat::Png,
        )
        .map_err(io::Error::other)?;
        fs::rename(&self.staging, &self.latest)
    }
}
