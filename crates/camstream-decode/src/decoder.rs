//! 圧縮画像デコーダ

use image::{DynamicImage, ImageFormat};
use log::debug;

use crate::frame::{DecodedFrame, PixelLayout};

/// 平文バイト列をピクセルバッファに変換する能力
///
/// 解釈できない入力は `None` を返す。復号失敗やフラグメント欠落で壊れたフレームでは
/// これが普通に起きるので、呼び出し側は継続可能な失敗として扱う。
pub trait ImageDecoder {
    fn decode(&self, plaintext: &[u8]) -> Option<DecodedFrame>;
}

/// デコード時の色変換
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ColorMode {
    /// 3 チャンネル RGB に変換する
    #[default]
    Color,
    /// 1 チャンネルのグレースケールに変換する
    Grayscale,
}

/// `image` クレートによる JPEG デコーダ
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegDecoder {
    mode: ColorMode,
}

impl JpegDecoder {
    pub fn new(mode: ColorMode) -> Self {
        JpegDecoder { mode }
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    fn convert(&self, image: DynamicImage) -> DecodedFrame {
        match self.mode {
            ColorMode::Color => {
                let rgb = image.into_rgb8();
                DecodedFrame {
                    width: rgb.width(),
                    height: rgb.height(),
                    layout: PixelLayout::Rgb8,
                    pixels: rgb.into_raw(),
                }
            }
            ColorMode::Grayscale => {
                let luma = image.into_luma8();
                DecodedFrame {
                    width: luma.width(),
                    height: luma.height(),
                    layout: PixelLayout::Luma8,
                    pixels: luma.into_raw(),
                }
            }
        }
    }
}

impl ImageDecoder for JpegDecoder {
    fn decode(&self, plaintext: &[u8]) -> Option<DecodedFrame> {
        match image::load_from_memory_with_format(plaintext, ImageFormat::Jpeg) {
            Ok(image) => Some(self.convert(image)),
            Err(e) => {
                debug!("jpeg decode failed ({} bytes): {e}", plaintext.len());
                None
            }
        }
    }
}
