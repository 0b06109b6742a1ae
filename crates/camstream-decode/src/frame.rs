//! デコード済みフレーム

/// ピクセルのチャンネル構成
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum PixelLayout {
    /// R, G, B 各 8 ビット
    Rgb8,
    /// グレースケール 8 ビット
    Luma8,
}

impl PixelLayout {
    /// 1 ピクセルあたりのチャンネル数
    pub fn channels(&self) -> usize {
        match self {
            PixelLayout::Rgb8 => 3,
            PixelLayout::Luma8 => 1,
        }
    }
}

/// 表示シンクに渡すピクセルバッファ
///
/// `pixels` は行優先で、長さは `width * height * layout.channels()`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub pixels: Vec<u8>,
}

impl DecodedFrame {
    /// 1 行あたりのバイト数
    pub fn stride(&self) -> usize {
        self.width as usize * self.layout.channels()
    }
}
