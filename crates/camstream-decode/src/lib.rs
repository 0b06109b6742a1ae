//! # camstream-decode
//!
//! 復号済みの平文（JPEG）をピクセルバッファにするアダプタ。
//! デコードアルゴリズム自体は `image` クレートに任せ、ここでは
//! 「デコードできたか / できなかったか」だけをパイプラインに返す。

mod decoder;
mod frame;

pub use decoder::{ColorMode, ImageDecoder, JpegDecoder};
pub use frame::{DecodedFrame, PixelLayout};
