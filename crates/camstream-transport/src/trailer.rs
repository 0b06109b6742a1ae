//! データグラムのトレーラー（末尾 3 バイトのメタデータ）
//!
//! ## Wire Format
//! ```text
//! [payload: variable][frame_id: u8][fragment_order: u8][complete: u8]
//! ```
//!
//! トレーラーは暗号化されない。`complete` は 0 なら後続フラグメントあり、
//! 0 以外ならこのフラグメントでフレームが終わる。

use core::fmt;

use alloc::vec::Vec;

use crate::error::TransportError;

/// トレーラー長（frame_id: 1 + fragment_order: 1 + complete: 1）
pub const TRAILER_LEN: usize = 3;

/// データグラム末尾のメタデータ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// フレーム ID（送信側で 1 から数え、256 で折り返す）
    pub frame_id: u8,
    /// フレーム内のフラグメント番号（0 始まり、u8 に切り詰め）
    pub fragment_order: u8,
    /// フレーム最後のフラグメントかどうか
    pub complete: bool,
}

impl Trailer {
    /// トレーラーを Wire Format に変換する（`complete` は 1 / 0）
    pub fn to_bytes(&self) -> [u8; TRAILER_LEN] {
        [self.frame_id, self.fragment_order, u8::from(self.complete)]
    }
}

impl fmt::Display for Trailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={:#04x} order={:#04x} complete={}",
            self.frame_id,
            self.fragment_order,
            u8::from(self.complete)
        )
    }
}

/// 受信データグラムのトレーラーを解析する
///
/// # エラー
/// - `TransportError::MalformedDatagram`: 3 バイト未満
pub fn parse_trailer(datagram: &[u8]) -> Result<Trailer, TransportError> {
    Ok(Datagram::parse(datagram)?.trailer)
}

/// トレーラーを除いたペイロード部分を返す
///
/// # エラー
/// - `TransportError::MalformedDatagram`: 3 バイト未満
pub fn payload(datagram: &[u8]) -> Result<&[u8], TransportError> {
    Ok(Datagram::parse(datagram)?.payload)
}

/// ペイロードとトレーラーから送信用データグラムを組み立てる
pub fn encode_datagram(payload: &[u8], trailer: Trailer) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(payload.len() + TRAILER_LEN);
    datagram.extend_from_slice(payload);
    datagram.extend_from_slice(&trailer.to_bytes());
    datagram
}

/// 解析済みデータグラム（受信バッファを借用する）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datagram<'a> {
    /// 暗号文フラグメント
    pub payload: &'a [u8],
    pub trailer: Trailer,
}

impl<'a> Datagram<'a> {
    /// 受信したバイト列をペイロードとトレーラーに分割する
    ///
    /// ちょうど 3 バイトのデータグラムは空ペイロードとして有効
    /// （暗号文長がフラグメント長の倍数のとき、送信側は最後にトレーラーだけを送る）。
    pub fn parse(bytes: &'a [u8]) -> Result<Self, TransportError> {
        if bytes.len() < TRAILER_LEN {
            return Err(TransportError::MalformedDatagram { len: bytes.len() });
        }

        let (payload, tail) = bytes.split_at(bytes.len() - TRAILER_LEN);
        Ok(Datagram {
            payload,
            trailer: Trailer {
                frame_id: tail[0],
                fragment_order: tail[1],
                complete: tail[2] != 0,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trailer_fields() {
        let trailer = parse_trailer(&[0xAA, 0xBB, 7, 2, 0]).unwrap();
        assert_eq!(trailer.frame_id, 7);
        assert_eq!(trailer.fragment_order, 2);
        assert!(!trailer.complete);
    }

    #[test]
    fn test_complete_is_any_nonzero() {
        assert!(parse_trailer(&[1, 0, 1]).unwrap().complete);
        assert!(parse_trailer(&[1, 0, 0xFF]).unwrap().complete);
        assert!(!parse_trailer(&[1, 0, 0]).unwrap().complete);
    }

    #[test]
    fn test_payload_strips_trailer() {
        assert_eq!(payload(&[1, 2, 3, 4, 5, 6]).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_trailer_only_datagram() {
        let datagram = Datagram::parse(&[3, 9, 1]).unwrap();
        assert!(datagram.payload.is_empty());
        assert_eq!(
            datagram.trailer,
            Trailer {
                frame_id: 3,
                fragment_order: 9,
                complete: true
            }
        );
    }

    #[test]
    fn test_too_short_datagram() {
        assert_eq!(
            parse_trailer(&[1, 2]),
            Err(TransportError::MalformedDatagram { len: 2 })
        );
        assert_eq!(
            payload(&[]),
            Err(TransportError::MalformedDatagram { len: 0 })
        );
    }

    #[test]
    fn test_encode_datagram_layout() {
        let trailer = Trailer {
            frame_id: 0x12,
            fragment_order: 0x34,
            complete: true,
        };
        let datagram = encode_datagram(b"abc", trailer);
        assert_eq!(datagram, b"abc\x12\x34\x01");
        assert_eq!(Datagram::parse(&datagram).unwrap().trailer, trailer);
    }

    #[test]
    fn test_trailer_display() {
        let trailer = Trailer {
            frame_id: 1,
            fragment_order: 0x1f,
            complete: false,
        };
        assert_eq!(
            alloc::format!("{}", trailer),
            "id=0x01 order=0x1f complete=0"
        );
    }
}
