//! # camstream-transport
//!
//! UDP フレーミング層の実装。
//!
//! 暗号化済みフレームはフラグメントに分割され、各データグラムの末尾に
//! 暗号化されない 3 バイトのトレーラーが付く。
//!
//! ## データグラムの Wire Format
//!
//! ```text
//! [payload: variable][frame_id: u8][fragment_order: u8][complete: u8]
//!  ↑ AES-128-CBC 暗号文の一部
//! ```
//!
//! ## 受信側の流れ
//!
//! ```text
//! Datagram::parse → Reassembler::accept → (complete) → 組み立て済み暗号文
//! ```

#![no_std]
extern crate alloc;

pub mod assembly;
pub mod error;
pub mod fragment;
pub mod trailer;

pub use assembly::{ArrivalOrderAssembly, AssemblyPolicy, IndexedAssembly, Reassembler};
pub use error::TransportError;
pub use fragment::{DEFAULT_FRAGMENT_SIZE, Fragmenter};
pub use trailer::{Datagram, TRAILER_LEN, Trailer, encode_datagram, parse_trailer, payload};
