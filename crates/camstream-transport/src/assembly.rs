//! フラグメント再組み立て
//!
//! 2 つのポリシーを持つ。
//!
//! - **arrival-order assembly**（既定）: 到着順にペイロードを連結し、`complete` の
//!   フラグメントでフレームを確定する。並べ替え・重複排除・欠落検出は行わない。
//!   UDP で欠落・順序入れ替えが起きると組み立て結果は壊れ、復号またはデコードで失敗する。
//! - **indexed reordering**: `(frame_id, fragment_order)` をキーにバッファし、
//!   `0..=final` がすべて揃った時点でフレームを確定する。

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::trailer::Trailer;

/// 再組み立てポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum AssemblyPolicy {
    /// 到着順に連結する
    #[default]
    ArrivalOrder,
    /// frame_id / fragment_order で並べ替える
    Indexed,
}

/// 到着順の再組み立てバッファ
///
/// 直前の `take_and_reset()` 以降に `append()` されたペイロードを、
/// 呼び出し順にそのまま連結したものを常に保持する。
#[derive(Debug, Default)]
pub struct ArrivalOrderAssembly {
    buffer: Vec<u8>,
}

impl ArrivalOrderAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// ペイロードを末尾に追加する（サイズ上限は呼び出し側が課す）
    pub fn append(&mut self, payload: &[u8]) {
        self.buffer.extend_from_slice(payload);
    }

    /// 蓄積したバイト列を取り出し、バッファを空にする
    pub fn take_and_reset(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.buffer)
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// frame_id / fragment_order による並べ替えバッファ
///
/// 新しい frame_id のフラグメントが来たら、組み立て途中のフレームは破棄する。
///
/// fragment_order は u8 なので、扱えるのは 1 フレーム 256 フラグメント
/// （1400 バイト分割で約 358 KB）まで。それを超えると送信側で order が 0 に戻る。
/// 同じ order に異なるペイロードが届いたらこの折り返しとみなし、そのフレームは
/// frame_id が変わるまで読み捨てる。同一内容の重複は無視する。
#[derive(Debug, Default)]
pub struct IndexedAssembly {
    /// 現在組み立て中の frame_id
    current_id: Option<u8>,
    /// 受信済みペイロード（fragment_order → payload）
    arrived: BTreeMap<u8, Vec<u8>>,
    /// complete フラグ付きフラグメントの fragment_order
    final_order: Option<u8>,
    /// fragment_order の折り返しを検出し、現在の frame_id を読み捨て中
    order_wrapped: bool,
    /// 揃わないまま破棄したフレーム数
    abandoned: u64,
}

impl IndexedAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// フラグメントを追加する
    ///
    /// # 戻り値
    /// - `Some(Vec<u8>)`: すべてのフラグメントが揃い、順に連結したフレーム
    /// - `None`: まだフラグメントが足りない
    pub fn add_fragment(&mut self, trailer: &Trailer, payload: &[u8]) -> Option<Vec<u8>> {
        if self.current_id != Some(trailer.frame_id) {
            if !self.arrived.is_empty() {
                self.abandoned += 1;
            }
            self.clear();
            self.current_id = Some(trailer.frame_id);
        }

        if self.order_wrapped {
            return None;
        }
        if let Some(existing) = self.arrived.get(&trailer.fragment_order) {
            if existing.as_slice() != payload {
                self.order_wrapped = true;
                self.abandoned += 1;
                self.arrived.clear();
                self.final_order = None;
            }
            return None;
        }

        if trailer.complete {
            self.final_order = Some(trailer.fragment_order);
        }
        self.arrived.insert(trailer.fragment_order, payload.to_vec());

        let assembled = self.try_assemble()?;
        // 同じ frame_id の再送・重複で二重に確定しないよう、ID は保持したまま中身だけ捨てる
        self.arrived.clear();
        self.final_order = None;
        Some(assembled)
    }

    /// 0..=final がすべて揃っていれば連結して返す
    fn try_assemble(&self) -> Option<Vec<u8>> {
        let final_order = self.final_order?;
        if (0..=final_order).any(|order| !self.arrived.contains_key(&order)) {
            return None;
        }

        let mut assembled = Vec::with_capacity(self.buffered_len());
        for order in 0..=final_order {
            assembled.extend_from_slice(&self.arrived[&order]);
        }
        Some(assembled)
    }

    /// バッファ中のペイロード総バイト数
    pub fn buffered_len(&self) -> usize {
        self.arrived.values().map(Vec::len).sum()
    }

    /// 組み立て途中の状態を捨てる
    pub fn clear(&mut self) {
        self.current_id = None;
        self.arrived.clear();
        self.final_order = None;
        self.order_wrapped = false;
    }

    /// 現在組み立て中の frame_id
    pub fn current_id(&self) -> Option<u8> {
        self.current_id
    }

    /// 揃わないまま破棄したフレーム数
    pub fn abandoned_frames(&self) -> u64 {
        self.abandoned
    }
}

/// ポリシーに応じた再組み立て器
///
/// パイプラインはこの型だけを扱うので、ポリシーを差し替えても駆動側の契約は変わらない。
#[derive(Debug)]
pub enum Reassembler {
    ArrivalOrder(ArrivalOrderAssembly),
    Indexed(IndexedAssembly),
}

impl Reassembler {
    pub fn new(policy: AssemblyPolicy) -> Self {
        match policy {
            AssemblyPolicy::ArrivalOrder => Reassembler::ArrivalOrder(ArrivalOrderAssembly::new()),
            AssemblyPolicy::Indexed => Reassembler::Indexed(IndexedAssembly::new()),
        }
    }

    /// フラグメントを受け取り、フレームが確定したら組み立て済みバイト列を返す
    pub fn accept(&mut self, trailer: &Trailer, payload: &[u8]) -> Option<Vec<u8>> {
        match self {
            Reassembler::ArrivalOrder(assembly) => {
                assembly.append(payload);
                trailer.complete.then(|| assembly.take_and_reset())
            }
            Reassembler::Indexed(assembly) => assembly.add_fragment(trailer, payload),
        }
    }

    /// 確定前のバッファ長
    pub fn buffered_len(&self) -> usize {
        match self {
            Reassembler::ArrivalOrder(assembly) => assembly.len(),
            Reassembler::Indexed(assembly) => assembly.buffered_len(),
        }
    }

    /// 組み立て途中のフレームを破棄する
    pub fn reset(&mut self) {
        match self {
            Reassembler::ArrivalOrder(assembly) => {
                assembly.take_and_reset();
            }
            Reassembler::Indexed(assembly) => assembly.clear(),
        }
    }

    pub fn policy(&self) -> AssemblyPolicy {
        match self {
            Reassembler::ArrivalOrder(_) => AssemblyPolicy::ArrivalOrder,
            Reassembler::Indexed(_) => AssemblyPolicy::Indexed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trailer(frame_id: u8, fragment_order: u8, complete: bool) -> Trailer {
        Trailer {
            frame_id,
            fragment_order,
            complete,
        }
    }

    #[test]
    fn test_arrival_order_concatenates_in_call_order() {
        let mut assembly = ArrivalOrderAssembly::new();
        assembly.append(b"abc");
        assembly.append(b"");
        assembly.append(b"de");
        assembly.append(b"f");
        assert_eq!(assembly.buffer(), b"abcdef");
        assert_eq!(assembly.len(), 6);
    }

    #[test]
    fn test_take_and_reset_leaves_no_residue() {
        let mut assembly = ArrivalOrderAssembly::new();
        assembly.append(b"old frame");
        assert_eq!(assembly.take_and_reset(), b"old frame");
        assert!(assembly.is_empty());

        assembly.append(b"x");
        assert_eq!(assembly.buffer(), b"x");
    }

    #[test]
    fn test_arrival_order_ignores_ids() {
        // frame_id / fragment_order はアセンブリに影響しない
        let mut reassembler = Reassembler::new(AssemblyPolicy::ArrivalOrder);
        assert_eq!(reassembler.accept(&trailer(9, 5, false), b"A"), None);
        assert_eq!(reassembler.accept(&trailer(1, 0, false), b"B"), None);
        assert_eq!(
            reassembler.accept(&trailer(4, 4, true), b"C"),
            Some(b"ABC".to_vec())
        );
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[test]
    fn test_indexed_reorders_fragments() {
        let mut reassembler = Reassembler::new(AssemblyPolicy::Indexed);
        assert_eq!(reassembler.accept(&trailer(1, 2, true), b"C"), None);
        assert_eq!(reassembler.accept(&trailer(1, 0, false), b"A"), None);
        assert_eq!(reassembler.buffered_len(), 2);
        assert_eq!(
            reassembler.accept(&trailer(1, 1, false), b"B"),
            Some(b"ABC".to_vec())
        );
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[test]
    fn test_indexed_new_id_abandons_incomplete_frame() {
        let mut assembly = IndexedAssembly::new();
        assert_eq!(assembly.add_fragment(&trailer(1, 0, false), b"lost"), None);

        let result = assembly.add_fragment(&trailer(2, 0, true), b"fresh");
        assert_eq!(result, Some(b"fresh".to_vec()));
        assert_eq!(assembly.abandoned_frames(), 1);
        assert_eq!(assembly.current_id(), Some(2));
    }

    #[test]
    fn test_indexed_duplicate_does_not_emit_twice() {
        let mut assembly = IndexedAssembly::new();
        assert_eq!(
            assembly.add_fragment(&trailer(3, 0, true), b"once"),
            Some(b"once".to_vec())
        );
        // 完成済み frame_id の後着フラグメントだけでは再び完成しない
        assert_eq!(assembly.add_fragment(&trailer(3, 1, true), b"dup"), None);
    }

    #[test]
    fn test_indexed_identical_duplicate_ignored() {
        let mut assembly = IndexedAssembly::new();
        assembly.add_fragment(&trailer(1, 0, false), b"first");
        assembly.add_fragment(&trailer(1, 0, false), b"first");
        assert_eq!(
            assembly.add_fragment(&trailer(1, 1, true), b"!"),
            Some(b"first!".to_vec())
        );
        assert_eq!(assembly.abandoned_frames(), 0);
    }

    #[test]
    fn test_indexed_order_wrap_drops_frame() {
        use crate::fragment::Fragmenter;
        use crate::trailer::Datagram;

        // 1 バイト分割で 300 フラグメント → order が 255 の次に 0 へ戻る
        let mut fragmenter = Fragmenter::new(1);
        let oversized: Vec<u8> = (0..300u32).map(|i| (i + i / 256) as u8).collect();
        let mut assembly = IndexedAssembly::new();
        for datagram in fragmenter.make_datagrams(&oversized) {
            let datagram = Datagram::parse(&datagram).unwrap();
            assert_eq!(assembly.add_fragment(&datagram.trailer, datagram.payload), None);
        }
        assert_eq!(assembly.abandoned_frames(), 1);
        assert_eq!(assembly.buffered_len(), 0);

        // 次の frame_id は普通に組み立てられる
        for datagram in fragmenter.make_datagrams(b"next") {
            let datagram = Datagram::parse(&datagram).unwrap();
            let result = assembly.add_fragment(&datagram.trailer, datagram.payload);
            if datagram.trailer.complete {
                assert_eq!(result, Some(b"next".to_vec()));
            }
        }
        assert_eq!(assembly.abandoned_frames(), 1);
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        for policy in [AssemblyPolicy::ArrivalOrder, AssemblyPolicy::Indexed] {
            let mut reassembler = Reassembler::new(policy);
            reassembler.accept(&trailer(1, 0, false), b"partial");
            assert_eq!(reassembler.buffered_len(), 7);
            reassembler.reset();
            assert_eq!(reassembler.buffered_len(), 0);
            assert_eq!(reassembler.policy(), policy);
        }
    }
}
