//! データグラムの受信元

use std::collections::VecDeque;
use std::io;
use std::net::UdpSocket;

/// ブロッキングでデータグラムを 1 つずつ受け取る能力
pub trait DatagramSource {
    /// 次のデータグラムを `buf` に書き込み、その長さを返す
    ///
    /// `Ok(None)` は受信元が閉じたこと（リプレイの終端など）を表す。
    /// `buf` より長いデータグラムは切り詰められる。
    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
}

impl DatagramSource for UdpSocket {
    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let (len, _peer) = self.recv_from(buf)?;
        Ok(Some(len))
    }
}

impl<S: DatagramSource + ?Sized> DatagramSource for &mut S {
    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        (**self).recv_datagram(buf)
    }
}

/// メモリ上のデータグラム列を順に返す受信元（テスト・リプレイ用）
#[derive(Debug, Default)]
pub struct MemorySource {
    queue: VecDeque<Vec<u8>>,
}

impl MemorySource {
    pub fn new<I>(datagrams: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        MemorySource {
            queue: datagrams.into_iter().collect(),
        }
    }

    pub fn push(&mut self, datagram: Vec<u8>) {
        self.queue.push_back(datagram);
    }

    /// 未受信のデータグラム数
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl DatagramSource for MemorySource {
    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let Some(datagram) = self.queue.pop_front() else {
            return Ok(None);
        };
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(Some(len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_in_order() {
        let mut source = MemorySource::new([vec![1, 2, 3], vec![4]]);
        let mut buf = [0u8; 16];

        assert_eq!(source.recv_datagram(&mut buf).unwrap(), Some(3));
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(source.recv_datagram(&mut buf).unwrap(), Some(1));
        assert_eq!(buf[0], 4);
        assert_eq!(source.recv_datagram(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_memory_source_truncates() {
        let mut source = MemorySource::new([vec![9u8; 10]]);
        let mut buf = [0u8; 4];
        assert_eq!(source.recv_datagram(&mut buf).unwrap(), Some(4));
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_udp_socket_source() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(b"frag\x01\x00\x01", receiver.local_addr().unwrap())
            .unwrap();

        let mut source = receiver;
        let mut buf = [0u8; 64];
        let len = source.recv_datagram(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..len], b"frag\x01\x00\x01");
    }
}
