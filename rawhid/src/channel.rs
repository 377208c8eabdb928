//! Implements the packet types and the transport seam every backend provides.
//!
//! A backend only has to know how to write one output report and how to read
//! one input report with a timeout. Everything built on top of that, like
//! size checks, block reads and the open/closed state machine, lives in
//! [`crate::device`].

use std::{
    ops::{Deref, DerefMut},
    time::Duration,
};

use thiserror::Error;

/// The default payload length of a raw HID report.
///
/// Most raw HID firmwares (Teensy `RawHID`, QMK, ...) declare 64 byte input
/// and output reports.
pub const PACKET_SIZE: usize = 64;

/// Represents a single fixed-size report payload.
///
/// The report ID prefix byte is not part of the packet. Backends add or strip
/// it as their OS interface requires.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Packet<const N: usize = PACKET_SIZE>([u8; N]);

impl<const N: usize> Packet<N> {
    /// Creates a zero-filled packet.
    pub fn new() -> Self {
        Self([0u8; N])
    }

    /// Creates a packet from arbitrary bytes.
    ///
    /// Longer input is truncated, shorter input is padded with zeroes.
    pub fn from_slice(data: &[u8]) -> Self {
        let mut packet = Self::new();
        let len = data.len().min(N);
        packet.0[..len].copy_from_slice(&data[..len]);
        packet
    }

    /// The payload as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The payload length, which is always `N`.
    pub const fn len(&self) -> usize {
        N
    }

    /// Whether the packet type carries no payload at all.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Consumes the packet and returns the underlying array.
    pub fn into_inner(self) -> [u8; N] {
        self.0
    }
}

impl<const N: usize> Default for Packet<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> From<[u8; N]> for Packet<N> {
    fn from(value: [u8; N]) -> Self {
        Self(value)
    }
}

impl<const N: usize> Deref for Packet<N> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const N: usize> DerefMut for Packet<N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// The outcome of a block read.
///
/// A short or even empty block is a regular result: it just means the overall
/// timeout elapsed before the requested amount of packets arrived. Only a
/// hard transport fault sets [`Self::fault`], in which case [`Self::packets`]
/// still holds everything read before the fault occurred.
#[derive(Debug, Default)]
pub struct PacketBlock<const N: usize = PACKET_SIZE> {
    /// All packets read, in the order they were received.
    pub packets: Vec<Packet<N>>,

    /// The fault that ended the block early, if any.
    pub fault: Option<CommsError>,
}

impl<const N: usize> PacketBlock<N> {
    /// The amount of packets read.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether no packet was read at all.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Iterates over the packets in receipt order.
    pub fn iter(&self) -> std::slice::Iter<'_, Packet<N>> {
        self.packets.iter()
    }

    /// Splits the block into a result.
    ///
    /// Returns the packets together with the fault if the block was ended by
    /// one, so no data is lost either way.
    pub fn into_result(self) -> Result<Vec<Packet<N>>, (Vec<Packet<N>>, CommsError)> {
        match self.fault {
            None => Ok(self.packets),
            Some(fault) => Err((self.packets, fault)),
        }
    }
}

impl<const N: usize> IntoIterator for PacketBlock<N> {
    type Item = Packet<N>;
    type IntoIter = std::vec::IntoIter<Packet<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.packets.into_iter()
    }
}

impl<'a, const N: usize> IntoIterator for &'a PacketBlock<N> {
    type Item = &'a Packet<N>;
    type IntoIter = std::slice::Iter<'a, Packet<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.packets.iter()
    }
}

/// Represents an open, bidirectional raw HID channel.
///
/// Implementations must treat the input and output directions as independent:
/// a thread blocked in [`Self::read_report`] must never keep another thread
/// from completing [`Self::write_report`].
///
/// Closing the channel is done by dropping it.
pub trait RawHidChannel: Send + Sync + 'static {
    /// Writes exactly one output report.
    ///
    /// `src` holds the report payload without the report ID prefix. A timeout
    /// of [`None`] waits forever.
    ///
    /// Returns the amount of payload bytes written on success.
    fn write_report(&self, src: &[u8], timeout: Option<Duration>) -> Result<usize, CommsError>;

    /// Reads exactly one input report into `buf`.
    ///
    /// If the report is larger than `buf`, its remainder is discarded. A
    /// timeout of [`None`] waits forever. Returns [`CommsError::Timeout`] if no
    /// report arrived in time.
    ///
    /// Returns the amount of bytes read on success.
    fn read_report(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, CommsError>;
}

/// Represents an error that occurred when exchanging packets with a device.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CommsError {
    /// Indicates that the device handle was never opened or was closed.
    #[error("the device is not open")]
    NotOpen,

    /// Indicates that the bounded wait elapsed without data or acknowledgment.
    #[error("the operation timed out")]
    Timeout,

    /// Indicates that the device was removed.
    #[error("the device was disconnected")]
    Disconnected,

    /// Indicates that the packet length does not match the report length the
    /// device declares.
    #[error("packet size mismatch: the device expects {expected} bytes, got {actual}")]
    InvalidSize { expected: usize, actual: usize },

    /// Indicates malformed caller input.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Indicates an unclassified failure of the OS-level I/O.
    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_pads_and_truncates() {
        let short = Packet::<4>::from_slice(&[1, 2]);
        assert_eq!(short.as_bytes(), &[1, 2, 0, 0]);

        let long = Packet::<2>::from_slice(&[1, 2, 3]);
        assert_eq!(long.into_inner(), [1, 2]);
    }

    #[test]
    fn default_packet_has_default_size() {
        let packet: Packet = Packet::default();
        assert_eq!(packet.len(), PACKET_SIZE);
        assert!(packet.iter().all(|&b| b == 0));
    }

    #[test]
    fn block_keeps_packets_alongside_fault() {
        let block = PacketBlock::<2> {
            packets: vec![Packet::from([1, 1]), Packet::from([2, 2])],
            fault: Some(CommsError::Disconnected),
        };

        let (packets, fault) = block.into_result().unwrap_err();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1].as_bytes(), &[2, 2]);
        assert_eq!(fault, CommsError::Disconnected);
    }

    #[test]
    fn empty_block_is_success() {
        let block = PacketBlock::<8>::default();
        assert!(block.is_empty());
        assert!(block.into_result().unwrap().is_empty());
    }
}
