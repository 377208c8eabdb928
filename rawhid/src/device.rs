//! Implements the device handle and the packet-level operations on top of it.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    catalog::HidBackend,
    channel::{CommsError, Packet, PacketBlock, RawHidChannel},
    descriptor::DeviceDescriptor,
    hidapi_impl::HidapiBackend,
};

/// Caps the up-front allocation of a block read.
const BLOCK_CAPACITY_HINT: usize = 64;

/// Represents a single raw HID interface bound to one [`DeviceDescriptor`].
///
/// The device starts out closed. [`Self::open`] acquires the OS handle, which
/// is then owned exclusively until [`Self::close`] is called or the device is
/// dropped. Every I/O operation on a closed device fails with
/// [`CommsError::NotOpen`].
///
/// I/O methods take `&self`, so one thread can block in [`Self::receive`]
/// while another one calls [`Self::send`] on the same device. Opening and
/// closing require `&mut self` and thus can never race with in-flight I/O.
///
/// Concurrent readers are not coordinated: two threads calling
/// [`Self::receive`] at the same time race for the next arriving packet and
/// each gets a disjoint, unpredictable share of the input stream.
pub struct RawHidDevice<B: HidBackend = HidapiBackend> {
    backend: B,
    descriptor: DeviceDescriptor,
    channel: Option<B::Channel>,
}

/// Acknowledges a successful [`RawHidDevice::send`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Sent {
    /// The amount of payload bytes handed to the transport.
    pub bytes: usize,
}

impl RawHidDevice<HidapiBackend> {
    /// Creates a closed device for a descriptor obtained from
    /// [`crate::catalog::enumerate`].
    pub fn from_descriptor(descriptor: DeviceDescriptor) -> Self {
        Self::new(HidapiBackend, descriptor)
    }
}

impl<B: HidBackend> RawHidDevice<B> {
    /// Creates a closed device that will be opened through `backend`.
    pub fn new(backend: B, descriptor: DeviceDescriptor) -> Self {
        Self {
            backend,
            descriptor,
            channel: None,
        }
    }

    /// The descriptor the device was created from.
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Whether the device currently holds an open handle.
    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Opens the interface for bidirectional I/O.
    ///
    /// Returns [`OpenError::AlreadyOpen`] if the device is already open; the
    /// existing handle stays untouched in that case.
    pub fn open(&mut self) -> Result<(), OpenError> {
        if self.channel.is_some() {
            return Err(OpenError::AlreadyOpen);
        }

        let channel = self.backend.open(&self.descriptor)?;
        self.channel = Some(channel);

        debug!(path = %self.descriptor.path, "opened raw HID device");
        Ok(())
    }

    /// Releases the handle. Closing a closed device does nothing.
    pub fn close(&mut self) {
        if self.channel.take().is_some() {
            debug!(path = %self.descriptor.path, "closed raw HID device");
        }
    }

    fn channel(&self) -> Result<&B::Channel, CommsError> {
        self.channel.as_ref().ok_or(CommsError::NotOpen)
    }

    /// Writes one packet as an output report.
    ///
    /// A timeout of [`None`] waits forever for the device to accept the
    /// report. On success the whole packet was handed to the transport.
    ///
    /// Returns [`CommsError::InvalidSize`] if the device declares an output
    /// report length different from `N`.
    pub fn send<const N: usize>(
        &self,
        packet: &Packet<N>,
        timeout: Option<Duration>,
    ) -> Result<Sent, CommsError> {
        let channel = self.channel()?;
        check_size(self.descriptor.capabilities.output_report_byte_length, N)?;

        let written = channel.write_report(packet.as_bytes(), timeout)?;
        if written < N {
            return Err(CommsError::Transport(format!(
                "only {written} of {N} bytes were written"
            )));
        }

        trace!(path = %self.descriptor.path, bytes = written, "sent packet");
        Ok(Sent { bytes: written })
    }

    /// Blocks until one input report arrives, the timeout elapses or the
    /// device disconnects.
    ///
    /// A timeout of [`None`] waits forever. Reports shorter than `N` are
    /// padded with zeroes.
    ///
    /// Returns [`CommsError::InvalidSize`] if the device declares an input
    /// report length different from `N`.
    pub fn receive<const N: usize>(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Packet<N>, CommsError> {
        let channel = self.channel()?;
        check_size(self.descriptor.capabilities.input_report_byte_length, N)?;

        self.receive_unchecked(channel, timeout)
    }

    fn receive_unchecked<const N: usize>(
        &self,
        channel: &B::Channel,
        timeout: Option<Duration>,
    ) -> Result<Packet<N>, CommsError> {
        let mut packet = Packet::<N>::new();
        let len = channel.read_report(&mut packet, timeout)?;

        trace!(path = %self.descriptor.path, bytes = len, "received packet");
        Ok(packet)
    }

    /// Reads up to `max_count` packets within `overall_timeout`.
    ///
    /// The timeout is measured once from the start of the call, not per
    /// packet. Running out of time ends the block normally, so the result may
    /// hold fewer packets than requested or none at all. A timeout too large
    /// to be represented as a point in time, like [`Duration::MAX`], waits
    /// until `max_count` packets arrived. Any other failure
    /// ends the block as well and is stored in [`PacketBlock::fault`]
    /// alongside the packets read so far.
    ///
    /// Fails up front with [`CommsError::NotOpen`],
    /// [`CommsError::InvalidSize`] or [`CommsError::InvalidArgument`] if
    /// `max_count` is zero.
    pub fn receive_block<const N: usize>(
        &self,
        max_count: usize,
        overall_timeout: Duration,
    ) -> Result<PacketBlock<N>, CommsError> {
        let channel = self.channel()?;
        check_size(self.descriptor.capabilities.input_report_byte_length, N)?;
        if max_count == 0 {
            return Err(CommsError::InvalidArgument("at least one packet must be requested"));
        }

        // A deadline beyond what `Instant` can represent means no deadline.
        let deadline = Instant::now().checked_add(overall_timeout);
        let mut block = PacketBlock {
            packets: Vec::with_capacity(max_count.min(BLOCK_CAPACITY_HINT)),
            fault: None,
        };

        while block.packets.len() < max_count {
            let remaining = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    Some(remaining)
                },
                None => None,
            };

            match self.receive_unchecked(channel, remaining) {
                Ok(packet) => block.packets.push(packet),
                Err(CommsError::Timeout) => break,
                Err(fault) => {
                    debug!(
                        path = %self.descriptor.path,
                        read = block.packets.len(),
                        %fault,
                        "block read ended by a fault"
                    );
                    block.fault = Some(fault);
                    break;
                },
            }
        }

        Ok(block)
    }
}

impl<B: HidBackend> Drop for RawHidDevice<B> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Checks a packet length against a declared report length.
///
/// A declared length of zero is unknown and accepts any packet.
fn check_size(declared: u16, actual: usize) -> Result<(), CommsError> {
    let expected = usize::from(declared);
    if expected != 0 && expected != actual {
        return Err(CommsError::InvalidSize { expected, actual });
    }

    Ok(())
}

/// Represents an error that occurred when opening a [`RawHidDevice`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum OpenError {
    /// Indicates that the path is stale, usually because the device was
    /// detached after enumeration.
    #[error("no device was found at {0}")]
    NotFound(String),

    /// Indicates that the OS refused access to the interface.
    #[error("access to {0} was denied")]
    AccessDenied(String),

    /// Indicates that the device already holds an open handle.
    #[error("the device is already open")]
    AlreadyOpen,

    /// Indicates an unclassified failure of the OS-level open.
    #[error("the device could not be opened: {0}")]
    Transport(String),
}
