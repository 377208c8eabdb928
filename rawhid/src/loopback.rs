//! Implements an in-process backend simulating raw HID devices.
//!
//! Every simulated device is a pair of queues. The host side is what a
//! [`crate::device::RawHidDevice`] opened through [`LoopbackBackend`] talks
//! to, the device side is the [`LoopbackPeer`] returned by
//! [`LoopbackBackend::attach`]. Dropping the peer unplugs the device.
//!
//! ```
//! use std::time::Duration;
//!
//! use rawhid::{
//!     channel::Packet,
//!     descriptor::DeviceDescriptor,
//!     device::RawHidDevice,
//!     loopback::LoopbackBackend,
//! };
//!
//! let backend = LoopbackBackend::new();
//! let peer = backend.attach(DeviceDescriptor {
//!     path: "loopback/0".into(),
//!     ..Default::default()
//! });
//!
//! let mut device = RawHidDevice::new(backend.clone(), peer.descriptor().clone());
//! device.open().unwrap();
//!
//! peer.push_input(b"hello");
//! let packet: Packet = device.receive(Some(Duration::from_millis(100))).unwrap();
//! assert!(packet.starts_with(b"hello"));
//! ```

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use flume::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    catalog::HidBackend,
    channel::{CommsError, RawHidChannel},
    descriptor::DeviceDescriptor,
    device::OpenError,
};

/// The amount of output reports a simulated device buffers by default before
/// writes start to block.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 64;

/// The host-side ends of a simulated device, handed out on every open.
#[derive(Clone)]
struct HostEnds {
    descriptor: DeviceDescriptor,
    inputs: Receiver<Vec<u8>>,
    outputs: Sender<Vec<u8>>,
    access_denied: Arc<AtomicBool>,
}

type Registry = Arc<Mutex<HashMap<String, HostEnds>>>;

/// A backend whose devices are simulated in-process.
///
/// Clones share the same set of attached devices.
#[derive(Clone, Default)]
pub struct LoopbackBackend {
    devices: Registry,
}

impl LoopbackBackend {
    /// Creates a backend without any devices attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a simulated device buffering up to
    /// [`DEFAULT_OUTPUT_CAPACITY`] output reports.
    ///
    /// Attaching a second device with the same path replaces the first one.
    /// Channels already open on the first one keep talking to it, and
    /// dropping its peer leaves the replacement attached.
    pub fn attach(&self, descriptor: DeviceDescriptor) -> LoopbackPeer {
        self.attach_with_output_capacity(descriptor, DEFAULT_OUTPUT_CAPACITY)
    }

    /// Attaches a simulated device buffering up to `capacity` output reports.
    ///
    /// Once the buffer is full, writes block until the peer consumes a
    /// report, so a capacity of zero models a device that only accepts
    /// writes while the peer is actively waiting in
    /// [`LoopbackPeer::recv_output`].
    pub fn attach_with_output_capacity(
        &self,
        descriptor: DeviceDescriptor,
        capacity: usize,
    ) -> LoopbackPeer {
        let (input_tx, input_rx) = flume::unbounded();
        let (output_tx, output_rx) = flume::bounded(capacity);
        let access_denied = Arc::new(AtomicBool::new(false));

        self.devices.lock().insert(descriptor.path.clone(), HostEnds {
            descriptor: descriptor.clone(),
            inputs: input_rx,
            outputs: output_tx,
            access_denied: Arc::clone(&access_denied),
        });

        debug!(path = %descriptor.path, "attached loopback device");

        LoopbackPeer {
            descriptor,
            devices: Arc::clone(&self.devices),
            inputs: input_tx,
            outputs: output_rx,
            access_denied,
        }
    }
}

impl HidBackend for LoopbackBackend {
    type Channel = LoopbackChannel;

    fn enumerate(&self) -> Vec<DeviceDescriptor> {
        self.devices
            .lock()
            .values()
            .map(|ends| ends.descriptor.clone())
            .collect()
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<LoopbackChannel, OpenError> {
        let devices = self.devices.lock();
        let ends = devices
            .get(&descriptor.path)
            .ok_or_else(|| OpenError::NotFound(descriptor.path.clone()))?;

        if ends.access_denied.load(Ordering::SeqCst) {
            return Err(OpenError::AccessDenied(descriptor.path.clone()));
        }

        Ok(LoopbackChannel {
            inputs: ends.inputs.clone(),
            outputs: ends.outputs.clone(),
        })
    }
}

/// The host side of an open simulated device.
pub struct LoopbackChannel {
    inputs: Receiver<Vec<u8>>,
    outputs: Sender<Vec<u8>>,
}

impl RawHidChannel for LoopbackChannel {
    fn write_report(&self, src: &[u8], timeout: Option<Duration>) -> Result<usize, CommsError> {
        let report = src.to_vec();

        match timeout {
            None => self
                .outputs
                .send(report)
                .map_err(|_| CommsError::Disconnected)?,
            Some(timeout) => self
                .outputs
                .send_timeout(report, timeout)
                .map_err(|err| match err {
                    SendTimeoutError::Timeout(_) => CommsError::Timeout,
                    SendTimeoutError::Disconnected(_) => CommsError::Disconnected,
                })?,
        }

        Ok(src.len())
    }

    fn read_report(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, CommsError> {
        let report = match timeout {
            None => self.inputs.recv().map_err(|_| CommsError::Disconnected)?,
            Some(timeout) => self
                .inputs
                .recv_timeout(timeout)
                .map_err(|err| match err {
                    RecvTimeoutError::Timeout => CommsError::Timeout,
                    RecvTimeoutError::Disconnected => CommsError::Disconnected,
                })?,
        };

        let len = report.len().min(buf.len());
        buf[..len].copy_from_slice(&report[..len]);
        Ok(len)
    }
}

/// The device side of a simulated device.
///
/// Dropping the peer unplugs the device: it disappears from enumeration,
/// opening it fails with [`OpenError::NotFound`], and open channels fail with
/// [`CommsError::Disconnected`] once they have drained the reports already
/// pushed.
pub struct LoopbackPeer {
    descriptor: DeviceDescriptor,
    devices: Registry,
    inputs: Sender<Vec<u8>>,
    outputs: Receiver<Vec<u8>>,
    access_denied: Arc<AtomicBool>,
}

impl LoopbackPeer {
    /// The descriptor the device was attached with.
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Queues an input report for the host.
    pub fn push_input(&self, report: &[u8]) {
        // Only fails once no host end is left to read the report.
        let _ = self.inputs.send(report.to_vec());
    }

    /// Waits up to `timeout` for the next output report written by the host.
    pub fn recv_output(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.outputs.recv_timeout(timeout).ok()
    }

    /// Echoes every output report back as an input report until none arrived
    /// for `idle`.
    ///
    /// Returns the amount of echoed reports.
    pub fn echo_until_idle(&self, idle: Duration) -> usize {
        let mut echoed = 0;
        while let Some(report) = self.recv_output(idle) {
            self.push_input(&report);
            echoed += 1;
        }
        echoed
    }

    /// Makes subsequent opens fail with [`OpenError::AccessDenied`], as if
    /// another process claimed the interface exclusively.
    pub fn set_access_denied(&self, denied: bool) {
        self.access_denied.store(denied, Ordering::SeqCst);
    }

    /// Unplugs the device. Equivalent to dropping the peer.
    pub fn unplug(self) {}
}

impl Drop for LoopbackPeer {
    fn drop(&mut self) {
        let mut devices = self.devices.lock();

        // The path may have been taken over by a device attached later.
        let owned = devices
            .get(&self.descriptor.path)
            .is_some_and(|ends| Arc::ptr_eq(&ends.access_denied, &self.access_denied));
        if owned {
            devices.remove(&self.descriptor.path);
        }

        debug!(path = %self.descriptor.path, "unplugged loopback device");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(path: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            path: path.into(),
            ..Default::default()
        }
    }

    #[test]
    fn enumerates_attached_devices() {
        let backend = LoopbackBackend::new();
        let first = backend.attach(descriptor("loopback/0"));
        let _second = backend.attach(descriptor("loopback/1"));
        assert_eq!(backend.enumerate().len(), 2);

        first.unplug();
        let paths: Vec<String> = backend.enumerate().into_iter().map(|d| d.path).collect();
        assert_eq!(paths, ["loopback/1"]);
    }

    #[test]
    fn open_reports_stale_and_denied_paths() {
        let backend = LoopbackBackend::new();
        let peer = backend.attach(descriptor("loopback/0"));

        peer.set_access_denied(true);
        assert!(matches!(
            backend.open(peer.descriptor()),
            Err(OpenError::AccessDenied(_))
        ));

        peer.set_access_denied(false);
        assert!(backend.open(peer.descriptor()).is_ok());

        let stale = peer.descriptor().clone();
        drop(peer);
        assert!(matches!(backend.open(&stale), Err(OpenError::NotFound(_))));
    }

    #[test]
    fn replaced_device_survives_its_predecessor() {
        let backend = LoopbackBackend::new();
        let first = backend.attach(descriptor("loopback/0"));
        let second = backend.attach(descriptor("loopback/0"));

        first.unplug();
        assert_eq!(backend.enumerate().len(), 1);

        let channel = backend.open(second.descriptor()).unwrap();
        second.push_input(&[4, 2]);
        let mut buf = [0u8; 2];
        assert_eq!(channel.read_report(&mut buf, Some(Duration::from_millis(10))), Ok(2));
        assert_eq!(buf, [4, 2]);
    }

    #[test]
    fn drains_inputs_before_reporting_disconnection() {
        let backend = LoopbackBackend::new();
        let peer = backend.attach(descriptor("loopback/0"));
        let channel = backend.open(peer.descriptor()).unwrap();

        peer.push_input(&[7, 8, 9]);
        drop(peer);

        let mut buf = [0u8; 2];
        assert_eq!(channel.read_report(&mut buf, Some(Duration::from_millis(10))), Ok(2));
        assert_eq!(buf, [7, 8]);
        assert_eq!(
            channel.read_report(&mut buf, Some(Duration::from_millis(10))),
            Err(CommsError::Disconnected)
        );
        assert_eq!(channel.write_report(&[1], None), Err(CommsError::Disconnected));
    }
}
