//! Discovers the HID interfaces attached to the local machine.
//!
//! Enumeration is always a full re-scan returning a snapshot. There is no
//! caching and no notification about devices attached or detached later; call
//! [`enumerate`] again to refresh.

use crate::{
    channel::RawHidChannel,
    descriptor::DeviceDescriptor,
    device::OpenError,
    hidapi_impl::HidapiBackend,
};

/// Represents a source of HID interfaces, usually the OS.
///
/// Together with [`RawHidChannel`] this is all a [`crate::device::RawHidDevice`]
/// needs: enumerate, open, write one report, read one report. Closing is done
/// by dropping the channel.
pub trait HidBackend: Send + Sync {
    /// The channel type returned by [`Self::open`].
    type Channel: RawHidChannel;

    /// Lists all currently attached interfaces.
    ///
    /// This never fails. Interfaces whose metadata cannot be fully queried are
    /// listed with zeroed capabilities, and a backend that cannot be
    /// initialized at all yields an empty list.
    fn enumerate(&self) -> Vec<DeviceDescriptor>;

    /// Opens the interface described by `descriptor` for reading and writing.
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Self::Channel, OpenError>;
}

/// Lists all HID interfaces currently attached to the local machine.
///
/// The order is defined by the OS and must not be relied upon. Use
/// [`sort_by_usage`] when the interfaces of one device have to be told apart.
pub fn enumerate() -> Vec<DeviceDescriptor> {
    HidapiBackend.enumerate()
}

/// Selects the descriptors reporting the given manufacturer name.
pub fn filter_by_manufacturer(
    descriptors: &[DeviceDescriptor],
    manufacturer_name: &str,
) -> Vec<DeviceDescriptor> {
    descriptors
        .iter()
        .filter(|descriptor| descriptor.manufacturer_name == manufacturer_name)
        .cloned()
        .collect()
}

/// Sorts descriptors by their usage, keeping the relative order of equal
/// usages.
pub fn sort_by_usage(descriptors: &mut [DeviceDescriptor]) {
    descriptors.sort_by_key(|descriptor| descriptor.capabilities.usage);
}
