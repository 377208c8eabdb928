use std::time::Duration;

use rawhid::{
    descriptor::DeviceDescriptor,
    device::RawHidDevice,
    loopback::{LoopbackBackend, LoopbackPeer},
};

/// Generous upper slack for timing assertions on loaded CI machines.
pub const SLACK: Duration = Duration::from_millis(500);

/// A descriptor shaped like a Teensy raw HID interface.
pub fn raw_hid_descriptor(path: &str) -> DeviceDescriptor {
    let mut descriptor = DeviceDescriptor {
        path: path.into(),
        manufacturer_name: "Teensyduino".into(),
        product_name: "Teensyduino RawHID".into(),
        interface_number: 0,
        ..Default::default()
    };
    descriptor.attributes.vendor_id = 0x16c0;
    descriptor.attributes.product_id = 0x0486;
    descriptor.capabilities.usage_page = 0xffab;
    descriptor.capabilities.usage = 0x0200;
    descriptor.capabilities.input_report_byte_length = 64;
    descriptor.capabilities.output_report_byte_length = 64;
    descriptor
}

/// Attaches a simulated raw HID interface and opens a device on it.
pub fn open_loopback(path: &str) -> (RawHidDevice<LoopbackBackend>, LoopbackPeer) {
    let backend = LoopbackBackend::new();
    let peer = backend.attach(raw_hid_descriptor(path));

    let mut device = RawHidDevice::new(backend, peer.descriptor().clone());
    device.open().unwrap();

    (device, peer)
}
