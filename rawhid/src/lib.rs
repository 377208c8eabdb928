//! Raw packet I/O with vendor-defined HID interfaces.
//!
//! Many microcontroller boards (Teensy, various Arduino cores, custom
//! firmware) expose a so-called "raw HID" interface next to their regular
//! keyboard or serial functionality. Such an interface declares a
//! vendor-defined usage page (`0xFF00` to `0xFFFF`) and exchanges fixed-size
//! opaque reports, usually 64 bytes, whose meaning is entirely up to the
//! firmware.
//!
//! This crate finds those interfaces and moves packets in and out of them:
//!
//! - [`catalog::enumerate`] lists every attached HID interface together with
//!   its metadata (vendor/product IDs, usage page and usage, report lengths).
//! - [`device::RawHidDevice`] owns one open interface and offers
//!   [`send`](device::RawHidDevice::send),
//!   [`receive`](device::RawHidDevice::receive) and
//!   [`receive_block`](device::RawHidDevice::receive_block), all bounded by
//!   timeouts.
//! - [`payload`] contains small encodings commonly layered on top of raw
//!   packets, [`usage`] turns usage codes into human-readable names.
//!
//! The OS is accessed through [`hidapi`](https://docs.rs/hidapi). For tests
//! and demos, [`loopback`] provides simulated devices living entirely in the
//! current process.
//!
//! # Quickstart
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use rawhid::{
//!     catalog,
//!     channel::Packet,
//!     device::RawHidDevice,
//!     payload,
//! };
//!
//! // Enumeration is a fresh snapshot of the attached interfaces.
//! let mut interfaces = catalog::filter_by_manufacturer(&catalog::enumerate(), "Teensyduino");
//!
//! // The OS order is arbitrary, so sorting by usage makes the
//! // interfaces of one device distinguishable.
//! catalog::sort_by_usage(&mut interfaces);
//!
//! let descriptor = interfaces
//!     .into_iter()
//!     .find(|descriptor| descriptor.is_vendor_defined())
//!     .expect("no raw HID interface was found");
//! println!("{descriptor}");
//!
//! let mut device = RawHidDevice::from_descriptor(descriptor);
//! device.open().expect("could not open device");
//!
//! // Ask the firmware to start streaming.
//! let start = Packet::<64>::from_slice(&[1]);
//! device
//!     .send(&start, Some(Duration::from_millis(100)))
//!     .expect("could not send packet");
//!
//! // Read up to four packets within two seconds. Running out of time is
//! // not an error, the block simply holds fewer packets.
//! let block = device
//!     .receive_block::<64>(4, Duration::from_secs(2))
//!     .expect("could not read block");
//! for packet in &block {
//!     println!("{:?}", payload::NumberMessage::parse(packet));
//! }
//! if let Some(fault) = block.fault {
//!     eprintln!("the block ended early: {fault}");
//! }
//!
//! // Dropping the device closes it as well.
//! device.close();
//! ```
//!
//! # Threads
//!
//! [`device::RawHidDevice`] is [`Sync`] and its I/O methods take `&self`, so a
//! reader thread blocked in [`receive`](device::RawHidDevice::receive) does
//! not prevent a writer thread from calling
//! [`send`](device::RawHidDevice::send) on the same device. Two threads
//! reading the same device at once are not coordinated and each gets an
//! unpredictable share of the incoming packets.

pub mod catalog;
pub mod channel;
pub mod descriptor;
pub mod device;
pub mod hidapi_impl;
pub mod loopback;
pub mod payload;
pub mod usage;

pub use channel::{CommsError, PACKET_SIZE, Packet, PacketBlock};
pub use descriptor::DeviceDescriptor;
pub use device::{OpenError, RawHidDevice};
