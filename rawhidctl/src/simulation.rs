//! Simulates a Teensy running the raw HID test firmware.
//!
//! The board exposes two interfaces: a serial emulation interface printing
//! text lines and a raw HID interface streaming numbers. Commands written to
//! the raw HID interface control both streams:
//!
//! - `1` starts streaming a counter on both interfaces
//! - `0` stops streaming and sends the stop markers
//! - anything else is acknowledged with a text line

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow};
use rawhid::{
    PACKET_SIZE,
    descriptor::{DeviceAttributes, DeviceCapabilities, DeviceDescriptor},
    loopback::{LoopbackBackend, LoopbackPeer},
    payload,
};
use tracing::debug;

pub const MANUFACTURER: &str = "Teensyduino";

const VENDOR_ID: u16 = 0x16c0;
const PRODUCT_ID: u16 = 0x0486;
const STREAM_INTERVAL: Duration = Duration::from_millis(100);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A running simulated board.
pub struct Teensy {
    stop: Arc<AtomicBool>,
    firmware: JoinHandle<()>,
}

impl Teensy {
    /// Plugs a simulated board into `backend` and starts its firmware.
    pub fn attach(backend: &LoopbackBackend) -> Self {
        let serial = backend.attach(interface("loopback/teensy/0", 0, 0xffc9, 0x0004));
        let raw = backend.attach(interface("loopback/teensy/1", 1, 0xffab, 0x0200));

        let stop = Arc::new(AtomicBool::new(false));
        let firmware = thread::spawn({
            let stop = Arc::clone(&stop);
            move || Firmware::new(serial, raw).run(&stop)
        });

        Self { stop, firmware }
    }

    /// Stops the firmware and unplugs the board.
    pub fn detach(self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        self.firmware
            .join()
            .map_err(|_| anyhow!("the simulated firmware panicked"))
    }
}

fn interface(path: &str, number: i32, usage_page: u16, usage: u16) -> DeviceDescriptor {
    let report_len = PACKET_SIZE as u16;

    DeviceDescriptor {
        path: path.into(),
        manufacturer_name: MANUFACTURER.into(),
        product_name: "Teensyduino RawHID".into(),
        serial_number: "4242420".into(),
        interface_number: number,
        attributes: DeviceAttributes {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            version_number: 0x0277,
        },
        capabilities: DeviceCapabilities {
            usage_page,
            usage,
            input_report_byte_length: report_len,
            output_report_byte_length: report_len,
            input_value_cap_count: 1,
            output_value_cap_count: 1,
            input_data_index_count: 1,
            output_data_index_count: 1,
            link_collection_node_count: 1,
            ..Default::default()
        },
    }
}

struct Firmware {
    serial: LoopbackPeer,
    raw: LoopbackPeer,
    counter: u16,
    next_tick: Option<Instant>,
}

impl Firmware {
    fn new(serial: LoopbackPeer, raw: LoopbackPeer) -> Self {
        Self {
            serial,
            raw,
            counter: 0,
            next_tick: None,
        }
    }

    fn run(mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::SeqCst) {
            if let Some(command) = self.raw.recv_output(POLL_INTERVAL) {
                self.handle(command.first().copied().unwrap_or_default());
            }

            if let Some(tick) = self.next_tick.filter(|tick| Instant::now() >= *tick) {
                self.stream();
                self.next_tick = Some(tick + STREAM_INTERVAL);
            }
        }
    }

    fn handle(&mut self, command: u8) {
        debug!(command, "simulated firmware received a command");

        match command {
            1 => self.next_tick = Some(Instant::now()),
            0 => {
                self.next_tick = None;

                let mut stop = [0u8; PACKET_SIZE];
                stop[payload::STOP_SENTINEL_INDEX] = payload::STOP_SENTINEL;
                self.raw.push_input(&stop);
                self.serial.push_input(payload::TEXT_STOP_PREFIX.as_bytes());
            },
            other => self.print(&format!("received command {other}")),
        }
    }

    fn stream(&mut self) {
        self.raw
            .push_input(&payload::encode_number::<PACKET_SIZE>(self.counter));
        self.print(&format!("counter is at {}", self.counter));
        self.counter = self.counter.wrapping_add(1);
    }

    fn print(&self, line: &str) {
        self.serial.push_input(format!("{line}\r\n").as_bytes());
    }
}
