use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::Args;
use rawhid::{
    catalog::{self, HidBackend},
    channel::{CommsError, PACKET_SIZE, Packet, PacketBlock},
    device::RawHidDevice,
    hidapi_impl::HidapiBackend,
    loopback::LoopbackBackend,
    payload::{NumberMessage, TextLine},
};
use tracing::info;

use super::Cli;
use crate::{
    console::{Console, Printer},
    simulation::{self, Teensy},
};

const START: u8 = 1;
const STOP: u8 = 0;
/// How often a reader waiting forever checks whether it was aborted.
const READER_POLL: Duration = Duration::from_millis(100);
const SEPARATOR: &str =
    "################################################################################";

/// Drive a raw HID test firmware through threaded, block and burst I/O.
///
/// The interfaces of the selected device are sorted by usage. The text
/// interface is expected first, the numeric raw HID interface second.
#[derive(Args)]
pub struct ExerciseCommand {
    /// The manufacturer name of the device under test
    #[arg(short, long, default_value = simulation::MANUFACTURER)]
    pub manufacturer: String,

    /// How long a single send may wait for the device
    #[arg(long, default_value_t = 100)]
    pub send_timeout_ms: u64,

    /// How long the device streams before it is told to stop
    #[arg(long, default_value_t = 1000)]
    pub pause_ms: u64,

    /// How many packets a block read asks for
    #[arg(long, default_value_t = 4)]
    pub block_count: usize,

    /// The overall time limit of a block read
    #[arg(long, default_value_t = 2000)]
    pub block_timeout_ms: u64,

    /// Give up on a reader after this long without input instead of waiting
    /// for the stop marker forever
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// Run against a simulated board instead of real hardware
    #[arg(long)]
    pub simulate: bool,
}

impl ExerciseCommand {
    pub fn execute(&self, root: &Cli) -> Result<()> {
        if root.json {
            bail!("exercise prints a live transcript and has no JSON output");
        }

        if !self.simulate {
            return self.run(HidapiBackend);
        }

        let backend = LoopbackBackend::new();
        let teensy = Teensy::attach(&backend);
        let result = self.run(backend);
        teensy.detach()?;
        result
    }

    fn run<B: HidBackend + Clone>(&self, backend: B) -> Result<()> {
        let mut descriptors =
            catalog::filter_by_manufacturer(&backend.enumerate(), &self.manufacturer);
        catalog::sort_by_usage(&mut descriptors);

        if descriptors.len() < 2 {
            bail!(
                "expected two interfaces of {}, found {}",
                self.manufacturer,
                descriptors.len()
            );
        }

        let mut devices = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let path = descriptor.path.clone();
            let mut device = RawHidDevice::new(backend.clone(), descriptor);
            device
                .open()
                .with_context(|| format!("could not open {path}"))?;
            devices.push(device);
        }
        info!(count = devices.len(), "opened all interfaces");

        let console = Console::spawn();
        let result = Exercise {
            text: &devices[0],
            numbers: &devices[1],
            options: self,
            out: console.printer(),
        }
        .run();
        console.finish()?;

        result
    }

    fn send_timeout(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.send_timeout_ms))
    }

    fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    fn block_timeout(&self) -> Duration {
        Duration::from_millis(self.block_timeout_ms)
    }

    fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

struct Exercise<'a, B: HidBackend> {
    text: &'a RawHidDevice<B>,
    numbers: &'a RawHidDevice<B>,
    options: &'a ExerciseCommand,
    out: Printer,
}

impl<B: HidBackend> Exercise<'_, B> {
    fn run(self) -> Result<()> {
        self.threaded()?;
        self.out.line(SEPARATOR);
        self.out.blank();

        self.block_reads()?;
        self.out.line(SEPARATOR);
        self.out.blank();

        self.contiguous_writes()?;
        self.out.line(SEPARATOR);
        self.out.blank();

        self.out.line("End of the exercise");
        Ok(())
    }

    fn command(&self, command: u8) -> Result<()> {
        self.numbers
            .send(
                &Packet::<PACKET_SIZE>::from_slice(&[command]),
                self.options.send_timeout(),
            )
            .with_context(|| format!("could not send command {command}"))?;
        Ok(())
    }

    /// Two readers block on different interfaces while the main thread writes.
    ///
    /// If a command fails, the readers are told to give up so the error can be
    /// reported instead of waiting for stop markers that will never arrive.
    fn threaded(&self) -> Result<()> {
        self.out.line("Thread test");
        self.out.blank();

        let abort = AtomicBool::new(false);
        let numbers = self.reader("numbers", self.numbers, &abort);
        let text = self.reader("text", self.text, &abort);

        let (commands, numbers_ok, text_ok) = thread::scope(|s| {
            let numbers = s.spawn(move || read_numbers(&numbers));
            let text = s.spawn(move || read_text(&text));

            let commands = self.start_then_stop();
            if commands.is_err() {
                abort.store(true, Ordering::SeqCst);
            }

            (
                commands,
                numbers.join().unwrap_or(false),
                text.join().unwrap_or(false),
            )
        });
        commands?;

        self.out.blank();
        self.out.line(format!(
            "End of thread test (numbers: {numbers_ok}, text: {text_ok})"
        ));
        self.out.blank();
        Ok(())
    }

    fn start_then_stop(&self) -> Result<()> {
        self.out.line("Sending start command");
        self.command(START)?;

        thread::sleep(self.options.pause());
        self.out.line("Sending stop command");
        self.command(STOP)
    }

    fn reader<'s>(
        &'s self,
        name: &'static str,
        device: &'s RawHidDevice<B>,
        abort: &'s AtomicBool,
    ) -> Reader<'s, B> {
        Reader {
            name,
            device,
            abort,
            idle_limit: self.options.read_timeout(),
            out: &self.out,
        }
    }

    /// Lets the device stream for a while, then reads a block from each
    /// interface.
    fn block_reads(&self) -> Result<()> {
        self.out.line("Testing block reads");
        self.out.blank();

        self.out.line("Sending start command");
        self.command(START)?;
        thread::sleep(self.options.pause());

        let count = self.options.block_count;
        let text = self
            .text
            .receive_block::<PACKET_SIZE>(count, self.options.block_timeout())?;
        let numbers = self
            .numbers
            .receive_block::<PACKET_SIZE>(count, self.options.block_timeout())?;

        self.print_text_block("block0", &text);
        self.print_number_block("block1", &numbers);

        self.out.line("Sending stop command");
        self.command(STOP)?;
        self.out.blank();
        Ok(())
    }

    /// Sends two commands back to back and reads the responses as one block.
    fn contiguous_writes(&self) -> Result<()> {
        self.out.line("Testing contiguous writes and block reads");
        self.out.blank();

        self.command(2)?;
        self.command(3)?;
        thread::sleep(Duration::from_millis(100));

        let count = self.options.block_count;
        let responses = self
            .text
            .receive_block::<PACKET_SIZE>(count, self.options.block_timeout())?;
        self.print_text_block("block2", &responses);
        self.out.blank();
        Ok(())
    }

    fn print_text_block(&self, name: &str, block: &PacketBlock) {
        self.out
            .line(format!("{name}: number of packets = {}", block.len()));
        for packet in block {
            match TextLine::parse(packet) {
                TextLine::Line(line) => self.out.line(line),
                TextLine::Stop => self.out.line("<stop>"),
            }
        }
        self.print_fault(block);
    }

    fn print_number_block(&self, name: &str, block: &PacketBlock) {
        self.out
            .line(format!("{name}: number of packets = {}", block.len()));
        for packet in block {
            match NumberMessage::parse(packet) {
                Some(NumberMessage::Number(number)) => self.out.line(number.to_string()),
                Some(NumberMessage::Stop) => self.out.line("<stop>"),
                None => {},
            }
        }
        self.print_fault(block);
    }

    fn print_fault(&self, block: &PacketBlock) {
        if let Some(fault) = &block.fault {
            self.out.line(format!("the block ended early: {fault}"));
        }
    }
}

/// A reader thread's view of one interface.
struct Reader<'a, B: HidBackend> {
    name: &'static str,
    device: &'a RawHidDevice<B>,
    abort: &'a AtomicBool,
    idle_limit: Option<Duration>,
    out: &'a Printer,
}

impl<B: HidBackend> Reader<'_, B> {
    /// Waits for the next packet.
    ///
    /// Returns [`None`] once the device fails, the reader is aborted or no
    /// packet arrived within the idle limit.
    fn next(&self) -> Option<Packet> {
        let start = Instant::now();

        loop {
            let err = match self.device.receive(Some(READER_POLL)) {
                Ok(packet) => return Some(packet),
                Err(err) => err,
            };

            if err == CommsError::Timeout {
                if self.abort.load(Ordering::SeqCst) {
                    self.out.line(format!("{}: aborted", self.name));
                    return None;
                }
                if self
                    .idle_limit
                    .is_none_or(|limit| start.elapsed() < limit)
                {
                    continue;
                }
            }

            self.out.line(format!("{}: finished with {err}", self.name));
            return None;
        }
    }
}

/// Prints numbers until the stop sentinel arrives or reading ends.
fn read_numbers<B: HidBackend>(reader: &Reader<'_, B>) -> bool {
    while let Some(packet) = reader.next() {
        match NumberMessage::parse(&packet) {
            Some(NumberMessage::Number(number)) => {
                reader.out.line(format!("numbers: received {number}"));
            },
            Some(NumberMessage::Stop) | None => {
                reader.out.line("numbers: finished");
                return true;
            },
        }
    }

    false
}

/// Prints text lines until a line starting with `STOP` arrives or reading
/// ends.
fn read_text<B: HidBackend>(reader: &Reader<'_, B>) -> bool {
    while let Some(packet) = reader.next() {
        match TextLine::parse(&packet) {
            TextLine::Line(line) => reader.out.line(format!("text: {line}")),
            TextLine::Stop => {
                reader.out.line("text: finished");
                return true;
            },
        }
    }

    false
}
