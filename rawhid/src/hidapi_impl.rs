//! Implements the OS backend using the `hidapi` crate.
//!
//! [`hidapi`](https://docs.rs/hidapi) wraps the [libusb/hidapi](https://github.com/libusb/hidapi)
//! C library and provides cross-platform enumeration and report I/O. Report
//! layouts are derived by parsing each interface's report descriptor with
//! [`hidreport`].
//!
//! Every open interface holds two OS handles, one per direction. This needs
//! the OS to allow opening the same path twice. On macOS, where hidapi opens
//! devices exclusively by default, exclusive mode is turned off before
//! opening, so other processes can open the interface at the same time.

use std::time::{Duration, Instant};

use hidapi::{DeviceInfo, HidApi, HidDevice, HidError, MAX_REPORT_DESCRIPTOR_SIZE};
use hidreport::{Field, Report, ReportDescriptor};
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    catalog::HidBackend,
    channel::{CommsError, RawHidChannel},
    descriptor::{DeviceAttributes, DeviceCapabilities, DeviceDescriptor},
    device::OpenError,
};

/// The report ID prepended to every output report.
///
/// Raw HID interfaces use a single, unnumbered report, which hidapi expects
/// to be addressed as report `0`.
const UNNUMBERED_REPORT_ID: u8 = 0x00;

/// Lowercase fragments of OS error messages meaning the device went away.
const DISCONNECTED_MESSAGES: &[&str] = &[
    "no such device",
    "not connected",
    "disconnected",
    "device removed",
];

/// Lowercase fragments of OS error messages meaning access was refused.
const ACCESS_DENIED_MESSAGES: &[&str] = &[
    "permission denied",
    "access is denied",
    "eacces",
    "eperm",
    "exclusive access",
];

/// Lowercase fragments of OS error messages meaning the path does not exist.
const NOT_FOUND_MESSAGES: &[&str] = &[
    "no such file",
    "no such device",
    "cannot find",
    "not found",
];

/// The backend talking to the OS through hidapi.
///
/// Every call creates a fresh [`HidApi`] context, so enumeration is always a
/// full re-scan.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct HidapiBackend;

impl HidBackend for HidapiBackend {
    type Channel = HidapiChannel;

    fn enumerate(&self) -> Vec<DeviceDescriptor> {
        let api = match HidApi::new() {
            Ok(api) => api,
            Err(err) => {
                warn!(%err, "could not initialize hidapi, no devices will be listed");
                return Vec::new();
            },
        };

        api.device_list().map(|info| describe(&api, info)).collect()
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<HidapiChannel, OpenError> {
        let api = HidApi::new().map_err(|err| OpenError::Transport(err.to_string()))?;

        // The second handle below would otherwise fail with an
        // exclusive-access error.
        #[cfg(target_os = "macos")]
        api.set_open_exclusive(false);

        // A path missing from a fresh scan belongs to a detached device.
        let info = api
            .device_list()
            .find(|info| info.path().to_string_lossy() == descriptor.path.as_str())
            .ok_or_else(|| OpenError::NotFound(descriptor.path.clone()))?;

        // Input and output get separate handles so that a reader blocked on
        // one never holds up a writer on the other.
        let reader = api
            .open_path(info.path())
            .map_err(|err| open_error(&descriptor.path, err))?;
        let writer = api
            .open_path(info.path())
            .map_err(|err| open_error(&descriptor.path, err))?;

        debug!(path = %descriptor.path, "opened hidapi handles");

        Ok(HidapiChannel {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        })
    }
}

/// An open hidapi interface.
///
/// Each direction is guarded by its own lock. Waiting for a lock counts
/// against the caller's timeout. The OS write itself is a single blocking
/// call that hidapi cannot bound, so a send timeout only limits how long the
/// output direction may be busy with other writers.
pub struct HidapiChannel {
    reader: Mutex<HidDevice>,
    writer: Mutex<HidDevice>,
}

impl RawHidChannel for HidapiChannel {
    fn write_report(&self, src: &[u8], timeout: Option<Duration>) -> Result<usize, CommsError> {
        let (writer, _) = lock(&self.writer, timeout)?;

        let written = writer.write(&frame_report(src)).map_err(comms_error)?;
        Ok(payload_len(written))
    }

    fn read_report(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, CommsError> {
        let (reader, remaining) = lock(&self.reader, timeout)?;

        read_outcome(reader.read_timeout(buf, timeout_millis(remaining)))
    }
}

/// Prepends the report ID hidapi expects in front of every output report.
fn frame_report(payload: &[u8]) -> Vec<u8> {
    let mut report = Vec::with_capacity(payload.len() + 1);
    report.push(UNNUMBERED_REPORT_ID);
    report.extend_from_slice(payload);
    report
}

/// Converts the amount of bytes hidapi wrote into payload bytes.
///
/// The report ID byte is included in hidapi's count.
fn payload_len(written: usize) -> usize {
    written.saturating_sub(1)
}

/// Converts a timeout into hidapi's milliseconds, where `-1` blocks forever.
///
/// Rounds up so that a sub-millisecond rest never turns into a
/// non-blocking poll.
fn timeout_millis(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => -1,
        Some(timeout) => i32::try_from(timeout.as_micros().div_ceil(1000)).unwrap_or(i32::MAX),
    }
}

/// Maps the result of a timed hidapi read. Reading nothing means the timeout
/// elapsed.
fn read_outcome(result: Result<usize, HidError>) -> Result<usize, CommsError> {
    match result {
        Ok(0) => Err(CommsError::Timeout),
        Ok(len) => Ok(len),
        Err(err) => Err(comms_error(err)),
    }
}

/// Locks one direction of a channel within `timeout`.
///
/// Returns the guard and the part of the timeout left after waiting.
fn lock<T>(
    mutex: &Mutex<T>,
    timeout: Option<Duration>,
) -> Result<(MutexGuard<'_, T>, Option<Duration>), CommsError> {
    let Some(timeout) = timeout else {
        return Ok((mutex.lock(), None));
    };

    let start = Instant::now();
    let guard = mutex.try_lock_for(timeout).ok_or(CommsError::Timeout)?;

    Ok((guard, Some(timeout.saturating_sub(start.elapsed()))))
}

/// Builds the descriptor of one enumerated interface.
///
/// Failing to read the report layout is not fatal: the interface is listed
/// with zeroed report lengths and counts.
fn describe(api: &HidApi, info: &DeviceInfo) -> DeviceDescriptor {
    let path = info.path().to_string_lossy().into_owned();

    let mut capabilities = match query_layout(api, info) {
        Ok(capabilities) => capabilities,
        Err(err) => {
            debug!(%path, %err, "could not query the report layout");
            DeviceCapabilities::default()
        },
    };
    capabilities.usage_page = info.usage_page();
    capabilities.usage = info.usage();

    DeviceDescriptor {
        path,
        manufacturer_name: info.manufacturer_string().unwrap_or_default().to_owned(),
        product_name: info.product_string().unwrap_or_default().to_owned(),
        serial_number: info.serial_number().unwrap_or_default().to_owned(),
        interface_number: info.interface_number(),
        attributes: DeviceAttributes {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            version_number: info.release_number(),
        },
        capabilities,
    }
}

/// Opens an interface just long enough to read and parse its report
/// descriptor.
fn query_layout(api: &HidApi, info: &DeviceInfo) -> Result<DeviceCapabilities, LayoutError> {
    let device = api.open_path(info.path())?;

    let mut raw_descriptor = vec![0u8; MAX_REPORT_DESCRIPTOR_SIZE];
    let descriptor_size = device.get_report_descriptor(&mut raw_descriptor)?;
    let descriptor = ReportDescriptor::try_from(&raw_descriptor[..descriptor_size])?;

    let input = ReportStats::of(descriptor.input_reports());
    let output = ReportStats::of(descriptor.output_reports());
    let feature = ReportStats::of(descriptor.feature_reports());

    Ok(DeviceCapabilities {
        input_report_byte_length: input.byte_length,
        output_report_byte_length: output.byte_length,
        feature_report_byte_length: feature.byte_length,
        input_button_cap_count: input.button_caps,
        input_value_cap_count: input.value_caps,
        input_data_index_count: input.data_indices,
        output_button_cap_count: output.button_caps,
        output_value_cap_count: output.value_caps,
        output_data_index_count: output.data_indices,
        feature_button_cap_count: feature.button_caps,
        feature_value_cap_count: feature.value_caps,
        feature_data_index_count: feature.data_indices,
        ..Default::default()
    })
}

/// Summarizes all reports of one kind.
///
/// Array fields count as button caps and variable fields as value caps.
/// Constant (padding) fields carry no data and are ignored.
#[derive(Clone, Copy, Default)]
struct ReportStats {
    byte_length: u16,
    button_caps: u16,
    value_caps: u16,
    data_indices: u16,
}

impl ReportStats {
    fn of<R: Report>(reports: &[R]) -> Self {
        let mut stats = Self::default();

        for report in reports {
            let payload_len = report
                .size_in_bytes()
                .saturating_sub(usize::from(report.report_id().is_some()));
            stats.byte_length = stats.byte_length.max(saturate(payload_len));

            for field in report.fields() {
                match field {
                    Field::Array(_) => stats.button_caps = stats.button_caps.saturating_add(1),
                    Field::Variable(_) => stats.value_caps = stats.value_caps.saturating_add(1),
                    _ => continue,
                }
                stats.data_indices = stats.data_indices.saturating_add(1);
            }
        }

        stats
    }
}

fn saturate(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

fn matches_any(message: &str, fragments: &[&str]) -> bool {
    let message = message.to_lowercase();
    fragments.iter().any(|fragment| message.contains(fragment))
}

fn comms_error(err: HidError) -> CommsError {
    let message = err.to_string();
    if matches_any(&message, DISCONNECTED_MESSAGES) {
        CommsError::Disconnected
    } else {
        CommsError::Transport(message)
    }
}

fn open_error(path: &str, err: HidError) -> OpenError {
    let message = err.to_string();
    if matches_any(&message, ACCESS_DENIED_MESSAGES) {
        OpenError::AccessDenied(path.to_owned())
    } else if matches_any(&message, NOT_FOUND_MESSAGES) {
        OpenError::NotFound(path.to_owned())
    } else {
        OpenError::Transport(format!("{path}: {message}"))
    }
}

/// Represents an error that occurred when reading the report layout of an
/// interface.
#[derive(Debug, Error)]
enum LayoutError {
    /// Indicates that hidapi returned an error.
    #[error("hidapi returned an error")]
    HidApi(#[from] HidError),

    /// Indicates that the HID report descriptor could not be parsed.
    #[error("the report descriptor could not be parsed")]
    ReportDescriptor(#[from] hidreport::ParserError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hid_error(message: &str) -> HidError {
        HidError::HidApiError {
            message: message.to_owned(),
        }
    }

    #[test]
    fn classifies_open_failures() {
        assert_eq!(
            open_error("/dev/hidraw0", hid_error("Failed to open: Permission denied")),
            OpenError::AccessDenied("/dev/hidraw0".into())
        );
        assert_eq!(
            open_error("/dev/hidraw0", hid_error("No such file or directory")),
            OpenError::NotFound("/dev/hidraw0".into())
        );
        assert!(matches!(
            open_error("/dev/hidraw0", hid_error("Input/output error")),
            OpenError::Transport(_)
        ));
    }

    #[test]
    fn frames_reports_with_the_unnumbered_id() {
        assert_eq!(frame_report(&[0xaa, 0xbb]), [0x00, 0xaa, 0xbb]);
        assert_eq!(frame_report(&[]), [0x00]);

        assert_eq!(payload_len(65), 64);
        assert_eq!(payload_len(0), 0);
    }

    #[test]
    fn converts_timeouts_to_millis() {
        assert_eq!(timeout_millis(None), -1);
        assert_eq!(timeout_millis(Some(Duration::ZERO)), 0);
        assert_eq!(timeout_millis(Some(Duration::from_micros(1))), 1);
        assert_eq!(timeout_millis(Some(Duration::from_millis(100))), 100);
        assert_eq!(timeout_millis(Some(Duration::MAX)), i32::MAX);
    }

    #[test]
    fn empty_reads_are_timeouts() {
        assert_eq!(read_outcome(Ok(0)), Err(CommsError::Timeout));
        assert_eq!(read_outcome(Ok(64)), Ok(64));
        assert_eq!(
            read_outcome(Err(hid_error("No such device"))),
            Err(CommsError::Disconnected)
        );
    }

    #[test]
    fn lock_wait_counts_against_the_timeout() {
        let mutex = Mutex::new(());
        let timeout = Duration::from_millis(200);

        let (guard, remaining) = lock(&mutex, Some(timeout)).unwrap();
        assert!(remaining.is_some_and(|remaining| remaining <= timeout));

        // Held elsewhere, the lock cannot be taken within the timeout.
        std::thread::scope(|s| {
            let contender = s.spawn(|| lock(&mutex, Some(Duration::from_millis(20))).map(|_| ()));
            assert_eq!(contender.join().unwrap(), Err(CommsError::Timeout));
        });
        drop(guard);

        let (_guard, remaining) = lock(&mutex, None).unwrap();
        assert_eq!(remaining, None);
    }

    #[test]
    fn classifies_io_failures() {
        assert_eq!(comms_error(hid_error("No such device")), CommsError::Disconnected);
        assert_eq!(
            comms_error(hid_error("The device is not connected.")),
            CommsError::Disconnected
        );
        assert!(matches!(
            comms_error(hid_error("Broken pipe")),
            CommsError::Transport(_)
        ));
    }
}
