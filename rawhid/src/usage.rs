//! Maps usage page and Generic Desktop usage codes to display names.
//!
//! The tables only cover what is useful to tell interfaces apart when listing
//! them. Unknown codes yield [`None`] rather than an error.

use std::{collections::HashMap, fmt};

use lazy_static::lazy_static;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Well-known HID usage pages.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum UsagePage {
    Undefined = 0x00,
    Generic = 0x01,
    Simulation = 0x02,
    Vr = 0x03,
    Sport = 0x04,
    Game = 0x05,
    GenericDevice = 0x06,
    Keyboard = 0x07,
    Led = 0x08,
    Button = 0x09,
    Ordinal = 0x0a,
    Telephony = 0x0b,
    Consumer = 0x0c,
    Digitizer = 0x0d,
    Haptics = 0x0e,
    Pid = 0x0f,
    Unicode = 0x10,
    Alphanumeric = 0x14,
    Sensor = 0x20,
    BarcodeScanner = 0x8c,
    WeighingDevice = 0x8d,
    MagneticStripeReader = 0x8e,
    CameraControl = 0x90,
    Arcade = 0x91,
    VendorDefinedBegin = 0xff00,
    MicrosoftBluetoothHandsfree = 0xfff3,
    VendorDefinedEnd = 0xffff,
}

/// Usages of the Generic Desktop page (`0x01`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum GenericDesktopUsage {
    Pointer = 0x01,
    Mouse = 0x02,
    Joystick = 0x04,
    Gamepad = 0x05,
    Keyboard = 0x06,
    Keypad = 0x07,
    MultiAxisController = 0x08,
    TabletPcSystemCtl = 0x09,
    PortableDeviceControl = 0x0d,
    InteractiveControl = 0x0e,
    X = 0x30,
    Y = 0x31,
    Z = 0x32,
    Rx = 0x33,
    Ry = 0x34,
    Rz = 0x35,
    Slider = 0x36,
    Dial = 0x37,
    Wheel = 0x38,
    HatSwitch = 0x39,
    ByteCount = 0x3b,
    MotionWakeup = 0x3c,
    Start = 0x3d,
    Select = 0x3e,
    Vx = 0x40,
    Vy = 0x41,
    Vz = 0x42,
    Vbrx = 0x43,
    Vbry = 0x44,
    Vbrz = 0x45,
    Vno = 0x46,
    FeatureNotification = 0x47,
    ResolutionMultiplier = 0x48,
    SysctlPower = 0x81,
    SysctlSleep = 0x82,
    SysctlWake = 0x83,
    SysctlContextMenu = 0x84,
    SysctlMainMenu = 0x85,
    SysctlAppMenu = 0x86,
    SysctlHelpMenu = 0x87,
    SysctlMenuExit = 0x88,
    SysctlMenuSelect = 0x89,
    SysctlMenuRight = 0x8a,
    SysctlMenuLeft = 0x8b,
    SysctlMenuUp = 0x8c,
    SysctlMenuDown = 0x8d,
    SysctlColdRestart = 0x8e,
    SysctlWarmRestart = 0x8f,
    DpadUp = 0x90,
    DpadDown = 0x91,
    DpadRight = 0x92,
    DpadLeft = 0x93,
    SysctlDock = 0xa0,
    SysctlUndock = 0xa1,
    SysctlSetup = 0xa2,
    SysctlSysBreak = 0xa3,
    SysctlSysDbgBreak = 0xa4,
    SysctlAppBreak = 0xa5,
    SysctlAppDbgBreak = 0xa6,
    SysctlMute = 0xa7,
    SysctlHibernate = 0xa8,
    SysctlDispInvert = 0xb0,
    SysctlDispInternal = 0xb1,
    SysctlDispExternal = 0xb2,
    SysctlDispBoth = 0xb3,
    SysctlDispDual = 0xb4,
    SysctlDispToggle = 0xb5,
    SysctlDispSwap = 0xb6,
    SysctlDispAutoscale = 0xb7,
    SystemDisplayRotationLockButton = 0xc9,
    SystemDisplayRotationLockSliderSwitch = 0xca,
    ControlEnable = 0xcb,
}

lazy_static! {
    static ref USAGE_PAGE_NAMES: HashMap<UsagePage, &'static str> = HashMap::from([
        (UsagePage::Undefined, "UNDEFINED"),
        (UsagePage::Generic, "GENERIC"),
        (UsagePage::Simulation, "SIMULATION"),
        (UsagePage::Vr, "VR"),
        (UsagePage::Sport, "SPORT"),
        (UsagePage::Game, "GAME"),
        (UsagePage::GenericDevice, "GENERIC DEVICE"),
        (UsagePage::Keyboard, "KEYBOARD"),
        (UsagePage::Led, "LED"),
        (UsagePage::Button, "BUTTON"),
        (UsagePage::Ordinal, "ORDINAL"),
        (UsagePage::Telephony, "TELEPHONY"),
        (UsagePage::Consumer, "CONSUMER"),
        (UsagePage::Digitizer, "DIGITIZER"),
        (UsagePage::Haptics, "HAPTICS"),
        (UsagePage::Pid, "PID"),
        (UsagePage::Unicode, "UNICODE"),
        (UsagePage::Alphanumeric, "ALPHANUMERIC"),
        (UsagePage::Sensor, "SENSOR"),
        (UsagePage::BarcodeScanner, "BARCODE SCANNER"),
        (UsagePage::WeighingDevice, "WEIGHING DEVICE"),
        (UsagePage::MagneticStripeReader, "MAGNETIC STRIPE READER"),
        (UsagePage::CameraControl, "CAMERA CONTROL"),
        (UsagePage::Arcade, "ARCADE"),
        (UsagePage::VendorDefinedBegin, "VENDOR DEFINED BEGIN"),
        (UsagePage::MicrosoftBluetoothHandsfree, "MICROSOFT BLUETOOTH HANDSFREE"),
        (UsagePage::VendorDefinedEnd, "VENDOR DEFINED END"),
    ]);

    static ref GENERIC_USAGE_NAMES: HashMap<GenericDesktopUsage, &'static str> = HashMap::from([
        (GenericDesktopUsage::Pointer, "POINTER"),
        (GenericDesktopUsage::Mouse, "MOUSE"),
        (GenericDesktopUsage::Joystick, "JOYSTICK"),
        (GenericDesktopUsage::Gamepad, "GAMEPAD"),
        (GenericDesktopUsage::Keyboard, "KEYBOARD"),
        (GenericDesktopUsage::Keypad, "KEYPAD"),
        (GenericDesktopUsage::MultiAxisController, "MULTI AXIS CONTROLLER"),
        (GenericDesktopUsage::TabletPcSystemCtl, "TABLET PC SYSTEM CTL"),
        (GenericDesktopUsage::PortableDeviceControl, "PORTABLE DEVICE CONTROL"),
        (GenericDesktopUsage::InteractiveControl, "INTERACTIVE CONTROL"),
        (GenericDesktopUsage::X, "X"),
        (GenericDesktopUsage::Y, "Y"),
        (GenericDesktopUsage::Z, "Z"),
        (GenericDesktopUsage::Rx, "RX"),
        (GenericDesktopUsage::Ry, "RY"),
        (GenericDesktopUsage::Rz, "RZ"),
        (GenericDesktopUsage::Slider, "SLIDER"),
        (GenericDesktopUsage::Dial, "DIAL"),
        (GenericDesktopUsage::Wheel, "WHEEL"),
        (GenericDesktopUsage::HatSwitch, "HATSWITCH"),
        (GenericDesktopUsage::ByteCount, "BYTE COUNT"),
        (GenericDesktopUsage::MotionWakeup, "MOTION WAKEUP"),
        (GenericDesktopUsage::Start, "START"),
        (GenericDesktopUsage::Select, "SELECT"),
        (GenericDesktopUsage::Vx, "VX"),
        (GenericDesktopUsage::Vy, "VY"),
        (GenericDesktopUsage::Vz, "VZ"),
        (GenericDesktopUsage::Vbrx, "VBRX"),
        (GenericDesktopUsage::Vbry, "VBRY"),
        (GenericDesktopUsage::Vbrz, "VBRZ"),
        (GenericDesktopUsage::Vno, "VNO"),
        (GenericDesktopUsage::FeatureNotification, "FEATURE NOTIFICATION"),
        (GenericDesktopUsage::ResolutionMultiplier, "RESOLUTION MULTIPLIER"),
        (GenericDesktopUsage::SysctlPower, "SYSCTL POWER"),
        (GenericDesktopUsage::SysctlSleep, "SYSCTL SLEEP"),
        (GenericDesktopUsage::SysctlWake, "SYSCTL WAKE"),
        (GenericDesktopUsage::SysctlContextMenu, "SYSCTL CONTEXT MENU"),
        (GenericDesktopUsage::SysctlMainMenu, "SYSCTL MAIN MENU"),
        (GenericDesktopUsage::SysctlAppMenu, "SYSCTL APP MENU"),
        (GenericDesktopUsage::SysctlHelpMenu, "SYSCTL HELP MENU"),
        (GenericDesktopUsage::SysctlMenuExit, "SYSCTL MENU EXIT"),
        (GenericDesktopUsage::SysctlMenuSelect, "SYSCTL MENU SELECT"),
        (GenericDesktopUsage::SysctlMenuRight, "SYSCTL MENU RIGHT"),
        (GenericDesktopUsage::SysctlMenuLeft, "SYSCTL MENU LEFT"),
        (GenericDesktopUsage::SysctlMenuUp, "SYSCTL MENU UP"),
        (GenericDesktopUsage::SysctlMenuDown, "SYSCTL MENU DOWN"),
        (GenericDesktopUsage::SysctlColdRestart, "SYSCTL COLD RESTART"),
        (GenericDesktopUsage::SysctlWarmRestart, "SYSCTL WARM RESTART"),
        (GenericDesktopUsage::DpadUp, "DPAD UP"),
        (GenericDesktopUsage::DpadDown, "DPAD DOWN"),
        (GenericDesktopUsage::DpadRight, "DPAD RIGHT"),
        (GenericDesktopUsage::DpadLeft, "DPAD LEFT"),
        (GenericDesktopUsage::SysctlDock, "SYSCTL DOCK"),
        (GenericDesktopUsage::SysctlUndock, "SYSCTL UNDOCK"),
        (GenericDesktopUsage::SysctlSetup, "SYSCTL SETUP"),
        (GenericDesktopUsage::SysctlSysBreak, "SYSCTL SYS BREAK"),
        (GenericDesktopUsage::SysctlSysDbgBreak, "SYSCTL SYS DBG BREAK"),
        (GenericDesktopUsage::SysctlAppBreak, "SYSCTL APP BREAK"),
        (GenericDesktopUsage::SysctlAppDbgBreak, "SYSCTL APP DBG BREAK"),
        (GenericDesktopUsage::SysctlMute, "SYSCTL MUTE"),
        (GenericDesktopUsage::SysctlHibernate, "SYSCTL HIBERNATE"),
        (GenericDesktopUsage::SysctlDispInvert, "SYSCTL DISP INVERT"),
        (GenericDesktopUsage::SysctlDispInternal, "SYSCTL DISP INTERNAL"),
        (GenericDesktopUsage::SysctlDispExternal, "SYSCTL DISP EXTERNAL"),
        (GenericDesktopUsage::SysctlDispBoth, "SYSCTL DISP BOTH"),
        (GenericDesktopUsage::SysctlDispDual, "SYSCTL DISP DUAL"),
        (GenericDesktopUsage::SysctlDispToggle, "SYSCTL DISP TOGGLE"),
        (GenericDesktopUsage::SysctlDispSwap, "SYSCTL DISP SWAP"),
        (GenericDesktopUsage::SysctlDispAutoscale, "SYSCTL DISP AUTOSCALE"),
        (GenericDesktopUsage::SystemDisplayRotationLockButton, "SYSTEM DISPLAY ROTATION LOCK BUTTON"),
        (
            GenericDesktopUsage::SystemDisplayRotationLockSliderSwitch,
            "SYSTEM DISPLAY ROTATION LOCK SLIDER SWITCH"
        ),
        (GenericDesktopUsage::ControlEnable, "CONTROL ENABLE"),
    ]);
}

impl UsagePage {
    /// The display name of the usage page.
    pub fn name(self) -> &'static str {
        // Every variant has an entry.
        USAGE_PAGE_NAMES.get(&self).copied().unwrap_or_default()
    }
}

impl GenericDesktopUsage {
    /// The display name of the usage.
    pub fn name(self) -> &'static str {
        GENERIC_USAGE_NAMES.get(&self).copied().unwrap_or_default()
    }
}

impl fmt::Display for UsagePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for GenericDesktopUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Looks up the display name of a raw usage page code.
///
/// Codes inside the vendor-defined range without a dedicated entry are named
/// `VENDOR DEFINED`. Returns [`None`] for any other unknown code.
pub fn usage_page_name(code: u16) -> Option<&'static str> {
    match UsagePage::try_from(code) {
        Ok(page) => Some(page.name()),
        Err(_) if code >= u16::from(UsagePage::VendorDefinedBegin) => Some("VENDOR DEFINED"),
        Err(_) => None,
    }
}

/// Looks up the display name of a raw Generic Desktop usage code.
///
/// Returns [`None`] for unknown codes.
pub fn generic_usage_name(code: u16) -> Option<&'static str> {
    GenericDesktopUsage::try_from(code)
        .ok()
        .map(GenericDesktopUsage::name)
}

/// Looks up the display name of a usage within a usage page.
///
/// Only Generic Desktop usages are named; usages on any other page yield
/// [`None`].
pub fn usage_name(usage_page: u16, usage: u16) -> Option<&'static str> {
    if usage_page == u16::from(UsagePage::Generic) {
        generic_usage_name(usage)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_names() {
        assert_eq!(usage_page_name(0x10), Some("UNICODE"));
        assert_eq!(generic_usage_name(0x3b), Some("BYTE COUNT"));
        assert_eq!(usage_page_name(0xfff3), Some("MICROSOFT BLUETOOTH HANDSFREE"));
        assert_eq!(UsagePage::GenericDevice.to_string(), "GENERIC DEVICE");
    }

    #[test]
    fn vendor_range_falls_back() {
        assert_eq!(usage_page_name(0xff00), Some("VENDOR DEFINED BEGIN"));
        assert_eq!(usage_page_name(0xffab), Some("VENDOR DEFINED"));
    }

    #[test]
    fn unknown_codes_yield_none() {
        assert_eq!(usage_page_name(0x7f), None);
        assert_eq!(generic_usage_name(0x03), None);
        assert_eq!(usage_name(0x0c, 0x01), None);
        assert_eq!(usage_name(0x01, 0x06), Some("KEYBOARD"));
    }

    #[test]
    fn every_variant_is_named() {
        for code in 0..=u16::MAX {
            if let Ok(page) = UsagePage::try_from(code) {
                assert!(!page.name().is_empty(), "{page:?}");
            }
            if let Ok(usage) = GenericDesktopUsage::try_from(code) {
                assert!(!usage.name().is_empty(), "{usage:?}");
            }
        }
    }
}
