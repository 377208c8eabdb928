//! Implements the immutable descriptor snapshot of a single HID interface.

use std::fmt;

use crate::usage;

/// The usage pages reserved for vendor-defined usages.
const VENDOR_DEFINED_USAGE_PAGES: std::ops::RangeInclusive<u16> = 0xff00..=0xffff;

/// Describes one HID interface as seen during enumeration.
///
/// A physical device exposing several logical interfaces yields one
/// descriptor per interface, all sharing vendor and product IDs.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeviceDescriptor {
    /// The opaque, OS-specific path used to open the interface.
    pub path: String,

    /// The manufacturer string, empty if the device does not provide one.
    pub manufacturer_name: String,

    /// The product string, empty if the device does not provide one.
    pub product_name: String,

    /// The serial number string, empty if the device does not provide one.
    pub serial_number: String,

    /// The USB interface number, or `-1` if unknown.
    pub interface_number: i32,

    /// Vendor, product and version identifiers.
    pub attributes: DeviceAttributes,

    /// Usage classification and report layout.
    pub capabilities: DeviceCapabilities,
}

impl DeviceDescriptor {
    /// Whether the interface lives on a vendor-defined usage page, which is
    /// where raw HID interfaces are found.
    pub fn is_vendor_defined(&self) -> bool {
        VENDOR_DEFINED_USAGE_PAGES.contains(&self.capabilities.usage_page)
    }
}

/// Identifies the device an interface belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeviceAttributes {
    pub vendor_id: u16,
    pub product_id: u16,

    /// The device release number in binary-coded decimal.
    pub version_number: u16,
}

/// Describes the usage and report layout of an interface.
///
/// Report byte lengths are payload lengths without the report ID prefix. A
/// length of zero means the interface declares no report of that kind, or
/// that its report descriptor could not be queried.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeviceCapabilities {
    pub usage_page: u16,
    pub usage: u16,
    pub input_report_byte_length: u16,
    pub output_report_byte_length: u16,
    pub feature_report_byte_length: u16,
    pub link_collection_node_count: u16,
    pub input_button_cap_count: u16,
    pub input_value_cap_count: u16,
    pub input_data_index_count: u16,
    pub output_button_cap_count: u16,
    pub output_value_cap_count: u16,
    pub output_data_index_count: u16,
    pub feature_button_cap_count: u16,
    pub feature_value_cap_count: u16,
    pub feature_data_index_count: u16,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let caps = &self.capabilities;

        writeln!(f, "Device path: {}", self.path)?;
        writeln!(f, "Manufacturer's name: {}", self.manufacturer_name)?;
        writeln!(f, "Product name: {}", self.product_name)?;
        writeln!(f, "VendorID: {:#06x}", self.attributes.vendor_id)?;
        writeln!(f, "ProductID: {:#06x}", self.attributes.product_id)?;
        writeln!(f, "Version Number: {}", self.attributes.version_number)?;
        writeln!(
            f,
            "Usage Page: {:#06x} ({})",
            caps.usage_page,
            usage::usage_page_name(caps.usage_page).unwrap_or("UNKNOWN")
        )?;
        writeln!(f, "Usage: {:#06x}", caps.usage)?;
        writeln!(f, "Input Report Byte Length: {}", caps.input_report_byte_length)?;
        writeln!(f, "Output Report Byte Length: {}", caps.output_report_byte_length)?;
        writeln!(f, "Feature Report Byte Length: {}", caps.feature_report_byte_length)?;
        writeln!(f, "Number Link Collection Nodes: {}", caps.link_collection_node_count)?;
        writeln!(f, "Number Input Button Caps: {}", caps.input_button_cap_count)?;
        writeln!(f, "Number Input Value Caps: {}", caps.input_value_cap_count)?;
        writeln!(f, "Number Input Data Indices: {}", caps.input_data_index_count)?;
        writeln!(f, "Number Output Button Caps: {}", caps.output_button_cap_count)?;
        writeln!(f, "Number Output Value Caps: {}", caps.output_value_cap_count)?;
        writeln!(f, "Number Output Data Indices: {}", caps.output_data_index_count)?;
        writeln!(f, "Number Feature Button Caps: {}", caps.feature_button_cap_count)?;
        writeln!(f, "Number Feature Value Caps: {}", caps.feature_value_cap_count)?;
        write!(f, "Number Feature Data Indices: {}", caps.feature_data_index_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_defined_usage_pages() {
        let mut descriptor = DeviceDescriptor::default();
        descriptor.capabilities.usage_page = 0xffab;
        assert!(descriptor.is_vendor_defined());

        descriptor.capabilities.usage_page = 0x0001;
        assert!(!descriptor.is_vendor_defined());
    }

    #[test]
    fn display_lists_every_field() {
        let descriptor = DeviceDescriptor {
            path: "/dev/hidraw3".into(),
            manufacturer_name: "Teensyduino".into(),
            attributes: DeviceAttributes {
                vendor_id: 0x16c0,
                product_id: 0x0486,
                version_number: 0x0100,
            },
            capabilities: DeviceCapabilities {
                usage_page: 0xffab,
                usage: 0x0200,
                input_report_byte_length: 64,
                output_report_byte_length: 64,
                ..Default::default()
            },
            ..Default::default()
        };

        let listing = descriptor.to_string();
        assert!(listing.starts_with("Device path: /dev/hidraw3\n"));
        assert!(listing.contains("VendorID: 0x16c0"));
        assert!(listing.contains("Usage Page: 0xffab (VENDOR DEFINED)"));
        assert!(listing.contains("Output Report Byte Length: 64"));
        assert_eq!(listing.lines().count(), 21);
    }
}
