use std::io::{BufWriter, Write};

use anyhow::Result;
use clap::Args;
use itertools::{Itertools, Position};
use owo_colors::OwoColorize;
use rawhid::{catalog, descriptor::DeviceDescriptor, usage};
use serde_json::json;

use super::Cli;

/// List attached HID interfaces and their report layout.
#[derive(Args)]
pub struct ListCommand {
    /// Only list interfaces reporting this manufacturer name
    #[arg(short, long)]
    pub manufacturer: Option<String>,

    /// Only list interfaces on a vendor-defined usage page
    #[arg(long)]
    pub vendor_only: bool,
}

impl ListCommand {
    pub fn execute(&self, root: &Cli) -> Result<()> {
        let mut stdout = BufWriter::new(anstream::stdout());

        let descriptors = self.select(catalog::enumerate());

        if root.json {
            writeln!(stdout, "{}", json!(descriptors))?;
            return Ok(stdout.flush()?);
        }

        if descriptors.is_empty() {
            writeln!(stdout, "{}", "No HID interfaces were found.".bright_black())?;
            return Ok(stdout.flush()?);
        }

        for (i, descriptor) in descriptors.iter().enumerate() {
            if i != 0 {
                writeln!(stdout)?;
            }
            write_descriptor(&mut stdout, descriptor)?;
        }

        Ok(stdout.flush()?)
    }

    fn select(&self, descriptors: Vec<DeviceDescriptor>) -> Vec<DeviceDescriptor> {
        let mut descriptors = match &self.manufacturer {
            Some(name) => catalog::filter_by_manufacturer(&descriptors, name),
            None => descriptors,
        };

        if self.vendor_only {
            descriptors.retain(DeviceDescriptor::is_vendor_defined);
        }

        catalog::sort_by_usage(&mut descriptors);
        descriptors
    }
}

fn write_descriptor(out: &mut impl Write, descriptor: &DeviceDescriptor) -> Result<()> {
    let attributes = &descriptor.attributes;
    let caps = &descriptor.capabilities;

    writeln!(
        out,
        "{}: {} {} ({:#06x}:{:#06x})",
        descriptor.path.bright_black(),
        descriptor.manufacturer_name,
        descriptor.product_name,
        attributes.vendor_id.bright_black(),
        attributes.product_id.bright_black()
    )?;
    writeln!(out, " │")?;

    let usage_page = match usage::usage_page_name(caps.usage_page) {
        Some(name) if descriptor.is_vendor_defined() => name.green().to_string(),
        Some(name) => name.to_string(),
        None => "UNKNOWN".bright_black().italic().to_string(),
    };
    let usage = usage::usage_name(caps.usage_page, caps.usage).unwrap_or("-");

    let mut properties = vec![
        format!(
            "USAGE: {:#06x} ({}), {:#06x} ({})",
            caps.usage_page.bright_blue(),
            usage_page,
            caps.usage.bright_blue(),
            usage.bright_black()
        ),
        format!(
            "INTERFACE: {}, VERSION: {}",
            descriptor.interface_number.bright_black(),
            attributes.version_number.bright_black()
        ),
    ];
    if !descriptor.serial_number.is_empty() {
        properties.push(format!(
            "SERIAL NUMBER: {}",
            descriptor.serial_number.bright_black()
        ));
    }
    properties.push(format!(
        "REPORT BYTES: input {}, output {}, feature {}",
        caps.input_report_byte_length.blue(),
        caps.output_report_byte_length.blue(),
        caps.feature_report_byte_length.blue()
    ));
    properties.push(format!(
        "LINK COLLECTION NODES: {}",
        caps.link_collection_node_count.bright_black()
    ));
    for (kind, buttons, values, indices) in [
        (
            "INPUT",
            caps.input_button_cap_count,
            caps.input_value_cap_count,
            caps.input_data_index_count,
        ),
        (
            "OUTPUT",
            caps.output_button_cap_count,
            caps.output_value_cap_count,
            caps.output_data_index_count,
        ),
        (
            "FEATURE",
            caps.feature_button_cap_count,
            caps.feature_value_cap_count,
            caps.feature_data_index_count,
        ),
    ] {
        properties.push(format!(
            "{kind} CAPS: {} button, {} value, {} data indices",
            buttons.bright_black(),
            values.bright_black(),
            indices.bright_black()
        ));
    }

    for (position, property) in properties.into_iter().with_position() {
        let branch = match position {
            Position::Last | Position::Only => "╰─",
            Position::First | Position::Middle => "├─",
        };
        writeln!(out, " {branch} {property}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(path: &str, manufacturer: &str, usage_page: u16, usage: u16) -> DeviceDescriptor {
        let mut descriptor = DeviceDescriptor {
            path: path.into(),
            manufacturer_name: manufacturer.into(),
            ..Default::default()
        };
        descriptor.capabilities.usage_page = usage_page;
        descriptor.capabilities.usage = usage;
        descriptor
    }

    #[test]
    fn selects_sorted_vendor_interfaces() {
        let cmd = ListCommand {
            manufacturer: Some("Teensyduino".into()),
            vendor_only: true,
        };
        let selected = cmd.select(vec![
            descriptor("raw", "Teensyduino", 0xffab, 0x0200),
            descriptor("kbd", "Teensyduino", 0x0001, 0x0006),
            descriptor("seremu", "Teensyduino", 0xffc9, 0x0004),
            descriptor("other", "Logitech", 0xff00, 0x0001),
        ]);

        let paths: Vec<&str> = selected.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, ["seremu", "raw"]);
    }

    #[test]
    fn tree_ends_with_a_closing_branch() -> Result<()> {
        let mut out = Vec::new();
        write_descriptor(&mut out, &descriptor("raw", "Teensyduino", 0xffab, 0x0200))?;

        let text = String::from_utf8(out)?;
        assert!(text.contains("VENDOR DEFINED"));
        assert!(!text.contains("SERIAL NUMBER"));
        assert_eq!(text.matches("╰─").count(), 1);
        assert!(text.lines().last().is_some_and(|line| line.starts_with(" ╰─")));
        Ok(())
    }
}
