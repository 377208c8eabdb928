//! Application-level payload encodings commonly layered on raw HID packets.
//!
//! Nothing here is enforced by the channel itself. These are conventions
//! agreed between host software and device firmware, provided so reader loops
//! don't have to re-implement them.

/// The index of the byte that signals "stop" in a numeric packet.
pub const STOP_SENTINEL_INDEX: usize = 2;

/// The value of the stop byte in a numeric packet.
pub const STOP_SENTINEL: u8 = 0xff;

/// The prefix that ends a stream of text packets.
pub const TEXT_STOP_PREFIX: &str = "STOP";

/// Decodes the big-endian 16-bit number stored in the first two bytes.
///
/// Returns [`None`] if the payload is shorter than two bytes.
pub fn decode_number(payload: &[u8]) -> Option<u16> {
    let bytes: [u8; 2] = payload.get(..2)?.try_into().ok()?;
    Some(u16::from_be_bytes(bytes))
}

/// Encodes a number into the first two bytes of a payload of length `N`.
pub fn encode_number<const N: usize>(number: u16) -> [u8; N] {
    let mut payload = [0u8; N];
    let bytes = number.to_be_bytes();
    let len = bytes.len().min(N);
    payload[..len].copy_from_slice(&bytes[..len]);
    payload
}

/// Checks whether the stop sentinel is set, regardless of all other bytes.
pub fn is_stop_sentinel(payload: &[u8]) -> bool {
    payload.get(STOP_SENTINEL_INDEX) == Some(&STOP_SENTINEL)
}

/// A decoded numeric packet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NumberMessage {
    Number(u16),
    Stop,
}

impl NumberMessage {
    /// Parses a numeric packet. The stop sentinel takes precedence over the
    /// number.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if is_stop_sentinel(payload) {
            return Some(Self::Stop);
        }

        decode_number(payload).map(Self::Number)
    }
}

/// A decoded text packet.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TextLine {
    Line(String),
    Stop,
}

impl TextLine {
    /// Parses a text packet.
    ///
    /// The text is cut at the first carriage return and trailing NUL padding
    /// is dropped. Invalid UTF-8 is replaced rather than rejected.
    pub fn parse(payload: &[u8]) -> Self {
        if payload.starts_with(TEXT_STOP_PREFIX.as_bytes()) {
            return Self::Stop;
        }

        let end = payload
            .iter()
            .position(|&b| b == b'\r')
            .unwrap_or(payload.len());
        let text = &payload[..end];
        let text = match text.iter().rposition(|&b| b != 0) {
            Some(last) => &text[..=last],
            None => &[],
        };

        Self::Line(String::from_utf8_lossy(text).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_big_endian() {
        assert_eq!(decode_number(&[0x01, 0x02, 0x00, 0x00]), Some(258));
        assert_eq!(decode_number(&[0x01]), None);
        assert_eq!(encode_number::<4>(0x0102), [0x01, 0x02, 0x00, 0x00]);
    }

    #[test]
    fn sentinel_wins_over_number() {
        assert_eq!(NumberMessage::parse(&[0x12, 0x34, 0xff]), Some(NumberMessage::Stop));
        assert_eq!(NumberMessage::parse(&[0xff, 0xff, 0xff, 0x01]), Some(NumberMessage::Stop));
        assert_eq!(
            NumberMessage::parse(&[0xff, 0x00, 0x00]),
            Some(NumberMessage::Number(0xff00))
        );
    }

    #[test]
    fn parses_text_lines() {
        let mut payload = [0u8; 16];
        payload[..7].copy_from_slice(b"hello\r\n");
        assert_eq!(TextLine::parse(&payload), TextLine::Line("hello".into()));

        payload[..4].copy_from_slice(b"STOP");
        assert_eq!(TextLine::parse(&payload), TextLine::Stop);

        assert_eq!(TextLine::parse(&[0u8; 8]), TextLine::Line(String::new()));
        assert_eq!(TextLine::parse(b"no newline"), TextLine::Line("no newline".into()));
    }
}
