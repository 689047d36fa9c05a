//! Terminal channel frames
//!
//! Each frame is one newline-free JSON object holding exactly one of
//! `resize`, `input` or `output`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Terminal geometry
///
/// Serialized with the pty's own field names (`pixel_width`), which is what
/// the shell side decodes. Browser-style `pixelWidth` is accepted inbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub rows: u16,
    pub cols: u16,
    #[serde(default, alias = "pixelWidth")]
    pub pixel_width: u16,
    #[serde(default, alias = "pixelHeight")]
    pub pixel_height: u16,
}

impl TerminalSize {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self::new(24, 80)
    }
}

/// One terminal channel frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalFrame {
    /// Local geometry changed (outbound)
    Resize(TerminalSize),
    /// Keystrokes (outbound)
    Input(String),
    /// Shell output (inbound)
    Output(String),
}

/// Loose decoding shape: peers may send every field with nulls for the
/// absent ones.
#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    resize: Option<TerminalSize>,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    output: Option<String>,
}

impl TerminalFrame {
    /// Encode as UTF-8 JSON bytes
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Decode a frame holding exactly one populated field
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let raw: RawFrame = serde_json::from_slice(bytes).map_err(ProtocolError::Malformed)?;
        match (raw.resize, raw.input, raw.output) {
            (Some(size), None, None) => Ok(TerminalFrame::Resize(size)),
            (None, Some(input), None) => Ok(TerminalFrame::Input(input)),
            (None, None, Some(output)) => Ok(TerminalFrame::Output(output)),
            (None, None, None) => Err(ProtocolError::MissingField("output")),
            _ => Err(ProtocolError::InvalidField {
                field: "frame",
                value: String::from_utf8_lossy(bytes).into_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_wire_shape() {
        let frame = TerminalFrame::Resize(TerminalSize::new(40, 120));
        let bytes = frame.encode().unwrap();
        assert_eq!(
            &bytes[..],
            br#"{"resize":{"rows":40,"cols":120,"pixel_width":0,"pixel_height":0}}"#
        );
    }

    #[test]
    fn test_resize_decodes_either_casing() {
        let snake = TerminalFrame::decode(
            br#"{"resize":{"rows":30,"cols":100,"pixel_width":800,"pixel_height":600}}"#,
        )
        .unwrap();
        let camel = TerminalFrame::decode(
            br#"{"resize":{"rows":30,"cols":100,"pixelWidth":800,"pixelHeight":600}}"#,
        )
        .unwrap();
        assert_eq!(snake, camel);
        match snake {
            TerminalFrame::Resize(size) => {
                assert_eq!(size.pixel_width, 800);
                assert_eq!(size.pixel_height, 600);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_input_escapes_newlines() {
        let bytes = TerminalFrame::Input("ls -la\n".into()).encode().unwrap();
        assert!(!bytes.contains(&b'\n'));
        assert_eq!(&bytes[..], br#"{"input":"ls -la\n"}"#);
    }

    #[test]
    fn test_decode_output() {
        let frame = TerminalFrame::decode(br#"{"output":"hello"}"#).unwrap();
        assert_eq!(frame, TerminalFrame::Output("hello".into()));
    }

    #[test]
    fn test_decode_nullable_shape() {
        let frame =
            TerminalFrame::decode(br#"{"resize":null,"input":null,"output":"$ "}"#).unwrap();
        assert_eq!(frame, TerminalFrame::Output("$ ".into()));
    }

    #[test]
    fn test_decode_rejects_ambiguous_frame() {
        let err = TerminalFrame::decode(br#"{"input":"a","output":"b"}"#).unwrap_err();
        assert!(err.is_malformed());
    }
}
