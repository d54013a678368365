use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use seclink::frame::Frame;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    instruction: u8,
    param1: u8,
    param2: u8,
    return_code: u8,
    body_len: usize,
    body_hex: &'a str,
}

pub fn print_response(frame: &Frame, format: OutputFormat) {
    let body_hex = to_hex(frame.body.as_ref());
    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                instruction: frame.instruction,
                param1: frame.param1,
                param2: frame.param2,
                return_code: frame.return_code,
                body_len: frame.body.len(),
                body_hex: &body_hex,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INS", "P1", "P2", "RC", "SIZE", "BODY"])
                .add_row(vec![
                    format!("0x{:02X}", frame.instruction),
                    format!("0x{:02X}", frame.param1),
                    format!("0x{:02X}", frame.param2),
                    format!("0x{:02X}", frame.return_code),
                    frame.body.len().to_string(),
                    body_preview(&body_hex),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "ins=0x{:02X} p1=0x{:02X} p2=0x{:02X} rc=0x{:02X} size={} body={}",
                frame.instruction,
                frame.param1,
                frame.param2,
                frame.return_code,
                frame.body.len(),
                body_preview(&body_hex)
            );
        }
        OutputFormat::Raw => {
            print_raw(frame.body.as_ref());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode an even-length hex string, with or without a 0x prefix.
pub fn from_hex(text: &str) -> Option<Vec<u8>> {
    let text = text.strip_prefix("0x").unwrap_or(text);
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}

fn body_preview(hex: &str) -> String {
    const PREVIEW: usize = 64;
    if hex.len() <= PREVIEW {
        hex.to_string()
    } else {
        format!("{}… ({} bytes)", &hex[..PREVIEW], hex.len() / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        assert_eq!(to_hex(&[0xDE, 0xAD, 0x01]), "dead01");
        assert_eq!(from_hex("dead01").unwrap(), vec![0xDE, 0xAD, 0x01]);
        assert_eq!(from_hex("0xDEAD01").unwrap(), vec![0xDE, 0xAD, 0x01]);
    }

    #[test]
    fn odd_or_invalid_hex_is_rejected() {
        assert!(from_hex("abc").is_none());
        assert!(from_hex("zz").is_none());
    }
}
