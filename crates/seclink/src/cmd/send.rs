use std::fs;
use std::path::Path;

use seclink::{Command, Session};

use crate::cmd::{load_config, parse_byte, parse_duration, SendArgs};
use crate::exit::{seclink_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{from_hex, print_response, OutputFormat};

pub fn run(args: SendArgs, config: Option<&Path>, format: OutputFormat) -> CliResult<i32> {
    let instruction = parse_byte("ins", &args.ins)?;
    let param1 = parse_byte("p1", &args.p1)?;
    let param2 = parse_byte("p2", &args.p2)?;
    let timeout = parse_duration(&args.timeout)?;
    let body = resolve_body(&args)?;

    let mut config = load_config(config)?;
    config.response_timeout_ms = timeout.as_millis() as u64;

    let mut session =
        Session::open(config).map_err(|err| seclink_error("session open failed", err))?;
    let command = Command::new(instruction, param1, param2, body);
    let frame = session
        .send_recv(args.bus, &command)
        .map_err(|err| seclink_error("send failed", err))?;

    print_response(&frame, format);
    if frame.return_code != 0 {
        return Ok(crate::exit::FAILURE);
    }
    Ok(SUCCESS)
}

fn resolve_body(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return from_hex(hex)
            .ok_or_else(|| CliError::new(USAGE, format!("--hex is not valid hex: {hex}")));
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}
