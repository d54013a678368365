use std::path::Path;

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use crate::cmd::{load_config, InfoArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;
use seclink::SessionConfig;
use seclink::transport::DeviceKind;

#[derive(Serialize)]
struct InfoOutput {
    device: String,
    endpoint: String,
    channels: usize,
    ready_pin: u32,
    reset_pin: u32,
    wakeup_pin: u32,
    ready_mode: String,
    lock_timeout_ms: u64,
    response_timeout_ms: u64,
    auto_verify: bool,
}

pub fn run(_args: InfoArgs, config: Option<&Path>, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(config)?;
    let out = resolve(&config);

    match format {
        OutputFormat::Json => {
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
                .set_header(vec!["FIELD", "VALUE"]);
            table.add_row(vec!["device", &out.device]);
            table.add_row(vec!["endpoint", &out.endpoint]);
            table.add_row(vec!["channels", &out.channels.to_string()]);
            table.add_row(vec!["ready pin", &out.ready_pin.to_string()]);
            table.add_row(vec!["reset pin", &out.reset_pin.to_string()]);
            table.add_row(vec!["wakeup pin", &out.wakeup_pin.to_string()]);
            table.add_row(vec!["ready mode", &out.ready_mode]);
            table.add_row(vec!["lock timeout (ms)", &out.lock_timeout_ms.to_string()]);
            table.add_row(vec![
                "response timeout (ms)",
                &out.response_timeout_ms.to_string(),
            ]);
            table.add_row(vec!["auto verify", &out.auto_verify.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("device:   {}", out.device);
            println!("endpoint: {}", out.endpoint);
            println!("channels: {}", out.channels);
            println!(
                "pins:     ready={} reset={} wakeup={} ({})",
                out.ready_pin, out.reset_pin, out.wakeup_pin, out.ready_mode
            );
            println!(
                "timeouts: lock={}ms response={}ms",
                out.lock_timeout_ms, out.response_timeout_ms
            );
            println!("verify:   {}", out.auto_verify);
        }
    }
    Ok(SUCCESS)
}

fn resolve(config: &SessionConfig) -> InfoOutput {
    let endpoint = match config.device {
        DeviceKind::Spi => config
            .spi_devices
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
        DeviceKind::I2c => config.i2c_device.display().to_string(),
        DeviceKind::Sdio => config.sdio_device.display().to_string(),
        DeviceKind::Socket => config.proxy_addr.clone(),
    };
    let channels = match config.device {
        DeviceKind::Spi => config.spi_devices.len(),
        _ => 1,
    };
    InfoOutput {
        device: format!("{:?}", config.device).to_lowercase(),
        endpoint,
        channels,
        ready_pin: config.ready_pin,
        reset_pin: config.reset_pin,
        wakeup_pin: config.wakeup_pin,
        ready_mode: format!("{:?}", config.ready_mode).to_lowercase(),
        lock_timeout_ms: config.lock_timeout_ms,
        response_timeout_ms: config.response_timeout_ms,
        auto_verify: config.auto_verify.is_some(),
    }
}
