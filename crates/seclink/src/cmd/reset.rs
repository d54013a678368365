use std::path::Path;

use seclink::Session;

use crate::cmd::{load_config, ResetArgs};
use crate::exit::{seclink_error, CliResult, SUCCESS};

pub fn run(args: ResetArgs, config: Option<&Path>) -> CliResult<i32> {
    let config = load_config(config)?;
    let mut session =
        Session::open(config).map_err(|err| seclink_error("session open failed", err))?;
    let mut controller = session
        .reset_controller()
        .map_err(|err| seclink_error("reset setup failed", err))?;

    let bus = args.bus;
    let mode = args.mode.to_mode();
    let pin = args.pin.as_deref();
    let channel = session
        .channel_mut(bus)
        .map_err(|err| seclink_error("reset failed", err))?;
    controller
        .reset(channel, mode, pin)
        .map_err(|err| seclink_error("reset failed", err))?;

    println!("chip reset complete");
    Ok(SUCCESS)
}
