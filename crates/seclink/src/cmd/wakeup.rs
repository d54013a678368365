use std::path::Path;

use seclink::Session;

use crate::cmd::{load_config, WakeupArgs};
use crate::exit::{seclink_error, CliResult, SUCCESS};

pub fn run(_args: WakeupArgs, config: Option<&Path>) -> CliResult<i32> {
    let config = load_config(config)?;
    let session =
        Session::open(config).map_err(|err| seclink_error("session open failed", err))?;
    let mut controller = session
        .reset_controller()
        .map_err(|err| seclink_error("wakeup setup failed", err))?;

    controller
        .wakeup()
        .map_err(|err| seclink_error("wakeup failed", err))?;

    println!("chip awake");
    Ok(SUCCESS)
}
