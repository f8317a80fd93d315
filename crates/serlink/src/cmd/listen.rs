use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serlink_comm::Communicator;
use serlink_frame::WILDCARD_ID;

use crate::cmd::{connect_link, ListenArgs, SPIN_INTERVAL};
use crate::exit::{comm_error, CliError, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let link = connect_link(&args.link)?;
    let mut comm =
        Communicator::new(link).map_err(|err| comm_error("link setup failed", err))?;
    let id = args.id.unwrap_or(WILDCARD_ID);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        comm.spin().map_err(|err| comm_error("spin failed", err))?;

        while let Some(message) = comm.receive_matching(id) {
            print_message(&message, format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }

        thread::sleep(SPIN_INTERVAL);
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
