use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serlink_comm::Communicator;
use serlink_frame::Message;
use tracing::{debug, info};

use crate::cmd::{connect_link, EchoArgs, SPIN_INTERVAL};
use crate::exit::{comm_error, frame_error, CliError, CliResult, SUCCESS};

/// Spin forever, returning every received payload to the sender under the
/// same id and priority. Receipt requests are answered by the engine
/// itself; this loop only mirrors data.
pub fn run(args: EchoArgs) -> CliResult<i32> {
    let link = connect_link(&args.link)?;
    let mut comm =
        Communicator::new(link).map_err(|err| comm_error("link setup failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(link = %args.link, "echoing messages");
    while running.load(Ordering::SeqCst) {
        comm.spin().map_err(|err| comm_error("spin failed", err))?;

        while let Some(message) = comm.receive() {
            let mut reply = Message::with_payload(message.id(), message.data().to_vec())
                .map_err(|err| frame_error("echo payload", err))?;
            reply.set_priority(message.priority());
            if !comm.send(reply, false, None) {
                debug!(id = message.id(), "transmit queue full, echo dropped");
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
