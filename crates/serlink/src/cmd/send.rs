use std::fs;
use std::thread;
use std::time::Instant;

use serlink_comm::{Communicator, DeliveryTracker, MessageStatus};
use serlink_frame::Message;

use crate::cmd::{connect_link, parse_duration, parse_hex, SendArgs, SPIN_INTERVAL};
use crate::exit::{comm_error, frame_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_delivery, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let receipt_timeout = parse_duration(&args.receipt_timeout)?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;

    let link = connect_link(&args.link)?;
    let mut comm =
        Communicator::new(link).map_err(|err| comm_error("link setup failed", err))?;
    comm.set_receipt_timeout(receipt_timeout);
    comm.set_max_transmissions(args.max_transmissions);

    let payload = resolve_payload(&args)?;
    let mut message = Message::with_payload(args.id, payload)
        .map_err(|err| frame_error("invalid payload", err))?;
    message.set_priority(args.priority);

    let tracker = DeliveryTracker::new();
    if !comm.send(message, args.receipt, Some(tracker.clone())) {
        return Err(CliError::new(
            FAILURE,
            format!("message 0x{:04X} was not accepted for transmission", args.id),
        ));
    }

    // Step the engine until the delivery settles. Fire-and-forget settles
    // on the first spin; receipt-tracked sends keep spinning through
    // retransmissions until the tracker reports an outcome.
    let deadline = Instant::now() + wait_timeout;
    let status = loop {
        comm.spin().map_err(|err| comm_error("spin failed", err))?;
        let status = tracker.status();
        if status.is_terminal() {
            break status;
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("delivery still {status} after {wait_timeout:?}"),
            ));
        }
        thread::sleep(SPIN_INTERVAL);
    };

    print_delivery(args.id, status, format);
    Ok(match status {
        MessageStatus::NotReceived => FAILURE,
        _ => SUCCESS,
    })
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}
