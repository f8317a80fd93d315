//! Priority scheduling demo.
//!
//! Run with:
//!   cargo run --example priority-order
//!
//! Three messages are queued in submission order, then spun out. The
//! wire order and the receive order both follow priority (highest
//! first), with age breaking ties. Delivery is not FIFO.

use std::thread;
use std::time::Duration;

use serlink::comm::Communicator;
use serlink::frame::Message;
use serlink::transport::MemoryLink;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (near, far) = MemoryLink::pair();
    let mut sender = Communicator::new(near)?;
    let mut receiver = Communicator::new(far)?;

    for (id, priority) in [(0x0001, 0u8), (0x0002, 9), (0x0003, 4)] {
        let mut message = Message::new(id);
        message.set_priority(priority);
        assert!(sender.send(message, false, None));
    }

    for _ in 0..3 {
        sender.spin()?;
        receiver.spin()?;
        thread::sleep(Duration::from_millis(2));
    }

    while let Some(message) = receiver.receive() {
        eprintln!(
            "received id=0x{:04X} priority={}",
            message.id(),
            message.priority()
        );
    }

    Ok(())
}
