#![cfg(feature = "cli")]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serlink::comm::{Communicator, DeliveryTracker, MessageStatus};
use serlink::frame::Message;
use serlink::transport::StreamLink;

/// A minimal stand-in for a UART device bridge: accepts two TCP clients
/// and shuttles raw bytes between them in both directions.
fn spawn_pair_bridge(listener: TcpListener) {
    thread::spawn(move || {
        let (a, _) = listener.accept().expect("first client should connect");
        let (b, _) = listener.accept().expect("second client should connect");
        let (a_read, a_write) = (a.try_clone().expect("clone"), a);
        let (b_read, b_write) = (b.try_clone().expect("clone"), b);
        thread::spawn(move || pump(a_read, b_write));
        thread::spawn(move || pump(b_read, a_write));
    });
}

fn pump(mut from: TcpStream, mut to: TcpStream) {
    let mut buf = [0u8; 256];
    loop {
        match from.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                if to.write_all(&buf[..n]).is_err() {
                    return;
                }
            }
        }
    }
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_serlink"))
        .arg("version")
        .output()
        .expect("version command should run");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn envinfo_emits_valid_json() {
    let output = Command::new(env!("CARGO_BIN_EXE_serlink"))
        .args(["envinfo", "--format", "json"])
        .output()
        .expect("envinfo command should run");

    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("envinfo output should be json");
    assert_eq!(
        parsed.get("version").and_then(|v| v.as_str()),
        Some(env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn echo_process_answers_receipts_and_mirrors_payloads() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bridge should bind");
    let addr = listener.local_addr().expect("bridge address");
    spawn_pair_bridge(listener);

    let mut child = Command::new(env!("CARGO_BIN_EXE_serlink"))
        .args(["--log-level", "error", "echo", &format!("tcp://{addr}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("echo command should start");

    let link = StreamLink::connect_tcp(addr, &addr.to_string()).expect("client should connect");
    let mut comm = Communicator::new(link).expect("communicator should construct");

    let message = Message::with_payload(0x0021, b"ping".to_vec()).expect("payload fits");
    let tracker = DeliveryTracker::new();
    assert!(comm.send(message, true, Some(tracker.clone())));

    // The echo process acknowledges the receipt and sends the payload back.
    let deadline = Instant::now() + Duration::from_secs(10);
    let echoed = loop {
        comm.spin().expect("spin should succeed");
        if let Some(message) = comm.receive() {
            break message;
        }
        assert!(Instant::now() < deadline, "echo response timed out");
        thread::sleep(Duration::from_millis(5));
    };

    assert_eq!(tracker.status(), MessageStatus::Received);
    assert_eq!(echoed.id(), 0x0021);
    assert_eq!(echoed.data(), b"ping");

    let _ = child.kill();
    let _ = child.wait();
}
