use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serlink_comm::MessageStatus;
use serlink_frame::Message;

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
struct MessageOutput<'a> {
    schema_id: &'a str,
    id: u16,
    priority: u8,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

pub fn print_message(message: &Message, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                schema_id: "https://schemas.serlink.dev/cli/v1/message-received.schema.json",
                id: message.id(),
                priority: message.priority(),
                payload_size: message.data().len(),
                payload: payload_preview(message.data()),
                timestamp: now_unix_seconds(),
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
                .set_header(vec!["ID", "PRIORITY", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    format!("0x{:04X}", message.id()),
                    message.priority().to_string(),
                    message.data().len().to_string(),
                    payload_preview(message.data()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "id=0x{:04X} priority={} size={} payload={}",
                message.id(),
                message.priority(),
                message.data().len(),
                payload_preview(message.data())
            );
        }
        OutputFormat::Raw => {
            print_raw(message.data());
        }
    }
}

#[derive(Serialize)]
struct DeliveryOutput<'a> {
    schema_id: &'a str,
    id: u16,
    status: String,
    timestamp: String,
}

pub fn print_delivery(id: u16, status: MessageStatus, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = DeliveryOutput {
                schema_id: "https://schemas.serlink.dev/cli/v1/delivery-status.schema.json",
                id,
                status: status.to_string(),
                timestamp: now_unix_seconds(),
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
                .set_header(vec!["ID", "STATUS"])
                .add_row(vec![format!("0x{id:04X}"), status.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("id=0x{id:04X} status={status}");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
