//! Command implementations.

use crate::Commands;
use bytes::Bytes;
use colored::Colorize;
use oxcrops_client::SessionConfig;
use oxcrops_protocol::buffer::{self, Chunk};
use oxcrops_protocol::{
    classify, Decoder, Encoder, ErrorCode, ResponsePlan, RopId, RopRequest, INVALID_HANDLE,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Write as _;

type CommandResult = Result<String, Box<dyn std::error::Error>>;

/// Input of the `encode` command.
#[derive(Debug, Deserialize)]
struct EncodeInput {
    requests: Vec<RopRequest>,
    #[serde(default)]
    handles: Vec<u32>,
}

pub fn execute(config: &SessionConfig, cmd: Commands, raw: bool) -> CommandResult {
    match cmd {
        Commands::Catalog { reserved } => Ok(catalog(config, reserved)),

        Commands::Inspect { buffer } => {
            let chunks = buffer::parse_chunks(parse_buffer_arg(&buffer)?)?;
            if raw {
                return Ok(format_json(&chunks_json(&chunks)));
            }
            Ok(inspect(&chunks))
        }

        Commands::DecodeRequest { buffer } => {
            let decoded = Decoder::new()
                .with_raw_fallback(true)
                .decode_request(parse_buffer_arg(&buffer)?)?;
            let value = json!({
                "requests": decoded.requests,
                "handles": decoded.handles,
            });
            Ok(format_json(&value))
        }

        Commands::DecodeResponse { request, response } => {
            let decoder = Decoder::new().with_raw_fallback(true);
            let sent = decoder.decode_request(parse_buffer_arg(&request)?)?;
            let decoded = decoder.decode_responses(&sent.requests, parse_buffer_arg(&response)?)?;

            let responses: Vec<Value> = decoded
                .responses
                .iter()
                .map(|correlated| {
                    let rop = &correlated.response;
                    json!({
                        "request_index": correlated.request_index,
                        "chunk": correlated.chunk,
                        "classification": classify(rop).to_string(),
                        "return_value": ErrorCode::describe(rop.return_value()),
                        "response": rop,
                    })
                })
                .collect();
            let mut value = json!({
                "responses": responses,
                "server_responses": decoded.server_responses,
                "handle_tables": decoded.handle_tables,
            });
            if let Some(too_small) = &decoded.buffer_too_small {
                value["buffer_too_small"] = json!({
                    "size_needed": too_small.size_needed,
                    "unprocessed_bytes": too_small.request_buffers.len(),
                });
            }
            if !decoded.is_complete(&ResponsePlan::new(&sent.requests)) {
                tracing::warn!(
                    answered = decoded.responses.len(),
                    requests = sent.requests.len(),
                    "response buffer stopped early"
                );
            }
            Ok(format_json(&value))
        }

        Commands::Encode { input, xor } => {
            let input: EncodeInput = serde_json::from_value(parse_json_arg(&input)?)?;
            let encoder = Encoder::new()
                .with_reserved(config.limits.reserved_rop_ids.clone())
                .with_xor_magic(xor || config.xor_magic);
            let buf = encoder.encode(&input.requests, &input.handles)?;
            Ok(hex::encode(&buf))
        }
    }
}

fn catalog(config: &SessionConfig, only_reserved: bool) -> String {
    let reserved = &config.limits.reserved_rop_ids;
    let mut output = String::new();

    let _ = writeln!(
        output,
        "{}",
        format!("{:<6} {:<36} {}", "ID", "NAME", "PROPERTIES").bold()
    );
    for id in RopId::ALL {
        let is_reserved = reserved.contains(id.as_u8());
        if only_reserved && !is_reserved {
            continue;
        }
        let mut properties = Vec::new();
        if !id.produces_response() {
            properties.push("no-response".yellow().to_string());
        }
        if id.is_dual_handle() {
            properties.push("dual-handle".cyan().to_string());
        }
        if id.is_server_only() {
            properties.push("server-only".to_string());
        }
        if is_reserved {
            properties.push("reserved".red().to_string());
        }
        let _ = writeln!(
            output,
            "{:<6} {:<36} {}",
            format!("{:#04x}", id.as_u8()),
            id.to_string(),
            properties.join(", ")
        );
    }

    // Reserved values without an assigned RopId.
    let unassigned: Vec<String> = reserved
        .iter()
        .filter(|byte| RopId::from_u8(*byte).is_none())
        .map(|byte| format!("{:#04x}", byte))
        .collect();
    if !unassigned.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "{} {}",
            "Reserved, unassigned:".bold(),
            unassigned.join(" ")
        );
    }
    output.trim_end().to_string()
}

fn inspect(chunks: &[Chunk]) -> String {
    let mut output = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let header = &chunk.header;
        let _ = writeln!(
            output,
            "{} {}  size={} size_actual={} last={}",
            "Chunk".bold(),
            i.to_string().cyan(),
            header.size,
            header.size_actual,
            header.flags.is_last()
        );
        let _ = writeln!(output, "  ROP bytes: {}", chunk.payload.rops.len());
        if let Some(first) = chunk.payload.rops.first() {
            let name = RopId::from_u8(*first)
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unassigned".to_string());
            let _ = writeln!(
                output,
                "  Leading RopId: {} ({})",
                format!("{:#04x}", first).green(),
                name
            );
        }
        let _ = writeln!(output, "  Handles ({}):", chunk.payload.handles.len());
        for (index, handle) in chunk.payload.handles.iter().enumerate() {
            let shown = if *handle == INVALID_HANDLE {
                "invalid".dimmed().to_string()
            } else {
                format!("{:#010x}", handle)
            };
            let _ = writeln!(output, "    [{}] {}", index, shown);
        }
    }
    output.trim_end().to_string()
}

fn chunks_json(chunks: &[Chunk]) -> Value {
    Value::Array(
        chunks
            .iter()
            .map(|chunk| {
                json!({
                    "header": chunk.header,
                    "rops": hex::encode(&chunk.payload.rops),
                    "handles": chunk.payload.handles,
                })
            })
            .collect(),
    )
}

/// Parses a buffer argument: hex (whitespace ignored) or @file with raw bytes.
fn parse_buffer_arg(arg: &str) -> Result<Bytes, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        return Ok(Bytes::from(std::fs::read(path)?));
    }
    let digits: String = arg.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits.strip_prefix("0x").unwrap_or(digits.as_str());
    Ok(Bytes::from(hex::decode(digits)?))
}

/// Parses a JSON argument (either inline JSON or @file.json).
fn parse_json_arg(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(arg)?)
    }
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
