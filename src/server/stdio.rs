//! Newline-delimited JSON-RPC over stdin/stdout

use super::protocol::{JsonRpcError, JsonRpcResponse};
use super::HistoryMcpServer;
use crate::error::Result;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

/// Serve on the process's stdin/stdout until stdin closes
pub async fn serve_stdio(server: HistoryMcpServer) -> Result<()> {
    info!("Serving MCP over stdio");
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    serve_lines(&server, reader, writer).await?;
    info!("stdin closed, stopping stdio transport");
    Ok(())
}

/// Read one message per line from `reader`, write one response per line.
/// A line that is not UTF-8 or not JSON gets a parse error and the loop goes on.
pub async fn serve_lines<R, W>(server: &HistoryMcpServer, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer).await? == 0 {
            break;
        }

        let parsed = std::str::from_utf8(&buffer)
            .map_err(JsonRpcError::parse_error)
            .map(str::trim);
        let response = match parsed {
            Ok("") => continue,
            Ok(line) => {
                debug!(bytes = line.len(), "stdio message received");
                match serde_json::from_str::<Value>(line) {
                    Ok(message) => server.handle_message(message).await,
                    Err(e) => Some(parse_failure(JsonRpcError::parse_error(e))),
                }
            }
            Err(error) => {
                debug!(bytes = buffer.len(), "stdio line is not valid UTF-8");
                Some(parse_failure(error))
            }
        };

        if let Some(response) = response {
            let mut encoded = serde_json::to_vec(&response)?;
            encoded.push(b'\n');
            writer.write_all(&encoded).await?;
            writer.flush().await?;
        }
    }

    Ok(())
}

fn parse_failure(error: JsonRpcError) -> Value {
    JsonRpcResponse::failure(Value::Null, error).into_value()
}
