use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::client::Session;
use crate::config::ServerConfig;
use crate::protocol::responses::{self, Reply, send_reply};
use crate::protocol::{CommandContext, CommandStatus, handle_command, parse_command};
use crate::storage::Sandbox;

/// Longest accepted control line, terminator included.
pub const MAX_COMMAND_LENGTH: usize = 512;

/// One read from the control connection.
#[derive(Debug, PartialEq, Eq)]
enum ControlLine {
    Command(String),
    TooLong,
    Closed,
}

/// Reads one control line of at most [`MAX_COMMAND_LENGTH`] bytes.
///
/// Invalid UTF-8 is replaced rather than rejected, so the command still
/// reaches the dispatcher. An overlong line is drained up to its newline.
async fn read_control_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<ControlLine>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let n = (&mut *reader)
        .take(MAX_COMMAND_LENGTH as u64)
        .read_until(b'\n', buf)
        .await?;

    if n == 0 {
        return Ok(ControlLine::Closed);
    }
    if n == MAX_COMMAND_LENGTH && !buf.ends_with(b"\n") {
        loop {
            buf.clear();
            let n = (&mut *reader)
                .take(MAX_COMMAND_LENGTH as u64)
                .read_until(b'\n', buf)
                .await?;
            if n == 0 || buf.ends_with(b"\n") {
                break;
            }
        }
        return Ok(ControlLine::TooLong);
    }

    Ok(ControlLine::Command(String::from_utf8_lossy(buf).into_owned()))
}

/// Handles one FTP control connection from greeting to disconnect.
///
/// - Sends the `220` banner, then reads command lines with a `BufReader`.
/// - Dispatches each command with `handle_command`, strictly in order.
/// - Ends on QUIT, end of stream or a control-connection error. Every
///   socket the session owns, including a pending passive listener, is
///   closed when this future completes or is cancelled.
pub async fn handle_client(
    cmd_stream: TcpStream,
    client_addr: SocketAddr,
    config: Arc<ServerConfig>,
    sandbox: Arc<Sandbox>,
) {
    let local_addr = cmd_stream.local_addr().ok();
    let (read_half, mut write_half) = cmd_stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(MAX_COMMAND_LENGTH);

    let greeting = Reply::new(responses::READY, config.banner.as_str());
    if let Err(e) = send_reply(&mut write_half, &greeting).await {
        error!("Failed to greet {}: {}", client_addr, e);
        return;
    }

    let mut session = Session::new(client_addr, sandbox.root());
    let ctx = CommandContext {
        config,
        sandbox,
        local_addr,
    };

    loop {
        match read_control_line(&mut reader, &mut buf).await {
            Ok(ControlLine::Closed) => {
                info!("Connection closed by client {}", client_addr);
                break;
            }
            Ok(ControlLine::TooLong) => {
                warn!("Command too long from {}", client_addr);
                let reply = Reply::new(responses::SYNTAX_ERROR, "Command too long");
                if let Err(e) = send_reply(&mut write_half, &reply).await {
                    error!("Failed to write to {}: {}", client_addr, e);
                    break;
                }
            }
            Ok(ControlLine::Command(line)) => {
                let command = parse_command(&line);
                debug!("Received from {}: {}", client_addr, command);

                match handle_command(&mut session, command, &ctx, &mut write_half).await {
                    Ok(CommandStatus::Continue) => {}
                    Ok(CommandStatus::CloseConnection) => {
                        info!("Client {} requested to quit", client_addr);
                        let _ = write_half.shutdown().await;
                        break;
                    }
                    Err(e) => {
                        error!("Failed to write to {}: {}", client_addr, e);
                        break;
                    }
                }
            }
            Err(e) => {
                error!("Failed to read from {}: {}", client_addr, e);
                break;
            }
        }
    }

    info!("Client {} disconnected", client_addr);
}
