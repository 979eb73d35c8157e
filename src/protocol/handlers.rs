//! Command handlers module.
//!
//! Routes a parsed command to its handler, enforcing the login gate, and
//! turns handler failures into replies. Only a broken control connection
//! ends the session from here.

use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::auth;
use crate::client::Session;
use crate::config::ServerConfig;
use crate::error::{FtpError, StorageError, TransferError};
use crate::navigate;
use crate::protocol::Command;
use crate::protocol::responses::{self, CRLF, Reply, send_reply};
use crate::storage::{Sandbox, list_directory, operations};
use crate::transfer::{PassiveListener, passive_ip, receive_file, send_listing};

const FEATURES: [&str; 9] = [
    "UTF8", "SIZE", "MKD", "RMD", "DELE", "STOR", "RNFR", "RNTO", "PASV",
];

/// Outcome of a command for the session loop.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Continue,
    CloseConnection,
}

/// Read-only context shared by every command of one session.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Arc<ServerConfig>,
    pub sandbox: Arc<Sandbox>,
    /// Local address of the control connection, used for PASV
    pub local_addr: Option<SocketAddr>,
}

/// Dispatches a received FTP command to its corresponding handler and
/// writes the final reply.
///
/// Returns an error only when the control connection itself fails.
pub async fn handle_command<W>(
    session: &mut Session,
    command: Command,
    ctx: &CommandContext,
    control: &mut W,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    // A stored USER only counts for the command right after it
    let pending_user = session.take_pending_user();

    if command.requires_login() && !session.is_authenticated() {
        send_reply(control, &FtpError::NotLoggedIn.to_reply()).await?;
        return Ok(CommandStatus::Continue);
    }

    let result = match command {
        Command::QUIT => {
            send_reply(control, &Reply::new(responses::CLOSING, "Goodbye")).await?;
            return Ok(CommandStatus::CloseConnection);
        }
        Command::USER(username) => Ok(handle_cmd_user(session, username)),
        Command::PASS(password) => {
            handle_cmd_pass(session, ctx, pending_user.as_deref(), &password)
        }
        Command::PWD => Ok(handle_cmd_pwd(session, ctx)),
        Command::CWD(path) => handle_cmd_cwd(session, ctx, &path),
        Command::LIST => handle_cmd_list(session, ctx, control).await,
        Command::PASV => handle_cmd_pasv(session, ctx).await,
        Command::TYPE(_) => Ok(Reply::new(responses::OK, "Type set")),
        Command::SYST => Ok(Reply::new(responses::SYSTEM_TYPE, "UNIX Type: L8")),
        Command::NOOP => Ok(Reply::new(responses::OK, "OK")),
        Command::FEAT => Ok(feature_reply()),
        Command::OPTS(option) => handle_cmd_opts(&option),
        Command::SIZE(path) => handle_cmd_size(session, ctx, &path),
        Command::MKD(path) => handle_cmd_mkd(session, ctx, &path),
        Command::RMD(path) => handle_cmd_rmd(session, ctx, &path),
        Command::DELE(path) => handle_cmd_dele(session, ctx, &path),
        Command::STOR(path) => handle_cmd_stor(session, ctx, &path, control).await,
        Command::RNFR(path) => handle_cmd_rnfr(session, ctx, &path),
        Command::RNTO(path) => handle_cmd_rnto(session, ctx, &path),
        Command::UNKNOWN(_) => Err(FtpError::UnsupportedCommand),
    };

    let reply = match result {
        Ok(reply) => reply,
        Err(FtpError::ControlClosed(e)) => return Err(e),
        Err(e) => {
            debug!("Command failed for {}: {}", session.client_addr(), e);
            e.to_reply()
        }
    };

    send_reply(control, &reply).await?;
    Ok(CommandStatus::Continue)
}

/// Handles USER: remembers the name for the next PASS. An existing login
/// is left as it is.
fn handle_cmd_user(session: &mut Session, username: String) -> Reply {
    let reply = Reply::new(
        responses::PASSWORD_REQUIRED,
        format!("Password required for {username}"),
    );
    session.set_pending_user(username);
    reply
}

fn handle_cmd_pass(
    session: &mut Session,
    ctx: &CommandContext,
    pending_user: Option<&str>,
    password: &str,
) -> Result<Reply, FtpError> {
    match auth::validate_login(&ctx.config, pending_user, password) {
        Ok(()) => {
            session.set_authenticated(true);
            info!("Client {} logged in", session.client_addr());
            Ok(Reply::new(responses::LOGIN_SUCCESS, "User logged in"))
        }
        Err(e) => {
            warn!("Failed login from {}", session.client_addr());
            Err(e)
        }
    }
}

fn handle_cmd_pwd(session: &Session, ctx: &CommandContext) -> Reply {
    let path = navigate::working_directory(&ctx.sandbox, session.cwd());
    Reply::new(
        responses::PATH_CREATED,
        format!("\"{path}\" is current directory"),
    )
}

fn handle_cmd_cwd(
    session: &mut Session,
    ctx: &CommandContext,
    path: &str,
) -> Result<Reply, FtpError> {
    let new_cwd =
        navigate::change_directory(&ctx.sandbox, session.cwd(), path).map_err(|e| match e {
            StorageError::OutsideRoot => FtpError::AccessDenied,
            _ => FtpError::NotFound("Directory not found"),
        })?;

    session.set_cwd(new_cwd);
    Ok(Reply::new(responses::FILE_ACTION_OK, "Directory changed"))
}

/// Handles LIST: sends `150`, then the listing over the pending passive
/// connection or, without one, directly over the control connection.
async fn handle_cmd_list<W>(
    session: &mut Session,
    ctx: &CommandContext,
    control: &mut W,
) -> Result<Reply, FtpError>
where
    W: AsyncWrite + Unpin,
{
    send_reply(
        control,
        &Reply::new(
            responses::OPENING_DATA_CONNECTION,
            "Opening ASCII mode data connection for file list",
        ),
    )
    .await
    .map_err(FtpError::ControlClosed)?;

    // Consumed here so it is released on every path below
    let passive = session.take_passive();

    let lines = list_directory(session.cwd(), ctx.config.listing_timestamps).map_err(|e| {
        error!("Failed to list {}: {}", session.cwd().display(), e);
        FtpError::OperationFailed("Error listing directory")
    })?;

    match passive {
        Some(passive) => {
            let mut data_stream = passive
                .accept(ctx.config.passive_timeout())
                .await
                .map_err(|e| {
                    error!("LIST data connection failed for {}: {}", session.client_addr(), e);
                    FtpError::OperationFailed("Error listing directory")
                })?;
            send_listing(&mut data_stream, &lines).await.map_err(|e| {
                error!("LIST transfer failed for {}: {}", session.client_addr(), e);
                FtpError::OperationFailed("Error listing directory")
            })?;
        }
        None => {
            for line in &lines {
                control
                    .write_all(format!("{line}{CRLF}").as_bytes())
                    .await
                    .map_err(FtpError::ControlClosed)?;
            }
            control.flush().await.map_err(FtpError::ControlClosed)?;
        }
    }

    debug!("LIST sent {} entries to {}", lines.len(), session.client_addr());
    Ok(Reply::new(responses::TRANSFER_COMPLETE, "Transfer complete"))
}

/// Handles PASV: replaces any pending listener with a fresh ephemeral one.
async fn handle_cmd_pasv(
    session: &mut Session,
    ctx: &CommandContext,
) -> Result<Reply, FtpError> {
    session.set_passive(None);

    let ip = ctx
        .local_addr
        .ok_or(TransferError::NoIpv4Address)
        .and_then(passive_ip);

    let opened = match ip {
        Ok(ip) => PassiveListener::open(ip).await,
        Err(e) => Err(e),
    };

    match opened {
        Ok(passive) => {
            let reply = passive.reply();
            debug!("PASV for {}: {}", session.client_addr(), reply.to_string().trim_end());
            session.set_passive(Some(passive));
            Ok(reply)
        }
        Err(e) => {
            error!("Failed to enter passive mode for {}: {}", session.client_addr(), e);
            Err(FtpError::DataConnection("Can't open passive connection"))
        }
    }
}

fn feature_reply() -> Reply {
    Reply::multi(
        responses::SYSTEM_STATUS,
        "Features:",
        FEATURES.iter().map(|f| format!(" {f}")).collect(),
    )
}

fn handle_cmd_opts(option: &str) -> Result<Reply, FtpError> {
    if option.eq_ignore_ascii_case("UTF8 ON") {
        Ok(Reply::new(responses::OK, "UTF8 enabled"))
    } else {
        Err(FtpError::UnsupportedOption)
    }
}

fn handle_cmd_size(
    session: &Session,
    ctx: &CommandContext,
    path: &str,
) -> Result<Reply, FtpError> {
    let size =
        operations::file_size(&ctx.sandbox, session.cwd(), path).map_err(|e| match e {
            StorageError::OutsideRoot => FtpError::AccessDenied,
            _ => FtpError::NotFound("File not found"),
        })?;

    Ok(Reply::new(responses::FILE_STATUS, size.to_string()))
}

fn handle_cmd_mkd(
    session: &Session,
    ctx: &CommandContext,
    path: &str,
) -> Result<Reply, FtpError> {
    let created =
        operations::make_directory(&ctx.sandbox, session.cwd(), path).map_err(|e| match e {
            StorageError::OutsideRoot => FtpError::AccessDenied,
            StorageError::AlreadyExists => FtpError::AlreadyExists("Directory already exists"),
            _ => FtpError::OperationFailed("Create directory operation failed"),
        })?;

    let virtual_path = ctx.sandbox.virtual_path(&created);
    Ok(Reply::new(
        responses::PATH_CREATED,
        format!("\"{virtual_path}\" directory created"),
    ))
}

fn handle_cmd_rmd(
    session: &Session,
    ctx: &CommandContext,
    path: &str,
) -> Result<Reply, FtpError> {
    operations::remove_directory(&ctx.sandbox, session.cwd(), path).map_err(|e| match e {
        StorageError::OutsideRoot => FtpError::AccessDenied,
        StorageError::NotFound => FtpError::NotFound("Directory not found"),
        StorageError::NotADirectory => FtpError::InvalidTarget("Not a directory"),
        StorageError::NotEmpty => FtpError::InvalidTarget("Directory not empty"),
        _ => FtpError::OperationFailed("Remove directory operation failed"),
    })?;

    Ok(Reply::new(responses::FILE_ACTION_OK, "Directory removed"))
}

fn handle_cmd_dele(
    session: &Session,
    ctx: &CommandContext,
    path: &str,
) -> Result<Reply, FtpError> {
    operations::delete_file(&ctx.sandbox, session.cwd(), path).map_err(|e| match e {
        StorageError::OutsideRoot => FtpError::AccessDenied,
        StorageError::NotFound => FtpError::NotFound("File not found"),
        StorageError::IsADirectory => {
            FtpError::InvalidTarget("Cannot delete directory with DELE, use RMD")
        }
        _ => FtpError::OperationFailed("Delete operation failed"),
    })?;

    Ok(Reply::new(responses::FILE_ACTION_OK, "File deleted"))
}

/// Handles STOR: streams one passive data connection into the target file.
async fn handle_cmd_stor<W>(
    session: &mut Session,
    ctx: &CommandContext,
    path: &str,
    control: &mut W,
) -> Result<Reply, FtpError>
where
    W: AsyncWrite + Unpin,
{
    let target =
        operations::prepare_upload(&ctx.sandbox, session.cwd(), path).map_err(|e| match e {
            StorageError::OutsideRoot => FtpError::AccessDenied,
            _ => FtpError::OperationFailed("Store operation failed"),
        })?;

    send_reply(
        control,
        &Reply::new(
            responses::OPENING_DATA_CONNECTION,
            format!("Opening BINARY mode data connection for {path}"),
        ),
    )
    .await
    .map_err(FtpError::ControlClosed)?;

    let passive = session
        .take_passive()
        .ok_or(FtpError::DataConnection("Use PASV first"))?;

    let mut data_stream = passive
        .accept(ctx.config.passive_timeout())
        .await
        .map_err(|e| {
            error!("STOR data connection failed for {}: {}", session.client_addr(), e);
            FtpError::Transfer("Transfer failed")
        })?;

    receive_file(&mut data_stream, &target, ctx.config.transfer_buffer_size)
        .await
        .map_err(|_| FtpError::Transfer("Transfer failed"))?;

    Ok(Reply::new(responses::TRANSFER_COMPLETE, "Transfer complete"))
}

fn handle_cmd_rnfr(
    session: &mut Session,
    ctx: &CommandContext,
    path: &str,
) -> Result<Reply, FtpError> {
    match operations::rename_source(&ctx.sandbox, session.cwd(), path) {
        Ok(source) => {
            debug!("RNFR: {} marked for rename", source.display());
            session.set_pending_rename(Some(source));
            Ok(Reply::new(responses::PENDING_FURTHER_INFO, "Ready for RNTO"))
        }
        Err(StorageError::OutsideRoot) => Err(FtpError::AccessDenied),
        Err(StorageError::NotFound) => {
            session.set_pending_rename(None);
            Err(FtpError::NotFound("File not found"))
        }
        Err(e) => {
            error!("RNFR failed: {}", e);
            session.set_pending_rename(None);
            Err(FtpError::OperationFailed("RNFR operation failed"))
        }
    }
}

/// Handles RNTO. The pending source is consumed whatever the outcome.
fn handle_cmd_rnto(
    session: &mut Session,
    ctx: &CommandContext,
    path: &str,
) -> Result<Reply, FtpError> {
    let source = session.take_pending_rename().ok_or(FtpError::BadSequence)?;

    operations::rename(&ctx.sandbox, session.cwd(), &source, path).map_err(|e| match e {
        StorageError::OutsideRoot => FtpError::AccessDenied,
        StorageError::AlreadyExists => FtpError::AlreadyExists("Target file already exists"),
        _ => FtpError::OperationFailed("Rename operation failed"),
    })?;

    Ok(Reply::new(responses::FILE_ACTION_OK, "File renamed successfully"))
}
