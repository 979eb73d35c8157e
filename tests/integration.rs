use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mq_ftp_server::{Server, ServerConfig, ServerError};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

const TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
    server: Server,
    addr: SocketAddr,
    dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::new(0, "admin", "password", dir.path());
        config.bind_address = "127.0.0.1".into();
        config.passive_timeout_secs = 5;

        let server = Server::with_config(config);
        server.start().await.unwrap();
        let addr = server.local_addr().await.unwrap();
        Self { server, addr, dir }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    async fn connect(&self) -> FtpClient {
        FtpClient::connect(self.addr).await
    }
}

struct FtpClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl FtpClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read_half),
            writer,
        };
        assert_eq!(client.read_line().await, "220 Simple FTP Server Ready");
        client
    }

    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        assert!(line.ends_with("\r\n"), "reply not CRLF terminated: {line:?}");
        line.trim_end_matches("\r\n").to_string()
    }

    async fn send(&mut self, command: &str) {
        self.writer
            .write_all(format!("{command}\r\n").as_bytes())
            .await
            .unwrap();
    }

    async fn command(&mut self, command: &str) -> String {
        self.send(command).await;
        self.read_line().await
    }

    async fn login(&mut self) {
        assert_eq!(self.command("USER admin").await, "331 Password required for admin");
        assert_eq!(self.command("PASS password").await, "230 User logged in");
    }

    /// Sends PASV and returns the advertised data address.
    async fn pasv(&mut self) -> SocketAddr {
        let reply = self.command("PASV").await;
        let inner = reply
            .strip_prefix("227 Entering Passive Mode (")
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or_else(|| panic!("unexpected PASV reply: {reply}"));
        let n: Vec<u16> = inner.split(',').map(|v| v.parse().unwrap()).collect();
        assert_eq!(n.len(), 6);

        let ip = format!("{}.{}.{}.{}", n[0], n[1], n[2], n[3]);
        format!("{}:{}", ip, n[4] * 256 + n[5]).parse().unwrap()
    }

    async fn list(&mut self) -> String {
        let data_addr = self.pasv().await;
        assert_eq!(
            self.command("LIST").await,
            "150 Opening ASCII mode data connection for file list"
        );

        let mut data = TcpStream::connect(data_addr).await.unwrap();
        let mut listing = String::new();
        data.read_to_string(&mut listing).await.unwrap();

        assert_eq!(self.read_line().await, "226 Transfer complete");
        listing
    }

    async fn stor(&mut self, name: &str, payload: &[u8]) -> String {
        let data_addr = self.pasv().await;
        assert_eq!(
            self.command(&format!("STOR {name}")).await,
            format!("150 Opening BINARY mode data connection for {name}")
        );

        let mut data = TcpStream::connect(data_addr).await.unwrap();
        data.write_all(payload).await.unwrap();
        data.shutdown().await.unwrap();
        drop(data);

        self.read_line().await
    }
}

fn entries(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn login_and_navigate() {
    let ts = TestServer::start().await;
    let mut client = ts.connect().await;

    client.login().await;
    assert_eq!(client.command("PWD").await, "257 \"/\" is current directory");
    assert_eq!(client.command("MKD sub").await, "257 \"/sub\" directory created");
    assert_eq!(client.command("CWD sub").await, "250 Directory changed");
    assert_eq!(client.command("PWD").await, "257 \"/sub\" is current directory");
    assert_eq!(client.command("CWD ..").await, "250 Directory changed");
    assert_eq!(client.command("PWD").await, "257 \"/\" is current directory");
    assert_eq!(client.command("QUIT").await, "221 Goodbye");

    ts.server.stop().await;
}

#[tokio::test]
async fn commands_before_login_are_refused() {
    let ts = TestServer::start().await;
    let mut client = ts.connect().await;

    assert_eq!(client.command("PWD").await, "530 Not logged in");
    assert_eq!(client.command("MKD sub").await, "530 Not logged in");
    assert_eq!(client.command("PASV").await, "530 Not logged in");
    assert!(entries(&ts.root()).is_empty());

    // PASS only counts right after USER
    assert_eq!(client.command("USER admin").await, "331 Password required for admin");
    assert_eq!(client.command("NOOP").await, "200 OK");
    assert_eq!(client.command("PASS password").await, "530 Login incorrect");
    assert_eq!(client.command("PWD").await, "530 Not logged in");

    assert_eq!(client.command("USER admin").await, "331 Password required for admin");
    assert_eq!(client.command("PASS nope").await, "530 Login incorrect");

    client.login().await;
    assert_eq!(client.command("PWD").await, "257 \"/\" is current directory");

    ts.server.stop().await;
}

#[tokio::test]
async fn sandbox_escapes_are_denied() {
    let ts = TestServer::start().await;
    let outside = ts.root().parent().unwrap().to_path_buf();
    let mut client = ts.connect().await;
    client.login().await;

    assert_eq!(client.command("CWD ..").await, "550 Access denied");
    assert_eq!(client.command("CWD ../../..").await, "550 Access denied");
    assert_eq!(client.command("MKD ../escaped").await, "550 Access denied");
    assert_eq!(client.command("RNFR ../../etc/passwd").await, "550 Access denied");
    assert_eq!(client.command("STOR ../escaped.bin").await, "550 Access denied");
    assert_eq!(client.command("PWD").await, "257 \"/\" is current directory");

    assert!(!outside.join("escaped").exists());
    assert!(!outside.join("escaped.bin").exists());

    ts.server.stop().await;
}

#[tokio::test]
async fn stor_writes_exact_bytes() {
    let ts = TestServer::start().await;
    let mut client = ts.connect().await;
    client.login().await;

    let payload: Vec<u8> = (0..100_000u32).map(|i| (i * 7 % 256) as u8).collect();
    assert_eq!(client.stor("data.bin", &payload).await, "226 Transfer complete");
    assert_eq!(fs::read(ts.root().join("data.bin")).unwrap(), payload);
    assert_eq!(client.command("SIZE data.bin").await, "213 100000");

    // Overwrite with an empty upload
    assert_eq!(client.stor("data.bin", b"").await, "226 Transfer complete");
    assert_eq!(fs::read(ts.root().join("data.bin")).unwrap(), b"");

    ts.server.stop().await;
}

#[tokio::test]
async fn stor_without_pasv_reports_425() {
    let ts = TestServer::start().await;
    let mut client = ts.connect().await;
    client.login().await;

    assert_eq!(
        client.command("STOR file.txt").await,
        "150 Opening BINARY mode data connection for file.txt"
    );
    assert_eq!(client.read_line().await, "425 Use PASV first");
    assert!(!ts.root().join("file.txt").exists());

    ts.server.stop().await;
}

#[tokio::test]
async fn list_over_passive_connection() {
    let ts = TestServer::start().await;
    let mut client = ts.connect().await;
    client.login().await;

    assert_eq!(client.list().await, "");

    fs::write(ts.root().join("b.txt"), b"hello").unwrap();
    fs::create_dir(ts.root().join("Zeta")).unwrap();
    fs::write(ts.root().join("A.txt"), b"").unwrap();

    let listing = client.list().await;
    assert_eq!(
        listing,
        "drwxr-xr-x 1 owner group 4096 Jan 01 12:00 Zeta\r\n\
         -rw-r--r-- 1 owner group        0 Jan 01 12:00 A.txt\r\n\
         -rw-r--r-- 1 owner group        5 Jan 01 12:00 b.txt\r\n"
    );

    ts.server.stop().await;
}

#[tokio::test]
async fn passive_listener_serves_one_transfer() {
    let ts = TestServer::start().await;
    let mut client = ts.connect().await;
    client.login().await;

    let data_addr = client.pasv().await;
    assert_eq!(data_addr.ip(), ts.addr.ip());

    assert_eq!(
        client.command("LIST").await,
        "150 Opening ASCII mode data connection for file list"
    );
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    let mut listing = Vec::new();
    data.read_to_end(&mut listing).await.unwrap();
    assert_eq!(client.read_line().await, "226 Transfer complete");

    assert!(TcpStream::connect(data_addr).await.is_err());

    ts.server.stop().await;
}

#[tokio::test]
async fn rename_requires_rnfr() {
    let ts = TestServer::start().await;
    fs::write(ts.root().join("old.txt"), b"content").unwrap();
    let mut client = ts.connect().await;
    client.login().await;

    assert_eq!(
        client.command("RNTO new.txt").await,
        "503 Bad sequence of commands (use RNFR first)"
    );
    assert_eq!(client.command("RNFR old.txt").await, "350 Ready for RNTO");
    assert_eq!(client.command("RNTO nested/new.txt").await, "250 File renamed successfully");

    assert!(!ts.root().join("old.txt").exists());
    assert_eq!(fs::read(ts.root().join("nested/new.txt")).unwrap(), b"content");

    assert_eq!(
        client.command("RNTO again.txt").await,
        "503 Bad sequence of commands (use RNFR first)"
    );

    ts.server.stop().await;
}

#[tokio::test]
async fn file_and_directory_management() {
    let ts = TestServer::start().await;
    let mut client = ts.connect().await;
    client.login().await;

    assert_eq!(client.command("XMKD docs").await, "257 \"/docs\" directory created");
    assert_eq!(client.command("MKD docs").await, "550 Directory already exists");
    assert_eq!(client.stor("docs/readme.txt", b"hi").await, "226 Transfer complete");

    assert_eq!(client.command("RMD docs").await, "550 Directory not empty");
    assert_eq!(client.command("DELE docs/readme.txt").await, "250 File deleted");
    assert_eq!(client.command("DELE docs/readme.txt").await, "550 File not found");
    assert_eq!(client.command("XRMD docs").await, "250 Directory removed");
    assert!(entries(&ts.root()).is_empty());

    ts.server.stop().await;
}

#[tokio::test]
async fn informational_commands() {
    let ts = TestServer::start().await;
    let mut client = ts.connect().await;

    assert_eq!(client.command("SYST").await, "215 UNIX Type: L8");
    assert_eq!(client.command("OPTS UTF8 ON").await, "200 UTF8 enabled");
    assert_eq!(client.command("OPTS MODE Z").await, "501 Option not supported");
    assert_eq!(client.command("RETR file").await, "502 Command not implemented");
    assert_eq!(client.command("PORT 127,0,0,1,4,1").await, "502 Command not implemented");

    client.send("FEAT").await;
    let mut lines = vec![client.read_line().await];
    while lines.last().map(String::as_str) != Some("211 End") {
        lines.push(client.read_line().await);
    }
    assert_eq!(lines.first().map(String::as_str), Some("211-Features:"));
    assert!(lines.contains(&" PASV".to_string()));
    assert!(lines.contains(&" UTF8".to_string()));

    client.login().await;
    assert_eq!(client.command("TYPE I").await, "200 Type set");

    ts.server.stop().await;
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let blocker = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = blocker.local_addr().unwrap().port();
    let dir = tempfile::tempdir().unwrap();

    let mut config = ServerConfig::new(port, "admin", "password", dir.path());
    config.bind_address = "127.0.0.1".into();
    let server = Server::with_config(config);

    let result = server.start().await;
    assert!(matches!(result, Err(ServerError::Bind { .. })));
    assert!(!server.is_running());
    server.stop().await;
}

#[tokio::test]
async fn sessions_are_tracked_and_cancelled_on_stop() {
    let ts = TestServer::start().await;

    let mut first = ts.connect().await;
    let mut second = ts.connect().await;
    first.login().await;
    assert_eq!(ts.server.session_count().await, 2);

    assert_eq!(second.command("QUIT").await, "221 Goodbye");
    for _ in 0..100 {
        if ts.server.session_count().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(ts.server.session_count().await, 1);

    ts.server.stop().await;
    ts.server.stop().await;
    assert!(!ts.server.is_running());
    assert_eq!(ts.server.session_count().await, 0);

    let mut buf = String::new();
    let closed = tokio::time::timeout(TIMEOUT, first.reader.read_line(&mut buf))
        .await
        .expect("session was not closed");
    assert!(matches!(closed, Ok(0) | Err(_)));

    assert!(TcpStream::connect(ts.addr).await.is_err());
}

#[tokio::test]
async fn stop_during_upload_removes_partial_file() {
    let ts = TestServer::start().await;
    let mut client = ts.connect().await;
    client.login().await;

    let data_addr = client.pasv().await;
    assert_eq!(
        client.command("STOR up.bin").await,
        "150 Opening BINARY mode data connection for up.bin"
    );
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    data.write_all(&[7u8; 10_000]).await.unwrap();

    let target = ts.root().join("up.bin");
    for _ in 0..200 {
        if target.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(target.exists());

    // Data connection still open, so the upload is in progress
    ts.server.stop().await;

    assert!(!target.exists());
    drop(data);
}

#[tokio::test]
async fn invalid_utf8_does_not_end_session() {
    let ts = TestServer::start().await;
    let mut client = ts.connect().await;
    client.login().await;

    client.writer.write_all(b"SIZE caf\xe9.txt\r\n").await.unwrap();
    assert_eq!(client.read_line().await, "550 File not found");
    assert_eq!(client.command("NOOP").await, "200 OK");

    client.writer.write_all(b"\xff\xfe\r\n").await.unwrap();
    assert_eq!(client.read_line().await, "502 Command not implemented");

    ts.server.stop().await;
}

#[tokio::test]
async fn overlong_command_is_rejected() {
    let ts = TestServer::start().await;
    let mut client = ts.connect().await;
    client.login().await;

    let long_name = "x".repeat(2000);
    assert_eq!(client.command(&format!("MKD {long_name}")).await, "500 Command too long");
    assert!(entries(&ts.root()).is_empty());
    assert_eq!(client.command("PWD").await, "257 \"/\" is current directory");

    ts.server.stop().await;
}

#[cfg(unix)]
#[tokio::test]
async fn delete_and_rename_act_on_symlinks() {
    let ts = TestServer::start().await;
    fs::write(ts.root().join("real.txt"), b"keep").unwrap();
    std::os::unix::fs::symlink(ts.root().join("real.txt"), ts.root().join("link")).unwrap();
    std::os::unix::fs::symlink(ts.root().join("real.txt"), ts.root().join("alias")).unwrap();
    let mut client = ts.connect().await;
    client.login().await;

    assert_eq!(client.command("DELE link").await, "250 File deleted");
    assert!(fs::symlink_metadata(ts.root().join("link")).is_err());
    assert_eq!(fs::read(ts.root().join("real.txt")).unwrap(), b"keep");

    assert_eq!(client.command("RNFR alias").await, "350 Ready for RNTO");
    assert_eq!(client.command("RNTO renamed").await, "250 File renamed successfully");
    assert!(fs::symlink_metadata(ts.root().join("renamed")).unwrap().file_type().is_symlink());
    assert!(ts.root().join("real.txt").is_file());

    ts.server.stop().await;
}
