//! TCP front-end server.
//!
//! Clients send one JSON request per line and receive one JSON response per
//! line. Each connection runs in its own task; all of them share the arena
//! through the concurrency gate.

use std::net::SocketAddr;

use log::{debug, error, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use arena_shared::{Request, Response};

use crate::commands::handle_request;
use crate::context::ArenaContext;

/// Longest request line accepted before the connection is dropped
const MAX_LINE_LEN: usize = 4096;

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line,
    Eof,
    TooLong,
}

/// Arena front-end server
pub struct Server {
    listener: TcpListener,
    ctx: ArenaContext,
}

impl Server {
    /// Create a new server listening on the given port
    pub async fn new(port: u16, ctx: ArenaContext) -> Result<Self, std::io::Error> {
        let addr = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(&addr).await?;
        Ok(Self { listener, ctx })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accepts connections until shutdown is signalled
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Listening on {}", self.local_addr().map(|a| a.to_string()).unwrap_or_default());

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("Client connected from {}", addr);
                        let ctx = self.ctx.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, ctx, shutdown).await {
                                warn!("Connection {} closed with error: {}", addr, e);
                            }
                            debug!("Client {} disconnected", addr);
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Server stopped accepting connections");
    }
}

async fn handle_connection(
    stream: TcpStream,
    ctx: ArenaContext,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        let read = tokio::select! {
            read = read_bounded_line(&mut reader, &mut line) => read?,
            _ = shutdown.changed() => break,
        };
        match read {
            LineRead::Line => {}
            LineRead::Eof => break,
            LineRead::TooLong => {
                warn!("Dropping connection after a request longer than {} bytes", MAX_LINE_LEN);
                break;
            }
        }
        let request = line.trim();
        if request.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(request) {
            Ok(request) => handle_request(&ctx, request).await,
            Err(e) => {
                debug!("Failed to parse request: {}", e);
                Response::failure()
            }
        };
        send(&mut writer, &response).await?;
    }

    Ok(())
}

/// Reads one line into `line`, never buffering more than `MAX_LINE_LEN` bytes
/// plus the newline
async fn read_bounded_line<R: AsyncBufRead + Unpin>(reader: &mut R, line: &mut String) -> Result<LineRead, std::io::Error> {
    line.clear();
    let limit = MAX_LINE_LEN as u64 + 1;
    let read = (&mut *reader).take(limit).read_line(line).await?;
    if read == 0 {
        Ok(LineRead::Eof)
    } else if read > MAX_LINE_LEN && !line.ends_with('\n') {
        Ok(LineRead::TooLong)
    } else {
        Ok(LineRead::Line)
    }
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, response: &Response) -> Result<(), std::io::Error> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer.write_all(&payload).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use arena_shared::BattleState;

    use crate::config::ArenaConfig;
    use crate::store::Roster;

    async fn start() -> (SocketAddr, watch::Sender<bool>, ArenaContext) {
        let ctx = ArenaContext::new(ArenaConfig::default(), Box::new(Roster::demo()), None);
        let server = Server::new(0, ctx.clone()).await.unwrap();
        let port = server.local_addr().unwrap().port();
        let (tx, rx) = watch::channel(false);
        tokio::spawn(server.run(rx));
        (SocketAddr::from(([127, 0, 0, 1], port)), tx, ctx)
    }

    #[tokio::test]
    async fn test_json_lines_round_trip() {
        let (addr, shutdown, ctx) = start().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer
            .write_all(b"{\"type\":\"Enqueue\",\"user\":2,\"trainer\":21,\"weapon\":5}\nnot json\n")
            .await
            .unwrap();

        let queued: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(queued, Response::Queued);
        let failed: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(failed, Response::failure());

        assert_eq!(ctx.gate.acquire().await.status_of(21), BattleState::InQueue);
        shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn test_line_reads_are_bounded() {
        let mut input = vec![b'a'; MAX_LINE_LEN];
        input.push(b'\n');
        input.extend(std::iter::repeat(b'b').take(MAX_LINE_LEN + 10));
        let mut reader = &input[..];
        let mut line = String::new();

        assert_eq!(read_bounded_line(&mut reader, &mut line).await.unwrap(), LineRead::Line);
        assert_eq!(line.len(), MAX_LINE_LEN + 1);
        assert_eq!(read_bounded_line(&mut reader, &mut line).await.unwrap(), LineRead::TooLong);
        assert_eq!(line.len(), MAX_LINE_LEN + 1);
    }

    #[tokio::test]
    async fn test_endless_line_closes_connection() {
        let (addr, shutdown, _ctx) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&vec![b'x'; 4 * MAX_LINE_LEN]).await.unwrap();

        let mut buf = [0u8; 64];
        let read = tokio::time::timeout(std::time::Duration::from_secs(5), stream.read(&mut buf))
            .await
            .expect("server kept the connection open");
        // a reset is as good as a clean close here
        assert!(matches!(read, Ok(0) | Err(_)));
        shutdown.send(true).unwrap();
    }
}
