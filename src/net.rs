//! Connection handling: the accept loop, line framing and the per-connection task.

use crate::channel::ClientId;
use crate::client::MessageQueueItem;
use crate::lines;
use crate::state::State;
use ircserv_tokens::Message;
use std::net::SocketAddr;
use std::{fmt, io, result};
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tokio::sync::mpsc;
use tokio::{net, time};

/// Maximum length of an incoming line, without its terminator.
pub const MAX_LINE_LENGTH: usize = 4096;

const READ_BUFFER_SIZE: usize = 1024;

// Timeouts, in milliseconds.
const DRAIN_TIMEOUT: u64 = 1_000;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Bind(SocketAddr, io::Error),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bind(_, err) => Some(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(addr, err) => write!(f, "failed to listen to {}: {}", addr, err),
        }
    }
}

/// Why an incoming line was rejected.  Both close the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineError {
    TooLong,
    InvalidUtf8,
}

impl std::error::Error for LineError {}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong => f.write_str(lines::LINE_TOO_LONG),
            Self::InvalidUtf8 => f.write_str(lines::INVALID_UTF8),
        }
    }
}

/// Accumulates the bytes read from a connection and splits them into lines.
///
/// Lines end with "\r\n" or a bare "\n".
///
/// # Example
///
/// ```rust
/// # use ircserv::net::LineBuffer;
/// let mut buf = LineBuffer::new();
///
/// buf.push(b"NICK alice\r\nUSER al");
/// assert_eq!(buf.next_line(), Some(Ok("NICK alice".to_owned())));
/// assert_eq!(buf.next_line(), None);
///
/// buf.push(b"ice 0 * :Alice\n");
/// assert_eq!(buf.next_line(), Some(Ok("USER alice 0 * :Alice".to_owned())));
/// ```
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,

    /// Number of bytes at the start of `buf` known not to contain "\n".
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pops the next complete line out of the buffer, without its terminator.
    ///
    /// Returns `None` when more bytes are needed.
    pub fn next_line(&mut self) -> Option<result::Result<String, LineError>> {
        let end = match self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(pos) => self.scanned + pos,
            None => {
                self.scanned = self.buf.len();
                // A trailing "\r" may be the first half of the terminator.
                let pending = match self.buf.last() {
                    Some(b'\r') => self.buf.len() - 1,
                    _ => self.buf.len(),
                };
                if MAX_LINE_LENGTH < pending {
                    return Some(Err(LineError::TooLong));
                }
                return None;
            }
        };
        self.scanned = 0;
        let mut line: Vec<u8> = self.buf.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if MAX_LINE_LENGTH < line.len() {
            return Some(Err(LineError::TooLong));
        }
        Some(String::from_utf8(line).map_err(|_| LineError::InvalidUtf8))
    }
}

/// Binds the given address, then accepts and handles incoming connections forever.
///
/// Failing to bind is the only error.
pub async fn listen(addr: SocketAddr, shared: State) -> Result<()> {
    let ln = net::TcpListener::bind(&addr)
        .await
        .map_err(|err| Error::Bind(addr, err))?;
    log::info!("Listening on {}...", addr);
    serve(ln, shared).await;
    Ok(())
}

/// Accepts and handles connections from an already bound listener.
pub async fn serve(ln: net::TcpListener, shared: State) {
    loop {
        match ln.accept().await {
            Ok((conn, peer_addr)) => {
                tokio::spawn(handle(conn, peer_addr, shared.clone()));
            }
            Err(err) => log::warn!("Failed to accept connection: {}", err),
        }
    }
}

/// Handles a connection until the client quits or the connection breaks.
async fn handle(conn: net::TcpStream, peer_addr: SocketAddr, shared: State) {
    let (mut reader, mut writer) = tokio::io::split(conn);
    let (msg_queue, mut outgoing_msgs) = mpsc::unbounded_channel();
    let id = shared.peer_joined(peer_addr, msg_queue).await;

    {
        let incoming = read_lines(&mut reader, peer_addr, id, &shared);
        let outgoing = write_queue(&mut writer, &mut outgoing_msgs);
        tokio::pin!(outgoing);

        tokio::select! {
            res = incoming => {
                if let Err(err) = res {
                    shared.peer_quit(id, Some(err)).await;
                }
                // The session is gone and its queue closed.  Let the last replies through.
                let drain = time::timeout(time::Duration::from_millis(DRAIN_TIMEOUT), &mut outgoing);
                if drain.await.is_err() {
                    log::debug!("{}: Timed out while flushing replies", id);
                }
            }
            res = &mut outgoing => {
                if let Err(err) = res {
                    shared.peer_quit(id, Some(err)).await;
                }
            }
        }
    }
    let _ = writer.shutdown().await;
}

/// Reads lines and hands them to the state.
///
/// Returns `Ok(())` after a QUIT, when the session has already been removed from the state.
async fn read_lines<R>(reader: &mut R, peer_addr: SocketAddr, id: ClientId, shared: &State) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut line_buffer = LineBuffer::new();
    let mut buf = [0; READ_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, lines::CONNECTION_RESET));
        }
        line_buffer.push(&buf[..n]);
        while let Some(line) = line_buffer.next_line() {
            let line = line.map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            log::trace!("{} >> {}", peer_addr, line);
            if let Some(msg) = Message::parse(&line) {
                if shared.handle_message(id, msg).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

/// Writes the queued messages until the queue is closed.
async fn write_queue<W>(
    writer: &mut W,
    queue: &mut mpsc::UnboundedReceiver<MessageQueueItem>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = queue.recv().await {
        writer.write_all(msg.as_ref()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_line_buffer() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.next_line(), None);

        buf.push(b"PING a\nPING b\r\n\r\nPI");
        assert_eq!(buf.next_line(), Some(Ok("PING a".to_owned())));
        assert_eq!(buf.next_line(), Some(Ok("PING b".to_owned())));
        assert_eq!(buf.next_line(), Some(Ok("".to_owned())));
        assert_eq!(buf.next_line(), None);

        buf.push(b"NG c\r");
        assert_eq!(buf.next_line(), None);
        buf.push(b"\n");
        assert_eq!(buf.next_line(), Some(Ok("PING c".to_owned())));
    }

    #[test]
    fn test_line_buffer_errors() {
        let mut buf = LineBuffer::new();
        buf.push(b"PRIVMSG bob :\xff\xfe\r\n");
        assert_eq!(buf.next_line(), Some(Err(LineError::InvalidUtf8)));

        let mut buf = LineBuffer::new();
        buf.push(&[b'a'; MAX_LINE_LENGTH]);
        buf.push(b"\r\n");
        assert_eq!(buf.next_line(), Some(Ok("a".repeat(MAX_LINE_LENGTH))));

        buf.push(&[b'a'; MAX_LINE_LENGTH]);
        buf.push(b"\r");
        assert_eq!(buf.next_line(), None);
        buf.push(b"\n");
        assert_eq!(buf.next_line(), Some(Ok("a".repeat(MAX_LINE_LENGTH))));

        buf.push(&[b'a'; MAX_LINE_LENGTH + 1]);
        assert_eq!(buf.next_line(), Some(Err(LineError::TooLong)));

        let mut buf = LineBuffer::new();
        buf.push(&[b'a'; MAX_LINE_LENGTH]);
        buf.push(b"a\r");
        assert_eq!(buf.next_line(), Some(Err(LineError::TooLong)));
    }

    #[test]
    fn test_line_buffer_split_reads() {
        let mut buf = LineBuffer::new();
        let chunks: [&[u8]; 3] = [b"JOIN", b" #te", b"st\r"];
        for chunk in chunks.iter() {
            buf.push(chunk);
            assert_eq!(buf.next_line(), None);
        }
        buf.push(b"\nPART #test");
        assert_eq!(buf.next_line(), Some(Ok("JOIN #test".to_owned())));
        assert_eq!(buf.next_line(), None);
        buf.push(b"\n");
        assert_eq!(buf.next_line(), Some(Ok("PART #test".to_owned())));
        assert_eq!(buf.next_line(), None);
    }

    #[tokio::test]
    async fn test_session_over_tcp() {
        let ln = net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = ln.local_addr().unwrap();
        tokio::spawn(serve(ln, State::new(config::State::sample())));

        let mut conn = net::TcpStream::connect(addr).await.unwrap();
        conn.write_all(b"NICK alice\r\nUSER alice 0 * :Alice\nJOIN #test\r\nQUIT :bye\r\n")
            .await
            .unwrap();
        let mut res = String::new();
        conn.read_to_string(&mut res).await.unwrap();

        assert!(res.starts_with(
            ":ircserver 001 alice :Welcome to the Internet Relay Network alice!alice@127.0.0.1\r\n"
        ));
        assert!(res.contains(":alice!alice@127.0.0.1 JOIN #test\r\n"));
        assert!(res.contains(":ircserver 353 alice = #test :@alice\r\n"));
        assert!(res.ends_with("ERROR :Closing link\r\n"));
    }

    #[tokio::test]
    async fn test_long_line_closes_connection() {
        let ln = net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = ln.local_addr().unwrap();
        let state = State::new(config::State::sample());
        tokio::spawn(serve(ln, state.clone()));

        let mut conn = net::TcpStream::connect(addr).await.unwrap();
        let mut line = vec![b'a'; MAX_LINE_LENGTH + 1];
        line.extend_from_slice(b"\r\n");
        conn.write_all(&line).await.unwrap();
        let mut res = Vec::new();
        let _ = conn.read_to_end(&mut res).await;
        assert!(res.is_empty());
    }
}
