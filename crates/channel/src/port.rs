use crate::{ChannelError, Command, CommandSink, Envelope, Event};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Sending half of an open port. Commands are queued to a writer task.
#[derive(Debug, Clone)]
pub struct PortSender {
    tx: mpsc::UnboundedSender<Command>,
}

impl CommandSink for PortSender {
    fn send(&mut self, command: Command) {
        let tag = command.tag();
        if self.tx.send(command).is_err() {
            warn!(tag, "background port closed; command dropped");
        }
    }
}

/// Receiving half of an open port.
pub struct PortEvents<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> PortEvents<R> {
    /// Next event the front-end understands. Unknown tags and malformed lines
    /// are logged and skipped. `None` once the background closes the port.
    ///
    /// Cancel safe: partial lines stay buffered between calls.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(err) => {
                    warn!(error = %err, "background port read failed");
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let envelope = match Envelope::from_line(&line) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(error = %err, "discarding unreadable message from background");
                    continue;
                }
            };

            match Event::from_envelope(&envelope) {
                Ok(Some(event)) => return Some(event),
                Ok(None) => debug!(tag = %envelope.message, "ignoring unhandled message"),
                Err(err) => {
                    warn!(error = %err, tag = %envelope.message, "discarding malformed event")
                }
            }
        }
    }
}

/// Opens a named port over TCP.
pub async fn connect(
    addr: &str,
    name: &str,
) -> Result<(PortSender, PortEvents<tokio::net::tcp::OwnedReadHalf>), ChannelError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| ChannelError::Connect {
            addr: addr.to_string(),
            source,
        })?;
    stream.set_nodelay(true)?;
    let (read, write) = stream.into_split();
    let port = open(read, write, name).await?;
    debug!(addr, name, "connected to background process");
    Ok(port)
}

/// Opens a named port over any duplex byte stream: writes the handshake line,
/// then starts the writer task.
pub async fn open<R, W>(
    read: R,
    mut write: W,
    name: &str,
) -> Result<(PortSender, PortEvents<R>), ChannelError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let handshake = json!({ "name": name }).to_string();
    write.write_all(handshake.as_bytes()).await?;
    write.write_all(b"\n").await?;
    write.flush().await?;

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(write_commands(write, rx));

    Ok((
        PortSender { tx },
        PortEvents {
            lines: BufReader::new(read).lines(),
        },
    ))
}

async fn write_commands<W>(mut write: W, mut rx: mpsc::UnboundedReceiver<Command>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        let line = match command.to_envelope().to_line() {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, tag = command.tag(), "failed to encode command");
                continue;
            }
        };
        let written = async {
            write.write_all(line.as_bytes()).await?;
            write.write_all(b"\n").await?;
            write.flush().await
        }
        .await;
        if let Err(err) = written {
            warn!(error = %err, "background port write failed; closing sender");
            break;
        }
    }
    debug!("command writer stopped");
}
