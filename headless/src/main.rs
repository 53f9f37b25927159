use std::collections::HashMap;
use std::env;

use citysprint::{ConnectionEvent, Dispatch, PixelBuffer, Session, Transport};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Command;

/// Outbound frames go through a channel to the writer task, so `send_text`
/// never waits on the socket.
struct ChannelTransport {
    tx: mpsc::UnboundedSender<Message>,
}

impl Transport for ChannelTransport {
    fn send_text(&mut self, text: &str) -> citysprint::Result<()> {
        self.tx
            .send(Message::Text(text.to_string()))
            .map_err(|_| citysprint::Error::Transport("writer task is gone".into()))
    }

    fn close(&mut self) -> citysprint::Result<()> {
        self.tx
            .send(Message::Close(None))
            .map_err(|_| citysprint::Error::Transport("writer task is gone".into()))
    }
}

/// Which inputs the main loop still listens to. Losing one keeps the other
/// running; the client stops once both are gone or on `quit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Inputs {
    socket: bool,
    stdin: bool,
}

impl Inputs {
    fn new() -> Inputs {
        Inputs { socket: true, stdin: true }
    }

    fn any(&self) -> bool {
        self.socket || self.stdin
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let vars: HashMap<String, String> = env::vars().filter(|(k, _)| k.starts_with("CITYSPRINT_")).collect();
    let config = match commands::config_from_vars(&vars) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let mut surface = match PixelBuffer::new(config.surface_width, config.surface_height) {
        Ok(surface) => surface,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let endpoint = config.endpoint.clone();
    let mut session = match Session::new(config, ChannelTransport { tx }) {
        Ok(session) => session,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    session.start(&mut surface);

    info!("Connecting to {}...", endpoint);
    let ws_stream = match connect_async(endpoint.as_str()).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            session.on_connection_event(ConnectionEvent::Error(e.to_string()), &mut surface);
            std::process::exit(1);
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if let Err(e) = write.send(msg).await {
                warn!("send failed: {}", e);
                break;
            }
            if closing {
                break;
            }
        }
    });

    session.on_connection_event(ConnectionEvent::Open, &mut surface);
    commands::print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut inputs = Inputs::new();

    while inputs.any() {
        tokio::select! {
            frame = read.next(), if inputs.socket => {
                let event = match frame {
                    Some(Ok(Message::Text(text))) => ConnectionEvent::Message(text),
                    Some(Ok(Message::Close(frame))) => match frame {
                        Some(f) => ConnectionEvent::Close { code: f.code.into(), reason: f.reason.into_owned() },
                        None => ConnectionEvent::Close { code: 1005, reason: String::new() },
                    },
                    Some(Ok(other)) => {
                        debug!("ignoring {:?} frame", other);
                        continue;
                    }
                    Some(Err(e)) => ConnectionEvent::Error(e.to_string()),
                    None => ConnectionEvent::Close { code: 1006, reason: "stream ended".into() },
                };
                match session.on_connection_event(event, &mut surface) {
                    Dispatch::Tiles { applied, painted, dropped } => {
                        debug!(applied, painted, dropped, "tile batch");
                    }
                    Dispatch::Snapshot => info!("player state updated"),
                    Dispatch::Lifecycle(state) if state.is_done() => {
                        // Keep serving local commands on the last known board.
                        inputs.socket = false;
                    }
                    _ => {}
                }
            }
            line = lines.next_line(), if inputs.stdin => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // Keep mirroring the board until the socket ends.
                        inputs.stdin = false;
                        continue;
                    }
                    Err(e) => {
                        error!("stdin: {}", e);
                        inputs.stdin = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match commands::parse(&line) {
                    Ok(Command::Tool(tag)) => {
                        session.on_tool(&tag);
                    }
                    Ok(Command::Color(color)) => session.set_brush_color(color),
                    Ok(Command::Click { x, y }) => {
                        if session.on_click(x, y).is_none() {
                            println!("({}, {}) is off the board", x, y);
                        }
                    }
                    Ok(Command::Cell { column, row }) => {
                        session.on_cell_click(column, row);
                    }
                    Ok(Command::Clear) => session.clear_board(&mut surface),
                    Ok(Command::Status) => {
                        for line in session.status_lines() {
                            println!("{}", line);
                        }
                        println!("Cells: {}", session.grid().len());
                    }
                    Ok(Command::Quit) => break,
                    Err(e) => {
                        println!("{}", e);
                        commands::print_help();
                    }
                }
            }
            else => break,
        }
    }

    session.connection_mut().close();
    drop(session);
    if tokio::time::timeout(std::time::Duration::from_secs(2), &mut send_task).await.is_err() {
        send_task.abort();
    }
    info!("Client stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_stdin_keeps_the_socket_running() {
        let mut inputs = Inputs::new();
        inputs.stdin = false;
        assert!(inputs.any());
        inputs.socket = false;
        assert!(!inputs.any());
    }

    #[test]
    fn closed_socket_keeps_local_commands_running() {
        let mut inputs = Inputs::new();
        inputs.socket = false;
        assert!(inputs.any());
    }
}
