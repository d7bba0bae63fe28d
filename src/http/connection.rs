use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::config::ServerConfig;
use crate::http::parser::{expected_length, find_headers_end};
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::server::dispatch::Dispatcher;

const READ_CHUNK: usize = 4096;

pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: BytesMut,
    limits: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing,
    Writing(ResponseWriter),
    Closed,
}

/// How far the inbound message got before reading stopped.
#[derive(Debug, PartialEq, Eq)]
enum ReadOutcome {
    /// Head and declared body are buffered, or the peer stopped sending
    Message,
    /// Peer closed without sending anything
    Empty,
    /// A size limit was hit
    TooLarge,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        limits: ServerConfig,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            limits,
            dispatcher,
            state: ConnectionState::Reading,
        }
    }

    /// Serves exactly one request, then closes.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match &mut self.state {
                ConnectionState::Reading => {
                    self.state = match self.read_message().await? {
                        ReadOutcome::Message => ConnectionState::Processing,
                        ReadOutcome::Empty => ConnectionState::Closed,
                        ReadOutcome::TooLarge => {
                            tracing::warn!(
                                peer = %self.peer,
                                buffered = self.buffer.len(),
                                "Request exceeds size limits"
                            );
                            ConnectionState::Writing(ResponseWriter::new(&Response::bad_request()))
                        }
                    };
                }

                ConnectionState::Processing => {
                    let raw = self.buffer.split().freeze();
                    let dispatcher = self.dispatcher.clone();

                    // Parsing, session access and file reads all block.
                    let response =
                        tokio::task::spawn_blocking(move || dispatcher.handle_raw(&raw)).await?;

                    self.state = ConnectionState::Writing(ResponseWriter::new(&response));
                }

                ConnectionState::Writing(writer) => {
                    writer.write_to_stream(&mut self.stream).await?;
                    self.state = ConnectionState::Closed;
                }

                ConnectionState::Closed => break,
            }
        }

        Ok(())
    }

    /// Reads until the head and the declared body length are buffered.
    ///
    /// A peer that half-closes early still gets whatever it sent parsed.
    async fn read_message(&mut self) -> anyhow::Result<ReadOutcome> {
        loop {
            match expected_length(&self.buffer) {
                Some(total) if total > self.limits.max_request_bytes => {
                    return Ok(ReadOutcome::TooLarge);
                }
                Some(total) if self.buffer.len() >= total => return Ok(ReadOutcome::Message),
                None if self.buffer.len() > self.limits.max_header_bytes => {
                    return Ok(ReadOutcome::TooLarge);
                }
                _ => {}
            }

            self.buffer.reserve(READ_CHUNK);
            let n = self.stream.read_buf(&mut self.buffer).await?;

            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(ReadOutcome::Empty);
                }
                if find_headers_end(&self.buffer).is_some() {
                    tracing::debug!(
                        peer = %self.peer,
                        buffered = self.buffer.len(),
                        "Peer closed before the declared body arrived"
                    );
                }
                return Ok(ReadOutcome::Message);
            }
        }
    }
}
