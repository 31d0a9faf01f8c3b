use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{
    handlers::{Registry, RequestErr},
    protocol::{
        command::Command,
        message::{Request, Response},
        MAX_REQUEST_LEN,
    },
};

#[derive(thiserror::Error, Debug)]
pub enum ConnectionErr {
    #[error("{0}")]
    Io(#[from] tokio::io::Error),

    #[error("no request was received within {0:?}")]
    Timeout(Duration),

    #[error("reached EOF in the middle of a request")]
    UnexpectedEof,

    #[error("the request is too long")]
    RequestIsTooLong,

    #[error("failed to decode the request: {0}")]
    Decode(String),

    #[error("failed to encode a response: {0}")]
    Encode(#[source] serde_json::Error),
}

/// A single accepted connection
///
/// a session answers exactly one request: it reads a line, dispatches it
/// and writes back the responses, then the connection is closed.
pub struct Session<S> {
    stream: BufReader<S>,
    read_timeout: Duration,
}

/// Runs a whole session over the given stream
///
/// the output side is shut down on every path before the stream is dropped.
/// a peer that disconnects without sending anything is not an error.
pub async fn run_once<S>(
    stream: S,
    registry: &Registry,
    read_timeout: Duration,
) -> Result<(), ConnectionErr>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session::new(stream, read_timeout);
    let result = session.exchange(registry).await;
    session.close().await;

    result
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, read_timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            read_timeout,
        }
    }

    async fn exchange(&mut self, registry: &Registry) -> Result<(), ConnectionErr> {
        let Some(line) = self.read_line().await? else {
            tracing::debug!("peer closed the connection before sending a request");
            return Ok(());
        };
        tracing::debug!("received: {}", line);

        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                // the client is told why, the session still ends in error
                let reason = err.to_string();
                let response: Response = RequestErr::from(err).into();
                self.send_response(&response).await?;

                return Err(ConnectionErr::Decode(reason));
            }
        };

        let command = Command::parse(&request.command);
        tracing::debug!("dispatching {:?}", command);

        for outcome in registry.dispatch(&command, request.form.as_ref()).await {
            let response = match outcome {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!("failed to handle {}: {}", command.name, err);
                    err.into()
                }
            };

            self.send_response(&response).await?;
        }

        Ok(())
    }

    /// reads a single line, excluding the line terminator
    ///
    /// returns None if the peer closed the connection before sending anything.
    async fn read_line(&mut self) -> Result<Option<String>, ConnectionErr> {
        let read_timeout = self.read_timeout;
        let mut line = String::new();

        // allow one byte over the max so an over-long line can be told apart
        let mut reader = (&mut self.stream).take(MAX_REQUEST_LEN as u64 + 1);
        let rcount = tokio::time::timeout(read_timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| ConnectionErr::Timeout(read_timeout))??;

        if rcount == 0 {
            return Ok(None);
        }

        if !line.ends_with('\n') {
            if line.len() > MAX_REQUEST_LEN {
                return Err(ConnectionErr::RequestIsTooLong);
            }

            return Err(ConnectionErr::UnexpectedEof);
        }

        let line = line.trim_end_matches(['\r', '\n']).to_string();
        Ok(Some(line))
    }

    async fn send_response(&mut self, response: &Response) -> Result<(), ConnectionErr> {
        let mut payload = serde_json::to_string(response).map_err(ConnectionErr::Encode)?;
        payload.push('\n');

        self.stream.write_all(payload.as_bytes()).await?;
        self.stream.flush().await?;
        tracing::debug!("responded: {:?}", response);

        Ok(())
    }

    async fn close(mut self) {
        if let Err(err) = self.stream.shutdown().await {
            tracing::debug!("failed to shut down the connection: {}", err);
        }
    }
}
