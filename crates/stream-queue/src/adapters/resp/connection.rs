//! Buffered RESP request/reply over one TCP stream.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::codec::{self, Decoder, RespValue};
use super::RespError;

const BUF_SIZE: usize = 8 * 1024;

/// One open connection. Commands are strictly request/reply.
pub struct RespConnection {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
    decoder: Decoder,
}

impl RespConnection {
    /// Open a TCP connection to `addr` (`host:port`).
    pub async fn open(addr: &str) -> Result<Self, RespError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            read_buf: BytesMut::with_capacity(BUF_SIZE),
            write_buf: BytesMut::with_capacity(BUF_SIZE),
            decoder: Decoder::default(),
        })
    }

    /// Send one command and wait for its reply.
    ///
    /// Not cancellation safe: if this future is dropped the connection may
    /// hold a partial reply and must be discarded.
    pub async fn execute(&mut self, args: &[Bytes]) -> Result<RespValue, RespError> {
        self.write_buf.clear();
        codec::encode_command(args, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        loop {
            if let Some(value) = self.decoder.decode(&mut self.read_buf)? {
                return Ok(value);
            }
            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                return Err(RespError::Closed);
            }
        }
    }
}
