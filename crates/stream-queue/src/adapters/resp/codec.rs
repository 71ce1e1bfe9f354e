//! RESP2 frame encoding and incremental decoding.
//!
//! Commands go out as arrays of bulk strings. Replies are parsed from a
//! growing buffer; a partial frame leaves the buffer untouched so the caller
//! can read more bytes and try again, and the [`Decoder`] picks up its scan
//! where it stopped.

use bytes::{BufMut, Bytes, BytesMut};

use super::RespError;

/// A decoded RESP2 reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+OK`
    Simple(String),
    /// `-ERR ...`, kept as a value so the caller can classify it.
    Error(String),
    /// `:42`
    Integer(i64),
    /// `$5\r\nhello`
    Bulk(Bytes),
    /// `$-1` or `*-1`
    Nil,
    /// `*N ...`
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Short type name for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            RespValue::Simple(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::Bulk(_) => "bulk string",
            RespValue::Nil => "nil",
            RespValue::Array(_) => "array",
        }
    }

    /// Textual content of a simple or bulk string.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RespValue::Simple(s) => Some(s),
            RespValue::Bulk(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }
}

/// Append a command as a RESP array of bulk strings.
pub fn encode_command(args: &[Bytes], out: &mut BytesMut) {
    out.put_u8(b'*');
    out.put_slice(args.len().to_string().as_bytes());
    out.put_slice(b"\r\n");
    for arg in args {
        out.put_u8(b'$');
        out.put_slice(arg.len().to_string().as_bytes());
        out.put_slice(b"\r\n");
        out.put_slice(arg);
        out.put_slice(b"\r\n");
    }
}

/// Incremental reply decoder.
///
/// Finds the end of a frame before building any values, and remembers how
/// far into that frame it has already looked. A reply arriving over many
/// reads is therefore scanned once overall, and bulk strings in the decoded
/// value are slices of the received bytes rather than copies.
///
/// Between calls the buffer may only grow at the back; once a frame is
/// returned it has been split off the front.
#[derive(Debug, Default)]
pub struct Decoder {
    /// Bytes of the current frame already known to be complete elements.
    scanned: usize,
    /// Items still expected by each enclosing array, innermost last.
    open: Vec<usize>,
}

impl Decoder {
    /// Try to take one complete reply off the front of `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed; `buf` is then left
    /// untouched.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        let Some(len) = self.frame_len(buf)? else {
            return Ok(None);
        };
        self.scanned = 0;
        self.open.clear();

        let frame = buf.split_to(len).freeze();
        let (value, _) = parse(&frame, 0)?;
        Ok(Some(value))
    }

    /// Length of the first frame in `buf`, once all of it has arrived.
    fn frame_len(&mut self, buf: &[u8]) -> Result<Option<usize>, RespError> {
        loop {
            let Some(&tag) = buf.get(self.scanned) else {
                return Ok(None);
            };
            let Some((line, after_line)) = line_at(buf, self.scanned + 1) else {
                return Ok(None);
            };
            let next = match tag {
                b'+' | b'-' | b':' => after_line,
                b'$' => match bulk_len(number(line)?)? {
                    None => after_line,
                    Some(len) => {
                        let end = after_line + len + 2;
                        if buf.len() < end {
                            return Ok(None);
                        }
                        end
                    }
                },
                b'*' => match array_len(number(line)?)? {
                    Some(count) if count > 0 => {
                        self.open.push(count);
                        self.scanned = after_line;
                        continue;
                    }
                    _ => after_line,
                },
                other => return Err(unexpected_tag(other)),
            };
            self.scanned = next;

            // One element done; close every array it completes.
            loop {
                match self.open.last_mut() {
                    None => return Ok(Some(self.scanned)),
                    Some(remaining) => {
                        *remaining -= 1;
                        if *remaining > 0 {
                            break;
                        }
                        self.open.pop();
                    }
                }
            }
        }
    }
}

/// Parse one frame of a buffer known to hold it completely; returns the
/// value and the position just past it.
fn parse(frame: &Bytes, pos: usize) -> Result<(RespValue, usize), RespError> {
    let truncated = || RespError::Protocol("truncated frame".into());
    let tag = *frame.get(pos).ok_or_else(truncated)?;
    let (line, after_line) = line_at(frame, pos + 1).ok_or_else(truncated)?;

    match tag {
        b'+' => Ok((RespValue::Simple(text(line)?), after_line)),
        b'-' => Ok((RespValue::Error(text(line)?), after_line)),
        b':' => Ok((RespValue::Integer(number(line)?), after_line)),
        b'$' => {
            let Some(len) = bulk_len(number(line)?)? else {
                return Ok((RespValue::Nil, after_line));
            };
            let end = after_line + len;
            if frame.len() < end + 2 {
                return Err(truncated());
            }
            if &frame[end..end + 2] != b"\r\n" {
                return Err(RespError::Protocol("bulk string not CRLF-terminated".into()));
            }
            Ok((RespValue::Bulk(frame.slice(after_line..end)), end + 2))
        }
        b'*' => {
            let Some(count) = array_len(number(line)?)? else {
                return Ok((RespValue::Nil, after_line));
            };
            let mut items = Vec::with_capacity(count.min(1024));
            let mut cursor = after_line;
            for _ in 0..count {
                let (item, next) = parse(frame, cursor)?;
                items.push(item);
                cursor = next;
            }
            Ok((RespValue::Array(items), cursor))
        }
        other => Err(unexpected_tag(other)),
    }
}

/// `None` for the nil bulk string.
fn bulk_len(len: i64) -> Result<Option<usize>, RespError> {
    if len == -1 {
        return Ok(None);
    }
    usize::try_from(len)
        .map(Some)
        .map_err(|_| RespError::Protocol(format!("bad bulk length {len}")))
}

/// `None` for the nil array.
fn array_len(count: i64) -> Result<Option<usize>, RespError> {
    if count == -1 {
        return Ok(None);
    }
    usize::try_from(count)
        .map(Some)
        .map_err(|_| RespError::Protocol(format!("bad array length {count}")))
}

fn unexpected_tag(tag: u8) -> RespError {
    RespError::Protocol(format!("unexpected type byte 0x{tag:02x}"))
}

/// The line starting at `start` (without CRLF) and the index after its CRLF.
fn line_at(buf: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(start..)?;
    let end = rest.windows(2).position(|w| w == b"\r\n")?;
    Some((&rest[..end], start + end + 2))
}

fn text(line: &[u8]) -> Result<String, RespError> {
    String::from_utf8(line.to_vec()).map_err(|_| RespError::Protocol("non UTF-8 line".into()))
}

fn number(line: &[u8]) -> Result<i64, RespError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RespError::Protocol(format!("bad integer {:?}", String::from_utf8_lossy(line))))
}
