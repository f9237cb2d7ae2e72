//! Suspension-based read/send helpers over a staging buffer.
//!
//! # Responsibilities
//! - Expose "read at least N bytes" and "send exactly N bytes" as single
//!   logical operations over any async socket
//! - Convert peer EOF and partial transfers into values; no fault escapes
//!   past this boundary as anything but a `Result`
//!
//! Each helper issues one socket operation at a time and confirms it
//! before issuing the next, so the protocol engine reads like sequential
//! blocking code.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::buffer::{BufferError, StagingBuffer};

fn cursor_fault(err: BufferError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, err)
}

/// Read from `stream` into `buf` until at least `min` staged bytes are
/// available. Returns `Ok(false)` if the peer closed before `min` was
/// satisfied.
pub async fn read_at_least<R>(
    stream: &mut R,
    buf: &mut StagingBuffer,
    min: usize,
) -> io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    while buf.len() < min {
        let room = buf.available();
        if room == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "staging buffer full before the read minimum was met",
            ));
        }
        let view = buf.require_write(room, false, false).map_err(cursor_fault)?;
        let n = stream.read(view).await?;
        buf.confirm_write(n).map_err(cursor_fault)?;
        if n == 0 {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Send exactly `count` staged bytes from `buf` to `stream`, re-issuing
/// for the remainder whenever the socket accepts fewer bytes.
pub async fn send_all<W>(stream: &mut W, buf: &mut StagingBuffer, count: usize) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut remaining = count;
    while remaining > 0 {
        let view = buf.require_read(remaining).map_err(cursor_fault)?;
        let n = stream.write(view).await?;
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        buf.confirm_read(n).map_err(cursor_fault)?;
        remaining -= n;
    }
    Ok(())
}

/// One relay direction: wait for any bytes from `reader`, forward all of
/// them to `writer`, repeat. Returns `Ok(())` on clean EOF from `reader`.
pub async fn pump<R, W>(reader: &mut R, writer: &mut W, buf: &mut StagingBuffer) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        if !read_at_least(reader, buf, 1).await? {
            return Ok(());
        }
        let staged = buf.len();
        send_all(writer, buf, staged).await?;
    }
}
