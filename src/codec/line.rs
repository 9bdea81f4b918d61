use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;

use crate::message::HeaderLine;

use super::{DecodeError, MAX_HEAD_LINE_BYTES};

/// Reads one head line into `line` with the trailing CRLF stripped, returning
/// the number of raw bytes consumed. `Ok(0)` means the stream ended cleanly at
/// a line boundary; end of stream mid-line is an error.
pub(super) async fn read_head_line<R>(reader: &mut R, line: &mut String) -> Result<usize, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let mut collected = Vec::new();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if collected.is_empty() {
                return Ok(0);
            }
            return Err(DecodeError::UnexpectedEof);
        }

        let newline = available.iter().position(|byte| *byte == b'\n');
        let consume = newline.map(|idx| idx + 1).unwrap_or(available.len());
        if collected.len() + consume > MAX_HEAD_LINE_BYTES {
            return Err(DecodeError::LineTooLong);
        }
        collected.extend_from_slice(&available[..consume]);
        reader.consume(consume);

        if newline.is_some() {
            break;
        }
    }

    let consumed = collected.len();
    let text = String::from_utf8(collected).map_err(|_| DecodeError::InvalidEncoding)?;
    line.push_str(text.trim_end_matches(['\r', '\n']));
    Ok(consumed)
}

/// Reads header lines until the blank line that terminates the block.
pub(super) async fn read_header_lines<R>(reader: &mut R) -> Result<Vec<HeaderLine>, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = Vec::new();
    let mut line = String::new();
    loop {
        let read = read_head_line(reader, &mut line).await?;
        if read == 0 {
            return Err(DecodeError::UnexpectedEof);
        }
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| DecodeError::MalformedHeader(line.clone()))?;
        headers.push(HeaderLine::new(name.trim(), value.trim()));
    }
    Ok(headers)
}
