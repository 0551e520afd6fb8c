/// Relay of a child's combined output to the supervisor's stdout.
///
/// Lines are copied as raw bytes, so output that is not valid UTF-8 passes
/// through untouched. The pipe is read until EOF even after the sink fails,
/// which keeps the child from dying of SIGPIPE.
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Copy newline-terminated lines from `reader` to `sink` until EOF.
///
/// A final line without a newline gets one. Returns the number of lines written.
pub async fn relay<R, W>(reader: R, mut sink: W) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut count = 0;

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => return count,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "relay read failed");
                return count;
            }
        }
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }
        if let Err(e) = write_line(&mut sink, &line).await {
            tracing::debug!(error = %e, "relay write failed, discarding the rest");
            break;
        }
        count += 1;
    }

    // Keep the pipe open and empty until the child closes it
    if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
        tracing::debug!(error = %e, "relay drain failed");
    }
    count
}

async fn write_line<W: AsyncWrite + Unpin>(sink: &mut W, line: &[u8]) -> std::io::Result<()> {
    sink.write_all(line).await?;
    sink.flush().await
}
