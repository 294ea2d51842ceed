//! stdio transport: one JSON-RPC message per line on stdin, one response
//! per line on stdout. Logs never go to stdout.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::server::McpServer;

/// Serve the process's stdin/stdout until stdin closes.
pub async fn serve_stdio(server: McpServer) -> std::io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_lines(server, stdin, stdout).await
}

/// Serve any line-oriented reader/writer pair. Messages are handled one at
/// a time, in order.
pub async fn serve_lines<R, W>(server: McpServer, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    tracing::info!("stdio transport ready");

    while let Some(line) = lines.next_line().await? {
        if let Some(response) = server.handle_line(&line).await {
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    tracing::info!("stdin closed, stdio transport stopping");
    Ok(())
}
