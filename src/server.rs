//! Line-delimited JSON dispatch loop
//!
//! Reads one request per line, dispatches each on its own task, and writes
//! one response per line as operations complete. Responses carry the
//! request's `id` so callers can match them up.

use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::app::{App, Operation, ToolOutput};

/// An incoming request line
#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Value>,
    #[serde(flatten)]
    operation: Operation,
}

/// An outgoing response line
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub output: ToolOutput,
}

/// Serves requests from `input` until EOF or `shutdown` fires
///
/// Requests still in flight when input ends are allowed to finish; on
/// shutdown they are cancelled and answer with a cancellation error.
pub async fn serve<R, W>(
    app: Arc<App>,
    input: R,
    output: W,
    shutdown: CancellationToken,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Response>(32);

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(response) = rx.recv().await {
            let mut line = serde_json::to_string(&response)?;
            line.push('\n');
            output.write_all(line.as_bytes()).await?;
            output.flush().await?;
        }
        Ok::<_, io::Error>(())
    });

    let mut lines = input.lines();
    let mut tasks = JoinSet::new();

    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                log::info!("Shutdown requested, stopping request loop");
                break;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let app = Arc::clone(&app);
        let tx = tx.clone();
        let cancel = shutdown.child_token();
        tasks.spawn(async move {
            let response = handle_line(&app, &line, &cancel).await;
            let _ = tx.send(response).await;
        });
    }

    while tasks.join_next().await.is_some() {}
    drop(tx);

    writer.await.map_err(io::Error::other)?
}

async fn handle_line(app: &App, line: &str, cancel: &CancellationToken) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => Response {
            id: request.id,
            output: app.dispatch(request.operation, cancel).await,
        },
        Err(e) => {
            log::warn!("Rejected malformed request: {e}");
            Response {
                // Best effort: echo the id if the line is at least JSON
                id: serde_json::from_str::<Value>(line)
                    .ok()
                    .and_then(|v| v.get("id").cloned()),
                output: ToolOutput {
                    is_error: true,
                    text: format!("Invalid request: {e}"),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn offline_app() -> Arc<App> {
        let config = Config {
            wiki_base_url: "http://127.0.0.1:9".to_string(),
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        Arc::new(App::new(config).unwrap())
    }

    async fn run(input: &str) -> Vec<Response> {
        let (client, server_side) = tokio::io::duplex(64 * 1024);
        serve(offline_app(), input.as_bytes(), server_side, CancellationToken::new())
            .await
            .unwrap();

        let mut reader = tokio::io::BufReader::new(client).lines();
        let mut responses = Vec::new();
        while let Ok(Some(line)) = reader.next_line().await {
            responses.push(serde_json::from_str(&line).unwrap());
        }
        responses
    }

    #[tokio::test]
    async fn test_malformed_request_gets_error_response() {
        let responses = run("{\"id\": 7, \"operation\": \"explode\"}\nnot json\n").await;

        assert_eq!(responses.len(), 2);
        for response in &responses {
            assert!(response.output.is_error);
            assert!(response.output.text.starts_with("Invalid request"));
        }
        let ids: Vec<_> = responses.iter().map(|r| r.id.clone()).collect();
        assert!(ids.contains(&Some(Value::from(7))));
        assert!(ids.contains(&None));
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let responses = run("\n   \n").await;
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let responses =
            run("{\"id\": \"abc\", \"operation\": \"get_wallet\", \"api_key\": \"\"}\n").await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].id, Some(Value::from("abc")));
        assert_eq!(
            responses[0].output.text,
            "Failed to get wallet: an API key is required"
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let (reader, _writer) = tokio::io::duplex(1024);
        let result = serve(
            offline_app(),
            tokio::io::BufReader::new(reader),
            tokio::io::sink(),
            shutdown,
        )
        .await;

        assert!(result.is_ok());
    }
}
