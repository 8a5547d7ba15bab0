use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    dropped: usize,
}

/// Drains one child pipe in the background, keeping at most `limit` bytes.
///
/// The buffer is shared with the reader task so whatever arrived before a
/// kill can still be collected if the pipe never reaches EOF.
pub(crate) struct OutputCapture {
    buf: Arc<Mutex<Captured>>,
    task: Option<JoinHandle<()>>,
    limit: usize,
}

impl OutputCapture {
    pub(crate) fn spawn<R>(reader: Option<R>, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Captured::default()));
        let task = reader.map(|mut reader| {
            let buf = Arc::clone(&buf);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => {
                            let mut guard = buf.lock().unwrap_or_else(|e| e.into_inner());
                            let room = limit.saturating_sub(guard.bytes.len());
                            let keep = room.min(n);
                            guard.bytes.extend_from_slice(&chunk[..keep]);
                            // keep draining past the limit so the child never blocks on a full pipe
                            guard.dropped += n - keep;
                        }
                        Err(e) => {
                            debug!("output pipe read failed: {}", e);
                            break;
                        }
                    }
                }
            })
        });
        Self { buf, task, limit }
    }

    /// Waits up to `grace` for EOF, then returns what was captured as lossy UTF-8.
    pub(crate) async fn finish(mut self, grace: Duration) -> String {
        if let Some(task) = self.task.take() {
            let abort = task.abort_handle();
            if tokio::time::timeout(grace, task).await.is_err() {
                debug!("output pipe still open after {:?}; abandoning reader", grace);
                abort.abort();
            }
        }
        let guard = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        render(&guard.bytes, guard.dropped, self.limit)
    }
}

fn render(bytes: &[u8], dropped: usize, limit: usize) -> String {
    let mut text = String::from_utf8_lossy(bytes).to_string();
    if dropped > 0 {
        text.push_str(&format!(
            "\n… (truncated: output exceeded {} bytes, {} bytes dropped)",
            limit, dropped
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_marks_truncation() {
        assert_eq!(render(b"abc", 0, 10), "abc");
        let text = render(b"abc", 5, 3);
        assert!(text.starts_with("abc\n"));
        assert!(text.contains("5 bytes dropped"));
    }

    #[test]
    fn render_replaces_invalid_utf8() {
        let text = render(&[b'o', b'k', 0xff, 0xfe], 0, 10);
        assert!(text.starts_with("ok"));
        assert!(text.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn capture_caps_and_drains() {
        let data = std::io::Cursor::new(vec![b'x'; 20_000]);
        let capture = OutputCapture::spawn(Some(data), 1024);
        let text = capture.finish(Duration::from_secs(1)).await;
        assert!(text.starts_with(&"x".repeat(1024)));
        assert!(text.contains("18976 bytes dropped"));
    }

    #[tokio::test]
    async fn missing_pipe_yields_empty_output() {
        let capture = OutputCapture::spawn(None::<std::io::Cursor<Vec<u8>>>, 1024);
        assert_eq!(capture.finish(Duration::from_millis(10)).await, "");
    }
}
