use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Quiet period after the last keystroke before a query is committed.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(400);

/// Handle to a scheduled commit. Dropping it cancels the commit.
#[derive(Debug)]
pub struct PendingCommit {
    handle: JoinHandle<()>,
}

impl PendingCommit {
    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PendingCommit {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Search box input that commits its text only once typing pauses.
///
/// Keystrokes update the local buffer right away. Each keystroke
/// replaces the pending commit, so a burst of edits produces a single
/// commit carrying the final text. Commits arrive on the receiver
/// returned by [`DebouncedQuery::channel`]; whoever owns the criteria
/// applies them. Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct DebouncedQuery {
    buffer: String,
    window: Duration,
    pending: Option<PendingCommit>,
    generation: Arc<AtomicU64>,
    commits: mpsc::UnboundedSender<String>,
}

impl DebouncedQuery {
    pub fn new(
        initial: impl Into<String>,
        window: Duration,
        commits: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            buffer: initial.into(),
            window,
            pending: None,
            generation: Arc::new(AtomicU64::new(0)),
            commits,
        }
    }

    pub fn channel(
        initial: impl Into<String>,
        window: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(initial, window, tx), rx)
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// A keystroke: replace the buffer and restart the quiet period.
    pub fn input(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
        self.invalidate();

        let expected = self.generation.load(Ordering::SeqCst);
        let generation = Arc::clone(&self.generation);
        let commits = self.commits.clone();
        let value = self.buffer.clone();
        let window = self.window;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if generation.load(Ordering::SeqCst) != expected {
                return;
            }
            debug!(query = %value, "Committing debounced query");
            let _ = commits.send(value);
        });
        self.pending = Some(PendingCommit { handle });
    }

    /// Commit the buffer now, as pressing enter does.
    pub fn flush(&mut self) {
        self.invalidate();
        let _ = self.commits.send(self.buffer.clone());
    }

    /// Empty the buffer and drop any pending commit.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.invalidate();
    }

    /// Set the buffer without committing, e.g. after history navigation.
    pub fn reset(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
    }
}

impl Drop for DebouncedQuery {
    fn drop(&mut self) {
        self.invalidate();
    }
}

/// A [`DebouncedQuery`] together with the receiving end of its commits,
/// for owners that apply the committed text themselves.
#[derive(Debug)]
pub struct QueryInput {
    input: DebouncedQuery,
    commits: mpsc::UnboundedReceiver<String>,
}

impl QueryInput {
    pub fn new(initial: impl Into<String>, window: Duration) -> Self {
        let (input, commits) = DebouncedQuery::channel(initial, window);
        Self { input, commits }
    }

    pub fn buffer(&self) -> &str {
        self.input.buffer()
    }

    pub fn has_pending(&self) -> bool {
        self.input.has_pending()
    }

    pub fn input(&mut self, text: impl Into<String>) {
        self.input.input(text);
    }

    pub fn flush(&mut self) {
        self.input.flush();
    }

    pub fn reset(&mut self, text: impl Into<String>) {
        self.input.reset(text);
    }

    /// The newest commit delivered so far, if any. Older ones are dropped.
    pub fn take_latest(&mut self) -> Option<String> {
        let mut latest = None;
        while let Ok(value) = self.commits.try_recv() {
            latest = Some(value);
        }
        latest
    }

    /// Wait for the next commit, then skip to the newest one queued.
    pub async fn next_commit(&mut self) -> Option<String> {
        let first = self.commits.recv().await?;
        Some(self.take_latest().unwrap_or(first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(400);

    async fn nothing_more(rx: &mut mpsc::UnboundedReceiver<String>) -> bool {
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .is_err()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_commits_once_with_last_value() {
        let (mut input, mut rx) = DebouncedQuery::channel("", WINDOW);

        for text in ["d", "du", "dun", "dune"] {
            input.input(text);
            assert_eq!(input.buffer(), text);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(rx.recv().await.as_deref(), Some("dune"));
        assert!(nothing_more(&mut rx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_pauses_commit_separately() {
        let (mut input, mut rx) = DebouncedQuery::channel("", WINDOW);

        input.input("alien");
        tokio::time::sleep(WINDOW * 2).await;
        input.input("aliens");

        assert_eq!(rx.recv().await.as_deref(), Some("alien"));
        assert_eq!(rx.recv().await.as_deref(), Some("aliens"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_commit() {
        let (mut input, mut rx) = DebouncedQuery::channel("", WINDOW);
        input.input("stale");
        assert!(input.has_pending());
        drop(input);

        tokio::time::sleep(WINDOW * 2).await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_pending_commit() {
        let (mut input, mut rx) = DebouncedQuery::channel("", WINDOW);
        input.input("heat");
        input.clear();
        assert_eq!(input.buffer(), "");
        assert!(nothing_more(&mut rx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_input_keeps_newest_commit() {
        let mut input = QueryInput::new("", WINDOW);
        input.input("up");
        input.flush();
        input.input("heat");
        input.flush();
        assert_eq!(input.take_latest().as_deref(), Some("heat"));
        assert_eq!(input.take_latest(), None);

        input.input("ronin");
        assert_eq!(input.next_commit().await.as_deref(), Some("ronin"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_commits_immediately() {
        let (mut input, mut rx) = DebouncedQuery::channel("", WINDOW);
        input.input("up");
        input.flush();
        assert_eq!(rx.try_recv().ok().as_deref(), Some("up"));
        assert!(nothing_more(&mut rx).await);
    }
}
