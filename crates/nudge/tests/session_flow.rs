//! End-to-end tests for `CompletionSession`: admission gate, history
//! bounds, stale-result discarding, and the editor event channel.
//!
//! The backend is an in-process fake so call counts can be asserted, and
//! time is driven by a `ManualClock`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use nudge::CompletionFuture;
use nudge::prelude::*;
use nudge::session::FnEventHandler;
use tokio::sync::{Notify, mpsc};

// ── Fakes ────────────────────────────────────────────────────────────

/// Replies immediately with a fixed string and counts calls.
struct Scripted {
    reply: Result<&'static str, &'static str>,
    calls: AtomicUsize,
    last_prompt: Mutex<String>,
}

impl Scripted {
    fn ok(reply: &'static str) -> Self {
        Self {
            reply: Ok(reply),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(String::new()),
        }
    }

    fn failing(message: &'static str) -> Self {
        Self {
            reply: Err(message),
            ..Self::ok("")
        }
    }
}

impl CompletionBackend for Scripted {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        _instructions: &'a str,
        _config: &'a CompletionConfig,
        _cancel: &'a CancelToken,
    ) -> CompletionFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = prompt.to_string();
            match self.reply {
                Ok(text) => Ok(Some(text.to_string())),
                Err(msg) => Err(CompletionError::Protocol(msg.to_string())),
            }
        })
    }
}

/// Blocks inside the call until released.
struct Held {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl CompletionBackend for Held {
    fn complete<'a>(
        &'a self,
        _prompt: &'a str,
        _instructions: &'a str,
        _config: &'a CompletionConfig,
        _cancel: &'a CancelToken,
    ) -> CompletionFuture<'a> {
        Box::pin(async move {
            self.started.notify_one();
            self.release.notified().await;
            Ok(Some("late answer".to_string()))
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

const SOURCE: &str = "\
def total(items):
    result = 0
    for item in items:
        result += item
    return
";

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-06-01T14:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn session_with<B: CompletionBackend>(backend: B) -> (CompletionSession<B>, ManualClock) {
    let clock = ManualClock::new(start());
    let session = CompletionSession::new(
        backend,
        CompletionConfig::default(),
        SessionConfig::default(),
    )
    .with_clock(Arc::new(clock.clone()));
    (session, clock)
}

fn automatic() -> CompletionRequest {
    CompletionRequest::automatic("calc.py", "python", SOURCE, Position::new(4, 10))
}

fn manual() -> CompletionRequest {
    CompletionRequest::manual("calc.py", "python", SOURCE, Position::new(4, 10))
}

fn typed(file: &str, text: &str) -> EditorEvent {
    EditorEvent::DocumentChanged {
        file_id: file.into(),
        language: "python".into(),
        changes: vec![TextChange {
            range: TextRange::at(Position::new(4, 10)),
            old_text: String::new(),
            new_text: text.into(),
        }],
    }
}

fn recorder() -> (Arc<dyn EventHandler>, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let handler = FnEventHandler::new(move |event: &CompletionEvent<'_>| {
        let name = match event {
            CompletionEvent::Suppressed { .. } => "suppressed",
            CompletionEvent::PromptAssembled { .. } => "assembled",
            CompletionEvent::Completed { .. } => "completed",
            CompletionEvent::NoSuggestion { .. } => "none",
            CompletionEvent::Discarded { .. } => "discarded",
            CompletionEvent::Failed { .. } => "failed",
        };
        sink.lock().unwrap().push(name.to_string());
    });
    (Arc::new(handler), log)
}

// ── Admission gate ───────────────────────────────────────────────────

#[tokio::test]
async fn debounce_suppresses_second_automatic_request() {
    let (session, clock) = session_with(Scripted::ok("sum(items)"));

    let first = session.request_completion(automatic()).await.unwrap();
    assert_eq!(first.as_deref(), Some("sum(items)"));

    clock.advance(Duration::from_millis(100));
    let second = session.request_completion(automatic()).await.unwrap();
    assert_eq!(second, None);
    assert_eq!(session_backend_calls(&session), 1);

    clock.advance(Duration::from_millis(250));
    let third = session.request_completion(automatic()).await.unwrap();
    assert!(third.is_some());
    assert_eq!(session_backend_calls(&session), 2);
}

fn session_backend_calls(session: &CompletionSession<Scripted>) -> usize {
    session.backend().calls.load(Ordering::SeqCst)
}

#[tokio::test]
async fn rapid_typing_blocks_automatic_but_not_manual() {
    let (handler, log) = recorder();
    let (session, clock) = session_with(Scripted::ok("result"));
    let session = session.with_event_handler(handler);

    for ch in ["r", "e", "s"] {
        session.handle_event(typed("calc.py", ch));
        clock.advance(Duration::from_millis(200));
    }

    let auto = session.request_completion(automatic()).await.unwrap();
    assert_eq!(auto, None);
    assert_eq!(session_backend_calls(&session), 0);

    let manual = session.request_completion(manual()).await.unwrap();
    assert_eq!(manual.as_deref(), Some("result"));
    assert_eq!(session_backend_calls(&session), 1);

    assert_eq!(
        *log.lock().unwrap(),
        ["suppressed", "assembled", "completed"]
    );
}

#[tokio::test]
async fn typing_in_another_file_does_not_trip_the_guard() {
    let (session, clock) = session_with(Scripted::ok("result"));
    for ch in ["a", "b", "c", "d"] {
        session.handle_event(typed("other.py", ch));
        clock.advance(Duration::from_millis(100));
    }
    assert!(session.request_completion(automatic()).await.unwrap().is_some());
}

#[tokio::test]
async fn guard_releases_after_typing_pauses() {
    let (session, clock) = session_with(Scripted::ok("result"));
    for ch in ["a", "b", "c"] {
        session.handle_event(typed("calc.py", ch));
    }
    clock.advance(Duration::from_millis(1_100));
    assert!(session.request_completion(automatic()).await.unwrap().is_some());
}

// ── History ──────────────────────────────────────────────────────────

#[test]
fn history_is_capped_at_twenty_most_recent() {
    let (session, clock) = session_with(Scripted::ok(""));
    for i in 0..25 {
        session.handle_event(typed("calc.py", &format!("edit-{i}")));
        clock.advance(Duration::from_millis(10));
    }
    let edits = session.edits();
    assert_eq!(edits.len(), 20);
    assert_eq!(session.edit_count(), 20);
    for i in 0..5 {
        assert!(edits.iter().all(|e| e.new_text != format!("edit-{i}")));
    }
    assert_eq!(edits.first().unwrap().new_text, "edit-5");
    assert_eq!(edits.last().unwrap().new_text, "edit-24");
}

#[tokio::test]
async fn recorded_activity_reaches_the_prompt() {
    let (session, clock) = session_with(Scripted::ok("result"));
    session.handle_event(EditorEvent::SelectionChanged {
        file_id: "helpers.py".into(),
        language: "python".into(),
        range: TextRange::new(Position::new(0, 0), Position::new(1, 0)),
        selected_text: "def mean(xs):\n    return sum(xs) / len(xs)".into(),
    });
    session.handle_event(typed("calc.py", "result"));
    clock.advance(Duration::from_secs(2));

    session.request_completion(manual()).await.unwrap();
    let prompt = session.backend().last_prompt.lock().unwrap().clone();
    assert!(prompt.contains("def mean(xs):"));
    assert!(prompt.contains("+ result"));
    assert!(prompt.contains("    return<|cursor|>"));
    assert!(!prompt.contains("\n\n\n"));
}

// ── Request lifecycle ────────────────────────────────────────────────

#[tokio::test]
async fn reply_is_sanitized_end_to_end() {
    let (session, _) = session_with(Scripted::ok("```python\n5|     return result\n```"));
    let out = session.request_completion(manual()).await.unwrap();
    // The echoed "    return" is dropped; the rest inserts after the cursor.
    assert_eq!(out.as_deref(), Some(" result"));
}

#[tokio::test]
async fn backend_errors_propagate() {
    let (handler, log) = recorder();
    let (session, _) = session_with(Scripted::failing("no choices"));
    let session = session.with_event_handler(handler);

    let err = session.request_completion(manual()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Protocol(ref m) if m == "no choices"));
    assert_eq!(*log.lock().unwrap(), ["assembled", "failed"]);
}

#[tokio::test]
async fn edit_during_flight_discards_result() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let (handler, log) = recorder();
    let (session, _) = session_with(Held {
        started: Arc::clone(&started),
        release: Arc::clone(&release),
    });
    let session = Arc::new(session.with_event_handler(handler));

    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.request_completion(manual()).await })
    };

    started.notified().await;
    session.handle_event(typed("calc.py", "x"));
    release.notify_one();

    let out = pending.await.unwrap().unwrap();
    assert_eq!(out, None);
    assert_eq!(*log.lock().unwrap(), ["assembled", "discarded"]);
}

#[tokio::test]
async fn newer_request_supersedes_older_one() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let (session, _) = session_with(Held {
        started: Arc::clone(&started),
        release: Arc::clone(&release),
    });
    let session = Arc::new(session);

    let spawn = |session: Arc<CompletionSession<Held>>| {
        tokio::spawn(async move { session.request_completion(manual()).await })
    };

    let older = spawn(Arc::clone(&session));
    started.notified().await;
    let newer = spawn(Arc::clone(&session));
    started.notified().await;

    release.notify_one();
    release.notify_one();

    let results = [older.await.unwrap().unwrap(), newer.await.unwrap().unwrap()];
    assert_eq!(results[0], None);
    assert_eq!(results[1].as_deref(), Some("late answer"));
}

#[tokio::test]
async fn closing_the_document_discards_in_flight_result() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let (session, _) = session_with(Held {
        started: Arc::clone(&started),
        release: Arc::clone(&release),
    });
    let session = Arc::new(session);

    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.request_completion(manual()).await })
    };
    started.notified().await;
    session.handle_event(EditorEvent::DocumentClosed {
        file_id: "calc.py".into(),
    });
    release.notify_one();

    assert_eq!(pending.await.unwrap().unwrap(), None);
}

// ── Event channel ────────────────────────────────────────────────────

#[tokio::test]
async fn run_consumes_events_until_channel_closes() {
    let (session, _) = session_with(Scripted::ok(""));
    let session = Arc::new(session);
    let (tx, rx) = mpsc::channel(16);

    let worker = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.run(rx).await })
    };

    tx.send(EditorEvent::ActiveFileChanged {
        file_id: "calc.py".into(),
        language: "python".into(),
    })
    .await
    .unwrap();
    tx.send(typed("calc.py", "a")).await.unwrap();
    tx.send(typed("calc.py", "b")).await.unwrap();
    tx.send(EditorEvent::SelectionChanged {
        file_id: "calc.py".into(),
        language: "python".into(),
        range: TextRange::default(),
        selected_text: String::new(),
    })
    .await
    .unwrap();
    drop(tx);

    worker.await.unwrap();
    assert_eq!(session.edit_count(), 2);
    assert_eq!(session.snippet_count(), 0);
    assert_eq!(session.active_file().as_deref(), Some("calc.py"));
}

// ── Real client ──────────────────────────────────────────────────────

#[tokio::test]
async fn unresponsive_backend_yields_no_suggestion() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept connections but never answer.
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let config = CompletionConfig::default()
        .with_server_url(format!("http://{addr}"))
        .with_timeout_ms(150);
    let session = CompletionSession::new(
        CompletionClient::new().unwrap(),
        config,
        SessionConfig::default(),
    );

    let out = session.request_completion(manual()).await;
    assert!(matches!(out, Ok(None)), "got {out:?}");
}
