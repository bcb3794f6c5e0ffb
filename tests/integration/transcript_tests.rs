use crate::common::{chat_driver, chat_page, chat_selectors, fast_reveal, transcript_config, ScriptedDriver};
use async_trait::async_trait;
use backscroll::collector::{ContentExtractor, Extraction, MessagePairExtractor};
use backscroll::config::SessionConfig;
use backscroll::driver::{DriverResult, HtmlSnapshotDriver, PageDriver};
use backscroll::output::TranscriptWriter;
use backscroll::session::{Credentials, EmailCodeSession, FixedPrompt, NoSession, VerificationPrompt};
use backscroll::{AuthError, CrashSafePersister, Harvest, HarvestError, RecordKind, TerminationDecision};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const CHAT_URL: &str = "https://poe.com/chat/2abcdefghijklmnop";

fn persister(dir: &Path) -> CrashSafePersister {
    CrashSafePersister::new(Box::new(TranscriptWriter::new()), dir)
}

fn transcript_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

fn read_single_transcript(dir: &Path) -> String {
    let files = transcript_files(dir);
    assert_eq!(files.len(), 1, "expected one transcript, found {:?}", files);
    std::fs::read_to_string(&files[0]).unwrap()
}

/// Asserts that every needle appears in `text`, in the given order
fn assert_in_order(text: &str, needles: &[&str]) {
    let mut from = 0;
    for needle in needles {
        let found = text[from..]
            .find(needle)
            .unwrap_or_else(|| panic!("'{}' missing or out of order in:\n{}", needle, text));
        from += found + needle.len();
    }
}

#[tokio::test]
async fn test_transcript_restores_chronological_order() {
    let dir = TempDir::new().unwrap();
    // Older pairs appear above the newest one as the page is scrolled up
    let mut driver = chat_driver(&[
        &[("q3", "a3")],
        &[("q2", "a2"), ("q3", "a3")],
        &[("q1", "a1"), ("q2", "a2"), ("q3", "a3")],
    ]);
    let mut extractor = MessagePairExtractor::new(&transcript_config());
    let harvest = Harvest::new(CHAT_URL, fast_reveal(2));

    let report = harvest
        .run(
            &mut driver,
            &NoSession,
            &mut extractor,
            &persister(dir.path()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.kind, RecordKind::MessagePair);
    assert_eq!(report.reason, TerminationDecision::StopNoNewContent);
    assert_eq!(report.collected, 3);
    assert_eq!(report.saved, 3);
    assert!(driver.is_released());
    assert_eq!(driver.opened_urls(), vec![CHAT_URL]);

    let files = transcript_files(dir.path());
    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("poe_chat_2abcdefghijklmnop_"), "{}", name);

    let text = read_single_transcript(dir.path());
    assert!(text.contains("Bot Name: Assistant"));
    assert_in_order(
        &text,
        &[
            "Message Pair 1:",
            "Human: q1",
            "Assistant: a1",
            "Message Pair 2:",
            "Human: q2",
            "Message Pair 3:",
            "Human: q3",
        ],
    );
}

#[tokio::test]
async fn test_pair_shown_after_a_known_one_stays_after_it() {
    let dir = TempDir::new().unwrap();
    let mut driver = chat_driver(&[
        &[("hi", "hello")],
        &[("hi", "hello"), ("bye", "goodbye")],
        &[("hi", "hello"), ("bye", "goodbye")],
    ]);
    let mut extractor = MessagePairExtractor::new(&transcript_config());

    let report = Harvest::new(CHAT_URL, fast_reveal(2))
        .run(
            &mut driver,
            &NoSession,
            &mut extractor,
            &persister(dir.path()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.saved, 2);
    assert_eq!(report.reason, TerminationDecision::StopNoNewContent);
    let text = read_single_transcript(dir.path());
    assert_in_order(
        &text,
        &["Human: hi", "Assistant: hello", "Human: bye", "Assistant: goodbye"],
    );
}

#[tokio::test]
async fn test_interrupt_persists_what_was_collected() {
    let dir = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    let mut driver = ScriptedDriver::new(chat_driver(&[
        &[("q3", "a3")],
        &[("q2", "a2"), ("q3", "a3")],
        &[("q1", "a1"), ("q2", "a2"), ("q3", "a3")],
    ]))
    .cancel_after(2, cancel.clone());
    let mut extractor = MessagePairExtractor::new(&transcript_config());
    let harvest = Harvest::new(CHAT_URL, fast_reveal(5));

    let report = harvest
        .run(&mut driver, &NoSession, &mut extractor, &persister(dir.path()), &cancel)
        .await
        .unwrap();

    assert_eq!(report.reason, TerminationDecision::StopInterrupted);
    assert!(report.was_interrupted());
    assert_eq!(report.saved, 2);
    assert!(driver.inner.is_released());

    let text = read_single_transcript(dir.path());
    assert_in_order(&text, &["Human: q2", "Human: q3"]);
    assert!(!text.contains("Human: q1"));
}

#[tokio::test]
async fn test_interrupt_before_anything_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut driver = chat_driver(&[&[]]);
    let mut extractor = MessagePairExtractor::new(&transcript_config());
    let harvest = Harvest::new(CHAT_URL, fast_reveal(5));

    let report = harvest
        .run(&mut driver, &NoSession, &mut extractor, &persister(dir.path()), &cancel)
        .await
        .unwrap();

    assert_eq!(report.reason, TerminationDecision::StopInterrupted);
    assert_eq!(report.saved, 0);
    assert!(report.destination.is_none());
    assert!(transcript_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_stale_candidate_is_recovered_on_a_later_pass() {
    let dir = TempDir::new().unwrap();
    // Read 1 is the bot name, read 2 the first human bubble
    let mut driver = ScriptedDriver::new(chat_driver(&[&[("p1", "r1"), ("p2", "r2")]]))
        .stale_reads(&[2]);
    let mut extractor = MessagePairExtractor::new(&transcript_config());
    let harvest = Harvest::new(CHAT_URL, fast_reveal(2));

    let report = harvest
        .run(
            &mut driver,
            &NoSession,
            &mut extractor,
            &persister(dir.path()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.collected, 2);
    assert_eq!(report.stats.stale_skipped, 1);

    let text = read_single_transcript(dir.path());
    assert_in_order(&text, &["Human: p1", "Assistant: r1", "Human: p2", "Assistant: r2"]);
}

#[tokio::test]
async fn test_session_loss_flushes_partial_results() {
    let dir = TempDir::new().unwrap();
    let mut driver = ScriptedDriver::new(chat_driver(&[
        &[("q2", "a2")],
        &[("q1", "a1"), ("q2", "a2")],
    ]))
    .die_after(1);
    let mut extractor = MessagePairExtractor::new(&transcript_config());
    let harvest = Harvest::new(CHAT_URL, fast_reveal(5));

    let err = harvest
        .run(
            &mut driver,
            &NoSession,
            &mut extractor,
            &persister(dir.path()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    let (destination, saved) = err.saved_destination().unwrap();
    assert_eq!(saved, 1);
    assert!(destination.starts_with(dir.path()));
    assert!(matches!(
        err,
        HarvestError::Partial { source, .. } if matches!(*source, HarvestError::SessionLost(_))
    ));
    assert!(driver.inner.is_released());

    let text = read_single_transcript(dir.path());
    assert!(text.contains("Human: q2"));
}

/// Delegates to a message pair extractor and panics on its second pass
struct ExplodingExtractor {
    inner: MessagePairExtractor,
    passes: usize,
}

#[async_trait]
impl<D: PageDriver> ContentExtractor<D> for ExplodingExtractor {
    fn kind(&self) -> RecordKind {
        RecordKind::MessagePair
    }

    async fn extract_visible(&mut self, driver: &D) -> DriverResult<Extraction> {
        self.passes += 1;
        if self.passes == 2 {
            panic!("extractor exploded");
        }
        ContentExtractor::<D>::extract_visible(&mut self.inner, driver).await
    }
}

#[tokio::test]
async fn test_panic_inside_the_loop_still_saves() {
    let dir = TempDir::new().unwrap();
    let mut driver = chat_driver(&[&[("q1", "a1")], &[("q0", "a0"), ("q1", "a1")]]);
    let mut extractor = ExplodingExtractor {
        inner: MessagePairExtractor::new(&transcript_config()),
        passes: 0,
    };
    let harvest = Harvest::new(CHAT_URL, fast_reveal(5));

    let err = harvest
        .run(
            &mut driver,
            &NoSession,
            &mut extractor,
            &persister(dir.path()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        HarvestError::Partial { saved, source, .. } => {
            assert_eq!(saved, 1);
            match *source {
                HarvestError::Panicked(message) => assert_eq!(message, "extractor exploded"),
                other => panic!("unexpected source: {:?}", other),
            }
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(driver.is_released());
    assert!(read_single_transcript(dir.path()).contains("Human: q1"));
}

const LOGIN_PAGE: &str = r#"<input type="email"><button>Go</button>"#;
const CODE_PAGE: &str = r#"<input class="VerificationCodeInput_x"><button>Log In</button>"#;

fn session_config() -> SessionConfig {
    SessionConfig {
        login_url: "https://poe.com/login".to_string(),
        wait_timeout_secs: 1,
        settle_ms: 0,
        ..SessionConfig::default()
    }
}

fn login_driver(after_login: Option<String>) -> HtmlSnapshotDriver {
    let mut pages = vec![LOGIN_PAGE.to_string(), CODE_PAGE.to_string()];
    pages.extend(after_login);
    HtmlSnapshotDriver::new(pages, chat_selectors()).navigate_on_click()
}

#[tokio::test]
async fn test_login_then_collect() {
    let dir = TempDir::new().unwrap();
    let mut driver = login_driver(Some(chat_page(&[("hello", "hi there")])));
    let session = EmailCodeSession::new(
        session_config(),
        Credentials::new("someone@example.com"),
        FixedPrompt::new(Some("424242")),
    );
    let mut extractor = MessagePairExtractor::new(&transcript_config());
    let harvest = Harvest::new(CHAT_URL, fast_reveal(2));

    let report = harvest
        .run(
            &mut driver,
            &session,
            &mut extractor,
            &persister(dir.path()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.saved, 1);
    assert_eq!(driver.opened_urls(), vec!["https://poe.com/login", CHAT_URL]);
    assert_eq!(driver.typed_text(), vec!["someone@example.com", "424242"]);
    assert!(read_single_transcript(dir.path()).contains("Human: hello"));
}

#[tokio::test]
async fn test_auth_failure_collects_nothing() {
    let dir = TempDir::new().unwrap();
    let mut driver = login_driver(None);
    let session = EmailCodeSession::new(
        session_config(),
        Credentials::new("someone@example.com"),
        FixedPrompt::new(None),
    );
    let mut extractor = MessagePairExtractor::new(&transcript_config());
    let harvest = Harvest::new(CHAT_URL, fast_reveal(2));

    let err = harvest
        .run(
            &mut driver,
            &session,
            &mut extractor,
            &persister(dir.path()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Auth(AuthError::ChallengeRequired)));
    assert!(err.saved_destination().is_none());
    assert!(driver.is_released());
    assert_eq!(driver.opened_urls(), vec!["https://poe.com/login"]);
    assert!(transcript_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_interrupt_before_login_skips_everything() {
    let dir = TempDir::new().unwrap();
    let mut driver = login_driver(Some(chat_page(&[("hello", "hi there")])));
    let session = EmailCodeSession::new(
        session_config(),
        Credentials::new("someone@example.com"),
        FixedPrompt::new(Some("424242")),
    );
    let mut extractor = MessagePairExtractor::new(&transcript_config());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = Harvest::new(CHAT_URL, fast_reveal(2))
        .run(&mut driver, &session, &mut extractor, &persister(dir.path()), &cancel)
        .await
        .unwrap();

    assert_eq!(report.reason, TerminationDecision::StopInterrupted);
    assert_eq!(report.saved, 0);
    assert!(report.destination.is_none());
    assert!(driver.opened_urls().is_empty());
    assert!(driver.typed_text().is_empty());
    assert!(driver.is_released());
    assert!(transcript_files(dir.path()).is_empty());
}

/// Stands in for an operator who presses Ctrl-C at the code prompt
struct InterruptedPrompt {
    cancel: CancellationToken,
}

#[async_trait]
impl VerificationPrompt for InterruptedPrompt {
    async fn request_code(&self, _email: &str) -> Option<String> {
        self.cancel.cancel();
        // The terminal read never returns
        futures::future::pending().await
    }
}

#[tokio::test]
async fn test_interrupt_at_code_prompt_abandons_login() {
    let dir = TempDir::new().unwrap();
    let mut driver = login_driver(Some(chat_page(&[("hello", "hi there")])));
    let cancel = CancellationToken::new();
    let session = EmailCodeSession::new(
        session_config(),
        Credentials::new("someone@example.com"),
        InterruptedPrompt {
            cancel: cancel.clone(),
        },
    );
    let mut extractor = MessagePairExtractor::new(&transcript_config());

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        Harvest::new(CHAT_URL, fast_reveal(2)).run(
            &mut driver,
            &session,
            &mut extractor,
            &persister(dir.path()),
            &cancel,
        ),
    )
    .await
    .expect("interrupt should end the run")
    .unwrap();

    assert_eq!(report.reason, TerminationDecision::StopInterrupted);
    assert_eq!(report.saved, 0);
    assert_eq!(driver.opened_urls(), vec!["https://poe.com/login"]);
    assert!(driver.is_released());
    assert!(transcript_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_same_harvest_can_run_again() {
    let harvest = Harvest::new(CHAT_URL, fast_reveal(2));

    for _ in 0..2 {
        let dir = TempDir::new().unwrap();
        let mut driver = chat_driver(&[&[("q1", "a1")]]);
        let mut extractor = MessagePairExtractor::new(&transcript_config());

        let report = harvest
            .run(
                &mut driver,
                &NoSession,
                &mut extractor,
                &persister(dir.path()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.collected, 1);
        assert_eq!(report.saved, 1);
        assert!(read_single_transcript(dir.path()).contains("Human: q1"));
    }
}
