//! Integration tests for the inbox crate
//!
//! These tests run whole searches, either against in-memory fakes or
//! against the real Gmail and Gemini clients pointed at mock servers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use inbox::{
    AuthError, CancellationToken, ClassificationError, Credential, FetchOptions, GeminiClient,
    GmailClient, LanguageModel, MailSource, MatchMode, Message, MessageId, MessagePage,
    MessagePart, NoopObserver, PipelineOptions, RelevanceClassifier, ResultPresenter,
    RetryPolicy, SearchCoordinator, SearchError, SearchPipeline, TextPresenter, TokenProvider,
};
use mockito::{Matcher, Server};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Token provider with a fixed answer that counts how often it was asked
struct FixedTokens {
    answer: Result<Credential, AuthError>,
    calls: AtomicUsize,
}

impl FixedTokens {
    fn granting() -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(Credential::new("test_token")),
            calls: AtomicUsize::new(0),
        })
    }

    fn denying() -> Arc<Self> {
        Arc::new(Self {
            answer: Err(AuthError::Denied("access_denied".to_string())),
            calls: AtomicUsize::new(0),
        })
    }
}

impl TokenProvider for FixedTokens {
    fn acquire(
        &self,
        _interactive: bool,
        _cancel: &CancellationToken,
    ) -> Result<Credential, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// Process-wide logger keeping every `warn` and `error` line
struct WarnCapture {
    lines: Mutex<Vec<String>>,
}

static WARNINGS: WarnCapture = WarnCapture {
    lines: Mutex::new(Vec::new()),
};

impl log::Log for WarnCapture {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Warn
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.lines.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

impl WarnCapture {
    fn install() -> &'static Self {
        static INSTALL: Once = Once::new();
        INSTALL.call_once(|| {
            log::set_logger(&WARNINGS).unwrap();
            log::set_max_level(log::LevelFilter::Warn);
        });
        &WARNINGS
    }

    /// Captured lines containing `needle`; tests share the logger
    fn matching(&self, needle: &str) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.contains(needle))
            .cloned()
            .collect()
    }
}

/// Mailbox held in memory, served in pages of `page_size`
struct MemoryMailbox {
    messages: Vec<Message>,
    list_calls: AtomicUsize,
}

impl MemoryMailbox {
    fn new(messages: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            messages,
            list_calls: AtomicUsize::new(0),
        })
    }
}

impl MailSource for MemoryMailbox {
    fn list_messages(
        &self,
        _credential: &Credential,
        page_size: usize,
        page_token: Option<&str>,
    ) -> anyhow::Result<MessagePage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let start: usize = match page_token {
            Some(token) => token.parse()?,
            None => 0,
        };
        let end = (start + page_size).min(self.messages.len());
        Ok(MessagePage {
            refs: self.messages[start..end]
                .iter()
                .map(|m| m.id.clone())
                .collect(),
            next_page_token: (end < self.messages.len()).then(|| end.to_string()),
        })
    }

    fn get_message(&self, _credential: &Credential, id: &MessageId) -> anyhow::Result<Message> {
        self.messages
            .iter()
            .find(|m| &m.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP 404 for {}", id))
    }
}

/// Deterministic model: relevant when the email body mentions the query
struct EchoModel;

impl LanguageModel for EchoModel {
    fn generate(&self, prompt: &str) -> Result<String, ClassificationError> {
        let body = between(prompt, "Given the email content: \"", "\". Does this email");
        let query = between(prompt, "related to: \"", "\"?");
        Ok(if body.to_lowercase().contains(&query.to_lowercase()) {
            "true".to_string()
        } else {
            "false".to_string()
        })
    }
}

fn between<'a>(text: &'a str, start: &str, end: &str) -> &'a str {
    let from = text.find(start).map_or(0, |i| i + start.len());
    let to = text[from..].find(end).map_or(text.len(), |i| from + i);
    &text[from..to]
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn plain_message(id: &str, body: &str) -> Message {
    Message::new(
        id,
        format!("Snippet for {}", id),
        MessagePart::multipart(
            "multipart/alternative",
            vec![
                MessagePart::leaf("text/plain", URL_SAFE.encode(body)),
                MessagePart::leaf("text/html", URL_SAFE.encode(format!("<p>{}</p>", body))),
            ],
        ),
    )
}

fn gmail_message_json(id: &str, body: &str) -> String {
    serde_json::json!({
        "id": id,
        "threadId": format!("thread-{}", id),
        "snippet": format!("Snippet for {}", id),
        "payload": {
            "mimeType": "text/plain",
            "body": { "size": body.len(), "data": URL_SAFE.encode(body) }
        }
    })
    .to_string()
}

fn gemini_answer(text: &str) -> String {
    serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    })
    .to_string()
}

fn list_json(ids: impl Iterator<Item = String>, next_page_token: Option<&str>) -> String {
    let messages: Vec<_> = ids
        .map(|id| serde_json::json!({ "id": id, "threadId": id }))
        .collect();
    let mut body = serde_json::json!({ "messages": messages });
    if let Some(token) = next_page_token {
        body["nextPageToken"] = serde_json::Value::String(token.to_string());
    }
    body.to_string()
}

fn http_pipeline(
    tokens: Arc<FixedTokens>,
    gmail: &Server,
    gemini: &Server,
    mode: MatchMode,
) -> SearchPipeline {
    let source = GmailClient::new()
        .with_base_url(gmail.url())
        .with_retry(RetryPolicy::none());
    let model = GeminiClient::new("test-key", "gemini-pro")
        .with_base_url(gemini.url())
        .with_retry(RetryPolicy::none());

    SearchPipeline::new(
        tokens,
        Arc::new(source),
        RelevanceClassifier::new(Arc::new(model)).with_mode(mode),
        PipelineOptions {
            interactive: false,
            classify_concurrency: 1,
            fetch: FetchOptions {
                concurrency: 4,
                ..FetchOptions::default()
            },
        },
    )
    .unwrap()
}

fn memory_pipeline(mailbox: Arc<MemoryMailbox>, page_size: usize) -> SearchPipeline {
    SearchPipeline::new(
        FixedTokens::granting(),
        mailbox,
        RelevanceClassifier::new(Arc::new(EchoModel)),
        PipelineOptions {
            fetch: FetchOptions {
                page_size,
                concurrency: 4,
                ..FetchOptions::default()
            },
            ..PipelineOptions::default()
        },
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// HTTP scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_denied_token_makes_no_listing_calls() {
    let mut gmail = Server::new();
    let gemini = Server::new();
    let listing = gmail
        .mock("GET", "/users/me/messages")
        .match_query(Matcher::Any)
        .expect(0)
        .create();

    let tokens = FixedTokens::denying();
    let err = http_pipeline(tokens.clone(), &gmail, &gemini, MatchMode::Substring)
        .search("invoice")
        .unwrap_err();

    assert!(matches!(err, SearchError::Auth(AuthError::Denied(_))));
    assert_eq!(tokens.calls.load(Ordering::SeqCst), 1);
    listing.assert();
}

#[test]
fn test_one_failed_detail_in_page_of_ten() {
    let warnings = WarnCapture::install();
    let mut gmail = Server::new();
    let mut gemini = Server::new();

    let _listing = gmail
        .mock("GET", "/users/me/messages")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(list_json((0..10).map(|i| format!("m{}", i)), None))
        .create();

    let mut details = Vec::new();
    for i in 0..10 {
        let id = format!("m{}", i);
        let mock = gmail
            .mock("GET", format!("/users/me/messages/{}", id).as_str())
            .match_query(Matcher::UrlEncoded("format".into(), "full".into()));
        let mock = if i == 3 {
            mock.with_status(500)
        } else {
            mock.with_status(200)
                .with_header("content-type", "application/json")
                .with_body(gmail_message_json(&id, "Quarterly invoice attached"))
        };
        details.push(mock.create());
    }

    let classify = gemini
        .mock("POST", "/models/gemini-pro:generateContent")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_answer("true"))
        .expect(9)
        .create();

    let outcome = http_pipeline(FixedTokens::granting(), &gmail, &gemini, MatchMode::Substring)
        .search("invoice")
        .unwrap();

    assert_eq!(outcome.stats.messages_fetched, 9);
    assert_eq!(outcome.stats.detail_failures, 1);
    assert_eq!(outcome.results.len(), 9);
    assert!(outcome.results.iter().all(|r| r.id.as_str() != "m3"));
    let ids: Vec<&str> = outcome.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["m0", "m1", "m2", "m4", "m5", "m6", "m7", "m8", "m9"]);
    classify.assert();

    let logged = warnings.matching("Failed to fetch email details for message ID m3");
    assert_eq!(logged.len(), 1, "expected one warning, got {:?}", logged);
}

#[test]
fn test_501_messages_paginate_over_http() {
    let mut gmail = Server::new();
    let mut gemini = Server::new();

    let first = gmail
        .mock("GET", "/users/me/messages")
        .match_query(Matcher::Exact("maxResults=500".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(list_json((0..500).map(|i| format!("m{}", i)), Some("cursor-1")))
        .expect(1)
        .create();
    let second = gmail
        .mock("GET", "/users/me/messages")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("maxResults".into(), "500".into()),
            Matcher::UrlEncoded("pageToken".into(), "cursor-1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(list_json(std::iter::once("m500".to_string()), None))
        .expect(1)
        .create();

    // HTML-only messages never reach the classifier
    let _details = gmail
        .mock("GET", Matcher::Regex(r"^/users/me/messages/m\d+$".into()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "id": "html",
                "snippet": "",
                "payload": {
                    "mimeType": "text/html",
                    "body": { "size": 9, "data": URL_SAFE.encode("<p>hi</p>") }
                }
            })
            .to_string(),
        )
        .expect(501)
        .create();
    let classify = gemini
        .mock("POST", Matcher::Any)
        .expect(0)
        .create();

    let outcome = http_pipeline(FixedTokens::granting(), &gmail, &gemini, MatchMode::Substring)
        .search("anything")
        .unwrap();

    assert_eq!(outcome.stats.pages_fetched, 2);
    assert_eq!(outcome.stats.messages_fetched, 501);
    assert_eq!(outcome.stats.messages_without_body, 501);
    assert!(outcome.is_empty());
    first.assert();
    second.assert();
    classify.assert();
}

#[test]
fn test_listing_failure_is_fatal() {
    let mut gmail = Server::new();
    let gemini = Server::new();
    let _listing = gmail
        .mock("GET", "/users/me/messages")
        .match_query(Matcher::Any)
        .with_status(503)
        .create();

    let err = http_pipeline(FixedTokens::granting(), &gmail, &gemini, MatchMode::Substring)
        .search("invoice")
        .unwrap_err();

    match err {
        SearchError::Fetch {
            page_index,
            page_token,
            ..
        } => {
            assert_eq!(page_index, 0);
            assert_eq!(page_token, None);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_match_mode_changes_results() {
    let mut gmail = Server::new();
    let mut gemini = Server::new();

    let _listing = gmail
        .mock("GET", "/users/me/messages")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(list_json(std::iter::once("m1".to_string()), None))
        .create();
    let _detail = gmail
        .mock("GET", "/users/me/messages/m1")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(gmail_message_json("m1", "Dinner on Saturday"))
        .create();
    let _classify = gemini
        .mock("POST", "/models/gemini-pro:generateContent")
        .with_status(200)
        .with_body(gemini_answer("this is not true enough"))
        .create();

    let substring = http_pipeline(FixedTokens::granting(), &gmail, &gemini, MatchMode::Substring)
        .search("invoice")
        .unwrap();
    assert_eq!(substring.results.len(), 1);

    let strict = http_pipeline(FixedTokens::granting(), &gmail, &gemini, MatchMode::Strict)
        .search("invoice")
        .unwrap();
    assert!(strict.is_empty());
}

#[test]
fn test_model_errors_are_not_matches() {
    let mut gmail = Server::new();
    let mut gemini = Server::new();

    let _listing = gmail
        .mock("GET", "/users/me/messages")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(list_json((0..3).map(|i| format!("m{}", i)), None))
        .create();
    let _details = gmail
        .mock("GET", Matcher::Regex(r"^/users/me/messages/m\d$".into()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(gmail_message_json("m", "Invoice"))
        .create();
    let _classify = gemini
        .mock("POST", "/models/gemini-pro:generateContent")
        .with_status(500)
        .create();

    let outcome = http_pipeline(FixedTokens::granting(), &gmail, &gemini, MatchMode::Substring)
        .search("invoice")
        .unwrap();

    assert!(outcome.is_empty());
    assert_eq!(outcome.stats.messages_classified, 3);
    assert_eq!(outcome.stats.classification_errors, 3);
}

// ---------------------------------------------------------------------------
// In-memory scenarios
// ---------------------------------------------------------------------------

fn travel_mailbox() -> Vec<Message> {
    vec![
        plain_message("a", "Your flight to Lisbon is confirmed"),
        plain_message("b", "Team lunch moved to Thursday"),
        plain_message("c", "Hotel booking for your Lisbon flight"),
        plain_message("d", "Weekly newsletter"),
        plain_message("e", "Flight delay notice"),
    ]
}

#[test]
fn test_idempotent_search() {
    let mailbox = MemoryMailbox::new(travel_mailbox());
    let pipeline = memory_pipeline(mailbox, 2);

    let first = pipeline.search("flight").unwrap();
    let second = pipeline.search("flight").unwrap();

    assert_eq!(first.results, second.results);
    let ids: Vec<&str> = first.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c", "e"]);
}

#[test]
fn test_multi_page_memory_mailbox() {
    let mailbox = MemoryMailbox::new(travel_mailbox());
    let outcome = memory_pipeline(mailbox.clone(), 2).search("lisbon").unwrap();

    assert_eq!(mailbox.list_calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.stats.pages_fetched, 3);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[0].body, "Your flight to Lisbon is confirmed");
}

#[test]
fn test_superseded_search_is_cancelled() {
    let coordinator = SearchCoordinator::new();
    let pipeline = memory_pipeline(MemoryMailbox::new(travel_mailbox()), 500);

    let stale = coordinator.begin();
    let fresh = coordinator.begin();

    assert!(stale.token.is_cancelled());
    assert!(!coordinator.is_current(&stale));

    let err = pipeline
        .search_with("flight", &stale.token, &NoopObserver)
        .unwrap_err();
    assert!(err.is_cancelled());

    let outcome = pipeline
        .search_with("flight", &fresh.token, &NoopObserver)
        .unwrap();
    assert!(coordinator.is_current(&fresh));
    assert_eq!(outcome.results.len(), 3);
}

#[test]
fn test_cancelled_token_skips_everything() {
    let mailbox = MemoryMailbox::new(travel_mailbox());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = memory_pipeline(mailbox.clone(), 500)
        .search_with("flight", &cancel, &NoopObserver)
        .unwrap_err();

    assert!(matches!(err, SearchError::Cancelled));
    assert_eq!(mailbox.list_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_search_and_present() {
    let pipeline = memory_pipeline(MemoryMailbox::new(travel_mailbox()), 500);
    let mut presenter = TextPresenter::new(Vec::new());

    presenter.searching().unwrap();
    match pipeline.search("hotel") {
        Ok(outcome) => presenter.present(&outcome.results).unwrap(),
        Err(e) => presenter.present_error(&e).unwrap(),
    }
    match pipeline.search("dentist") {
        Ok(outcome) => presenter.present(&outcome.results).unwrap(),
        Err(e) => presenter.present_error(&e).unwrap(),
    }

    let out = String::from_utf8(presenter.into_inner()).unwrap();
    assert_eq!(
        out,
        "Searching...\n\
         [c] Snippet for c\n    Hotel booking for your Lisbon flight...\n\
         No results found.\n"
    );
}
