use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use test_utils::alphabet_fixture;
use tokio::sync::mpsc;

use super::ChatOrchestrator;
use super::ChatState;
use super::APOLOGY_TEXT;
use crate::domain::models::Attachment;
use crate::domain::models::Backend;
use crate::domain::models::ChatError;
use crate::domain::models::ChatMessage;
use crate::domain::models::ChatRole;
use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::Sender;
use crate::domain::models::Storage;
use crate::domain::models::StorageScope;
use crate::domain::services::SessionStore;
use crate::infrastructure::storage::MemoryStorage;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
    Message(String, Vec<ChatMessage>),
    File(String),
    Document(String, String, Vec<ChatMessage>),
}

struct FakeBackend {
    reply: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    fn replying(text: &str) -> Arc<FakeBackend> {
        return Arc::new(FakeBackend {
            reply: Some(text.to_string()),
            delay: None,
            calls: Mutex::new(vec![]),
        });
    }

    fn failing() -> Arc<FakeBackend> {
        return Arc::new(FakeBackend {
            reply: None,
            delay: None,
            calls: Mutex::new(vec![]),
        });
    }

    fn hanging() -> Arc<FakeBackend> {
        return Arc::new(FakeBackend {
            reply: Some("Too late".to_string()),
            delay: Some(Duration::from_secs(3600)),
            calls: Mutex::new(vec![]),
        });
    }

    fn calls(&self) -> Vec<Call> {
        return self.calls.lock().unwrap().clone();
    }

    async fn respond(&self, call: Call) -> Result<String> {
        self.calls.lock().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.reply {
            Some(text) => return Ok(text.to_string()),
            None => bail!("connection refused"),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn health_check(&self) -> Result<()> {
        return Ok(());
    }

    async fn send_message(&self, prompt: &str, history: &[ChatMessage]) -> Result<String> {
        return self
            .respond(Call::Message(prompt.to_string(), history.to_vec()))
            .await;
    }

    async fn send_file(&self, file: &Attachment) -> Result<String> {
        return self.respond(Call::File(file.name.to_string())).await;
    }

    async fn analyze_document_with_prompt(
        &self,
        file: &Attachment,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String> {
        return self
            .respond(Call::Document(
                file.name.to_string(),
                prompt.to_string(),
                history.to_vec(),
            ))
            .await;
    }
}

/// Memory storage whose writes can be switched to fail.
#[derive(Default)]
struct BrokenDisk {
    inner: MemoryStorage,
    failing: AtomicBool,
}

impl BrokenDisk {
    fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for BrokenDisk {
    #[allow(clippy::implicit_return)]
    async fn get(&self, scope: StorageScope, key: &str) -> Result<Option<String>> {
        return self.inner.get(scope, key).await;
    }

    #[allow(clippy::implicit_return)]
    async fn set(&self, scope: StorageScope, key: &str, value: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("No space left on device");
        }
        return self.inner.set(scope, key, value).await;
    }

    #[allow(clippy::implicit_return)]
    async fn remove(&self, scope: StorageScope, key: &str) -> Result<()> {
        return self.inner.remove(scope, key).await;
    }
}

struct Harness {
    store: SessionStore,
    orchestrator: ChatOrchestrator,
    rx: mpsc::UnboundedReceiver<Event>,
    session_id: String,
}

async fn harness(backend: Arc<FakeBackend>, initial_message: Option<&str>) -> Result<Harness> {
    return harness_with_storage(backend, initial_message, Arc::new(MemoryStorage::default())).await;
}

async fn harness_with_storage(
    backend: Arc<FakeBackend>,
    initial_message: Option<&str>,
    storage: Arc<dyn Storage + Send + Sync>,
) -> Result<Harness> {
    let mut store = SessionStore::load(storage).await?;
    let session_id = store.create_session(initial_message).await?;
    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    let orchestrator = ChatOrchestrator::new(&session_id, backend, tx);

    return Ok(Harness {
        store,
        orchestrator,
        rx,
        session_id,
    });
}

/// Feeds events back into the orchestrator until it settles, recording every
/// state it passes through.
async fn run_until_idle(harness: &mut Harness) -> Result<Vec<ChatState>> {
    let mut states = vec![harness.orchestrator.state()];
    while harness.orchestrator.state() != ChatState::Idle {
        let event = match harness.rx.recv().await {
            Some(event) => event,
            None => bail!("Channel closed"),
        };
        harness
            .orchestrator
            .handle_event(&mut harness.store, &event)
            .await?;

        let state = harness.orchestrator.state();
        if states.last() != Some(&state) {
            states.push(state);
        }
    }

    return Ok(states);
}

fn contents(harness: &Harness) -> Vec<(Sender, String)> {
    return harness
        .store
        .session(&harness.session_id)
        .unwrap()
        .messages
        .iter()
        .map(|message| return (message.sender, message.content.to_string()))
        .collect();
}

mod submit {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn it_runs_a_full_turn() -> Result<()> {
        let backend = FakeBackend::replying(alphabet_fixture());
        let mut harness = harness(backend.clone(), None).await?;

        let accepted = harness
            .orchestrator
            .submit(&mut harness.store, "Say the alphabet", None)
            .await?;

        assert!(accepted);
        assert_eq!(harness.orchestrator.state(), ChatState::AwaitingResponse);
        assert_eq!(
            contents(&harness),
            vec![(Sender::User, "Say the alphabet".to_string())]
        );

        let states = run_until_idle(&mut harness).await?;

        assert_eq!(
            states,
            vec![
                ChatState::AwaitingResponse,
                ChatState::Revealing,
                ChatState::Idle
            ]
        );
        assert_eq!(
            contents(&harness),
            vec![
                (Sender::User, "Say the alphabet".to_string()),
                (Sender::Ai, alphabet_fixture().to_string()),
            ]
        );
        assert_eq!(
            backend.calls(),
            vec![Call::Message("Say the alphabet".to_string(), vec![])]
        );

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_sends_prior_history_in_backend_roles() -> Result<()> {
        let backend = FakeBackend::replying("Sure.");
        let mut harness = harness(backend.clone(), None).await?;

        harness
            .orchestrator
            .submit(&mut harness.store, "Hi", None)
            .await?;
        run_until_idle(&mut harness).await?;
        harness
            .orchestrator
            .submit(&mut harness.store, "Tell me more", None)
            .await?;
        run_until_idle(&mut harness).await?;

        let calls = backend.calls();
        assert_eq!(
            calls[1],
            Call::Message(
                "Tell me more".to_string(),
                vec![
                    ChatMessage {
                        role: ChatRole::User,
                        content: "Hi".to_string(),
                    },
                    ChatMessage {
                        role: ChatRole::Assistant,
                        content: "Sure.".to_string(),
                    },
                ]
            )
        );

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_ignores_blank_input() -> Result<()> {
        let backend = FakeBackend::replying("Hello");
        let mut harness = harness(backend.clone(), None).await?;

        let accepted = harness
            .orchestrator
            .submit(&mut harness.store, "   \n\t", None)
            .await?;

        assert!(!accepted);
        assert_eq!(harness.orchestrator.state(), ChatState::Idle);
        assert!(contents(&harness).is_empty());
        assert!(backend.calls().is_empty());

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_ignores_input_while_busy() -> Result<()> {
        let backend = FakeBackend::replying(alphabet_fixture());
        let mut harness = harness(backend.clone(), None).await?;

        harness
            .orchestrator
            .submit(&mut harness.store, "First", None)
            .await?;
        let accepted = harness
            .orchestrator
            .submit(&mut harness.store, "Second", None)
            .await?;
        assert!(!accepted);

        let event = harness.rx.recv().await.unwrap();
        harness
            .orchestrator
            .handle_event(&mut harness.store, &event)
            .await?;
        assert_eq!(harness.orchestrator.state(), ChatState::Revealing);

        let accepted = harness
            .orchestrator
            .submit(&mut harness.store, "Third", None)
            .await?;
        assert!(!accepted);

        run_until_idle(&mut harness).await?;
        assert_eq!(contents(&harness).len(), 2);
        assert_eq!(backend.calls().len(), 1);

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_apologizes_on_backend_failure() -> Result<()> {
        let mut harness = harness(FakeBackend::failing(), None).await?;

        harness
            .orchestrator
            .submit(&mut harness.store, "Hello?", None)
            .await?;
        let states = run_until_idle(&mut harness).await?;

        assert_eq!(states, vec![ChatState::AwaitingResponse, ChatState::Idle]);
        assert_eq!(
            contents(&harness),
            vec![
                (Sender::User, "Hello?".to_string()),
                (Sender::Ai, APOLOGY_TEXT.to_string()),
            ]
        );
        assert!(harness.orchestrator.visible_reveal().is_none());

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_apologizes_when_the_backend_times_out() -> Result<()> {
        let mut harness = harness(FakeBackend::hanging(), None).await?;
        harness.orchestrator = harness
            .orchestrator
            .with_timeout(Some(Duration::from_secs(30)));

        harness
            .orchestrator
            .submit(&mut harness.store, "Hello?", None)
            .await?;
        let states = run_until_idle(&mut harness).await?;

        assert_eq!(states, vec![ChatState::AwaitingResponse, ChatState::Idle]);
        assert_eq!(contents(&harness)[1], (Sender::Ai, APOLOGY_TEXT.to_string()));

        return Ok(());
    }
}

mod attachments {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn it_analyzes_documents_with_a_prompt() -> Result<()> {
        let backend = FakeBackend::replying("It's a report.");
        let mut harness = harness(backend.clone(), None).await?;
        let file = Attachment::new("report.pdf", b"%PDF".to_vec());

        harness
            .orchestrator
            .submit(&mut harness.store, "Summarize this", Some(file))
            .await?;
        run_until_idle(&mut harness).await?;

        assert_eq!(
            backend.calls(),
            vec![Call::Document(
                "report.pdf".to_string(),
                "Summarize this".to_string(),
                vec![]
            )]
        );
        insta::assert_snapshot!(contents(&harness)[0].1, @r###"
        Summarize this

        [report.pdf]
        "###);

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_uploads_files_without_a_prompt() -> Result<()> {
        let backend = FakeBackend::replying("Looks like notes.");
        let mut harness = harness(backend.clone(), None).await?;
        let file = Attachment::new("notes.txt", b"notes".to_vec());

        let accepted = harness
            .orchestrator
            .submit(&mut harness.store, "", Some(file))
            .await?;
        run_until_idle(&mut harness).await?;

        assert!(accepted);
        assert_eq!(backend.calls(), vec![Call::File("notes.txt".to_string())]);
        assert_eq!(contents(&harness)[0], (Sender::User, "[notes.txt]".to_string()));

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_rejects_invalid_files_locally() -> Result<()> {
        let backend = FakeBackend::replying("Never sent");
        let mut harness = harness(backend.clone(), None).await?;
        let file = Attachment::new("photo.png", vec![0; 10]);

        let res = harness
            .orchestrator
            .submit(&mut harness.store, "What is this?", Some(file))
            .await;

        let err = res.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::InvalidAttachment(_))
        ));
        assert_eq!(harness.orchestrator.state(), ChatState::Idle);
        assert!(contents(&harness).is_empty());
        assert!(backend.calls().is_empty());

        return Ok(());
    }
}

mod auto_submit {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn it_answers_the_landing_message_once() -> Result<()> {
        let backend = FakeBackend::replying("Hello there!");
        let mut harness = harness(backend.clone(), Some("Hi from the landing page")).await?;

        assert!(harness.orchestrator.maybe_auto_submit(&harness.store));
        assert_eq!(harness.orchestrator.state(), ChatState::AwaitingResponse);
        assert!(!harness.orchestrator.maybe_auto_submit(&harness.store));

        run_until_idle(&mut harness).await?;

        assert_eq!(
            contents(&harness),
            vec![
                (Sender::User, "Hi from the landing page".to_string()),
                (Sender::Ai, "Hello there!".to_string()),
            ]
        );
        assert_eq!(
            backend.calls(),
            vec![Call::Message("Hi from the landing page".to_string(), vec![])]
        );
        assert!(!harness.orchestrator.maybe_auto_submit(&harness.store));

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_skips_empty_sessions() -> Result<()> {
        let backend = FakeBackend::replying("Hello");
        let mut harness = harness(backend.clone(), None).await?;

        assert!(!harness.orchestrator.maybe_auto_submit(&harness.store));
        assert_eq!(harness.orchestrator.state(), ChatState::Idle);

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_skips_answered_sessions() -> Result<()> {
        let backend = FakeBackend::replying("Hello");
        let mut harness = harness(backend.clone(), None).await?;
        harness
            .orchestrator
            .submit(&mut harness.store, "Hi", None)
            .await?;
        run_until_idle(&mut harness).await?;

        let (tx, _rx) = mpsc::unbounded_channel::<Event>();
        let mut reopened = ChatOrchestrator::new(&harness.session_id, backend.clone(), tx);

        assert!(!reopened.maybe_auto_submit(&harness.store));
        assert_eq!(backend.calls().len(), 1);

        return Ok(());
    }
}

mod events {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn it_ignores_events_for_other_sessions() -> Result<()> {
        let mut harness = harness(FakeBackend::replying("Hello"), None).await?;

        harness
            .orchestrator
            .handle_event(
                &mut harness.store,
                &Event::BackendReplied {
                    session_id: "other".to_string(),
                    message_id: "1".to_string(),
                    result: Err(ChatError::Backend("boom".to_string())),
                },
            )
            .await?;

        assert_eq!(harness.orchestrator.state(), ChatState::Idle);
        assert!(contents(&harness).is_empty());

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_ignores_replies_when_idle() -> Result<()> {
        let mut harness = harness(FakeBackend::replying("Hello"), None).await?;
        let session_id = harness.session_id.to_string();

        harness
            .orchestrator
            .handle_event(
                &mut harness.store,
                &Event::BackendReplied {
                    session_id,
                    message_id: "1".to_string(),
                    result: Ok("Unprompted".to_string()),
                },
            )
            .await?;

        assert_eq!(harness.orchestrator.state(), ChatState::Idle);
        assert!(harness.orchestrator.visible_reveal().is_none());

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_commits_nothing_after_teardown() -> Result<()> {
        let mut harness = harness(FakeBackend::replying(alphabet_fixture()), None).await?;

        harness
            .orchestrator
            .submit(&mut harness.store, "Hi", None)
            .await?;
        let event = harness.rx.recv().await.unwrap();
        harness
            .orchestrator
            .handle_event(&mut harness.store, &event)
            .await?;
        assert_eq!(harness.orchestrator.state(), ChatState::Revealing);

        harness.orchestrator.teardown();
        assert_eq!(harness.orchestrator.state(), ChatState::Idle);

        tokio::time::sleep(Duration::from_secs(5)).await;
        while let Ok(event) = harness.rx.try_recv() {
            harness
                .orchestrator
                .handle_event(&mut harness.store, &event)
                .await?;
        }

        assert_eq!(contents(&harness), vec![(Sender::User, "Hi".to_string())]);

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_ignores_events_from_an_abandoned_turn() -> Result<()> {
        let mut harness = harness(FakeBackend::replying("Hello"), None).await?;

        harness
            .orchestrator
            .submit(&mut harness.store, "Hi", None)
            .await?;
        let stale_reply = harness.rx.recv().await.unwrap();
        harness.orchestrator.teardown();

        harness
            .orchestrator
            .submit(&mut harness.store, "Hi again", None)
            .await?;
        harness
            .orchestrator
            .handle_event(&mut harness.store, &stale_reply)
            .await?;
        assert_eq!(harness.orchestrator.state(), ChatState::AwaitingResponse);
        assert!(harness.orchestrator.visible_reveal().is_none());

        let stale_finish = Event::RevealFinished {
            session_id: harness.session_id.to_string(),
            message: Message::new(Sender::Ai, "From the old turn"),
        };
        harness
            .orchestrator
            .handle_event(&mut harness.store, &stale_finish)
            .await?;
        assert_eq!(harness.orchestrator.state(), ChatState::AwaitingResponse);

        run_until_idle(&mut harness).await?;
        assert_eq!(
            contents(&harness),
            vec![
                (Sender::User, "Hi".to_string()),
                (Sender::User, "Hi again".to_string()),
                (Sender::Ai, "Hello".to_string()),
            ]
        );

        return Ok(());
    }
}

mod storage_failures {
    use super::*;

    async fn next_event(harness: &mut Harness) -> Result<Event> {
        match harness.rx.recv().await {
            Some(event) => return Ok(event),
            None => bail!("Channel closed"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn it_settles_when_the_answer_cannot_be_saved() -> Result<()> {
        let disk = Arc::new(BrokenDisk::default());
        let mut harness =
            harness_with_storage(FakeBackend::replying("Hello"), None, disk.clone()).await?;

        harness
            .orchestrator
            .submit(&mut harness.store, "hello", None)
            .await?;
        disk.fail_writes(true);

        let mut res = Ok(());
        while harness.orchestrator.state() != ChatState::Idle {
            let event = next_event(&mut harness).await?;
            res = harness
                .orchestrator
                .handle_event(&mut harness.store, &event)
                .await;
        }

        assert!(res.is_err());
        assert!(harness.orchestrator.active_message_id().is_none());

        disk.fail_writes(false);
        let accepted = harness
            .orchestrator
            .submit(&mut harness.store, "still there?", None)
            .await?;
        assert!(accepted);

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_settles_when_the_apology_cannot_be_saved() -> Result<()> {
        let disk = Arc::new(BrokenDisk::default());
        let mut harness = harness_with_storage(FakeBackend::failing(), None, disk.clone()).await?;

        harness
            .orchestrator
            .submit(&mut harness.store, "hello", None)
            .await?;
        disk.fail_writes(true);

        let event = next_event(&mut harness).await?;
        let res = harness
            .orchestrator
            .handle_event(&mut harness.store, &event)
            .await;

        assert!(res.is_err());
        assert_eq!(harness.orchestrator.state(), ChatState::Idle);

        return Ok(());
    }
}
