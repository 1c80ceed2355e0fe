#![cfg(test)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;
use tempfile::TempDir;
use ticket_bot::{
    base::{
        config::{Config, ConfigInner},
        types::{
            ACK_EMOJI, Accent, ButtonStyle, Category, ChannelCheck, ChatUser, Destination, InboundMessage, InteractionEvent, InteractionKind, InteractionRef, InteractionReply,
            MessageRef, OutboundMessage, Res, TicketStatus, Void,
        },
    },
    interaction::{
        close_ticket::{close_ticket, closure_message},
        create_ticket::create_ticket,
        ticket_command::show_category_prompt,
    },
    ledger::DedupLedger,
    registry::TicketRegistry,
    relay::{relay_copy, relay_message},
    runtime::{Runtime, dedup_capacity},
    service::{
        chat::{ChatClient, GenericChatClient},
        store::TicketStore,
    },
};

// Constants.

const BOT_ID: u64 = 999;
const GUILD_ID: u64 = 1;
const STAFF_ROLE: u64 = 77;
const TICKET_CHANNEL: u64 = 500;
const THREAD_ID: u64 = 600;
const OWNER_ID: u64 = 10;
const STAFF_ID: u64 = 20;

// Mocks.

// Mock chat client for testing.

mock! {
    pub Chat {}

    #[async_trait]
    impl GenericChatClient for Chat {
        fn bot_user_id(&self) -> u64;
        async fn start(&self) -> Void;
        async fn check_ticket_channel(&self, channel_id: u64) -> Res<ChannelCheck>;
        async fn create_private_thread(&self, channel_id: u64, name: &str) -> Res<u64>;
        async fn send_message(&self, destination: &Destination, message: &OutboundMessage) -> Res<MessageRef>;
        async fn react_to_message(&self, message: &MessageRef, emoji: &str) -> Void;
        async fn archive_thread(&self, thread_id: u64) -> Void;
        async fn guild_has_role(&self, guild_id: u64, role_id: u64) -> Res<bool>;
        async fn reply(&self, interaction: &InteractionRef, reply: &InteractionReply) -> Void;
        async fn defer_update(&self, interaction: &InteractionRef) -> Void;
        async fn follow_up(&self, interaction: &InteractionRef, reply: &InteractionReply) -> Void;
    }
}

/// Everything the mocked chat client was asked to do.
#[derive(Clone, Default)]
struct Outbox {
    threads: Arc<Mutex<Vec<String>>>,
    sent: Arc<Mutex<Vec<(Destination, OutboundMessage)>>>,
    reactions: Arc<Mutex<Vec<MessageRef>>>,
    archived: Arc<Mutex<Vec<u64>>>,
    replies: Arc<Mutex<Vec<InteractionReply>>>,
    follow_ups: Arc<Mutex<Vec<InteractionReply>>>,
    defers: Arc<Mutex<usize>>,
}

impl Outbox {
    fn sent(&self) -> Vec<(Destination, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }

    fn sent_to(&self, destination: Destination) -> Vec<OutboundMessage> {
        self.sent().into_iter().filter(|(d, _)| *d == destination).map(|(_, m)| m).collect()
    }

    fn reactions(&self) -> Vec<MessageRef> {
        self.reactions.lock().unwrap().clone()
    }

    fn replies(&self) -> Vec<InteractionReply> {
        self.replies.lock().unwrap().clone()
    }

    fn follow_ups(&self) -> Vec<InteractionReply> {
        self.follow_ups.lock().unwrap().clone()
    }
}

/// How the mocked platform behaves.
struct Platform {
    check: ChannelCheck,
    thread_fails: bool,
    /// Number of direct messages that fail before deliveries succeed.
    dm_failures: usize,
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            check: ChannelCheck::Ready { guild_id: GUILD_ID },
            thread_fails: false,
            dm_failures: 0,
        }
    }
}

fn get_mock_chat(outbox: &Outbox, platform: Platform) -> MockChat {
    let mut mock = MockChat::new();

    mock.expect_bot_user_id().return_const(BOT_ID);
    mock.expect_start().returning(|| Ok(()));

    let check = platform.check;
    mock.expect_check_ticket_channel().returning(move |_| Ok(check));

    let threads = outbox.threads.clone();
    let thread_fails = platform.thread_fails;
    mock.expect_create_private_thread().returning(move |_, name| {
        if thread_fails {
            return Err(anyhow::anyhow!("Missing Access"));
        }
        threads.lock().unwrap().push(name.to_string());
        Ok(THREAD_ID)
    });

    let sent = outbox.sent.clone();
    let dm_failures = Arc::new(Mutex::new(platform.dm_failures));
    mock.expect_send_message().returning(move |destination, message| {
        if let Destination::User(_) = destination {
            let mut remaining = dm_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(anyhow::anyhow!("Cannot send messages to this user"));
            }
        }

        let mut sent = sent.lock().unwrap();
        sent.push((*destination, message.clone()));
        let channel_id = match destination {
            Destination::User(id) => 10_000 + id,
            Destination::Channel(id) => *id,
        };
        Ok(MessageRef {
            channel_id,
            message_id: 50_000 + sent.len() as u64,
        })
    });

    let reactions = outbox.reactions.clone();
    mock.expect_react_to_message().returning(move |message, emoji| {
        assert_eq!(emoji, ACK_EMOJI);
        reactions.lock().unwrap().push(*message);
        Ok(())
    });

    let archived = outbox.archived.clone();
    mock.expect_archive_thread().returning(move |thread_id| {
        archived.lock().unwrap().push(thread_id);
        Ok(())
    });

    mock.expect_guild_has_role().returning(|guild_id, role_id| Ok(guild_id == GUILD_ID && role_id == STAFF_ROLE));

    let replies = outbox.replies.clone();
    mock.expect_reply().returning(move |_, reply| {
        replies.lock().unwrap().push(reply.clone());
        Ok(())
    });

    let defers = outbox.defers.clone();
    mock.expect_defer_update().returning(move |_| {
        *defers.lock().unwrap() += 1;
        Ok(())
    });

    let follow_ups = outbox.follow_ups.clone();
    mock.expect_follow_up().returning(move |_, reply| {
        follow_ups.lock().unwrap().push(reply.clone());
        Ok(())
    });

    mock
}

// Helpers.

/// Helper function to setup the test environment.
async fn setup_test_environment(dir: &TempDir, outbox: &Outbox, platform: Platform) -> Runtime {
    let config = Config::from(ConfigInner {
        bot_token: "test-token".to_string(),
        channel_id: TICKET_CHANNEL,
        staff_role_id: STAFF_ROLE,
        tickets_path: dir.path().join("tickets.json"),
        ..Default::default()
    });

    let registry = TicketRegistry::load(TicketStore::json(config.tickets_path.clone())).await;
    let ledger = DedupLedger::new(dedup_capacity(&config).unwrap());

    // We create a mocked version of the chat client that records every call.
    let chat = ChatClient::new(Arc::new(get_mock_chat(outbox, platform)));

    Runtime { config, registry, ledger, chat }
}

fn user(id: u64, name: &str) -> ChatUser {
    ChatUser {
        id,
        name: name.to_string(),
        avatar_url: Some(format!("https://cdn.example/avatars/{id}.png")),
        is_bot: false,
    }
}

fn button(user: ChatUser, custom_id: &str, channel_id: u64, in_thread: bool, roles: Vec<u64>) -> InteractionEvent {
    InteractionEvent {
        reference: InteractionRef {
            id: 1,
            token: "interaction-token".to_string(),
        },
        user,
        guild_id: Some(GUILD_ID),
        channel_id,
        in_thread,
        member_role_ids: roles,
        kind: InteractionKind::Button(custom_id.to_string()),
    }
}

fn thread_message(author: ChatUser, roles: Vec<u64>, message_id: u64, content: &str) -> InboundMessage {
    InboundMessage {
        reference: MessageRef { channel_id: THREAD_ID, message_id },
        author,
        guild_id: Some(GUILD_ID),
        author_role_ids: roles,
        content: content.to_string(),
        attachments: Vec::new(),
        timestamp: Utc::now(),
    }
}

fn direct_message(author: ChatUser, message_id: u64, content: &str) -> InboundMessage {
    InboundMessage {
        reference: MessageRef { channel_id: 10_000 + author.id, message_id },
        author,
        guild_id: None,
        author_role_ids: Vec::new(),
        content: content.to_string(),
        attachments: Vec::new(),
        timestamp: Utc::now(),
    }
}

fn read_store(dir: &TempDir) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(dir.path().join("tickets.json")).unwrap()).unwrap()
}

fn failure_text(reply: &InteractionReply) -> String {
    reply.card.as_ref().and_then(|c| c.description.clone()).unwrap_or_default()
}

// Tests.

#[tokio::test]
async fn test_ticket_command_shows_categories() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;

    let mut event = button(user(OWNER_ID, "alice"), "", 0, false, Vec::new());
    event.kind = InteractionKind::Command("ticket".to_string());

    show_category_prompt(&event, &runtime).await.unwrap();

    let replies = outbox.replies();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].ephemeral);
    let labels: Vec<_> = replies[0].buttons.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["Technical Support", "HWID Reset", "Selling"]);
}

#[tokio::test]
async fn test_create_ticket_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;

    let event = button(user(OWNER_ID, "alice"), "create_ticket_Technical Support", 0, false, Vec::new());
    let ticket = create_ticket(&event, "Technical Support", &runtime).await.unwrap().unwrap();

    // Thread and registry.

    assert_eq!(*outbox.threads.lock().unwrap(), vec!["Technical Support - alice".to_string()]);
    assert_eq!(*outbox.defers.lock().unwrap(), 1);
    assert_eq!(ticket.thread_id, THREAD_ID);
    assert_eq!(runtime.registry.find_by_thread(THREAD_ID).await, Some(ticket.clone()));

    let store = read_store(&dir);
    assert_eq!(
        store[&ticket.id],
        serde_json::json!({
            "userId": OWNER_ID.to_string(),
            "threadId": THREAD_ID.to_string(),
            "category": "Technical Support",
            "status": "open",
        })
    );

    // Thread announcements.

    let in_thread = outbox.sent_to(Destination::Channel(THREAD_ID));
    assert_eq!(in_thread.len(), 2);
    assert_eq!(in_thread[0].card.as_ref().unwrap().title.as_deref(), Some("New Ticket"));
    assert_eq!(in_thread[0].buttons[0].custom_id, "close_ticket");
    assert_eq!(in_thread[0].buttons[0].style, ButtonStyle::Danger);
    assert_eq!(
        in_thread[1].content.as_deref(),
        Some("<@&77> A new ticket has been created and requires your attention.")
    );

    // User confirmation.

    let dms = outbox.sent_to(Destination::User(OWNER_ID));
    assert_eq!(dms.len(), 1);
    assert_eq!(dms[0].card.as_ref().unwrap().title.as_deref(), Some("Ticket Created"));

    let follow_ups = outbox.follow_ups();
    assert_eq!(follow_ups.len(), 1);
    assert_eq!(follow_ups[0].content.as_deref(), Some("Ticket created successfully! Please check your DMs."));
    assert!(follow_ups[0].ephemeral);

    // The opening message and the confirmation are both acknowledged.
    assert_eq!(outbox.reactions().len(), 2);
}

#[tokio::test]
async fn test_create_ticket_reports_thread_failure() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(
        &dir,
        &outbox,
        Platform {
            thread_fails: true,
            ..Default::default()
        },
    )
    .await;

    let event = button(user(OWNER_ID, "alice"), "create_ticket_Selling", 0, false, Vec::new());

    assert!(create_ticket(&event, "Selling", &runtime).await.is_err());

    let follow_ups = outbox.follow_ups();
    assert_eq!(follow_ups.len(), 1);
    assert!(follow_ups[0].ephemeral);
    assert!(failure_text(&follow_ups[0]).contains("Unable to create the ticket thread"));
    assert!(runtime.registry.is_empty().await);
    assert!(outbox.sent().is_empty());
}

#[tokio::test]
async fn test_create_ticket_rejects_unusable_channels() {
    for (check, expected) in [
        (ChannelCheck::NotText, "not a text channel"),
        (ChannelCheck::MissingPermissions, "necessary permissions"),
    ] {
        let dir = tempfile::tempdir().unwrap();
        let outbox = Outbox::default();
        let runtime = setup_test_environment(&dir, &outbox, Platform { check, ..Default::default() }).await;

        let event = button(user(OWNER_ID, "alice"), "create_ticket_HWID Reset", 0, false, Vec::new());

        assert_eq!(create_ticket(&event, "HWID Reset", &runtime).await.unwrap(), None);
        assert!(outbox.threads.lock().unwrap().is_empty());
        assert!(failure_text(&outbox.follow_ups()[0]).contains(expected));
        assert!(runtime.registry.is_empty().await);
    }
}

#[tokio::test]
async fn test_create_ticket_rejects_unknown_category() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;

    let event = button(user(OWNER_ID, "alice"), "create_ticket_Refunds", 0, false, Vec::new());

    assert_eq!(create_ticket(&event, "Refunds", &runtime).await.unwrap(), None);
    assert_eq!(*outbox.defers.lock().unwrap(), 0);
    assert!(failure_text(&outbox.replies()[0]).contains("Unknown ticket category"));
}

#[tokio::test]
async fn test_staff_message_is_relayed_to_owner() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;

    runtime.registry.create(OWNER_ID, THREAD_ID, Category::TechnicalSupport).await.unwrap();

    let message = thread_message(user(STAFF_ID, "staffer"), vec![STAFF_ROLE], 700, "hello");
    let relayed = relay_message(&runtime, &message).await.unwrap().unwrap();

    let sent = outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, Destination::User(OWNER_ID));

    let card = sent[0].1.card.clone().unwrap();
    assert_eq!(card.author.unwrap().name, "staffer");
    assert_eq!(card.description.as_deref(), Some("hello"));
    assert_eq!(card.accent, Accent::ToUser);
    assert!(card.timestamp.is_some());

    // Both the copy and the original are acknowledged.
    assert_eq!(outbox.reactions(), vec![relayed, message.reference]);
}

#[tokio::test]
async fn test_duplicate_relay_is_suppressed() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;

    runtime.registry.create(OWNER_ID, THREAD_ID, Category::TechnicalSupport).await.unwrap();

    let first = thread_message(user(STAFF_ID, "staffer"), vec![STAFF_ROLE], 700, "hello");
    let second = thread_message(user(STAFF_ID, "staffer"), vec![STAFF_ROLE], 701, "hello");

    assert!(relay_message(&runtime, &first).await.unwrap().is_some());
    assert!(relay_message(&runtime, &second).await.unwrap().is_none());

    assert_eq!(outbox.sent().len(), 1);
    assert_eq!(outbox.reactions().len(), 2);
}

#[tokio::test]
async fn test_non_staff_and_bot_thread_messages_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;

    runtime.registry.create(OWNER_ID, THREAD_ID, Category::TechnicalSupport).await.unwrap();

    let member = thread_message(user(30, "bystander"), vec![5], 700, "hi");
    let mut bot = thread_message(user(BOT_ID, "ticket-bot"), vec![STAFF_ROLE], 701, "hi");
    bot.author.is_bot = true;
    let untracked = InboundMessage {
        reference: MessageRef { channel_id: 12345, message_id: 702 },
        ..thread_message(user(STAFF_ID, "staffer"), vec![STAFF_ROLE], 702, "hi")
    };

    for message in [member, bot, untracked] {
        assert!(relay_message(&runtime, &message).await.unwrap().is_none());
    }

    assert!(outbox.sent().is_empty());
    assert!(outbox.reactions().is_empty());
}

#[tokio::test]
async fn test_owner_direct_message_is_relayed_to_thread() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;

    runtime.registry.create(OWNER_ID, THREAD_ID, Category::HwidReset).await.unwrap();

    let message = direct_message(user(OWNER_ID, "alice"), 800, "my key stopped working");
    relay_message(&runtime, &message).await.unwrap().unwrap();

    let to_thread = outbox.sent_to(Destination::Channel(THREAD_ID));
    assert_eq!(to_thread.len(), 1);
    let card = to_thread[0].card.clone().unwrap();
    assert_eq!(card.description.as_deref(), Some("my key stopped working"));
    assert_eq!(card.accent, Accent::ToThread);

    // Strangers without a ticket are not relayed.
    let stranger = direct_message(user(31, "mallory"), 801, "hello?");
    assert!(relay_message(&runtime, &stranger).await.unwrap().is_none());
    assert_eq!(outbox.sent().len(), 1);
}

#[tokio::test]
async fn test_closed_ticket_relays_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;

    let ticket = runtime.registry.create(OWNER_ID, THREAD_ID, Category::Selling).await.unwrap();
    runtime.registry.close(&ticket.id).await.unwrap();

    let from_staff = thread_message(user(STAFF_ID, "staffer"), vec![STAFF_ROLE], 700, "still there?");
    let from_owner = direct_message(user(OWNER_ID, "alice"), 701, "yes");

    assert!(relay_message(&runtime, &from_staff).await.unwrap().is_none());
    assert!(relay_message(&runtime, &from_owner).await.unwrap().is_none());
    assert!(outbox.sent().is_empty());
}

#[tokio::test]
async fn test_close_ticket_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;

    let ticket = runtime.registry.create(OWNER_ID, THREAD_ID, Category::TechnicalSupport).await.unwrap();
    let event = button(user(STAFF_ID, "staffer"), "close_ticket", THREAD_ID, true, vec![STAFF_ROLE]);

    let closed = close_ticket(&event, &runtime).await.unwrap().unwrap();
    assert_eq!(closed.status, TicketStatus::Closed);
    assert_eq!(runtime.registry.get(&ticket.id).await.unwrap().status, TicketStatus::Closed);
    assert_eq!(read_store(&dir)[&ticket.id]["status"], "closed");

    let replies = outbox.replies();
    assert_eq!(replies.len(), 1);
    assert!(!replies[0].ephemeral);
    assert_eq!(replies[0].card.as_ref().unwrap().title.as_deref(), Some("Ticket Closed"));

    let dms = outbox.sent_to(Destination::User(OWNER_ID));
    assert_eq!(dms.len(), 1);
    assert!(dms[0].card.as_ref().unwrap().description.as_deref().unwrap().contains("Technical Support"));
    assert_eq!(*outbox.archived.lock().unwrap(), vec![THREAD_ID]);

    // A second press changes nothing and notifies nobody.

    assert_eq!(close_ticket(&event, &runtime).await.unwrap(), None);
    assert!(failure_text(&outbox.replies()[1]).contains("already been closed"));
    assert_eq!(outbox.sent_to(Destination::User(OWNER_ID)).len(), 1);
    assert_eq!(outbox.archived.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_close_ticket_refusals() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;

    let ticket = runtime.registry.create(OWNER_ID, THREAD_ID, Category::TechnicalSupport).await.unwrap();

    let outside_thread = button(user(STAFF_ID, "staffer"), "close_ticket", TICKET_CHANNEL, false, vec![STAFF_ROLE]);
    let untracked_thread = button(user(STAFF_ID, "staffer"), "close_ticket", 4242, true, vec![STAFF_ROLE]);
    let not_staff = button(user(OWNER_ID, "alice"), "close_ticket", THREAD_ID, true, Vec::new());

    for event in [outside_thread, untracked_thread, not_staff] {
        assert_eq!(close_ticket(&event, &runtime).await.unwrap(), None);
    }

    let reasons: Vec<_> = outbox.replies().iter().map(failure_text).collect();
    assert!(reasons[0].contains("only be used in a ticket thread"));
    assert!(reasons[1].contains("not associated with a ticket"));
    assert!(reasons[2].contains("Only staff"));

    assert!(runtime.registry.get(&ticket.id).await.unwrap().is_open());
    assert!(outbox.sent().is_empty());
    assert!(outbox.archived.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_store_starts_empty_and_serves() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tickets.json"), "{ this is not json").unwrap();

    let outbox = Outbox::default();
    let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;

    assert!(runtime.registry.is_empty().await);

    let event = button(user(OWNER_ID, "alice"), "create_ticket_Selling", 0, false, Vec::new());
    let ticket = create_ticket(&event, "Selling", &runtime).await.unwrap().unwrap();

    assert_eq!(runtime.registry.len().await, 1);
    assert_eq!(read_store(&dir)[&ticket.id]["category"], "Selling");
}

#[tokio::test]
async fn test_tickets_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    let ticket = {
        let outbox = Outbox::default();
        let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;
        runtime.registry.create(OWNER_ID, THREAD_ID, Category::HwidReset).await.unwrap()
    };

    let outbox = Outbox::default();
    let runtime = setup_test_environment(&dir, &outbox, Platform::default()).await;

    assert_eq!(runtime.registry.find_by_thread(THREAD_ID).await, Some(ticket));
}

#[tokio::test]
async fn test_create_ticket_survives_failed_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(
        &dir,
        &outbox,
        Platform {
            dm_failures: usize::MAX,
            ..Default::default()
        },
    )
    .await;

    let event = button(user(OWNER_ID, "alice"), "create_ticket_Technical Support", 0, false, Vec::new());
    let ticket = create_ticket(&event, "Technical Support", &runtime).await.unwrap().unwrap();

    assert!(runtime.registry.get(&ticket.id).await.unwrap().is_open());
    assert_eq!(outbox.threads.lock().unwrap().len(), 1);
    assert!(outbox.sent_to(Destination::User(OWNER_ID)).is_empty());

    // Staff still see the ticket in its thread.
    assert_eq!(outbox.sent_to(Destination::Channel(THREAD_ID)).len(), 2);

    let follow_ups = outbox.follow_ups();
    assert_eq!(follow_ups.len(), 1);
    assert!(follow_ups[0].card.is_none());
    assert!(follow_ups[0].content.as_deref().unwrap().contains("could not send you a DM"));
}

#[tokio::test]
async fn test_close_ticket_archives_when_owner_dm_fails() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(
        &dir,
        &outbox,
        Platform {
            dm_failures: usize::MAX,
            ..Default::default()
        },
    )
    .await;

    let ticket = runtime.registry.create(OWNER_ID, THREAD_ID, Category::TechnicalSupport).await.unwrap();
    let event = button(user(STAFF_ID, "staffer"), "close_ticket", THREAD_ID, true, vec![STAFF_ROLE]);

    let closed = close_ticket(&event, &runtime).await.unwrap().unwrap();

    assert_eq!(closed.id, ticket.id);
    assert_eq!(runtime.registry.get(&ticket.id).await.unwrap().status, TicketStatus::Closed);
    assert_eq!(*outbox.archived.lock().unwrap(), vec![THREAD_ID]);
    assert!(outbox.sent().is_empty());
    assert!(outbox.follow_ups().is_empty());

    // The closure DM can be sent again later; it was not recorded as delivered.
    let fingerprint = DedupLedger::fingerprint(&Destination::User(OWNER_ID), &closure_message(&closed)).unwrap();
    assert!(!runtime.ledger.contains(&fingerprint));
}

#[tokio::test]
async fn test_failed_relay_is_delivered_on_retry() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let runtime = setup_test_environment(
        &dir,
        &outbox,
        Platform {
            dm_failures: 1,
            ..Default::default()
        },
    )
    .await;

    runtime.registry.create(OWNER_ID, THREAD_ID, Category::TechnicalSupport).await.unwrap();

    let message = thread_message(user(STAFF_ID, "staffer"), vec![STAFF_ROLE], 700, "hello");
    let fingerprint = DedupLedger::fingerprint(&Destination::User(OWNER_ID), &relay_copy(&message, Accent::ToUser)).unwrap();

    // The first attempt fails and leaves nothing behind.

    assert!(relay_message(&runtime, &message).await.is_err());
    assert!(!runtime.ledger.contains(&fingerprint));
    assert!(runtime.ledger.is_empty());
    assert!(outbox.sent().is_empty());
    assert!(outbox.reactions().is_empty());

    // The retry goes through and is then remembered.

    let relayed = relay_message(&runtime, &message).await.unwrap().unwrap();

    assert!(runtime.ledger.contains(&fingerprint));
    assert_eq!(outbox.sent_to(Destination::User(OWNER_ID)).len(), 1);
    assert_eq!(outbox.reactions(), vec![relayed, message.reference]);
}
