mod common;

use std::io::Write;
use std::sync::Arc;

use bistro_conversation::domain::model::{
    ConversationDomainConfig, ConversationFilter, ConversationStatus, IncomingReport, LoadReport,
    MessageType, NewMessage, SenderType,
};
use bistro_conversation::domain::service::ConversationDomainService;
use bistro_core::{SessionIdentity, SyncError};
use tokio_test::{assert_err, assert_ok};

use common::{FakeGateway, at, conversation, message};

fn identity() -> SessionIdentity {
    SessionIdentity::new("manager-1", "ADMIN")
}

fn service_with(
    gateway: Arc<FakeGateway>,
    config: ConversationDomainConfig,
) -> ConversationDomainService {
    ConversationDomainService::new(identity(), gateway, config)
}

async fn loaded(gateway: Arc<FakeGateway>) -> ConversationDomainService {
    let service = service_with(gateway, ConversationDomainConfig::default());
    assert_eq!(service.load_conversations().await.unwrap(), LoadReport::Applied);
    service
}

fn three_unread() -> Arc<FakeGateway> {
    let gateway = Arc::new(FakeGateway::new(vec![
        conversation("c1", ConversationStatus::Active, 3, Some(3)),
        conversation("c2", ConversationStatus::Closed, 0, Some(1)),
    ]));
    gateway.set_messages(
        "c1",
        vec![
            message("m1", "c1", SenderType::Client, false, 1),
            message("m2", "c1", SenderType::Client, false, 2),
            message("m3", "c1", SenderType::Client, false, 3),
        ],
    );
    gateway
}

#[tokio::test]
async fn test_mark_as_read_clears_unread_and_messages() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;
    service.open_conversation("c1").await.unwrap();
    assert_eq!(service.conversation("c1").await.unwrap().unread_count, 3);

    assert_ok!(service.mark_as_read("c1").await);

    assert_eq!(service.conversation("c1").await.unwrap().unread_count, 0);
    let messages = service.messages("c1").await.unwrap();
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m.is_read));
    assert_eq!(gateway.calls(), vec!["read:c1"]);

    // 再次标记为幂等，不再调用后端
    assert_ok!(service.mark_as_read("c1").await);
    assert_eq!(gateway.calls().len(), 1);
}

#[tokio::test]
async fn test_mark_as_read_without_loaded_messages() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;

    service.mark_as_read("c1").await.unwrap();
    assert_eq!(service.conversation("c1").await.unwrap().unread_count, 0);
    assert!(service.messages("c1").await.is_none());
}

#[tokio::test]
async fn test_archiving_closed_conversation_is_rejected() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;

    let err = assert_err!(service.archive("c2").await);
    assert_eq!(
        err,
        SyncError::InvalidTransition {
            from: "CLOSED".to_string(),
            to: "ARCHIVED".to_string()
        }
    );
    assert_eq!(
        service.conversation("c2").await.unwrap().status,
        ConversationStatus::Closed
    );
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_status_transitions_are_one_way() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;

    service.archive("c1").await.unwrap();
    assert_eq!(
        service.conversation("c1").await.unwrap().status,
        ConversationStatus::Archived
    );
    assert!(matches!(
        service.close("c1").await,
        Err(SyncError::InvalidTransition { .. })
    ));
    assert!(matches!(
        service.archive("missing").await,
        Err(SyncError::NotFound { .. })
    ));
    assert_eq!(gateway.calls(), vec!["archive:c1"]);
}

#[tokio::test]
async fn test_failed_mutations_roll_back() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;
    service.open_conversation("c1").await.unwrap();
    gateway.fail_mutations(true);

    let err = service.close("c1").await.unwrap_err();
    assert!(matches!(err, SyncError::Mutation { ref operation, .. } if operation == "close"));
    assert_eq!(
        service.conversation("c1").await.unwrap().status,
        ConversationStatus::Active
    );

    assert!(service.mark_as_read("c1").await.is_err());
    assert_eq!(service.conversation("c1").await.unwrap().unread_count, 3);
    assert!(
        service
            .messages("c1")
            .await
            .unwrap()
            .iter()
            .all(|m| !m.is_read)
    );

    let snapshot = service.snapshot(&ConversationFilter::default()).await;
    assert_eq!(snapshot.status.pending_mutations, 0);
    assert!(snapshot.status.last_error.is_some());
}

#[tokio::test]
async fn test_failure_without_rollback_keeps_optimistic_status() {
    let gateway = three_unread();
    let config = ConversationDomainConfig {
        rollback_on_failure: false,
        ..ConversationDomainConfig::default()
    };
    let service = service_with(gateway.clone(), config);
    service.load_conversations().await.unwrap();
    gateway.fail_mutations(true);

    assert!(service.archive("c1").await.is_err());
    assert_eq!(
        service.conversation("c1").await.unwrap().status,
        ConversationStatus::Archived
    );

    // 手动重新加载恢复服务端状态
    service.load_conversations().await.unwrap();
    assert_eq!(
        service.conversation("c1").await.unwrap().status,
        ConversationStatus::Active
    );
}

#[tokio::test]
async fn test_send_message_keeps_preview_and_cache_consistent() {
    let gateway = Arc::new(FakeGateway::new(vec![
        conversation("c1", ConversationStatus::Active, 0, Some(1)),
        conversation("c2", ConversationStatus::Active, 0, Some(5)),
    ]));
    gateway.set_messages("c1", vec![message("m1", "c1", SenderType::Client, true, 1)]);
    let service = loaded(gateway.clone()).await;
    service.open_conversation("c1").await.unwrap();

    let sent = service
        .send_new_message("c1", NewMessage::text("Your table is ready"))
        .await
        .unwrap();
    assert!(sent.attachment.is_none());

    let messages = service.messages("c1").await.unwrap();
    let newest = messages.last().unwrap();
    assert_eq!(newest.id, sent.message.id);

    let c1 = service.conversation("c1").await.unwrap();
    assert_eq!(c1.last_message.as_deref(), Some("Your table is ready"));
    assert_eq!(c1.last_message_at, Some(newest.created_at));

    let snapshot = service.snapshot(&ConversationFilter::default()).await;
    assert_eq!(snapshot.conversations[0].id, "c1");
    assert_eq!(snapshot.stats.total_messages, 2);
}

#[tokio::test]
async fn test_send_into_inactive_conversation_is_rejected() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;

    assert!(matches!(
        service.send_new_message("c2", NewMessage::text("hello")).await,
        Err(SyncError::Mutation { .. })
    ));
    assert!(matches!(
        service.send_new_message("c1", NewMessage::text("   ")).await,
        Err(SyncError::Mutation { .. })
    ));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_send_image_attachment() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;

    let mut file = tempfile::Builder::new()
        .prefix("dish")
        .suffix(".jpg")
        .tempfile()
        .unwrap();
    file.write_all(&[0xFF, 0xD8, 0xFF]).unwrap();

    let sent = service
        .send_new_message("c1", NewMessage::default().with_attachment(file.path()))
        .await
        .unwrap();

    let preview = sent.attachment.unwrap();
    assert_eq!(preview.mime_type, "image/jpeg");
    assert_eq!(preview.data_url.as_deref(), Some("data:image/jpeg;base64,/9j/"));
    assert_eq!(sent.message.message_type, MessageType::Image);

    let outgoing = gateway.outgoing();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].attachment.as_ref().unwrap().bytes, vec![0xFF, 0xD8, 0xFF]);

    // 消息未加载时只更新预览
    let c1 = service.conversation("c1").await.unwrap();
    assert_eq!(c1.last_message, sent.message.file_name);
    assert_eq!(c1.last_message_at, Some(sent.message.created_at));
}

#[tokio::test]
async fn test_oversized_attachment_is_rejected_before_sending() {
    let gateway = three_unread();
    let config = ConversationDomainConfig {
        max_attachment_bytes: 8,
        ..ConversationDomainConfig::default()
    };
    let service = service_with(gateway.clone(), config);
    service.load_conversations().await.unwrap();

    let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
    file.write_all(&[0u8; 32]).unwrap();

    assert!(matches!(
        service
            .send_new_message("c1", NewMessage::text("invoice").with_attachment(file.path()))
            .await,
        Err(SyncError::Attachment(_))
    ));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_incoming_messages_for_unopened_conversation() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;

    let incoming = message("p1", "c1", SenderType::Client, false, 10);
    assert_eq!(
        service.apply_incoming_message(incoming.clone()).await.unwrap(),
        IncomingReport::Applied { unread_count: 4 }
    );
    assert_eq!(
        service.apply_incoming_message(incoming).await.unwrap(),
        IncomingReport::Duplicate
    );
    assert_eq!(
        service
            .apply_incoming_message(message("p2", "c1", SenderType::Backoffice, true, 11))
            .await
            .unwrap(),
        IncomingReport::Applied { unread_count: 4 }
    );
    assert_eq!(
        service
            .apply_incoming_message(message("p3", "nope", SenderType::Client, false, 12))
            .await
            .unwrap(),
        IncomingReport::UnknownConversation
    );

    let c1 = service.conversation("c1").await.unwrap();
    assert_eq!(c1.last_message.as_deref(), Some("text p2"));
    assert_eq!(c1.last_message_at, Some(at(11)));
}

#[tokio::test]
async fn test_incoming_without_optimistic_count() {
    let gateway = three_unread();
    let config = ConversationDomainConfig {
        count_incoming_as_unread: false,
        ..ConversationDomainConfig::default()
    };
    let service = service_with(gateway, config);
    service.load_conversations().await.unwrap();

    let report = service
        .apply_incoming_message(message("p1", "c1", SenderType::Client, false, 10))
        .await
        .unwrap();
    assert_eq!(report, IncomingReport::Applied { unread_count: 3 });
    assert_eq!(
        service.conversation("c1").await.unwrap().last_message_at,
        Some(at(10))
    );
}

#[tokio::test]
async fn test_incoming_for_loaded_conversation_is_derived_from_cache() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;
    service.open_conversation("c1").await.unwrap();
    service.mark_as_read("c1").await.unwrap();

    let report = service
        .apply_incoming_message(message("p1", "c1", SenderType::Client, false, 10))
        .await
        .unwrap();
    assert_eq!(report, IncomingReport::Applied { unread_count: 1 });

    let messages = service.messages("c1").await.unwrap();
    assert_eq!(messages.last().unwrap().id, "p1");
    assert_eq!(
        service.stats().await.unread_messages,
        messages.iter().filter(|m| m.counts_as_unread()).count() as u64
    );
}

#[tokio::test]
async fn test_incoming_older_message_keeps_preview_on_newest() {
    let gateway = Arc::new(FakeGateway::new(vec![conversation(
        "c1",
        ConversationStatus::Active,
        0,
        Some(5),
    )]));
    gateway.set_messages(
        "c1",
        vec![
            message("m1", "c1", SenderType::Client, true, 1),
            message("m5", "c1", SenderType::Backoffice, true, 5),
        ],
    );
    let service = loaded(gateway).await;
    service.open_conversation("c1").await.unwrap();

    let report = service
        .apply_incoming_message(message("p3", "c1", SenderType::Client, false, 3))
        .await
        .unwrap();
    assert_eq!(report, IncomingReport::Applied { unread_count: 1 });

    let messages = service.messages("c1").await.unwrap();
    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "p3", "m5"]);

    let c1 = service.conversation("c1").await.unwrap();
    let newest = messages.last().unwrap();
    assert_eq!(c1.last_message_at, Some(newest.created_at));
    assert_eq!(c1.last_message, Some(newest.preview_text()));
    assert_eq!(service.stats().await.unread_messages, 1);
}

#[tokio::test]
async fn test_send_without_loaded_messages_updates_preview_only() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;

    let sent = service
        .send_new_message("c1", NewMessage::text("On our way"))
        .await
        .unwrap();

    assert!(service.messages("c1").await.is_none());
    let c1 = service.conversation("c1").await.unwrap();
    assert_eq!(c1.last_message.as_deref(), Some("On our way"));
    assert_eq!(c1.last_message_at, Some(sent.message.created_at));
    assert_eq!(c1.unread_count, 3);

    let mut server_messages = vec![
        message("m1", "c1", SenderType::Client, false, 1),
        message("m2", "c1", SenderType::Client, false, 2),
        message("m3", "c1", SenderType::Client, false, 3),
    ];
    server_messages.push(sent.message.clone());
    gateway.set_messages("c1", server_messages);
    assert_eq!(
        service.open_conversation("c1").await.unwrap(),
        LoadReport::Applied
    );

    let messages = service.messages("c1").await.unwrap();
    assert_eq!(messages.last().unwrap().id, sent.message.id);
    let c1 = service.conversation("c1").await.unwrap();
    assert_eq!(c1.last_message.as_deref(), Some("On our way"));
    assert_eq!(c1.last_message_at, Some(sent.message.created_at));
    assert_eq!(c1.unread_count, 3);
    assert_eq!(
        service.apply_incoming_message(sent.message).await.unwrap(),
        IncomingReport::Duplicate
    );
}

#[tokio::test]
async fn test_mark_as_read_flips_unread_backoffice_messages() {
    let gateway = Arc::new(FakeGateway::new(vec![conversation(
        "c1",
        ConversationStatus::Active,
        0,
        Some(2),
    )]));
    gateway.set_messages(
        "c1",
        vec![
            message("m1", "c1", SenderType::Client, true, 1),
            message("m2", "c1", SenderType::Backoffice, false, 2),
        ],
    );
    let service = loaded(gateway.clone()).await;
    service.open_conversation("c1").await.unwrap();
    assert_eq!(service.conversation("c1").await.unwrap().unread_count, 1);

    assert_ok!(service.mark_as_read("c1").await);

    assert_eq!(service.conversation("c1").await.unwrap().unread_count, 0);
    assert!(
        service
            .messages("c1")
            .await
            .unwrap()
            .iter()
            .all(|m| m.is_read)
    );
    assert_eq!(gateway.calls(), vec!["read:c1"]);
}

#[tokio::test]
async fn test_failed_mark_read_after_list_reload_keeps_server_count() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;
    gateway.fail_mutations(true);

    let release = gateway.gate_mutations();
    let (marked, reloaded) = tokio::join!(service.mark_as_read("c1"), async {
        let report = service.load_conversations().await;
        let _ = release.send(());
        report
    });

    assert_eq!(reloaded.unwrap(), LoadReport::Applied);
    assert!(matches!(marked, Err(SyncError::Mutation { .. })));
    assert_eq!(service.conversation("c1").await.unwrap().unread_count, 3);
    let snapshot = service.snapshot(&ConversationFilter::default()).await;
    assert_eq!(snapshot.status.pending_mutations, 0);
    assert_eq!(snapshot.stats.unread_messages, 3);
}

#[tokio::test]
async fn test_failed_mark_read_after_message_reload_keeps_server_messages() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;
    service.open_conversation("c1").await.unwrap();
    gateway.fail_mutations(true);

    let release = gateway.gate_mutations();
    let (marked, reloaded) = tokio::join!(service.mark_as_read("c1"), async {
        gateway.set_messages(
            "c1",
            vec![
                message("m1", "c1", SenderType::Client, true, 1),
                message("m2", "c1", SenderType::Client, true, 2),
                message("m3", "c1", SenderType::Client, true, 3),
            ],
        );
        let report = service.load_messages("c1").await;
        let _ = release.send(());
        report
    });

    assert_eq!(reloaded.unwrap(), LoadReport::Applied);
    assert!(marked.is_err());
    assert_eq!(service.conversation("c1").await.unwrap().unread_count, 0);
    assert!(
        service
            .messages("c1")
            .await
            .unwrap()
            .iter()
            .all(|m| m.is_read)
    );
}

#[tokio::test]
async fn test_latest_message_load_wins() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;

    let release = gateway.gate_messages("c1");
    let (first, second) = tokio::join!(service.load_messages("c1"), async {
        gateway.set_messages("c1", vec![message("m9", "c1", SenderType::Client, true, 9)]);
        let report = service.load_messages("c1").await;
        let _ = release.send(());
        report
    });

    assert_eq!(second.unwrap(), LoadReport::Applied);
    assert_eq!(first.unwrap(), LoadReport::Discarded);

    let messages = service.messages("c1").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "m9");
    let c1 = service.conversation("c1").await.unwrap();
    assert_eq!(c1.unread_count, 0);
    assert_eq!(c1.last_message_at, Some(at(9)));
}

#[tokio::test]
async fn test_end_session_discards_and_rejects() {
    let gateway = three_unread();
    let service = loaded(gateway.clone()).await;

    let release = gateway.gate_messages("c1");
    let (report, _) = tokio::join!(service.open_conversation("c1"), async {
        service.end_session().await;
        let _ = release.send(());
    });

    assert_eq!(report.unwrap(), LoadReport::Discarded);
    assert!(service.is_closed().await);
    let snapshot = service.snapshot(&ConversationFilter::default()).await;
    assert!(snapshot.conversations.is_empty());
    assert!(snapshot.active_conversation.is_none());
    assert_eq!(service.load_conversations().await, Err(SyncError::SessionClosed));
    assert_eq!(service.mark_as_read("c1").await, Err(SyncError::SessionClosed));
}

#[tokio::test]
async fn test_snapshot_filters_and_stats() {
    let gateway = Arc::new(FakeGateway::new(vec![
        conversation("a", ConversationStatus::Active, 2, Some(4)),
        conversation("b", ConversationStatus::Archived, 0, Some(6)),
        conversation("c", ConversationStatus::Active, 0, None),
    ]));
    let service = loaded(gateway).await;

    let all = service.snapshot(&ConversationFilter::default()).await;
    let ids: Vec<&str> = all.conversations.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a", "c"]);
    assert_eq!(all.stats.total_conversations, 3);
    assert_eq!(all.stats.unread_conversations, 1);
    assert_eq!(all.stats.unread_messages, 2);

    let active = service
        .snapshot(&ConversationFilter {
            status: Some(ConversationStatus::Active),
            unread_only: true,
            client_id: None,
        })
        .await;
    assert_eq!(active.conversations.len(), 1);
    assert_eq!(active.conversations[0].id, "a");
}
