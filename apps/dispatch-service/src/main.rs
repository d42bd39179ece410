//! # Dispatch Service サーバー
//!
//! 掲示・オンボーディング通知の送信受付サービス。
//! 1 件の送信を主宛先と各副宛先へ配信し、その結果を監査レコードとして残す。
//!
//! ## 起動方法
//!
//! ```bash
//! DISPATCH_PORT=13000 cargo run -p boardnotify-dispatch
//! ```
//!
//! 設定値の一覧は [`config`](boardnotify_dispatch::config) を参照。

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use boardnotify_dispatch::{
    app_builder::build_router,
    config::{NotificationBackend, NotificationConfig, ServiceConfig},
    handler::SubmissionState,
    usecase::{
        AuditRecorder,
        DispatchSettings,
        FanoutDispatcher,
        SubmissionCoordinator,
        SubmissionPolicy,
    },
};
use boardnotify_domain::{clock::SystemClock, submission::SubmitterPolicy};
use boardnotify_infra::{
    dynamodb,
    notification::{
        NoopNotificationSender,
        NotificationSender,
        SesNotificationSender,
        SmtpNotificationSender,
    },
    repository::DynamoDbAuditRecordStore,
};
use boardnotify_shared::observability::{TracingConfig, init_tracing};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let tracing_config = TracingConfig::from_env("dispatch-service");
    init_tracing(&tracing_config);

    let config = ServiceConfig::from_env().context("設定の読み込みに失敗しました")?;

    tracing::info!(
        "Dispatch Service サーバーを起動します: {}:{}",
        config.host,
        config.port
    );

    let sender = create_sender(&config.notification).await;
    tracing::info!(backend = %config.notification.backend, "通知バックエンドを初期化しました");

    let dynamodb_client = dynamodb::create_client(&config.audit.dynamodb_endpoint).await;
    let store = Arc::new(DynamoDbAuditRecordStore::new(dynamodb_client));
    tracing::info!(
        table = %config.audit.table_name,
        "監査レコードストアを初期化しました（テーブルは初回の記録時に準備）"
    );

    let dispatcher = FanoutDispatcher::new(
        sender,
        DispatchSettings {
            max_concurrency: config.dispatch.max_concurrency,
            attempt_timeout: config.dispatch.attempt_timeout,
        },
    );
    let recorder = AuditRecorder::new(
        store,
        Arc::new(SystemClock),
        config.audit.table_name.clone(),
        config.audit.write_timeout,
    );
    let policy = SubmissionPolicy {
        default_ticket_address: config.submission.default_ticket_address.clone(),
        default_notify_address: config.submission.default_notify_address.clone(),
        submitter:              SubmitterPolicy::new(&config.submission.allowed_submitter_domains),
        require_recipients:     config.submission.require_recipients,
    };
    let state = Arc::new(SubmissionState {
        coordinator: SubmissionCoordinator::new(policy, dispatcher, recorder),
    });

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("バインドアドレスが不正です: {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Dispatch Service サーバーが起動しました: {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// 設定に応じたメール送信の実装を作る
async fn create_sender(config: &NotificationConfig) -> Arc<dyn NotificationSender> {
    match config.backend {
        NotificationBackend::Smtp => Arc::new(SmtpNotificationSender::new(
            &config.smtp_host,
            config.smtp_port,
            config.from_address.clone(),
        )),
        NotificationBackend::Ses => {
            let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let client = aws_sdk_sesv2::Client::new(&aws_config);
            Arc::new(SesNotificationSender::new(client, config.from_address.clone()))
        }
        NotificationBackend::Noop => Arc::new(NoopNotificationSender),
    }
}
