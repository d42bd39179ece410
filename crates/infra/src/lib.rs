//! # BoardNotify インフラ層
//!
//! 外部システム（メール配信ゲートウェイ、監査レコードストア）との通信を担当する。
//!
//! ## 設計方針
//!
//! ユースケース層が依存する trait（[`notification::NotificationSender`]、
//! [`repository::AuditRecordStore`]）と、その具体的な実装を提供する。
//! 外部サービスの SDK やワイヤーフォーマットはこのクレートの外に漏らさない。
//!
//! ## モジュール構成
//!
//! - [`notification`] - メール送信（SMTP / SES / Noop）
//! - [`dynamodb`] - DynamoDB クライアントとテーブル自動作成
//! - [`repository`] - 監査レコードストア
//! - [`error`] - インフラ層エラー定義
//! - `mock` - テスト用インメモリ実装（`test-utils` feature）
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use boardnotify_infra::{dynamodb, repository::DynamoDbAuditRecordStore};
//!
//! async fn setup() -> DynamoDbAuditRecordStore {
//!     let client = dynamodb::create_client("http://localhost:18000").await;
//!     DynamoDbAuditRecordStore::new(client)
//! }
//! ```

pub mod dynamodb;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod notification;
pub mod repository;

pub use error::{InfraError, InfraErrorKind};
