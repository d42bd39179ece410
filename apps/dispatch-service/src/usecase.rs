//! # ユースケース層
//!
//! 送信受付のビジネスロジックを実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: メール送信・監査レコードストアを `Arc<dyn Trait>` で外部から注入
//! - **薄いハンドラ**: ハンドラは DTO の変換のみ行い、ロジックはユースケースに集約
//!
//! ## モジュール構成
//!
//! - `dispatcher`: 主宛先・副宛先へのファンアウト配信
//! - `recorder`: 監査レコードの記録
//! - `submission`: 検証から配信・記録までの調停

pub mod dispatcher;
pub mod recorder;
pub mod submission;

pub use dispatcher::{DispatchError, DispatchSettings, FanoutDispatcher};
pub use recorder::{AuditRecorder, RecordError};
pub use submission::{
    SubmissionCoordinator,
    SubmissionInput,
    SubmissionPolicy,
    SubmissionReceipt,
};
