//! # ビジネスイベントログの構造化ヘルパー
//!
//! `jq` で効率的に調査できるよう、ログフィールドの命名規約とヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`error.kind`）を使用。tracing の
//! `$($field:ident).+` パターンでサポートされ、JSON 出力でフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.result`: 結果（[`event::result`] の定数を使用）
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const SUBMISSION: &str = "submission";
        pub const NOTIFICATION: &str = "notification";
        pub const AUDIT: &str = "audit";
    }

    /// イベントアクション
    pub mod action {
        // 送信受付
        pub const SUBMISSION_ACCEPTED: &str = "submission.accepted";
        pub const SUBMISSION_REJECTED: &str = "submission.rejected";

        // 配信
        pub const NOTIFICATION_SENT: &str = "notification.sent";
        pub const NOTIFICATION_FAILED: &str = "notification.failed";
        pub const DISPATCH_COMPLETED: &str = "dispatch.completed";

        // 監査
        pub const AUDIT_RECORDED: &str = "audit.recorded";
        pub const AUDIT_FAILED: &str = "audit.failed";
    }

    /// エンティティ種別
    pub mod entity_type {
        pub const SUBMISSION: &str = "submission";
        pub const DISPATCH_OUTCOME: &str = "dispatch_outcome";
        pub const AUDIT_RECORD: &str = "audit_record";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const PARTIAL: &str = "partial";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// インフラストラクチャ（監査ストア）
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// 外部サービス呼び出し（メール送信トランスポート）
        pub const EXTERNAL_SERVICE: &str = "external_service";
    }

    /// エラー種別
    pub mod kind {
        pub const PERSISTENCE: &str = "persistence";
        pub const TRANSPORT: &str = "transport";
        pub const TIMEOUT: &str = "timeout";
    }
}
