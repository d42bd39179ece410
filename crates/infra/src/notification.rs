//! # 通知送信
//!
//! メール配信ゲートウェイ。1 宛先 1 通のメールを送信する。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `NotificationSender` trait でメール送信を抽象化
//! - **3 つの実装**: SMTP（Mailpit 開発用）、SES（本番用）、Noop（送信無効化）
//! - **環境変数切替**: `NOTIFICATION_BACKEND` でランタイム選択
//! - **送信前の疎通確認**: [`ensure_ready`](NotificationSender::ensure_ready) が失敗した場合、
//!   呼び出し側は 1 通も送らずに受付を中断する

mod noop;
mod ses;
mod smtp;

use async_trait::async_trait;
pub use noop::NoopNotificationSender;
pub use ses::SesNotificationSender;
pub use smtp::SmtpNotificationSender;
use thiserror::Error;

/// 通知送信エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    /// 1 通の送信に失敗（宛先拒否、メッセージ構築失敗など）
    #[error("メール送信に失敗: {0}")]
    SendFailed(String),

    /// 配信ゲートウェイ自体が利用できない
    #[error("配信ゲートウェイが利用できません: {0}")]
    Unavailable(String),
}

/// メールメッセージ
///
/// HTML 本文はそのまま送る。描画・サニタイズは行わない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// 送信先メールアドレス
    pub to:        String,
    /// 件名
    pub subject:   String,
    /// HTML 本文
    pub html_body: String,
}

/// メール送信トレイト
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 送信可能な状態か確認する
    ///
    /// 送信受付ごとに、最初の送信の前に 1 回だけ呼ばれる。
    async fn ensure_ready(&self) -> Result<(), NotificationError>;

    /// メールを送信する
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError>;
}
