//! Noop 通知送信実装
//!
//! メールを実際に送信せず、ログ出力のみ行う。

use async_trait::async_trait;

use super::{EmailMessage, NotificationError, NotificationSender};

/// Noop 通知送信（ログ出力のみ）
#[derive(Debug, Clone, Default)]
pub struct NoopNotificationSender;

#[async_trait]
impl NotificationSender for NoopNotificationSender {
    async fn ensure_ready(&self) -> Result<(), NotificationError> {
        Ok(())
    }

    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Noop: メール送信をスキップ"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;

    #[tokio::test]
    async fn test_ensure_readyとsend_emailがエラーを返さない() {
        let sender = NoopNotificationSender;
        let email = EmailMessage {
            to:        "m1@x.com".to_string(),
            subject:   "Radisson Boarding".to_string(),
            html_body: "<p>テスト</p>".to_string(),
        };

        assert_ok!(sender.ensure_ready().await);
        assert_ok!(sender.send_email(&email).await);
    }
}
