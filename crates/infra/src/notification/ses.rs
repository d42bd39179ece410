//! SES 通知送信実装
//!
//! AWS SES v2 API を使用してメールを送信する。
//! 本番環境で使用する。

use async_trait::async_trait;
use aws_sdk_sesv2::{
    Client,
    types::{Body, Content, Destination, EmailContent, Message},
};
use boardnotify_domain::recipient::is_valid_email_address;

use super::{EmailMessage, NotificationError, NotificationSender};

/// SES 通知送信
pub struct SesNotificationSender {
    client:       Client,
    from_address: String,
}

impl SesNotificationSender {
    /// 新しい SES 送信インスタンスを作成
    ///
    /// # 引数
    ///
    /// - `client`: AWS SES v2 クライアント
    /// - `from_address`: 送信元メールアドレス（SES で検証済みであること）
    pub fn new(client: Client, from_address: String) -> Self {
        Self {
            client,
            from_address,
        }
    }
}

fn content(data: &str, label: &str) -> Result<Content, NotificationError> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| NotificationError::SendFailed(format!("{label}構築失敗: {e}")))
}

#[async_trait]
impl NotificationSender for SesNotificationSender {
    async fn ensure_ready(&self) -> Result<(), NotificationError> {
        if !is_valid_email_address(&self.from_address.trim().to_lowercase()) {
            return Err(NotificationError::Unavailable(format!(
                "送信元アドレス不正: {}",
                self.from_address
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(to = %email.to))]
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        let destination = Destination::builder().to_addresses(&email.to).build();

        let message = Message::builder()
            .subject(content(&email.subject, "件名")?)
            .body(
                Body::builder()
                    .html(content(&email.html_body, "HTML 本文")?)
                    .build(),
            )
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from_address)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(format!("SES 送信失敗: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(from: &str) -> SesNotificationSender {
        let config = aws_sdk_sesv2::Config::builder()
            .behavior_version(aws_sdk_sesv2::config::BehaviorVersion::latest())
            .region(aws_sdk_sesv2::config::Region::new("ap-northeast-1"))
            .build();
        SesNotificationSender::new(Client::from_conf(config), from.to_string())
    }

    #[test]
    fn トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SesNotificationSender>();
    }

    #[tokio::test]
    async fn test_送信元アドレスが正しければensure_readyは成功する() {
        let result = sender("noreply@boardnotify.example.com").ensure_ready().await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_送信元アドレスが不正ならensure_readyはunavailableを返す() {
        let result = sender("noreply").ensure_ready().await;

        assert!(matches!(result, Err(NotificationError::Unavailable(_))));
    }
}
