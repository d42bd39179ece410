//! # 配信（ファンアウト）
//!
//! 1 件の送信内容を主宛先と各副宛先へ個別に配信し、宛先ごとの結果を集める。
//!
//! ## 配信順序
//!
//! 1. 疎通確認（[`NotificationSender::ensure_ready`]）。失敗または
//!    `attempt_timeout` 内に応答がなければ 1 通も送らない
//! 2. 主宛先（チケットアドレス）へ送信
//! 3. 副宛先へ正規化順に送信（主宛先と同じアドレスは除外）
//!
//! 副宛先は `max_concurrency` 件まで同時に送信する。`buffered` を使うため、
//! 完了順に関係なく結果の並びは正規化順と一致する。
//!
//! ## 失敗の扱い
//!
//! 1 通ごとの失敗・タイムアウトは [`DeliveryStatus::Failed`]
//! として結果に残し、他の宛先への配信は続ける。

use std::{sync::Arc, time::Duration};

use boardnotify_domain::{
    dispatch::{DeliveryStatus, DispatchOutcome, DispatchReport, TargetRole},
    recipient::{EmailAddress, RecipientSet},
    submission::Submission,
};
use boardnotify_infra::notification::{EmailMessage, NotificationSender};
use boardnotify_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};
use futures::{StreamExt, stream};
use thiserror::Error;

/// 配信の前提が満たせないエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// 配信ゲートウェイが利用できない（送信は 1 通も行っていない）
    #[error("配信ゲートウェイが利用できません: {0}")]
    TransportUnavailable(String),
}

/// 配信の設定
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    /// 副宛先への同時送信数（1 以上）
    pub max_concurrency: usize,
    /// 1 通あたりのタイムアウト
    pub attempt_timeout: Duration,
}

/// ファンアウト配信
pub struct FanoutDispatcher {
    sender:   Arc<dyn NotificationSender>,
    settings: DispatchSettings,
}

impl FanoutDispatcher {
    pub fn new(sender: Arc<dyn NotificationSender>, settings: DispatchSettings) -> Self {
        Self { sender, settings }
    }

    /// 主宛先と副宛先へ配信する
    ///
    /// 戻り値の先頭は主宛先、以降は副宛先の正規化順。
    #[tracing::instrument(skip_all, fields(recipients = recipients.len()))]
    pub async fn dispatch(
        &self,
        submission: &Submission,
        recipients: &RecipientSet,
    ) -> Result<DispatchReport, DispatchError> {
        self.check_ready().await?;

        let ticket = submission.ticket_address();
        let primary = self.attempt(submission, ticket, TargetRole::Primary).await;

        let secondaries: Vec<EmailAddress> =
            recipients.without(ticket).iter().cloned().collect();
        let mut outcomes: Vec<DispatchOutcome> = stream::iter(secondaries)
            .map(|target| async move {
                self.attempt(submission, &target, TargetRole::Secondary).await
            })
            .buffered(self.settings.max_concurrency.max(1))
            .collect()
            .await;
        outcomes.insert(0, primary);

        let report = DispatchReport::from_outcomes(outcomes);

        let result = if report.all_sent() {
            event::result::SUCCESS
        } else if report.sent_count() > 0 {
            event::result::PARTIAL
        } else {
            event::result::FAILURE
        };
        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::DISPATCH_COMPLETED,
            event.entity_type = event::entity_type::SUBMISSION,
            event.result = result,
            dispatch.sent = report.sent_count(),
            dispatch.failed = report.failed_count(),
            dispatch.total = report.total(),
            "配信完了"
        );

        Ok(report)
    }

    /// 配信ゲートウェイの疎通を `attempt_timeout` 以内で確認する
    async fn check_ready(&self) -> Result<(), DispatchError> {
        let timeout = self.settings.attempt_timeout;
        let reason = match tokio::time::timeout(timeout, self.sender.ensure_ready()).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("疎通確認が {} ms 以内に応答しませんでした", timeout.as_millis()),
        };

        tracing::error!(
            error.category = log_error::category::EXTERNAL_SERVICE,
            error.kind = log_error::kind::TRANSPORT,
            "配信ゲートウェイが利用できません: {}",
            reason
        );
        Err(DispatchError::TransportUnavailable(reason))
    }

    /// 1 宛先へ送信し、結果を返す
    async fn attempt(
        &self,
        submission: &Submission,
        target: &EmailAddress,
        role: TargetRole,
    ) -> DispatchOutcome {
        let email = EmailMessage {
            to:        target.to_string(),
            subject:   submission.subject().to_string(),
            html_body: submission.html_body().to_string(),
        };
        let role_str: &'static str = role.into();

        let timeout = self.settings.attempt_timeout;
        let outcome =
            match tokio::time::timeout(timeout, self.sender.send_email(&email)).await {
                Ok(Ok(())) => DispatchOutcome::sent(target.clone(), role),
                Ok(Err(e)) => DispatchOutcome::failed(target.clone(), role, e.to_string()),
                Err(_) => DispatchOutcome::failed(
                    target.clone(),
                    role,
                    format!("timed out after {} ms", timeout.as_millis()),
                ),
            };

        match outcome.status() {
            DeliveryStatus::Sent => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_SENT,
                    event.entity_type = event::entity_type::DISPATCH_OUTCOME,
                    event.result = event::result::SUCCESS,
                    notification.recipient = %target,
                    notification.role = role_str,
                    "通知メール送信成功"
                );
            }
            DeliveryStatus::Failed { error } => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_FAILED,
                    event.entity_type = event::entity_type::DISPATCH_OUTCOME,
                    event.result = event::result::FAILURE,
                    notification.recipient = %target,
                    notification.role = role_str,
                    error = %error,
                    "通知メール送信失敗"
                );
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use boardnotify_domain::{
        recipient::RawRecipients,
        submission::{HtmlBody, Metadata, NewSubmission, Subject},
    };
    use boardnotify_infra::mock::MockNotificationSender;
    use pretty_assertions::assert_eq;

    use super::*;

    fn addr(s: &str) -> EmailAddress {
        EmailAddress::parse(s).unwrap()
    }

    fn submission() -> Submission {
        Submission::new(NewSubmission {
            ticket_address: addr("ticket@x.com"),
            subject:        Subject::new("Radisson Boarding").unwrap(),
            html_body:      HtmlBody::new("<p>MID 42</p>").unwrap(),
            raw_recipients: RawRecipients::Absent,
            submitter:      addr("ops@shift4.com"),
            notify_address: None,
            metadata:       Metadata::new(),
        })
    }

    fn recipients(items: &[&str]) -> RecipientSet {
        RecipientSet::normalize(&RawRecipients::List(
            items.iter().map(|s| s.to_string()).collect(),
        ))
    }

    fn dispatcher(sender: &MockNotificationSender, max_concurrency: usize) -> FanoutDispatcher {
        FanoutDispatcher::new(
            Arc::new(sender.clone()),
            DispatchSettings {
                max_concurrency,
                attempt_timeout: Duration::from_secs(5),
            },
        )
    }

    fn statuses(report: &DispatchReport) -> Vec<(String, bool)> {
        report
            .outcomes()
            .iter()
            .map(|o| (o.target().to_string(), o.is_sent()))
            .collect()
    }

    #[tokio::test]
    async fn test_主宛先を先頭に副宛先を正規化順で配信する() {
        let sender = MockNotificationSender::new();
        let targets = recipients(&["a@x.com", "b@x.com", "c@x.com"]);

        let report = dispatcher(&sender, 1)
            .dispatch(&submission(), &targets)
            .await
            .unwrap();

        assert_eq!(
            sender.attempted_addresses(),
            vec!["ticket@x.com", "a@x.com", "b@x.com", "c@x.com"]
        );
        assert_eq!(report.total(), 4);
        assert_eq!(report.outcomes()[0].role(), TargetRole::Primary);
        assert!(
            report.outcomes()[1..]
                .iter()
                .all(|o| o.role() == TargetRole::Secondary)
        );
        assert!(report.all_sent());

        let email = &sender.sent_emails()[1];
        assert_eq!(email.subject, "Radisson Boarding");
        assert_eq!(email.html_body, "<p>MID 42</p>");
    }

    #[tokio::test]
    async fn test_2件目の失敗は他の宛先に影響しない() {
        let sender = MockNotificationSender::new();
        sender.fail_for("b@x.com");
        let targets = recipients(&["a@x.com", "b@x.com", "c@x.com"]);

        let report = dispatcher(&sender, 4)
            .dispatch(&submission(), &targets)
            .await
            .unwrap();

        assert_eq!(report.total(), targets.len() + 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(
            statuses(&report),
            vec![
                ("ticket@x.com".to_string(), true),
                ("a@x.com".to_string(), true),
                ("b@x.com".to_string(), false),
                ("c@x.com".to_string(), true),
            ]
        );
        assert!(matches!(
            report.outcome_for(&addr("b@x.com")).map(|o| o.status()),
            Some(DeliveryStatus::Failed { error }) if error.contains("b@x.com")
        ));
    }

    #[tokio::test]
    async fn test_主宛先の失敗でも副宛先へ配信する() {
        let sender = MockNotificationSender::new();
        sender.fail_for("ticket@x.com");

        let report = dispatcher(&sender, 4)
            .dispatch(&submission(), &recipients(&["a@x.com"]))
            .await
            .unwrap();

        assert_eq!(
            statuses(&report),
            vec![
                ("ticket@x.com".to_string(), false),
                ("a@x.com".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_主宛先と同じ副宛先は送信しない() {
        let sender = MockNotificationSender::new();

        let report = dispatcher(&sender, 4)
            .dispatch(&submission(), &recipients(&["Ticket@X.com", "a@x.com"]))
            .await
            .unwrap();

        assert_eq!(sender.attempted_addresses(), vec!["ticket@x.com", "a@x.com"]);
        assert_eq!(report.total(), 2);
    }

    #[tokio::test]
    async fn test_疎通確認に失敗したら1通も送信しない() {
        let sender = MockNotificationSender::new();
        sender.set_unavailable("SMTP サーバーに接続できません");

        let result = dispatcher(&sender, 4)
            .dispatch(&submission(), &recipients(&["a@x.com"]))
            .await;

        assert!(
            matches!(result, Err(DispatchError::TransportUnavailable(msg)) if msg.contains("SMTP"))
        );
        assert!(sender.attempted_addresses().is_empty());
        assert_eq!(sender.ready_checks(), 1);
    }

    #[tokio::test]
    async fn test_副宛先0件なら主宛先のみ配信する() {
        let sender = MockNotificationSender::new();

        let report = dispatcher(&sender, 4)
            .dispatch(&submission(), &RecipientSet::default())
            .await
            .unwrap();

        assert_eq!(statuses(&report), vec![("ticket@x.com".to_string(), true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_タイムアウトした送信は失敗として記録する() {
        let sender = MockNotificationSender::new();
        sender.delay_for("slow@x.com", Duration::from_secs(60));
        let dispatcher = FanoutDispatcher::new(
            Arc::new(sender.clone()),
            DispatchSettings {
                max_concurrency: 4,
                attempt_timeout: Duration::from_millis(100),
            },
        );

        let report = dispatcher
            .dispatch(&submission(), &recipients(&["slow@x.com", "a@x.com"]))
            .await
            .unwrap();

        assert_eq!(
            report.outcome_for(&addr("slow@x.com")).map(|o| o.status()),
            Some(&DeliveryStatus::Failed {
                error: "timed out after 100 ms".to_string()
            })
        );
        assert!(report.outcome_for(&addr("a@x.com")).unwrap().is_sent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_完了順に関係なく結果は正規化順に並ぶ() {
        let sender = MockNotificationSender::new();
        sender.delay_for("a@x.com", Duration::from_millis(300));
        sender.delay_for("b@x.com", Duration::from_millis(100));
        sender.delay_for("c@x.com", Duration::from_millis(200));

        let report = dispatcher(&sender, 3)
            .dispatch(&submission(), &recipients(&["a@x.com", "b@x.com", "c@x.com"]))
            .await
            .unwrap();

        let order: Vec<String> = report
            .outcomes()
            .iter()
            .map(|o| o.target().to_string())
            .collect();
        assert_eq!(order, vec!["ticket@x.com", "a@x.com", "b@x.com", "c@x.com"]);
        assert_eq!(sender.max_in_flight(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_同時送信数は上限を超えない() {
        let sender = MockNotificationSender::new();
        let many: Vec<String> = (0..10).map(|i| format!("m{i}@x.com")).collect();
        for address in &many {
            sender.delay_for(address, Duration::from_millis(50));
        }
        let targets = RecipientSet::normalize(&RawRecipients::List(many));

        let report = dispatcher(&sender, 2)
            .dispatch(&submission(), &targets)
            .await
            .unwrap();

        assert_eq!(report.total(), 11);
        assert_eq!(sender.max_in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_疎通確認が応答しなければ1通も送信しない() {
        let sender = MockNotificationSender::new();
        sender.delay_ready(Duration::from_secs(600));
        let dispatcher = FanoutDispatcher::new(
            Arc::new(sender.clone()),
            DispatchSettings {
                max_concurrency: 4,
                attempt_timeout: Duration::from_millis(100),
            },
        );

        let result = dispatcher
            .dispatch(&submission(), &recipients(&["a@x.com"]))
            .await;

        assert!(matches!(
            result,
            Err(DispatchError::TransportUnavailable(msg)) if msg.contains("100 ms")
        ));
        assert!(sender.attempted_addresses().is_empty());
    }

    #[tokio::test]
    async fn test_別タスクから共有した配信器で配信できる() {
        let sender = MockNotificationSender::new();
        let dispatcher = Arc::new(dispatcher(&sender, 2));
        let targets = recipients(&["a@x.com", "b@x.com"]);

        let handle = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.dispatch(&submission(), &targets).await }
        });
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.total(), 3);
        assert_eq!(
            sender.attempted_addresses(),
            vec!["ticket@x.com", "a@x.com", "b@x.com"]
        );
    }
}
