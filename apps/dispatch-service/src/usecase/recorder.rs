//! # 監査記録
//!
//! 送信内容と配信結果から監査レコードを組み立て、ストアへ 1 件追記する。
//!
//! - コンテナ（テーブル）の準備は recorder ごとに最初の記録時に 1 回だけ行う。
//!   失敗した場合は次の記録時に再試行する
//! - 準備はテーブルが使えるようになるまで待つため [`PROVISION_TIMEOUT`]、
//!   書き込みは `write_timeout` で打ち切る
//! - 記録の失敗は配信済みのメールを取り消さない

use std::{sync::Arc, time::Duration};

use boardnotify_domain::{
    audit::{AuditRecord, RecordId},
    clock::Clock,
    dispatch::DispatchReport,
    recipient::RecipientSet,
    submission::Submission,
};
use boardnotify_infra::{InfraError, repository::AuditRecordStore};
use boardnotify_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};
use thiserror::Error;
use tokio::sync::OnceCell;

/// コンテナ準備の上限時間
///
/// テーブル作成から `ACTIVE` までの待機を含む。
pub const PROVISION_TIMEOUT: Duration = Duration::from_secs(90);

/// 監査記録エラー
#[derive(Debug, Error)]
pub enum RecordError {
    /// コンテナの準備に失敗
    #[error("監査テーブルの準備に失敗: {0}")]
    Provision(#[source] InfraError),

    /// フィールドのシリアライズに失敗
    #[error("監査レコードのシリアライズに失敗: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 書き込みに失敗
    #[error("監査レコードの書き込みに失敗: {0}")]
    Write(#[source] InfraError),

    /// 準備または書き込みがタイムアウト
    #[error("監査レコードの記録がタイムアウトしました（{0} ms）")]
    Timeout(u128),
}

/// 監査記録
pub struct AuditRecorder {
    store:         Arc<dyn AuditRecordStore>,
    clock:         Arc<dyn Clock>,
    container:     String,
    write_timeout: Duration,
    provisioned:   OnceCell<()>,
}

impl AuditRecorder {
    pub fn new(
        store: Arc<dyn AuditRecordStore>,
        clock: Arc<dyn Clock>,
        container: impl Into<String>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            container: container.into(),
            write_timeout,
            provisioned: OnceCell::new(),
        }
    }

    /// 監査レコードを 1 件記録し、行キーを返す
    #[tracing::instrument(skip_all, fields(container = %self.container))]
    pub async fn record(
        &self,
        submission: &Submission,
        recipients: &RecipientSet,
        report: &DispatchReport,
    ) -> Result<RecordId, RecordError> {
        match self.try_record(submission, recipients, report).await {
            Ok(record_id) => {
                log_business_event!(
                    event.category = event::category::AUDIT,
                    event.action = event::action::AUDIT_RECORDED,
                    event.entity_type = event::entity_type::AUDIT_RECORD,
                    event.entity_id = %record_id,
                    event.result = event::result::SUCCESS,
                    "監査レコードを記録しました"
                );
                Ok(record_id)
            }
            Err(e) => {
                let kind = match &e {
                    RecordError::Timeout(_) => log_error::kind::TIMEOUT,
                    _ => log_error::kind::PERSISTENCE,
                };
                log_business_event!(
                    event.category = event::category::AUDIT,
                    event.action = event::action::AUDIT_FAILED,
                    event.entity_type = event::entity_type::AUDIT_RECORD,
                    event.result = event::result::FAILURE,
                    error.category = log_error::category::INFRASTRUCTURE,
                    error.kind = kind,
                    error = %e,
                    "監査レコードの記録に失敗しました"
                );
                Err(e)
            }
        }
    }

    async fn try_record(
        &self,
        submission: &Submission,
        recipients: &RecipientSet,
        report: &DispatchReport,
    ) -> Result<RecordId, RecordError> {
        self.provisioned
            .get_or_try_init(|| async {
                match tokio::time::timeout(
                    PROVISION_TIMEOUT,
                    self.store.ensure_container(&self.container),
                )
                .await
                {
                    Ok(result) => result.map_err(RecordError::Provision),
                    Err(_) => Err(RecordError::Timeout(PROVISION_TIMEOUT.as_millis())),
                }
            })
            .await?;

        let now = self.clock.now();
        let record = AuditRecord::new(submission, recipients, report, now, RecordId::generate(now));
        let fields = record.fields()?;

        let write = self.store.create_record(
            &self.container,
            record.partition_key(),
            record.record_id().as_str(),
            &fields,
        );
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => Ok(record.record_id().clone()),
            Ok(Err(e)) => Err(RecordError::Write(e)),
            Err(_) => Err(RecordError::Timeout(self.write_timeout.as_millis())),
        }
    }
}

#[cfg(test)]
mod tests {
    use boardnotify_domain::{
        audit::FieldValue,
        clock::ManualClock,
        dispatch::{DispatchOutcome, TargetRole},
        recipient::{EmailAddress, RawRecipients},
        submission::{HtmlBody, Metadata, NewSubmission, Subject},
    };
    use boardnotify_infra::mock::MockAuditRecordStore;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use tokio_test::assert_ok;

    use super::*;

    fn addr(s: &str) -> EmailAddress {
        EmailAddress::parse(s).unwrap()
    }

    fn submission() -> Submission {
        Submission::new(NewSubmission {
            ticket_address: addr("ticket@x.com"),
            subject:        Subject::new("Radisson Boarding").unwrap(),
            html_body:      HtmlBody::new("<p>MID 42</p>").unwrap(),
            raw_recipients: RawRecipients::List(vec!["m1@x.com".to_string()]),
            submitter:      addr("ops@shift4.com"),
            notify_address: None,
            metadata:       Metadata::new(),
        })
    }

    fn report() -> DispatchReport {
        DispatchReport::from_outcomes(vec![
            DispatchOutcome::sent(addr("ticket@x.com"), TargetRole::Primary),
            DispatchOutcome::sent(addr("m1@x.com"), TargetRole::Secondary),
        ])
    }

    fn recorder(store: &MockAuditRecordStore, clock: Arc<ManualClock>) -> AuditRecorder {
        AuditRecorder::new(
            Arc::new(store.clone()),
            clock,
            "submission_audit",
            Duration::from_secs(1),
        )
    }

    fn fixed_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_監査レコードを1件記録する() {
        let store = MockAuditRecordStore::new();
        let recorder = recorder(&store, fixed_clock());
        let s = submission();
        let recipients = RecipientSet::normalize(s.raw_recipients());

        let record_id = recorder.record(&s, &recipients, &report()).await.unwrap();

        let records = store.records();
        assert_eq!(records.len(), 1);
        let stored = &records[0];
        assert_eq!(stored.container, "submission_audit");
        assert_eq!(stored.partition_key, "submission");
        assert_eq!(stored.row_key, record_id.as_str());
        assert!(record_id.as_str().starts_with("1700000000123-"));
        assert_eq!(
            stored.fields.get("recipients"),
            Some(&FieldValue::Text(r#"["m1@x.com"]"#.to_string()))
        );
        assert_eq!(stored.fields.get("sent_count"), Some(&FieldValue::Number(2)));
    }

    #[tokio::test]
    async fn test_コンテナの準備は最初の1回だけ行う() {
        let store = MockAuditRecordStore::new();
        let recorder = recorder(&store, fixed_clock());
        let s = submission();

        for _ in 0..3 {
            recorder
                .record(&s, &RecipientSet::default(), &report())
                .await
                .unwrap();
        }

        assert_eq!(store.ensure_calls(), 1);
        assert_eq!(store.records().len(), 3);
    }

    #[tokio::test]
    async fn test_同一時刻の記録でも行キーは衝突しない() {
        let store = MockAuditRecordStore::new();
        let recorder = recorder(&store, fixed_clock());
        let s = submission();

        let first = recorder.record(&s, &RecipientSet::default(), &report()).await.unwrap();
        let second = recorder.record(&s, &RecipientSet::default(), &report()).await.unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_コンテナの準備に失敗したら次回に再試行する() {
        let store = MockAuditRecordStore::new();
        store.fail_ensure_container(1);
        let recorder = recorder(&store, fixed_clock());
        let s = submission();

        let first = recorder.record(&s, &RecipientSet::default(), &report()).await;
        assert!(matches!(first, Err(RecordError::Provision(_))));
        assert!(store.records().is_empty());

        assert_ok!(recorder.record(&s, &RecipientSet::default(), &report()).await);
        assert_eq!(store.ensure_calls(), 2);
    }

    #[tokio::test]
    async fn test_書き込み失敗はwriteエラーになる() {
        let store = MockAuditRecordStore::new();
        store.fail_create_record();
        let recorder = recorder(&store, fixed_clock());

        let result = recorder
            .record(&submission(), &RecipientSet::default(), &report())
            .await;

        assert!(matches!(result, Err(RecordError::Write(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_書き込みがタイムアウトしたらtimeoutエラーになる() {
        let store = MockAuditRecordStore::new();
        store.delay_create_record(Duration::from_secs(30));
        let recorder = recorder(&store, fixed_clock());

        let result = recorder
            .record(&submission(), &RecipientSet::default(), &report())
            .await;

        assert!(matches!(result, Err(RecordError::Timeout(1000))));
        assert!(store.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_コンテナの準備は書き込みより長く待つ() {
        let store = MockAuditRecordStore::new();
        store.delay_ensure_container(Duration::from_secs(30));
        let recorder = recorder(&store, fixed_clock());

        let result = recorder
            .record(&submission(), &RecipientSet::default(), &report())
            .await;

        assert_ok!(result);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_コンテナの準備が上限を超えたらtimeoutエラーになる() {
        let store = MockAuditRecordStore::new();
        store.delay_ensure_container(PROVISION_TIMEOUT + Duration::from_secs(1));
        let recorder = recorder(&store, fixed_clock());

        let result = recorder
            .record(&submission(), &RecipientSet::default(), &report())
            .await;

        assert!(matches!(
            result,
            Err(RecordError::Timeout(ms)) if ms == PROVISION_TIMEOUT.as_millis()
        ));
        assert!(store.records().is_empty());
    }
}
