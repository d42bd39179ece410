//! # 送信受付
//!
//! 受付ペイロードを検証し、配信と監査記録を順に実行する。
//!
//! ## 処理順序
//!
//! 1. 必須項目（主宛先・件名・本文）の検証。欠落はまとめて報告する
//! 2. 申請者ドメインの検証
//! 3. 宛先の正規化（通知先アドレスがあれば先頭に差し込む）。
//!    主宛先と同じアドレスは副宛先から除く
//! 4. 配信（[`FanoutDispatcher`]）
//! 5. 監査記録（[`AuditRecorder`]）
//!
//! 1〜3 で失敗した場合は I/O を一切行わない。内部リトライはしない。

use boardnotify_domain::{
    DomainError,
    audit::RecordId,
    dispatch::DispatchReport,
    recipient::{EmailAddress, RawRecipients, RecipientSet},
    submission::{HtmlBody, Metadata, NewSubmission, Subject, Submission, SubmitterPolicy},
};
use boardnotify_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};

use super::{AuditRecorder, FanoutDispatcher};
use crate::error::SubmissionError;

/// 受付ペイロード（検証前）
#[derive(Debug, Clone, Default)]
pub struct SubmissionInput {
    pub ticket_address:     Option<String>,
    pub subject:            Option<String>,
    pub html_body:          Option<String>,
    pub recipients:         RawRecipients,
    pub submitter_identity: Option<String>,
    pub notify_address:     Option<String>,
    pub metadata:           Metadata,
}

/// 受付ポリシー
#[derive(Debug, Clone)]
pub struct SubmissionPolicy {
    /// ペイロードに主宛先がない場合に使うアドレス
    pub default_ticket_address: Option<EmailAddress>,
    /// ペイロードに通知先がない場合に使うアドレス
    pub default_notify_address: Option<EmailAddress>,
    pub submitter:              SubmitterPolicy,
    /// 有効な副宛先が 0 件の送信を拒否するか
    pub require_recipients:     bool,
}

/// 受付結果
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub delivered: DispatchReport,
    pub record_id: RecordId,
}

/// 送信受付
pub struct SubmissionCoordinator {
    policy:     SubmissionPolicy,
    dispatcher: FanoutDispatcher,
    recorder:   AuditRecorder,
}

impl SubmissionCoordinator {
    pub fn new(
        policy: SubmissionPolicy,
        dispatcher: FanoutDispatcher,
        recorder: AuditRecorder,
    ) -> Self {
        Self {
            policy,
            dispatcher,
            recorder,
        }
    }

    /// 送信を受け付け、配信と監査記録を行う
    #[tracing::instrument(skip_all)]
    pub async fn handle(
        &self,
        input: SubmissionInput,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let (submission, recipients) = match self.validate(input) {
            Ok(validated) => validated,
            Err(e) => {
                log_business_event!(
                    event.category = event::category::SUBMISSION,
                    event.action = event::action::SUBMISSION_REJECTED,
                    event.entity_type = event::entity_type::SUBMISSION,
                    event.result = event::result::FAILURE,
                    error = %e,
                    "送信を受け付けませんでした"
                );
                return Err(e);
            }
        };

        let report = self.dispatcher.dispatch(&submission, &recipients).await?;

        let record_id = match self.recorder.record(&submission, &recipients, &report).await {
            Ok(record_id) => record_id,
            Err(e) => {
                tracing::error!(
                    error.category = log_error::category::INFRASTRUCTURE,
                    error.kind = log_error::kind::PERSISTENCE,
                    sent = report.sent_count(),
                    total = report.total(),
                    "配信後の監査記録に失敗しました: {}",
                    e
                );
                return Err(SubmissionError::Persistence {
                    report,
                    message: e.to_string(),
                });
            }
        };

        let result = if report.all_sent() {
            event::result::SUCCESS
        } else {
            event::result::PARTIAL
        };
        log_business_event!(
            event.category = event::category::SUBMISSION,
            event.action = event::action::SUBMISSION_ACCEPTED,
            event.entity_type = event::entity_type::SUBMISSION,
            event.entity_id = %record_id,
            event.result = result,
            submitter = %submission.submitter(),
            sent = report.sent_count(),
            failed = report.failed_count(),
            "送信を受け付けました"
        );

        Ok(SubmissionReceipt {
            delivered: report,
            record_id,
        })
    }

    fn validate(
        &self,
        input: SubmissionInput,
    ) -> Result<(Submission, RecipientSet), SubmissionError> {
        let ticket_input = non_blank(input.ticket_address.as_deref());
        let subject_input = non_blank(input.subject.as_deref());
        let body_input = non_blank(input.html_body.as_deref());

        let mut missing_fields = Vec::new();
        if ticket_input.is_none() && self.policy.default_ticket_address.is_none() {
            missing_fields.push("ticketAddress");
        }
        if subject_input.is_none() {
            missing_fields.push("subject");
        }
        if body_input.is_none() {
            missing_fields.push("htmlBody");
        }
        if !missing_fields.is_empty() {
            return Err(SubmissionError::Validation {
                message: format!("必須項目が不足しています: {}", missing_fields.join(", ")),
                missing_fields,
            });
        }

        let ticket_address = match ticket_input {
            Some(raw) => EmailAddress::parse(raw).map_err(|e| invalid_field("ticketAddress", e))?,
            None => self
                .policy
                .default_ticket_address
                .clone()
                .ok_or_else(|| SubmissionError::missing("ticketAddress"))?,
        };
        let subject = Subject::new(subject_input.unwrap_or_default())?;
        let html_body = HtmlBody::new(body_input.unwrap_or_default())?;

        let submitter = match non_blank(input.submitter_identity.as_deref()) {
            Some(raw) => self.policy.submitter.verify(Some(raw))?,
            None => return Err(SubmissionError::missing("submitterIdentity")),
        };

        let notify_address = match non_blank(input.notify_address.as_deref()) {
            Some(raw) => Some(
                EmailAddress::parse(raw).map_err(|e| invalid_field("notifyAddress", e))?,
            ),
            None => self.policy.default_notify_address.clone(),
        };

        let submission = Submission::new(NewSubmission {
            ticket_address,
            subject,
            html_body,
            raw_recipients: input.recipients,
            submitter,
            notify_address,
            metadata: input.metadata,
        });

        let candidates = submission.recipient_candidates();
        let recipients =
            RecipientSet::normalize(&candidates).without(submission.ticket_address());
        let dropped = candidates
            .candidates()
            .into_iter()
            .filter(|c| !c.trim().is_empty() && EmailAddress::parse(c).is_err())
            .count();
        if dropped > 0 {
            tracing::debug!(dropped, "無効な宛先を除外しました");
        }

        if self.policy.require_recipients && recipients.is_empty() {
            return Err(SubmissionError::Validation {
                message: "有効な宛先が 1 件もありません".to_string(),
                missing_fields: vec!["recipients"],
            });
        }

        Ok((submission, recipients))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn invalid_field(field: &str, error: DomainError) -> SubmissionError {
    SubmissionError::Validation {
        message:        format!("{field}: {error}"),
        missing_fields: Vec::new(),
    }
}
