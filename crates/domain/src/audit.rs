//! # 監査レコード
//!
//! 1 回の送信受付につき 1 件、送信内容と配信結果の要約を追記専用で永続化する。
//!
//! ## キー設計
//!
//! | キー | 値 |
//! |------|-----|
//! | パーティションキー | 固定値 `"submission"` |
//! | 行キー | `<13 桁ゼロ埋め UNIX ミリ秒>-<16 桁 16 進乱数>` |
//!
//! 行キーは辞書順が時系列順と一致する。同一ミリ秒の衝突は乱数部で回避する。
//!
//! ## サイズ制限
//!
//! ストアの 1 項目あたりの上限を超えないよう、本文はプレビューのみ保存し、
//! 宛先一覧・配信結果・メタデータの JSON は上限バイト数で切り詰める。
//! 宛先の件数は `recipient_count` に切り詰め前の値を残す。

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{dispatch::DispatchReport, recipient::RecipientSet, submission::Submission};

/// 監査レコードのパーティションキー
pub const SUBMISSION_PARTITION: &str = "submission";

/// 本文プレビューの最大文字数
pub const BODY_PREVIEW_CHARS: usize = 2_000;

/// JSON シリアライズしたフィールドの最大バイト数
pub const MAX_SERIALIZED_FIELD_BYTES: usize = 32 * 1024;

/// 監査レコードの行キー
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    /// 時刻と乱数から行キーを生成する
    pub fn generate(now: DateTime<Utc>) -> Self {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        Self::from_parts(millis, rand::random::<u64>())
    }

    pub fn from_parts(millis: u64, suffix: u64) -> Self {
        Self(format!("{millis:013}-{suffix:016x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ストアに書き込むフィールド値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Number(i64),
}

impl FieldValue {
    fn count(n: usize) -> Self {
        Self::Number(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

/// フィールド名 → 値
pub type RecordFields = BTreeMap<String, FieldValue>;

/// 監査レコード
///
/// 生成後に変更されない。このシステムは更新も削除もしない。
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    record_id:  RecordId,
    created_at: DateTime<Utc>,
    submission: Submission,
    recipients: RecipientSet,
    report:     DispatchReport,
}

impl AuditRecord {
    pub fn new(
        submission: &Submission,
        recipients: &RecipientSet,
        report: &DispatchReport,
        created_at: DateTime<Utc>,
        record_id: RecordId,
    ) -> Self {
        Self {
            record_id,
            created_at,
            submission: submission.clone(),
            recipients: recipients.clone(),
            report: report.clone(),
        }
    }

    pub fn partition_key(&self) -> &'static str {
        SUBMISSION_PARTITION
    }

    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// ストアに書き込むフィールドを組み立てる
    pub fn fields(&self) -> Result<RecordFields, serde_json::Error> {
        let submission = &self.submission;
        let body = submission.html_body().as_str();

        let recipients = serde_json::to_string(&self.recipients)?;
        let outcomes = serde_json::to_string(self.report.outcomes())?;
        let metadata = serde_json::to_string(submission.metadata())?;

        let text = |s: &str| FieldValue::Text(s.to_string());

        Ok(BTreeMap::from([
            (
                "created_at".to_string(),
                FieldValue::Text(
                    self.created_at
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
            ),
            ("submitter".to_string(), text(submission.submitter().as_str())),
            (
                "ticket_address".to_string(),
                text(submission.ticket_address().as_str()),
            ),
            (
                "notify_address".to_string(),
                text(submission.notify_address().map_or("", |a| a.as_str())),
            ),
            ("subject".to_string(), text(submission.subject().as_str())),
            (
                "body_preview".to_string(),
                FieldValue::Text(preview(body, BODY_PREVIEW_CHARS)),
            ),
            (
                "body_length".to_string(),
                FieldValue::count(submission.html_body().char_len()),
            ),
            (
                "recipients".to_string(),
                FieldValue::Text(bound_serialized(recipients, MAX_SERIALIZED_FIELD_BYTES)),
            ),
            (
                "recipient_count".to_string(),
                FieldValue::count(self.recipients.len()),
            ),
            (
                "outcomes".to_string(),
                FieldValue::Text(bound_serialized(outcomes, MAX_SERIALIZED_FIELD_BYTES)),
            ),
            (
                "sent_count".to_string(),
                FieldValue::count(self.report.sent_count()),
            ),
            (
                "failed_count".to_string(),
                FieldValue::count(self.report.failed_count()),
            ),
            (
                "metadata".to_string(),
                FieldValue::Text(bound_serialized(metadata, MAX_SERIALIZED_FIELD_BYTES)),
            ),
        ]))
    }
}

/// 先頭 `max_chars` 文字を返す。切り詰めた場合は `…` を付ける
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// シリアライズ済み JSON を `max_bytes` 以内に切り詰める
///
/// 文字境界で切り、`…[truncated: N bytes]`（N は省いたバイト数）を付ける。
pub fn bound_serialized(json: String, max_bytes: usize) -> String {
    if json.len() <= max_bytes {
        return json;
    }

    let mut cut = max_bytes;
    while !json.is_char_boundary(cut) {
        cut -= 1;
    }

    format!("{}…[truncated: {} bytes]", &json[..cut], json.len() - cut)
}
