//! # 送信内容
//!
//! 1 回の送信受付で扱う内容（件名・本文・宛先・申請者・付帯メタデータ）を表現する。
//!
//! ## 不変条件
//!
//! - [`Submission`] は生成後に変更されない（フィールドは非公開、getter のみ）
//! - 件名・本文は trim 後に空でない
//! - 主宛先（チケットアドレス）・申請者・通知先は正規化済みメールアドレス

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    DomainError,
    recipient::{EmailAddress, RawRecipients},
};

define_validated_string! {
    /// 件名（最大 998 文字）
    ///
    /// RFC 5322 の 1 行あたりの上限に合わせている。
    pub struct Subject {
        label: "件名",
        max_length: 998,
    }
}

define_validated_string! {
    /// HTML 本文（最大 1,000,000 文字）
    ///
    /// 本文の描画・サニタイズはこのシステムの責務外。受け取った内容をそのまま配信する。
    pub struct HtmlBody {
        label: "本文",
        max_length: 1_000_000,
    }
}

/// 付帯メタデータ
///
/// 受付ペイロードのうち既知フィールド以外のトップレベル要素。加工せず監査レコードに残す。
pub type Metadata = BTreeMap<String, Value>;

/// 申請者ドメイン制限
///
/// 申請者のメールアドレスのドメインが許可リストに完全一致（大文字小文字無視）
/// する場合のみ受け付ける。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitterPolicy {
    allowed_domains: Vec<String>,
}

impl SubmitterPolicy {
    pub fn new<I, S>(allowed_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_domains: allowed_domains
                .into_iter()
                .map(|domain| domain.as_ref().trim().to_lowercase())
                .filter(|domain| !domain.is_empty())
                .collect(),
        }
    }

    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed_domains
    }

    /// 申請者を検証し、正規化済みアドレスを返す
    ///
    /// # エラー
    ///
    /// - 未指定または空文字
    /// - メールアドレスとして不正
    /// - ドメインが許可リストにない
    pub fn verify(&self, submitter: Option<&str>) -> Result<EmailAddress, DomainError> {
        let raw = submitter
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DomainError::Validation("申請者は必須です".to_string()))?;

        let address = EmailAddress::parse(raw)?;

        if !self
            .allowed_domains
            .iter()
            .any(|domain| domain == address.domain())
        {
            return Err(DomainError::Validation(format!(
                "申請者のドメインは許可されていません: {}",
                address.domain()
            )));
        }

        Ok(address)
    }
}

/// [`Submission`] の生成パラメータ
pub struct NewSubmission {
    pub ticket_address: EmailAddress,
    pub subject: Subject,
    pub html_body: HtmlBody,
    pub raw_recipients: RawRecipients,
    pub submitter: EmailAddress,
    pub notify_address: Option<EmailAddress>,
    pub metadata: Metadata,
}

/// 検証済みの送信内容
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    ticket_address: EmailAddress,
    subject: Subject,
    html_body: HtmlBody,
    raw_recipients: RawRecipients,
    submitter: EmailAddress,
    notify_address: Option<EmailAddress>,
    metadata: Metadata,
}

impl Submission {
    pub fn new(params: NewSubmission) -> Self {
        Self {
            ticket_address: params.ticket_address,
            subject: params.subject,
            html_body: params.html_body,
            raw_recipients: params.raw_recipients,
            submitter: params.submitter,
            notify_address: params.notify_address,
            metadata: params.metadata,
        }
    }

    /// 主宛先（チケットアドレス）
    pub fn ticket_address(&self) -> &EmailAddress {
        &self.ticket_address
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn html_body(&self) -> &HtmlBody {
        &self.html_body
    }

    /// 受付時の宛先入力（未正規化）
    pub fn raw_recipients(&self) -> &RawRecipients {
        &self.raw_recipients
    }

    pub fn submitter(&self) -> &EmailAddress {
        &self.submitter
    }

    pub fn notify_address(&self) -> Option<&EmailAddress> {
        self.notify_address.as_ref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// 正規化対象の宛先候補
    ///
    /// 通知先アドレスがあれば先頭に差し込む。
    pub fn recipient_candidates(&self) -> RawRecipients {
        match &self.notify_address {
            Some(notify) => self.raw_recipients.with_leading(notify.as_str()),
            None => self.raw_recipients.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::recipient::RecipientSet;

    #[fixture]
    fn policy() -> SubmitterPolicy {
        SubmitterPolicy::new(["shift4.com", " Example.ORG "])
    }

    fn addr(s: &str) -> EmailAddress {
        EmailAddress::parse(s).unwrap()
    }

    fn submission(raw: RawRecipients, notify: Option<&str>) -> Submission {
        Submission::new(NewSubmission {
            ticket_address: addr("ticket@x.com"),
            subject: Subject::new("Boarding").unwrap(),
            html_body: HtmlBody::new("<p>hello</p>").unwrap(),
            raw_recipients: raw,
            submitter: addr("ops@shift4.com"),
            notify_address: notify.map(addr),
            metadata: Metadata::new(),
        })
    }

    // ===== Subject / HtmlBody =====

    #[test]
    fn test_件名は前後の空白を除去する() {
        let subject = Subject::new("  Boarding  ").unwrap();

        assert_eq!(subject.as_str(), "Boarding");
        assert_eq!(subject.char_len(), 8);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_空の件名はエラー(#[case] input: &str) {
        assert!(Subject::new(input).is_err());
    }

    #[test]
    fn test_件名の最大文字数を超えるとエラー() {
        assert!(Subject::new("あ".repeat(998)).is_ok());
        assert!(Subject::new("あ".repeat(999)).is_err());
    }

    #[test]
    fn test_空の本文はエラー() {
        let result = HtmlBody::new("\n\t ");

        assert_eq!(
            result,
            Err(DomainError::Validation("本文は必須です".to_string()))
        );
    }

    // ===== SubmitterPolicy =====

    #[rstest]
    #[case("ops@shift4.com", "ops@shift4.com")]
    #[case(" Ops@SHIFT4.com ", "ops@shift4.com")]
    #[case("someone@example.org", "someone@example.org")]
    fn test_許可ドメインの申請者を受け入れる(
        policy: SubmitterPolicy,
        #[case] input: &str,
        #[case] expected: &str,
    ) {
        let result = policy.verify(Some(input)).unwrap();

        assert_eq!(result.as_str(), expected);
    }

    #[rstest]
    #[case::未指定(None)]
    #[case::空文字(Some("  "))]
    #[case::形式不正(Some("ops"))]
    #[case::許可外ドメイン(Some("ops@gmail.com"))]
    #[case::サブドメイン(Some("ops@mail.shift4.com"))]
    #[case::接尾一致のみ(Some("ops@evilshift4.com"))]
    fn test_不正な申請者を拒否する(policy: SubmitterPolicy, #[case] input: Option<&str>) {
        assert!(matches!(
            policy.verify(input),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_空のドメイン指定は無視される() {
        let policy = SubmitterPolicy::new(["shift4.com", "", "  "]);

        assert_eq!(policy.allowed_domains(), &["shift4.com".to_string()]);
    }

    // ===== Submission =====

    #[test]
    fn test_通知先アドレスが宛先候補の先頭に入る() {
        let s = submission(
            RawRecipients::Single("b@x.com, notify@x.com".to_string()),
            Some("notify@x.com"),
        );

        let set = RecipientSet::normalize(&s.recipient_candidates());

        assert_eq!(set.to_strings(), vec!["notify@x.com", "b@x.com"]);
    }

    #[test]
    fn test_通知先アドレスがなければ宛先入力をそのまま使う() {
        let raw = RawRecipients::List(vec!["a@x.com".to_string()]);
        let s = submission(raw.clone(), None);

        assert_eq!(s.recipient_candidates(), raw);
        assert_eq!(s.notify_address(), None);
    }
}
