//! # ドメイン層エラー定義
//!
//! 値オブジェクトの生成時に検出される入力違反を表現する。
//!
//! 送信受付全体の失敗分類（検証エラー・トランスポート利用不可・永続化失敗）は
//! ユースケース層の `SubmissionError` が担う。ここでは個々の値の検証失敗のみを扱う。
//!
//! ## 使用例
//!
//! ```rust
//! use boardnotify_domain::DomainError;
//!
//! fn validate_subject(subject: &str) -> Result<(), DomainError> {
//!     if subject.trim().is_empty() {
//!         return Err(DomainError::Validation("件名は必須です".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(validate_subject(" ").is_err());
//! ```

use thiserror::Error;

/// ドメイン層で発生するエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// - 必須フィールドが未入力
    /// - 文字数制限の超過
    /// - メールアドレスの形式不正
    /// - 申請者のドメインが許可されていない
    #[error("バリデーションエラー: {0}")]
    Validation(String),
}
