//! # BoardNotify ドメイン層
//!
//! 送信受付・配信・監査記録の中核となるドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **I/O を持たない**: メール送信や永続化はインフラ層の trait 越しに行う
//! - **不変性**: 送信内容（[`submission::Submission`]）、配信結果
//!   （[`dispatch::DispatchOutcome`]）、監査レコード（[`audit::AuditRecord`]）は
//!   生成後に変更されない
//! - **全域関数**: 宛先の正規化は失敗しない。不正な宛先は黙って除外する
//!
//! ## 依存関係の方向
//!
//! ```text
//! dispatch-service → infra → domain
//!        ↘                 ↗
//!             shared
//! ```
//!
//! ## モジュール構成
//!
//! - [`recipient`] - メールアドレスの検証と宛先リストの正規化
//! - [`submission`] - 送信内容と申請者ドメイン制限
//! - [`dispatch`] - 宛先ごとの配信結果と集計
//! - [`audit`] - 監査レコードと行キー生成
//! - [`clock`] - 時刻プロバイダ
//! - [`error`] - ドメインエラー
//!
//! ## 使用例
//!
//! ```rust
//! use boardnotify_domain::recipient::{RawRecipients, RecipientSet};
//!
//! let raw = RawRecipients::Single("A@x.com, a@x.com ,b@x.com".to_string());
//! let recipients = RecipientSet::normalize(&raw);
//!
//! assert_eq!(recipients.to_strings(), vec!["a@x.com", "b@x.com"]);
//! ```

#[macro_use]
mod macros;

pub mod audit;
pub mod clock;
pub mod dispatch;
pub mod error;
pub mod recipient;
pub mod submission;

pub use error::DomainError;
