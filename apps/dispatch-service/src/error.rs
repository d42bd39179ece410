//! # Dispatch Service エラー定義
//!
//! 送信受付のエラーと、HTTP レスポンス（RFC 9457 Problem Details）への変換を定義する。
//!
//! | エラー | ステータス | type |
//! |--------|-----------|------|
//! | `Validation` | 400 | `validation-error`（`missingFields` 拡張） |
//! | `TransportUnavailable` | 503 | `transport-unavailable` |
//! | `Persistence` | 502 | `audit-persistence-failed`（`delivered` 拡張） |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use boardnotify_domain::{DomainError, dispatch::DispatchReport};
use boardnotify_shared::ErrorResponse;
use serde_json::json;
use thiserror::Error;

use crate::usecase::DispatchError;

/// 送信受付で発生するエラー
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// 入力の検証に失敗（I/O は行っていない）
    #[error("入力が不正です: {message}")]
    Validation {
        message:        String,
        /// 欠落していたフィールド名（camelCase）
        missing_fields: Vec<&'static str>,
    },

    /// 配信ゲートウェイが利用できない（1 通も送信していない）
    #[error("配信ゲートウェイが利用できません: {0}")]
    TransportUnavailable(String),

    /// 配信後の監査記録に失敗
    ///
    /// 配信は完了しているため、結果を呼び出し元へ返す。
    #[error("監査レコードの記録に失敗しました: {message}")]
    Persistence {
        report:  DispatchReport,
        message: String,
    },
}

impl SubmissionError {
    /// 単一フィールドの欠落
    pub fn missing(field: &'static str) -> Self {
        Self::Validation {
            message:        format!("{field} は必須です"),
            missing_fields: vec![field],
        }
    }
}

impl From<DomainError> for SubmissionError {
    fn from(e: DomainError) -> Self {
        Self::Validation {
            message:        e.to_string(),
            missing_fields: Vec::new(),
        }
    }
}

impl From<DispatchError> for SubmissionError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::TransportUnavailable(reason) => Self::TransportUnavailable(reason),
        }
    }
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        let body = match self {
            SubmissionError::Validation {
                message,
                missing_fields,
            } => {
                let body = ErrorResponse::validation_error(message);
                if missing_fields.is_empty() {
                    body
                } else {
                    body.with_extension("missingFields", json!(missing_fields))
                }
            }
            SubmissionError::TransportUnavailable(reason) => {
                ErrorResponse::transport_unavailable(reason)
            }
            SubmissionError::Persistence { report, message } => match serde_json::to_value(&report)
            {
                Ok(delivered) => ErrorResponse::audit_persistence_failed(message)
                    .with_extension("delivered", delivered),
                Err(e) => {
                    tracing::error!("配信結果のシリアライズに失敗: {}", e);
                    ErrorResponse::internal_error()
                }
            },
        };

        let status =
            StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}
