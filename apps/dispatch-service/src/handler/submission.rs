//! # 送信受付ハンドラ
//!
//! ## エンドポイント
//!
//! - `POST /api/send-email` - 送信を受け付け、配信結果と監査レコード ID を返す
//! - `POST /api/sendEmail` - 同上（既存フロントエンド向けの別名）
//!
//! ## リクエスト例
//!
//! ```json
//! {
//!   "ticketAddress": "boarding@tickets.example.com",
//!   "subject": "Radisson Boarding",
//!   "htmlBody": "<p>MID 42</p>",
//!   "recipients": ["m1@x.com", "m2@x.com"],
//!   "submitterIdentity": "ops@shift4.com",
//!   "merchantId": "42"
//! }
//! ```
//!
//! 既知フィールド以外のトップレベル要素はメタデータとして監査レコードに残る。

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use boardnotify_domain::{dispatch::DispatchReport, recipient::RawRecipients};
use boardnotify_shared::{ApiResponse, ErrorResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::usecase::{SubmissionCoordinator, SubmissionInput, SubmissionReceipt};

/// 送信受付 API の共有状態
pub struct SubmissionState {
    pub coordinator: SubmissionCoordinator,
}

// --- リクエスト/レスポンス型 ---

/// 送信受付リクエスト
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    #[serde(default, alias = "to")]
    pub ticket_address:     Option<String>,
    #[serde(default)]
    pub subject:            Option<String>,
    #[serde(default, alias = "body")]
    pub html_body:          Option<String>,
    /// 文字列（カンマ区切り可）または文字列の配列
    #[serde(default)]
    pub recipients:         Option<Value>,
    #[serde(default)]
    pub submitter_identity: Option<String>,
    #[serde(default)]
    pub notify_address:     Option<String>,
    #[serde(flatten)]
    pub metadata:           BTreeMap<String, Value>,
}

impl From<SendEmailRequest> for SubmissionInput {
    fn from(request: SendEmailRequest) -> Self {
        Self {
            ticket_address:     request.ticket_address,
            subject:            request.subject,
            html_body:          request.html_body,
            recipients:         RawRecipients::from_json(request.recipients.as_ref()),
            submitter_identity: request.submitter_identity,
            notify_address:     request.notify_address,
            metadata:           request.metadata,
        }
    }
}

/// 送信受付レスポンス
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponseData {
    pub delivered: DispatchReport,
    pub record_id: String,
}

impl From<SubmissionReceipt> for SendEmailResponseData {
    fn from(receipt: SubmissionReceipt) -> Self {
        Self {
            delivered: receipt.delivered,
            record_id: receipt.record_id.to_string(),
        }
    }
}

// --- ハンドラ ---

/// POST /api/send-email
///
/// JSON として解釈できないボディは 400 `bad-request` を返す。
pub async fn send_email(
    State(state): State<Arc<SubmissionState>>,
    payload: Result<Json<SendEmailRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            tracing::debug!("リクエストボディを解釈できません: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(rejection.body_text())),
            )
                .into_response();
        }
    };

    match state.coordinator.handle(request.into()).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(ApiResponse::new(SendEmailResponseData::from(receipt))),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
