//! # ルーター構築
//!
//! ルーティングと HTTP レイヤーの組み立てを担当する。
//! `main.rs` は依存の初期化とサーバー起動に集中する。

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use boardnotify_shared::observability::{MakeRequestUuidV7, make_request_span};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::handler::{SubmissionState, health_check, send_email};

/// ルーターを構築する
///
/// レイヤーは下から順に適用される:
/// 1. SetRequestIdLayer（最外）: UUID v7 を生成（またはクライアント提供値を使用）
/// 2. TraceLayer: request_id を含むスパンを作成
/// 3. PropagateRequestIdLayer: レスポンスヘッダーに X-Request-Id をコピー
pub fn build_router(state: Arc<SubmissionState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/send-email", post(send_email))
        .route("/api/sendEmail", post(send_email))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
}
