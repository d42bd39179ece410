//! # Dispatch Service ライブラリ
//!
//! 送信受付のユースケース・ハンドラ・ルーター構築を公開する。
//! 統合テストからルーターを直接組み立てられるようにするため、バイナリと分けている。

pub mod app_builder;
pub mod config;
pub mod error;
pub mod handler;
pub mod usecase;
