//! # リポジトリ実装
//!
//! 監査レコードの永続化を担当するストアの trait と実装を提供する。
//!
//! ## 設計方針
//!
//! - **依存性逆転**: ユースケース層は trait のみに依存し、DynamoDB の詳細を知らない
//! - **テスタビリティ**: trait 経由でモック可能な設計

pub mod audit_record_repository;

pub use audit_record_repository::{AuditRecordStore, DynamoDbAuditRecordStore};
