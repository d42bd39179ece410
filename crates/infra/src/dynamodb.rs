//! # DynamoDB 接続管理
//!
//! 監査レコードの格納先である Amazon DynamoDB への接続管理を行う。
//!
//! ## 設計方針
//!
//! - **ローカル開発**: DynamoDB Local を使用（`-sharedDb -inMemory`）
//! - **テーブル自動作成**: 最初の書き込み前にテーブルが存在しなければ作成（冪等）
//!   し、`ACTIVE` になるまで待つ
//! - **TTL なし**: 監査レコードは追記専用で、期限切れ削除もしない
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use boardnotify_infra::dynamodb;
//!
//! async fn setup() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = dynamodb::create_client("http://localhost:18000").await;
//!     dynamodb::ensure_audit_table(&client, "submission_audit").await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use aws_sdk_dynamodb::{
    Client,
    client::Waiters,
    types::{
        AttributeDefinition,
        BillingMode,
        KeySchemaElement,
        KeyType,
        ScalarAttributeType,
        TableStatus,
    },
};

use crate::InfraError;

/// パーティションキーの属性名
pub const PARTITION_KEY_ATTRIBUTE: &str = "partition_key";

/// ソートキー（行キー）の属性名
pub const ROW_KEY_ATTRIBUTE: &str = "row_key";

/// テーブルが `ACTIVE` になるまでの待ち時間の上限
pub const TABLE_READY_TIMEOUT: Duration = Duration::from_secs(60);

/// DynamoDB クライアントを作成する
///
/// DynamoDB Local 用のクライアント。認証情報はダミー値を使用する
/// （DynamoDB Local の `-sharedDb` モードでは認証情報を検証しない）。
pub async fn create_client(endpoint: &str) -> Client {
    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .endpoint_url(endpoint)
        .region(aws_config::Region::new("ap-northeast-1"))
        // DynamoDB Local はクレデンシャルを検証しないが、SDK はプロバイダが必要
        .credentials_provider(aws_sdk_dynamodb::config::Credentials::new(
            "local", "local", None, None, "local",
        ))
        .load()
        .await;

    Client::new(&config)
}

fn key_schema(attribute: &str, key_type: KeyType) -> Result<KeySchemaElement, InfraError> {
    KeySchemaElement::builder()
        .attribute_name(attribute)
        .key_type(key_type)
        .build()
        .map_err(|e| InfraError::dynamo_db(format!("KeySchema 構築エラー: {e}")))
}

fn string_attribute(attribute: &str) -> Result<AttributeDefinition, InfraError> {
    AttributeDefinition::builder()
        .attribute_name(attribute)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(|e| InfraError::dynamo_db(format!("AttributeDefinition 構築エラー: {e}")))
}

/// 監査レコードテーブルが存在しなければ作成する（冪等）
///
/// テーブルスキーマ:
/// - PK: `partition_key` (String): 論理カテゴリ（`"submission"`）
/// - SK: `row_key` (String): `<13 桁ミリ秒>-<16 桁 16 進乱数>`
///
/// 既存テーブル、および並行作成による `ResourceInUseException` は成功として扱う。
/// いずれの場合もテーブルが `ACTIVE` になってから返る。
#[tracing::instrument(skip(client), level = "debug")]
pub async fn ensure_audit_table(client: &Client, table_name: &str) -> Result<(), InfraError> {
    match client.describe_table().table_name(table_name).send().await {
        Ok(output) => {
            let status = output.table().and_then(|t| t.table_status());
            if status == Some(&TableStatus::Active) {
                tracing::debug!("テーブル '{}' は既に存在します", table_name);
                return Ok(());
            }
            tracing::debug!("テーブル '{}' は準備中です: {:?}", table_name, status);
            return wait_until_active(client, table_name).await;
        }
        Err(err) => {
            // ResourceNotFoundException の場合のみテーブル作成に進む
            let not_found = err
                .as_service_error()
                .is_some_and(|e| e.is_resource_not_found_exception());
            if !not_found {
                return Err(InfraError::dynamo_db(format!(
                    "テーブル '{table_name}' の確認に失敗: {err}"
                )));
            }
        }
    }

    tracing::info!("テーブル '{}' を作成します", table_name);

    let create_result = client
        .create_table()
        .table_name(table_name)
        .key_schema(key_schema(PARTITION_KEY_ATTRIBUTE, KeyType::Hash)?)
        .key_schema(key_schema(ROW_KEY_ATTRIBUTE, KeyType::Range)?)
        .attribute_definitions(string_attribute(PARTITION_KEY_ATTRIBUTE)?)
        .attribute_definitions(string_attribute(ROW_KEY_ATTRIBUTE)?)
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await;

    if let Err(err) = create_result {
        let in_use = err
            .as_service_error()
            .is_some_and(|e| e.is_resource_in_use_exception());
        if !in_use {
            return Err(InfraError::dynamo_db(format!(
                "テーブル '{table_name}' の作成に失敗: {err}"
            )));
        }
        tracing::debug!(
            "テーブル '{}' は既に作成中または存在します（ResourceInUseException）",
            table_name
        );
        return wait_until_active(client, table_name).await;
    }

    wait_until_active(client, table_name).await?;
    tracing::info!("テーブル '{}' を作成しました", table_name);

    Ok(())
}

/// テーブルが `ACTIVE` になるまで待つ
async fn wait_until_active(client: &Client, table_name: &str) -> Result<(), InfraError> {
    client
        .wait_until_table_exists()
        .table_name(table_name)
        .wait(TABLE_READY_TIMEOUT)
        .await
        .map(|_| ())
        .map_err(|e| {
            InfraError::dynamo_db(format!("テーブル '{table_name}' が ACTIVE になりません: {e}"))
        })
}
