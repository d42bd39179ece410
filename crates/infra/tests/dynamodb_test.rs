//! DynamoDB 接続・テーブル自動作成の統合テスト
//!
//! DynamoDB Local を使用したテスト。
//!
//! 実行方法:
//! ```bash
//! docker run -p 18000:8000 amazon/dynamodb-local -jar DynamoDBLocal.jar -sharedDb -inMemory
//! cargo test -p boardnotify-infra --test dynamodb_test -- --ignored
//! ```

use aws_sdk_dynamodb::types::{AttributeValue, KeyType, TableStatus};
use boardnotify_infra::dynamodb;

/// テスト用の DynamoDB エンドポイント
///
/// 優先順位:
/// 1. `DYNAMODB_ENDPOINT`
/// 2. `DYNAMODB_PORT` から構築
/// 3. フォールバック: `http://localhost:18000`
fn dynamodb_endpoint() -> String {
    std::env::var("DYNAMODB_ENDPOINT").unwrap_or_else(|_| {
        let port = std::env::var("DYNAMODB_PORT").unwrap_or_else(|_| "18000".to_string());
        format!("http://localhost:{port}")
    })
}

#[tokio::test]
#[ignore = "DynamoDB Local が必要"]
async fn test_create_clientがエンドポイントに接続できる() {
    let client = dynamodb::create_client(&dynamodb_endpoint()).await;

    // ListTables が呼べれば接続成功
    let result = client.list_tables().send().await;
    assert!(
        result.is_ok(),
        "DynamoDB への接続に失敗: {:?}",
        result.err()
    );
}

#[tokio::test]
#[ignore = "DynamoDB Local が必要"]
async fn test_ensure_audit_tableが初回呼び出しでテーブルを作成する() {
    let client = dynamodb::create_client(&dynamodb_endpoint()).await;

    // ランダムなテーブル名で分離（他テストとの競合を防止）
    let table_name = format!("test_submission_audit_{}", uuid::Uuid::now_v7());

    let result = dynamodb::ensure_audit_table(&client, &table_name).await;
    assert!(result.is_ok(), "テーブル作成に失敗: {:?}", result.err());

    let describe = client.describe_table().table_name(&table_name).send().await;
    let table = describe
        .expect("テーブルが存在しません")
        .table
        .expect("テーブル情報がありません");
    let key_schema = table.key_schema();

    assert!(
        key_schema
            .iter()
            .any(|ks| ks.attribute_name() == "partition_key" && ks.key_type == KeyType::Hash),
        "partition_key HASH キーが見つかりません"
    );
    assert!(
        key_schema
            .iter()
            .any(|ks| ks.attribute_name() == "row_key" && ks.key_type == KeyType::Range),
        "row_key RANGE キーが見つかりません"
    );

    // クリーンアップ
    let _ = client.delete_table().table_name(&table_name).send().await;
}

#[tokio::test]
#[ignore = "DynamoDB Local が必要"]
async fn test_ensure_audit_tableが既存テーブルに対して冪等に動作する() {
    let client = dynamodb::create_client(&dynamodb_endpoint()).await;
    let table_name = format!("test_submission_audit_{}", uuid::Uuid::now_v7());

    let result1 = dynamodb::ensure_audit_table(&client, &table_name).await;
    assert!(result1.is_ok(), "1回目のテーブル作成に失敗: {:?}", result1.err());

    // 2回目: 既存テーブルはエラーにならない
    let result2 = dynamodb::ensure_audit_table(&client, &table_name).await;
    assert!(result2.is_ok(), "2回目の呼び出しでエラー: {:?}", result2.err());

    let _ = client.delete_table().table_name(&table_name).send().await;
}

#[tokio::test]
#[ignore = "DynamoDB Local が必要"]
async fn test_ensure_audit_tableはテーブルがactiveになってから返る() {
    let client = dynamodb::create_client(&dynamodb_endpoint()).await;
    let table_name = format!("test_submission_audit_{}", uuid::Uuid::now_v7());

    dynamodb::ensure_audit_table(&client, &table_name)
        .await
        .expect("テーブル作成に失敗");

    let status = client
        .describe_table()
        .table_name(&table_name)
        .send()
        .await
        .expect("テーブルが存在しません")
        .table
        .and_then(|t| t.table_status);
    assert_eq!(status, Some(TableStatus::Active));

    // 作成直後の書き込みが成功する
    let put = client
        .put_item()
        .table_name(&table_name)
        .item("partition_key", AttributeValue::S("submission".to_string()))
        .item("row_key", AttributeValue::S("1700000000123-0000000000000001".to_string()))
        .send()
        .await;
    assert!(put.is_ok(), "作成直後の書き込みに失敗: {:?}", put.err());

    let _ = client.delete_table().table_name(&table_name).send().await;
}
