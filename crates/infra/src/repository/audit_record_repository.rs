//! # AuditRecordStore
//!
//! 監査レコードの永続化を担当するストア。
//!
//! ## 設計方針
//!
//! - **DynamoDB**: PK = `partition_key`、SK = `row_key`
//! - **追記専用**: 同じ行キーへの上書きは条件付き書き込みで拒否する
//! - **コンテナ準備の冪等性**: 「既に存在する」は成功扱い

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::{Client, types::AttributeValue};
use boardnotify_domain::audit::{FieldValue, RecordFields};

use crate::{
    InfraError,
    dynamodb::{self, PARTITION_KEY_ATTRIBUTE, ROW_KEY_ATTRIBUTE},
};

/// 監査レコードストアトレイト
#[async_trait]
pub trait AuditRecordStore: Send + Sync {
    /// コンテナ（テーブル）が存在しなければ作成する
    ///
    /// 既に存在する場合は成功として扱う。
    async fn ensure_container(&self, container: &str) -> Result<(), InfraError>;

    /// レコードを 1 件追記する
    async fn create_record(
        &self,
        container: &str,
        partition_key: &str,
        row_key: &str,
        fields: &RecordFields,
    ) -> Result<(), InfraError>;
}

/// DynamoDB 実装の AuditRecordStore
pub struct DynamoDbAuditRecordStore {
    client: Client,
}

impl DynamoDbAuditRecordStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// レコードを DynamoDB の項目に変換する
fn to_item(
    partition_key: &str,
    row_key: &str,
    fields: &RecordFields,
) -> HashMap<String, AttributeValue> {
    let mut item: HashMap<String, AttributeValue> = fields
        .iter()
        .map(|(name, value)| {
            let attribute = match value {
                FieldValue::Text(s) => AttributeValue::S(s.clone()),
                FieldValue::Number(n) => AttributeValue::N(n.to_string()),
            };
            (name.clone(), attribute)
        })
        .collect();

    item.insert(
        PARTITION_KEY_ATTRIBUTE.to_string(),
        AttributeValue::S(partition_key.to_string()),
    );
    item.insert(
        ROW_KEY_ATTRIBUTE.to_string(),
        AttributeValue::S(row_key.to_string()),
    );

    item
}

#[async_trait]
impl AuditRecordStore for DynamoDbAuditRecordStore {
    #[tracing::instrument(skip_all, level = "debug", fields(container = %container))]
    async fn ensure_container(&self, container: &str) -> Result<(), InfraError> {
        dynamodb::ensure_audit_table(&self.client, container).await
    }

    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(container = %container, row_key = %row_key)
    )]
    async fn create_record(
        &self,
        container: &str,
        partition_key: &str,
        row_key: &str,
        fields: &RecordFields,
    ) -> Result<(), InfraError> {
        self.client
            .put_item()
            .table_name(container)
            .set_item(Some(to_item(partition_key, row_key, fields)))
            .condition_expression("attribute_not_exists(#rk)")
            .expression_attribute_names("#rk", ROW_KEY_ATTRIBUTE)
            .send()
            .await
            .map_err(|e| InfraError::dynamo_db(format!("監査レコードの記録に失敗: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_レコードのフィールドが属性値に変換される() {
        let fields = RecordFields::from([
            ("subject".to_string(), FieldValue::Text("Boarding".to_string())),
            ("sent_count".to_string(), FieldValue::Number(2)),
        ]);

        let item = to_item("submission", "0000000000042-0000000000000abc", &fields);

        assert_eq!(item.len(), 4);
        assert_eq!(
            item.get("partition_key"),
            Some(&AttributeValue::S("submission".to_string()))
        );
        assert_eq!(
            item.get("row_key"),
            Some(&AttributeValue::S("0000000000042-0000000000000abc".to_string()))
        );
        assert_eq!(
            item.get("subject"),
            Some(&AttributeValue::S("Boarding".to_string()))
        );
        assert_eq!(
            item.get("sent_count"),
            Some(&AttributeValue::N("2".to_string()))
        );
    }

    #[test]
    fn トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DynamoDbAuditRecordStore>();
    }
}
