//! # テスト用モック
//!
//! ユースケーステストで使用するインメモリのメール送信・監査レコードストア。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! boardnotify-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use boardnotify_domain::audit::RecordFields;

use crate::{
    error::InfraError,
    notification::{EmailMessage, NotificationError, NotificationSender},
    repository::AuditRecordStore,
};

// ===== MockNotificationSender =====

/// インメモリのメール送信
///
/// 送信に成功したメールを記録する。宛先ごとに失敗・遅延を設定できる。
#[derive(Clone, Default)]
pub struct MockNotificationSender {
    sent_emails:   Arc<Mutex<Vec<EmailMessage>>>,
    attempted:     Arc<Mutex<Vec<String>>>,
    failing:       Arc<Mutex<HashSet<String>>>,
    delays:        Arc<Mutex<HashMap<String, Duration>>>,
    unavailable:   Arc<Mutex<Option<String>>>,
    ready_delay:   Arc<Mutex<Option<Duration>>>,
    ready_checks:  Arc<AtomicUsize>,
    in_flight:     Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定宛先への送信を失敗させる
    pub fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    /// 指定宛先への送信を遅延させる
    pub fn delay_for(&self, address: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(address.to_string(), delay);
    }

    /// 疎通確認を失敗させる
    pub fn set_unavailable(&self, reason: &str) {
        *self.unavailable.lock().unwrap() = Some(reason.to_string());
    }

    /// 疎通確認を遅延させる
    pub fn delay_ready(&self, delay: Duration) {
        *self.ready_delay.lock().unwrap() = Some(delay);
    }

    /// 送信に成功したメール
    pub fn sent_emails(&self) -> Vec<EmailMessage> {
        self.sent_emails.lock().unwrap().clone()
    }

    /// 送信を試みた宛先（試行開始順）
    pub fn attempted_addresses(&self) -> Vec<String> {
        self.attempted.lock().unwrap().clone()
    }

    /// 疎通確認の呼び出し回数
    pub fn ready_checks(&self) -> usize {
        self.ready_checks.load(Ordering::SeqCst)
    }

    /// 同時に実行中だった送信の最大数
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSender for MockNotificationSender {
    async fn ensure_ready(&self) -> Result<(), NotificationError> {
        self.ready_checks.fetch_add(1, Ordering::SeqCst);

        let delay = *self.ready_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.unavailable.lock().unwrap().clone() {
            Some(reason) => Err(NotificationError::Unavailable(reason)),
            None => Ok(()),
        }
    }

    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        self.attempted.lock().unwrap().push(email.to.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = self.delays.lock().unwrap().get(&email.to).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(&email.to) {
            return Err(NotificationError::SendFailed(format!(
                "{} は受信を拒否しました",
                email.to
            )));
        }

        self.sent_emails.lock().unwrap().push(email.clone());
        Ok(())
    }
}

// ===== MockAuditRecordStore =====

/// 保存されたレコード
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub container:     String,
    pub partition_key: String,
    pub row_key:       String,
    pub fields:        RecordFields,
}

/// インメモリの監査レコードストア
#[derive(Clone, Default)]
pub struct MockAuditRecordStore {
    records:              Arc<Mutex<Vec<StoredRecord>>>,
    ensure_calls:         Arc<AtomicUsize>,
    ensure_failures_left: Arc<AtomicUsize>,
    ensure_delay:         Arc<Mutex<Option<Duration>>>,
    fail_create:          Arc<Mutex<bool>>,
    create_delay:         Arc<Mutex<Option<Duration>>>,
}

impl MockAuditRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 次の `times` 回のコンテナ準備を失敗させる
    pub fn fail_ensure_container(&self, times: usize) {
        self.ensure_failures_left.store(times, Ordering::SeqCst);
    }

    /// コンテナ準備を遅延させる
    pub fn delay_ensure_container(&self, delay: Duration) {
        *self.ensure_delay.lock().unwrap() = Some(delay);
    }

    /// レコード書き込みを失敗させる
    pub fn fail_create_record(&self) {
        *self.fail_create.lock().unwrap() = true;
    }

    /// レコード書き込みを遅延させる
    pub fn delay_create_record(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    pub fn records(&self) -> Vec<StoredRecord> {
        self.records.lock().unwrap().clone()
    }

    /// コンテナ準備の呼び出し回数
    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditRecordStore for MockAuditRecordStore {
    async fn ensure_container(&self, container: &str) -> Result<(), InfraError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.ensure_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .ensure_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(InfraError::dynamo_db(format!(
                "テーブル '{container}' の作成に失敗"
            )));
        }

        Ok(())
    }

    async fn create_record(
        &self,
        container: &str,
        partition_key: &str,
        row_key: &str,
        fields: &RecordFields,
    ) -> Result<(), InfraError> {
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_create.lock().unwrap() {
            return Err(InfraError::dynamo_db("監査レコードの記録に失敗"));
        }

        let mut records = self.records.lock().unwrap();
        if records
            .iter()
            .any(|r| r.container == container && r.row_key == row_key)
        {
            return Err(InfraError::dynamo_db(format!(
                "行キー '{row_key}' は既に存在します"
            )));
        }

        records.push(StoredRecord {
            container:     container.to_string(),
            partition_key: partition_key.to_string(),
            row_key:       row_key.to_string(),
            fields:        fields.clone(),
        });
        Ok(())
    }
}
