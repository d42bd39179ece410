//! # Dispatch Service 設定
//!
//! 環境変数から Dispatch Service の設定を読み込む。
//!
//! 起動時に 1 回だけ読み込み、送信バックエンド・ストア・ユースケースの構築時に注入する。
//! 不正な値は panic せず [`ConfigError`] として返す。

use std::{env, str::FromStr, time::Duration};

use boardnotify_domain::recipient::EmailAddress;
use strum::{Display, EnumString};
use thiserror::Error;

/// 設定読み込みエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// 必須の環境変数が未設定
    #[error("{0} が設定されていません")]
    Missing(&'static str),

    /// 値が不正
    #[error("{var} の値が不正です（{value:?}）: {reason}")]
    Invalid {
        var:    &'static str,
        value:  String,
        reason: String,
    },
}

/// 送信バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum NotificationBackend {
    /// Mailpit（開発）/ SMTP リレー経由で送信
    Smtp,
    /// Amazon SES v2 経由で送信（本番）
    Ses,
    /// 送信しない（ログ出力のみ）
    Noop,
}

/// Dispatch Service の設定
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// バインドアドレス
    pub host:         String,
    /// ポート番号
    pub port:         u16,
    pub submission:   SubmissionConfig,
    pub dispatch:     DispatchConfig,
    pub audit:        AuditConfig,
    pub notification: NotificationConfig,
}

/// 送信受付の設定
#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    /// 主宛先が省略された場合に使うアドレス
    pub default_ticket_address:    Option<EmailAddress>,
    /// 通知先が省略された場合に使うアドレス
    pub default_notify_address:    Option<EmailAddress>,
    /// 申請者として許可するドメイン
    pub allowed_submitter_domains: Vec<String>,
    /// 副宛先 0 件を検証エラーにするか
    pub require_recipients:        bool,
}

/// 配信の設定
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// 副宛先への同時送信数
    pub max_concurrency: usize,
    /// 1 通あたりのタイムアウト
    pub attempt_timeout: Duration,
}

/// 監査レコードの設定
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// DynamoDB エンドポイント URL
    pub dynamodb_endpoint: String,
    /// 監査レコードのテーブル名
    pub table_name:        String,
    /// 書き込みのタイムアウト
    pub write_timeout:     Duration,
}

/// 通知機能の設定
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub backend:      NotificationBackend,
    /// SMTP ホスト（backend=smtp の場合に使用）
    pub smtp_host:    String,
    /// SMTP ポート（backend=smtp の場合に使用）
    pub smtp_port:    u16,
    /// 送信元メールアドレス
    pub from_address: String,
}

/// 環境変数の読み取り元
///
/// テストでは `HashMap` から読み取るクロージャを渡す。
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// 値を取得する（空文字は未設定扱い）
    fn get(&self, var: &'static str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    fn string_or(&self, var: &'static str, default: &str) -> String {
        self.get(var).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(var) {
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            }),
            None => Ok(default),
        }
    }

    fn millis_or(&self, var: &'static str, default: u64) -> Result<Duration, ConfigError> {
        let millis: u64 = self.parse_or(var, default)?;
        if millis == 0 {
            return Err(ConfigError::Invalid {
                var,
                value: millis.to_string(),
                reason: "1 以上である必要があります".to_string(),
            });
        }
        Ok(Duration::from_millis(millis))
    }

    fn address(&self, var: &'static str) -> Result<Option<EmailAddress>, ConfigError> {
        self.get(var)
            .map(|value| {
                EmailAddress::parse(&value).map_err(|e| ConfigError::Invalid {
                    var,
                    reason: e.to_string(),
                    value,
                })
            })
            .transpose()
    }
}

impl ServiceConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意の読み取り元から設定を読み込む
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let port_raw = vars.require("DISPATCH_PORT")?;
        let port = port_raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
            var:    "DISPATCH_PORT",
            value:  port_raw.clone(),
            reason: e.to_string(),
        })?;

        let max_concurrency: usize = vars.parse_or("DISPATCH_MAX_CONCURRENCY", 4)?;
        if max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                var:    "DISPATCH_MAX_CONCURRENCY",
                value:  "0".to_string(),
                reason: "1 以上である必要があります".to_string(),
            });
        }

        let allowed_submitter_domains: Vec<String> = vars
            .string_or("ALLOWED_SUBMITTER_DOMAINS", "shift4.com")
            .split(',')
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        if allowed_submitter_domains.is_empty() {
            return Err(ConfigError::Invalid {
                var:    "ALLOWED_SUBMITTER_DOMAINS",
                value:  String::new(),
                reason: "ドメインを 1 つ以上指定してください".to_string(),
            });
        }

        Ok(Self {
            host: vars.string_or("DISPATCH_HOST", "0.0.0.0"),
            port,
            submission: SubmissionConfig {
                default_ticket_address: vars.address("DEFAULT_TICKET_ADDRESS")?,
                default_notify_address: vars.address("DEFAULT_NOTIFY_ADDRESS")?,
                allowed_submitter_domains,
                require_recipients: vars.parse_or("REQUIRE_RECIPIENTS", false)?,
            },
            dispatch: DispatchConfig {
                max_concurrency,
                attempt_timeout: vars.millis_or("DISPATCH_ATTEMPT_TIMEOUT_MS", 15_000)?,
            },
            audit: AuditConfig {
                dynamodb_endpoint: vars.string_or("DYNAMODB_ENDPOINT", "http://localhost:18000"),
                table_name:        vars.string_or("AUDIT_TABLE_NAME", "submission_audit"),
                write_timeout:     vars.millis_or("AUDIT_WRITE_TIMEOUT_MS", 10_000)?,
            },
            notification: NotificationConfig {
                backend:      vars.parse_or("NOTIFICATION_BACKEND", NotificationBackend::Noop)?,
                smtp_host:    vars.string_or("SMTP_HOST", "localhost"),
                smtp_port:    vars.parse_or("SMTP_PORT", 1025)?,
                from_address: vars.string_or(
                    "NOTIFICATION_FROM_ADDRESS",
                    "noreply@boardnotify.example.com",
                ),
            },
        })
    }
}
