//! # 配信結果
//!
//! 宛先ごとの配信試行の結果と、1 回の送信受付分の集計を表現する。
//!
//! 宛先単位の失敗はエラーではなくデータとして扱う。1 件の失敗が他の宛先への
//! 配信や監査記録を妨げないようにするため。

use serde::{Serialize, ser::SerializeStruct};
use strum::{Display, EnumString, IntoStaticStr};

use crate::recipient::EmailAddress;

/// 配信対象の役割
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetRole {
    /// 主宛先（チケットアドレス）
    Primary,
    /// 副宛先（正規化済み宛先集合の各要素）
    Secondary,
}

/// 配信状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed { error: String },
}

impl DeliveryStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// 1 宛先分の配信結果
///
/// 試行完了時に生成され、以後変更されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    target: EmailAddress,
    role:   TargetRole,
    #[serde(flatten)]
    status: DeliveryStatus,
}

impl DispatchOutcome {
    pub fn sent(target: EmailAddress, role: TargetRole) -> Self {
        Self {
            target,
            role,
            status: DeliveryStatus::Sent,
        }
    }

    pub fn failed(target: EmailAddress, role: TargetRole, error: impl Into<String>) -> Self {
        Self {
            target,
            role,
            status: DeliveryStatus::Failed {
                error: error.into(),
            },
        }
    }

    pub fn target(&self) -> &EmailAddress {
        &self.target
    }

    pub fn role(&self) -> TargetRole {
        self.role
    }

    pub fn status(&self) -> &DeliveryStatus {
        &self.status
    }

    pub fn is_sent(&self) -> bool {
        self.status.is_sent()
    }
}

/// 1 回の送信受付分の配信結果
///
/// 先頭が主宛先、以降が副宛先の正規化順。宛先と結果は 1 対 1 に対応する。
/// 副宛先は主宛先を含まないため、件数は常に「副宛先数 + 1」になる。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchReport {
    outcomes: Vec<DispatchOutcome>,
}

impl DispatchReport {
    pub fn from_outcomes(outcomes: Vec<DispatchOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[DispatchOutcome] {
        &self.outcomes
    }

    pub fn sent_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_sent()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.total() - self.sent_count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn all_sent(&self) -> bool {
        self.outcomes.iter().all(DispatchOutcome::is_sent)
    }

    /// 主宛先の結果
    pub fn primary(&self) -> Option<&DispatchOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.role() == TargetRole::Primary)
    }

    /// 指定宛先の結果
    pub fn outcome_for(&self, target: &EmailAddress) -> Option<&DispatchOutcome> {
        self.outcomes.iter().find(|o| o.target() == target)
    }
}

impl Serialize for DispatchReport {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("DispatchReport", 4)?;
        state.serialize_field("sent", &self.sent_count())?;
        state.serialize_field("failed", &self.failed_count())?;
        state.serialize_field("total", &self.total())?;
        state.serialize_field("outcomes", &self.outcomes)?;
        state.end()
    }
}
