//! # 宛先
//!
//! メールアドレスの構文検証と、形の定まらない宛先入力の正規化を行う。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 説明 |
//! |---|------------|------|
//! | [`EmailAddress`] | 正規化済みメールアドレス | trim + 小文字化 + 構文検証済み |
//! | [`RawRecipients`] | 宛先入力 | 未指定 / カンマ区切り文字列 / 文字列リスト |
//! | [`RecipientSet`] | 正規化済み宛先集合 | 重複なし・初出順を保持 |
//!
//! ## 設計方針
//!
//! - **正規化は失敗しない**: 不正な宛先は黙って除外する。1 件の入力ミスで
//!   残りの正しい宛先への配信を止めない
//! - **冪等性**: `normalize(normalize(x)) == normalize(x)`
//! - **空集合の扱いは呼び出し側が決める**: 宛先 0 件を許すかどうかは設定で切り替える

use std::{collections::HashSet, fmt};

use serde::Serialize;
use serde_json::Value;

use crate::DomainError;

/// メールアドレスの最大長（RFC 5321 のパス長制限に由来）
pub const MAX_EMAIL_ADDRESS_LENGTH: usize = 254;

/// メールアドレスの構文を検証する
///
/// 判定は trim・小文字化の後の値に対して行う前提。
///
/// - `@` がちょうど 1 つ
/// - ローカル部・ドメイン部が空でない
/// - ドメイン部に `.` を 1 つ以上含み、空のラベル（`a..b`、先頭末尾の `.`）がない
/// - 全体で 254 文字以内
/// - 空白・カンマを含まない
pub fn is_valid_email_address(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.chars().count() > MAX_EMAIL_ADDRESS_LENGTH {
        return false;
    }

    if candidate.chars().any(|c| c.is_whitespace() || c == ',') {
        return false;
    }

    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}

/// 正規化済みメールアドレス
///
/// 生成時に trim + 小文字化を行い、[`is_valid_email_address`] を満たすことを保証する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// 入力を正規化してメールアドレスを作成する
    ///
    /// # エラー
    ///
    /// 正規化後の値が構文検証を通らない場合は `DomainError::Validation` を返す。
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let normalized = value.trim().to_lowercase();

        if !is_valid_email_address(&normalized) {
            return Err(DomainError::Validation(format!(
                "メールアドレスの形式が不正です: {value:?}"
            )));
        }

        Ok(Self(normalized))
    }

    /// 文字列参照を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ドメイン部を返す
    pub fn domain(&self) -> &str {
        // parse で `@` がちょうど 1 つあることを保証済み
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 宛先入力（形の定まらない生データ）
///
/// フォームや外部クライアントは宛先を「未指定」「カンマ区切り文字列」「文字列配列」の
/// いずれでも送ってくる。この型はその差異を吸収する。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RawRecipients {
    /// 未指定（`null` を含む）
    #[default]
    Absent,
    /// 単一文字列。カンマで分割して扱う
    Single(String),
    /// 文字列リスト。各要素を 1 候補として扱う（要素内のカンマは分割しない）
    List(Vec<String>),
}

impl RawRecipients {
    /// JSON 値から宛先入力を組み立てる
    ///
    /// - `null` / 未指定 → [`Absent`](RawRecipients::Absent)
    /// - 文字列 → [`Single`](RawRecipients::Single)
    /// - 配列 → [`List`](RawRecipients::List)（文字列以外の要素は除外）
    /// - それ以外（数値・オブジェクト等） → [`Absent`](RawRecipients::Absent)
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => Self::Single(s.clone()),
            Some(Value::Array(items)) => Self::List(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => Self::Absent,
        }
    }

    /// 宛先候補を入力順に列挙する
    pub fn candidates(&self) -> Vec<&str> {
        match self {
            Self::Absent => Vec::new(),
            Self::Single(s) => s.split(',').collect(),
            Self::List(items) => items.iter().map(String::as_str).collect(),
        }
    }

    /// 先頭に候補を追加した入力を返す
    ///
    /// 通知先アドレスを宛先リストの先頭に差し込むために使う。
    pub fn with_leading(&self, address: &str) -> Self {
        let mut items = vec![address.to_string()];
        items.extend(self.candidates().into_iter().map(str::to_string));
        Self::List(items)
    }
}

impl From<RecipientSet> for RawRecipients {
    fn from(set: RecipientSet) -> Self {
        Self::List(set.0.into_iter().map(|address| address.0).collect())
    }
}

/// 正規化済み宛先集合
///
/// 不変条件:
/// - 全要素が [`is_valid_email_address`] を満たす
/// - 正規化後の値で重複がない
/// - 要素の順序は入力での初出順
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct RecipientSet(Vec<EmailAddress>);

impl RecipientSet {
    /// 宛先入力を正規化する（失敗しない）
    pub fn normalize(raw: &RawRecipients) -> Self {
        let mut seen = HashSet::new();
        let members = raw
            .candidates()
            .into_iter()
            .filter_map(|candidate| EmailAddress::parse(candidate).ok())
            .filter(|address| seen.insert(address.clone()))
            .collect();

        Self(members)
    }

    /// 指定アドレスを除いた集合を返す（順序は保持）
    pub fn without(&self, excluded: &EmailAddress) -> Self {
        Self(
            self.0
                .iter()
                .filter(|address| *address != excluded)
                .cloned()
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmailAddress> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, address: &EmailAddress) -> bool {
        self.0.contains(address)
    }

    /// 文字列のリストに変換する
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|address| address.0.clone()).collect()
    }
}
