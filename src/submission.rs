//! 送信1回分のモデル（選択ファイル、保存キー、状態、進捗）。

use anyhow::{Context, Result};
use std::{fmt, path::Path};

use crate::error::SubmitError;

/// 成功時に表示する進捗メッセージ。
pub const COMPLETE_MESSAGE: &str = "Analysis complete!";

/// ストレージへ書き込み中の進捗。
pub const STAGING_STEP: (&str, u8) = ("Uploading file to storage...", 10);

/// 解析待ちの間に一定間隔で進める見かけ上の進捗（実際の処理状況とは無関係）。
pub const ANALYSIS_STEPS: &[(&str, u8)] = &[
    ("Interpreting data structure...", 20),
    ("Cleaning and wrangling data...", 35),
    ("Running statistical analysis...", 50),
    ("Generating visualizations...", 65),
    ("Reviewing analysis quality...", 80),
    ("Writing the narrative report...", 90),
];

/// ユーザーが選んだファイル。送信開始時にUIからWorkerへ移動する。
#[derive(Clone)]
pub struct SelectedFile {
    /// 元のファイル名（パスは含まない）。
    pub name: String,
    /// バイト数。
    pub size: u64,
    /// ファイル内容。
    pub bytes: Vec<u8>,
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 中身はログに出さない。
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish()
    }
}

impl SelectedFile {
    /// メモリ上の内容から作成する。
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }

    /// ディスクから読み込む。
    pub async fn load(path: &Path) -> Result<Self> {
        // ファイル名部分だけを保持する。
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("not a file path: {}", path.display()))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::new(name, bytes))
    }

    /// ファイル名が `.csv` で終わるか（大文字小文字は区別しない）。`.csv` 自体も含む。
    pub fn has_csv_extension(&self) -> bool {
        const SUFFIX: &str = ".csv";
        self.name
            .len()
            .checked_sub(SUFFIX.len())
            .and_then(|start| self.name.get(start..))
            .is_some_and(|tail| tail.eq_ignore_ascii_case(SUFFIX))
    }

    /// CSV以外なら `InvalidFileType` を返す。
    pub fn validate(&self) -> Result<(), SubmitError> {
        if self.has_csv_extension() {
            Ok(())
        } else {
            Err(SubmitError::InvalidFileType {
                filename: self.name.clone(),
            })
        }
    }
}

/// ストレージ上の保存キー（`<ミリ秒タイムスタンプ>_<ファイル名>`）。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKey {
    timestamp_ms: i64,
    value: String,
}

impl StorageKey {
    /// タイムスタンプとファイル名からキーを組み立てる。
    pub fn new(timestamp_ms: i64, filename: &str) -> Self {
        Self {
            timestamp_ms,
            value: format!("{timestamp_ms}_{filename}"),
        }
    }

    /// キーのタイムスタンプ部分。
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// キー文字列。
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// 送信処理の状態。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SubmissionState {
    /// 待機中。
    #[default]
    Idle,
    /// 拡張子チェック中。
    Validating,
    /// ストレージへ書き込み中。
    StagingToStorage,
    /// 解析API呼び出し中。
    RequestingAnalysis,
    /// 正常完了。
    Succeeded,
    /// 失敗（理由付き）。
    Failed(SubmitError),
}

impl SubmissionState {
    /// 処理中（新しい送信を受け付けない状態）か。
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Validating | Self::StagingToStorage | Self::RequestingAnalysis
        )
    }

    /// 表示用の短いラベル。
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Validating => "Validating",
            Self::StagingToStorage => "Uploading",
            Self::RequestingAnalysis => "Analyzing",
            Self::Succeeded => "Done",
            Self::Failed(_) => "Failed",
        }
    }
}

/// 表示用の進捗（メッセージと百分率）。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub message: String,
    pub percent: u8,
}

impl ProgressSnapshot {
    /// 指定の段階で作成する。
    pub fn new(message: impl Into<String>, percent: u8) -> Self {
        Self {
            message: message.into(),
            percent: percent.min(100),
        }
    }

    /// 完了時の進捗。
    pub fn complete() -> Self {
        Self::new(COMPLETE_MESSAGE, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_extension_is_case_insensitive() {
        // 大文字・小文字どちらも受け付ける。名前が `.csv` だけでも末尾は `.csv`。
        for name in ["sales.csv", "SALES.CSV", "q3.report.Csv", ".csv", ".CSV", "売上.csv"] {
            assert!(SelectedFile::new(name, vec![]).validate().is_ok(), "{name}");
        }
    }

    #[test]
    fn test_non_csv_is_rejected() {
        // 拡張子なし・別拡張子は拒否する。
        for name in ["data.txt", "csv", "data.csv.bak", "datacsv", "data", "売上"] {
            let err = SelectedFile::new(name, vec![]).validate().unwrap_err();
            assert_eq!(
                err,
                SubmitError::InvalidFileType {
                    filename: name.into()
                }
            );
        }
    }

    #[test]
    fn test_storage_key_format() {
        let key = StorageKey::new(1_700_000_000_000, "sales.csv");
        assert_eq!(key.as_str(), "1700000000000_sales.csv");
        assert_eq!(key.timestamp_ms(), 1_700_000_000_000);
    }

    #[test]
    fn test_in_flight_states() {
        assert!(!SubmissionState::Idle.is_in_flight());
        assert!(SubmissionState::StagingToStorage.is_in_flight());
        assert!(SubmissionState::RequestingAnalysis.is_in_flight());
        assert!(!SubmissionState::Succeeded.is_in_flight());
        assert!(
            !SubmissionState::Failed(SubmitError::StorageError("x".into())).is_in_flight()
        );
    }

    #[test]
    fn test_analysis_steps_are_increasing() {
        // 見かけ上の進捗は単調増加で100未満に収まる。
        let mut last = STAGING_STEP.1;
        for (_, pct) in ANALYSIS_STEPS {
            assert!(*pct > last);
            last = *pct;
        }
        assert!(last < 100);
    }

    #[tokio::test]
    async fn test_load_reads_name_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, "region,amount\nwest,10\n").unwrap();

        let f = SelectedFile::load(&path).await.unwrap();
        assert_eq!(f.name, "sales.csv");
        assert_eq!(f.size, 22);
    }
}
