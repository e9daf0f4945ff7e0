//! 画面遷移用のUI状態と画面種別。

/// TUIで現在表示中の画面。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    /// ファイル選択と送信状況の画面。
    Main,
    /// 解析レポートの表示画面。
    Report,
    /// 設定編集画面。
    Settings,
}

/// 描画側と共有するUI状態。
#[derive(Clone, Debug)]
pub struct UiState {
    /// 現在の画面。
    pub screen: Screen,
    /// 右側パネルに表示するログ。
    pub log: Vec<String>,
    /// 画面下部のステータス文言。
    pub status: String,
    /// エラー通知（赤色で表示し、次の操作で消す）。
    pub error: Option<String>,
    /// レポート画面のスクロール位置（行）。
    pub report_scroll: u16,
    /// 直近のヘルスチェック結果。
    pub health: Option<String>,
}

impl UiState {
    /// 初期状態を作る。
    pub fn new(screen: Screen) -> Self {
        Self {
            screen,
            log: vec![],
            status: "Ready".into(),
            error: None,
            report_scroll: 0,
            health: None,
        }
    }

    /// ログに1行追加する（古いものから捨てる）。
    pub fn push_log(&mut self, line: impl Into<String>) {
        const MAX_LOG: usize = 200;
        self.log.push(line.into());
        if self.log.len() > MAX_LOG {
            let overflow = self.log.len() - MAX_LOG;
            self.log.drain(..overflow);
        }
    }
}
