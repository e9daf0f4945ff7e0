//! TUI内での1行入力コンポーネント（InputBox）。

use ratatui::{
    layout::Alignment,
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};

/// 入力完了時に値を反映する先。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputCallbackId {
    /// 送信するCSVファイルのパス。
    SelectFile,
    /// 読み込むレポートID。
    ReportId,
    /// 設定: 解析APIのベースURL。
    SettingsBaseUrl,
    /// 設定: ストレージURL。
    SettingsStorageUrl,
    /// 設定: バケット名。
    SettingsBucket,
}

/// InputBoxの入力状態。カーソルは文字単位。
#[derive(Clone, Debug)]
pub struct InputBoxState {
    /// プロンプトメッセージ
    pub prompt: String,
    /// 現在の入力値
    pub value: String,
    /// カーソル位置（文字単位）
    pub cursor: usize,
    /// 入力完了時のコールバック識別子
    pub callback_id: InputCallbackId,
}

impl InputBoxState {
    /// 初期値の末尾にカーソルを置いて開く。
    pub fn open(prompt: impl Into<String>, value: impl Into<String>, id: InputCallbackId) -> Self {
        let value = value.into();
        Self {
            prompt: prompt.into(),
            cursor: value.chars().count(),
            value,
            callback_id: id,
        }
    }

    /// 文字位置をバイト位置へ変換する。
    fn byte_at(&self, char_idx: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_idx)
            .map(|(b, _)| b)
            .unwrap_or(self.value.len())
    }

    fn len_chars(&self) -> usize {
        self.value.chars().count()
    }

    /// カーソル位置に文字を挿入する。
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_at(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    /// カーソル直前の文字を削除する。
    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_at(self.cursor);
        self.value.remove(at);
    }

    /// カーソル位置の文字を削除する。
    pub fn delete(&mut self) {
        if self.cursor < self.len_chars() {
            let at = self.byte_at(self.cursor);
            self.value.remove(at);
        }
    }

    /// カーソルを左へ。
    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// カーソルを右へ。
    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.len_chars());
    }

    /// カーソルを先頭へ。
    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    /// カーソルを末尾へ。
    pub fn move_end(&mut self) {
        self.cursor = self.len_chars();
    }

    /// 入力をすべて消す。
    pub fn clear_line(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// 表示幅に収まる範囲を `|` 付きで返す（カーソルが見えるよう横スクロール）。
    pub fn visible_with_cursor(&self, width: usize) -> String {
        let room = width.saturating_sub(1).max(1);
        let start = self.cursor.saturating_sub(room);
        let chars: Vec<char> = self.value.chars().skip(start).take(room).collect();
        let split = (self.cursor - start).min(chars.len());
        let before: String = chars[..split].iter().collect();
        let after: String = chars[split..].iter().collect();
        format!("{before}|{after}")
    }
}

/// InputBoxをポップアップとして描画する。
pub fn render_input_box(f: &mut Frame, state: &InputBoxState) {
    let popup_area = centered_popup(f.area(), 70, 7);
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Input")
        .style(Style::default().bg(Color::DarkGray));
    f.render_widget(block, popup_area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // プロンプト
            Constraint::Length(1), // 入力欄
            Constraint::Length(1), // 空行
            Constraint::Length(1), // ヘルプ
        ])
        .split(popup_area);

    let prompt = Paragraph::new(state.prompt.clone()).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    f.render_widget(prompt, rows[0]);

    let field = Paragraph::new(state.visible_with_cursor(rows[1].width as usize))
        .style(Style::default().fg(Color::Green));
    f.render_widget(field, rows[1]);

    let help = Paragraph::new("Enter=確定 | ESC=キャンセル | Ctrl+U=クリア")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(help, rows[3]);
}

/// 中央配置のポップアップ領域を計算する。
fn centered_popup(area: Rect, width_percent: u16, height: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(area.height.saturating_sub(height) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    let margin = (100 - width_percent) / 2;
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(margin),
            Constraint::Percentage(width_percent),
            Constraint::Percentage(margin),
        ])
        .split(vertical[1])[1]
}
