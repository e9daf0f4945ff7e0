//! レイアウト計算のヘルパー関数

use ratatui::prelude::*;

/// メインレイアウトの3つの領域
pub struct MainLayout {
    /// 本文の領域
    pub body: Rect,
    /// HELPバーの領域
    pub help_bar: Rect,
    /// STATUSバーの領域
    pub status_bar: Rect,
}

/// ボディ部の領域（送信パネル + 進捗バー + INFO Panel）
pub struct BodyLayout {
    /// 選択ファイルと状態の領域
    pub submission: Rect,
    /// 進捗バーの領域
    pub progress: Rect,
    /// INFO Panelの領域
    pub info_panel: Rect,
}

/// 画面を本文・HELP・STATUSに分割
pub fn create_main_layout(area: Rect) -> MainLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // 本文
            Constraint::Length(3), // HELPバー
            Constraint::Length(3), // STATUSバー
        ])
        .split(area);

    MainLayout {
        body: chunks[0],
        help_bar: chunks[1],
        status_bar: chunks[2],
    }
}

/// 本文を左（送信 60%）と右（INFO 40%）に分け、左をさらに上下に分割
pub fn create_body_layout(area: Rect) -> BodyLayout {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(60), // 送信パネル
            Constraint::Percentage(40), // INFO Panel
        ])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // ファイル・状態
            Constraint::Length(3), // 進捗バー
        ])
        .split(columns[0]);

    BodyLayout {
        submission: left[0],
        progress: left[1],
        info_panel: columns[1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_keeps_bars_fixed() {
        // HELP/STATUSは常に3行、進捗バーも3行。
        let main = create_main_layout(Rect::new(0, 0, 100, 40));
        assert_eq!(main.help_bar.height, 3);
        assert_eq!(main.status_bar.height, 3);
        assert_eq!(main.body.height, 34);

        let body = create_body_layout(main.body);
        assert_eq!(body.progress.height, 3);
        assert_eq!(body.submission.height + body.progress.height, main.body.height);
        assert_eq!(body.submission.width + body.info_panel.width, 100);
    }
}
