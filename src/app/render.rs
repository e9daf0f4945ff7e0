//! TUI描画関連の関数。

use ratatui::{
    Frame,
    prelude::*,
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};

use crate::{
    config::Config,
    events::Screen,
    input, layout, report,
    shortcuts::Shortcuts,
    submission::SubmissionState,
};

use super::App;

/// 画面全体のレイアウトを描画する。
pub fn draw(f: &mut Frame, app: &App) {
    // メインレイアウト（Body + HELP + STATUS）を作る。
    let main_layout = layout::create_main_layout(f.area());

    if app.ui.screen == Screen::Report {
        draw_report(f, app, main_layout.body);
    } else {
        let body_layout = layout::create_body_layout(main_layout.body);

        // 左上：選択ファイルと送信状態。
        let submission = Paragraph::new(build_submission_text(app))
            .block(Block::default().borders(Borders::ALL).title("SUBMISSION"))
            .wrap(Wrap { trim: true });
        f.render_widget(submission, body_layout.submission);

        // 左下：進捗バー。
        f.render_widget(build_progress_gauge(app), body_layout.progress);

        // 右パネル：通常は接続先とログ、設定画面では編集中の値。
        let info_text = if app.ui.screen == Screen::Settings {
            build_settings_info_text(app)
        } else {
            // 環境変数で上書きされた実際の接続先を表示する。
            build_main_info_text(app, &app.cfg.with_env_overrides())
        };
        let info_panel = Paragraph::new(info_text)
            .block(Block::default().borders(Borders::ALL).title("INFO"))
            .wrap(Wrap { trim: true });
        f.render_widget(info_panel, body_layout.info_panel);
    }

    // HELPバー（画面ごとのショートカット）を描画する。
    let help_text = get_help_text(&app.ui.screen, &app.shortcuts);
    let help_bar = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("HELP"))
        .wrap(Wrap { trim: true });
    f.render_widget(help_bar, main_layout.help_bar);

    // STATUSバー（画面名・送信状態・エラー）を描画する。
    f.render_widget(build_status_bar(app), main_layout.status_bar);

    // 入力ボックスが開いていれば重ねて描画する。
    if let Some(input_state) = &app.input_box {
        input::render_input_box(f, input_state);
    }
}

/// レポート本文をスクロール可能な段落として描画する。
fn draw_report(f: &mut Frame, app: &App, area: Rect) {
    let text = match &app.report {
        Some(result) => report::render_lines(result).join("\n"),
        None => "No report loaded".to_string(),
    };
    let paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("REPORT"))
        .wrap(Wrap { trim: false })
        .scroll((app.ui.report_scroll, 0));
    f.render_widget(paragraph, area);
}

/// 送信パネルのテキストを構築する。
fn build_submission_text(app: &App) -> String {
    let selected = app
        .selected_file
        .as_ref()
        .map(|file| format!("{} ({} bytes)", file.name, file.size))
        .unwrap_or_else(|| "-".into());
    let submitted = app.submission.file_name.as_deref().unwrap_or("-");

    let mut lines = vec![
        format!("Selected: {selected}"),
        format!("Submitted: {submitted}"),
        format!("State: {}", app.submission.state.label()),
    ];
    if let SubmissionState::Failed(e) = &app.submission.state {
        lines.push(format!("Reason: {e}"));
    }
    if let Some(id) = &app.submission.id {
        lines.push(format!("Submission: {id}"));
    }
    lines.join("\n")
}

/// 進捗バーを構築する。失敗時は赤、完了時は緑で表示する。
fn build_progress_gauge(app: &App) -> Gauge<'static> {
    let progress = &app.submission.progress;
    let color = match app.submission.state {
        SubmissionState::Failed(_) => Color::Red,
        SubmissionState::Succeeded => Color::Green,
        _ => Color::Rgb(255, 140, 0),
    };
    let label = if progress.message.is_empty() {
        format!("{}%", progress.percent)
    } else {
        format!("{}% {}", progress.percent, progress.message)
    };
    Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("PROGRESS"))
        .gauge_style(Style::default().fg(color))
        .percent(u16::from(progress.percent.min(100)))
        .label(label)
}

/// メイン画面用の情報テキストを構築する。サービスキーは表示しない。
fn build_main_info_text(app: &App, effective: &Config) -> String {
    let key_state = if effective.storage.service_key.is_empty() {
        "missing"
    } else {
        "set"
    };
    format!(
        "API: {}\nStorage: {}\nBucket: {}\nService key: {}\nHealth: {}\n\nLog:\n{}",
        effective.api.base_url,
        or_dash(&effective.storage.url),
        or_dash(&effective.storage.bucket),
        key_state,
        app.ui.health.as_deref().unwrap_or("-"),
        app.ui
            .log
            .iter()
            .rev()
            .take(8)
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// 設定画面用の情報テキストを構築する。
fn build_settings_info_text(app: &App) -> String {
    format!(
        "Editing settings\n\nAPI base URL: {}\nStorage URL: {}\nBucket: {}\n\nSUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY\noverride storage settings when set.",
        or_dash(&app.base_url),
        or_dash(&app.storage_url),
        or_dash(&app.bucket),
    )
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

/// ステータスバーを構築する。
fn build_status_bar(app: &App) -> Paragraph<'static> {
    let screen_name = match app.ui.screen {
        Screen::Main => "Main",
        Screen::Report => "Report",
        Screen::Settings => "Settings",
    };
    let state = app.submission.state.label();

    // エラーの有無でステータス文字列を切り替える。
    let status_text = if let Some(err) = &app.ui.error {
        format!("[{screen_name}] {state} | ERROR: {err}")
    } else {
        format!("[{screen_name}] {state} | {}", app.ui.status)
    };

    let mut status_bar = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("STATUS"))
        .wrap(Wrap { trim: true });

    // エラー時は赤色で強調表示する。
    if app.ui.error.is_some() {
        status_bar = status_bar.style(Style::default().fg(Color::Red));
    }

    status_bar
}

/// 現在画面に応じたヘルプ文字列を返す。
fn get_help_text(screen: &Screen, shortcuts: &Shortcuts) -> String {
    match screen {
        Screen::Main => format!(
            "{}: open csv | {}: submit | {}: direct upload | {}: health | {}: load report | {}: view report | {}: settings | {}: quit",
            format_keys(&shortcuts.main.select_file),
            format_keys(&shortcuts.main.submit),
            format_keys(&shortcuts.main.submit_direct),
            format_keys(&shortcuts.main.health),
            format_keys(&shortcuts.main.load_report),
            format_keys(&shortcuts.main.view_report),
            format_keys(&shortcuts.main.settings),
            format_keys(&shortcuts.main.quit),
        ),
        Screen::Report => format!(
            "{}/{}: scroll | {}/{}: page | {}: back",
            format_keys(&shortcuts.report.up),
            format_keys(&shortcuts.report.down),
            format_keys(&shortcuts.report.page_up),
            format_keys(&shortcuts.report.page_down),
            format_keys(&shortcuts.report.back),
        ),
        Screen::Settings => format!(
            "{}: api url | {}: storage url | {}: bucket | {}: save | {}: cancel",
            format_keys(&shortcuts.settings.base_url),
            format_keys(&shortcuts.settings.storage_url),
            format_keys(&shortcuts.settings.bucket),
            format_keys(&shortcuts.settings.save),
            format_keys(&shortcuts.settings.cancel),
        ),
    }
}

/// ショートカットキーの配列を表示用文字列に変換する。
fn format_keys(keys: &[String]) -> String {
    keys.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::tests::test_app,
        error::SubmitError,
        submission::{ProgressSnapshot, SelectedFile},
    };
    use ratatui::{Terminal, backend::TestBackend};

    fn screen_text(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_main_screen_shows_progress() {
        let (mut app, _rx, _tx) = test_app();
        app.selected_file = Some(SelectedFile::new("sales.csv", vec![0; 4]));
        app.submission.state = SubmissionState::RequestingAnalysis;
        app.submission.progress = ProgressSnapshot::new("Cleaning and wrangling data...", 35);

        let text = screen_text(&app);
        assert!(text.contains("sales.csv (4 bytes)"));
        assert!(text.contains("35% Cleaning and wrangling data..."));
        assert!(text.contains("http://localhost:8000"));
    }

    #[test]
    fn test_failure_reason_is_shown() {
        let (mut app, _rx, _tx) = test_app();
        app.submission.state = SubmissionState::Failed(SubmitError::InvalidFileType {
            filename: "notes.txt".into(),
        });
        app.ui.error = Some("Invalid file type".into());

        let text = screen_text(&app);
        assert!(text.contains("ERROR: Invalid file type"));
        assert!(text.contains("notes.txt"));
    }

    #[test]
    fn test_info_panel_shows_effective_storage_without_key() {
        let (app, _rx, _tx) = test_app();
        let effective = app.cfg.with_overrides(
            Some("https://xyz.supabase.co".into()),
            Some("service-role-secret".into()),
        );
        let text = build_main_info_text(&app, &effective);
        assert!(text.contains("Storage: https://xyz.supabase.co"));
        assert!(text.contains("Service key: set"));
        assert!(!text.contains("service-role-secret"));

        let text = build_main_info_text(&app, &app.cfg.with_overrides(None, None));
        assert!(text.contains("Service key: missing"));
    }

    #[test]
    fn test_help_text_follows_screen() {
        let sc = Shortcuts::default();
        assert!(get_help_text(&Screen::Main, &sc).contains("Enter/s: submit"));
        assert!(get_help_text(&Screen::Report, &sc).contains("Esc/q: back"));
        assert!(get_help_text(&Screen::Settings, &sc).contains("b: bucket"));
    }
}
