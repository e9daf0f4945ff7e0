//! キー入力ハンドラー関数。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::Path;
use tokio::sync::mpsc::error::TrySendError;

use crate::{
    events::Screen,
    input::{InputBoxState, InputCallbackId},
    shortcuts,
    submission::{ProgressSnapshot, SelectedFile, SubmissionState},
    worker::WorkerCmd,
};

use super::App;

/// Workerのキューが満杯のときのステータス。
const WORKER_BUSY: &str = "Worker busy, try again later";

/// キー入力を1件処理し、終了すべきならtrueを返す。
pub async fn handle_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが開いていれば最優先で処理する。
    if app.input_box.is_some() {
        return handle_input_box_key(app, k).await;
    }

    match app.ui.screen {
        Screen::Main => handle_main_key(app, k).await,
        Screen::Report => Ok(handle_report_key(app, k)),
        Screen::Settings => handle_settings_key(app, k).await,
    }
}

/// Ctrl+Cかどうかを判定する。
pub fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c')
}

/// メイン画面のキー処理。
async fn handle_main_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let sc = &app.shortcuts.main;

    if shortcuts::matches_shortcut(&k, &sc.quit) {
        return Ok(true);
    } else if shortcuts::matches_shortcut(&k, &sc.settings) {
        reload_settings_buffers(app);
        app.ui.screen = Screen::Settings;
        app.ui.status = "Settings".into();
    } else if shortcuts::matches_shortcut(&k, &sc.select_file) {
        app.input_box = Some(InputBoxState::open(
            "CSV file path:",
            app.file_path.clone(),
            InputCallbackId::SelectFile,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.submit) {
        request_submit(app, false)?;
    } else if shortcuts::matches_shortcut(&k, &sc.submit_direct) {
        request_submit(app, true)?;
    } else if shortcuts::matches_shortcut(&k, &sc.health) {
        if try_send_cmd(app, WorkerCmd::CheckHealth)?.is_none() {
            app.ui.status = "Checking service health...".into();
        }
    } else if shortcuts::matches_shortcut(&k, &sc.load_report) {
        app.input_box = Some(InputBoxState::open(
            "Report ID:",
            "",
            InputCallbackId::ReportId,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.view_report) {
        if app.report.is_some() {
            app.ui.screen = Screen::Report;
        } else {
            app.ui.status = "No report yet".into();
        }
    }

    Ok(false)
}

/// 選択中のファイルをWorkerへ渡して送信を始める。
///
/// 処理中の送信がある間は受け付けない（Worker側は多重実行を防がない）。
pub fn request_submit(app: &mut App, direct: bool) -> Result<()> {
    if app.submission.state.is_in_flight() {
        app.ui.status = "A submission is already running".into();
        return Ok(());
    }
    let Some(file) = app.selected_file.take() else {
        app.ui.status = "Select a CSV file first".into();
        return Ok(());
    };

    tracing::info!("submit requested: {} (direct: {direct})", file.name);
    let name = file.name.clone();
    let cmd = if direct {
        WorkerCmd::SubmitDirect(file)
    } else {
        WorkerCmd::Submit(file)
    };
    if let Some(cmd) = try_send_cmd(app, cmd)? {
        // 送れなかったファイルは選択状態に戻す。
        if let WorkerCmd::Submit(file) | WorkerCmd::SubmitDirect(file) = cmd {
            app.selected_file = Some(file);
        }
        return Ok(());
    }

    app.ui.error = None;
    app.ui.status = format!("Submitting {name}...");
    app.submission.file_name = Some(name);
    // Workerの最初のイベントが届くまでの二重送信を防ぐ。
    app.submission.state = SubmissionState::Validating;
    app.submission.progress = ProgressSnapshot::default();
    Ok(())
}

/// Workerへコマンドを送る。UIループを止めないよう待たずに送り、
/// キューが満杯なら送れなかったコマンドを `Some` で返す。
fn try_send_cmd(app: &mut App, cmd: WorkerCmd) -> Result<Option<WorkerCmd>> {
    match app.worker_tx.try_send(cmd) {
        Ok(()) => Ok(None),
        Err(TrySendError::Full(cmd)) => {
            tracing::warn!("worker queue full: {cmd:?}");
            app.ui.status = WORKER_BUSY.into();
            Ok(Some(cmd))
        }
        Err(TrySendError::Closed(_)) => anyhow::bail!("worker stopped"),
    }
}

/// レポート画面のキー処理。
fn handle_report_key(app: &mut App, k: KeyEvent) -> bool {
    const PAGE: u16 = 10;
    let sc = &app.shortcuts.report;

    if shortcuts::matches_shortcut(&k, &sc.back) {
        app.ui.screen = Screen::Main;
    } else if shortcuts::matches_shortcut(&k, &sc.up) {
        app.ui.report_scroll = app.ui.report_scroll.saturating_sub(1);
    } else if shortcuts::matches_shortcut(&k, &sc.down) {
        app.ui.report_scroll = app.ui.report_scroll.saturating_add(1);
    } else if shortcuts::matches_shortcut(&k, &sc.page_up) {
        app.ui.report_scroll = app.ui.report_scroll.saturating_sub(PAGE);
    } else if shortcuts::matches_shortcut(&k, &sc.page_down) {
        app.ui.report_scroll = app.ui.report_scroll.saturating_add(PAGE);
    }
    false
}

/// 設定画面のキー処理。
async fn handle_settings_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let sc = &app.shortcuts.settings;

    if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // 変更を破棄してメイン画面へ戻る。
        reload_settings_buffers(app);
        app.ui.screen = Screen::Main;
    } else if shortcuts::matches_shortcut(&k, &sc.save) {
        // 編集バッファを設定へ反映して保存する。
        app.cfg.api.base_url = app.base_url.trim().to_string();
        app.cfg.storage.url = app.storage_url.trim().to_string();
        app.cfg.storage.bucket = app.bucket.trim().to_string();
        app.cfg.save(&app.cfg_path)?;

        // Workerには環境変数を反映した設定を渡す。
        let cmd = WorkerCmd::SaveSettings(app.cfg.with_env_overrides());
        app.ui.screen = Screen::Main;
        if try_send_cmd(app, cmd)?.is_none() {
            app.ui.status = "Saved settings".into();
        }
    } else if shortcuts::matches_shortcut(&k, &sc.base_url) {
        app.input_box = Some(InputBoxState::open(
            "Analysis API base URL:",
            app.base_url.clone(),
            InputCallbackId::SettingsBaseUrl,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.storage_url) {
        app.input_box = Some(InputBoxState::open(
            "Storage URL:",
            app.storage_url.clone(),
            InputCallbackId::SettingsStorageUrl,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.bucket) {
        app.input_box = Some(InputBoxState::open(
            "Bucket:",
            app.bucket.clone(),
            InputCallbackId::SettingsBucket,
        ));
    }

    Ok(false)
}

/// 入力ボックスのキー処理。
async fn handle_input_box_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let Some(input_state) = &mut app.input_box else {
        return Ok(false);
    };
    let sc = &app.shortcuts.input_box;

    // 入力中でもCtrl+Cで終了できるようにする。
    if is_ctrl_c(&k) {
        return Ok(true);
    }

    if shortcuts::matches_shortcut(&k, &sc.confirm) {
        // 閉じる前に値とコールバック種別を取り出す。
        let value = input_state.value.clone();
        let callback_id = input_state.callback_id.clone();
        app.input_box = None;
        apply_input_callback(app, callback_id, value).await?;
    } else if shortcuts::matches_shortcut(&k, &sc.cancel) {
        app.input_box = None;
    } else if shortcuts::matches_shortcut(&k, &sc.backspace) {
        input_state.backspace();
    } else if shortcuts::matches_shortcut(&k, &sc.delete) {
        input_state.delete();
    } else if shortcuts::matches_shortcut(&k, &sc.left) {
        input_state.move_left();
    } else if shortcuts::matches_shortcut(&k, &sc.right) {
        input_state.move_right();
    } else if shortcuts::matches_shortcut(&k, &sc.home) {
        input_state.move_home();
    } else if shortcuts::matches_shortcut(&k, &sc.end) {
        input_state.move_end();
    } else if shortcuts::matches_shortcut(&k, &sc.clear_line) {
        input_state.clear_line();
    } else if let KeyCode::Char(c) = k.code
        && !k.modifiers.contains(KeyModifiers::CONTROL)
    {
        input_state.insert_char(c);
    }

    Ok(false)
}

/// 入力ボックスのコールバックを適用する。
async fn apply_input_callback(
    app: &mut App,
    callback_id: InputCallbackId,
    value: String,
) -> Result<()> {
    match callback_id {
        InputCallbackId::SelectFile => {
            let path = value.trim().to_string();
            app.file_path = path.clone();
            match SelectedFile::load(Path::new(&path)).await {
                Ok(file) => select_file(app, file),
                Err(e) => {
                    tracing::warn!("file selection failed: {e:#}");
                    app.ui.error = Some(format!("{e:#}"));
                }
            }
        }
        InputCallbackId::ReportId => {
            let id = value.trim();
            if !id.is_empty()
                && try_send_cmd(app, WorkerCmd::LoadReport(id.to_string()))?.is_none()
            {
                app.ui.status = format!("Loading report {id}...");
            }
        }
        InputCallbackId::SettingsBaseUrl => app.base_url = value,
        InputCallbackId::SettingsStorageUrl => app.storage_url = value,
        InputCallbackId::SettingsBucket => app.bucket = value,
    }
    Ok(())
}

/// 新しいファイルを選択する。完了/失敗済みの送信表示はIdleへ戻す。
pub fn select_file(app: &mut App, file: SelectedFile) {
    if !app.submission.state.is_in_flight() {
        app.submission.state = SubmissionState::Idle;
        app.submission.progress = ProgressSnapshot::default();
    }
    app.ui.error = None;
    app.ui.status = format!("Selected {} ({} bytes)", file.name, file.size);
    app.selected_file = Some(file);
}

/// 設定画面用の編集バッファを設定値から再読み込みする。
fn reload_settings_buffers(app: &mut App) {
    app.base_url = app.cfg.api.base_url.clone();
    app.storage_url = app.cfg.storage.url.clone();
    app.bucket = app.cfg.storage.bucket.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::tests::test_app, error::SubmitError};

    fn key(c: KeyCode) -> KeyEvent {
        KeyEvent::new(c, KeyModifiers::empty())
    }

    #[tokio::test]
    async fn test_submit_without_file_sends_nothing() {
        let (mut app, mut rx, _tx) = test_app();
        handle_key(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(app.ui.status, "Select a CSV file first");
    }

    #[tokio::test]
    async fn test_submit_moves_file_to_worker_once() {
        let (mut app, mut rx, _tx) = test_app();
        select_file(&mut app, SelectedFile::new("sales.csv", b"a,b\n".to_vec()));

        handle_key(&mut app, key(KeyCode::Enter)).await.unwrap();
        match rx.try_recv().unwrap() {
            WorkerCmd::Submit(f) => assert_eq!(f.name, "sales.csv"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(app.selected_file.is_none());
        assert!(app.submission.state.is_in_flight());

        // 処理中は新しいファイルがあっても送らない。
        select_file(&mut app, SelectedFile::new("other.csv", vec![]));
        handle_key(&mut app, key(KeyCode::Char('s'))).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(app.ui.status, "A submission is already running");
    }

    #[tokio::test]
    async fn test_direct_submit_key() {
        let (mut app, mut rx, _tx) = test_app();
        select_file(&mut app, SelectedFile::new("sales.csv", vec![]));
        handle_key(&mut app, key(KeyCode::Char('u'))).await.unwrap();
        assert!(matches!(rx.try_recv().unwrap(), WorkerCmd::SubmitDirect(_)));
    }

    #[tokio::test]
    async fn test_new_selection_resets_settled_submission() {
        let (mut app, _rx, _tx) = test_app();
        app.submission.state = SubmissionState::Failed(SubmitError::InvalidFileType {
            filename: "data.txt".into(),
        });
        app.ui.error = Some("Invalid file type".into());

        select_file(&mut app, SelectedFile::new("sales.csv", vec![]));
        assert_eq!(app.submission.state, SubmissionState::Idle);
        assert_eq!(app.submission.progress, ProgressSnapshot::default());
        assert!(app.ui.error.is_none());
    }

    #[tokio::test]
    async fn test_select_file_through_input_box() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let (mut app, _rx, _tx) = test_app();
        handle_key(&mut app, key(KeyCode::Char('o'))).await.unwrap();
        assert!(app.input_box.is_some());
        for c in path.to_str().unwrap().chars() {
            handle_key(&mut app, key(KeyCode::Char(c))).await.unwrap();
        }
        handle_key(&mut app, key(KeyCode::Enter)).await.unwrap();

        let file = app.selected_file.as_ref().expect("file selected");
        assert_eq!(file.name, "sales.csv");
        assert_eq!(file.size, 8);
    }

    #[tokio::test]
    async fn test_missing_file_shows_error() {
        let (mut app, _rx, _tx) = test_app();
        apply_input_callback(&mut app, InputCallbackId::SelectFile, "/nonexistent/x.csv".into())
            .await
            .unwrap();
        assert!(app.selected_file.is_none());
        assert!(app.ui.error.as_deref().unwrap().contains("x.csv"));
    }

    /// キーを1回押す。Workerを待って止まったら失敗させる。
    async fn press(app: &mut App, c: KeyCode) {
        tokio::time::timeout(std::time::Duration::from_secs(1), handle_key(app, key(c)))
            .await
            .expect("key handling must not wait on the worker")
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_worker_queue_does_not_block_input() {
        let (mut app, mut rx, _tx) = test_app();

        // キューを満杯にする。
        for _ in 0..app.worker_tx.max_capacity() {
            press(&mut app, KeyCode::Char('h')).await;
        }
        press(&mut app, KeyCode::Char('h')).await;
        assert_eq!(app.ui.status, WORKER_BUSY);

        // 送れなかった送信はファイルを戻し、状態もIdleのまま。
        select_file(&mut app, SelectedFile::new("sales.csv", vec![]));
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.ui.status, WORKER_BUSY);
        assert_eq!(app.selected_file.as_ref().map(|f| f.name.as_str()), Some("sales.csv"));
        assert_eq!(app.submission.state, SubmissionState::Idle);

        // Workerが追いつけば送れる。
        while rx.try_recv().is_ok() {}
        press(&mut app, KeyCode::Enter).await;
        assert!(matches!(rx.try_recv().unwrap(), WorkerCmd::Submit(_)));
    }

    #[tokio::test]
    async fn test_report_scrolling() {
        let (mut app, _rx, _tx) = test_app();
        app.ui.screen = Screen::Report;
        handle_key(&mut app, key(KeyCode::Up)).await.unwrap();
        assert_eq!(app.ui.report_scroll, 0);
        handle_key(&mut app, key(KeyCode::PageDown)).await.unwrap();
        handle_key(&mut app, key(KeyCode::Down)).await.unwrap();
        assert_eq!(app.ui.report_scroll, 11);
        handle_key(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.ui.screen, Screen::Main);
    }
}
