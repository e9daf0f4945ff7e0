//! TUIのイベントループ、入力処理、状態管理。

mod handlers;
mod render;

use anyhow::Result;
use crossterm::event::{self, Event};
use std::{path::PathBuf, time::Duration};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    analysis::AnalysisResult,
    config::Config,
    events::{Screen, UiState},
    input::InputBoxState,
    shortcuts::Shortcuts,
    submission::{ProgressSnapshot, SelectedFile, SubmissionState},
    ui::Tui,
    worker::{self, WorkerCmd, WorkerEvent},
};

use handlers::{handle_key, is_ctrl_c};
use render::draw;

/// UI側から見た送信状況（Workerイベントで更新する）。
#[derive(Clone, Debug, Default)]
pub struct SubmissionView {
    /// 現在追跡中の送信ID。
    pub id: Option<Uuid>,
    /// 直近の状態。
    pub state: SubmissionState,
    /// 直近の進捗。
    pub progress: ProgressSnapshot,
    /// 送信中（または直近に送信した）ファイル名。
    pub file_name: Option<String>,
}

/// 入力処理と描画で共有するアプリ状態。
pub struct App {
    /// 永続化された設定ファイルのパス。
    pub cfg_path: PathBuf,
    /// ディスク上の設定（環境変数の上書きは含まない）。
    pub cfg: Config,
    /// 画面やステータスなどUI固有の状態。
    pub ui: UiState,
    /// 送信待ちのファイル。送信開始時にWorkerへ渡して空にする。
    pub selected_file: Option<SelectedFile>,
    /// 送信状況。
    pub submission: SubmissionView,
    /// 表示中のレポート。
    pub report: Option<AnalysisResult>,
    /// Workerへのコマンド送信チャネル。
    pub worker_tx: mpsc::Sender<WorkerCmd>,
    /// Workerからのイベント受信チャネル。
    pub worker_rx: mpsc::Receiver<WorkerEvent>,

    /// 直近に入力したファイルパス。
    pub file_path: String,
    /// 設定画面で編集するAPIベースURL。
    pub base_url: String,
    /// 設定画面で編集するストレージURL。
    pub storage_url: String,
    /// 設定画面で編集するバケット名。
    pub bucket: String,

    /// 入力ボックスの状態（入力中はSome）。
    pub input_box: Option<InputBoxState>,
    /// ショートカットキー設定。
    pub shortcuts: Shortcuts,
}

impl App {
    /// 設定とチャネルからアプリ状態を作る。
    pub fn new(
        cfg_path: PathBuf,
        cfg: Config,
        shortcuts: Shortcuts,
        worker_tx: mpsc::Sender<WorkerCmd>,
        worker_rx: mpsc::Receiver<WorkerEvent>,
    ) -> Self {
        Self {
            cfg_path,
            base_url: cfg.api.base_url.clone(),
            storage_url: cfg.storage.url.clone(),
            bucket: cfg.storage.bucket.clone(),
            cfg,
            ui: UiState::new(Screen::Main),
            selected_file: None,
            submission: SubmissionView::default(),
            report: None,
            worker_tx,
            worker_rx,
            file_path: String::new(),
            input_box: None,
            shortcuts,
        }
    }
}

/// ユーザーが終了するまでメインTUIループを回す。
pub async fn run_app(terminal: &mut Tui) -> Result<()> {
    // 設定ファイルを読み込む（初回はデフォルトを生成）。
    let cfg_path = PathBuf::from("config.toml");
    let cfg = Config::load_or_default(&cfg_path)?;

    // ショートカット設定を読み込む（無ければデフォルト）。
    let shortcuts = Shortcuts::load_or_default("shortcut.toml")?;

    // Worker通信用のコマンド/イベントチャネルを作る。
    let (tx_cmd, rx_cmd) = mpsc::channel::<WorkerCmd>(64);
    let (tx_ev, rx_ev) = mpsc::channel::<WorkerEvent>(256);

    // 環境変数を反映した設定でWorkerを起動する。
    tokio::spawn(worker::run(rx_cmd, tx_ev, cfg.with_env_overrides()));

    let mut app = App::new(cfg_path, cfg, shortcuts, tx_cmd, rx_ev);

    // 起動時にサービスの疎通を確認する。
    app.worker_tx.send(WorkerCmd::CheckHealth).await?;

    loop {
        // 現在の状態を描画する。
        terminal.draw(|f| draw(f, &app))?;

        // 入力処理の前にWorkerイベントを消化する。
        while let Ok(ev) = app.worker_rx.try_recv() {
            handle_worker_event(&mut app, ev);
        }

        // UIの応答性確保のため短いタイムアウトで入力をポーリングする。
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(k) = event::read()?
        {
            // どの画面でもCtrl+Cで終了できるようにする。
            if is_ctrl_c(&k) {
                break;
            }
            if handle_key(&mut app, k).await? {
                break;
            }
        }
    }
    Ok(())
}

/// WorkerイベントをUI状態へ反映する。
fn handle_worker_event(app: &mut App, ev: WorkerEvent) {
    match ev {
        WorkerEvent::State {
            submission_id,
            state,
        } => {
            // Idleは新しい送信の開始を意味する。
            if state == SubmissionState::Idle {
                app.submission.id = Some(submission_id);
                app.submission.progress = ProgressSnapshot::default();
                return;
            }
            if app.submission.id == Some(submission_id) {
                app.submission.state = state;
            }
        }
        WorkerEvent::Progress {
            submission_id,
            snapshot,
        } => {
            if app.submission.id == Some(submission_id) {
                app.submission.progress = snapshot;
            }
        }
        WorkerEvent::ReportReady {
            submission_id,
            result,
        } => {
            // 古い送信の結果は捨てる。
            if submission_id.is_some() && submission_id != app.submission.id {
                return;
            }
            app.ui.push_log(format!("report {} ready", result.report_label()));
            app.ui.status = format!("Report {} ready", result.report_label());
            app.report = Some(*result);
            app.ui.report_scroll = 0;
            app.ui.screen = Screen::Report;
        }
        WorkerEvent::Failed {
            submission_id,
            message,
        } => {
            if app.submission.id != Some(submission_id) {
                return;
            }
            app.ui.push_log(format!("failed: {message}"));
            app.ui.status = "Submission failed".into();
            app.ui.error = Some(message);
        }
        WorkerEvent::Health(res) => match res {
            Ok(h) => {
                app.ui.health = Some(format!("{} ({})", h.status, h.service));
                app.ui.status = format!("Service {}: {}", h.service, h.status);
            }
            Err(e) => {
                app.ui.health = Some("unavailable".into());
                app.ui.error = Some(e.to_string());
            }
        },
        WorkerEvent::Log(s) => {
            app.ui.push_log(s);
        }
        WorkerEvent::Error(s) => {
            app.ui.push_log(format!("error: {s}"));
            app.ui.error = Some(s);
        }
    }
}
