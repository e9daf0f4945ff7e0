//! TUI用端末の初期化と復元。

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};

/// アプリ全体で使う端末型。
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// 生存中は代替画面・rawモードを維持し、Drop時に必ず元へ戻す。
pub struct TerminalSession {
    pub terminal: Tui,
}

impl TerminalSession {
    /// rawモードを有効化して代替画面へ入る。
    pub fn start() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            // 途中で失敗してもrawモードは戻しておく。
            let _ = disable_raw_mode();
            return Err(e.into());
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        // エラー経路・panic時も端末を壊したままにしない。
        if let Err(e) = restore_terminal() {
            tracing::error!("failed to restore terminal: {e}");
        }
    }
}

/// rawモードを解除して代替画面を終了する。
fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}
