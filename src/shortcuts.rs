//! ショートカット設定の管理。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ショートカット設定の全体（`shortcut.toml`）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shortcuts {
    pub main: MainShortcuts,
    pub report: ReportShortcuts,
    pub settings: SettingsShortcuts,
    pub input_box: InputBoxShortcuts,
}

/// メイン画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainShortcuts {
    pub quit: Vec<String>,
    pub settings: Vec<String>,
    pub select_file: Vec<String>,
    pub submit: Vec<String>,
    pub submit_direct: Vec<String>,
    pub health: Vec<String>,
    pub load_report: Vec<String>,
    pub view_report: Vec<String>,
}

/// レポート画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportShortcuts {
    pub back: Vec<String>,
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub page_up: Vec<String>,
    pub page_down: Vec<String>,
}

/// 設定画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsShortcuts {
    pub cancel: Vec<String>,
    pub save: Vec<String>,
    pub base_url: Vec<String>,
    pub storage_url: Vec<String>,
    pub bucket: Vec<String>,
}

/// InputBoxのショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBoxShortcuts {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub backspace: Vec<String>,
    pub delete: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub home: Vec<String>,
    pub end: Vec<String>,
    pub clear_line: Vec<String>,
}

impl Shortcuts {
    /// TOMLから読み込み、無ければデフォルトを返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            main: MainShortcuts {
                quit: keys(&["q"]),
                settings: keys(&["t"]),
                select_file: keys(&["o"]),
                submit: keys(&["Enter", "s"]),
                submit_direct: keys(&["u"]),
                health: keys(&["h"]),
                load_report: keys(&["l"]),
                view_report: keys(&["v"]),
            },
            report: ReportShortcuts {
                back: keys(&["Esc", "q"]),
                up: keys(&["Up", "k"]),
                down: keys(&["Down", "j"]),
                page_up: keys(&["PageUp"]),
                page_down: keys(&["PageDown", "Space"]),
            },
            settings: SettingsShortcuts {
                cancel: keys(&["Esc"]),
                save: keys(&["Enter"]),
                base_url: keys(&["a"]),
                storage_url: keys(&["s"]),
                bucket: keys(&["b"]),
            },
            input_box: InputBoxShortcuts {
                confirm: keys(&["Enter"]),
                cancel: keys(&["Esc"]),
                backspace: keys(&["Backspace"]),
                delete: keys(&["Delete"]),
                // 文字入力と衝突しないよう矢印キーのみ。
                left: keys(&["Left"]),
                right: keys(&["Right"]),
                home: keys(&["Home", "Ctrl+a"]),
                end: keys(&["End", "Ctrl+e"]),
                clear_line: keys(&["Ctrl+u"]),
            },
        }
    }
}

/// KeyEventがいずれかのショートカット文字列と一致するか判定する。
pub fn matches_shortcut(key: &KeyEvent, shortcuts: &[String]) -> bool {
    shortcuts.iter().any(|s| matches_single_shortcut(key, s))
}

/// 修飾キー名を解析する。
fn parse_modifier(name: &str) -> Option<KeyModifiers> {
    match name.to_ascii_lowercase().as_str() {
        "ctrl" => Some(KeyModifiers::CONTROL),
        "alt" => Some(KeyModifiers::ALT),
        "shift" => Some(KeyModifiers::SHIFT),
        _ => None,
    }
}

/// キー名を KeyCode に変換する。
fn parse_key(name: &str) -> Option<KeyCode> {
    let code = match name.to_ascii_lowercase().as_str() {
        "enter" => KeyCode::Enter,
        "esc" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "backspace" => KeyCode::Backspace,
        "delete" => KeyCode::Delete,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        "space" => KeyCode::Char(' '),
        _ => {
            // 単一文字は大文字小文字をそのまま Char として扱う。
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return None,
            }
        }
    };
    Some(code)
}

/// KeyEventが単一のショートカット文字列（例: "Ctrl+u", "a", "Enter"）と一致するか判定する。
fn matches_single_shortcut(key: &KeyEvent, shortcut: &str) -> bool {
    let (mods, key_name) = match shortcut.rsplit_once('+') {
        // "+" 単体や "Ctrl++" のような末尾 "+" はキー "+" とみなす。
        Some((m, "")) => (m.strip_suffix('+').unwrap_or(m), "+"),
        Some((m, k)) => (m, k),
        None => ("", shortcut),
    };

    let mut expected = KeyModifiers::empty();
    for name in mods.split('+').filter(|s| !s.is_empty()) {
        match parse_modifier(name) {
            Some(m) => expected |= m,
            None => return false,
        }
    }

    key.modifiers == expected && parse_key(key_name) == Some(key.code)
}
