//! Preference loading and parsing for `brld.toml`.
//!
//! Mirrors the teacher's `ConfigFile`/`Config`/`apply_context` split: raw
//! parsed values are retained as-is from the file, then clamped against
//! runtime context (the attached display's cell geometry) the same way the
//! teacher clamps `scroll.margin.vertical` against viewport rows. Here the
//! context-dependent clamp is `cursor.trackScreenCursor`: tracking is
//! meaningless (and forced off) once the context reports zero braille
//! columns (no display attached, or `noDisplay` in effect).

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::info;

/// The geometry the effective config is clamped against: the attached
/// display's cell counts. `text_count == 0` models "no display" and forces
/// cursor tracking off regardless of what the file requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigContext {
    pub text_count: u16,
    pub text_rows: u16,
}

impl ConfigContext {
    pub fn new(text_count: u16, text_rows: u16) -> Self {
        ConfigContext { text_count, text_rows }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct WindowConfig {
    pub sliding_braille_window: bool,
    pub eager_sliding_braille_window: bool,
    pub word_wrap: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig { sliding_braille_window: true, eager_sliding_braille_window: false, word_wrap: true }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct CursorConfig {
    pub track_screen_cursor: bool,
    pub hide_screen_cursor: bool,
    /// `0` disables delayed tracking; otherwise the arm delay is
    /// `250 << (cursor_tracking_delay - 1)` ms (see `core_cursor::TrackerConfig`,
    /// which this field feeds directly).
    pub cursor_tracking_delay: u8,
}

impl Default for CursorConfig {
    fn default() -> Self {
        CursorConfig { track_screen_cursor: true, hide_screen_cursor: false, cursor_tracking_delay: 0 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct AlertsConfig {
    pub enabled: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        AlertsConfig { enabled: true }
    }
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigFile {
    pub window: WindowConfig,
    pub cursor: CursorConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub file: ConfigFile,
    /// `file.cursor.track_screen_cursor` after `apply_context` has had a
    /// chance to force it off for a degenerate display.
    pub effective_track_screen_cursor: bool,
}

/// Environment variable `discover` checks before falling back to the local
/// file and platform config dir. The binary's `--config` flag still wins
/// when given — that path is passed to `load_from` directly and never goes
/// through `discover` at all.
pub const CONFIG_PATH_ENV_VAR: &str = "BRLD_CONFIG_PATH";

/// Env-var-override, then local-file, then platform config dir, mirroring
/// the teacher's `discover()`.
pub fn discover() -> PathBuf {
    if let Ok(from_env) = std::env::var(CONFIG_PATH_ENV_VAR) {
        if !from_env.is_empty() {
            return PathBuf::from(from_env);
        }
    }
    let local = PathBuf::from("brld.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("brld").join("brld.toml");
    }
    PathBuf::from("brld.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config { file, effective_track_screen_cursor: file.cursor.track_screen_cursor }),
            Err(err) => {
                tracing::warn!(target: "config", %err, path = %path.display(), "failed to parse config, using defaults");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    /// Applies display geometry context, clamping
    /// `cursor.track_screen_cursor` off when there is no usable braille
    /// window (`text_count == 0`). Returns the effective tracking flag.
    pub fn apply_context(&mut self, ctx: ConfigContext) -> bool {
        let raw = self.file.cursor.track_screen_cursor;
        let effective = raw && ctx.text_count > 0;
        if effective != raw {
            info!(
                target: "config",
                raw,
                effective,
                text_count = ctx.text_count,
                text_rows = ctx.text_rows,
                "track_screen_cursor_clamped"
            );
        }
        self.effective_track_screen_cursor = effective;
        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_brld__.toml"))).unwrap();
        assert!(cfg.file.window.sliding_braille_window);
        assert!(!cfg.file.window.eager_sliding_braille_window);
        assert!(cfg.file.window.word_wrap);
        assert!(cfg.file.cursor.track_screen_cursor);
        assert!(!cfg.file.cursor.hide_screen_cursor);
        assert_eq!(cfg.file.cursor.cursor_tracking_delay, 0);
        assert!(cfg.file.alerts.enabled);
    }

    #[test]
    fn parses_all_sections() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            r#"
            [window]
            slidingBrailleWindow = false
            eagerSlidingBrailleWindow = true
            wordWrap = false

            [cursor]
            trackScreenCursor = true
            hideScreenCursor = true
            cursorTrackingDelay = 2

            [alerts]
            enabled = false
            "#,
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(!cfg.file.window.sliding_braille_window);
        assert!(cfg.file.window.eager_sliding_braille_window);
        assert!(!cfg.file.window.word_wrap);
        assert!(cfg.file.cursor.hide_screen_cursor);
        assert_eq!(cfg.file.cursor.cursor_tracking_delay, 2);
        assert!(!cfg.file.alerts.enabled);
    }

    #[test]
    fn parse_error_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "not valid toml [[[").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file, ConfigFile::default());
    }

    #[test]
    fn apply_context_leaves_tracking_on_with_real_display() {
        let mut cfg = Config::default();
        let effective = cfg.apply_context(ConfigContext::new(40, 25));
        assert!(effective);
        assert!(cfg.effective_track_screen_cursor);
    }

    #[test]
    fn apply_context_forces_tracking_off_with_no_display() {
        let mut cfg = Config::default();
        let effective = cfg.apply_context(ConfigContext::new(0, 0));
        assert!(!effective);
        assert!(!cfg.effective_track_screen_cursor);
    }

    #[test]
    fn discover_prefers_env_var_override_when_set() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[alerts]\nenabled = false\n").unwrap();
        // SAFETY: this test owns the env var for its duration and restores it
        // afterward; `cargo test` runs this crate's tests on one thread.
        let previous = std::env::var(CONFIG_PATH_ENV_VAR).ok();
        std::env::set_var(CONFIG_PATH_ENV_VAR, tmp.path());
        let found = discover();
        match previous {
            Some(value) => std::env::set_var(CONFIG_PATH_ENV_VAR, value),
            None => std::env::remove_var(CONFIG_PATH_ENV_VAR),
        }
        assert_eq!(found, tmp.path());
    }
}
