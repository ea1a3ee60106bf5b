//! シェルの実行状態を保持するモジュール。
//!
//! ジョブテーブル、直前のフォアグラウンド終了ステータス、起動時の作業ディレクトリ、
//! シェルのモードを 1 つの [`Shell`] にまとめ、メインループから各コンポーネントへ参照で渡す。

use std::env;
use std::path::PathBuf;

use crate::config::Config;
use crate::job::{JobTable, Termination};
use crate::signals::{self, ShellMode};

/// シェルの実行状態。REPL ループ全体で共有される。
pub struct Shell {
    pub config: Config,
    /// 直前のフォアグラウンドコマンドの終了理由。`status` ビルトインが表示する。
    pub last_status: Termination,
    /// `exit` ビルトインで true にセットされ、REPL ループを終了させる。
    pub should_exit: bool,
    /// バックグラウンドジョブのテーブル。
    pub jobs: JobTable,
    /// 起動時の作業ディレクトリ。`exit` で戻る。取得できなかった場合は `None`。
    pub start_dir: Option<PathBuf>,
    /// `$$` の展開に使うシェル自身の PID。
    pub pid: u32,
    /// フォアグラウンド専用モード。SIGTSTP ハンドラだけが書き換える。
    pub mode: &'static ShellMode,
}

impl Shell {
    /// プロセス共有の [`signals::MODE`] を使うシェルを作る。
    pub fn new(config: Config) -> Self {
        Self::with_mode(config, &signals::MODE)
    }

    /// モードを指定してシェルを作る。
    pub fn with_mode(config: Config, mode: &'static ShellMode) -> Self {
        let start_dir = match env::current_dir() {
            Ok(dir) => Some(dir),
            Err(e) => {
                log::warn!("cannot determine starting directory: {}", e);
                None
            }
        };
        let jobs = JobTable::with_capacity(config.job_capacity);
        Self {
            config,
            last_status: Termination::default(),
            should_exit: false,
            jobs,
            start_dir,
            pid: std::process::id(),
            mode,
        }
    }

    /// `&` 要求に従ってバックグラウンド実行するかどうか。
    ///
    /// フォアグラウンド専用モード中は要求を捨ててフォアグラウンドで実行する。
    pub fn honors_background(&self, requested: bool) -> bool {
        if !requested {
            return false;
        }
        if self.mode.foreground_only() {
            log::debug!("foreground-only mode: running background request in foreground");
            return false;
        }
        true
    }
}
