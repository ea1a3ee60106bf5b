//! コマンド実行: 1 行のパース、ビルトイン判定、外部コマンドへの振り分け。
//!
//! - [`execute_line`]: 展開済みの 1 行をパースして [`execute`] に渡す
//! - [`execute`]: ビルトインならプロセス内で実行、それ以外は [`job::launch`] で起動
//!
//! バックグラウンドジョブの回収は 1 コマンドごとに呼び出し側（メインループ）が
//! [`job::reap_jobs`] で行う。

use std::io::Write;

use crate::builtins;
use crate::error::ShellError;
use crate::job;
use crate::parser::{self, Command};
use crate::shell::Shell;
use crate::spawn::ProcessHost;

/// 展開済みの 1 行を実行する。空行とコメント行は何もしない。
///
/// 構文エラーは `Err(ShellError::Parse(_))` として返り、シェルの状態は変わらない。
pub fn execute_line<H: ProcessHost>(
    shell: &mut Shell,
    host: &mut H,
    line: &str,
    out: &mut dyn Write,
) -> Result<(), ShellError> {
    match parser::parse(line, &shell.config)? {
        Some(cmd) => execute(shell, host, &cmd, out),
        None => Ok(()),
    }
}

/// パース済みの単一コマンドを実行する。
pub fn execute<H: ProcessHost>(
    shell: &mut Shell,
    host: &mut H,
    cmd: &Command,
    out: &mut dyn Write,
) -> Result<(), ShellError> {
    if let Some(result) = builtins::try_exec(shell, host, cmd, out) {
        return result.map_err(ShellError::from);
    }

    let background = shell.honors_background(cmd.background);
    job::launch(shell, host, cmd, background, out)
}
