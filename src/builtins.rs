//! ビルトインコマンドの実装。
//!
//! ビルトインは fork/exec を経由せずシェルのプロセス内で実行される。
//! `try_exec()` が `Some(result)` を返せばビルトインとして処理済み、
//! `None` なら外部コマンドとして job に委ねる。
//!
//! ビルトインは `last_status` を更新しない（`status` が報告するのはフォアグラウンドの外部コマンドのみ）。

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::job;
use crate::parser::Command;
use crate::shell::Shell;
use crate::spawn::ProcessHost;

/// ビルトインの実行を試みる。
///
/// 戻り値:
/// - `Some(Ok(()))` — ビルトインとして実行済み（`cd` の失敗も診断を出した上でここに含まれる）
/// - `Some(Err(e))` — 出力先への書き込みに失敗
/// - `None` — 該当するビルトインなし
pub fn try_exec<H: ProcessHost>(
    shell: &mut Shell,
    host: &mut H,
    cmd: &Command,
    out: &mut dyn Write,
) -> Option<io::Result<()>> {
    match cmd.name() {
        "cd" => Some(builtin_cd(cmd.args.get(1).map(String::as_str))),
        "status" => Some(builtin_status(shell, out)),
        "exit" => Some(builtin_exit(shell, host)),
        _ => None,
    }
}

/// `cd [dir]` — カレントディレクトリを変更する。引数省略時は `$HOME` に移動。
///
/// 失敗してもシェルは終了しない。
fn builtin_cd(arg: Option<&str>) -> io::Result<()> {
    let target = match arg {
        Some(dir) => PathBuf::from(dir),
        None => match env::var_os("HOME") {
            Some(home) => PathBuf::from(home),
            None => {
                eprintln!("cd: HOME not set");
                return Ok(());
            }
        },
    };

    if let Err(e) = change_dir(&target) {
        eprintln!("cd: {}: {}", target.display(), e);
    }
    Ok(())
}

fn change_dir(target: &Path) -> io::Result<()> {
    env::set_current_dir(target)?;
    log::debug!("cwd is now {}", target.display());
    Ok(())
}

/// `status` — 直前のフォアグラウンドコマンドの終了理由を表示する。
fn builtin_status(shell: &Shell, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", shell.last_status)?;
    out.flush()
}

/// `exit` — 全バックグラウンドジョブを強制終了し、起動時のディレクトリに戻って REPL を止める。
fn builtin_exit<H: ProcessHost>(shell: &mut Shell, host: &mut H) -> io::Result<()> {
    job::kill_all(&shell.jobs, host);
    if let Some(dir) = &shell.start_dir {
        if let Err(e) = change_dir(dir) {
            eprintln!("cd: {}: {}", dir.display(), e);
        }
    }
    shell.should_exit = true;
    Ok(())
}
