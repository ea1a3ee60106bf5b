//! シグナル仲介: フォアグラウンド専用モードの切り替えと SIGINT の握りつぶし。
//!
//! | シグナル | シェル本体 | 子プロセス |
//! |---------|-----------|-----------|
//! | SIGTSTP | モードを反転してメッセージを表示 | 無視（[`spawn`](crate::spawn) で設定） |
//! | SIGINT  | 捕捉して何もしない | フォアグラウンドはデフォルト、バックグラウンドは無視 |
//!
//! ハンドラ内で触れる状態は [`ShellMode`] のアトミックフラグだけ。
//! ジョブテーブルの更新は必ずメインループの同期区間で行う。

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// フォアグラウンド専用モードに入るときのメッセージ。
pub const ENTER_MESSAGE: &str = "\nEntering foreground-only mode (& is now ignored)\n";
/// フォアグラウンド専用モードを抜けるときのメッセージ。
pub const EXIT_MESSAGE: &str = "\nExiting foreground-only mode\n";

/// シェルのモード。`true` ならフォアグラウンド専用（`&` を無視）。
#[derive(Debug)]
pub struct ShellMode {
    foreground_only: AtomicBool,
}

impl ShellMode {
    pub const fn new() -> Self {
        Self {
            foreground_only: AtomicBool::new(false),
        }
    }

    /// 現在フォアグラウンド専用モードかどうか。
    pub fn foreground_only(&self) -> bool {
        self.foreground_only.load(Ordering::SeqCst)
    }

    /// モードを反転し、反転後の値を返す。
    pub fn toggle(&self) -> bool {
        !self.foreground_only.fetch_xor(true, Ordering::SeqCst)
    }

    /// 反転後のモードに対応するメッセージを返す。
    pub fn toggle_message(entered: bool) -> &'static str {
        if entered {
            ENTER_MESSAGE
        } else {
            EXIT_MESSAGE
        }
    }
}

impl Default for ShellMode {
    fn default() -> Self {
        Self::new()
    }
}

/// プロセス全体で共有するモード。SIGTSTP ハンドラが唯一の書き手。
pub static MODE: ShellMode = ShellMode::new();

// ── ハンドラ ─────────────────────────────────────────────────────────

/// SIGTSTP: モードを反転してメッセージを `write(2)` で直接出力する。
///
/// async-signal-safe な操作（アトミック操作と `write`）のみを使う。
extern "C" fn on_sigtstp(_: libc::c_int) {
    let msg = ShellMode::toggle_message(MODE.toggle());
    unsafe {
        libc::write(
            libc::STDOUT_FILENO,
            msg.as_ptr() as *const libc::c_void,
            msg.len(),
        );
    }
}

/// SIGINT: シェル本体では何もしない。
extern "C" fn on_sigint(_: libc::c_int) {}

/// シェル本体のシグナルハンドラを設定する。
///
/// SIGINT は `SA_RESTART` 付きで、入力待ちや `waitpid` を中断させない。
/// SIGTSTP は `SA_RESTART` なしで、入力待ちを中断してプロンプトを出し直させる。
/// どちらもハンドラ実行中は全シグナルをブロックする。
pub fn install() -> io::Result<()> {
    install_handler(libc::SIGINT, on_sigint, libc::SA_RESTART)?;
    install_handler(libc::SIGTSTP, on_sigtstp, 0)?;
    log::debug!("signal handlers installed");
    Ok(())
}

fn install_handler(
    signum: libc::c_int,
    handler: extern "C" fn(libc::c_int),
    flags: libc::c_int,
) -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler as libc::sighandler_t;
        action.sa_flags = flags;
        libc::sigfillset(&mut action.sa_mask);
        if libc::sigaction(signum, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
