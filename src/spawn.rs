//! 外部コマンドの起動・待機の土台。
//!
//! [`ProcessHost`] がカーネルのプロセス操作（起動、pid 指定の待機、非ブロッキング回収、強制終了）を
//! 抽象化し、[`UnixHost`] が `fork` + `execvp` + `waitpid` で実装する。
//! ジョブ制御（[`job`](crate::job)）とビルトインはこのトレイト越しにしか子プロセスを触らない。
//!
//! ## 子プロセス側の手順
//!
//! 1. SIGTSTP を無視（フォアグラウンド専用モードの切り替えは子に届かない）
//! 2. SIGINT をデフォルトに戻す。バックグラウンドなら無視
//! 3. `<` / `>` のファイルを開いて `dup2`。失敗したら 1（入力）/ 2（出力）で終了
//! 4. `execvp`。失敗したら `プログラム名: 原因` を出して 127 / 126 で終了
//!
//! `fork` 後の子ではメモリ確保をしない。C 文字列と診断メッセージはすべて `fork` 前に用意する。

use std::ffi::{CStr, CString};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use libc::pid_t;

use crate::config::NULL_DEVICE;
use crate::error::SpawnError;
use crate::job::Termination;
use crate::parser::Redirection;

/// 入力リダイレクトを開けなかったときの子の終了ステータス。
pub const INPUT_REDIRECT_FAILURE: i32 = 1;
/// 出力リダイレクトを開けなかったときの子の終了ステータス。
pub const OUTPUT_REDIRECT_FAILURE: i32 = 2;

/// exec 失敗の errno に対応する終了ステータス。
/// 127 = command not found, 126 = それ以外（permission denied など）。
///
/// リダイレクト失敗の 1 / 2 とは重ならない。
pub fn exec_failure_status(errno: i32) -> i32 {
    match errno {
        libc::ENOENT => 127,
        _ => 126,
    }
}

// ── ProcessHost ───────────────────────────────────────────────────

/// 起動要求。
pub struct SpawnRequest<'a> {
    /// `args[0]` がプログラム名（PATH 検索付き）。
    pub args: &'a [String],
    pub redirect: &'a Redirection,
    /// バックグラウンド実行なら `true`。SIGINT 無視とヌルデバイス代入が有効になる。
    pub background: bool,
}

/// 子プロセス操作の抽象。
pub trait ProcessHost {
    /// 子プロセスを起動し、pid を返す。
    fn spawn(&mut self, request: &SpawnRequest<'_>) -> Result<pid_t, SpawnError>;

    /// 指定 pid の終了までブロックする。
    fn wait(&mut self, pid: pid_t) -> io::Result<Termination>;

    /// 終了済みの子を 1 つ回収する。なければ `None`（ブロックしない）。
    fn try_wait_any(&mut self) -> Option<(pid_t, Termination)>;

    /// 子プロセスを強制終了する（SIGKILL）。
    fn kill(&mut self, pid: pid_t) -> io::Result<()>;
}

// ── UnixHost ──────────────────────────────────────────────────────

/// `fork` / `execvp` / `waitpid` による [`ProcessHost`] 実装。
#[derive(Debug, Default)]
pub struct UnixHost;

impl ProcessHost for UnixHost {
    fn spawn(&mut self, request: &SpawnRequest<'_>) -> Result<pid_t, SpawnError> {
        let argv = CStringVec::from_args(request.args)?;
        let null = Path::new(NULL_DEVICE);
        let input = match (&request.redirect.input, request.background) {
            (Some(p), _) => Some(RedirectTarget::new(p, "input")?),
            (None, true) => Some(RedirectTarget::new(null, "input")?),
            (None, false) => None,
        };
        let output = match (&request.redirect.output, request.background) {
            (Some(p), _) => Some(RedirectTarget::new(p, "output")?),
            (None, true) => Some(RedirectTarget::new(null, "output")?),
            (None, false) => None,
        };

        // バッファ済みの出力が子に複製されないよう fork 前に吐き出す
        if let Err(e) = io::stdout().flush() {
            log::debug!("flush stdout before fork: {}", e);
        }

        let pid = unsafe { libc::fork() };
        match pid {
            -1 => Err(SpawnError::Fork(io::Error::last_os_error())),
            0 => exec_child(&argv, input.as_ref(), output.as_ref(), request.background),
            child => {
                log::debug!(
                    "spawned pid {} for {:?} (background={})",
                    child,
                    request.args,
                    request.background
                );
                Ok(child)
            }
        }
    }

    fn wait(&mut self, pid: pid_t) -> io::Result<Termination> {
        loop {
            let mut raw_status: i32 = 0;
            let ret = unsafe { libc::waitpid(pid, &mut raw_status, 0) };
            if ret == -1 {
                let err = io::Error::last_os_error();
                // SIGTSTP は SA_RESTART なしなので待機が中断されうる
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            return Ok(Termination::from_raw(raw_status));
        }
    }

    fn try_wait_any(&mut self) -> Option<(pid_t, Termination)> {
        let mut raw_status: i32 = 0;
        let pid = unsafe { libc::waitpid(-1, &mut raw_status, libc::WNOHANG) };
        if pid <= 0 {
            return None;
        }
        Some((pid, Termination::from_raw(raw_status)))
    }

    fn kill(&mut self, pid: pid_t) -> io::Result<()> {
        if unsafe { libc::kill(pid, libc::SIGKILL) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

// ── 子プロセス側 ──────────────────────────────────────────────────

/// fork 後の子プロセスで実行する。戻らない。
fn exec_child(
    argv: &CStringVec,
    input: Option<&RedirectTarget>,
    output: Option<&RedirectTarget>,
    background: bool,
) -> ! {
    unsafe {
        libc::signal(libc::SIGTSTP, libc::SIG_IGN);
        libc::signal(
            libc::SIGINT,
            if background { libc::SIG_IGN } else { libc::SIG_DFL },
        );
    }

    if let Some(target) = input {
        redirect_fd(target, libc::O_RDONLY, libc::STDIN_FILENO, INPUT_REDIRECT_FAILURE);
    }
    if let Some(target) = output {
        redirect_fd(
            target,
            libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
            libc::STDOUT_FILENO,
            OUTPUT_REDIRECT_FAILURE,
        );
    }

    unsafe {
        libc::execvp(argv.program(), argv.as_ptr());
    }

    // exec 失敗: `name: strerror` を stderr に出して終了
    let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
    let reason = unsafe { CStr::from_ptr(libc::strerror(errno)) };
    raw_write(libc::STDERR_FILENO, argv.name_bytes());
    raw_write(libc::STDERR_FILENO, b": ");
    raw_write(libc::STDERR_FILENO, reason.to_bytes());
    raw_write(libc::STDERR_FILENO, b"\n");
    unsafe { libc::_exit(exec_failure_status(errno)) }
}

/// `target` を開いて `newfd` に `dup2` する。失敗したら診断を出して `code` で終了する。
fn redirect_fd(target: &RedirectTarget, flags: libc::c_int, newfd: libc::c_int, code: i32) {
    let fd = unsafe { libc::open(target.path.as_ptr(), flags, 0o644 as libc::c_uint) };
    if fd == -1 {
        raw_write(libc::STDERR_FILENO, &target.failure_message);
        unsafe { libc::_exit(code) }
    }
    if unsafe { libc::dup2(fd, newfd) } == -1 {
        raw_write(libc::STDERR_FILENO, b"dup2 failed\n");
        unsafe { libc::_exit(code) }
    }
    if fd != newfd {
        unsafe {
            libc::close(fd);
        }
    }
}

fn raw_write(fd: libc::c_int, bytes: &[u8]) {
    unsafe {
        libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len());
    }
}

// ── fork 前に用意するデータ ──────────────────────────────────────

/// リダイレクト先のパスと、開けなかったときのメッセージ。
struct RedirectTarget {
    path: CString,
    failure_message: Vec<u8>,
}

impl RedirectTarget {
    fn new(path: &Path, direction: &str) -> Result<Self, SpawnError> {
        let display = path.display().to_string();
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| SpawnError::InvalidArgument(display.clone()))?;
        Ok(Self {
            path: c_path,
            failure_message: format!("cannot open {} for {}\n", display, direction).into_bytes(),
        })
    }
}

/// argv 用の CString ベクタ。NULL 終端のポインタ配列を構築する。
struct CStringVec {
    strings: Vec<CString>,
    ptrs: Vec<*const libc::c_char>,
}

impl CStringVec {
    /// 引数リストから構築する。NUL バイトを含む引数があれば拒否する。
    fn from_args(args: &[String]) -> Result<Self, SpawnError> {
        let strings = args
            .iter()
            .map(|s| CString::new(s.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| SpawnError::InvalidArgument(args[0].clone()))?;
        let mut ptrs: Vec<*const libc::c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(std::ptr::null()); // NULL 終端
        Ok(Self { strings, ptrs })
    }

    fn program(&self) -> *const libc::c_char {
        self.strings[0].as_ptr()
    }

    fn name_bytes(&self) -> &[u8] {
        self.strings[0].as_bytes()
    }

    /// NULL 終端ポインタ配列を返す。
    fn as_ptr(&self) -> *const *const libc::c_char {
        self.ptrs.as_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("smallsh-spawn-{}-{}", std::process::id(), name))
    }

    fn run(argv: &[&str], redirect: &Redirection) -> Termination {
        let mut host = UnixHost;
        let argv = args(argv);
        let pid = host
            .spawn(&SpawnRequest {
                args: &argv,
                redirect,
                background: false,
            })
            .unwrap();
        host.wait(pid).unwrap()
    }

    #[test]
    fn failure_status_mapping() {
        assert_eq!(exec_failure_status(libc::ENOENT), 127);
        assert_eq!(exec_failure_status(libc::EACCES), 126);
        assert_eq!(exec_failure_status(libc::E2BIG), 126);
        for errno in [libc::ENOENT, libc::EACCES, libc::E2BIG, libc::ENOEXEC] {
            let code = exec_failure_status(errno);
            assert_ne!(code, INPUT_REDIRECT_FAILURE);
            assert_ne!(code, OUTPUT_REDIRECT_FAILURE);
        }
    }

    #[test]
    fn cstring_vec_is_null_terminated() {
        let v = CStringVec::from_args(&args(&["ls", "-l"])).unwrap();
        assert_eq!(v.ptrs.len(), 3);
        assert!(v.ptrs[2].is_null());
        assert_eq!(v.name_bytes(), b"ls");
    }

    #[test]
    fn nul_byte_rejected() {
        let err = CStringVec::from_args(&args(&["echo", "a\0b"])).err().unwrap();
        assert!(matches!(err, SpawnError::InvalidArgument(ref name) if name == "echo"));
    }

    #[test]
    fn exit_code_observed() {
        let t = run(&["/bin/sh", "-c", "exit 2"], &Redirection::default());
        assert_eq!(t, Termination::Exited(2));
    }

    #[test]
    fn killed_by_signal_observed() {
        let t = run(&["/bin/sh", "-c", "kill -9 $$"], &Redirection::default());
        assert_eq!(t, Termination::Signaled(9));
    }

    #[test]
    fn unknown_program_exits_127() {
        let t = run(&["smallsh-no-such-program"], &Redirection::default());
        assert_eq!(t, Termination::Exited(127));
    }

    #[test]
    fn missing_input_file_exits_1() {
        let redirect = Redirection {
            input: Some(temp_path("does-not-exist")),
            output: None,
        };
        let t = run(&["/bin/cat"], &redirect);
        assert_eq!(t, Termination::Exited(INPUT_REDIRECT_FAILURE));
    }

    #[test]
    fn unwritable_output_exits_2() {
        let redirect = Redirection {
            input: None,
            output: Some(PathBuf::from("/nonexistent-dir/smallsh/out.txt")),
        };
        let t = run(&["/bin/echo", "hi"], &redirect);
        assert_eq!(t, Termination::Exited(OUTPUT_REDIRECT_FAILURE));
    }

    #[test]
    fn redirects_input_and_output() {
        let src = temp_path("in.txt");
        let dst = temp_path("out.txt");
        std::fs::write(&src, "hello\n").unwrap();
        std::fs::write(&dst, "old content that must be truncated\n").unwrap();

        let redirect = Redirection {
            input: Some(src.clone()),
            output: Some(dst.clone()),
        };
        let t = run(&["/bin/cat"], &redirect);
        assert_eq!(t, Termination::Exited(0));
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "hello\n");

        let _ = std::fs::remove_file(src);
        let _ = std::fs::remove_file(dst);
    }

    #[test]
    fn background_defaults_to_null_device() {
        let mut host = UnixHost;
        let argv = args(&["/bin/cat"]);
        let redirect = Redirection::default();
        let pid = host
            .spawn(&SpawnRequest {
                args: &argv,
                redirect: &redirect,
                background: true,
            })
            .unwrap();
        // stdin が /dev/null なので cat は即座に EOF で終わる
        assert_eq!(host.wait(pid).unwrap(), Termination::Exited(0));
    }

    fn spawn_sleep(host: &mut UnixHost, background: bool) -> pid_t {
        let argv = args(&["/bin/sleep", "5"]);
        let redirect = Redirection::default();
        let pid = host
            .spawn(&SpawnRequest {
                args: &argv,
                redirect: &redirect,
                background,
            })
            .unwrap();
        // 子がシグナル設定を終えて exec するまで待つ
        std::thread::sleep(std::time::Duration::from_millis(200));
        pid
    }

    #[test]
    fn background_ignores_sigint_until_killed() {
        let mut host = UnixHost;
        let pid = spawn_sleep(&mut host, true);
        unsafe {
            libc::kill(pid, libc::SIGINT);
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
        host.kill(pid).unwrap();
        assert_eq!(host.wait(pid).unwrap(), Termination::Signaled(libc::SIGKILL));
    }

    #[test]
    fn foreground_terminated_by_sigint() {
        let mut host = UnixHost;
        let pid = spawn_sleep(&mut host, false);
        unsafe {
            libc::kill(pid, libc::SIGINT);
        }
        assert_eq!(host.wait(pid).unwrap(), Termination::Signaled(libc::SIGINT));
    }
}
