//! ジョブテーブルとジョブ制御。
//!
//! 外部コマンドの起動 ([`launch`])、フォアグラウンド待機 ([`wait_for_fg`])、
//! バックグラウンド回収と完了通知 ([`reap_jobs`])、全ジョブの強制終了 ([`kill_all`]) を提供する。
//! executor と builtins の両方から利用する。

use std::fmt;
use std::io::{self, Write};

use libc::pid_t;

use crate::error::ShellError;
use crate::parser::Command;
use crate::shell::Shell;
use crate::spawn::{ProcessHost, SpawnRequest};

// ── 終了ステータス ───────────────────────────────────────────────────

/// 子プロセスの終了理由。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// 正常終了。引数は終了コード。
    Exited(i32),
    /// シグナルで終了。引数はシグナル番号。
    Signaled(i32),
}

impl Termination {
    /// `waitpid` の raw status を解釈する。
    pub fn from_raw(raw_status: i32) -> Self {
        if libc::WIFEXITED(raw_status) {
            Self::Exited(libc::WEXITSTATUS(raw_status))
        } else if libc::WIFSIGNALED(raw_status) {
            Self::Signaled(libc::WTERMSIG(raw_status))
        } else {
            Self::Exited(1)
        }
    }
}

impl Default for Termination {
    /// フォアグラウンドコマンドを 1 つも実行していないときの値。
    fn default() -> Self {
        Self::Exited(0)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit value {}", code),
            Self::Signaled(sig) => write!(f, "terminated by signal {}", sig),
        }
    }
}

// ── JobTable ─────────────────────────────────────────────────────────

/// バックグラウンドジョブの pid を挿入順に保持するテーブル。
///
/// 生死は保持せず、[`reap_jobs`] が回収した時点で取り除く。
/// 容量は満杯になるたびに倍になる。
#[derive(Debug)]
pub struct JobTable {
    pids: Vec<pid_t>,
    capacity: usize,
}

impl JobTable {
    /// 初期容量 `capacity`（最低 1）のテーブルを作る。
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pids: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// pid を末尾に追加する。既に登録済みなら何もせず `false` を返す。
    pub fn insert(&mut self, pid: pid_t) -> bool {
        if self.contains(pid) {
            return false;
        }
        if self.pids.len() == self.capacity {
            self.capacity *= 2;
            self.pids.reserve_exact(self.capacity - self.pids.len());
            log::debug!("job table grown to capacity {}", self.capacity);
        }
        self.pids.push(pid);
        true
    }

    /// pid を取り除く。残りの相対順序は保たれる。登録されていなければ `false`。
    pub fn remove(&mut self, pid: pid_t) -> bool {
        match self.pids.iter().position(|&p| p == pid) {
            Some(i) => {
                self.pids.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, pid: pid_t) -> bool {
        self.pids.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    /// 論理容量（倍々で増える値）。
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 全 pid のイテレータ（挿入順）。
    pub fn iter(&self) -> impl Iterator<Item = pid_t> + '_ {
        self.pids.iter().copied()
    }
}

// ── 起動・待機 ───────────────────────────────────────────────────────

/// 外部コマンドを起動する。
///
/// - `background == true` → ジョブテーブルに登録し `background pid is N` を表示して即座に返る
/// - それ以外 → 終了まで待機し、終了ステータスを `shell.last_status` に記録する。
///   シグナルで終了した場合は `terminated by signal N` を表示する
///
/// `background` はモード判定済みの値（フォアグラウンド専用モードなら呼び出し側で `false`）。
pub fn launch<H: ProcessHost>(
    shell: &mut Shell,
    host: &mut H,
    cmd: &Command,
    background: bool,
    out: &mut dyn Write,
) -> Result<(), ShellError> {
    let pid = host.spawn(&SpawnRequest {
        args: &cmd.args,
        redirect: &cmd.redirect,
        background,
    })?;

    if background {
        shell.jobs.insert(pid);
        writeln!(out, "background pid is {}", pid)?;
        out.flush()?;
        return Ok(());
    }

    let status = wait_for_fg(host, pid)?;
    shell.last_status = status;
    if let Termination::Signaled(_) = status {
        writeln!(out, "{}", status)?;
        out.flush()?;
    }
    Ok(())
}

/// フォアグラウンドの子 `pid` の終了を待つ。
///
/// 他の子（バックグラウンドジョブ）はここでは回収しない。
pub fn wait_for_fg<H: ProcessHost>(host: &mut H, pid: pid_t) -> io::Result<Termination> {
    let status = host.wait(pid)?;
    log::debug!("foreground pid {} finished: {}", pid, status);
    Ok(status)
}

/// 終了済みの子をすべて非ブロッキングで回収し、完了を通知してテーブルから取り除く。
///
/// 1 回の `waitpid(WNOHANG)` は 1 つしか返さないので、回収できなくなるまで繰り返す。
/// 各コマンド（ビルトイン・コメント行を含む）の後に呼ばれる。戻り値は回収した数。
pub fn reap_jobs<H: ProcessHost>(
    jobs: &mut JobTable,
    host: &mut H,
    out: &mut dyn Write,
) -> io::Result<usize> {
    let mut reaped = 0;
    while let Some((pid, status)) = host.try_wait_any() {
        writeln!(out, "background pid {} is done: {}", pid, status)?;
        if !jobs.remove(pid) {
            log::warn!("reaped pid {} that was not in the job table", pid);
        }
        reaped += 1;
    }
    if reaped > 0 {
        out.flush()?;
        log::debug!("reaped {} job(s), {} still running", reaped, jobs.len());
    }
    Ok(reaped)
}

/// テーブル上の全ジョブに SIGKILL を送る。既に終了していたジョブの失敗は無視する。
pub fn kill_all<H: ProcessHost>(jobs: &JobTable, host: &mut H) {
    for pid in jobs.iter() {
        if let Err(e) = host.kill(pid) {
            log::debug!("kill {}: {}", pid, e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::config::Config;
    use crate::error::SpawnError;
    use crate::parser;
    use crate::signals::ShellMode;

    /// スクリプト化された [`ProcessHost`]。
    ///
    /// `spawn` は連番の pid を返し、フォアグラウンド待機の結果は `fg_results` から、
    /// 回収結果は `finished` から順に取り出す。
    #[derive(Default)]
    pub(crate) struct FakeHost {
        pub next_pid: pid_t,
        pub spawned: Vec<(Vec<String>, bool)>,
        pub fg_results: VecDeque<Termination>,
        pub finished: VecDeque<(pid_t, Termination)>,
        pub killed: Vec<pid_t>,
        pub fail_fork: bool,
    }

    impl FakeHost {
        pub fn new() -> Self {
            Self {
                next_pid: 100,
                ..Self::default()
            }
        }
    }

    impl ProcessHost for FakeHost {
        fn spawn(&mut self, request: &SpawnRequest<'_>) -> Result<pid_t, SpawnError> {
            if self.fail_fork {
                return Err(SpawnError::Fork(io::Error::from_raw_os_error(libc::EAGAIN)));
            }
            self.spawned
                .push((request.args.to_vec(), request.background));
            let pid = self.next_pid;
            self.next_pid += 1;
            Ok(pid)
        }

        fn wait(&mut self, _pid: pid_t) -> io::Result<Termination> {
            Ok(self.fg_results.pop_front().unwrap_or_default())
        }

        fn try_wait_any(&mut self) -> Option<(pid_t, Termination)> {
            self.finished.pop_front()
        }

        fn kill(&mut self, pid: pid_t) -> io::Result<()> {
            self.killed.push(pid);
            Ok(())
        }
    }

    pub(crate) fn test_shell(mode: &'static ShellMode) -> Shell {
        Shell::with_mode(Config::default(), mode)
    }

    fn command(line: &str) -> Command {
        parser::parse(line, &Config::default()).unwrap().unwrap()
    }

    #[test]
    fn termination_display() {
        assert_eq!(Termination::Exited(2).to_string(), "exit value 2");
        assert_eq!(Termination::Signaled(9).to_string(), "terminated by signal 9");
        assert_eq!(Termination::default().to_string(), "exit value 0");
    }

    #[test]
    fn termination_from_raw() {
        // Linux の wait status エンコーディング: exit code は上位バイト、シグナルは下位 7 ビット
        assert_eq!(Termination::from_raw(2 << 8), Termination::Exited(2));
        assert_eq!(Termination::from_raw(0), Termination::Exited(0));
        assert_eq!(Termination::from_raw(9), Termination::Signaled(9));
        assert_eq!(Termination::from_raw(15), Termination::Signaled(15));
    }

    #[test]
    fn table_doubles_when_full() {
        let mut jobs = JobTable::with_capacity(3);
        assert_eq!(jobs.capacity(), 3);
        for pid in 1..=3 {
            assert!(jobs.insert(pid));
        }
        assert_eq!(jobs.capacity(), 3);
        jobs.insert(4);
        assert_eq!(jobs.capacity(), 6);
        for pid in 5..=7 {
            jobs.insert(pid);
        }
        assert_eq!(jobs.capacity(), 12);
        assert_eq!(jobs.len(), 7);
    }

    #[test]
    fn table_rejects_duplicates() {
        let mut jobs = JobTable::with_capacity(3);
        assert!(jobs.insert(10));
        assert!(!jobs.insert(10));
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn table_remove_preserves_order() {
        let mut jobs = JobTable::with_capacity(2);
        for pid in [5, 6, 7, 8] {
            jobs.insert(pid);
        }
        assert!(jobs.remove(6));
        assert!(!jobs.remove(6));
        assert_eq!(jobs.iter().collect::<Vec<_>>(), vec![5, 7, 8]);
        assert!(jobs.remove(8));
        assert!(jobs.remove(5));
        assert!(jobs.remove(7));
        assert!(jobs.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut jobs = JobTable::with_capacity(0);
        assert_eq!(jobs.capacity(), 1);
        jobs.insert(1);
        jobs.insert(2);
        assert_eq!(jobs.capacity(), 2);
    }

    #[test]
    fn background_launch_registers_and_reports() {
        static MODE: ShellMode = ShellMode::new();
        let mut shell = test_shell(&MODE);
        let mut host = FakeHost::new();
        let mut out = Vec::new();

        launch(&mut shell, &mut host, &command("sleep 5 &"), true, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "background pid is 100\n");
        assert!(shell.jobs.contains(100));
        assert_eq!(host.spawned, vec![(vec!["sleep".to_string(), "5".to_string()], true)]);
        // バックグラウンドは last_status を変えない
        assert_eq!(shell.last_status, Termination::Exited(0));
    }

    #[test]
    fn foreground_launch_records_status() {
        static MODE: ShellMode = ShellMode::new();
        let mut shell = test_shell(&MODE);
        let mut host = FakeHost::new();
        host.fg_results.push_back(Termination::Exited(2));
        let mut out = Vec::new();

        launch(&mut shell, &mut host, &command("false"), false, &mut out).unwrap();

        assert_eq!(shell.last_status, Termination::Exited(2));
        assert!(shell.jobs.is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn foreground_signal_is_reported() {
        static MODE: ShellMode = ShellMode::new();
        let mut shell = test_shell(&MODE);
        let mut host = FakeHost::new();
        host.fg_results.push_back(Termination::Signaled(2));
        let mut out = Vec::new();

        launch(&mut shell, &mut host, &command("sleep 100"), false, &mut out).unwrap();

        assert_eq!(shell.last_status, Termination::Signaled(2));
        assert_eq!(String::from_utf8(out).unwrap(), "terminated by signal 2\n");
    }

    #[test]
    fn fork_failure_propagates() {
        static MODE: ShellMode = ShellMode::new();
        let mut shell = test_shell(&MODE);
        let mut host = FakeHost::new();
        host.fail_fork = true;
        let mut out = Vec::new();

        let err = launch(&mut shell, &mut host, &command("ls"), false, &mut out).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn reap_reports_each_job_once() {
        let mut jobs = JobTable::with_capacity(3);
        jobs.insert(100);
        jobs.insert(101);
        jobs.insert(102);
        let mut host = FakeHost::new();
        host.finished.push_back((101, Termination::Exited(0)));
        host.finished.push_back((100, Termination::Signaled(15)));
        let mut out = Vec::new();

        assert_eq!(reap_jobs(&mut jobs, &mut host, &mut out).unwrap(), 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "background pid 101 is done: exit value 0\n\
             background pid 100 is done: terminated by signal 15\n"
        );
        assert_eq!(jobs.iter().collect::<Vec<_>>(), vec![102]);

        // 2 回目の回収では何も報告しない
        let mut out = Vec::new();
        assert_eq!(reap_jobs(&mut jobs, &mut host, &mut out).unwrap(), 0);
        assert!(out.is_empty());
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn kill_all_targets_every_job() {
        let mut jobs = JobTable::with_capacity(3);
        for pid in [7, 8, 9, 10] {
            jobs.insert(pid);
        }
        let mut host = FakeHost::new();
        kill_all(&jobs, &mut host);
        assert_eq!(host.killed, vec![7, 8, 9, 10]);
    }
}
