//! smallsh — 小さな対話シェル
//!
//! REPL ループ: プロンプト表示 → 1 行読み取り（`$$` 展開）→ パース → 実行 → バックグラウンド回収 → ループ
//!
//! 各モジュールの役割は `lib.rs` を参照。

use std::io::{self, Write};
use std::process;

use smallsh::config::Config;
use smallsh::error::ShellError;
use smallsh::executor;
use smallsh::job;
use smallsh::reader::LineReader;
use smallsh::shell::Shell;
use smallsh::signals;
use smallsh::spawn::UnixHost;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // シェル本体: SIGTSTP でモード切り替え、SIGINT は捕捉して無視。
    // 子プロセスは spawn 側でシグナル設定をやり直す。
    if let Err(e) = signals::install() {
        eprintln!("smallsh: sigaction: {}", e);
        process::exit(1);
    }

    let mut shell = Shell::new(Config::default());
    let mut host = UnixHost;

    if let Err(e) = run(&mut shell, &mut host) {
        eprintln!("smallsh: {}", e);
        process::exit(1);
    }
}

/// REPL ループ本体。`exit` または EOF で `Ok(())` を返す。致命的エラーは `Err`。
fn run(shell: &mut Shell, host: &mut UnixHost) -> Result<(), ShellError> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader =
        LineReader::new(stdin.lock(), shell.pid.to_string()).max_line_len(shell.config.max_line_len);

    while !shell.should_exit {
        let result = match reader.read_line(&shell.config.prompt, &mut stdout.lock()) {
            Ok(Some(line)) => executor::execute_line(shell, host, &line, &mut stdout.lock()),
            Ok(None) => {
                // EOF (Ctrl+D): `exit` と同じ後始末をして終了
                log::debug!("end of input");
                executor::execute_line(shell, host, "exit", &mut stdout.lock())?;
                break;
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {}
            Err(e) if !e.is_fatal() => eprintln!("smallsh: {}", e),
            Err(e) => return Err(e),
        }

        // バックグラウンドジョブを回収し、完了通知を出力
        job::reap_jobs(&mut shell.jobs, host, &mut stdout.lock())?;
    }

    stdout.lock().flush()?;
    Ok(())
}
