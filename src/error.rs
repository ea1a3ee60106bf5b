//! エラー型。
//!
//! - [`ParseError`] — 入力行の拒否。診断を出して次のプロンプトへ戻る。
//! - [`SpawnError`] — 親プロセス側で検出される起動失敗。`fork` 失敗は致命的。
//! - [`ShellError`] — メインループが受け取る最上位エラー。
//!
//! 子プロセス側の失敗（リダイレクト先が開けない、exec 失敗）はエラー型にならず、
//! 子の終了ステータスとして観測される。

use std::io;

/// 入力行の構文エラー。
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// リダイレクト演算子の後にファイル名がない。引数は演算子文字。
    #[error("syntax error: missing file name after `{0}`")]
    MissingRedirectTarget(char),
    /// リダイレクト先が演算子そのもの（`> <` や `< &` など）。
    #[error("syntax error: invalid redirection target `{0}`")]
    InvalidRedirectTarget(String),
    /// リダイレクトを取り除いた結果、コマンド名が残らない。
    #[error("syntax error: missing command")]
    MissingCommand,
    /// 引数が上限を超えた。
    #[error("too many arguments (max {max})")]
    TooManyArguments { max: usize },
    /// 行が上限文字数を超えた。
    #[error("line too long (max {max} characters)")]
    LineTooLong { max: usize },
}

/// 親プロセス側で検出される起動失敗。
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// `fork` が失敗した（プロセス数上限など）。回復手段はない。
    #[error("fork: {0}")]
    Fork(#[source] io::Error),
    /// 引数に NUL バイトが含まれ、C 文字列に変換できない。
    #[error("{0}: argument contains a NUL byte")]
    InvalidArgument(String),
}

/// メインループが扱う最上位エラー。
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ShellError {
    /// シェル自体を終了すべきエラーかどうか。
    ///
    /// 構文エラーと不正な引数はそのコマンドだけが失敗する。
    /// `fork` 失敗と端末への入出力エラーは致命的。
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Parse(_) => false,
            Self::Spawn(SpawnError::InvalidArgument(_)) => false,
            Self::Spawn(SpawnError::Fork(_)) => true,
            Self::Io(_) => true,
        }
    }
}
