//! トークナイザ + リダイレクト抽出: 展開済みの 1 行から [`Command`] を構築する。
//!
//! ## 対応構文
//!
//! - 空白（スペースのみ）区切りの引数。タブ・クォート・エスケープは扱わない
//! - 末尾の `&` — バックグラウンド要求（フォアグラウンド専用モードでは無視される）
//! - `< file` / `> file` — 標準入力/標準出力のリダイレクト。順序・位置は任意
//! - `#` で始まる行はコメント、空行と合わせて何もしない
//!
//! パイプ・サブシェル・glob・変数展開（`$$` 以外）は対象外。

use std::path::PathBuf;

use crate::config::Config;
use crate::error::ParseError;

// ── AST ─────────────────────────────────────────────────────────────

/// 単一コマンド。プログラム名と引数、リダイレクト指定、バックグラウンド要求を持つ。
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// `args[0]` がプログラム名。常に 1 要素以上。
    pub args: Vec<String>,
    pub redirect: Redirection,
    /// 末尾に `&` があった場合に `true`。実際に従うかはシェルのモード次第。
    pub background: bool,
}

impl Command {
    /// プログラム名。
    pub fn name(&self) -> &str {
        &self.args[0]
    }
}

/// リダイレクト指定。いずれも演算子を含まない通常のファイルパス。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Redirection {
    /// `<` — 標準入力にするファイル。
    pub input: Option<PathBuf>,
    /// `>` — 標準出力にするファイル（上書き・作成）。
    pub output: Option<PathBuf>,
}

// ── Parse ───────────────────────────────────────────────────────────

/// 1 行をパースする。
///
/// 戻り値:
/// - `Ok(Some(cmd))` — 実行すべきコマンド
/// - `Ok(None)` — 空行またはコメント行
/// - `Err(e)` — 拒否すべき入力。シェルは診断を出して次の行へ進む
pub fn parse(line: &str, config: &Config) -> Result<Option<Command>, ParseError> {
    let mut tokens = tokenize(line, config.max_args)?;

    // コメント・空行
    match tokens.first() {
        None => return Ok(None),
        Some(first) if first.starts_with('#') => return Ok(None),
        Some(_) => {}
    }

    let background = take_background_marker(&mut tokens);
    // `&` だけの行は空行と同じ扱い
    if tokens.is_empty() {
        return Ok(None);
    }
    let redirect = extract_redirects(&mut tokens)?;

    if tokens.is_empty() {
        return Err(ParseError::MissingCommand);
    }

    Ok(Some(Command {
        args: tokens,
        redirect,
        background,
    }))
}

/// スペースの連続で分割する。トークン数が `max_args` を超えたら拒否する。
pub fn tokenize(line: &str, max_args: usize) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    for word in line.split(' ').filter(|w| !w.is_empty()) {
        if tokens.len() == max_args {
            return Err(ParseError::TooManyArguments { max: max_args });
        }
        tokens.push(word.to_string());
    }
    Ok(tokens)
}

/// 最後のトークンがちょうど `&` なら取り除いて `true` を返す。
fn take_background_marker(tokens: &mut Vec<String>) -> bool {
    if tokens.last().map(String::as_str) == Some("&") {
        tokens.pop();
        true
    } else {
        false
    }
}

/// `<` / `>` とその直後のファイル名をトークン列から取り除き、[`Redirection`] に記録する。
///
/// 取り除いた後は同じ位置から走査を続けるので、複数のリダイレクトをすべて拾える。
/// 同じ向きが複数回指定された場合は最後の指定が有効。
pub fn extract_redirects(tokens: &mut Vec<String>) -> Result<Redirection, ParseError> {
    let mut redirect = Redirection::default();
    let mut i = 0;
    while i < tokens.len() {
        let op = match tokens[i].as_str() {
            "<" => '<',
            ">" => '>',
            _ => {
                i += 1;
                continue;
            }
        };

        match tokens.get(i + 1) {
            Some(t) if is_operator(t) => return Err(ParseError::InvalidRedirectTarget(t.clone())),
            Some(_) => {}
            None => return Err(ParseError::MissingRedirectTarget(op)),
        }
        let target = tokens.remove(i + 1);
        tokens.remove(i);

        let path = Some(PathBuf::from(target));
        if op == '<' {
            redirect.input = path;
        } else {
            redirect.output = path;
        }
    }
    Ok(redirect)
}

fn is_operator(token: &str) -> bool {
    matches!(token, "<" | ">" | "&")
}
