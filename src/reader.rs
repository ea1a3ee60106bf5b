//! 行リーダー: プロンプト表示、1 行読み取り、`$$` 展開。
//!
//! シグナル（SIGTSTP）で `read` が `EINTR` を返した場合は、読みかけの内容を捨てて
//! プロンプトを出し直す。エラーとして呼び出し側に伝播させない。
//!
//! 行長の上限は入力されたままの行（`$$` 展開前）に対して判定する。

use std::borrow::Cow;
use std::io::{self, BufRead, Write};

use crate::config::{Config, PID_MARKER};
use crate::error::{ParseError, ShellError};

/// `$$` をシェルの PID 文字列に置換する。
///
/// 左から重ならない出現をすべて置換する（`$$$$` → PID 2 個、`$$$` → PID + `$`）。
/// マーカーがなければゼロコピーの `Cow::Borrowed` を返す。
/// 置換後の長さを先に計算し、必要な容量だけを 1 回で確保する。
pub fn expand_pid<'a>(line: &'a str, pid: &str) -> Cow<'a, str> {
    let count = line.matches(PID_MARKER).count();
    if count == 0 {
        return Cow::Borrowed(line);
    }

    let len = line.len() - count * PID_MARKER.len() + count * pid.len();
    let mut result = String::with_capacity(len);
    let mut rest = line;
    while let Some(pos) = rest.find(PID_MARKER) {
        result.push_str(&rest[..pos]);
        result.push_str(pid);
        rest = &rest[pos + PID_MARKER.len()..];
    }
    result.push_str(rest);
    Cow::Owned(result)
}

/// 入力ストリームから 1 行ずつコマンド行を読み取るリーダー。
pub struct LineReader<R> {
    inner: R,
    pid: String,
    max_line_len: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    /// `pid` は `$$` の置換に使う 10 進文字列。
    pub fn new(inner: R, pid: impl Into<String>) -> Self {
        Self {
            inner,
            pid: pid.into(),
            max_line_len: Config::default().max_line_len,
            buf: Vec::new(),
        }
    }

    /// 行長の上限（文字数）を設定する。
    pub fn max_line_len(mut self, max: usize) -> Self {
        self.max_line_len = max;
        self
    }

    /// プロンプトを表示して 1 行読み取り、`$$` を展開して返す。
    ///
    /// - 割り込み（`EINTR`）→ 読みかけを破棄してプロンプトを再表示
    /// - EOF → `Ok(None)`
    /// - 上限を超える行 → 行全体を読み捨てて `Err(ShellError::Parse(LineTooLong))`
    ///
    /// 戻り値の行末の `\n` は除去済み。
    pub fn read_line(
        &mut self,
        prompt: &str,
        out: &mut dyn Write,
    ) -> Result<Option<String>, ShellError> {
        loop {
            out.write_all(prompt.as_bytes())?;
            out.flush()?;

            match self.read_raw_line() {
                Ok(Some(line)) => {
                    if line.chars().count() > self.max_line_len {
                        return Err(ParseError::LineTooLong {
                            max: self.max_line_len,
                        }
                        .into());
                    }
                    return Ok(Some(expand_pid(&line, &self.pid).into_owned()));
                }
                Ok(None) => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    log::debug!("read interrupted, prompting again");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// 改行まで（または EOF まで）読み取る。行末の `\n` は含まない。
    ///
    /// `read_until` は `EINTR` を内部で再試行してしまうため、`fill_buf` を直接回す。
    fn read_raw_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        loop {
            let available = match self.inner.fill_buf() {
                Ok(b) => b,
                Err(e) => {
                    self.buf.clear();
                    return Err(e);
                }
            };

            if available.is_empty() {
                // EOF: 改行なしの最終行があればそれを返す
                if self.buf.is_empty() {
                    return Ok(None);
                }
                break;
            }

            match available.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    self.buf.extend_from_slice(&available[..i]);
                    self.inner.consume(i + 1);
                    break;
                }
                None => {
                    let n = available.len();
                    self.buf.extend_from_slice(available);
                    self.inner.consume(n);
                }
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}
