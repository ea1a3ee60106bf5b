//! シェルの定数設定。
//!
//! 設定ファイルやコマンドライン引数は持たない。[`Config::default`] が本番値で、
//! テストは上限値を縮めた [`Config`] を [`Shell::new`](crate::shell::Shell::new) に渡す。

/// `$$` — シェル自身の PID に展開されるマーカー。
pub const PID_MARKER: &str = "$$";

/// バックグラウンドジョブで未指定のリダイレクト先に使うヌルデバイス。
pub const NULL_DEVICE: &str = "/dev/null";

/// シェル全体の設定値。
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// プロンプト文字列。
    pub prompt: String,
    /// 1 行の最大文字数。超過した行は拒否される。
    pub max_line_len: usize,
    /// 1 コマンドの最大引数数（`&` とリダイレクトを含むトークン数）。
    pub max_args: usize,
    /// ジョブテーブルの初期容量。満杯時は倍に拡張される。
    pub job_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: ": ".to_string(),
            max_line_len: 2048,
            max_args: 512,
            job_capacity: 3,
        }
    }
}
