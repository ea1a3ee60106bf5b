//! smallsh ライブラリ — テスト・ベンチマーク用にモジュールを公開する。
//!
//! バイナリ本体は `main.rs` の REPL ループ。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`config`] | 定数設定（プロンプト、行長・引数数の上限、ジョブテーブル初期容量） |
//! | [`error`] | エラー型（構文エラー、起動失敗、最上位エラー） |
//! | [`reader`] | 行リーダー（プロンプト表示、`EINTR` 再試行、`$$` → PID 展開） |
//! | [`parser`] | トークナイザ + リダイレクト抽出（`<`, `>`, 末尾 `&`、コメント行） |
//! | [`executor`] | コマンド振り分け（ビルトイン or 外部コマンド、フォアグラウンド専用モード判定） |
//! | [`builtins`] | ビルトイン（`cd`, `status`, `exit`） |
//! | [`job`] | ジョブ制御（ジョブテーブル、フォアグラウンド待機、バックグラウンド回収） |
//! | [`shell`] | シェルの状態（終了ステータス、ジョブテーブル、起動ディレクトリ、モード） |
//! | [`signals`] | シグナル仲介（SIGTSTP でフォアグラウンド専用モード切り替え、SIGINT 無視） |
//! | [`spawn`] | `fork` + `execvp` ラッパー（シグナル設定、リダイレクト、`waitpid`） |

pub mod builtins;
pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod parser;
pub mod reader;
pub mod shell;
pub mod signals;
pub mod spawn;
