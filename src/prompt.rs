use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::EtuError;

/// 対話的な入力を受け付けるためのtrait。
///
/// 実装は1行の読み込みと1行の表示だけを持ち、選択や確認はその組み合わせで行う。
pub trait Prompter {
    /// `prompt`を表示して1行読み込む。前後の空白は取り除く。
    fn read_line(&mut self, prompt: &str) -> Result<String>;

    /// 1行表示する。
    fn say(&mut self, line: &str) -> Result<()>;

    /// 選択肢から1つ選ばせ、そのインデックスを返す。
    fn select(&mut self, message: &str, options: &[String]) -> Result<usize> {
        if options.is_empty() {
            bail!("Nothing to choose from");
        }

        self.say(&format!("? {}", message))?;
        for (i, option) in options.iter().enumerate() {
            self.say(&format!("  {}) {}", i + 1, option))?;
        }
        loop {
            let answer = self.read_line(&format!("? [1-{}] ", options.len()))?;
            // 番号でも選択肢の文字列でも選べる
            let index = answer
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=options.len()).contains(n))
                .map(|n| n - 1)
                .or_else(|| options.iter().position(|option| *option == answer));
            match index {
                Some(index) => return Ok(index),
                None => self.notify(&format!("'{}' is not one of the options.", answer))?,
            }
        }
    }

    /// 1行の入力を受け付ける。
    fn input(&mut self, message: &str) -> Result<String> {
        self.read_line(&format!("? {} ", message))
    }

    /// yes/noで確認する。
    fn confirm(&mut self, message: &str) -> Result<bool> {
        loop {
            let answer = self.read_line(&format!("? {} (y/N) ", message))?;
            match answer.to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "" | "n" | "no" => return Ok(false),
                _ => self.notify("Please answer y or n.")?,
            }
        }
    }

    /// 入力エラーなどをユーザーに伝える。
    fn notify(&mut self, message: &str) -> Result<()> {
        self.say(&format!("  {}", message))
    }
}

/// 端末の行編集を使うプロンプト。
pub struct LinePrompter {
    editor: DefaultEditor,
}

impl LinePrompter {
    /// 新しい`LinePrompter`を返す。
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().context("Failed to initialize line editor")?;
        Ok(Self { editor })
    }
}

impl Prompter for LinePrompter {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(line.trim().to_string()),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                bail!("Input closed before an answer was given")
            }
            Err(error) => Err(error).context("Failed to read input"),
        }
    }

    fn say(&mut self, line: &str) -> Result<()> {
        writeln!(io::stdout(), "{}", line).context("Failed to write message")
    }
}

/// 0以上の数値として解釈する。
pub fn parse_number(input: &str) -> Result<f64, EtuError> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .ok_or_else(|| EtuError::InvalidNumericInput(input.trim().to_string()))
}

/// 数値を入力させる。解釈できない入力は理由を伝えて再入力させる。
pub fn ask_number<P: Prompter + ?Sized>(prompter: &mut P, message: &str) -> Result<f64> {
    loop {
        let answer = prompter.input(message)?;
        match parse_number(&answer) {
            Ok(number) => return Ok(number),
            Err(error) => prompter.notify(&error.to_string())?,
        }
    }
}
