use rand::{distr::Alphanumeric, Rng};

use crate::AnalysisResult;
use analysis_errors::AnalysisError;

/// 作业名前缀
pub const JOB_NAME_PREFIX: &str = "J_";
const JOB_NAME_RANDOM_LEN: usize = 10;

/// 生成指定长度的随机字母数字串
pub fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// 随机作业名 `J_` + 10 位字母数字，同时用作调度器作业名
pub fn random_job_name() -> String {
    format!("{JOB_NAME_PREFIX}{}", random_alphanumeric(JOB_NAME_RANDOM_LEN))
}

/// 按空白切分命令行，支持单双引号与反斜杠转义
pub fn split_args(command_line: &str) -> AnalysisResult<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = command_line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => current.push('\\'),
            },
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_token = true;
            }
            (None, '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(AnalysisError::validation_error(format!(
            "命令行中存在未闭合的引号 {q}: {command_line}"
        )));
    }
    if in_token {
        args.push(current);
    }
    Ok(args)
}
