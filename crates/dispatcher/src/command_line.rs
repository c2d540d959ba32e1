//! 命令行合成
//!
//! 输出形式：
//!
//! ```text
//! <executable> [--tool <id>] (-<k> <v> | --<key> <v>)*
//! ```
//!
//! 不做任何 shell 转义，取值中的 shell 元字符原样保留。

use std::collections::BTreeMap;

use analysis_core::models::{ParameterSet, ToolOption};
use analysis_core::utils::split_args;
use analysis_errors::{AnalysisError, AnalysisResult};
use tracing::debug;

/// 总是排在最前面渲染的参数
pub const TOOL_PARAM: &str = "tool";

/// 返回缺失的必填参数名
pub fn missing_required(params: &ParameterSet, valid_options: &[ToolOption]) -> Vec<String> {
    valid_options
        .iter()
        .filter(|o| o.required && !params.contains_key(&o.name))
        .map(|o| o.name.clone())
        .collect()
}

/// 校验必填参数
pub fn check_required(params: &ParameterSet, valid_options: &[ToolOption]) -> AnalysisResult<()> {
    let missing = missing_required(params, valid_options);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AnalysisError::validation_error(format!(
            "缺少必填参数: {}",
            missing.join(", ")
        )))
    }
}

/// 由可执行文件路径和参数合成命令行
///
/// 缺少必填参数时返回 `Validation` 错误；未在 `valid_options` 中声明的参数被剔除。
pub fn synthesize(
    executable: &str,
    params: &ParameterSet,
    valid_options: &[ToolOption],
) -> AnalysisResult<String> {
    check_required(params, valid_options)?;

    let mut params = params.clone();
    let removed = params.retain_known(valid_options);
    if !removed.is_empty() {
        debug!("剔除未知参数: {:?}", removed);
    }

    let mut command_line = String::from(executable);
    if let Some(tool) = params.remove(TOOL_PARAM) {
        if let Some(value) = tool.first() {
            command_line.push_str(" --");
            command_line.push_str(TOOL_PARAM);
            command_line.push(' ');
            command_line.push_str(value);
        }
    }

    for (key, values) in params.iter() {
        if key.chars().count() == 1 {
            command_line.push_str(" -");
        } else {
            command_line.push_str(" --");
        }
        command_line.push_str(key);
        if !values.is_empty() {
            command_line.push(' ');
            command_line.push_str(&values.render());
        }
    }

    debug!("合成命令行: {}", command_line);
    Ok(command_line)
}

/// 从已合成的命令行恢复扁平参数
///
/// 以 `-`/`--` 开头的记号为参数名，紧随其后的非参数记号为取值；
/// 取值缺失时记为空串。不跟在参数名之后的记号（如可执行文件）被忽略。
pub fn parse_command_line(command_line: &str) -> AnalysisResult<BTreeMap<String, String>> {
    let tokens = split_args(command_line)?;
    let mut params = BTreeMap::new();
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        if !is_flag(token) {
            continue;
        }
        let key = token
            .strip_prefix("--")
            .or_else(|| token.strip_prefix('-'))
            .unwrap_or(token)
            .to_string();
        let value = match iter.peek() {
            Some(next) if !is_flag(next) => {
                let value = next.to_string();
                iter.next();
                value
            }
            _ => String::new(),
        };
        params.insert(key, value);
    }
    Ok(params)
}

fn is_flag(token: &str) -> bool {
    token.starts_with('-') && token.len() > 1
}
