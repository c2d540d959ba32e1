use std::collections::{BTreeMap, HashSet};

use analysis_errors::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};

use super::tool::ToolOption;

/// 单个参数的有序取值列表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamValues(Vec<String>);

impl ParamValues {
    pub fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    pub fn single<S: Into<String>>(value: S) -> Self {
        Self(vec![value.into()])
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 以逗号连接取值，并去掉每个取值内部的空白字符
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(|v| v.chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// 持久化到作业记录时使用的扁平形式
    pub fn joined(&self) -> String {
        self.0.join(",")
    }
}

impl From<Vec<String>> for ParamValues {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl From<&str> for ParamValues {
    fn from(value: &str) -> Self {
        Self::single(value)
    }
}

/// 参数名到取值列表的映射
///
/// 采用 `BTreeMap` 保证渲染顺序稳定。调用方可以传入超集，
/// 合成命令行时未知参数会被静默剔除。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, ParamValues>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<ParamValues>>(&mut self, key: K, values: V) {
        self.0.insert(key.into(), values.into());
    }

    pub fn with<K: Into<String>, V: Into<ParamValues>>(mut self, key: K, values: V) -> Self {
        self.insert(key, values);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValues> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValues> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValues)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 仅保留合法选项中声明过的参数，返回被剔除的参数名
    pub fn retain_known(&mut self, valid_options: &[ToolOption]) -> Vec<String> {
        let known: HashSet<&str> = valid_options.iter().map(|o| o.name.as_str()).collect();
        let removed: Vec<String> = self
            .0
            .keys()
            .filter(|k| !known.contains(k.as_str()))
            .cloned()
            .collect();
        for key in &removed {
            self.0.remove(key);
        }
        removed
    }

    /// 扁平化为 `key -> "v1,v2"`，作为作业记录的 params 字段
    pub fn to_plain(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.joined()))
            .collect()
    }

    /// 解析命令行形式的 `key=v1,v2` 赋值
    pub fn parse_assignment(&mut self, assignment: &str) -> AnalysisResult<()> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            AnalysisError::validation_error(format!("参数格式应为 key=value: {assignment}"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(AnalysisError::validation_error(format!(
                "参数名不能为空: {assignment}"
            )));
        }
        let values = if value.is_empty() {
            Vec::new()
        } else {
            value.split(',').map(|v| v.to_string()).collect()
        };
        self.insert(key, values);
        Ok(())
    }
}

impl FromIterator<(String, ParamValues)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (String, ParamValues)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
