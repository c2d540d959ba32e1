use std::fmt;
use std::str::FromStr;

use analysis_errors::AnalysisError;
use serde::{Deserialize, Serialize};

/// 执行器面向的数据存储来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    Storage,
    Mongodb,
    Hbase,
}

/// 执行器面向的计算框架
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Framework {
    Local,
    MapReduce,
    Spark,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Storage => "STORAGE",
            Source::Mongodb => "MONGODB",
            Source::Hbase => "HBASE",
        })
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Framework::Local => "LOCAL",
            Framework::MapReduce => "MAP_REDUCE",
            Framework::Spark => "SPARK",
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolType {
    Variant,
    Alignment,
    #[default]
    Other,
}

/// 部署使用的默认存储引擎
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngine {
    #[default]
    Local,
    Mongodb,
    Hadoop,
}

impl FromStr for StorageEngine {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageEngine::Local),
            "mongodb" => Ok(StorageEngine::Mongodb),
            "hadoop" => Ok(StorageEngine::Hadoop),
            _ => Err(AnalysisError::config_error(format!("未知的存储引擎: {s}"))),
        }
    }
}

/// 执行器实现的静态标签，注册时声明，只用于排序
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolExecutorDescriptor {
    pub tool_id: String,
    pub executor_id: String,
    pub source: Source,
    pub framework: Framework,
}

impl ToolExecutorDescriptor {
    pub fn new<T: Into<String>, E: Into<String>>(
        tool_id: T,
        executor_id: E,
        source: Source,
        framework: Framework,
    ) -> Self {
        Self {
            tool_id: tool_id.into(),
            executor_id: executor_id.into(),
            source,
            framework,
        }
    }
}

/// 调用方当前可用的来源与框架，按偏好排序；空列表表示不限制
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPreferences {
    pub sources: Vec<Source>,
    pub frameworks: Vec<Framework>,
}

impl ExecutionPreferences {
    pub fn new(sources: Vec<Source>, frameworks: Vec<Framework>) -> Self {
        Self {
            sources,
            frameworks,
        }
    }

    /// 由存储引擎推导可用能力
    ///
    /// mongodb 为变异类工具提供 MONGODB 来源；hadoop 提供 MAP_REDUCE 框架，
    /// 并为变异类工具提供 HBASE 来源。LOCAL 与 STORAGE 总是排在最后。
    pub fn for_engine(engine: StorageEngine, tool_type: ToolType) -> Self {
        let mut sources = Vec::new();
        let mut frameworks = Vec::new();
        match engine {
            StorageEngine::Mongodb => {
                if tool_type == ToolType::Variant {
                    sources.push(Source::Mongodb);
                }
            }
            StorageEngine::Hadoop => {
                frameworks.push(Framework::MapReduce);
                if tool_type == ToolType::Variant {
                    sources.push(Source::Hbase);
                }
            }
            StorageEngine::Local => {}
        }
        frameworks.push(Framework::Local);
        sources.push(Source::Storage);
        Self {
            sources,
            frameworks,
        }
    }

    pub fn add_source(&mut self, source: Source) -> &mut Self {
        self.sources.push(source);
        self
    }

    pub fn add_framework(&mut self, framework: Framework) -> &mut Self {
        self.frameworks.push(framework);
        self
    }

    pub fn accepts(&self, descriptor: &ToolExecutorDescriptor) -> bool {
        (self.sources.is_empty() || self.sources.contains(&descriptor.source))
            && (self.frameworks.is_empty() || self.frameworks.contains(&descriptor.framework))
    }

    /// 框架在偏好列表中的位置，不在列表中排在最后
    pub fn framework_rank(&self, framework: Framework) -> usize {
        self.frameworks
            .iter()
            .position(|f| *f == framework)
            .unwrap_or(usize::MAX)
    }

    pub fn source_rank(&self, source: Source) -> usize {
        self.sources
            .iter()
            .position(|s| *s == source)
            .unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_for_hadoop_variant_tool() {
        let prefs = ExecutionPreferences::for_engine(StorageEngine::Hadoop, ToolType::Variant);
        assert_eq!(prefs.frameworks, vec![Framework::MapReduce, Framework::Local]);
        assert_eq!(prefs.sources, vec![Source::Hbase, Source::Storage]);
    }

    #[test]
    fn test_preferences_for_mongodb_non_variant_tool() {
        let prefs = ExecutionPreferences::for_engine(StorageEngine::Mongodb, ToolType::Alignment);
        assert_eq!(prefs.frameworks, vec![Framework::Local]);
        assert_eq!(prefs.sources, vec![Source::Storage]);
    }

    #[test]
    fn test_accepts_and_rank() {
        let prefs = ExecutionPreferences::new(vec![Source::Storage], vec![Framework::Local]);
        let local = ToolExecutorDescriptor::new("t", "a", Source::Storage, Framework::Local);
        let spark = ToolExecutorDescriptor::new("t", "b", Source::Storage, Framework::Spark);

        assert!(prefs.accepts(&local));
        assert!(!prefs.accepts(&spark));
        assert!(ExecutionPreferences::default().accepts(&spark));
        assert_eq!(prefs.framework_rank(Framework::Local), 0);
        assert_eq!(prefs.framework_rank(Framework::Spark), usize::MAX);
    }

    #[test]
    fn test_storage_engine_parse() {
        assert_eq!("HADOOP".parse::<StorageEngine>().unwrap(), StorageEngine::Hadoop);
        assert!("cassandra".parse::<StorageEngine>().is_err());
        assert_eq!(Framework::MapReduce.to_string(), "MAP_REDUCE");
    }
}
