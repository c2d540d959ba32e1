use serde::{Deserialize, Serialize};

/// 工具选项描述
///
/// 仅用于参数校验与过滤，不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOption {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl ToolOption {
    pub fn new<N: Into<String>, D: Into<String>>(name: N, description: D, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// 工具的一种执行方式（manifest 中的 executions 条目）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub executable: String,
    /// 输出目录参数名，作业创建时注入临时输出目录
    pub output_param: String,
    #[serde(default)]
    pub valid_params: Vec<ToolOption>,
    #[serde(default)]
    pub test_cmd: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

/// 工具清单，对应 `<binaries>/<tool>/manifest.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolManifest {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub publication: String,
    #[serde(default)]
    pub global_params: Vec<ToolOption>,
    pub executions: Vec<Execution>,
}

impl ToolManifest {
    /// 按 id 查找执行方式（忽略大小写），未指定时取第一个
    pub fn execution(&self, execution_id: Option<&str>) -> Option<&Execution> {
        match execution_id {
            None | Some("") => self.executions.first(),
            Some(id) => self
                .executions
                .iter()
                .find(|e| e.id.eq_ignore_ascii_case(id)),
        }
    }

    /// 合成命令行时的合法选项：执行方式参数 + 全局参数 + 输出目录参数
    pub fn valid_options(&self, execution: &Execution) -> Vec<ToolOption> {
        let mut options = execution.valid_params.clone();
        options.extend(self.global_params.iter().cloned());
        options.push(ToolOption::new(execution.output_param.clone(), "Outdir", false));
        options
    }
}

/// `tool` 或 `tool.execution` 形式的工具引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReference {
    pub tool: String,
    pub execution: Option<String>,
}

impl ToolReference {
    pub fn parse(reference: &str) -> Self {
        match reference.split_once('.') {
            Some((tool, execution)) => Self {
                tool: tool.to_string(),
                execution: Some(execution.to_string()),
            },
            None => Self {
                tool: reference.to_string(),
                execution: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> ToolManifest {
        serde_json::from_value(serde_json::json!({
            "id": "hpg-variant",
            "name": "HPG Variant",
            "globalParams": [{"name": "log-level", "description": "Verbosity"}],
            "executions": [
                {
                    "id": "effect",
                    "executable": "bin/hpg-var-effect",
                    "outputParam": "outdir",
                    "validParams": [{"name": "vcf-file", "description": "Input VCF", "required": true}]
                },
                {
                    "id": "gwas",
                    "executable": "bin/hpg-var-gwas",
                    "outputParam": "o"
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_execution_lookup() {
        let manifest = manifest();
        assert_eq!(manifest.execution(None).unwrap().id, "effect");
        assert_eq!(manifest.execution(Some("GWAS")).unwrap().id, "gwas");
        assert!(manifest.execution(Some("missing")).is_none());
    }

    #[test]
    fn test_valid_options_include_global_and_output() {
        let manifest = manifest();
        let execution = manifest.execution(Some("effect")).unwrap();
        let names: Vec<_> = manifest
            .valid_options(execution)
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names, vec!["vcf-file", "log-level", "outdir"]);
    }

    #[test]
    fn test_tool_reference_parse() {
        assert_eq!(
            ToolReference::parse("hpg-variant.effect"),
            ToolReference {
                tool: "hpg-variant".to_string(),
                execution: Some("effect".to_string()),
            }
        );
        assert_eq!(ToolReference::parse("samtools").execution, None);
    }
}
