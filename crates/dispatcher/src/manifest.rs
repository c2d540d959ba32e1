use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use analysis_core::models::{Execution, ToolManifest, ToolOption, ToolReference};
use analysis_errors::{AnalysisError, AnalysisResult};
use tracing::debug;

pub const MANIFEST_FILE: &str = "manifest.json";

/// 已解析的工具：清单 + 选中的执行方式 + 工具目录
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub manifest: ToolManifest,
    pub execution: Execution,
    pub tool_dir: PathBuf,
}

impl ToolDescriptor {
    pub fn new(manifest: ToolManifest, execution: Execution, tool_dir: PathBuf) -> Self {
        Self {
            manifest,
            execution,
            tool_dir,
        }
    }

    /// 可执行文件路径，相对于工具目录
    pub fn executable_path(&self) -> PathBuf {
        self.tool_dir.join(&self.execution.executable)
    }

    pub fn output_param(&self) -> &str {
        &self.execution.output_param
    }

    pub fn valid_options(&self) -> Vec<ToolOption> {
        self.manifest.valid_options(&self.execution)
    }

    pub fn example_path(&self, file_name: &str) -> PathBuf {
        self.tool_dir.join("examples").join(file_name)
    }

    /// 参数说明，必填参数以 `*` 标记
    pub fn params(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "Valid params for {}:\n\n", self.manifest.name);
        for param in &self.execution.valid_params {
            let required = if param.required { "*" } else { "" };
            let _ = writeln!(out, "\t{}: {} {}", param.name, param.description, required);
        }
        out.push_str("\n\t*: required parameters.\n");
        out
    }

    /// 工具帮助信息
    pub fn help(&self, base_url: &str) -> String {
        let manifest = &self.manifest;
        let endpoint = format!("{}analysis/{}.{}", base_url, manifest.id, self.execution.id);

        let mut out = String::new();
        let _ = writeln!(out, "Analysis: {}", manifest.name);
        let _ = writeln!(out, "Description: {}", manifest.description);
        let _ = write!(out, "Version: {}\n\n", manifest.version);
        let _ = writeln!(out, "Author: {}", manifest.author.name);
        let _ = writeln!(out, "Email: {}", manifest.author.email);
        if !manifest.website.is_empty() {
            let _ = writeln!(out, "Website: {}", manifest.website);
        }
        if !manifest.publication.is_empty() {
            let _ = writeln!(out, "Publication: {}", manifest.publication);
        }
        out.push_str("\nUsage: \n");
        let _ = write!(out, "{endpoint}/{{action}}?{{params}}\n\n");
        out.push_str("\twhere: \n");
        out.push_str("\t\t{action} = [run, help, params, test, status]\n");
        let _ = writeln!(out, "\t\t{{params}} = {endpoint}/params");
        out
    }
}

/// 工具清单仓库，布局为 `<binaries_path>/<tool>/manifest.json`
#[derive(Debug, Clone)]
pub struct ToolManifestStore {
    binaries_path: PathBuf,
}

impl ToolManifestStore {
    pub fn new<P: Into<PathBuf>>(binaries_path: P) -> Self {
        Self {
            binaries_path: binaries_path.into(),
        }
    }

    pub fn binaries_path(&self) -> &Path {
        &self.binaries_path
    }

    pub fn tool_dir(&self, tool: &str) -> PathBuf {
        self.binaries_path.join(tool)
    }

    pub fn load_manifest(&self, tool: &str) -> AnalysisResult<ToolManifest> {
        let path = self.tool_dir(tool).join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(AnalysisError::tool_not_found(format!(
                "{tool} ({} 不存在)",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(&path)?;
        let manifest: ToolManifest = serde_json::from_str(&content)?;
        debug!("加载工具清单: {}", path.display());
        Ok(manifest)
    }

    /// 解析 `tool` 或 `tool.execution` 引用
    pub fn resolve(&self, reference: &str) -> AnalysisResult<ToolDescriptor> {
        let reference = ToolReference::parse(reference);
        let manifest = self.load_manifest(&reference.tool)?;
        let execution = manifest
            .execution(reference.execution.as_deref())
            .cloned()
            .ok_or_else(|| {
                AnalysisError::tool_not_found(format!(
                    "{}.{}",
                    reference.tool,
                    reference.execution.as_deref().unwrap_or_default()
                ))
            })?;
        Ok(ToolDescriptor::new(
            manifest,
            execution,
            self.tool_dir(&reference.tool),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(root: &Path) {
        let dir = root.join("hpg-variant");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::json!({
                "id": "hpg-variant",
                "name": "HPG Variant",
                "description": "Variant analysis suite",
                "version": "1.0",
                "author": {"name": "Lab", "email": "lab@example.org"},
                "website": "",
                "publication": "Bioinformatics 2013",
                "globalParams": [],
                "executions": [
                    {
                        "id": "effect",
                        "executable": "bin/hpg-var-effect",
                        "outputParam": "outdir",
                        "validParams": [
                            {"name": "vcf-file", "description": "Input VCF", "required": true},
                            {"name": "species", "description": "Species name"}
                        ]
                    },
                    {"id": "gwas", "executable": "bin/hpg-var-gwas", "outputParam": "outdir"}
                ]
            })
            .to_string(),
        )
        .unwrap();
    }

    #[test]
    fn test_resolve_reference() {
        let temp = tempfile::tempdir().unwrap();
        write_manifest(temp.path());
        let store = ToolManifestStore::new(temp.path());

        let default = store.resolve("hpg-variant").unwrap();
        assert_eq!(default.execution.id, "effect");
        assert_eq!(
            default.executable_path(),
            temp.path().join("hpg-variant/bin/hpg-var-effect")
        );

        let gwas = store.resolve("hpg-variant.GWAS").unwrap();
        assert_eq!(gwas.execution.id, "gwas");

        assert!(matches!(
            store.resolve("hpg-variant.missing").unwrap_err(),
            AnalysisError::ToolNotFound(_)
        ));
        assert!(matches!(
            store.resolve("nope").unwrap_err(),
            AnalysisError::ToolNotFound(_)
        ));
    }

    #[test]
    fn test_params_text() {
        let temp = tempfile::tempdir().unwrap();
        write_manifest(temp.path());
        let tool = ToolManifestStore::new(temp.path()).resolve("hpg-variant").unwrap();

        assert_eq!(
            tool.params(),
            "Valid params for HPG Variant:\n\n\tvcf-file: Input VCF *\n\tspecies: Species name \n\n\t*: required parameters.\n"
        );
    }

    #[test]
    fn test_help_text() {
        let temp = tempfile::tempdir().unwrap();
        write_manifest(temp.path());
        let tool = ToolManifestStore::new(temp.path()).resolve("hpg-variant").unwrap();
        let help = tool.help("http://localhost:8080/");

        assert!(help.starts_with("Analysis: HPG Variant\nDescription: Variant analysis suite\nVersion: 1.0\n\n"));
        assert!(!help.contains("Website:"));
        assert!(help.contains("Publication: Bioinformatics 2013\n"));
        assert!(help.contains("http://localhost:8080/analysis/hpg-variant.effect/{action}?{params}\n"));
        assert!(tool
            .example_path("input.vcf")
            .ends_with("hpg-variant/examples/input.vcf"));
    }
}
