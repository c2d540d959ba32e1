//! Test data builders for jobs and tool manifests

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use analysis_core::models::{
    Author, Execution, Job, JobStatus, ToolManifest, ToolOption, JOB_SCHEDULER_NAME,
};
use chrono::Utc;
use url::Url;

/// Builder for creating test Job entities
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new() -> Self {
        Self {
            job: Job {
                id: 1,
                name: "test_job".to_string(),
                user_id: "test".to_string(),
                tool_id: "samtools".to_string(),
                executor_id: "view".to_string(),
                description: String::new(),
                command_line: "samtools view".to_string(),
                params: BTreeMap::new(),
                status: JobStatus::Prepared,
                study_id: 1,
                out_dir_id: 1,
                tmp_out_dir_uri: Url::parse("file:///tmp/J_test/").expect("static url"),
                input_file_ids: vec![],
                output_file_ids: vec![],
                creation_time: Utc::now(),
                start_time: None,
                end_time: None,
                attributes: HashMap::new(),
                resource_manager_attributes: HashMap::new(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.job.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.job.name = name.to_string();
        self
    }

    pub fn with_study(mut self, study_id: i64) -> Self {
        self.job.study_id = study_id;
        self
    }

    pub fn with_out_dir(mut self, out_dir_id: i64) -> Self {
        self.job.out_dir_id = out_dir_id;
        self
    }

    pub fn with_tmp_dir(mut self, tmp_out_dir_uri: Url) -> Self {
        self.job.tmp_out_dir_uri = tmp_out_dir_uri;
        self
    }

    pub fn with_command_line(mut self, command_line: &str) -> Self {
        self.job.command_line = command_line.to_string();
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.job.status = status;
        self
    }

    pub fn with_scheduler_name(mut self, name: &str) -> Self {
        self.job
            .resource_manager_attributes
            .insert(JOB_SCHEDULER_NAME.to_string(), serde_json::json!(name));
        self
    }

    pub fn with_attribute(mut self, key: &str, value: serde_json::Value) -> Self {
        self.job.attributes.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

impl Default for JobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for tool manifests with a single default execution
pub struct ManifestBuilder {
    manifest: ToolManifest,
}

impl ManifestBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            manifest: ToolManifest {
                id: id.to_string(),
                name: id.to_string(),
                description: format!("{id} test tool"),
                version: "1.0.0".to_string(),
                author: Author {
                    name: "Test Lab".to_string(),
                    email: "lab@example.org".to_string(),
                },
                website: String::new(),
                publication: String::new(),
                global_params: vec![],
                executions: vec![Execution {
                    id: "run".to_string(),
                    name: "run".to_string(),
                    executable: "run.sh".to_string(),
                    output_param: "outdir".to_string(),
                    valid_params: vec![],
                    test_cmd: None,
                    result: None,
                }],
            },
        }
    }

    /// Replace the default execution
    pub fn with_execution(mut self, id: &str, executable: &str, output_param: &str) -> Self {
        self.manifest.executions = vec![Execution {
            id: id.to_string(),
            name: id.to_string(),
            executable: executable.to_string(),
            output_param: output_param.to_string(),
            valid_params: vec![],
            test_cmd: None,
            result: None,
        }];
        self
    }

    /// Add an option to the first execution
    pub fn with_param(mut self, name: &str, required: bool) -> Self {
        if let Some(execution) = self.manifest.executions.first_mut() {
            execution
                .valid_params
                .push(ToolOption::new(name, format!("{name} option"), required));
        }
        self
    }

    pub fn with_global_param(mut self, name: &str) -> Self {
        self.manifest
            .global_params
            .push(ToolOption::new(name, format!("{name} option"), false));
        self
    }

    pub fn build(self) -> ToolManifest {
        self.manifest
    }

    /// Write `<root>/<id>/manifest.json` and return the tool directory
    pub fn write_to(self, root: &Path) -> PathBuf {
        let dir = root.join(&self.manifest.id);
        std::fs::create_dir_all(&dir).expect("create tool dir");
        let content = serde_json::to_string_pretty(&self.manifest).expect("serialize manifest");
        std::fs::write(dir.join("manifest.json"), content).expect("write manifest");
        dir
    }
}
