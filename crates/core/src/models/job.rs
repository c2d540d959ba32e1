use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// resource_manager_attributes 中的调度器关联名
pub const JOB_SCHEDULER_NAME: &str = "jobSchedulerName";
/// attributes 中的作业类型键
pub const JOB_TYPE: &str = "type";
/// attributes 中被索引文件的 id
pub const INDEXED_FILE_ID: &str = "indexedFile";
/// 索引类作业的类型值
pub const JOB_TYPE_INDEX: &str = "INDEX";
/// 模拟作业使用的固定负数 id
pub const SIMULATED_JOB_ID: i64 = -10;

/// 作业记录
///
/// 由作业工厂创建，由目录服务持久化；执行器更新状态与时间戳，
/// 输出登记器写入 output_file_ids 并置为 DONE。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub name: String,
    pub user_id: String,
    pub tool_id: String,
    pub executor_id: String,
    pub description: String,
    pub command_line: String,
    pub params: BTreeMap<String, String>,
    pub status: JobStatus,
    pub study_id: i64,
    pub out_dir_id: i64,
    pub tmp_out_dir_uri: Url,
    pub input_file_ids: Vec<i64>,
    pub output_file_ids: Vec<i64>,
    pub creation_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub attributes: HashMap<String, serde_json::Value>,
    pub resource_manager_attributes: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    #[serde(rename = "PREPARED")]
    Prepared,
    #[serde(rename = "QUEUED")]
    Queued,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "ABORTED")]
    Aborted,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Prepared => "PREPARED",
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Error => "ERROR",
            JobStatus::Aborted => "ABORTED",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error | JobStatus::Aborted)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Job {
    pub fn is_simulated(&self) -> bool {
        self.id < 0
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, JobStatus::Running | JobStatus::Queued)
    }

    pub fn scheduler_name(&self) -> Option<&str> {
        self.resource_manager_attributes
            .get(JOB_SCHEDULER_NAME)
            .and_then(|v| v.as_str())
    }

    /// 索引类作业关联的被索引文件
    pub fn indexed_file_id(&self) -> Option<i64> {
        let is_index = self
            .attributes
            .get(JOB_TYPE)
            .and_then(|v| v.as_str())
            .map(|t| t == JOB_TYPE_INDEX)
            .unwrap_or(false);
        if !is_index {
            return None;
        }
        self.attributes.get(INDEXED_FILE_ID).and_then(|v| v.as_i64())
    }

    pub fn update_status(&mut self, status: JobStatus) {
        self.status = status;
        match status {
            JobStatus::Running => {
                if self.start_time.is_none() {
                    self.start_time = Some(Utc::now());
                }
            }
            JobStatus::Done | JobStatus::Error | JobStatus::Aborted => {
                if self.end_time.is_none() {
                    self.end_time = Some(Utc::now());
                }
            }
            _ => {}
        }
    }

    pub fn execution_duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(started), Some(ended)) => Some((ended - started).num_milliseconds()),
            _ => None,
        }
    }
}

/// 目录服务创建作业的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub study_id: i64,
    pub name: String,
    pub tool_id: String,
    pub executor_id: String,
    pub description: String,
    pub command_line: String,
    pub params: BTreeMap<String, String>,
    pub status: JobStatus,
    pub out_dir_id: i64,
    pub tmp_out_dir_uri: Url,
    pub input_file_ids: Vec<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub attributes: HashMap<String, serde_json::Value>,
    pub resource_manager_attributes: HashMap<String, serde_json::Value>,
}

/// 作业的点更新，`None` 字段保持不变，attributes 为合并语义
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub output_file_ids: Option<Vec<i64>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub attributes: HashMap<String, serde_json::Value>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_attribute<K: Into<String>>(mut self, key: K, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn apply(&self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(ref ids) = self.output_file_ids {
            job.output_file_ids = ids.clone();
        }
        if self.start_time.is_some() {
            job.start_time = self.start_time;
        }
        if self.end_time.is_some() {
            job.end_time = self.end_time;
        }
        for (key, value) in &self.attributes {
            job.attributes.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job {
            id: 1,
            name: "stats".to_string(),
            user_id: "user".to_string(),
            tool_id: "hpg-variant".to_string(),
            executor_id: "effect".to_string(),
            description: String::new(),
            command_line: "bin/x".to_string(),
            params: BTreeMap::new(),
            status: JobStatus::Prepared,
            study_id: 2,
            out_dir_id: 3,
            tmp_out_dir_uri: Url::parse("file:///tmp/J_abc/").unwrap(),
            input_file_ids: vec![],
            output_file_ids: vec![],
            creation_time: Utc::now(),
            start_time: None,
            end_time: None,
            attributes: HashMap::new(),
            resource_manager_attributes: HashMap::new(),
        }
    }

    #[test]
    fn test_update_status_sets_timestamps() {
        let mut job = job();
        job.update_status(JobStatus::Running);
        assert!(job.start_time.is_some());
        assert!(job.end_time.is_none());

        job.update_status(JobStatus::Done);
        assert!(job.end_time.is_some());
        assert!(job.execution_duration_ms().unwrap() >= 0);
    }

    #[test]
    fn test_indexed_file_id_only_for_index_jobs() {
        let mut job = job();
        job.attributes
            .insert(INDEXED_FILE_ID.to_string(), serde_json::json!(42));
        assert_eq!(job.indexed_file_id(), None);

        job.attributes
            .insert(JOB_TYPE.to_string(), serde_json::json!(JOB_TYPE_INDEX));
        assert_eq!(job.indexed_file_id(), Some(42));
    }

    #[test]
    fn test_job_update_merges_attributes() {
        let mut job = job();
        job.attributes
            .insert("keep".to_string(), serde_json::json!(true));

        JobUpdate::status(JobStatus::Done)
            .with_attribute("exitCode", serde_json::json!(0))
            .apply(&mut job);

        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.attributes.len(), 2);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&JobStatus::Prepared).unwrap();
        assert_eq!(json, "\"PREPARED\"");
        assert_eq!(JobStatus::Aborted.to_string(), "ABORTED");
        assert!(JobStatus::Error.is_finished());
        assert!(!JobStatus::Queued.is_finished());
    }
}
