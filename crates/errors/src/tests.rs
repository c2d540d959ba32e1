#[cfg(test)]
mod error_tests {
    use crate::*;
    use std::error::Error;

    #[test]
    fn test_analysis_error_display() {
        let validation = AnalysisError::validation_error("缺少必填参数: input");
        assert_eq!(validation.to_string(), "参数校验失败: 缺少必填参数: input");

        let catalog = AnalysisError::catalog_error("job 7 not found");
        assert_eq!(catalog.to_string(), "目录服务错误: job 7 not found");

        let mismatch = AnalysisError::ChecksumMismatch {
            origin: "abc".to_string(),
            destination: "def".to_string(),
        };
        assert_eq!(mismatch.to_string(), "校验和不一致: abc != def");

        let not_found = AnalysisError::ExecutorNotFound {
            tool_id: "variant-stats".to_string(),
            executor_id: None,
            sources: vec!["STORAGE".to_string()],
            frameworks: vec!["LOCAL".to_string()],
        };
        assert!(not_found.to_string().contains("variant-stats"));
    }

    #[test]
    fn test_execution_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "qsub: command not found");
        let err = AnalysisError::execution_failed("sge execution failed", io);

        assert_eq!(err.to_string(), "分析执行失败: sge execution failed");
        let source = err.source().expect("cause should be preserved");
        assert!(source.to_string().contains("qsub"));

        let plain = AnalysisError::execution_error("no cause");
        assert!(plain.source().is_none());
    }

    #[test]
    fn test_error_classification() {
        assert!(AnalysisError::Internal("x".to_string()).is_fatal());
        assert!(AnalysisError::config_error("x").is_fatal());
        assert!(!AnalysisError::catalog_error("x").is_fatal());

        assert!(AnalysisError::catalog_error("x").is_retryable());
        assert!(AnalysisError::Timeout("x".to_string()).is_retryable());
        assert!(!AnalysisError::validation_error("x").is_retryable());

        assert!(AnalysisError::validation_error("x").is_fail_fast());
        assert!(AnalysisError::tool_not_found("x").is_fail_fast());
        assert!(!AnalysisError::execution_error("x").is_fail_fast());
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AnalysisError = io_error.into();
        assert!(matches!(err, AnalysisError::Io(_)));

        let json_error = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err: AnalysisError = json_error.into();
        assert!(matches!(err, AnalysisError::Serialization(_)));

        let err: AnalysisError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, AnalysisError::Internal(ref msg) if msg == "boom"));
    }
}
