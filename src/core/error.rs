use thiserror::Error;

/// 分析任务级错误，致命错误会使任务进入 failed 状态
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("视频解码失败: {0}")]
    Decode(String),
    #[error("视频中没有可解码的帧")]
    EmptySource,
    #[error("配置无效: {0}")]
    InvalidConfig(String),
    #[error("任务已取消")]
    Cancelled,
    #[error("并发任务数已达上限 ({0})")]
    TooManyJobs(usize),
    #[error("未知会话: {0}")]
    UnknownSession(String),
    #[error("结果尚未就绪: {0}")]
    NotReady(String),
    #[error("任务失败: {0}")]
    JobFailed(String),
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 单个检测器在单帧上的失败
///
/// 可恢复：该检测器在该帧的输出视为空，仅记录与计数，不会中止流水线。
#[derive(Debug, Error)]
pub enum DetectorFailure {
    #[error("帧数据格式错误: {0}")]
    MalformedFrame(String),
    #[error("外部服务不可用: {0}")]
    ServiceUnavailable(String),
    #[error("外部服务超时")]
    ServiceTimeout,
}
