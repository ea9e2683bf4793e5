//! 会话状态与任务注册表
//!
//! 每个分析任务一条会话记录，状态机单向推进：
//! queued → processing → completed / failed。终态之后拒绝任何
//! 再变更，进度百分比只增不减。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::Serialize;

use crate::core::report::AnalysisReport;

/// 任务状态机
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed { message: String, cancelled: bool },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed { .. })
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// 进度查询视图，拷贝出注册表外使用
#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    #[serde(flatten)]
    pub status: JobStatus,
    pub percent_complete: f32,
}

struct SessionRecord {
    status: JobStatus,
    percent_complete: f32,
    report: Option<AnalysisReport>,
    cancel_flag: Arc<AtomicBool>,
    finished_at: Option<Instant>,
}

impl SessionRecord {
    fn new() -> Self {
        SessionRecord {
            status: JobStatus::Queued,
            percent_complete: 0.0,
            report: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            finished_at: None,
        }
    }
}

/// 任务注册表，按会话 id 索引
///
/// 查询方只碰注册表，不会阻塞在分析线程上。
pub struct JobRegistry {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        JobRegistry {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// 登记新会话，返回其取消标志
    pub fn create(&self, session_id: &str) -> Arc<AtomicBool> {
        let record = SessionRecord::new();
        let flag = Arc::clone(&record.cancel_flag);
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string(), record);
        flag
    }

    pub fn start_processing(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(record) = sessions.get_mut(session_id) {
            if record.status == JobStatus::Queued {
                record.status = JobStatus::Processing;
            } else {
                warn!("会话 {}: 状态 {:?} 不能回到 processing", session_id, record.status);
            }
        }
    }

    /// 更新进度，单调不减；完成前封顶在 99
    pub fn set_progress(&self, session_id: &str, percent: f32) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(record) = sessions.get_mut(session_id) {
            if record.status.is_terminal() {
                return;
            }
            let clamped = percent.clamp(0.0, 99.0);
            if clamped > record.percent_complete {
                record.percent_complete = clamped;
            }
        }
    }

    pub fn complete(&self, session_id: &str, report: AnalysisReport) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(record) = sessions.get_mut(session_id) {
            if record.status.is_terminal() {
                warn!("会话 {}: 已是终态，丢弃完成结果", session_id);
                return;
            }
            record.status = JobStatus::Completed;
            record.percent_complete = 100.0;
            record.report = Some(report);
            record.finished_at = Some(Instant::now());
            debug!("会话 {}: 完成", session_id);
        }
    }

    pub fn fail(&self, session_id: &str, message: String, cancelled: bool) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(record) = sessions.get_mut(session_id) {
            if record.status.is_terminal() {
                return;
            }
            record.status = JobStatus::Failed { message, cancelled };
            record.finished_at = Some(Instant::now());
        }
    }

    pub fn progress(&self, session_id: &str) -> Option<ProgressView> {
        let sessions = self.sessions.lock().unwrap();
        sessions.get(session_id).map(|record| ProgressView {
            status: record.status.clone(),
            percent_complete: record.percent_complete,
        })
    }

    /// 状态与报告快照（报告仅终态 completed 有值）
    pub fn snapshot(&self, session_id: &str) -> Option<(JobStatus, Option<AnalysisReport>)> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(session_id)
            .map(|record| (record.status.clone(), record.report.clone()))
    }

    /// 标记取消。返回 false 表示会话不存在；对终态会话标记无效果。
    pub fn request_cancel(&self, session_id: &str) -> bool {
        let sessions = self.sessions.lock().unwrap();
        match sessions.get(session_id) {
            Some(record) => {
                if record.status.is_active() {
                    record.cancel_flag.store(true, Ordering::Relaxed);
                }
                true
            }
            None => false,
        }
    }

    /// 未到终态的会话数
    pub fn active_count(&self) -> usize {
        let sessions = self.sessions.lock().unwrap();
        sessions.values().filter(|r| r.status.is_active()).count()
    }

    /// 逐出已结束且超过保留窗口的会话，返回被逐出的会话 id
    pub fn evict_finished(&self, older_than: Duration) -> Vec<String> {
        let mut sessions = self.sessions.lock().unwrap();
        let now = Instant::now();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, r)| {
                r.finished_at
                    .map(|at| now.duration_since(at) >= older_than)
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report;

    fn empty_report(session_id: &str) -> AnalysisReport {
        report::compile(session_id, Vec::new(), 100, 10, 30.0)
    }

    #[test]
    fn test_lifecycle_queued_processing_completed() {
        let registry = JobRegistry::new();
        registry.create("s1");

        assert_eq!(registry.progress("s1").unwrap().status, JobStatus::Queued);

        registry.start_processing("s1");
        assert_eq!(
            registry.progress("s1").unwrap().status,
            JobStatus::Processing
        );

        registry.complete("s1", empty_report("s1"));
        let view = registry.progress("s1").unwrap();
        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.percent_complete, 100.0);
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let registry = JobRegistry::new();
        registry.create("s1");
        registry.start_processing("s1");
        registry.fail("s1", "decode error".to_string(), false);

        // 终态后一切变更被拒绝
        registry.complete("s1", empty_report("s1"));
        registry.set_progress("s1", 50.0);

        let view = registry.progress("s1").unwrap();
        assert!(matches!(view.status, JobStatus::Failed { .. }));
        assert_eq!(view.percent_complete, 0.0);
    }

    #[test]
    fn test_progress_monotone_and_capped() {
        let registry = JobRegistry::new();
        registry.create("s1");
        registry.start_processing("s1");

        registry.set_progress("s1", 40.0);
        registry.set_progress("s1", 20.0);
        assert_eq!(registry.progress("s1").unwrap().percent_complete, 40.0);

        registry.set_progress("s1", 150.0);
        assert_eq!(registry.progress("s1").unwrap().percent_complete, 99.0);
    }

    #[test]
    fn test_cancel_flag_shared() {
        let registry = JobRegistry::new();
        let flag = registry.create("s1");
        registry.start_processing("s1");

        assert!(registry.request_cancel("s1"));
        assert!(flag.load(Ordering::Relaxed));

        assert!(!registry.request_cancel("missing"));
    }

    #[test]
    fn test_active_count_and_eviction() {
        let registry = JobRegistry::new();
        registry.create("done");
        registry.create("running");
        registry.start_processing("running");
        registry.complete("done", empty_report("done"));

        assert_eq!(registry.active_count(), 1);

        let evicted = registry.evict_finished(Duration::ZERO);
        assert_eq!(evicted, vec!["done".to_string()]);
        assert!(registry.progress("done").is_none());
        assert!(registry.progress("running").is_some());
    }
}
