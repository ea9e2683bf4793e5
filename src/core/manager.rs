//! 分析任务管理器
//!
//! 对外的入口门面：提交任务、查进度、取报告、取缩略图、取消、
//! 健康探针、过期会话清理。每个任务占一个后台线程，并发有界，
//! 达到上限的新提交直接拒绝而不是排队。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{error, info};
use serde::Serialize;
use uuid::Uuid;

use crate::core::assemble::thumbnail::ThumbnailStore;
use crate::core::config::AnalysisConfig;
use crate::core::detect::remote::RemoteMoldDetector;
use crate::core::error::AnalysisError;
use crate::core::pipeline;
use crate::core::report::AnalysisReport;
use crate::core::session::{JobRegistry, JobStatus, ProgressView};
use crate::core::video::source::VideoSource;

/// 运维健康探针的结果
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// 是否配置了可用的霉斑检测路径（远端服务或离线回退）
    pub models_loaded: bool,
    /// 远端服务当前是否可达（未配置则为 false）
    pub external_service_reachable: bool,
    pub active_jobs: usize,
}

pub struct AnalysisManager {
    config: AnalysisConfig,
    max_jobs: usize,
    registry: Arc<JobRegistry>,
    thumbnails: Arc<ThumbnailStore>,
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl AnalysisManager {
    pub fn new(config: AnalysisConfig) -> Self {
        let max_jobs = num_cpus::get();
        Self::with_max_jobs(config, max_jobs)
    }

    pub fn with_max_jobs(config: AnalysisConfig, max_jobs: usize) -> Self {
        AnalysisManager {
            config,
            max_jobs,
            registry: Arc::new(JobRegistry::new()),
            thumbnails: Arc::new(ThumbnailStore::new()),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// 提交分析任务，立刻返回会话 id，分析在后台线程进行。
    /// 活跃任务达到上限时拒绝。
    pub fn submit<S: VideoSource + 'static>(&self, source: S) -> Result<String, AnalysisError> {
        self.submit_with_config(source, self.config.clone())
    }

    /// 用覆盖配置提交（离线开关、采样步长等按次调整）
    pub fn submit_with_config<S: VideoSource + 'static>(
        &self,
        source: S,
        config: AnalysisConfig,
    ) -> Result<String, AnalysisError> {
        config.validate()?;

        if self.registry.active_count() >= self.max_jobs {
            return Err(AnalysisError::TooManyJobs(self.max_jobs));
        }

        let session_id = Uuid::new_v4().to_string();
        let cancel = self.registry.create(&session_id);
        info!("会话 {}: 已提交", session_id);

        let registry = Arc::clone(&self.registry);
        let thumbnails = Arc::clone(&self.thumbnails);
        let id = session_id.clone();

        let handle = std::thread::spawn(move || {
            match pipeline::run_job(&id, source, &config, &registry, &thumbnails, &cancel) {
                Ok(report) => registry.complete(&id, report),
                Err(AnalysisError::Cancelled) => {
                    registry.fail(&id, "分析已取消".to_string(), true);
                }
                Err(e) => {
                    error!("会话 {}: 分析失败: {}", id, e);
                    registry.fail(&id, e.to_string(), false);
                }
            }
        });

        self.handles
            .lock()
            .unwrap()
            .insert(session_id.clone(), handle);
        Ok(session_id)
    }

    /// 阻塞等待某个会话的后台线程退出（关停和测试用）
    pub fn wait(&self, session_id: &str) {
        let handle = self.handles.lock().unwrap().remove(session_id);
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    pub fn progress(&self, session_id: &str) -> Result<ProgressView, AnalysisError> {
        self.registry
            .progress(session_id)
            .ok_or_else(|| AnalysisError::UnknownSession(session_id.to_string()))
    }

    /// 取回已完成会话的报告；未完成返回 NotReady，失败会话返回其失败原因
    pub fn report(&self, session_id: &str) -> Result<AnalysisReport, AnalysisError> {
        match self.registry.snapshot(session_id) {
            None => Err(AnalysisError::UnknownSession(session_id.to_string())),
            Some((JobStatus::Completed, Some(report))) => Ok(report),
            Some((JobStatus::Completed, None)) => {
                Err(AnalysisError::JobFailed("报告缺失".to_string()))
            }
            Some((JobStatus::Failed { message, .. }, _)) => Err(AnalysisError::JobFailed(message)),
            Some(_) => Err(AnalysisError::NotReady(session_id.to_string())),
        }
    }

    /// 请求取消。流水线在下一个帧边界停下，部分结果被丢弃。
    pub fn cancel(&self, session_id: &str) -> Result<(), AnalysisError> {
        if self.registry.request_cancel(session_id) {
            info!("会话 {}: 收到取消请求", session_id);
            Ok(())
        } else {
            Err(AnalysisError::UnknownSession(session_id.to_string()))
        }
    }

    /// 取回检测记录携带的缩略图 JPEG
    pub fn thumbnail(&self, key: &str) -> Option<Vec<u8>> {
        self.thumbnails.get(key)
    }

    /// 健康探针。远端可达性是一次实时探测，可能阻塞到请求超时。
    pub fn health(&self) -> HealthStatus {
        let service = self.config.service.as_ref();
        let reachable = service
            .map(|s| RemoteMoldDetector::probe(s, self.config.request_timeout))
            .unwrap_or(false);
        HealthStatus {
            models_loaded: service.is_some() || self.config.offline_mode,
            external_service_reachable: reachable,
            active_jobs: self.registry.active_count(),
        }
    }

    /// 清理超过保留窗口的已结束会话及其缩略图，返回清理条数
    pub fn evict_finished(&self, older_than: Duration) -> usize {
        let evicted = self.registry.evict_finished(older_than);
        let mut handles = self.handles.lock().unwrap();
        for id in &evicted {
            self.thumbnails.remove_session(id);
            if let Some(handle) = handles.remove(id) {
                let _ = handle.join();
            }
        }
        if !evicted.is_empty() {
            info!("清理了 {} 个过期会话", evicted.len());
        }
        evicted.len()
    }
}
