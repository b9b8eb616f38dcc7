// Store module - 报告存储
// 以指纹为键的内容寻址存储：每个指纹一份 report_<fp>.json，
// 旁路维护 bincode 历史索引，浏览历史无需加载完整报告

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::report::{HistoryEntry, Report};
use crate::request::Language;

const INDEX_FILE: &str = "history_index.bin";

/// 持久层不可用时向调用方大声失败——静默丢失幂等性保证
/// 比失败更糟
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failed: {0}")]
    Serialization(String),
}

pub struct ReportStore {
    reports_dir: PathBuf,
    /// 指纹 → 计算权互斥锁。同一指纹并发请求时只有一个调用方
    /// 真正跑编排，其余等待后直接读已落盘的报告；持锁方失败或
    /// 被取消时锁随 guard 释放，后来者回退到重新计算而非死锁。
    claims: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// 串行化索引文件的读改写
    index_lock: Mutex<()>,
}

impl ReportStore {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let reports_dir = reports_dir.into();
        fs::create_dir_all(&reports_dir)?;
        Ok(Self {
            reports_dir,
            claims: Mutex::new(HashMap::new()),
            index_lock: Mutex::new(()),
        })
    }

    fn report_path(&self, fingerprint: &str) -> PathBuf {
        self.reports_dir.join(format!("report_{}.json", fingerprint))
    }

    fn index_path(&self) -> PathBuf {
        self.reports_dir.join(INDEX_FILE)
    }

    /// 读取指定指纹的报告，不存在返回 None
    pub fn get(&self, fingerprint: &str) -> Result<Option<Report>, StoreError> {
        let path = self.report_path(fingerprint);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let report = serde_json::from_str(&content).map_err(|e| {
            log::error!("corrupted report file {}: {}", path.display(), e);
            StoreError::Serialization(e.to_string())
        })?;
        Ok(Some(report))
    }

    /// 持久化报告并更新历史索引
    pub fn put(&self, report: &Report) -> Result<(), StoreError> {
        let serialized = serde_json::to_string_pretty(report)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::write(self.report_path(&report.fingerprint), serialized)?;

        let _guard = self.index_lock.lock().unwrap();
        let mut index = self.load_index();
        index.insert(report.fingerprint.clone(), HistoryEntry::from(report));
        self.save_index(&index)
    }

    /// 删除报告及其历史投影。删除不存在的指纹是空操作。
    pub fn delete(&self, fingerprint: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.report_path(fingerprint)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let _guard = self.index_lock.lock().unwrap();
        let mut index = self.load_index();
        if index.remove(fingerprint).is_some() {
            self.save_index(&index)?;
        }
        Ok(())
    }

    /// get-or-compute：命中直接返回缓存报告（标记 served_from_cache），
    /// 未命中时每个指纹最多只执行一次 compute，即使并发调用。
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        fingerprint: &str,
        compute: F,
    ) -> Result<(Report, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Report, E>>,
        E: From<StoreError>,
    {
        if let Some(report) = self.get(fingerprint).map_err(E::from)? {
            return Ok((cached(report), true));
        }

        let claim = self.claim(fingerprint);
        let _guard = claim.lock().await;

        // 拿到计算权后再查一次：可能先行者刚写完
        if let Some(report) = self.get(fingerprint).map_err(E::from)? {
            return Ok((cached(report), true));
        }

        let report = compute().await?;
        self.put(&report).map_err(E::from)?;
        self.release(fingerprint);
        Ok((report, false))
    }

    fn claim(&self, fingerprint: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut claims = self.claims.lock().unwrap();
        claims
            .entry(fingerprint.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release(&self, fingerprint: &str) {
        // 报告已落盘，后来者会在查存储时命中；条目可以安全移除
        self.claims.lock().unwrap().remove(fingerprint);
    }

    /// 历史条目，按 created_at 降序。每次调用都反映存储的当前状态。
    pub fn list_history(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let _guard = self.index_lock.lock().unwrap();
        let index = self.load_index();
        let mut entries: Vec<HistoryEntry> = index.into_values().collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// 可浏览的历史索引：日期 → 语言 → 按最高严重度排序的条目
    pub fn history_tree(&self) -> Result<Vec<HistoryDateGroup>, StoreError> {
        let entries = self.list_history()?;
        let mut by_date: Vec<HistoryDateGroup> = Vec::new();

        for entry in entries {
            let date = entry.created_at.date_naive();
            let group = match by_date.iter_mut().find(|g| g.date == date) {
                Some(group) => group,
                None => {
                    by_date.push(HistoryDateGroup {
                        date,
                        languages: Vec::new(),
                    });
                    by_date.last_mut().unwrap()
                }
            };
            let bucket = match group
                .languages
                .iter_mut()
                .find(|b| b.language == entry.language)
            {
                Some(bucket) => bucket,
                None => {
                    group.languages.push(HistoryLanguageGroup {
                        language: entry.language,
                        entries: Vec::new(),
                    });
                    group.languages.last_mut().unwrap()
                }
            };
            bucket.entries.push(entry);
        }

        by_date.sort_by(|a, b| b.date.cmp(&a.date));
        for group in &mut by_date {
            group.languages.sort_by_key(|b| b.language);
            for bucket in &mut group.languages {
                bucket.entries.sort_by(|a, b| {
                    b.severity_counts
                        .highest()
                        .cmp(&a.severity_counts.highest())
                        .then(b.created_at.cmp(&a.created_at))
                });
            }
        }
        Ok(by_date)
    }

    fn load_index(&self) -> HashMap<String, HistoryEntry> {
        let path = self.index_path();
        if path.exists() {
            match fs::read(&path) {
                Ok(data) => match bincode::deserialize(&data) {
                    Ok(index) => return index,
                    Err(e) => {
                        log::error!("failed to deserialize history index: {}", e);
                    }
                },
                Err(e) => {
                    log::error!("failed to read history index: {}", e);
                }
            }
        }
        // 索引缺失或损坏时扫描报告文件重建
        self.rebuild_index()
    }

    fn rebuild_index(&self) -> HashMap<String, HistoryEntry> {
        let mut index = HashMap::new();
        let entries = match fs::read_dir(&self.reports_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("failed to scan reports directory: {}", e);
                return index;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with("report_") || !name.ends_with(".json") {
                continue;
            }
            let Ok(content) = fs::read_to_string(entry.path()) else {
                continue;
            };
            // 报告 JSON 是 HistoryEntry 的超集，直接投影反序列化
            match serde_json::from_str::<HistoryEntry>(&content) {
                Ok(history) => {
                    index.insert(history.fingerprint.clone(), history);
                }
                Err(e) => {
                    log::error!("skipping unreadable report {}: {}", name, e);
                }
            }
        }
        index
    }

    fn save_index(&self, index: &HashMap<String, HistoryEntry>) -> Result<(), StoreError> {
        let serialized =
            bincode::serialize(index).map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::write(self.index_path(), serialized)?;
        Ok(())
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }
}

fn cached(mut report: Report) -> Report {
    report.served_from_cache = true;
    report
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryDateGroup {
    pub date: NaiveDate,
    pub languages: Vec<HistoryLanguageGroup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryLanguageGroup {
    pub language: Language,
    pub entries: Vec<HistoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SeverityCounts;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn report(fingerprint: &str, age_minutes: i64) -> Report {
        Report {
            fingerprint: fingerprint.to_string(),
            created_at: Utc::now() - Duration::minutes(age_minutes),
            language: Language::Python,
            tool_results: Vec::new(),
            findings: Vec::new(),
            severity_counts: SeverityCounts::default(),
            risk_score: 0,
            normalization_warnings: 0,
            served_from_cache: false,
        }
    }

    #[test]
    fn put_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();

        assert!(store.get("aaaa").unwrap().is_none());
        store.put(&report("aaaa", 0)).unwrap();
        let loaded = store.get("aaaa").unwrap().unwrap();
        assert_eq!(loaded.fingerprint, "aaaa");

        store.delete("aaaa").unwrap();
        assert!(store.get("aaaa").unwrap().is_none());
        // 重复删除是空操作
        store.delete("aaaa").unwrap();
    }

    #[test]
    fn history_is_newest_first_and_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();

        store.put(&report("old", 30)).unwrap();
        store.put(&report("new", 1)).unwrap();

        let history = store.list_history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].fingerprint, "new");

        store.delete("new").unwrap();
        let history = store.list_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].fingerprint, "old");
    }

    #[test]
    fn index_rebuilds_after_sidecar_loss() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();
        store.put(&report("abcd", 0)).unwrap();

        fs::remove_file(dir.path().join(INDEX_FILE)).unwrap();
        let history = store.list_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].fingerprint, "abcd");
    }

    #[tokio::test]
    async fn concurrent_callers_compute_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ReportStore::new(dir.path()).unwrap());
        let computations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let computations = computations.clone();
            handles.push(tokio::spawn(async move {
                store
                    .get_or_compute::<_, _, StoreError>("ffff", || async {
                        computations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(report("ffff", 0))
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut fresh = 0;
        for handle in handles {
            let (result, from_cache) = handle.await.unwrap();
            assert_eq!(result.fingerprint, "ffff");
            if !from_cache {
                fresh += 1;
            }
        }
        assert_eq!(computations.load(Ordering::SeqCst), 1);
        assert_eq!(fresh, 1);
    }

    #[tokio::test]
    async fn failed_computation_releases_the_claim() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();

        let result = store
            .get_or_compute::<_, _, StoreError>("eeee", || async {
                Err(StoreError::Serialization("boom".to_string()))
            })
            .await;
        assert!(result.is_err());

        // 失败后计算权已释放，下一个调用方重新计算而不是死锁
        let (recomputed, from_cache) = store
            .get_or_compute::<_, _, StoreError>("eeee", || async { Ok(report("eeee", 0)) })
            .await
            .unwrap();
        assert_eq!(recomputed.fingerprint, "eeee");
        assert!(!from_cache);
    }
}
