//! Ingest Ledger - rusqlite 기반 수집 실행 기록
//!
//! 수집 실행마다 시작/종료 시각과 삽입 문서 수를 남기고,
//! 출처 URL마다 결과(extracted / insufficient_content / unavailable)를 기록합니다.
//! 저장 위치: <data_dir>/ingest.db

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;

// ============================================================================
// Types
// ============================================================================

/// 출처별 수집 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    /// 추출 성공 (레코드 수)
    Extracted { records: usize },
    /// 본문이 최소 길이 미만
    InsufficientContent { length: usize },
    /// 가져오기 실패
    Unavailable { reason: String },
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracted { .. } => "extracted",
            Self::InsufficientContent { .. } => "insufficient_content",
            Self::Unavailable { .. } => "unavailable",
        }
    }

    /// 원장 저장용 (records, detail) 분해
    fn columns(&self) -> (Option<i64>, Option<String>) {
        match self {
            Self::Extracted { records } => (Some(*records as i64), None),
            Self::InsufficientContent { length } => (None, Some(length.to_string())),
            Self::Unavailable { reason } => (None, Some(reason.clone())),
        }
    }

    fn from_columns(status: &str, records: Option<i64>, detail: Option<String>) -> Self {
        match status {
            "extracted" => Self::Extracted {
                records: records.unwrap_or(0).max(0) as usize,
            },
            "insufficient_content" => Self::InsufficientContent {
                length: detail.and_then(|d| d.parse().ok()).unwrap_or(0),
            },
            _ => Self::Unavailable {
                reason: detail.unwrap_or_default(),
            },
        }
    }
}

/// 출처 하나의 수집 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub url: String,
    #[serde(flatten)]
    pub status: SourceStatus,
}

/// 수집 실행 요약
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub collection: String,
    pub inserted: Option<usize>,
    pub sources: Vec<SourceReport>,
}

impl RunSummary {
    /// 추출에 성공한 출처 수
    pub fn extracted_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.status, SourceStatus::Extracted { .. }))
            .count()
    }
}

// ============================================================================
// IngestLedger
// ============================================================================

/// 수집 실행 원장
pub struct IngestLedger {
    conn: Arc<Mutex<Connection>>,
}

impl IngestLedger {
    /// 원장 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create ledger directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let ledger = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        ledger.initialize()?;
        Ok(ledger)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                inserted INTEGER
            );
            CREATE TABLE IF NOT EXISTS sources (
                run_id INTEGER NOT NULL REFERENCES runs(id),
                position INTEGER NOT NULL,
                url TEXT NOT NULL,
                status TEXT NOT NULL,
                records INTEGER,
                detail TEXT,
                PRIMARY KEY (run_id, position)
            );",
        )
        .context("Failed to initialize ledger schema")?;

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// 새 실행 시작, 실행 ID 반환
    pub fn start_run(&self, collection: &str) -> Result<i64> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO runs (collection, started_at) VALUES (?1, ?2)",
            params![collection, now],
        )
        .context("Failed to record run start")?;

        let id = conn.last_insert_rowid();
        tracing::debug!("Started ingest run {} for {}", id, collection);
        Ok(id)
    }

    /// 출처별 결과 기록 (입력 순서 유지)
    pub fn record_sources(&self, run_id: i64, sources: &[SourceReport]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO sources (run_id, position, url, status, records, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (position, source) in sources.iter().enumerate() {
                let (records, detail) = source.status.columns();
                stmt.execute(params![
                    run_id,
                    position as i64,
                    source.url,
                    source.status.as_str(),
                    records,
                    detail
                ])?;
            }
        }

        tx.commit().context("Failed to record source outcomes")?;
        Ok(())
    }

    /// 실행 종료 (삽입 문서 수 기록)
    pub fn finish_run(&self, run_id: i64, inserted: usize) -> Result<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let updated = conn
            .execute(
                "UPDATE runs SET finished_at = ?1, inserted = ?2 WHERE id = ?3",
                params![now, inserted as i64, run_id],
            )
            .context("Failed to record run finish")?;

        if updated == 0 {
            anyhow::bail!("Unknown ingest run: {}", run_id);
        }
        Ok(())
    }

    /// 가장 최근 실행 조회
    pub fn latest_run(&self) -> Result<Option<RunSummary>> {
        let conn = self.lock()?;

        let run = conn.query_row(
            "SELECT id, collection, started_at, finished_at, inserted
             FROM runs ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                Ok(RunSummary {
                    id: row.get(0)?,
                    collection: row.get(1)?,
                    started_at: parse_datetime(row.get::<_, String>(2)?),
                    finished_at: row.get::<_, Option<String>>(3)?.map(parse_datetime),
                    inserted: row.get::<_, Option<i64>>(4)?.map(|n| n.max(0) as usize),
                    sources: Vec::new(),
                })
            },
        );

        let mut run = match run {
            Ok(run) => run,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e).context("Failed to load latest run"),
        };

        let mut stmt = conn.prepare(
            "SELECT url, status, records, detail FROM sources
             WHERE run_id = ?1 ORDER BY position",
        )?;
        run.sources = stmt
            .query_map(params![run.id], |row| {
                let status: String = row.get(1)?;
                Ok(SourceReport {
                    url: row.get(0)?,
                    status: SourceStatus::from_columns(&status, row.get(2)?, row.get(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(run))
    }
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_ledger() -> (TempDir, IngestLedger) {
        let dir = TempDir::new().unwrap();
        let ledger = IngestLedger::open(&dir.path().join("ingest.db")).unwrap();
        (dir, ledger)
    }

    fn reports() -> Vec<SourceReport> {
        vec![
            SourceReport {
                url: "https://a.example/proverbs".to_string(),
                status: SourceStatus::Extracted { records: 12 },
            },
            SourceReport {
                url: "https://b.example/empty".to_string(),
                status: SourceStatus::InsufficientContent { length: 42 },
            },
            SourceReport {
                url: "https://c.example/down".to_string(),
                status: SourceStatus::Unavailable {
                    reason: "HTTP 503 Service Unavailable".to_string(),
                },
            },
        ]
    }

    #[test]
    fn test_empty_ledger_has_no_runs() {
        let (_dir, ledger) = create_test_ledger();
        assert!(ledger.latest_run().unwrap().is_none());
    }

    #[test]
    fn test_run_round_trip() {
        let (_dir, ledger) = create_test_ledger();

        let run_id = ledger.start_run("igbo_proverbs").unwrap();
        ledger.record_sources(run_id, &reports()).unwrap();
        ledger.finish_run(run_id, 12).unwrap();

        let run = ledger.latest_run().unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.collection, "igbo_proverbs");
        assert_eq!(run.inserted, Some(12));
        assert!(run.finished_at.is_some());
        assert_eq!(run.sources, reports());
        assert_eq!(run.extracted_sources(), 1);
    }

    #[test]
    fn test_unfinished_run() {
        let (_dir, ledger) = create_test_ledger();

        ledger.start_run("igbo_proverbs").unwrap();
        let run = ledger.latest_run().unwrap().unwrap();
        assert!(run.finished_at.is_none());
        assert!(run.inserted.is_none());
        assert!(run.sources.is_empty());
    }

    #[test]
    fn test_latest_run_is_newest() {
        let (_dir, ledger) = create_test_ledger();

        let first = ledger.start_run("igbo_proverbs").unwrap();
        ledger.finish_run(first, 3).unwrap();
        let second = ledger.start_run("other").unwrap();

        let run = ledger.latest_run().unwrap().unwrap();
        assert_eq!(run.id, second);
        assert_eq!(run.collection, "other");
    }

    #[test]
    fn test_finish_unknown_run_fails() {
        let (_dir, ledger) = create_test_ledger();
        assert!(ledger.finish_run(99, 1).is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(&reports()[2]).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["reason"], "HTTP 503 Service Unavailable");
        assert_eq!(json["url"], "https://c.example/down");
    }
}
