//! 설정 모듈 - 환경변수 기반 런타임 설정
//!
//! 프로세스 시작 시 한 번 읽어서 각 클라이언트 생성자에 전달합니다.
//! 코어 컴포넌트(추출기, 분류기, 프롬프트 조립기)는 설정 I/O를 하지 않습니다.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// 기본 OpenAI API 엔드포인트
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// 기본 임베딩 모델
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// 기본 생성 모델
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";
/// 기본 컬렉션(테이블) 이름
pub const DEFAULT_COLLECTION: &str = "igbo_proverbs";

/// 기본 수집 대상 URL 목록
pub const DEFAULT_SOURCES: &[&str] = &[
    "https://steemit.com/nigeria/@leopantro/50-igbo-proverbs-and-idioms",
    "https://www.zikoko.com/life/15-igbo-proverbs-and-their-meanings/",
    "https://www.igboguide.org/guests/igbo-proverbs.htm",
    "https://www.igbounionofwashington.com/post/igbo-proverbs-and-their-meanings",
    "https://oiroegbu.com/learn-africa/the-igbo-and-their-proverbs/",
    "https://sloaneangelou.blog/journal/100-igbo-proverbs",
    "https://www.teachyourselfigbo.com/igbo-proverbs-and-their-meanings.php",
    "https://ig.wikipedia.org/wiki/Ilu_igbo",
    "https://en.wikipedia.org/wiki/Igbo_culture",
    "https://en.wikipedia.org/wiki/Igbo_people",
    "https://en.wikipedia.org/wiki/Odinala",
    "https://en.wikipedia.org/wiki/Igbo_art",
    "https://www.britannica.com/topic/Igbo",
];

/// 런타임 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenAI API 키 (임베딩/생성 호출 시 필수)
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub embedding_model: String,
    pub completion_model: String,
    /// LanceDB 테이블 이름
    pub collection: String,
    /// 데이터 디렉토리 (LanceDB, 수집 원장)
    pub data_dir: PathBuf,
    /// 페이지 요청 타임아웃
    pub fetch_timeout: Duration,
    /// 소스 간 대기 시간
    pub fetch_delay: Duration,
    pub user_agent: String,
    /// 사용자 정의 어휘 JSON 경로
    pub vocabulary_path: Option<PathBuf>,
}

impl Config {
    /// `.env` 파일(있으면)과 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 키 조회 함수로 설정 구성
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let fetch_timeout_secs = parse_number(get("ILU_FETCH_TIMEOUT_SECS"), "ILU_FETCH_TIMEOUT_SECS", 30)?;
        let fetch_delay_ms = parse_number(get("ILU_FETCH_DELAY_MS"), "ILU_FETCH_DELAY_MS", 1000)?;

        Ok(Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            embedding_model: get("ILU_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            completion_model: get("ILU_COMPLETION_MODEL")
                .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
            collection: get("ILU_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            data_dir: get("ILU_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            fetch_delay: Duration::from_millis(fetch_delay_ms),
            user_agent: get("ILU_USER_AGENT")
                .unwrap_or_else(|| format!("ilu-rag/{}", env!("CARGO_PKG_VERSION"))),
            vocabulary_path: get("ILU_VOCABULARY").map(PathBuf::from),
        })
    }

    /// API 키 반환 (없으면 에러)
    pub fn require_api_key(&self) -> Result<&str> {
        match self.openai_api_key.as_deref() {
            Some(key) => Ok(key),
            None => bail!(
                "OPENAI_API_KEY not set.\n\
                 Set: export OPENAI_API_KEY=your-api-key (or add it to .env)"
            ),
        }
    }

    /// LanceDB 디렉토리 경로
    pub fn lance_path(&self) -> PathBuf {
        self.data_dir.join("vectors.lance")
    }

    /// 수집 원장 DB 경로
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ingest.db")
    }
}

/// 기본 데이터 디렉토리 (~/.ilu-rag/)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ilu-rag")
}

fn parse_number(value: Option<String>, key: &str, default: u64) -> Result<u64> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, raw)),
        None => Ok(default),
    }
}
