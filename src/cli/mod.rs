//! CLI 모듈
//!
//! ilu-rag CLI 명령어 정의 및 구현

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::chat::{ChatFailure, ChatRequest, ChatService};
use crate::completion::OpenAiCompletion;
use crate::config::{Config, DEFAULT_SOURCES};
use crate::error::IngestError;
use crate::knowledge::{
    IngestLedger, LanceVectorStore, ProverbRetriever, SourceReport, SourceStatus, StoreClient,
    StoredDocument, VectorStore,
};
use crate::pipeline::IngestPipeline;
use crate::prompt::{PromptAssembler, TOP_K};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "ilu-rag")]
#[command(version, about = "이그보 속담 RAG 시스템", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 소스 페이지에서 속담을 수집하여 저장소에 추가
    Ingest {
        /// 수집할 URL (반복 가능, 없으면 기본 소스 목록)
        #[arg(short, long)]
        url: Vec<String>,

        /// 수집 전에 컬렉션 비우기
        #[arg(long)]
        reset: bool,

        /// 임베딩/저장 없이 추출 결과만 출력
        #[arg(long)]
        dry_run: bool,
    },

    /// 한 페이지의 추출 결과 미리보기
    Preview {
        /// 대상 URL
        url: String,
    },

    /// 유사 문서 검색
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short, long, default_value_t = TOP_K)]
        limit: usize,
    },

    /// 조립된 프롬프트 출력
    Prompt {
        /// 사용자 질의
        query: String,
    },

    /// 질문하기 (검색 + 완성)
    Ask {
        /// 질문
        #[arg(required_unless_present = "json")]
        prompt: Option<String>,

        /// JSON 요청 본문 (예: {"prompt": "..."})
        #[arg(long, conflicts_with = "prompt")]
        json: Option<String>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Ingest {
            url,
            reset,
            dry_run,
        } => cmd_ingest(&config, url, reset, dry_run).await,
        Commands::Preview { url } => cmd_preview(&config, &url).await,
        Commands::Search { query, limit } => cmd_search(&config, &query, limit).await,
        Commands::Prompt { query } => cmd_prompt(&config, &query).await,
        Commands::Ask { prompt, json } => cmd_ask(&config, prompt, json).await,
        Commands::Status => cmd_status(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 수집 명령어 (ingest)
///
/// 소스를 순서대로 가져와 추출/분류 후 저장소에 넣고 원장에 기록합니다.
async fn cmd_ingest(config: &Config, urls: Vec<String>, reset: bool, dry_run: bool) -> Result<()> {
    let urls = if urls.is_empty() {
        DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()
    } else {
        urls
    };

    let pipeline = IngestPipeline::from_config(config).context("파이프라인 생성 실패")?;
    println!("[*] 소스 {} 개 수집 중...", urls.len());

    if dry_run {
        let report = pipeline.collect(&urls).await;
        print_sources(&report.sources);
        print_documents(&report.documents);
        println!("\n[OK] 문서 {} 개 (dry run, 저장 안 함)", report.documents.len());
        return Ok(());
    }

    let retriever = ProverbRetriever::from_config(config)
        .await
        .context("저장소 초기화 실패")?;
    let ledger = IngestLedger::open(&config.ledger_path()).context("수집 원장 열기 실패")?;

    let run_id = ledger.start_run(&config.collection)?;
    let (report, inserted) = pipeline.run(&urls, &retriever, reset).await;
    ledger.record_sources(run_id, &report.sources)?;
    print_sources(&report.sources);

    match inserted {
        Ok(ids) => {
            ledger.finish_run(run_id, ids.len())?;
            if reset {
                println!("\n[*] 컬렉션 '{}' 초기화 후 교체됨", config.collection);
            }
            println!("\n[OK] 문서 {} 개 저장됨 (컬렉션: {})", ids.len(), config.collection);
            Ok(())
        }
        Err(IngestError::EmptyInsertionSet) => {
            ledger.finish_run(run_id, 0)?;
            bail!("저장할 문서가 없습니다 (모든 소스 실패 또는 추출 결과 없음)")
        }
        Err(e) => {
            ledger.finish_run(run_id, 0)?;
            Err(anyhow::Error::new(e).context("문서 저장 실패"))
        }
    }
}

/// 미리보기 명령어 (preview)
async fn cmd_preview(config: &Config, url: &str) -> Result<()> {
    let pipeline = IngestPipeline::from_config(config).context("파이프라인 생성 실패")?;
    let report = pipeline.collect(&[url.to_string()]).await;

    print_sources(&report.sources);
    print_documents(&report.documents);
    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(config: &Config, query: &str, limit: usize) -> Result<()> {
    println!("[*] 검색 중: \"{}\"", query);

    let retriever = ProverbRetriever::from_config(config)
        .await
        .context("저장소 초기화 실패")?;
    let results = retriever
        .similarity_search(query, limit)
        .await
        .context("검색 실패")?;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        let categories = result.metadata["categories"]
            .as_array()
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        println!("{}. [유사도: {:.4}] [{}]", i + 1, result.similarity, categories);
        println!("   내용: {}", truncate_text(&result.content, 200));
        if let Some(url) = result.metadata["origin_url"].as_str() {
            println!("   출처: {}", url);
        }
        println!();
    }

    Ok(())
}

/// 프롬프트 명령어 (prompt)
async fn cmd_prompt(config: &Config, query: &str) -> Result<()> {
    let assembler = assembler_from_config(config).await?;
    let prompt = assembler.assemble(query).await?;
    println!("{}", prompt);
    Ok(())
}

/// 질문 명령어 (ask)
///
/// `--json`이면 응답(또는 실패) 본문을 JSON으로 출력합니다.
async fn cmd_ask(config: &Config, prompt: Option<String>, json: Option<String>) -> Result<()> {
    let service = ChatService::new(
        assembler_from_config(config).await?,
        Arc::new(OpenAiCompletion::from_config(config)?),
    );

    let Some(body) = json else {
        let request = ChatRequest::new(prompt.unwrap_or_default());
        let reply = service.handle(&request).await?;
        println!("{}", reply.text.trim());
        return Ok(());
    };

    let request_id = crate::chat::new_request_id();
    let result = match ChatRequest::from_json(&body) {
        Ok(request) => service.handle_with_id(&request, request_id.clone()).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(reply) => {
            println!("{}", serde_json::to_string_pretty(&reply)?);
            Ok(())
        }
        Err(e) => {
            let failure = ChatFailure::new(&e, request_id);
            println!("{}", serde_json::to_string_pretty(&failure)?);
            Err(e.into())
        }
    }
}

/// 상태 명령어 (status)
async fn cmd_status(config: &Config) -> Result<()> {
    println!("ilu-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 컬렉션: {}", config.collection);
    println!(
        "[*] 모델: {} (임베딩), {} (완성)",
        config.embedding_model, config.completion_model
    );

    if config.openai_api_key.is_some() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export OPENAI_API_KEY=your-key");
    }

    // 벡터 수 (임베딩 없이 열 수 있는 LanceDB만 사용)
    match LanceVectorStore::open(&config.lance_path(), &config.collection).await {
        Ok(store) => match store.count().await {
            Ok(count) => println!("[OK] 저장된 문서: {} 건", count),
            Err(e) => println!("[!] 문서 수 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 벡터 저장소 열기 실패: {}", e),
    }

    match IngestLedger::open(&config.ledger_path()).and_then(|ledger| ledger.latest_run()) {
        Ok(Some(run)) => {
            let finished = run
                .finished_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "미완료".to_string());
            println!(
                "[OK] 최근 수집: #{} {} ~ {} | 문서 {} 개 | 성공 소스 {}/{}",
                run.id,
                run.started_at.format("%Y-%m-%d %H:%M"),
                finished,
                run.inserted.unwrap_or(0),
                run.extracted_sources(),
                run.sources.len()
            );
        }
        Ok(None) => println!("[!] 수집 기록 없음"),
        Err(e) => println!("[!] 수집 원장 열기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn assembler_from_config(config: &Config) -> Result<PromptAssembler> {
    let retriever = ProverbRetriever::from_config(config)
        .await
        .context("저장소 초기화 실패")?;
    Ok(PromptAssembler::new(Arc::new(retriever)))
}

/// 소스별 결과 출력
fn print_sources(sources: &[SourceReport]) {
    for (i, source) in sources.iter().enumerate() {
        let detail = match &source.status {
            SourceStatus::Extracted { records } => format!("레코드 {} 개", records),
            SourceStatus::InsufficientContent { length } => format!("본문 부족 ({} chars)", length),
            SourceStatus::Unavailable { reason } => format!("실패: {}", truncate_text(reason, 80)),
        };
        println!("[{}/{}] {} ... {}", i + 1, sources.len(), source.url, detail);
    }
}

/// 문서 목록 출력
fn print_documents(documents: &[StoredDocument]) {
    if documents.is_empty() {
        println!("\n[!] 추출된 문서가 없습니다.");
        return;
    }

    println!();
    for doc in documents {
        let record = &doc.metadata.record;
        println!(
            "  #{:<4} [{}] [{}] {}",
            doc.metadata.index,
            record.pattern_kind,
            record.categories.join(", "),
            truncate_text(&doc.content, 120)
        );
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ingest_accepts_repeated_urls() {
        let cli = Cli::try_parse_from([
            "ilu-rag",
            "ingest",
            "--url",
            "https://a.example/p",
            "--url",
            "https://b.example/p",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Ingest {
                url,
                reset,
                dry_run,
            } => {
                assert_eq!(url.len(), 2);
                assert!(!reset);
                assert!(dry_run);
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn test_search_default_limit() {
        let cli = Cli::try_parse_from(["ilu-rag", "search", "kite"]).unwrap();
        match cli.command {
            Commands::Search { query, limit } => {
                assert_eq!(query, "kite");
                assert_eq!(limit, TOP_K);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_ask_requires_prompt_or_json() {
        assert!(Cli::try_parse_from(["ilu-rag", "ask"]).is_err());
        assert!(Cli::try_parse_from(["ilu-rag", "ask", "--json", r#"{"prompt":"hi"}"#]).is_ok());
        assert!(Cli::try_parse_from(["ilu-rag", "ask", "What is ilu?"]).is_ok());
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("source: a\ntranslation: b", 40), "source: a translation: b");
    }

    #[test]
    fn test_truncate_unicode() {
        let igbo = "Ọ̀kụ́kọ̀ na-akpa";
        let truncated = truncate_text(igbo, 3);
        assert_eq!(truncated.chars().count(), 6);
    }
}
