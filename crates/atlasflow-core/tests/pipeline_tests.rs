//! End-to-end pipeline tests over in-memory fetch and store seams
//!
//! These run the real controller, queue and writer wiring; only the HTTP
//! client and Postgres are replaced.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};

use atlasflow_core::fetch::{DateWindow, FetchedPage, PageFetcher};
use atlasflow_core::models::ExtractedRecord;
use atlasflow_core::pipeline::{run_extraction, ExtractionParams};
use atlasflow_core::progress::{CancelToken, Progress};
use atlasflow_core::store::RecordStore;
use atlasflow_core::PipelineError;
use atlasflow_core::PipelineResult;

/// Scripted fetcher: one entry per page, in order.
enum Step {
    Page(Vec<Value>, Option<u32>),
    Exhausted,
}

struct ScriptedFetcher {
    steps: Vec<Step>,
    calls: Mutex<Vec<u32>>,
}

impl ScriptedFetcher {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(&self, page: u32) -> PipelineResult<FetchedPage> {
        self.calls.lock().unwrap().push(page);
        match self.steps.get(page as usize - 1) {
            Some(Step::Page(records, last_page)) => Ok(FetchedPage {
                records: records.clone(),
                current_page: Some(page),
                last_page: *last_page,
                total_pages: None,
                next_page_url: None,
            }),
            Some(Step::Exhausted) => Err(PipelineError::FetchExhausted {
                page,
                attempts: 5,
                source: anyhow::anyhow!("connection reset"),
            }),
            None => Ok(FetchedPage::default()),
        }
    }
}

#[derive(Default)]
struct MemoryStoreInner {
    rows: Vec<ExtractedRecord>,
    keys: HashSet<(i32, String)>,
}

/// In-memory store with the same (cliente_id, hash_conteudo) uniqueness rule
/// as the raw table.
#[derive(Default, Clone)]
struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
    write_delay: Option<Duration>,
    fail: bool,
}

impl MemoryStore {
    fn row_count(&self) -> usize {
        self.inner.lock().unwrap().rows.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_batch(&self, records: &[ExtractedRecord]) -> PipelineResult<u64> {
        if self.fail {
            return Err(PipelineError::Storage(sqlx::Error::PoolClosed));
        }
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        let mut inserted = 0;
        for record in records {
            let key = (record.cliente_id, record.hash_conteudo.clone());
            if inner.keys.insert(key) {
                inner.rows.push(record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

fn in_range(id: u64) -> Value {
    json!({"id": id, "data_pedido": "2025-01-10", "valor": 12.5})
}

fn out_of_range(id: u64) -> Value {
    json!({"id": id, "data_pedido": "2025-02-05", "valor": 3.0})
}

fn params(queue_capacity: usize, batch_size: usize) -> ExtractionParams {
    ExtractionParams {
        cliente_id: 2151,
        origem: "pedido".to_string(),
        window: DateWindow::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        ),
        date_fields: vec!["data_pedido".to_string(), "created_at".to_string()],
        queue_capacity,
        batch_size,
    }
}

#[tokio::test]
async fn test_two_page_run_filters_and_persists() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        Step::Page((0..150).map(in_range).collect(), Some(2)),
        Step::Page(
            (150..160)
                .map(in_range)
                .chain((160..165).map(out_of_range))
                .collect(),
            Some(2),
        ),
    ]));
    let store = MemoryStore::default();

    let stats = run_extraction(
        Arc::clone(&fetcher),
        store.clone(),
        params(1_000, 50),
        Progress::new(),
        CancelToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(stats.pages_processed, 2);
    assert_eq!(stats.records_written, 155);
    assert_eq!(stats.records_filtered, 5);
    assert_eq!(store.row_count(), 155);
    // Each page was requested exactly once, in order.
    assert_eq!(*fetcher.calls.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let store = MemoryStore::default();

    for expected_written in [10u64, 0u64] {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Step::Page((0..5).map(in_range).collect(), Some(2)),
            Step::Page((5..10).map(in_range).collect(), Some(2)),
        ]));
        let stats = run_extraction(
            fetcher,
            store.clone(),
            params(100, 4),
            Progress::new(),
            CancelToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(stats.records_written, expected_written);
    }

    assert_eq!(store.row_count(), 10);
}

#[tokio::test]
async fn test_duplicate_payloads_within_run_are_written_once() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![Step::Page(
        vec![in_range(1), in_range(1), in_range(2)],
        Some(1),
    )]));
    let store = MemoryStore::default();

    let stats = run_extraction(
        fetcher,
        store.clone(),
        params(100, 10),
        Progress::new(),
        CancelToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(stats.records_written, 2);
    assert_eq!(store.row_count(), 2);
}

#[tokio::test]
async fn test_records_without_reference_date_are_kept() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![Step::Page(
        vec![
            json!({"id": 900, "descricao": "sem campo de data"}),
            in_range(901),
            out_of_range(902),
        ],
        Some(1),
    )]));
    let store = MemoryStore::default();

    let stats = run_extraction(
        Arc::clone(&fetcher),
        store.clone(),
        params(100, 10),
        Progress::new(),
        CancelToken::new(),
    )
    .await
    .unwrap();

    // The dateless payload passes the filter; only the out-of-window one
    // is dropped.
    assert_eq!(stats.records_written, 2);
    assert_eq!(stats.records_filtered, 1);
    assert_eq!(store.row_count(), 2);
}

#[tokio::test]
async fn test_slow_store_applies_backpressure_without_loss() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        Step::Page((0..20).map(in_range).collect(), Some(3)),
        Step::Page((20..40).map(in_range).collect(), Some(3)),
        Step::Page((40..60).map(in_range).collect(), Some(3)),
    ]));
    let store = MemoryStore {
        write_delay: Some(Duration::from_millis(2)),
        ..MemoryStore::default()
    };

    // Queue far smaller than a page: the producer must block on put.
    let stats = run_extraction(
        fetcher,
        store.clone(),
        params(4, 3),
        Progress::new(),
        CancelToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(stats.pages_processed, 3);
    assert_eq!(stats.records_written, 60);
    assert_eq!(store.row_count(), 60);
}

#[tokio::test]
async fn test_fetch_failure_keeps_earlier_pages() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        Step::Page((0..20).map(in_range).collect(), Some(2)),
        Step::Exhausted,
    ]));
    let store = MemoryStore::default();
    let progress = Progress::new();

    let err = run_extraction(
        fetcher,
        store.clone(),
        params(100, 8),
        progress.clone(),
        CancelToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::FetchExhausted { page: 2, .. }));
    // Everything enqueued before the failure was still drained and stored.
    assert_eq!(store.row_count(), 20);
    assert_eq!(progress.snapshot().records_written, 20);
}

#[tokio::test]
async fn test_cancelled_before_start_writes_nothing() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![Step::Page(
        (0..5).map(in_range).collect(),
        Some(1),
    )]));
    let store = MemoryStore::default();
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = run_extraction(fetcher, store.clone(), params(100, 8), Progress::new(), cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(store.row_count(), 0);
}

#[tokio::test]
async fn test_store_failure_fails_the_run() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![Step::Page(
        (0..5).map(in_range).collect(),
        Some(1),
    )]));
    let store = MemoryStore {
        fail: true,
        ..MemoryStore::default()
    };

    let err = run_extraction(
        fetcher,
        store,
        params(100, 2),
        Progress::new(),
        CancelToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Storage(_)));
}

#[tokio::test]
async fn test_http_two_page_scenario_end_to_end() {
    use atlasflow_core::config::PipelineConfig;
    use atlasflow_core::fetch::HttpPageFetcher;
    use atlasflow_core::models::ApiRoute;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;

    let page_one: Vec<Value> = (0..150).map(in_range).collect();
    let page_two: Vec<Value> = (150..160)
        .map(in_range)
        .chain((160..165).map(out_of_range))
        .collect();

    Mock::given(method("GET"))
        .and(path("/api/pedidos"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": page_one,
            "current_page": 1,
            "last_page": 2
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/pedidos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": page_two,
            "current_page": 2,
            "last_page": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let route = ApiRoute {
        id: uuid::Uuid::new_v4(),
        cliente_id: 2151,
        nome_rota: "pedido".to_string(),
        url: format!("{}/api/pedidos", server.uri()),
        metodo_http: "GET".to_string(),
        headers: serde_json::json!({"Authorization": "Bearer {token}"}),
        ativo: true,
    };
    let config = PipelineConfig::default();
    let extraction = params(1_000, 50);
    let fetcher = HttpPageFetcher::new(&route, "abc123", extraction.window, &config).unwrap();
    let store = MemoryStore::default();

    let stats = run_extraction(
        fetcher,
        store.clone(),
        extraction,
        Progress::new(),
        CancelToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(stats.pages_processed, 2);
    assert_eq!(stats.records_written, 155);
    assert_eq!(stats.records_filtered, 5);
    assert_eq!(store.row_count(), 155);
}
