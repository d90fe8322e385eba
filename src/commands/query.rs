use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::db::{postgres, Clock, QueryRequest};
use crate::error::AppError;
use crate::models::QueryResult;
use crate::state::Session;

/// Anything that can answer a query request with a table.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run(&self, request: &QueryRequest) -> Result<Arc<QueryResult>, AppError>;
}

#[async_trait]
impl<C: Clock> QueryRunner for Session<C> {
    async fn run(&self, request: &QueryRequest) -> Result<Arc<QueryResult>, AppError> {
        let pool = self
            .current_pool()
            .ok_or_else(|| AppError::connection("not connected"))?;

        run_cached(self, request, || async move { postgres::fetch(&pool, request).await }).await
    }
}

/// Serve `request` from the session cache, or call `fetch` and remember the
/// result. Errors are never cached.
pub async fn run_cached<C, F, Fut>(
    session: &Session<C>,
    request: &QueryRequest,
    fetch: F,
) -> Result<Arc<QueryResult>, AppError>
where
    C: Clock,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<QueryResult, AppError>>,
{
    if let Some(hit) = session.cached(request) {
        log::debug!("cache hit ({} rows)", hit.row_count);
        return Ok(hit);
    }

    log::debug!("cache miss");
    let result = Arc::new(fetch().await?);
    session.store(request.clone(), result.clone());
    Ok(result)
}

/// Outcome of a free-form statement.
#[derive(Debug, Clone)]
pub struct AdhocResult {
    pub result: Arc<QueryResult>,
    /// Wall-clock time measured around the call
    pub elapsed_ms: u64,
    pub row_count: usize,
}

pub const DEFAULT_ADHOC_SQL: &str = "SELECT NOW() AS now;";

pub const ADHOC_EXPORT_NAME: &str = "resultado_sql.csv";

/// Run user-authored SQL verbatim and time it.
pub async fn run_adhoc<R: QueryRunner + ?Sized>(runner: &R, sql: &str) -> Result<AdhocResult, AppError> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Err(AppError::validation("SQL text is empty"));
    }

    let start = Instant::now();
    let result = runner.run(&QueryRequest::new(sql)).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(result) => {
            log::info!("ad-hoc query: {} rows in {} ms", result.row_count, elapsed_ms);
            Ok(AdhocResult {
                row_count: result.row_count,
                result,
                elapsed_ms,
            })
        }
        Err(e) => {
            log::warn!("ad-hoc query failed after {} ms: {}", elapsed_ms, e);
            Err(e)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted runner: answers by exact SQL text and records every request.
    #[derive(Default)]
    pub struct FakeRunner {
        responses: Mutex<HashMap<String, Result<QueryResult, String>>>,
        pub requests: Mutex<Vec<QueryRequest>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, sql: &str, result: QueryResult) {
            self.responses
                .lock()
                .unwrap()
                .insert(sql.to_string(), Ok(result));
        }

        pub fn fail(&self, sql: &str, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .insert(sql.to_string(), Err(message.to_string()));
        }

        pub fn requests(&self) -> Vec<QueryRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryRunner for FakeRunner {
        async fn run(&self, request: &QueryRequest) -> Result<Arc<QueryResult>, AppError> {
            self.requests.lock().unwrap().push(request.clone());
            match self.responses.lock().unwrap().get(&request.sql) {
                Some(Ok(result)) => Ok(Arc::new(result.clone())),
                Some(Err(message)) => Err(AppError::query(message.clone())),
                None => Ok(Arc::new(QueryResult::empty())),
            }
        }
    }
}
