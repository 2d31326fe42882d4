//! 주문 조회 / 주문 생성 명령어.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use nge_core::Order;
use nge_exchange::{OrderQuery, OrderTransport};
use nge_execution::{BatchSpec, OrderPipeline};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::output::spawn_printer;
use crate::session::Session;

/// 과거 주문 조회 기본 건수.
pub const DEFAULT_GET_ORDER_COUNT: u32 = 200;

/// 과거 주문 조회 조건.
#[derive(Debug, Clone, Default)]
pub struct OrderGetConfig {
    pub filter: Option<String>,
    pub columns: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub count: u32,
    pub reverse: bool,
}

impl OrderGetConfig {
    fn to_query(&self, symbol: &str) -> OrderQuery {
        OrderQuery {
            symbol: Some(symbol.to_string()).filter(|s| !s.is_empty()),
            filter: self.filter.clone(),
            columns: self.columns.clone(),
            start: self.start,
            end: self.end,
            count: Some(self.count).filter(|c| *c > 0),
            reverse: self.reverse,
        }
    }
}

/// 주문 생성 결과 요약.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderNewSummary {
    pub submitted: usize,
    pub failed: usize,
    pub printed: usize,
}

/// 과거 주문을 조회해 한 줄에 하나씩 출력합니다. 출력한 주문 수를 반환합니다.
pub async fn get_orders<W>(session: &Session, config: &OrderGetConfig, out: W) -> Result<usize>
where
    W: Write + Send + 'static,
{
    let query = config.to_query(&session.config.endpoint.symbol);
    let auth = session.pool.next_auth(None).await?;

    let orders = session
        .rest
        .fetch_historical_orders(&auth, &query)
        .await
        .context("Get order failed")?;
    info!(count = orders.len(), "과거 주문 조회 완료");

    // 과거 주문은 제출한 클라이언트가 없으므로 파이프라인을 거치지 않고 바로 출력
    let (tx, rx) = mpsc::channel(orders.len().max(1));
    let printer = spawn_printer(rx, out);

    for raw in orders {
        match Order::try_from(&raw) {
            Ok(order) => {
                if tx.send(order).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(
                error = %e,
                order_id = raw.order_id.as_deref().unwrap_or(""),
                "주문 변환 실패, 건너뜀"
            ),
        }
    }
    drop(tx);

    let (printed, _) = printer.await?;
    Ok(printed)
}

/// 배치 설정대로 주문을 생성해 제출하고 결과를 출력합니다.
///
/// 개별 주문 실패는 경고 후 집계하며 나머지 주문 제출을 계속합니다.
pub async fn new_orders<W>(session: &Session, spec: &BatchSpec, out: W) -> Result<OrderNewSummary>
where
    W: Write + Send + 'static,
{
    let orders = {
        let mut rng = rand::thread_rng();
        spec.generate(&mut rng)?
    };

    // 풀 구성 실패는 주문마다 반복하지 않고 한 번에 보고
    session.pool.credentials().await?;

    let pipeline = Arc::new(session.pipeline());
    let printer = start_printer(&pipeline, out).await?;
    let progress = progress_bar(orders.len());

    let client_id = session.client_id().to_string();
    let timeout = session.submit_timeout();

    let tasks = orders.into_iter().map(|order| {
        let pipeline = pipeline.clone();
        let client_id = client_id.clone();
        let progress = progress.clone();

        tokio::spawn(async move {
            let result = match pipeline.submit(&client_id, order, timeout).await {
                Ok(ack) => {
                    pipeline.on_result(ack).await;
                    Ok(())
                }
                Err(e) => Err(e),
            };
            progress.inc(1);
            result
        })
    });

    let mut summary = OrderNewSummary::default();
    for joined in join_all(tasks).await {
        match joined {
            Ok(Ok(())) => summary.submitted += 1,
            Ok(Err(e)) => {
                warn!(error = %e, "주문 제출 실패");
                summary.failed += 1;
            }
            Err(e) => {
                warn!(error = %e, "주문 제출 작업 중단");
                summary.failed += 1;
            }
        }
    }
    progress.finish_and_clear();

    pipeline.close_results().await;
    let (printed, _) = printer.await?;
    summary.printed = printed;

    info!(
        submitted = summary.submitted,
        failed = summary.failed,
        "주문 제출 완료"
    );

    Ok(summary)
}

async fn start_printer<W>(
    pipeline: &OrderPipeline,
    out: W,
) -> Result<tokio::task::JoinHandle<(usize, W)>>
where
    W: Write + Send + 'static,
{
    let results = pipeline
        .results()
        .await
        .context("result stream already taken")?;
    Ok(spawn_printer(results, out))
}

fn progress_bar(len: usize) -> ProgressBar {
    if len <= 1 {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
