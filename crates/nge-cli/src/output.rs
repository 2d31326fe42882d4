//! 주문 결과 출력.

use std::io::Write;

use nge_core::Order;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// 결과 스트림의 주문을 한 줄에 하나씩 JSON으로 출력하는 작업을 시작합니다.
///
/// 스트림이 닫히면 출력한 주문 수와 writer를 반환합니다.
pub fn spawn_printer<W>(mut results: mpsc::Receiver<Order>, mut out: W) -> JoinHandle<(usize, W)>
where
    W: Write + Send + 'static,
{
    tokio::spawn(async move {
        let mut printed = 0;

        while let Some(order) = results.recv().await {
            match serde_json::to_string(&order) {
                Ok(line) => {
                    if let Err(e) = writeln!(out, "{}", line) {
                        warn!(error = %e, "결과 출력 실패");
                        continue;
                    }
                    printed += 1;
                }
                Err(e) => warn!(error = %e, "결과 직렬화 실패"),
            }
        }

        if let Err(e) = out.flush() {
            warn!(error = %e, "출력 flush 실패");
        }

        (printed, out)
    })
}
