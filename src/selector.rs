use crate::traits::{ProbeObserver, Prober};
use crate::types::{Endpoint, ProbeResult, SelectionOutcome};
use std::time::Duration;

/// Knobs for one selection run.
#[derive(Debug, Clone, Copy)]
pub struct SelectionPolicy {
    pub probe_timeout: Duration,
    /// A last-known-good endpoint answering faster than this wins immediately.
    pub fast_path: Duration,
}

/// Everything learned during one selection run.
#[derive(Debug, Clone, Default)]
pub struct SelectionReport {
    pub outcome: SelectionOutcome,
    /// Successful probes, in probe order.
    pub available: Vec<ProbeResult>,
    pub probed: usize,
    pub early_exit: bool,
}

/// Build the probe order: the last-known-good first (when it is still one of
/// the candidates), everything else in configured order.
pub fn probe_order(candidates: &[Endpoint], last_known_good: Option<&Endpoint>) -> Vec<Endpoint> {
    match last_known_good {
        Some(lkg) if candidates.contains(lkg) => {
            let mut order = Vec::with_capacity(candidates.len());
            order.push(lkg.clone());
            order.extend(candidates.iter().filter(|c| *c != lkg).cloned());
            order
        }
        _ => candidates.to_vec(),
    }
}

/// 串行检测所有候选域名, 选出最佳域名
///
/// 逻辑:
/// 1. 按 `probe_order` 排序 (上次成功的域名优先)
/// 2. 逐个检测, 记录成功结果中响应最快的一个
/// 3. 若上次成功的域名在快速阈值内响应, 直接选中并停止检测
/// 4. 全部失败则返回无赢家
///
/// Per-candidate failures never abort the loop.
pub async fn select_best<P, O>(
    prober: &P,
    candidates: &[Endpoint],
    last_known_good: Option<&Endpoint>,
    policy: SelectionPolicy,
    observer: &O,
) -> SelectionReport
where
    P: Prober + ?Sized,
    O: ProbeObserver + ?Sized,
{
    let order = probe_order(candidates, last_known_good);
    let total = order.len();

    if let Some(lkg) = last_known_good.filter(|lkg| candidates.contains(lkg)) {
        tracing::info!(endpoint = %lkg, "Probing last working endpoint first");
    }

    let mut report = SelectionReport::default();
    let mut best: Option<(Endpoint, u64)> = None;
    let fast_path_ms = policy.fast_path.as_millis() as u64;

    for (i, endpoint) in order.iter().enumerate() {
        observer.on_probe_start(i + 1, total, endpoint);
        tracing::debug!(index = i + 1, total, %endpoint, "Probing");

        let result = prober.probe(endpoint, policy.probe_timeout).await;
        report.probed += 1;
        observer.on_probe_result(&result);

        let elapsed = match (result.succeeded, result.elapsed_ms) {
            (true, Some(ms)) => ms,
            _ => {
                let reason = result
                    .failure_kind()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                tracing::warn!(%endpoint, %reason, "Endpoint unreachable");
                continue;
            }
        };
        report.available.push(result);

        if best.as_ref().map_or(true, |(_, fastest)| elapsed < *fastest) {
            best = Some((endpoint.clone(), elapsed));
        }

        if Some(endpoint) == last_known_good && elapsed < fast_path_ms {
            tracing::info!(%endpoint, elapsed_ms = elapsed, "Last working endpoint is fast, selecting it");
            best = Some((endpoint.clone(), elapsed));
            report.early_exit = true;
            break;
        }
    }

    report.outcome = match best {
        Some((winner, elapsed_ms)) => {
            tracing::info!(endpoint = %winner, elapsed_ms, "Selected best endpoint");
            SelectionOutcome {
                winner: Some(winner),
                elapsed_ms: Some(elapsed_ms),
            }
        }
        None => {
            tracing::warn!(total, "All endpoints failed");
            SelectionOutcome::none()
        }
    };

    report
}
