use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;

/// 单次限流判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admitted,
    Rejected { retry_after_secs: u64 },
}

/// 基于滑动窗口的内存限流器：窗口期内每个客户端最多放行固定次数。
/// 状态只存在于进程内，重启即清零；多实例部署需换成共享存储。
pub struct RateLimiter {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests: max_requests as usize,
            window,
        }
    }

    /// 检查并记录一次请求。判定和追加在同一把锁内完成，
    /// 同一客户端的并发请求不会同时挤进最后一个名额。
    pub fn check_and_record(&self, client: &str, now: Instant) -> Decision {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        let timestamps = windows.entry(client.to_string()).or_default();

        // 惰性清理窗口外的旧记录
        while let Some(&oldest) = timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            // 最早一条记录滑出窗口后才有名额
            let retry_after = timestamps
                .front()
                .map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(Duration::ZERO);
            // 剩余时间向上取整，按提示等待的客户端重试时一定已有名额
            let retry_after_secs =
                (retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0)).max(1);
            return Decision::Rejected { retry_after_secs };
        }

        timestamps.push_back(now);
        Decision::Admitted
    }

    /// 清理空窗口，避免客户端集合只增不减
    pub fn prune_idle(&self, now: Instant) {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|&last| now.duration_since(last) < self.window)
        });
    }
}

/// 从请求中解析客户端标识：优先代理头，其次连接地址
fn client_identity(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or_else(|| remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = client_identity(&req);

    match limiter.check_and_record(&client, Instant::now()) {
        Decision::Admitted => next.run(req).await,
        Decision::Rejected { retry_after_secs } => {
            tracing::warn!(
                "Rate limit exceeded for client {}, retry after {}s",
                client,
                retry_after_secs
            );
            AppError::RateLimited { retry_after_secs }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn limiter() -> RateLimiter {
        RateLimiter::new(5, Duration::from_secs(60))
    }

    fn at(base: Instant, secs: u64) -> Instant {
        base + Duration::from_secs(secs)
    }

    #[test]
    fn admits_up_to_limit_within_window() {
        let limiter = limiter();
        let base = Instant::now();
        for t in 0..5 {
            assert_eq!(
                limiter.check_and_record("a", at(base, t)),
                Decision::Admitted
            );
        }
    }

    #[test]
    fn rejects_sixth_request_with_retry_hint() {
        let limiter = limiter();
        let base = Instant::now();
        for t in 0..5 {
            assert_eq!(
                limiter.check_and_record("a", at(base, t)),
                Decision::Admitted
            );
        }
        // 第6次在 t=5 被拒，最早一条记录在 t=0，还要等 55 秒
        match limiter.check_and_record("a", at(base, 5)) {
            Decision::Rejected { retry_after_secs } => assert_eq!(retry_after_secs, 55),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn window_slides_instead_of_resetting() {
        let limiter = limiter();
        let base = Instant::now();
        for t in 0..5 {
            assert_eq!(
                limiter.check_and_record("a", at(base, t)),
                Decision::Admitted
            );
        }
        assert!(matches!(
            limiter.check_and_record("a", at(base, 30)),
            Decision::Rejected { .. }
        ));
        // t=61 时 t=0 的记录已滑出窗口
        assert_eq!(
            limiter.check_and_record("a", at(base, 61)),
            Decision::Admitted
        );
        // 但 t=1..4 的记录还在，下一次仍然被拒
        assert!(matches!(
            limiter.check_and_record("a", at(base, 62)),
            Decision::Rejected { .. }
        ));
    }

    #[test]
    fn clients_are_limited_independently() {
        let limiter = limiter();
        let base = Instant::now();
        for t in 0..5 {
            assert_eq!(
                limiter.check_and_record("a", at(base, t)),
                Decision::Admitted
            );
        }
        assert!(matches!(
            limiter.check_and_record("a", at(base, 5)),
            Decision::Rejected { .. }
        ));
        assert_eq!(
            limiter.check_and_record("b", at(base, 5)),
            Decision::Admitted
        );
    }

    #[test]
    fn retry_hint_is_always_positive() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let base = Instant::now();
        assert_eq!(limiter.check_and_record("a", base), Decision::Admitted);
        match limiter.check_and_record("a", at(base, 59)) {
            Decision::Rejected { retry_after_secs } => assert!(retry_after_secs >= 1),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn retry_hint_rounds_partial_seconds_up() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let base = Instant::now();
        assert_eq!(limiter.check_and_record("a", base), Decision::Admitted);
        // 剩余 55.5 秒时提示 56，而不是 55
        match limiter.check_and_record("a", base + Duration::from_millis(4500)) {
            Decision::Rejected { retry_after_secs } => assert_eq!(retry_after_secs, 56),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn concurrent_requests_cannot_overshoot_limit() {
        let limiter = Arc::new(limiter());
        let now = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = Arc::clone(&limiter);
            handles.push(thread::spawn(move || {
                matches!(limiter.check_and_record("a", now), Decision::Admitted)
            }));
        }
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 5);
    }

    #[test]
    fn prune_idle_drops_expired_clients() {
        let limiter = limiter();
        let base = Instant::now();
        limiter.check_and_record("a", base);
        limiter.prune_idle(at(base, 120));
        let windows = limiter.windows.lock().unwrap();
        assert!(windows.is_empty());
    }
}
