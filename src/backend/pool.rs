//! Bounded pool of [`IrisConnection`]s with FIFO wait, idle healthchecking,
//! and per-lease cancellation (spec §4.8, §5).
//!
//! Grounded in the teacher's worker-actor pool (`pool/worker.rs`): a single
//! task owns the connection set and answers `Acquire`/`Release` messages
//! over an unbounded channel. The teacher polls a hand-rolled `Future` so
//! its pool works under any executor; this gateway is tokio-only, so the
//! actor is a plain `tokio::spawn`ed async loop instead of manual polling.
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio::time::{interval, Instant};

use crate::error::{BackendError, Result, Sqlstate};
use crate::types::Value;

use super::{BackendConfig, IrisConnection, QueryResult};

const HEALTHCHECK_INTERVAL: Duration = Duration::from_secs(30);

enum PoolMessage {
    Acquire(oneshot::Sender<Result<IrisConnection>>),
    Release(IrisConnection),
}

/// A handle to a pooled connection set, cheaply cloned and shared across
/// connection tasks.
#[derive(Clone)]
pub struct BackendPool {
    send: mpsc::UnboundedSender<PoolMessage>,
    leases: Arc<Mutex<HashMap<u64, Arc<Notify>>>>,
    next_lease: Arc<AtomicU64>,
    query_timeout: Duration,
}

impl BackendPool {
    pub fn spawn(config: BackendConfig) -> Self {
        let query_timeout = config.query_timeout;
        let (send, recv) = mpsc::unbounded_channel();
        tokio::spawn(run_pool(config, recv));
        Self {
            send,
            leases: Arc::new(Mutex::new(HashMap::new())),
            next_lease: Arc::new(AtomicU64::new(1)),
            query_timeout,
        }
    }

    /// Check out one connection, affine to the caller until dropped (spec
    /// §4.8: "affine to one backend connection for the lifetime of any open
    /// portal").
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let (tx, rx) = oneshot::channel();
        self.send
            .send(PoolMessage::Acquire(tx))
            .map_err(|_| BackendError::new(Sqlstate::CONNECTION_FAILURE, "backend pool closed"))?;
        let conn = rx
            .await
            .map_err(|_| BackendError::new(Sqlstate::CONNECTION_FAILURE, "backend pool closed"))??;

        let lease_id = self.next_lease.fetch_add(1, Ordering::Relaxed);
        let notify = Arc::new(Notify::new());
        self.leases.lock().await.insert(lease_id, notify.clone());

        Ok(PooledConnection {
            conn: Some(conn),
            send: self.send.clone(),
            leases: self.leases.clone(),
            lease_id,
            cancel_notify: notify,
            query_timeout: self.query_timeout,
        })
    }

    /// Signal cancellation for an in-flight query on `lease_id` (spec §4.8
    /// `cancel(handle)`, §4.10 cancellation sub-protocol).
    pub async fn cancel_lease(&self, lease_id: u64) {
        if let Some(notify) = self.leases.lock().await.get(&lease_id) {
            notify.notify_waiters();
        }
    }
}

/// A checked-out connection. Returns itself to the pool on drop, same as
/// the teacher's `WorkerHandle::release`.
pub struct PooledConnection {
    conn: Option<IrisConnection>,
    send: mpsc::UnboundedSender<PoolMessage>,
    leases: Arc<Mutex<HashMap<u64, Arc<Notify>>>>,
    lease_id: u64,
    cancel_notify: Arc<Notify>,
    query_timeout: Duration,
}

impl PooledConnection {
    pub fn lease_id(&self) -> u64 {
        self.lease_id
    }

    pub fn tx_status(&self) -> super::TxStatus {
        self.conn.as_ref().expect("connection taken").tx_status()
    }

    /// Run `execute`, racing it against cancellation signaled via
    /// [`BackendPool::cancel_lease`] for this lease and against the
    /// configured per-query timeout (spec §5).
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let conn = self.conn.as_mut().expect("connection taken");
        tokio::select! {
            biased;
            _ = self.cancel_notify.notified() => {
                conn.mark_failed();
                Err(BackendError::new(Sqlstate::QUERY_CANCELED, "query canceled").into())
            }
            _ = tokio::time::sleep(self.query_timeout) => {
                conn.mark_failed();
                Err(BackendError::new(Sqlstate::QUERY_CANCELED, "query timed out").into())
            }
            result = conn.execute(sql, params) => result,
        }
    }

    pub async fn begin(&mut self) -> Result<()> {
        self.conn.as_mut().expect("connection taken").begin().await
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.conn.as_mut().expect("connection taken").commit().await
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.conn.as_mut().expect("connection taken").rollback().await
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = self.send.send(PoolMessage::Release(conn));
        }
        let leases = self.leases.clone();
        let lease_id = self.lease_id;
        tokio::spawn(async move {
            leases.lock().await.remove(&lease_id);
        });
    }
}

async fn run_pool(config: BackendConfig, mut recv: mpsc::UnboundedReceiver<PoolMessage>) {
    let mut idle: VecDeque<(IrisConnection, Instant)> = VecDeque::new();
    let mut waiters: VecDeque<oneshot::Sender<Result<IrisConnection>>> = VecDeque::new();
    let mut outstanding = 0usize;
    let mut tick = interval(HEALTHCHECK_INTERVAL);

    loop {
        tokio::select! {
            msg = recv.recv() => {
                let Some(msg) = msg else { break };
                match msg {
                    PoolMessage::Acquire(reply) => {
                        if let Some((conn, _)) = idle.pop_front() {
                            let _ = reply.send(Ok(conn));
                        } else if outstanding < config.pool_size {
                            outstanding += 1;
                            match IrisConnection::connect(&config).await {
                                Ok(conn) => { let _ = reply.send(Ok(conn)); }
                                Err(e) => {
                                    outstanding -= 1;
                                    let _ = reply.send(Err(e));
                                }
                            }
                        } else {
                            waiters.push_back(reply);
                        }
                    }
                    PoolMessage::Release(conn) => {
                        if let Some(waiter) = waiters.pop_front() {
                            let _ = waiter.send(Ok(conn));
                        } else {
                            idle.push_back((conn, Instant::now()));
                        }
                    }
                }
            }
            _ = tick.tick() => {
                let mut still_idle = VecDeque::with_capacity(idle.len());
                while let Some((mut conn, since)) = idle.pop_front() {
                    if since.elapsed() > HEALTHCHECK_INTERVAL {
                        match conn.ping().await {
                            Ok(()) => still_idle.push_back((conn, Instant::now())),
                            Err(_) => {
                                outstanding = outstanding.saturating_sub(1);
                                tracing::warn!("dropping unhealthy idle backend connection");
                            }
                        }
                    } else {
                        still_idle.push_back((conn, since));
                    }
                }
                idle = still_idle;
            }
        }
    }
}
