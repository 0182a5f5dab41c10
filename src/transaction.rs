//! Minimal in-process unit-of-work tracking.
//!
//! A [`Tracer`] hands out [`Transaction`] handles. A transaction becomes the
//! current one on a thread while its [`Entered`] guard is alive; the logging
//! core resolves it through [`LinkingContext`] rather than reaching into any
//! process-wide singleton.

use crate::env;
use crate::metadata::{LinkingContext, LinkingMetadata, TransactionEndHook};
use rand::Rng;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Entity type reported for every application.
pub const ENTITY_TYPE: &str = "SERVICE";

thread_local! {
    static CURRENT: RefCell<Vec<Transaction>> = const { RefCell::new(Vec::new()) };
}

/// Static identity of the monitored application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub app_name: String,
    pub entity_guid: String,
    pub hostname: String,
}

impl AgentIdentity {
    pub fn new(app_name: impl Into<String>, entity_guid: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            entity_guid: entity_guid.into(),
            hostname: detect_hostname(),
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }
}

/// Hostname from `APM_HOSTNAME`, `HOSTNAME`, the operating system, else
/// `"unknown"`.
pub fn detect_hostname() -> String {
    for key in [env::HOSTNAME_ENV, "HOSTNAME"] {
        let value = env::env_or(key, "");
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }

    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct EndHooks {
    hooks: RwLock<Vec<TransactionEndHook>>,
}

impl EndHooks {
    fn push(&self, hook: TransactionEndHook) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    fn fire(&self, transaction: &Transaction) {
        let hooks = self.hooks.read().unwrap_or_else(PoisonError::into_inner);
        for hook in hooks.iter() {
            hook(transaction);
        }
    }
}

struct TransactionInner {
    id: TransactionId,
    name: String,
    trace_id: String,
    span_id: String,
    ended: AtomicBool,
    hooks: Arc<EndHooks>,
}

/// Handle to one unit of work. Clones refer to the same transaction.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn trace_id(&self) -> &str {
        &self.inner.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.inner.span_id
    }

    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::SeqCst)
    }

    /// End the unit of work. Only the first call fires the end hooks.
    pub fn end(&self) {
        if self.inner.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::trace!(
            target: crate::DIAGNOSTICS_TARGET,
            transaction = self.inner.id.0,
            name = %self.inner.name,
            "transaction ended"
        );
        self.inner.hooks.fire(self);
    }

    /// Make this the current transaction on this thread until the guard drops.
    pub fn enter(&self) -> Entered {
        CURRENT.with(|current| current.borrow_mut().push(self.clone()));
        Entered {
            transaction: self.clone(),
            _not_send: PhantomData,
        }
    }

    fn belongs_to(&self, hooks: &Arc<EndHooks>) -> bool {
        Arc::ptr_eq(&self.inner.hooks, hooks)
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("trace_id", &self.inner.trace_id)
            .field("span_id", &self.inner.span_id)
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// Guard returned by [`Transaction::enter`].
#[must_use = "the transaction is only current while the guard is alive"]
pub struct Entered {
    transaction: Transaction,
    _not_send: PhantomData<*const ()>,
}

impl Drop for Entered {
    fn drop(&mut self) {
        // Guards may be dropped out of order; remove this guard's own entry.
        CURRENT.with(|current| {
            let mut current = current.borrow_mut();
            if let Some(index) = current
                .iter()
                .rposition(|entry| Arc::ptr_eq(&entry.inner, &self.transaction.inner))
            {
                current.remove(index);
            }
        });
    }
}

/// In-process tracing subsystem: identity, transaction ids, end hooks.
pub struct Tracer {
    identity: AgentIdentity,
    next_id: AtomicU64,
    hooks: Arc<EndHooks>,
}

impl Tracer {
    pub fn new(identity: AgentIdentity) -> Self {
        Self {
            identity,
            next_id: AtomicU64::new(1),
            hooks: Arc::new(EndHooks::default()),
        }
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn start_transaction(&self, name: impl Into<String>) -> Transaction {
        let mut rng = rand::thread_rng();
        let trace_id = format!("{:032x}", rng.gen::<u128>());
        let span_id = format!("{:016x}", rng.gen::<u64>());

        Transaction {
            inner: Arc::new(TransactionInner {
                id: TransactionId(self.next_id.fetch_add(1, Ordering::Relaxed)),
                name: name.into(),
                trace_id,
                span_id,
                ended: AtomicBool::new(false),
                hooks: Arc::clone(&self.hooks),
            }),
        }
    }

    /// Run `f` with `transaction` current on this thread.
    pub fn in_transaction<R>(&self, transaction: &Transaction, f: impl FnOnce() -> R) -> R {
        let _entered = transaction.enter();
        f()
    }
}

impl LinkingContext for Tracer {
    fn active_transaction(&self) -> Option<Transaction> {
        CURRENT.with(|current| {
            current
                .borrow()
                .iter()
                .rev()
                .find(|transaction| transaction.belongs_to(&self.hooks))
                .filter(|transaction| !transaction.is_ended())
                .cloned()
        })
    }

    fn linking_metadata(&self, transaction: Option<&Transaction>) -> LinkingMetadata {
        let (trace_id, span_id) = match transaction {
            Some(transaction) => (
                transaction.trace_id().to_string(),
                transaction.span_id().to_string(),
            ),
            None => (String::new(), String::new()),
        };

        LinkingMetadata {
            entity_name: self.identity.app_name.clone(),
            entity_type: ENTITY_TYPE.to_string(),
            entity_guid: self.identity.entity_guid.clone(),
            trace_id,
            span_id,
            hostname: self.identity.hostname.clone(),
        }
    }

    fn on_transaction_end(&self, hook: TransactionEndHook) {
        self.hooks.push(hook);
    }
}
