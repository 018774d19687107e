//! Connection cache
//!
//! Maps transport URIs to live connections:
//! - `jndi` URIs get a connection created from a directory-held factory and
//!   registered with the host
//! - `queue`/`topic` URIs borrow a connection the host already has
//!
//! The cache is split into independently locked segments. Concurrent
//! resolves of the same URI share a single in-flight load, so a URI is never
//! loaded twice and every waiter sees the same connection or the same error.
//! Failed loads are not cached. Each segment evicts its least recently used
//! entry when full. Invalidation also detaches in-flight loads: a load that
//! finishes after its URI was invalidated releases its connection instead of
//! caching it.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use soapjms_core::uri::{CONNECTION_NAME, JNDI_CONNECTION_FACTORY_NAME};
use soapjms_core::{CacheConfig, Configuration, LookupVariant, TransportUri};
use soapjms_messaging::{
    Connection, DirectoryEntry, DirectoryProvider, MessagingError, MessagingHost,
};
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Name prefix for `jndi` connections that do not carry a `connectionName`
pub const ANONYMOUS_CONNECTION_PREFIX: &str = "ws-anon-connection-";

type LoadFuture = Shared<BoxFuture<'static, Result<Arc<dyn Connection>>>>;

/// Where a cached connection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOrigin {
    /// Created by the cache; closed when released
    Created,
    /// Borrowed from the host; the host owns its lifetime
    Registered,
}

/// Cache counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub evictions: u64,
    pub size: usize,
}

struct CachedConnection {
    connection: Arc<dyn Connection>,
    origin: ConnectionOrigin,
    last_access: u64,
}

struct InFlight {
    token: u64,
    load: LoadFuture,
}

struct Segment {
    entries: HashMap<TransportUri, CachedConnection>,
    loading: HashMap<TransportUri, InFlight>,
    capacity: usize,
}

impl Segment {
    fn new(capacity: usize, initial: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(initial.min(capacity)),
            loading: HashMap::new(),
            capacity,
        }
    }

    /// Insert an entry, returning the one it displaced if the segment was full
    fn insert(
        &mut self,
        uri: TransportUri,
        entry: CachedConnection,
    ) -> Option<(TransportUri, CachedConnection)> {
        let evicted = if !self.entries.contains_key(&uri) && self.entries.len() >= self.capacity {
            self.entries
                .iter()
                .min_by_key(|(_, cached)| cached.last_access)
                .map(|(key, _)| key.clone())
                .and_then(|key| self.entries.remove_entry(&key))
        } else {
            None
        };
        self.entries.insert(uri, entry);
        evicted
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
}

struct CacheInner {
    config: CacheConfig,
    segments: Vec<Mutex<Segment>>,
    hasher: RandomState,
    clock: AtomicU64,
    load_tokens: AtomicU64,
    anonymous: AtomicU64,
    counters: Counters,
    host: Arc<dyn MessagingHost>,
    directories: Arc<dyn DirectoryProvider>,
    base: Configuration,
    /// Entries detached by invalidation, waiting for `clean_up`
    released: Mutex<Vec<(TransportUri, CachedConnection)>>,
}

/// Bounded, segmented cache of connections keyed by transport URI
///
/// Eviction is per segment, not global: `max_size` is split across
/// `min(concurrency, max_size)` segments and a URI is evicted when its own
/// segment is full, even if the cache as a whole holds fewer than
/// `max_size` connections. Callers should not rely on a cache-wide LRU order.
#[derive(Clone)]
pub struct ConnectionCache {
    inner: Arc<CacheInner>,
}

impl ConnectionCache {
    /// Create an empty cache
    ///
    /// `base` is the global configuration each URI's effective configuration
    /// is layered on when a connection definition is built.
    pub fn new(
        config: CacheConfig,
        base: Configuration,
        host: Arc<dyn MessagingHost>,
        directories: Arc<dyn DirectoryProvider>,
    ) -> Result<Self> {
        config.validate()?;

        // every segment must be able to hold at least one entry
        let count = config.concurrency.min(config.max_size);
        let segments = (0..count)
            .map(|i| {
                let capacity = config.max_size / count + usize::from(i < config.max_size % count);
                Mutex::new(Segment::new(capacity, config.initial_capacity / count))
            })
            .collect();

        debug!(
            max_size = config.max_size,
            segments = count,
            "created connection cache"
        );

        Ok(Self {
            inner: Arc::new(CacheInner {
                config,
                segments,
                hasher: RandomState::new(),
                clock: AtomicU64::new(0),
                load_tokens: AtomicU64::new(0),
                anonymous: AtomicU64::new(0),
                counters: Counters::default(),
                host,
                directories,
                base,
                released: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Resolve the connection for `uri`, loading it on a miss
    pub async fn resolve(&self, uri: &TransportUri) -> Result<Arc<dyn Connection>> {
        let index = self.inner.segment_index(uri);
        let load = {
            let mut segment = self.inner.segments[index].lock();
            if let Some(cached) = segment.entries.get_mut(uri) {
                cached.last_access = self.inner.tick();
                self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(cached.connection.clone());
            }
            self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
            match segment.loading.get(uri) {
                Some(in_flight) => {
                    debug!(uri = %uri, "joining in-flight connection load");
                    in_flight.load.clone()
                }
                None => {
                    let token = self.inner.load_tokens.fetch_add(1, Ordering::Relaxed);
                    let load = self
                        .inner
                        .clone()
                        .load_into(uri.clone(), index, token)
                        .shared();
                    segment.loading.insert(
                        uri.clone(),
                        InFlight {
                            token,
                            load: load.clone(),
                        },
                    );
                    load
                }
            }
        };
        load.await
    }

    /// Whether a connection for `uri` is cached
    pub fn contains(&self, uri: &TransportUri) -> bool {
        let index = self.inner.segment_index(uri);
        self.inner.segments[index].lock().entries.contains_key(uri)
    }

    /// Origin of the cached connection for `uri`
    pub fn origin(&self, uri: &TransportUri) -> Option<ConnectionOrigin> {
        let index = self.inner.segment_index(uri);
        self.inner.segments[index]
            .lock()
            .entries
            .get(uri)
            .map(|cached| cached.origin)
    }

    /// Drop the entry for `uri`; the connection is released by `clean_up`
    ///
    /// A load of `uri` still in flight is detached and releases its
    /// connection when it completes.
    pub fn invalidate(&self, uri: &TransportUri) {
        let index = self.inner.segment_index(uri);
        let removed = {
            let mut segment = self.inner.segments[index].lock();
            segment.loading.remove(uri);
            segment.entries.remove_entry(uri)
        };
        if let Some(entry) = removed {
            self.inner.released.lock().push(entry);
        }
    }

    /// Drop every entry; the connections are released by `clean_up`
    ///
    /// Loads still in flight are detached and release their connections when
    /// they complete.
    pub fn invalidate_all(&self) {
        let mut detached = Vec::new();
        for segment in &self.inner.segments {
            let mut segment = segment.lock();
            segment.loading.clear();
            detached.extend(segment.entries.drain());
        }
        if !detached.is_empty() {
            debug!(count = detached.len(), "invalidated cached connections");
        }
        self.inner.released.lock().extend(detached);
    }

    /// Release connections detached by invalidation
    ///
    /// Connections the cache created are closed. Failures are logged and do
    /// not stop the remaining releases. A no-op when nothing is pending.
    pub async fn clean_up(&self) {
        let pending = std::mem::take(&mut *self.inner.released.lock());
        for (uri, entry) in pending {
            release(&uri, entry).await;
        }
    }

    /// Number of cached connections
    pub fn len(&self) -> usize {
        self.inner
            .segments
            .iter()
            .map(|segment| segment.lock().entries.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            loads: counters.loads.load(Ordering::Relaxed),
            load_failures: counters.load_failures.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            size: self.len(),
        }
    }
}

impl std::fmt::Debug for ConnectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCache")
            .field("config", &self.inner.config)
            .field("size", &self.len())
            .finish()
    }
}

impl CacheInner {
    fn segment_index(&self, uri: &TransportUri) -> usize {
        (self.hasher.hash_one(uri) % self.segments.len() as u64) as usize
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Load `uri` and store the result in segment `index`
    ///
    /// The result is only cached while `token` still owns the segment's
    /// in-flight slot for `uri`. Otherwise the load was invalidated and the
    /// connection is released at once.
    fn load_into(
        self: Arc<Self>,
        uri: TransportUri,
        index: usize,
        token: u64,
    ) -> BoxFuture<'static, Result<Arc<dyn Connection>>> {
        async move {
            self.counters.loads.fetch_add(1, Ordering::Relaxed);
            let outcome = self.load(&uri).await;

            let (current, evicted) = {
                let mut segment = self.segments[index].lock();
                let current = matches!(
                    segment.loading.get(&uri),
                    Some(in_flight) if in_flight.token == token
                );
                if current {
                    segment.loading.remove(&uri);
                }
                let evicted = match &outcome {
                    Ok((connection, origin)) if current => segment.insert(
                        uri.clone(),
                        CachedConnection {
                            connection: connection.clone(),
                            origin: *origin,
                            last_access: self.tick(),
                        },
                    ),
                    _ => None,
                };
                (current, evicted)
            };

            let outcome = match outcome {
                Ok((connection, origin)) if !current => {
                    info!(uri = %uri, connection = %connection.name(), "connection load invalidated");
                    let entry = CachedConnection {
                        connection,
                        origin,
                        last_access: 0,
                    };
                    release(&uri, entry).await;
                    Err(Error::ConnectionResolutionFailed {
                        uri: uri.to_string(),
                        reason: "cache invalidated while loading".to_string(),
                    })
                }
                other => other,
            };

            if let Some((evicted_uri, entry)) = evicted {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                info!(uri = %evicted_uri, connection = %entry.connection.name(), "evicted cached connection");
                release(&evicted_uri, entry).await;
            }

            match outcome {
                Ok((connection, _)) => Ok(connection),
                Err(e) => {
                    self.counters.load_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(uri = %uri, "connection load failed: {}", e);
                    Err(e)
                }
            }
        }
        .boxed()
    }

    async fn load(&self, uri: &TransportUri) -> Result<(Arc<dyn Connection>, ConnectionOrigin)> {
        match uri.lookup_variant() {
            LookupVariant::Jndi => self.load_from_directory(uri).await,
            LookupVariant::Queue | LookupVariant::Topic => {
                let name = non_blank(uri.connection_name()).ok_or_else(|| {
                    Error::MissingParameter {
                        parameter: CONNECTION_NAME,
                        uri: uri.to_string(),
                    }
                })?;
                let connection =
                    self.host
                        .connection(name)
                        .ok_or_else(|| Error::ConnectionResolutionFailed {
                            uri: uri.to_string(),
                            reason: format!("no connection registered as {}", name),
                        })?;
                debug!(uri = %uri, connection = %name, "borrowed registered connection");
                Ok((connection, ConnectionOrigin::Registered))
            }
            LookupVariant::Other(variant) => Err(Error::UnsupportedLookupVariant {
                variant: variant.clone(),
                uri: uri.to_string(),
            }),
        }
    }

    async fn load_from_directory(
        &self,
        uri: &TransportUri,
    ) -> Result<(Arc<dyn Connection>, ConnectionOrigin)> {
        let factory_name = non_blank(uri.jndi_connection_factory_name()).ok_or_else(|| {
            Error::MissingParameter {
                parameter: JNDI_CONNECTION_FACTORY_NAME,
                uri: uri.to_string(),
            }
        })?;
        let name = match non_blank(uri.connection_name()) {
            Some(name) => name.to_string(),
            None => format!(
                "{}{}",
                ANONYMOUS_CONNECTION_PREFIX,
                self.anonymous.fetch_add(1, Ordering::SeqCst)
            ),
        };

        let directory_error = |source: MessagingError| Error::Directory {
            uri: uri.to_string(),
            source,
        };
        let directory = self
            .directories
            .open(&uri.directory_environment())
            .map_err(directory_error)?;
        let factory = match directory.lookup(factory_name).await.map_err(directory_error)? {
            DirectoryEntry::ConnectionFactory(factory) => factory,
            DirectoryEntry::Destination(_) => {
                return Err(directory_error(MessagingError::NotAConnectionFactory(
                    factory_name.to_string(),
                )))
            }
        };

        let connection_error = |source: MessagingError| Error::ConnectionFailed {
            uri: uri.to_string(),
            source,
        };
        let definition = self
            .host
            .create_connection_definition(&name, &uri.configuration(&self.base), factory)
            .map_err(connection_error)?;
        let connection = self
            .host
            .create_connection(&definition)
            .await
            .map_err(connection_error)?;
        if let Err(e) = self.host.register_connection(connection.clone(), definition) {
            if let Err(close) = connection.close().await {
                warn!(connection = %name, "failed to close unregistered connection: {}", close);
            }
            return Err(connection_error(e));
        }

        info!(uri = %uri, connection = %name, "created connection from directory factory");
        Ok((connection, ConnectionOrigin::Created))
    }
}

async fn release(uri: &TransportUri, entry: CachedConnection) {
    match entry.origin {
        ConnectionOrigin::Created => match entry.connection.close().await {
            Ok(()) => debug!(uri = %uri, connection = %entry.connection.name(), "closed cached connection"),
            Err(e) => warn!(
                uri = %uri,
                connection = %entry.connection.name(),
                "failed to close cached connection: {}", e
            ),
        },
        ConnectionOrigin::Registered => {
            debug!(uri = %uri, connection = %entry.connection.name(), "released borrowed connection")
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
