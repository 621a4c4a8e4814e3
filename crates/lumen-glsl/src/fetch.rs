//! Retrieval of fragments that are not registered yet.
//!
//! [`SourceRegistry::fetch`] drives a [`FetchPlan`] in breadth-first rounds:
//! every URI pending in a round is requested concurrently, the round is
//! awaited as a whole, and the includes found in its results seed the next
//! round. A URI is marked visited as soon as it is queued, so diamond-shaped
//! include graphs fetch each fragment once.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use futures::future::{join_all, LocalBoxFuture, Shared};
use futures::FutureExt;

use crate::error::SourceError;
use crate::include::direct_includes;
use crate::registry::SourceRegistry;

/// Pending retrieval of one fragment's text.
pub type FetchFuture = LocalBoxFuture<'static, Result<String, SourceError>>;

/// External source of fragment text (network, disk, an editor buffer...).
pub trait SourceFetcher {
    fn fetch(&self, uri: &str) -> FetchFuture;
}

// ── memoization ───────────────────────────────────────────────────────────

/// Shares one retrieval per URI between all callers, in flight or finished.
///
/// Failures are cached as well; call [`MemoizedFetcher::forget`] to allow a
/// URI to be requested again.
pub struct MemoizedFetcher<F> {
    inner: F,
    cache: RefCell<HashMap<String, Shared<FetchFuture>>>,
}

impl<F: SourceFetcher> MemoizedFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self { inner, cache: RefCell::new(HashMap::new()) }
    }

    pub fn forget(&self, uri: &str) {
        self.cache.borrow_mut().remove(uri);
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: SourceFetcher> SourceFetcher for MemoizedFetcher<F> {
    fn fetch(&self, uri: &str) -> FetchFuture {
        let shared = self
            .cache
            .borrow_mut()
            .entry(uri.to_owned())
            .or_insert_with(|| self.inner.fetch(uri).shared())
            .clone();
        shared.boxed_local()
    }
}

// ── disk ──────────────────────────────────────────────────────────────────

/// Reads fragments from files under `root`; the URI is the relative path.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceFetcher for FileFetcher {
    fn fetch(&self, uri: &str) -> FetchFuture {
        let path = self.root.join(uri);
        let result = std::fs::read_to_string(&path).map_err(|e| SourceError::Fetch {
            uri: uri.to_owned(),
            message: format!("{}: {e}", path.display()),
        });
        futures::future::ready(result).boxed_local()
    }
}

// ── worklist ──────────────────────────────────────────────────────────────

/// Breadth-first worklist for fetching a set of URIs and their includes.
#[derive(Debug, Default)]
pub struct FetchPlan {
    pending: Vec<String>,
    visited: HashSet<String>,
}

impl FetchPlan {
    /// Queues every URI of `uris` that `registry` does not already hold.
    pub fn new<I, S>(registry: &SourceRegistry, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut plan = FetchPlan::default();
        for uri in uris {
            plan.enqueue(registry, uri.as_ref());
        }
        plan
    }

    fn enqueue(&mut self, registry: &SourceRegistry, uri: &str) {
        if registry.has(uri) || !self.visited.insert(uri.to_owned()) {
            return;
        }
        self.pending.push(uri.to_owned());
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    /// Takes the URIs to request in the next round.
    pub fn next_round(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }

    /// Registers a finished round and queues the includes it references.
    pub fn complete(
        &mut self,
        registry: &mut SourceRegistry,
        fetched: Vec<(String, String)>,
    ) -> Result<(), SourceError> {
        for (uri, text) in fetched {
            let deps = direct_includes(&text);
            registry.add(uri, text)?;
            for dep in &deps {
                self.enqueue(registry, dep);
            }
        }
        Ok(())
    }
}

impl SourceRegistry {
    /// Fetches every unregistered URI of `uris` and, transitively, whatever
    /// they include.
    ///
    /// If any request of a round fails, nothing from that round is
    /// registered; fragments from earlier rounds stay registered.
    pub async fn fetch<F, I, S>(&mut self, fetcher: &F, uris: I) -> Result<(), SourceError>
    where
        F: SourceFetcher + ?Sized,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut plan = FetchPlan::new(self, uris);
        let mut round = 0usize;
        while !plan.is_done() {
            let batch = plan.next_round();
            round += 1;
            log::debug!("fetch round {round}: {batch:?}");

            let results = join_all(batch.iter().map(|uri| fetcher.fetch(uri))).await;
            let fetched = batch
                .into_iter()
                .zip(results)
                .map(|(uri, result)| result.map(|text| (uri, text)))
                .collect::<Result<Vec<_>, _>>()?;

            plan.complete(self, fetched)?;
        }
        Ok(())
    }
}
