use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::error::SourceError;
use crate::include::direct_includes;

/// One registered shader fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFragment {
    text: String,
    /// URIs named by the fragment's `#include` lines.
    deps: BTreeSet<String>,
}

impl SourceFragment {
    fn new(text: String) -> Self {
        let deps = direct_includes(&text);
        Self { text, deps }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn direct_deps(&self) -> &BTreeSet<String> {
        &self.deps
    }
}

/// Shader fragment text keyed by URI.
///
/// Owned by whoever compiles shaders (an engine context or a tool) and passed
/// by reference to the code that needs it. There is no global registry.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    fragments: HashMap<String, SourceFragment>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `contents` under `uri`.
    ///
    /// Registering the same text twice is a no-op; registering different
    /// text under an existing URI fails with [`SourceError::Conflict`].
    pub fn add(&mut self, uri: impl Into<String>, contents: impl Into<String>) -> Result<(), SourceError> {
        let uri = uri.into();
        let contents = contents.into();
        match self.fragments.get(&uri) {
            Some(existing) if existing.text == contents => Ok(()),
            Some(_) => Err(SourceError::Conflict { uri }),
            None => {
                self.fragments.insert(uri, SourceFragment::new(contents));
                Ok(())
            }
        }
    }

    /// Registers every `(uri, contents)` pair, stopping at the first conflict.
    pub fn add_many<I, K, V>(&mut self, sources: I) -> Result<(), SourceError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (uri, contents) in sources {
            self.add(uri, contents)?;
        }
        Ok(())
    }

    /// Swaps in new text for an already registered URI (live-edit path).
    ///
    /// Recompiling whatever depends on `uri` is the caller's job.
    pub fn replace(&mut self, uri: &str, contents: impl Into<String>) -> Result<(), SourceError> {
        let fragment = self
            .fragments
            .get_mut(uri)
            .ok_or_else(|| SourceError::not_found(uri))?;
        *fragment = SourceFragment::new(contents.into());
        Ok(())
    }

    pub fn has(&self, uri: &str) -> bool {
        self.fragments.contains_key(uri)
    }

    pub fn get(&self, uri: &str) -> Result<&str, SourceError> {
        self.fragment(uri).map(SourceFragment::text)
    }

    pub fn fragment(&self, uri: &str) -> Result<&SourceFragment, SourceError> {
        self.fragments.get(uri).ok_or_else(|| SourceError::not_found(uri))
    }

    /// All registered URIs, sorted.
    pub fn uris(&self) -> Vec<&str> {
        let mut uris: Vec<&str> = self.fragments.keys().map(String::as_str).collect();
        uris.sort_unstable();
        uris
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn direct_deps(&self, uri: &str) -> Result<BTreeSet<String>, SourceError> {
        Ok(self.fragment(uri)?.deps.clone())
    }

    /// Breadth-first closure over `#include`s, starting at (and including) `uri`.
    ///
    /// Recomputed on every call. Fails if any fragment reached is not registered.
    pub fn transitive_deps(&self, uri: &str) -> Result<BTreeSet<String>, SourceError> {
        let mut closure = BTreeSet::new();
        let mut pending = VecDeque::from([uri.to_owned()]);
        while let Some(next) = pending.pop_front() {
            if !closure.insert(next.clone()) {
                continue;
            }
            for dep in &self.fragment(&next)?.deps {
                if !closure.contains(dep) {
                    pending.push_back(dep.clone());
                }
            }
        }
        Ok(closure)
    }
}
