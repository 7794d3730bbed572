//! Cache key definitions.
//!
//! Every key lives in a [`Namespace`] and renders as `"<namespace>:<rest>"`, so
//! invalidation can target one record, one namespace, or an arbitrary prefix.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Data domains sharing the cache, each with its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Specialization listings and individual records.
    Specializations,
    /// Aggregated workload statistics.
    Workload,
    /// Help-center FAQ catalog.
    Faqs,
    /// Ticket/help categories.
    Categories,
    /// Ticket listings touched by bulk operations.
    Tickets,
}

impl Namespace {
    pub const ALL: [Namespace; 5] = [
        Namespace::Specializations,
        Namespace::Workload,
        Namespace::Faqs,
        Namespace::Categories,
        Namespace::Tickets,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Specializations => "specializations",
            Namespace::Workload => "workload",
            Namespace::Faqs => "help:faqs",
            Namespace::Categories => "help:categories",
            Namespace::Tickets => "tickets",
        }
    }

    /// Pattern matching every key in this namespace.
    pub fn pattern(self) -> KeyPattern {
        KeyPattern::Prefix(format!("{}:", self.prefix()))
    }

    /// Resolve the namespace owning a rendered key.
    pub fn of_key(key: &str) -> Option<Namespace> {
        Namespace::ALL.into_iter().find(|ns| {
            key.strip_prefix(ns.prefix())
                .is_some_and(|rest| rest.starts_with(':'))
        })
    }
}

/// A fully-qualified cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    rendered: String,
}

impl CacheKey {
    pub fn new(namespace: Namespace, rest: impl fmt::Display) -> Self {
        Self {
            namespace,
            rendered: format!("{}:{rest}", namespace.prefix()),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// A specialization listing for one set of filter parameters.
    pub fn specialization_list<F: Hash>(filter: &F) -> Self {
        Self::new(
            Namespace::Specializations,
            format_args!("list:{:016x}", hash_value(filter)),
        )
    }

    pub fn specialization(id: i64) -> Self {
        Self::new(Namespace::Specializations, format_args!("record:{id}"))
    }

    pub fn workload_stats<F: Hash>(filter: &F) -> Self {
        Self::new(
            Namespace::Workload,
            format_args!("stats:{:016x}", hash_value(filter)),
        )
    }

    pub fn faqs(category_id: Option<i64>) -> Self {
        match category_id {
            Some(id) => Self::new(Namespace::Faqs, format_args!("category:{id}")),
            None => Self::new(Namespace::Faqs, "all"),
        }
    }

    pub fn categories() -> Self {
        Self::new(Namespace::Categories, "all")
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Selects keys for invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPattern {
    Exact(String),
    Prefix(String),
}

impl KeyPattern {
    /// A trailing `*` selects by prefix; anything else is an exact key.
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => KeyPattern::Prefix(prefix.to_string()),
            None => KeyPattern::Exact(pattern.to_string()),
        }
    }

    /// Every cached specialization listing, whatever its filter.
    pub fn specialization_lists() -> Self {
        KeyPattern::Prefix(format!("{}:list:", Namespace::Specializations.prefix()))
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Exact(exact) => key == exact,
            KeyPattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
        }
    }
}

impl From<&CacheKey> for KeyPattern {
    fn from(key: &CacheKey) -> Self {
        KeyPattern::Exact(key.as_str().to_string())
    }
}

impl From<&str> for KeyPattern {
    fn from(pattern: &str) -> Self {
        KeyPattern::parse(pattern)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::Exact(exact) => f.write_str(exact),
            KeyPattern::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
