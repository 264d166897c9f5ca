use crate::db::{cache::CacheKey, command::SqlCommand};
use serde::Deserialize;
use std::collections::BTreeSet;

///
/// CacheMode
///
/// How one query interacts with the result cache.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Neither read from nor write to the cache.
    Ignore,
    /// Read only.
    Get,
    /// Write only.
    Put,
    /// Read, then write on miss.
    #[default]
    Normal,
    /// Never read; always overwrite with fresh rows.
    Refresh,
}

impl CacheMode {
    #[must_use]
    pub const fn can_get(self) -> bool {
        matches!(self, Self::Get | Self::Normal)
    }

    #[must_use]
    pub const fn can_put(self) -> bool {
        matches!(self, Self::Put | Self::Normal | Self::Refresh)
    }
}

///
/// StorePolicy
///
/// Write-back policy handed to the cache store with fetched rows.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StorePolicy {
    pub mode: CacheMode,

    /// Skip the write when the key already holds a fresh entry.
    pub minimal_puts: bool,
}

///
/// CachingInformation
///
/// Cache descriptor for one physical command of a query item. An item yields
/// either none of these or one per command, in command order.
///

#[derive(Clone, Debug)]
pub struct CachingInformation {
    key: CacheKey,
    query_spaces: BTreeSet<String>,
    mode: CacheMode,
}

impl CachingInformation {
    #[must_use]
    pub const fn new(key: CacheKey, query_spaces: BTreeSet<String>, mode: CacheMode) -> Self {
        Self {
            key,
            query_spaces,
            mode,
        }
    }

    /// Describe one command cached under `region`.
    #[must_use]
    pub fn for_command(
        region: &str,
        command: &SqlCommand,
        query_spaces: BTreeSet<String>,
        mode: CacheMode,
    ) -> Self {
        Self::new(CacheKey::for_command(region, command), query_spaces, mode)
    }

    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Spaces whose update timestamps decide whether a cached entry is stale.
    #[must_use]
    pub const fn query_spaces(&self) -> &BTreeSet<String> {
        &self.query_spaces
    }

    #[must_use]
    pub const fn mode(&self) -> CacheMode {
        self.mode
    }

    #[must_use]
    pub const fn can_get_from_cache(&self) -> bool {
        self.mode.can_get()
    }

    #[must_use]
    pub const fn can_put_to_cache(&self) -> bool {
        self.mode.can_put()
    }

    #[must_use]
    pub const fn store_policy(&self, minimal_puts: bool) -> StorePolicy {
        StorePolicy {
            mode: self.mode,
            minimal_puts,
        }
    }
}
