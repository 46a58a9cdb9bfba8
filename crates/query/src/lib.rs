//! Request cache for the catalog client.
//!
//! [`QueryCache`] de-duplicates and caches reads per [`CacheKey`], serving stale data while it
//! revalidates; [`Mutation`] runs writes and reports their outcome to hooks.

pub mod cache;
pub mod key;
pub mod mutation;

pub use cache::{
    CacheEntry, CacheOptions, FetchFn, FetchFuture, Query, QueryCache, QueryStatus, Subscription,
};
pub use key::{CacheKey, KeySegment};
pub use mutation::{Mutation, MutationHooks};
