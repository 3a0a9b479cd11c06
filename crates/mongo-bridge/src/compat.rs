//! Legacy query surface over the modern driver API
//!
//! Older callers pass a projection as a separate argument to `find` and
//! advance cursors with `next_object`. The driver folds projection into
//! `FindOptions` and advances cursors through `Stream`. This module bridges the
//! two in two ways:
//!
//! - wrapper types ([`CompatDatabase`], [`CompatCollection`], [`CompatCursor`])
//!   handed out by the resolver, and
//! - extension traits ([`LegacyCollectionExt`], [`LegacyCursorExt`]) giving any
//!   raw driver collection or cursor the same surface.
//!
//! The capability marker is process-wide: [`install`] flips it once and every
//! collection reports it through `legacy_patched()`.

use async_trait::async_trait;
use bson::Document;
use futures::TryStreamExt;
use mongo_bridge_common::Result;
use mongodb::options::FindOptions;
use mongodb::{Collection, Cursor, Database};
use serde::de::DeserializeOwned;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

static LEGACY_SURFACE_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Mark the legacy surface as installed for this process.
///
/// Returns `true` for the call that performed the installation; later calls
/// are no-ops and return `false`.
pub fn install() -> bool {
    let first = !LEGACY_SURFACE_INSTALLED.swap(true, Ordering::SeqCst);
    if first {
        debug!("Legacy query surface installed");
    }
    first
}

/// Whether [`install`] has run in this process
pub fn is_installed() -> bool {
    LEGACY_SURFACE_INSTALLED.load(Ordering::SeqCst)
}

/// Fold a legacy projection argument into modern find options.
///
/// No projection means no options at all, so the call is identical to a
/// plain `find(filter)`.
pub fn legacy_find_options(projection: Option<Document>) -> Option<FindOptions> {
    with_legacy_projection(None, projection)
}

/// Fold a legacy projection argument into existing find options.
///
/// Without a projection `options` pass through untouched; with one, the
/// projection lands in `options.projection`, creating the options if needed.
pub fn with_legacy_projection(
    options: Option<FindOptions>,
    projection: Option<Document>,
) -> Option<FindOptions> {
    match projection {
        None => options,
        Some(projection) => {
            let mut options = options.unwrap_or_default();
            options.projection = Some(projection);
            Some(options)
        }
    }
}

/// Legacy `find(query, projection)` on driver collections
#[async_trait]
pub trait LegacyCollectionExt<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    /// Run `find` with an optional projection passed as its own argument
    async fn find_with_projection(
        &self,
        filter: Document,
        projection: Option<Document>,
    ) -> Result<Cursor<T>> {
        self.find_with_projection_and_options(filter, projection, None)
            .await
    }

    /// Legacy `find` on top of other find options (sort, skip, limit, ...)
    async fn find_with_projection_and_options(
        &self,
        filter: Document,
        projection: Option<Document>,
        options: Option<FindOptions>,
    ) -> Result<Cursor<T>>;

    /// Capability marker: `true` once the legacy surface is installed
    fn legacy_patched(&self) -> bool {
        is_installed()
    }
}

#[async_trait]
impl<T> LegacyCollectionExt<T> for Collection<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    async fn find_with_projection_and_options(
        &self,
        filter: Document,
        projection: Option<Document>,
        options: Option<FindOptions>,
    ) -> Result<Cursor<T>> {
        let cursor = self
            .find(filter)
            .with_options(with_legacy_projection(options, projection))
            .await?;
        Ok(cursor)
    }
}

/// Legacy `nextObject` on driver cursors
#[async_trait]
pub trait LegacyCursorExt<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    /// Alias of the single-step advance: the next document, or `None` at the end
    async fn next_object(&mut self) -> Result<Option<T>>;
}

#[async_trait]
impl<T> LegacyCursorExt<T> for Cursor<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    async fn next_object(&mut self) -> Result<Option<T>> {
        Ok(self.try_next().await?)
    }
}

/// Database handle exposing legacy-compatible collections
#[derive(Debug, Clone)]
pub struct CompatDatabase {
    inner: Database,
}

impl CompatDatabase {
    pub fn new(inner: Database) -> Self {
        Self { inner }
    }

    /// Untyped collection with the legacy surface
    pub fn collection(&self, name: &str) -> CompatCollection<Document> {
        CompatCollection::new(self.inner.collection(name))
    }

    /// Typed collection with the legacy surface
    pub fn typed_collection<T: Send + Sync>(&self, name: &str) -> CompatCollection<T> {
        CompatCollection::new(self.inner.collection(name))
    }

    pub fn inner(&self) -> &Database {
        &self.inner
    }

    pub fn into_inner(self) -> Database {
        self.inner
    }
}

impl Deref for CompatDatabase {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.inner
    }
}

/// Collection exposing both the modern API (through `Deref`) and the legacy one
pub struct CompatCollection<T: Send + Sync> {
    inner: Collection<T>,
}

impl<T: Send + Sync> Clone for CompatCollection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync> std::fmt::Debug for CompatCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompatCollection")
            .field("namespace", &self.inner.namespace().to_string())
            .finish()
    }
}

impl<T: Send + Sync> CompatCollection<T> {
    pub fn new(inner: Collection<T>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }

    pub fn into_inner(self) -> Collection<T> {
        self.inner
    }

    /// Capability marker: `true` once the legacy surface is installed
    pub fn legacy_patched(&self) -> bool {
        is_installed()
    }
}

impl<T> CompatCollection<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    /// `find(filter)` with the projection passed as its own argument
    pub async fn find_with_projection(
        &self,
        filter: Document,
        projection: impl Into<Option<Document>> + Send,
    ) -> Result<CompatCursor<T>> {
        self.find_with_projection_and_options(filter, projection, None)
            .await
    }

    /// [`CompatCollection::find_with_projection`] on top of other find options
    pub async fn find_with_projection_and_options(
        &self,
        filter: Document,
        projection: impl Into<Option<Document>> + Send,
        options: Option<FindOptions>,
    ) -> Result<CompatCursor<T>> {
        let cursor = LegacyCollectionExt::find_with_projection_and_options(
            &self.inner,
            filter,
            projection.into(),
            options,
        )
        .await?;
        Ok(CompatCursor::new(cursor))
    }
}

impl<T: Send + Sync> Deref for CompatCollection<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Collection<T> {
        &self.inner
    }
}

/// Cursor with both the modern single-step advance and its legacy alias
pub struct CompatCursor<T> {
    inner: Cursor<T>,
}

impl<T> CompatCursor<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    pub fn new(inner: Cursor<T>) -> Self {
        Self { inner }
    }

    /// Advance one document
    pub async fn next(&mut self) -> Result<Option<T>> {
        Ok(self.inner.try_next().await?)
    }

    /// Legacy name for [`CompatCursor::next`]
    pub async fn next_object(&mut self) -> Result<Option<T>> {
        self.next().await
    }

    /// Drain the cursor into a vector (legacy `toArray`)
    pub async fn to_list(self) -> Result<Vec<T>> {
        Ok(self.inner.try_collect().await?)
    }

    pub fn into_inner(self) -> Cursor<T> {
        self.inner
    }
}

impl<T> Deref for CompatCursor<T> {
    type Target = Cursor<T>;

    fn deref(&self) -> &Cursor<T> {
        &self.inner
    }
}

impl<T> DerefMut for CompatCursor<T> {
    fn deref_mut(&mut self) -> &mut Cursor<T> {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use mongodb::Client;

    #[test]
    fn test_no_projection_means_no_options() {
        assert!(legacy_find_options(None).is_none());
    }

    #[test]
    fn test_projection_moves_into_options() {
        let options = legacy_find_options(Some(doc! { "slug": 1 })).unwrap();
        assert_eq!(options.projection, Some(doc! { "slug": 1 }));
        assert!(options.sort.is_none());
        assert!(options.limit.is_none());
    }

    #[test]
    fn test_empty_projection_is_still_passed_through() {
        let options = legacy_find_options(Some(Document::new())).unwrap();
        assert_eq!(options.projection, Some(Document::new()));
    }

    #[test]
    fn test_projection_joins_existing_options() {
        let mut base = FindOptions::default();
        base.limit = Some(5);
        base.sort = Some(doc! { "slug": 1 });

        let options = with_legacy_projection(Some(base), Some(doc! { "title": 1 })).unwrap();
        assert_eq!(options.projection, Some(doc! { "title": 1 }));
        assert_eq!(options.limit, Some(5));
        assert_eq!(options.sort, Some(doc! { "slug": 1 }));
    }

    #[test]
    fn test_missing_projection_leaves_options_untouched() {
        assert!(with_legacy_projection(None, None).is_none());

        let mut base = FindOptions::default();
        base.skip = Some(3);
        let options = with_legacy_projection(Some(base), None).unwrap();
        assert!(options.projection.is_none());
        assert_eq!(options.skip, Some(3));
    }

    #[test]
    fn test_install_is_idempotent() {
        install();
        assert!(is_installed());
        assert!(!install());
        assert!(is_installed());
    }

    #[tokio::test]
    async fn test_marker_visible_on_wrapped_and_raw_collections() {
        install();
        let client = Client::with_uri_str("mongodb://localhost:27017").await.unwrap();
        let db = CompatDatabase::new(client.database("testdb"));
        let wrapped = db.collection("docs");
        assert!(wrapped.legacy_patched());
        assert_eq!(wrapped.name(), "docs");

        let raw: Collection<Document> = client.database("testdb").collection("docs");
        assert!(raw.legacy_patched());
    }

    #[tokio::test]
    async fn test_database_wrapper_keeps_name() {
        let client = Client::with_uri_str("mongodb://localhost:27017").await.unwrap();
        let db = CompatDatabase::new(client.database("cms"));
        assert_eq!(db.name(), "cms");
        assert_eq!(db.clone().into_inner().name(), "cms");
        let typed: CompatCollection<Document> = db.typed_collection("pages");
        assert_eq!(typed.inner().namespace().coll, "pages");
    }
}
