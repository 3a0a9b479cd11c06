//! Query builder for legacy-style find operations

use bson::Document as BsonDocument;
use mongo_bridge_common::Result;
use mongodb::options::FindOptions;

use crate::compat::{with_legacy_projection, CompatDatabase};

/// Builder for a `find` whose projection travels as its own argument
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    collection_name: String,
    filter: BsonDocument,
    projection: Option<BsonDocument>,
    sort: Option<BsonDocument>,
    skip: Option<u64>,
    limit: Option<i64>,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new(collection_name: impl Into<String>) -> Self {
        Self {
            collection_name: collection_name.into(),
            filter: BsonDocument::new(),
            projection: None,
            sort: None,
            skip: None,
            limit: None,
        }
    }

    /// Set the filter document
    pub fn filter(mut self, filter: BsonDocument) -> Self {
        self.filter = filter;
        self
    }

    /// Set the projection document
    pub fn projection(mut self, projection: BsonDocument) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Set the sort order
    pub fn sort(mut self, sort: BsonDocument) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Set the number of documents to skip
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Set the maximum number of documents to return
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn get_filter(&self) -> &BsonDocument {
        &self.filter
    }

    pub fn get_projection(&self) -> Option<&BsonDocument> {
        self.projection.as_ref()
    }

    pub fn get_sort(&self) -> Option<&BsonDocument> {
        self.sort.as_ref()
    }

    pub fn get_skip(&self) -> Option<u64> {
        self.skip
    }

    pub fn get_limit(&self) -> Option<i64> {
        self.limit
    }

    /// Sort, skip and limit as driver options; `None` when none is set
    fn base_options(&self) -> Option<FindOptions> {
        if self.sort.is_none() && self.skip.is_none() && self.limit.is_none() {
            return None;
        }
        let mut options = FindOptions::default();
        options.sort = self.sort.clone();
        options.skip = self.skip;
        options.limit = self.limit;
        Some(options)
    }

    /// Driver options this query runs with, projection folded in the legacy way
    pub fn find_options(&self) -> Option<FindOptions> {
        with_legacy_projection(self.base_options(), self.projection.clone())
    }

    /// Execute the query through the legacy projection path
    pub async fn to_list(self, db: &CompatDatabase) -> Result<Vec<BsonDocument>> {
        let options = self.base_options();
        let collection = db.collection(&self.collection_name);

        let cursor = collection
            .find_with_projection_and_options(self.filter, self.projection, options)
            .await?;
        cursor.to_list().await
    }
}
