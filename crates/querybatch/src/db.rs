use crate::error::Error;
use querybatch_core as core;
use querybatch_core::{
    config::BatchConfig,
    db::{BatchItem, BatchReport, BatchState, ItemHandle, Session, TypedBatchItem},
    obs::MetricsSink,
};

///
/// Batch
///
/// Public facade over the core query batch.
/// Wraps `querybatch_core::db::QueryBatch` and converts core errors into
/// `querybatch::Error`.
///

#[derive(Debug)]
pub struct Batch<'s> {
    inner: core::db::QueryBatch<'s>,
}

impl<'s> Batch<'s> {
    // ------------------------------------------------------------------
    // Batch configuration
    // ------------------------------------------------------------------

    /// Create an empty batch bound to `session` with the default config.
    #[must_use]
    pub fn new(session: &'s dyn Session) -> Self {
        Self {
            inner: core::db::QueryBatch::new(session),
        }
    }

    /// Create an empty batch configured from a TOML document.
    pub fn from_toml(session: &'s dyn Session, config: &str) -> Result<Self, Error> {
        let config = BatchConfig::from_toml_str(config)?;

        Ok(Self::new(session).with_config(config))
    }

    #[must_use]
    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.inner = self.inner.with_config(config);
        self
    }

    /// Override the metrics sink for this batch's execution.
    #[must_use]
    pub fn metrics_sink(mut self, sink: &'static dyn MetricsSink) -> Self {
        self.inner = self.inner.metrics_sink(sink);
        self
    }

    #[must_use]
    pub const fn state(&self) -> BatchState {
        self.inner.state()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    // ------------------------------------------------------------------
    // Collection and execution
    // ------------------------------------------------------------------

    pub fn add<I>(&mut self, item: I) -> Result<ItemHandle<I>, Error>
    where
        I: BatchItem + 'static,
    {
        Ok(self.inner.add(item)?)
    }

    pub fn add_keyed<I>(&mut self, key: impl Into<String>, item: I) -> Result<ItemHandle<I>, Error>
    where
        I: BatchItem + 'static,
    {
        Ok(self.inner.add_keyed(key, item)?)
    }

    pub fn execute(&mut self) -> Result<BatchReport, Error> {
        Ok(self.inner.execute()?)
    }

    // ------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------

    pub fn results<I>(&self, handle: &ItemHandle<I>) -> Result<&[I::Output], Error>
    where
        I: TypedBatchItem + 'static,
    {
        Ok(self.inner.results(handle)?)
    }

    pub fn results_by_key<I>(&self, key: &str) -> Result<&[I::Output], Error>
    where
        I: TypedBatchItem + 'static,
    {
        Ok(self.inner.results_by_key::<I>(key)?)
    }

    pub fn take_results<I>(&mut self, handle: ItemHandle<I>) -> Result<Vec<I::Output>, Error>
    where
        I: TypedBatchItem + 'static,
    {
        Ok(self.inner.take_results(handle)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ErrorOrigin};
    use querybatch_core::{
        db::{
            CacheStore, CommandProvider, MemoryCacheStore, MemoryCursor, QueryItem, ResultCursor,
            SqlCommand,
        },
        error::InternalError,
        row,
        value::Row,
    };
    use std::{collections::BTreeSet, time::Duration};

    ///
    /// EchoProvider
    ///
    /// Answers every command with one row holding its SQL text.
    ///

    struct EchoProvider;

    impl CommandProvider for EchoProvider {
        fn supports_batching(&self) -> bool {
            true
        }

        fn execute_batch(
            &self,
            commands: &[SqlCommand],
            _timeout: Option<Duration>,
        ) -> Result<Box<dyn ResultCursor>, InternalError> {
            let sets = commands.iter().map(|c| vec![row![c.sql()]]).collect();

            Ok(Box::new(MemoryCursor::new(sets)))
        }

        fn execute(
            &self,
            command: &SqlCommand,
            timeout: Option<Duration>,
        ) -> Result<Box<dyn ResultCursor>, InternalError> {
            self.execute_batch(std::slice::from_ref(command), timeout)
        }
    }

    struct EchoSession {
        provider: EchoProvider,
        cache: MemoryCacheStore,
    }

    impl Session for EchoSession {
        fn auto_flush(&self, _query_spaces: &BTreeSet<String>) -> Result<bool, InternalError> {
            Ok(false)
        }

        fn cache_store(&self) -> Option<&dyn CacheStore> {
            Some(&self.cache)
        }

        fn provider(&self) -> &dyn CommandProvider {
            &self.provider
        }

        fn timestamp(&self) -> u64 {
            1
        }
    }

    fn session() -> EchoSession {
        EchoSession {
            provider: EchoProvider,
            cache: MemoryCacheStore::new(),
        }
    }

    #[test]
    fn batch_runs_and_returns_typed_results() {
        let session = session();
        let mut batch = Batch::from_toml(&session, "minimal_puts = true").expect("config");
        let users = batch
            .add(QueryItem::rows(vec![SqlCommand::new("select users")]))
            .expect("add users");
        batch
            .add_keyed(
                "orders",
                QueryItem::rows(vec![SqlCommand::new("select orders")]).cacheable("orders"),
            )
            .expect("add orders");

        let report = batch.execute().expect("batch should execute");

        assert_eq!(report.round_trips, 1);
        assert_eq!(
            batch.results(&users).expect("users"),
            &[row!["select users"]]
        );
        assert_eq!(
            batch
                .results_by_key::<QueryItem<Row>>("orders")
                .expect("orders"),
            &[row!["select orders"]]
        );
        assert_eq!(session.cache.len(), 1);
    }

    #[test]
    fn core_errors_are_converted() {
        let session = session();
        let mut batch = Batch::new(&session);
        batch.execute().expect("empty batch executes");

        let err = batch.execute().expect_err("second execute must fail");
        assert!(err.is_misuse());
        assert_eq!(err.origin, ErrorOrigin::Batch);

        let err = batch
            .results_by_key::<QueryItem<Row>>("missing")
            .expect_err("unknown key");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let session = session();
        let err = Batch::from_toml(&session, "auto_flush = 3").expect_err("bad type");

        assert_eq!(err.kind, ErrorKind::Unsupported);
        assert_eq!(err.origin, ErrorOrigin::Config);
    }
}
