use crate::{
    db::{
        batch::item::{AfterLoadCallback, BatchItem, TypedBatchItem},
        cache::{CacheMode, CachingInformation},
        command::SqlCommand,
        cursor::{ResultCursor, read_result_set},
        session::Session,
    },
    error::InternalError,
    value::Row,
};
use std::{collections::BTreeSet, fmt};

/// Deferred translation run by `init`.
type CommandSource = Box<dyn FnOnce(&dyn Session) -> Result<Vec<SqlCommand>, InternalError>>;

///
/// RowMapper
///
/// Materializes one raw row into a typed result element.
///

pub trait RowMapper<T> {
    fn map_row(&self, row: &Row) -> Result<T, InternalError>;
}

impl<T, F> RowMapper<T> for F
where
    F: Fn(&Row) -> Result<T, InternalError>,
{
    fn map_row(&self, row: &Row) -> Result<T, InternalError> {
        self(row)
    }
}

///
/// ItemPhase
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ItemPhase {
    Created,
    Initialized,
    Finalized,
    Consumed,
}

///
/// CommandSlot
///
/// Per-command accumulator. Order matches the item's command list.
///

#[derive(Debug)]
enum CommandSlot {
    Pending,
    Cached(Vec<Row>),
    Fetched(Vec<Row>),
}

///
/// CacheSettings
///

#[derive(Clone, Debug)]
struct CacheSettings {
    region: String,
    mode: CacheMode,
}

///
/// QueryItem
///
/// General-purpose batch item over a list of translated commands. Rows of all
/// commands are concatenated in command order and mapped through a
/// `RowMapper` to produce the typed results.
///

pub struct QueryItem<T> {
    label: String,
    source: Option<CommandSource>,
    commands: Vec<SqlCommand>,
    query_spaces: BTreeSet<String>,
    cache: Option<CacheSettings>,
    caching_information: Vec<CachingInformation>,
    slots: Vec<CommandSlot>,
    mapper: Box<dyn RowMapper<T>>,
    after_load: Option<AfterLoadCallback<T>>,
    results: Option<Vec<T>>,
    phase: ItemPhase,
}

impl QueryItem<Row> {
    /// Item whose results are the raw rows.
    #[must_use]
    pub fn rows(commands: Vec<SqlCommand>) -> Self {
        Self::new(commands, |row: &Row| Ok::<_, InternalError>(row.clone()))
    }
}

impl<T> QueryItem<T> {
    pub fn new(commands: Vec<SqlCommand>, mapper: impl RowMapper<T> + 'static) -> Self {
        Self {
            label: "query".to_string(),
            source: None,
            commands,
            query_spaces: BTreeSet::new(),
            cache: None,
            caching_information: Vec::new(),
            slots: Vec::new(),
            mapper: Box::new(mapper),
            after_load: None,
            results: None,
            phase: ItemPhase::Created,
        }
    }

    /// Item whose commands are produced by `source` during `init`.
    pub fn deferred(
        source: impl FnOnce(&dyn Session) -> Result<Vec<SqlCommand>, InternalError> + 'static,
        mapper: impl RowMapper<T> + 'static,
    ) -> Self {
        let mut item = Self::new(Vec::new(), mapper);
        item.source = Some(Box::new(source));
        item
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_query_spaces<S: Into<String>>(
        mut self,
        spaces: impl IntoIterator<Item = S>,
    ) -> Self {
        self.query_spaces.extend(spaces.into_iter().map(Into::into));
        self
    }

    /// Cache every command of this item in `region` with `CacheMode::Normal`.
    #[must_use]
    pub fn cacheable(self, region: impl Into<String>) -> Self {
        self.cacheable_with_mode(region, CacheMode::Normal)
    }

    #[must_use]
    pub fn cacheable_with_mode(mut self, region: impl Into<String>, mode: CacheMode) -> Self {
        self.cache = Some(CacheSettings {
            region: region.into(),
            mode,
        });
        self
    }

    #[must_use]
    pub fn after_load(mut self, callback: impl FnOnce(&[T]) + 'static) -> Self {
        self.after_load = Some(Box::new(callback));
        self
    }

    /// Number of physical commands, cached or not. Zero before `init` for
    /// deferred items.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    fn expect_phase(&self, expected: ItemPhase, operation: &str) -> Result<(), InternalError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(InternalError::item_invariant(format!(
                "{operation} on item '{}' requires phase {expected:?}, found {:?}",
                self.label, self.phase
            )))
        }
    }

    fn next_pending_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, CommandSlot::Pending))
    }
}

impl<T> BatchItem for QueryItem<T> {
    fn init(&mut self, session: &dyn Session) -> Result<(), InternalError> {
        self.expect_phase(ItemPhase::Created, "init")?;

        if let Some(source) = self.source.take() {
            self.commands = source(session)?;
        }

        self.caching_information = match &self.cache {
            Some(settings) if settings.mode != CacheMode::Ignore => self
                .commands
                .iter()
                .map(|command| {
                    CachingInformation::for_command(
                        &settings.region,
                        command,
                        self.query_spaces.clone(),
                        settings.mode,
                    )
                })
                .collect(),
            _ => Vec::new(),
        };
        self.slots = self.commands.iter().map(|_| CommandSlot::Pending).collect();
        self.phase = ItemPhase::Initialized;

        Ok(())
    }

    fn query_spaces(&self) -> &BTreeSet<String> {
        &self.query_spaces
    }

    fn caching_information(&self) -> &[CachingInformation] {
        &self.caching_information
    }

    fn apply_cache_hit(&mut self, index: usize, rows: Vec<Row>) -> Result<(), InternalError> {
        self.expect_phase(ItemPhase::Initialized, "apply_cache_hit")?;

        let command_count = self.slots.len();
        match self.slots.get_mut(index) {
            Some(slot) if matches!(slot, CommandSlot::Pending) => {
                *slot = CommandSlot::Cached(rows);
                Ok(())
            }
            Some(_) => Err(InternalError::item_invariant(format!(
                "command {index} of item '{}' already has results",
                self.label
            ))),
            None => Err(InternalError::item_invariant(format!(
                "cache hit for command {index} but item '{}' has {command_count} commands",
                self.label
            ))),
        }
    }

    fn commands(&self) -> Vec<SqlCommand> {
        self.commands
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| matches!(slot, CommandSlot::Pending))
            .map(|(command, _)| command.clone())
            .collect()
    }

    fn process_results_set(
        &mut self,
        cursor: &mut dyn ResultCursor,
    ) -> Result<usize, InternalError> {
        self.expect_phase(ItemPhase::Initialized, "process_results_set")?;

        let Some(index) = self.next_pending_slot() else {
            return Err(InternalError::item_invariant(format!(
                "item '{}' has no pending command for this result set",
                self.label
            )));
        };
        let rows = read_result_set(cursor)?;
        let count = rows.len();
        self.slots[index] = CommandSlot::Fetched(rows);

        Ok(count)
    }

    fn process_results(&mut self) -> Result<(), InternalError> {
        self.expect_phase(ItemPhase::Initialized, "process_results")?;

        if let Some(index) = self.next_pending_slot() {
            return Err(InternalError::item_invariant(format!(
                "item '{}' finalized before the result set of command {index} was processed",
                self.label
            )));
        }

        let mut results = Vec::new();
        for slot in &self.slots {
            let (CommandSlot::Cached(rows) | CommandSlot::Fetched(rows)) = slot else {
                continue;
            };
            for row in rows {
                results.push(self.mapper.map_row(row)?);
            }
        }

        self.phase = ItemPhase::Finalized;
        let results = self.results.insert(results);
        if let Some(callback) = self.after_load.take() {
            callback(results.as_slice());
        }

        Ok(())
    }

    fn results_to_cache(&self) -> Vec<(usize, Vec<Row>)> {
        self.slots
            .iter()
            .zip(&self.caching_information)
            .enumerate()
            .filter_map(|(index, (slot, info))| match slot {
                CommandSlot::Fetched(rows) if info.can_put_to_cache() => {
                    Some((index, rows.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl<T> TypedBatchItem for QueryItem<T> {
    type Output = T;

    fn results(&self) -> Result<&[T], InternalError> {
        match (&self.results, self.phase) {
            (Some(results), ItemPhase::Finalized) => Ok(results),
            (_, ItemPhase::Consumed) => Err(InternalError::item_invariant(format!(
                "results of item '{}' were already taken",
                self.label
            ))),
            _ => Err(InternalError::item_invariant(format!(
                "results of item '{}' requested before process_results",
                self.label
            ))),
        }
    }

    fn take_results(&mut self) -> Result<Vec<T>, InternalError> {
        self.results()?;
        self.phase = ItemPhase::Consumed;

        Ok(self.results.take().unwrap_or_default())
    }

    fn set_after_load_callback(&mut self, callback: AfterLoadCallback<T>) {
        self.after_load = Some(callback);
    }
}

impl<T> fmt::Debug for QueryItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryItem")
            .field("label", &self.label)
            .field("commands", &self.commands)
            .field("query_spaces", &self.query_spaces)
            .field("cache", &self.cache)
            .field("slots", &self.slots)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
