//! Sequential result-set cursor shared by all items of one dispatch.
//!
//! A cursor is positioned on one result set at a time. Rows are pulled with
//! `next_row` until it yields `None`; `next_result` then moves to the next
//! result set in submission order.

use crate::{error::InternalError, value::Row};
use std::collections::VecDeque;

///
/// ResultCursor
///
/// Backend-provided handle over the result sets of one execution.
/// Object-safe so the batch can own it as `Box<dyn ResultCursor>`.
///

pub trait ResultCursor {
    /// Read the next row of the current result set.
    fn next_row(&mut self) -> Result<Option<Row>, InternalError>;

    /// Advance to the next result set. Returns `false` when none remain.
    fn next_result(&mut self) -> Result<bool, InternalError>;

    /// Release backend resources. Must tolerate repeated calls.
    fn close(&mut self);
}

impl<C: ResultCursor + ?Sized> ResultCursor for Box<C> {
    fn next_row(&mut self) -> Result<Option<Row>, InternalError> {
        (**self).next_row()
    }

    fn next_result(&mut self) -> Result<bool, InternalError> {
        (**self).next_result()
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// Drain the current result set and advance past it.
/// Returns the rows read; the cursor ends up on the following result set.
pub fn read_result_set(cursor: &mut dyn ResultCursor) -> Result<Vec<Row>, InternalError> {
    let mut rows = Vec::new();
    while let Some(row) = cursor.next_row()? {
        rows.push(row);
    }
    cursor.next_result()?;

    Ok(rows)
}

///
/// MemoryCursor
///
/// Cursor over result sets already held in memory.
///

#[derive(Clone, Debug, Default)]
pub struct MemoryCursor {
    current: VecDeque<Row>,
    remaining: VecDeque<Vec<Row>>,
    exhausted: bool,
    closed: bool,
}

impl MemoryCursor {
    #[must_use]
    pub fn new(result_sets: Vec<Vec<Row>>) -> Self {
        let mut remaining: VecDeque<Vec<Row>> = result_sets.into();
        let (current, exhausted) = match remaining.pop_front() {
            Some(first) => (first.into(), false),
            None => (VecDeque::new(), true),
        };

        Self {
            current,
            remaining,
            exhausted,
            closed: false,
        }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Result sets not yet reached, excluding the current one.
    #[must_use]
    pub fn remaining_result_sets(&self) -> usize {
        self.remaining.len()
    }
}

impl ResultCursor for MemoryCursor {
    fn next_row(&mut self) -> Result<Option<Row>, InternalError> {
        if self.closed {
            return Err(InternalError::cursor_invariant(
                "cursor read after close",
            ));
        }
        if self.exhausted {
            return Ok(None);
        }

        Ok(self.current.pop_front())
    }

    fn next_result(&mut self) -> Result<bool, InternalError> {
        if self.closed {
            return Err(InternalError::cursor_invariant(
                "cursor advanced after close",
            ));
        }

        match self.remaining.pop_front() {
            Some(next) => {
                self.current = next.into();
                Ok(true)
            }
            None => {
                self.current.clear();
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.current.clear();
        self.remaining.clear();
    }
}

///
/// ScopedCursor
///
/// Exclusive owner of one dispatch cursor. Closes the cursor on drop so every
/// exit path of the dispatch step releases it, including errors and panics.
///

pub(crate) struct ScopedCursor {
    inner: Box<dyn ResultCursor>,
}

impl ScopedCursor {
    pub(crate) fn new(inner: Box<dyn ResultCursor>) -> Self {
        Self { inner }
    }

    /// Lend the cursor to exactly one consumer for the duration of the call.
    pub(crate) fn as_dyn(&mut self) -> &mut dyn ResultCursor {
        self.inner.as_mut()
    }
}

impl Drop for ScopedCursor {
    fn drop(&mut self) {
        self.inner.close();
    }
}

///
/// AlignedCursor
///
/// Borrowed view of a dispatch cursor lent to one `process_results_set`
/// call. Records how the consumer advanced so the batch can check that
/// result sets line up 1:1 with submitted commands.
///

pub(crate) struct AlignedCursor<'c> {
    inner: &'c mut dyn ResultCursor,
    advances: usize,
    has_next: bool,
}

impl<'c> AlignedCursor<'c> {
    pub(crate) fn new(inner: &'c mut dyn ResultCursor) -> Self {
        Self {
            inner,
            advances: 0,
            has_next: false,
        }
    }

    /// Check the cursor after the result set of command `position` (1-based)
    /// out of `total` was consumed: exactly one advance, and another result
    /// set follows unless this was the last command.
    pub(crate) fn expect_aligned(
        &self,
        position: usize,
        total: usize,
    ) -> Result<(), InternalError> {
        if self.advances != 1 {
            return Err(InternalError::cursor_invariant(format!(
                "result set {position} of {total} was consumed with {} cursor advances",
                self.advances
            )));
        }

        match (self.has_next, position < total) {
            (true, true) | (false, false) => Ok(()),
            (false, true) => Err(InternalError::cursor_invariant(format!(
                "cursor ended after {position} result sets but {total} commands were submitted"
            ))),
            (true, false) => Err(InternalError::cursor_invariant(format!(
                "cursor yields more result sets than the {total} submitted commands"
            ))),
        }
    }
}

impl ResultCursor for AlignedCursor<'_> {
    fn next_row(&mut self) -> Result<Option<Row>, InternalError> {
        self.inner.next_row()
    }

    fn next_result(&mut self) -> Result<bool, InternalError> {
        let has_next = self.inner.next_result()?;
        self.advances += 1;
        self.has_next = has_next;

        Ok(has_next)
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use std::{cell::Cell, rc::Rc};

    #[test]
    fn read_result_set_stops_at_set_boundary() {
        let mut cursor = MemoryCursor::new(vec![
            vec![row![1_i64], row![2_i64]],
            vec![row![3_i64]],
        ]);

        let first = read_result_set(&mut cursor).expect("first set should read");
        assert_eq!(first, vec![row![1_i64], row![2_i64]]);
        assert_eq!(cursor.remaining_result_sets(), 0);

        let second = read_result_set(&mut cursor).expect("second set should read");
        assert_eq!(second, vec![row![3_i64]]);

        let past_end = read_result_set(&mut cursor).expect("reading past the end is empty");
        assert!(past_end.is_empty());
    }

    #[test]
    fn empty_result_set_is_a_boundary_not_the_end() {
        let mut cursor = MemoryCursor::new(vec![Vec::new(), vec![row!["b"]]]);

        assert!(read_result_set(&mut cursor).expect("empty set").is_empty());
        assert_eq!(
            read_result_set(&mut cursor).expect("second set"),
            vec![row!["b"]]
        );
    }

    #[test]
    fn closed_cursor_rejects_reads() {
        let mut cursor = MemoryCursor::new(vec![vec![row![1_i64]]]);
        cursor.close();
        cursor.close();

        let err = cursor.next_row().expect_err("read after close should fail");
        assert!(err.is_protocol_misuse());
        assert!(cursor.is_closed());
    }

    #[test]
    fn aligned_cursor_accepts_one_set_per_command() {
        let mut cursor = MemoryCursor::new(vec![vec![row![1_i64]], vec![row![2_i64]]]);

        let mut first = AlignedCursor::new(&mut cursor);
        read_result_set(&mut first).expect("first set");
        first.expect_aligned(1, 2).expect("another set follows");

        let mut second = AlignedCursor::new(&mut cursor);
        read_result_set(&mut second).expect("second set");
        second.expect_aligned(2, 2).expect("last set ends the cursor");
    }

    #[test]
    fn aligned_cursor_rejects_missing_sets() {
        let mut cursor = MemoryCursor::new(vec![vec![row![1_i64]]]);

        let mut aligned = AlignedCursor::new(&mut cursor);
        read_result_set(&mut aligned).expect("only set");
        let err = aligned.expect_aligned(1, 2).expect_err("second set missing");

        assert!(err.is_protocol_misuse());
        assert_eq!(err.origin, crate::error::ErrorOrigin::Cursor);
    }

    #[test]
    fn aligned_cursor_rejects_trailing_sets() {
        let mut cursor = MemoryCursor::new(vec![vec![row![1_i64]], Vec::new()]);

        let mut aligned = AlignedCursor::new(&mut cursor);
        read_result_set(&mut aligned).expect("first set");
        let err = aligned.expect_aligned(1, 1).expect_err("extra set");

        assert!(err.is_protocol_misuse());
    }

    #[test]
    fn aligned_cursor_rejects_consumers_that_skip_sets() {
        let mut cursor = MemoryCursor::new(vec![Vec::new(), Vec::new(), Vec::new()]);

        let mut aligned = AlignedCursor::new(&mut cursor);
        read_result_set(&mut aligned).expect("first set");
        read_result_set(&mut aligned).expect("second set");
        let err = aligned.expect_aligned(1, 3).expect_err("two advances");

        assert!(err.is_protocol_misuse());
    }

    struct CloseCounter {
        closes: Rc<Cell<u32>>,
    }

    impl ResultCursor for CloseCounter {
        fn next_row(&mut self) -> Result<Option<Row>, InternalError> {
            Err(InternalError::cursor_execution("connection reset"))
        }

        fn next_result(&mut self) -> Result<bool, InternalError> {
            Ok(false)
        }

        fn close(&mut self) {
            self.closes.set(self.closes.get() + 1);
        }
    }

    #[test]
    fn scoped_cursor_closes_on_error_exit() {
        let closes = Rc::new(Cell::new(0));

        let result = (|| {
            let mut scoped = ScopedCursor::new(Box::new(CloseCounter {
                closes: Rc::clone(&closes),
            }));
            read_result_set(scoped.as_dyn())
        })();

        assert!(result.is_err());
        assert_eq!(closes.get(), 1);
    }
}
