use crate::value::Value;
use std::fmt;

///
/// SqlCommand
///
/// One physical, already-translated SQL command with its positional
/// parameters. Produced by the translation layer; the batch only moves it
/// around and hands it to the command provider.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SqlCommand {
    sql: String,
    params: Vec<Value>,
}

impl SqlCommand {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: impl IntoIterator<Item = Value>) -> Self {
        self.params.extend(params);
        self
    }

    #[must_use]
    pub fn bind(mut self, param: impl Into<Value>) -> Self {
        self.params.push(param.into());
        self
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

impl fmt::Display for SqlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} params]", self.sql, self.params.len())
    }
}

///
/// CommandSet
///
/// Combined command list submitted as one unit, together with the per-item
/// command counts in collection order. The counts drive demultiplexing, so
/// both views are built from the same walk over the items.
///

#[derive(Debug, Default)]
pub(crate) struct CommandSet {
    commands: Vec<SqlCommand>,
    per_item: Vec<usize>,
}

impl CommandSet {
    pub(crate) fn push_item(&mut self, commands: Vec<SqlCommand>) {
        self.per_item.push(commands.len());
        self.commands.extend(commands);
    }

    pub(crate) fn commands(&self) -> &[SqlCommand] {
        &self.commands
    }

    pub(crate) fn per_item(&self) -> &[usize] {
        &self.per_item
    }

    pub(crate) const fn len(&self) -> usize {
        self.commands.len()
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_set_tracks_item_boundaries_in_order() {
        let mut set = CommandSet::default();
        set.push_item(vec![SqlCommand::new("a1"), SqlCommand::new("a2")]);
        set.push_item(Vec::new());
        set.push_item(vec![SqlCommand::new("c1")]);

        let sql = set.commands().iter().map(SqlCommand::sql).collect::<Vec<_>>();
        assert_eq!(sql, vec!["a1", "a2", "c1"]);
        assert_eq!(set.per_item(), &[2, 0, 1]);
        assert_eq!(set.len(), 3);
        assert!(!set.is_empty());
    }

    #[test]
    fn bind_appends_positional_params() {
        let cmd = SqlCommand::new("select * from t where a = ? and b = ?")
            .bind(1_i64)
            .bind("x");

        assert_eq!(cmd.params(), &[Value::Int(1), Value::Text("x".into())]);
        assert_eq!(cmd.to_string(), "select * from t where a = ? and b = ? [2 params]");
    }
}
