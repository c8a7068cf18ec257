//! Node Query Values
//!
//! Backend-neutral description of a filtered, ordered, limited read or write
//! over the node table. The traversal builder produces these; a store
//! implementation renders them for its backend (see `TursoStore`).
//!
//! Columns are symbolic so that the configured names (`lft`, `parent_id`,
//! scope columns, ...) are resolved in exactly one place.

use serde_json::Value;

use crate::models::Scope;

/// Symbolic column of the node table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Parent,
    Left,
    Right,
    Depth,
    /// The configured sibling order key
    Order,
    UpdatedAt,
    DeletedAt,
    /// A configured scope column
    Scope(String),
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Cmp::Eq => "=",
            Cmp::Ne => "!=",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
        }
    }
}

/// A single filter term; terms of a query are AND-ed
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column <cmp> value`; a `null` value with `Eq`/`Ne` means IS [NOT] NULL
    Compare {
        column: Column,
        cmp: Cmp,
        value: Value,
    },
    IsNull(Column),
    NotNull(Column),
    /// Inclusive range
    Between { column: Column, low: i64, high: i64 },
    /// `right - left <cmp> value`
    Span { cmp: Cmp, value: i64 },
    /// `column [NOT] IN (values)`
    In {
        column: Column,
        values: Vec<Value>,
        negated: bool,
    },
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Soft-deleted row visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trashed {
    /// Live rows only
    #[default]
    Exclude,
    /// Live and soft-deleted rows
    Include,
    /// Soft-deleted rows only
    Only,
}

/// Filtered, ordered, limited selection of node rows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeQuery {
    pub predicates: Vec<Predicate>,
    pub order: Vec<(Column, Direction)>,
    pub limit: Option<u64>,
    pub trashed: Trashed,
}

impl NodeQuery {
    /// Query over every live row
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn compare(self, column: Column, cmp: Cmp, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Compare {
            column,
            cmp,
            value: value.into(),
        })
    }

    pub fn eq(self, column: Column, value: impl Into<Value>) -> Self {
        self.compare(column, Cmp::Eq, value)
    }

    pub fn is_null(self, column: Column) -> Self {
        self.filter(Predicate::IsNull(column))
    }

    pub fn not_null(self, column: Column) -> Self {
        self.filter(Predicate::NotNull(column))
    }

    pub fn between(self, column: Column, low: i64, high: i64) -> Self {
        self.filter(Predicate::Between { column, low, high })
    }

    /// Filter on the interval span `right - left`
    pub fn span(self, cmp: Cmp, value: i64) -> Self {
        self.filter(Predicate::Span { cmp, value })
    }

    pub fn not_in(self, column: Column, values: Vec<Value>) -> Self {
        self.filter(Predicate::In {
            column,
            values,
            negated: true,
        })
    }

    pub fn in_list(self, column: Column, values: Vec<Value>) -> Self {
        self.filter(Predicate::In {
            column,
            values,
            negated: false,
        })
    }

    /// Exclude one row by ID
    pub fn without(self, id: &str) -> Self {
        self.compare(Column::Id, Cmp::Ne, id)
    }

    /// Restrict to one scope
    ///
    /// Every configured scope column must be listed; a missing value is
    /// matched as NULL.
    pub fn in_scope(mut self, columns: &[String], scope: &Scope) -> Self {
        for column in columns {
            let value = scope.get(column).cloned().unwrap_or(Value::Null);
            self = self.eq(Column::Scope(column.clone()), value);
        }
        self
    }

    /// Append a sort key
    pub fn order_by(mut self, column: Column, direction: Direction) -> Self {
        self.order.push((column, direction));
        self
    }

    /// Replace all sort keys
    pub fn reorder_by(mut self, column: Column, direction: Direction) -> Self {
        self.order = vec![(column, direction)];
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_trashed(mut self) -> Self {
        self.trashed = Trashed::Include;
        self
    }

    pub fn only_trashed(mut self) -> Self {
        self.trashed = Trashed::Only;
        self
    }

    /// Bound `depth` to `[min(base, base + limit), max(base, base + limit)]`
    pub fn limit_depth(self, base: i64, limit: i64) -> Self {
        let bound = base + limit;
        self.between(Column::Depth, base.min(bound), base.max(bound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_limit_depth_handles_negative_limits() {
        let query = NodeQuery::new().limit_depth(3, -2);
        assert_eq!(
            query.predicates,
            vec![Predicate::Between {
                column: Column::Depth,
                low: 1,
                high: 3
            }]
        );
    }

    #[test]
    fn test_in_scope_fills_missing_values_with_null() {
        let mut scope = Scope::new();
        scope.insert("tenant".to_string(), json!(4));
        let columns = vec!["tenant".to_string(), "menu".to_string()];

        let query = NodeQuery::new().in_scope(&columns, &scope);

        assert_eq!(query.predicates.len(), 2);
        assert_eq!(
            query.predicates[1],
            Predicate::Compare {
                column: Column::Scope("menu".to_string()),
                cmp: Cmp::Eq,
                value: Value::Null
            }
        );
    }

    #[test]
    fn test_reorder_replaces_sort_keys() {
        let query = NodeQuery::new()
            .order_by(Column::Order, Direction::Asc)
            .reorder_by(Column::Right, Direction::Desc);
        assert_eq!(query.order, vec![(Column::Right, Direction::Desc)]);
    }
}
