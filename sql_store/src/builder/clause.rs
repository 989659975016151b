use serde_json::Value;

/// Boolean connector between where/having clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn keyword(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn keyword(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }

    /// Loose parse: anything that is not a DESC spelling sorts ascending
    pub fn parse(direction: &str) -> Self {
        if direction.eq_ignore_ascii_case("desc") {
            SortDir::Desc
        } else {
            SortDir::Asc
        }
    }
}

/// One where-predicate kind
#[derive(Debug, Clone)]
pub enum Predicate {
    Basic {
        column: String,
        operator: String,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    NotIn {
        column: String,
        values: Vec<Value>,
    },
    Null {
        column: String,
    },
    NotNull {
        column: String,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
    },
    /// Caller-supplied fragment, inserted verbatim; `?` placeholders are
    /// renumbered at compile time and values travel as bindings
    Raw {
        sql: String,
        bindings: Vec<Value>,
    },
}

#[derive(Debug, Clone)]
pub struct WhereClause {
    pub predicate: Predicate,
    pub connector: Connector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

#[derive(Debug, Clone)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: String,
    pub left: String,
    pub operator: String,
    pub right: String,
}

#[derive(Debug, Clone)]
pub struct HavingClause {
    pub column: String,
    pub operator: String,
    pub value: Value,
    pub connector: Connector,
}

#[derive(Debug, Clone)]
pub struct OrderClause {
    pub column: String,
    pub direction: SortDir,
}
