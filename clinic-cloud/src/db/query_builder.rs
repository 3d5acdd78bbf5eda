use chrono::NaiveDate;
use sqlx::Postgres;
use sqlx::postgres::PgArguments;
use sqlx::query::{Query, QueryAs, QueryScalar};

/// Query builder for constructing SQL queries with dynamic WHERE conditions
///
/// Placeholders are PostgreSQL-style (`$1`, `$2`, ...) and numbered in the
/// order values are bound. Conditions are written with `{}` where the
/// placeholder goes.
pub struct QueryBuilder {
    conditions: Vec<String>,
    bindings: Vec<QueryValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Text(String),
    Integer(i64),
    Bool(bool),
    Date(NaiveDate),
    TextArray(Vec<String>),
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Add a condition without bindings
    pub fn add_condition(&mut self, condition: &str) -> &mut Self {
        self.conditions.push(condition.to_string());
        self
    }

    /// Add a condition binding one value; every `{}` becomes its placeholder
    pub fn add_bound(&mut self, condition: &str, value: QueryValue) -> &mut Self {
        let placeholder = self.push_binding(value);
        self.conditions.push(condition.replace("{}", &placeholder));
        self
    }

    /// Add a condition binding two values (`{0}` and `{1}`)
    pub fn add_bound_pair(
        &mut self,
        condition: &str,
        first: QueryValue,
        second: QueryValue,
    ) -> &mut Self {
        let p0 = self.push_binding(first);
        let p1 = self.push_binding(second);
        self.conditions
            .push(condition.replace("{0}", &p0).replace("{1}", &p1));
        self
    }

    /// Bind a value that is referenced outside the WHERE clause (LIMIT, ...)
    pub fn push_binding(&mut self, value: QueryValue) -> String {
        self.bindings.push(value);
        format!("${}", self.bindings.len())
    }

    /// Build WHERE clause (empty if no conditions)
    pub fn build_where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn bindings(&self) -> &[QueryValue] {
        &self.bindings
    }

    /// Apply bindings to a SQLx query
    pub fn apply_bindings<'a, 'b>(
        &'b self,
        mut query: Query<'a, Postgres, PgArguments>,
    ) -> Query<'a, Postgres, PgArguments>
    where
        'b: 'a,
    {
        for binding in &self.bindings {
            query = match binding {
                QueryValue::Text(s) => query.bind(s),
                QueryValue::Integer(i) => query.bind(*i),
                QueryValue::Bool(b) => query.bind(*b),
                QueryValue::Date(d) => query.bind(*d),
                QueryValue::TextArray(v) => query.bind(v.as_slice()),
            };
        }
        query
    }

    /// Apply bindings to a SQLx query_as
    pub fn apply_bindings_as<'a, 'b, O>(
        &'b self,
        mut query: QueryAs<'a, Postgres, O, PgArguments>,
    ) -> QueryAs<'a, Postgres, O, PgArguments>
    where
        'b: 'a,
    {
        for binding in &self.bindings {
            query = match binding {
                QueryValue::Text(s) => query.bind(s),
                QueryValue::Integer(i) => query.bind(*i),
                QueryValue::Bool(b) => query.bind(*b),
                QueryValue::Date(d) => query.bind(*d),
                QueryValue::TextArray(v) => query.bind(v.as_slice()),
            };
        }
        query
    }

    /// Apply bindings to a SQLx query_scalar
    pub fn apply_bindings_scalar<'a, 'b, O>(
        &'b self,
        mut query: QueryScalar<'a, Postgres, O, PgArguments>,
    ) -> QueryScalar<'a, Postgres, O, PgArguments>
    where
        'b: 'a,
    {
        for binding in &self.bindings {
            query = match binding {
                QueryValue::Text(s) => query.bind(s),
                QueryValue::Integer(i) => query.bind(*i),
                QueryValue::Bool(b) => query.bind(*b),
                QueryValue::Date(d) => query.bind(*d),
                QueryValue::TextArray(v) => query.bind(v.as_slice()),
            };
        }
        query
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
