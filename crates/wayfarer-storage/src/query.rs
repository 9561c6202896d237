// Staged list-query pipeline: filter -> sort -> project -> paginate.
//
// A pipeline is constructed from the raw key-value parameters of a request
// plus a static ResourceTable describing the collection. Each stage consumes
// the pipeline and returns it, so call sites chain stages; the stages write
// to dedicated slots and `build()` assembles the SQL in a fixed order, so the
// order of method calls cannot change stage precedence. No stage executes
// anything; execution lives in `Database::list_records`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};
use wayfarer_core::{Error, Result};

/// Parameters reserved for the pipeline itself; everything else is a filter.
const RESERVED_PARAMS: [&str; 4] = ["page", "sort", "limit", "fields"];

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 100;

/// Column value type, used both to coerce filter values and to decode
/// projected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    Int,
    Float,
    Bool,
    Timestamp,
    TextArray,
    TimestampArray,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty }
    }
}

/// Static description of a listable collection. Plays the schema role: fields
/// not declared here are rejected rather than interpolated into SQL.
#[derive(Debug)]
pub struct ResourceTable {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// Column used for the default newest-first sort
    pub default_sort: &'static str,
}

impl ResourceTable {
    fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

use ColumnType::*;

pub static TOURS_TABLE: ResourceTable = ResourceTable {
    name: "tours",
    columns: &[
        Column::new("id", Uuid),
        Column::new("name", Text),
        Column::new("slug", Text),
        Column::new("duration", Int),
        Column::new("max_group_size", Int),
        Column::new("difficulty", Text),
        Column::new("ratings_average", Float),
        Column::new("ratings_quantity", Int),
        Column::new("price", Float),
        Column::new("summary", Text),
        Column::new("description", Text),
        Column::new("image_cover", Text),
        Column::new("images", TextArray),
        Column::new("start_dates", TimestampArray),
        Column::new("start_location_address", Text),
        Column::new("start_location_lat", Float),
        Column::new("start_location_lng", Float),
        Column::new("secret", Bool),
        Column::new("created_at", Timestamp),
    ],
    default_sort: "created_at",
};

pub static USERS_TABLE: ResourceTable = ResourceTable {
    name: "users",
    columns: &[
        Column::new("id", Uuid),
        Column::new("name", Text),
        Column::new("email", Text),
        Column::new("role", Text),
        Column::new("photo", Text),
        Column::new("active", Bool),
        Column::new("created_at", Timestamp),
    ],
    default_sort: "created_at",
};

pub static REVIEWS_TABLE: ResourceTable = ResourceTable {
    name: "reviews",
    columns: &[
        Column::new("id", Uuid),
        Column::new("tour_id", Uuid),
        Column::new("author_id", Uuid),
        Column::new("review", Text),
        Column::new("rating", Int),
        Column::new("created_at", Timestamp),
    ],
    default_sort: "created_at",
};

pub static BOOKINGS_TABLE: ResourceTable = ResourceTable {
    name: "bookings",
    columns: &[
        Column::new("id", Uuid),
        Column::new("tour_id", Uuid),
        Column::new("user_id", Uuid),
        Column::new("price", Float),
        Column::new("paid", Bool),
        Column::new("created_at", Timestamp),
    ],
    default_sort: "created_at",
};

/// Raw request parameters. BTreeMap keeps clause order deterministic.
#[derive(Debug, Clone, Default)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Comparison operator embedded in nested parameter syntax, e.g.
/// `price[gte]=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
}

impl CmpOp {
    pub fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "gte" => Some(CmpOp::Gte),
            "gt" => Some(CmpOp::Gt),
            "lte" => Some(CmpOp::Lte),
            "lt" => Some(CmpOp::Lt),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Gte => ">=",
            CmpOp::Gt => ">",
            CmpOp::Lte => "<=",
            CmpOp::Lt => "<",
        }
    }
}

/// A value ready to bind into the query, already coerced to the column type.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Uuid(uuid::Uuid),
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub op: CmpOp,
    pub value: BindValue,
}

/// Assembled query: SQL with numbered placeholders, bind values in placeholder
/// order, and the typed columns the SELECT projects (for row decoding).
#[derive(Debug)]
pub struct BuiltQuery {
    pub sql: String,
    pub binds: Vec<BindValue>,
    pub columns: Vec<&'static Column>,
}

#[derive(Debug)]
pub struct QueryPipeline {
    table: &'static ResourceTable,
    params: QueryParams,
    filters: Vec<Filter>,
    sort: Option<Vec<(&'static str, bool)>>, // (column, descending)
    projection: Option<Vec<&'static Column>>,
    page: Option<(i64, i64)>, // (offset, limit)
}

impl QueryPipeline {
    pub fn new(table: &'static ResourceTable, params: QueryParams) -> Self {
        Self {
            table,
            params,
            filters: Vec::new(),
            sort: None,
            projection: None,
            page: None,
        }
    }

    /// Construct pre-narrowed by a structural filter, e.g. "reviews belonging
    /// to tour X". Structural filters precede user-supplied ones and bypass
    /// the reserved-parameter rules.
    pub fn scoped(
        table: &'static ResourceTable,
        params: QueryParams,
        column: &'static str,
        value: BindValue,
    ) -> Self {
        let mut pipeline = Self::new(table, params);
        pipeline.filters.push(Filter {
            column,
            op: CmpOp::Eq,
            value,
        });
        pipeline
    }

    /// Add a fixed constraint (structural filter) outside the request params.
    pub fn with_filter(mut self, column: &'static str, op: CmpOp, value: BindValue) -> Self {
        self.filters.push(Filter { column, op, value });
        self
    }

    /// Stage 1: translate every non-reserved parameter into a constraint.
    /// Parameters are drained as they are folded in, so calling this twice is
    /// a no-op the second time.
    pub fn filter(mut self) -> Result<Self> {
        let keys: Vec<String> = self
            .params
            .0
            .keys()
            .filter(|k| !RESERVED_PARAMS.contains(&k.as_str()))
            .cloned()
            .collect();

        for key in keys {
            let value = self
                .params
                .0
                .remove(&key)
                .unwrap_or_default();
            let (field, op) = parse_filter_key(&key)?;
            let column = self
                .table
                .column(field)
                .ok_or_else(|| Error::Validation(format!("Unknown field '{}'", field)))?;
            let bind = coerce_value(column, &value)?;
            self.filters.push(Filter {
                column: column.name,
                op,
                value: bind,
            });
        }
        Ok(self)
    }

    /// Stage 2: `sort=-price,name` -> ORDER BY price DESC, name ASC.
    /// Default when absent: newest first.
    pub fn sort(mut self) -> Result<Self> {
        let mut keys = Vec::new();
        match self.params.get("sort") {
            Some(spec) if !spec.trim().is_empty() => {
                for part in spec.split(',') {
                    let part = part.trim();
                    if part.is_empty() {
                        continue;
                    }
                    let (name, desc) = match part.strip_prefix('-') {
                        Some(rest) => (rest, true),
                        None => (part, false),
                    };
                    let column = self
                        .table
                        .column(name)
                        .ok_or_else(|| Error::Validation(format!("Unknown sort field '{}'", name)))?;
                    keys.push((column.name, desc));
                }
            }
            _ => keys.push((self.table.default_sort, true)),
        }
        self.sort = Some(keys);
        Ok(self)
    }

    /// Stage 3: `fields=name,price` -> SELECT name, price. The id column is
    /// always included. Default when absent: all declared columns.
    pub fn project(mut self) -> Result<Self> {
        let columns = match self.params.get("fields") {
            Some(spec) if !spec.trim().is_empty() => {
                let mut columns: Vec<&'static Column> = Vec::new();
                if let Some(id) = self.table.column("id") {
                    columns.push(id);
                }
                for part in spec.split(',') {
                    let name = part.trim();
                    if name.is_empty() {
                        continue;
                    }
                    let column = self.table.column(name).ok_or_else(|| {
                        Error::Validation(format!("Unknown field '{}' in projection", name))
                    })?;
                    if !columns.iter().any(|c| c.name == column.name) {
                        columns.push(column);
                    }
                }
                columns
            }
            _ => self.table.columns.iter().collect(),
        };
        self.projection = Some(columns);
        Ok(self)
    }

    /// Stage 4: page/limit -> OFFSET/LIMIT. Non-numeric or non-positive
    /// values fall back to the defaults rather than erroring; a page past the
    /// end of the result set simply yields no rows.
    pub fn paginate(mut self) -> Self {
        let page = parse_positive(self.params.get("page")).unwrap_or(DEFAULT_PAGE);
        let limit = parse_positive(self.params.get("limit")).unwrap_or(DEFAULT_LIMIT);
        self.page = Some(((page - 1).saturating_mul(limit), limit));
        self
    }

    /// All four stages in their fixed order.
    pub fn apply(self) -> Result<Self> {
        Ok(self.filter()?.sort()?.project()?.paginate())
    }

    /// Columns this query will return
    pub fn selected_columns(&self) -> Vec<&'static Column> {
        match &self.projection {
            Some(cols) => cols.clone(),
            None => self.table.columns.iter().collect(),
        }
    }

    /// Assemble the SQL. Clause order here is what fixes stage precedence;
    /// stages applied in any call order produce the same statement.
    pub fn build(&self) -> BuiltQuery {
        let columns = self.selected_columns();

        let mut sql = String::from("SELECT ");
        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(col.name);
        }
        sql.push_str(" FROM ");
        sql.push_str(self.table.name);

        let mut binds = Vec::with_capacity(self.filters.len());
        for (i, filter) in self.filters.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(filter.column);
            sql.push(' ');
            sql.push_str(filter.op.sql());
            sql.push_str(&format!(" ${}", binds.len() + 1));
            binds.push(filter.value.clone());
        }

        if let Some(sort) = &self.sort {
            sql.push_str(" ORDER BY ");
            for (i, (column, desc)) in sort.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(column);
                sql.push_str(if *desc { " DESC" } else { " ASC" });
            }
        }

        if let Some((offset, limit)) = self.page {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        }

        BuiltQuery {
            sql,
            binds,
            columns,
        }
    }
}

/// `price[gte]` -> ("price", Gte); `difficulty` -> ("difficulty", Eq).
fn parse_filter_key(key: &str) -> Result<(&str, CmpOp)> {
    match key.find('[') {
        None => Ok((key, CmpOp::Eq)),
        Some(open) => {
            let field = &key[..open];
            let rest = &key[open + 1..];
            let suffix = rest
                .strip_suffix(']')
                .ok_or_else(|| Error::Validation(format!("Malformed filter key '{}'", key)))?;
            let op = CmpOp::from_suffix(suffix).ok_or_else(|| {
                Error::Validation(format!("Unknown filter operator '{}'", suffix))
            })?;
            Ok((field, op))
        }
    }
}

/// Coerce a raw parameter value to the column's declared type.
fn coerce_value(column: &Column, raw: &str) -> Result<BindValue> {
    let bad = || {
        Error::Validation(format!(
            "Invalid value '{}' for field '{}'",
            raw, column.name
        ))
    };
    match column.ty {
        ColumnType::Uuid => uuid::Uuid::parse_str(raw)
            .map(BindValue::Uuid)
            .map_err(|_| bad()),
        ColumnType::Text => Ok(BindValue::Text(raw.to_string())),
        ColumnType::Int => raw.parse::<i64>().map(BindValue::Int).map_err(|_| bad()),
        ColumnType::Float => raw.parse::<f64>().map(BindValue::Float).map_err(|_| bad()),
        ColumnType::Bool => match raw {
            "true" | "1" => Ok(BindValue::Bool(true)),
            "false" | "0" => Ok(BindValue::Bool(false)),
            _ => Err(bad()),
        },
        ColumnType::Timestamp => raw
            .parse::<DateTime<Utc>>()
            .map(BindValue::Timestamp)
            .map_err(|_| bad()),
        ColumnType::TextArray | ColumnType::TimestampArray => Err(Error::Validation(format!(
            "Field '{}' cannot be used as a filter",
            column.name
        ))),
    }
}

/// Permissive numeric parse: Some(n) only for a positive integer.
fn parse_positive(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok()).filter(|&n| n >= 1)
}

/// Decode one projected row into a JSON object using the declared column
/// types.
pub fn row_to_json(
    row: &sqlx::postgres::PgRow,
    columns: &[&'static Column],
) -> anyhow::Result<JsonValue> {
    use sqlx::Row;

    let mut object = serde_json::Map::with_capacity(columns.len());
    for col in columns {
        let value = match col.ty {
            ColumnType::Uuid => row
                .try_get::<Option<uuid::Uuid>, _>(col.name)?
                .map(|v| json!(v))
                .unwrap_or(JsonValue::Null),
            ColumnType::Text => row
                .try_get::<Option<String>, _>(col.name)?
                .map(JsonValue::String)
                .unwrap_or(JsonValue::Null),
            ColumnType::Int => row
                .try_get::<Option<i32>, _>(col.name)?
                .map(|v| json!(v))
                .unwrap_or(JsonValue::Null),
            ColumnType::Float => row
                .try_get::<Option<f64>, _>(col.name)?
                .and_then(|v| serde_json::Number::from_f64(v).map(JsonValue::Number))
                .unwrap_or(JsonValue::Null),
            ColumnType::Bool => row
                .try_get::<Option<bool>, _>(col.name)?
                .map(JsonValue::Bool)
                .unwrap_or(JsonValue::Null),
            ColumnType::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(col.name)?
                .map(|t| JsonValue::String(t.to_rfc3339()))
                .unwrap_or(JsonValue::Null),
            ColumnType::TextArray => row
                .try_get::<Option<Vec<String>>, _>(col.name)?
                .map(|v| json!(v))
                .unwrap_or(JsonValue::Null),
            ColumnType::TimestampArray => row
                .try_get::<Option<Vec<DateTime<Utc>>>, _>(col.name)?
                .map(|v| json!(v.iter().map(|t| t.to_rfc3339()).collect::<Vec<_>>()))
                .unwrap_or(JsonValue::Null),
        };
        object.insert(col.name.to_string(), value);
    }
    Ok(JsonValue::Object(object))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_filter_equality_and_comparison() {
        let pipeline = QueryPipeline::new(
            &TOURS_TABLE,
            params(&[("difficulty", "easy"), ("price[gte]", "100")]),
        )
        .apply()
        .unwrap();
        let built = pipeline.build();

        assert!(built.sql.contains("difficulty = $1"));
        assert!(built.sql.contains("price >= $2"));
        assert_eq!(
            built.binds,
            vec![
                BindValue::Text("easy".to_string()),
                BindValue::Float(100.0)
            ]
        );
    }

    #[test]
    fn test_all_comparison_operators() {
        for (suffix, sql_op) in [("gte", ">="), ("gt", ">"), ("lte", "<="), ("lt", "<")] {
            let key = format!("price[{}]", suffix);
            let pipeline =
                QueryPipeline::new(&TOURS_TABLE, params(&[(key.as_str(), "50")]))
                    .filter()
                    .unwrap();
            let built = pipeline.build();
            assert!(
                built.sql.contains(&format!("price {} $1", sql_op)),
                "expected '{}' in '{}'",
                sql_op,
                built.sql
            );
        }
    }

    #[test]
    fn test_operator_translation_idempotent() {
        // from_suffix is a pure key-to-enum map; translating twice cannot
        // prefix twice
        let op = CmpOp::from_suffix("gte").unwrap();
        assert_eq!(op.sql(), ">=");
        assert_eq!(op.sql(), ">=");
        assert_eq!(CmpOp::from_suffix("gte"), Some(CmpOp::Gte));
    }

    #[test]
    fn test_filter_stage_idempotent() {
        let pipeline = QueryPipeline::new(&TOURS_TABLE, params(&[("difficulty", "easy")]))
            .filter()
            .unwrap()
            .filter()
            .unwrap();
        assert_eq!(pipeline.filters.len(), 1);
    }

    #[test]
    fn test_stage_call_order_does_not_change_clause_order() {
        let forward = QueryPipeline::new(
            &TOURS_TABLE,
            params(&[("difficulty", "easy"), ("sort", "-price"), ("limit", "3")]),
        )
        .filter()
        .unwrap()
        .sort()
        .unwrap()
        .project()
        .unwrap()
        .paginate()
        .build();

        let reversed = QueryPipeline::new(
            &TOURS_TABLE,
            params(&[("difficulty", "easy"), ("sort", "-price"), ("limit", "3")]),
        )
        .paginate()
        .project()
        .unwrap()
        .sort()
        .unwrap()
        .filter()
        .unwrap()
        .build();

        assert_eq!(forward.sql, reversed.sql);
        assert_eq!(forward.binds, reversed.binds);
    }

    #[test]
    fn test_sort_translation() {
        let built = QueryPipeline::new(&TOURS_TABLE, params(&[("sort", "-price,name")]))
            .sort()
            .unwrap()
            .build();
        assert!(built.sql.contains("ORDER BY price DESC, name ASC"));
    }

    #[test]
    fn test_sort_default_newest_first() {
        let built = QueryPipeline::new(&TOURS_TABLE, params(&[]))
            .sort()
            .unwrap()
            .build();
        assert!(built.sql.contains("ORDER BY created_at DESC"));
    }

    #[test]
    fn test_projection() {
        let built = QueryPipeline::new(&TOURS_TABLE, params(&[("fields", "name,price")]))
            .project()
            .unwrap()
            .build();
        assert!(built.sql.starts_with("SELECT id, name, price FROM tours"));
        assert_eq!(built.columns.len(), 3);
    }

    #[test]
    fn test_projection_default_all_columns() {
        let built = QueryPipeline::new(&TOURS_TABLE, params(&[]))
            .project()
            .unwrap()
            .build();
        assert_eq!(built.columns.len(), TOURS_TABLE.columns.len());
    }

    #[test]
    fn test_pagination_defaults() {
        let built = QueryPipeline::new(&TOURS_TABLE, params(&[]))
            .paginate()
            .build();
        assert!(built.sql.ends_with("LIMIT 100 OFFSET 0"));
    }

    #[test]
    fn test_pagination_page_zero_falls_back() {
        let built = QueryPipeline::new(&TOURS_TABLE, params(&[("page", "0")]))
            .paginate()
            .build();
        assert!(built.sql.ends_with("LIMIT 100 OFFSET 0"));
    }

    #[test]
    fn test_pagination_non_numeric_falls_back() {
        let built = QueryPipeline::new(
            &TOURS_TABLE,
            params(&[("page", "banana"), ("limit", "also-banana")]),
        )
        .paginate()
        .build();
        assert!(built.sql.ends_with("LIMIT 100 OFFSET 0"));
    }

    #[test]
    fn test_pagination_skip_count() {
        let built = QueryPipeline::new(
            &TOURS_TABLE,
            params(&[("page", "3"), ("limit", "20")]),
        )
        .paginate()
        .build();
        // (page - 1) * limit
        assert!(built.sql.ends_with("LIMIT 20 OFFSET 40"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result =
            QueryPipeline::new(&TOURS_TABLE, params(&[("no_such_field", "x")])).filter();
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_uncoercible_value_rejected() {
        let result =
            QueryPipeline::new(&TOURS_TABLE, params(&[("price[gte]", "cheap")])).filter();
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let result =
            QueryPipeline::new(&TOURS_TABLE, params(&[("price[near]", "100")])).filter();
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_structural_prefilter_precedes_user_filters() {
        let tour_id = uuid::Uuid::nil();
        let built = QueryPipeline::scoped(
            &REVIEWS_TABLE,
            params(&[("rating[gte]", "4")]),
            "tour_id",
            BindValue::Uuid(tour_id),
        )
        .apply()
        .unwrap()
        .build();

        assert!(built.sql.contains("WHERE tour_id = $1 AND rating >= $2"));
        assert_eq!(built.binds[0], BindValue::Uuid(tour_id));
    }

    #[test]
    fn test_bool_coercion() {
        let built = QueryPipeline::new(&TOURS_TABLE, params(&[("secret", "false")]))
            .filter()
            .unwrap()
            .build();
        assert_eq!(built.binds, vec![BindValue::Bool(false)]);
    }

    #[test]
    fn test_full_pipeline_shape() {
        let built = QueryPipeline::new(
            &TOURS_TABLE,
            params(&[
                ("difficulty", "easy"),
                ("sort", "-price"),
                ("fields", "name,price,difficulty"),
                ("page", "2"),
                ("limit", "5"),
            ]),
        )
        .apply()
        .unwrap()
        .build();

        assert_eq!(
            built.sql,
            "SELECT id, name, price, difficulty FROM tours \
             WHERE difficulty = $1 ORDER BY price DESC LIMIT 5 OFFSET 5"
        );
    }
}
