use chrono::{DateTime, Utc};
use duckdb::types::Value;
use sightline_core::filter::Pagination;

const FILTERS_SLOT: &str = "{filters}";
const TOTAL_SLOT: &str = "{total}";
const PAGE_SLOT: &str = "{page}";

/// One optional filter dimension. A predicate that has nothing to match on
/// renders to nothing, so an empty list never reaches an `IN (...)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(&'static str, String),
    In(&'static str, Vec<String>),
    AtOrAfter(&'static str, DateTime<Utc>),
    AnyOf(Vec<Predicate>),
}

impl Predicate {
    pub fn render(&self, params: &mut Vec<Value>) -> Option<String> {
        match self {
            Self::Eq(column, value) => {
                params.push(Value::Text(value.clone()));
                Some(format!("{column} = ?"))
            }
            Self::In(column, values) => {
                if values.is_empty() {
                    return None;
                }
                let marks = vec!["?"; values.len()].join(", ");
                params.extend(values.iter().cloned().map(Value::Text));
                Some(format!("{column} IN ({marks})"))
            }
            Self::AtOrAfter(column, ts) => {
                params.push(Value::Text(ts_param(*ts)));
                Some(format!("{column} >= CAST(? AS TIMESTAMP)"))
            }
            Self::AnyOf(parts) => {
                let mut rendered = parts
                    .iter()
                    .filter_map(|p| p.render(params))
                    .collect::<Vec<_>>();
                match rendered.len() {
                    0 => None,
                    1 => rendered.pop(),
                    _ => Some(format!("({})", rendered.join(" OR "))),
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Fills a SQL template's `{filters}`, `{total}` and `{page}` slots.
///
/// `{filters}` expands to one `AND <predicate>` per active predicate, so the
/// template must place it after a `WHERE` clause. `{total}` expands to a
/// `total_rows` column that is either a window count over the whole filtered
/// result or a constant 0. Parameters are positional in predicate order.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    template: &'static str,
    predicates: Vec<Predicate>,
    with_total: bool,
    page: Option<Pagination>,
}

impl QueryBuilder {
    pub fn new(template: &'static str) -> Self {
        Self {
            template,
            predicates: Vec::new(),
            with_total: false,
            page: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn filter_opt(self, predicate: Option<Predicate>) -> Self {
        match predicate {
            Some(p) => self.filter(p),
            None => self,
        }
    }

    pub fn with_total(mut self, include: bool) -> Self {
        self.with_total = include;
        self
    }

    pub fn page(mut self, page: Pagination) -> Self {
        self.page = Some(page);
        self
    }

    pub fn build(&self) -> BuiltQuery {
        let mut params = Vec::new();
        let filters = self
            .predicates
            .iter()
            .filter_map(|p| p.render(&mut params))
            .map(|clause| format!("AND {clause}"))
            .collect::<Vec<_>>()
            .join("\n      ");

        let total = if self.with_total {
            "COUNT(*) OVER () AS total_rows"
        } else {
            "CAST(0 AS BIGINT) AS total_rows"
        };

        // validated integers only, never user text
        let page = self
            .page
            .map(|p| format!("LIMIT {} OFFSET {}", p.limit, p.offset))
            .unwrap_or_default();

        let sql = self
            .template
            .replace(FILTERS_SLOT, &filters)
            .replace(TOTAL_SLOT, total)
            .replace(PAGE_SLOT, &page);

        BuiltQuery { sql, params }
    }
}

pub fn ts_param(ts: DateTime<Utc>) -> String {
    ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}
