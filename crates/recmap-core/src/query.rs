//! Finder predicates and ordering.
//!
//! Queries are explicit values passed to the mapper together with an entity
//! type: a filter tree, an ordering and an optional window.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::entity::Entity;
use crate::value::Value;

/// Predicate over an entity's fields.
///
/// Field names may be declared columns or the implicit `id`, `created_at`
/// and `updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value. Comparing against null matches null fields.
    Eq { field: String, value: Value },
    /// Field differs from value.
    Ne { field: String, value: Value },
    /// Field is less than value.
    Lt { field: String, value: Value },
    /// Field is less than or equal to value.
    Le { field: String, value: Value },
    /// Field is greater than value.
    Gt { field: String, value: Value },
    /// Field is greater than or equal to value.
    Ge { field: String, value: Value },
    /// Field equals one of the values.
    In { field: String, values: Vec<Value> },
    /// String field matches a LIKE pattern (`%`, `_`, `\` escapes).
    /// ASCII letters match regardless of case.
    Like { field: String, pattern: String },
    /// Field is null.
    IsNull { field: String },
    /// Field is not null.
    IsNotNull { field: String },
    /// All filters match. Empty matches everything.
    And(Vec<Filter>),
    /// Any filter matches. Empty matches nothing.
    Or(Vec<Filter>),
    /// Negation.
    Not(Box<Filter>),
}

impl Filter {
    /// Field equals value.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field differs from value.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field is less than value.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field is at most value.
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Le {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field is greater than value.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field is at least value.
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ge {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field equals one of the values.
    pub fn in_list<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// String field matches a LIKE pattern.
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Like {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// Field is null.
    pub fn is_null(field: impl Into<String>) -> Self {
        Filter::IsNull {
            field: field.into(),
        }
    }

    /// Field is not null.
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Filter::IsNotNull {
            field: field.into(),
        }
    }

    /// Combine with another filter using AND.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// Combine with another filter using OR.
    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut filters) => {
                filters.push(other);
                Filter::Or(filters)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    /// Evaluate the filter against an entity.
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Filter::Eq { field, value } => {
                let actual = entity.field(field);
                if value.is_null() {
                    actual.is_null()
                } else {
                    actual.loose_eq(value)
                }
            }
            Filter::Ne { field, value } => {
                let actual = entity.field(field);
                if value.is_null() {
                    !actual.is_null()
                } else {
                    !actual.is_null() && !actual.loose_eq(value)
                }
            }
            Filter::Lt { field, value } => compare_field(entity, field, value, Ordering::is_lt),
            Filter::Le { field, value } => compare_field(entity, field, value, Ordering::is_le),
            Filter::Gt { field, value } => compare_field(entity, field, value, Ordering::is_gt),
            Filter::Ge { field, value } => compare_field(entity, field, value, Ordering::is_ge),
            Filter::In { field, values } => {
                let actual = entity.field(field);
                values.iter().any(|v| actual.loose_eq(v))
            }
            Filter::Like { field, pattern } => match entity.field(field) {
                Value::String(s) => like_match(&s, pattern),
                _ => false,
            },
            Filter::IsNull { field } => entity.field(field).is_null(),
            Filter::IsNotNull { field } => !entity.field(field).is_null(),
            Filter::And(filters) => filters.iter().all(|f| f.matches(entity)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entity)),
            Filter::Not(inner) => !inner.matches(entity),
        }
    }

    /// Field names the filter reads.
    pub fn fields(&self) -> HashSet<&str> {
        let mut fields = HashSet::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, fields: &mut HashSet<&'a str>) {
        match self {
            Filter::Eq { field, .. }
            | Filter::Ne { field, .. }
            | Filter::Lt { field, .. }
            | Filter::Le { field, .. }
            | Filter::Gt { field, .. }
            | Filter::Ge { field, .. }
            | Filter::In { field, .. }
            | Filter::Like { field, .. }
            | Filter::IsNull { field }
            | Filter::IsNotNull { field } => {
                fields.insert(field.as_str());
            }
            Filter::And(filters) | Filter::Or(filters) => {
                for filter in filters {
                    filter.collect_fields(fields);
                }
            }
            Filter::Not(inner) => inner.collect_fields(fields),
        }
    }
}

fn compare_field(entity: &Entity, field: &str, value: &Value, test: fn(Ordering) -> bool) -> bool {
    entity.field(field).compare(value).is_some_and(test)
}

/// Match a string against a LIKE pattern.
///
/// Supports:
/// - `%` matches zero or more characters
/// - `_` matches exactly one character
/// - `\%` and `\_` match the literal character
///
/// ASCII letters compare case-insensitively.
pub fn like_match(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    like_match_from(&value, &pattern)
}

fn like_match_from(value: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => value.is_empty(),
        Some(('%', rest)) => {
            // Collapse runs of % and try every split point
            let rest = trim_leading_percent(rest);
            if rest.is_empty() {
                return true;
            }
            (0..=value.len()).any(|skip| like_match_from(&value[skip..], rest))
        }
        Some(('_', rest)) => !value.is_empty() && like_match_from(&value[1..], rest),
        Some(('\\', rest)) => match (rest.split_first(), value.split_first()) {
            (Some((p, rest)), Some((c, tail))) if p.eq_ignore_ascii_case(c) => {
                like_match_from(tail, rest)
            }
            _ => false,
        },
        Some((p, rest)) => match value.split_first() {
            Some((c, tail)) if c.eq_ignore_ascii_case(p) => like_match_from(tail, rest),
            _ => false,
        },
    }
}

fn trim_leading_percent(pattern: &[char]) -> &[char] {
    let skip = pattern.iter().take_while(|c| **c == '%').count();
    &pattern[skip..]
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// One ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Field name to order by.
    pub field: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Create ascending order.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create descending order.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// A finder query: filter, ordering and window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Rows must match this filter.
    pub filter: Option<Filter>,
    /// Ordering keys; id ascending breaks ties.
    pub order: Vec<OrderBy>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
    /// Rows skipped before the window.
    pub offset: usize,
}

impl Query {
    /// Query matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Query matching a filter.
    pub fn matching(filter: Filter) -> Self {
        Self::all().filter(filter)
    }

    /// Add a filter; multiple filters are AND-composed.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Append an ordering key.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    /// Limit the number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip rows before returning.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Field names the query reads.
    pub fn fields(&self) -> HashSet<&str> {
        let mut fields = self.filter.as_ref().map(Filter::fields).unwrap_or_default();
        fields.extend(self.order.iter().map(|o| o.field.as_str()));
        fields
    }

    /// Filter, sort and window a set of entities.
    pub fn apply(&self, entities: impl IntoIterator<Item = Entity>) -> Vec<Entity> {
        let mut rows: Vec<Entity> = entities
            .into_iter()
            .filter(|e| self.filter.as_ref().map_or(true, |f| f.matches(e)))
            .collect();

        rows.sort_by(|a, b| self.compare(a, b));

        let window = rows.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => window.take(limit).collect(),
            None => window.collect(),
        }
    }

    fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        for order in &self.order {
            let ordering = compare_for_sort(&a.field(&order.field), &b.field(&order.field));
            let ordering = match order.direction {
                OrderDirection::Asc => ordering,
                OrderDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.id().cmp(&b.id())
    }
}

/// Total order for sorting: nulls first, then by value, unrelated types equal.
fn compare_for_sort(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restaurant(id: u64, name: &str, address: &str, rating: i64) -> Entity {
        let mut entity = Entity::new("Restaurant")
            .with("name", name)
            .with("address", address)
            .with("rating", rating);
        entity.mark_saved(id, 0, 0);
        entity
    }

    fn restaurants() -> Vec<Entity> {
        vec![
            restaurant(1, "La Tour d'Argent", "Paris", 5),
            restaurant(2, "The fox", "London", 3),
            restaurant(3, "Dishoom", "London", 4),
            restaurant(4, "Tour de Cosenza", "Cosenza", 3),
        ]
    }

    fn ids(rows: &[Entity]) -> Vec<u64> {
        rows.iter().filter_map(Entity::id).collect()
    }

    #[test]
    fn test_eq_filter() {
        let rows = Query::matching(Filter::eq("address", "London")).apply(restaurants());
        assert_eq!(ids(&rows), vec![2, 3]);
    }

    #[test]
    fn test_in_filter_on_id() {
        let rows = Query::matching(Filter::in_list("id", [1u64, 3])).apply(restaurants());
        assert_eq!(ids(&rows), vec![1, 3]);
    }

    #[test]
    fn test_comparison_filters() {
        let rows = Query::matching(Filter::ge("rating", 4)).apply(restaurants());
        assert_eq!(ids(&rows), vec![1, 3]);

        let rows = Query::matching(Filter::lt("rating", 4.5)).apply(restaurants());
        assert_eq!(ids(&rows), vec![2, 3, 4]);
    }

    #[test]
    fn test_null_handling() {
        let mut rows = restaurants();
        rows[0].set("address", Value::Null);

        let nulls = Query::matching(Filter::eq("address", Value::Null)).apply(rows.clone());
        assert_eq!(ids(&nulls), vec![1]);

        let not_london = Query::matching(Filter::ne("address", "London")).apply(rows.clone());
        assert_eq!(ids(&not_london), vec![4]);

        let present = Query::matching(Filter::is_not_null("address")).apply(rows);
        assert_eq!(ids(&present), vec![2, 3, 4]);
    }

    #[test]
    fn test_like_filter() {
        let rows = Query::matching(Filter::like("name", "%Tour%")).apply(restaurants());
        assert_eq!(ids(&rows), vec![1, 4]);

        let rows = Query::matching(Filter::like("name", "The ___")).apply(restaurants());
        assert_eq!(ids(&rows), vec![2]);
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("La Tour d'Argent", "%Tour%"));
        assert!(like_match("La Tour d'Argent", "%tour%"));
        assert!(like_match("DISHOOM", "dish_om"));
        assert!(!like_match("Café", "CAFÉ"));
        assert!(like_match("abc", "abc"));
        assert!(like_match("abc", "%"));
        assert!(like_match("", "%%"));
        assert!(like_match("abc", "a%%c"));
        assert!(!like_match("abc", "ab"));
        assert!(!like_match("abc", "_"));
        assert!(like_match("100%", "100\\%"));
        assert!(!like_match("1000", "100\\%"));
    }

    #[test]
    fn test_and_or_not() {
        let london_or_paris = Filter::eq("address", "London").or(Filter::eq("address", "Paris"));
        let rows = Query::matching(london_or_paris.clone())
            .filter(Filter::gt("rating", 3))
            .apply(restaurants());
        assert_eq!(ids(&rows), vec![1, 3]);

        let rows = Query::matching(Filter::Not(Box::new(london_or_paris))).apply(restaurants());
        assert_eq!(ids(&rows), vec![4]);

        assert_eq!(Query::matching(Filter::And(vec![])).apply(restaurants()).len(), 4);
        assert!(Query::matching(Filter::Or(vec![])).apply(restaurants()).is_empty());
    }

    #[test]
    fn test_order_and_window() {
        let rows = Query::all()
            .order_by(OrderBy::desc("rating"))
            .apply(restaurants());
        // Ties on rating fall back to id order
        assert_eq!(ids(&rows), vec![1, 3, 2, 4]);

        let rows = Query::all()
            .order_by(OrderBy::asc("address"))
            .offset(1)
            .limit(2)
            .apply(restaurants());
        assert_eq!(ids(&rows), vec![2, 3]);
    }

    #[test]
    fn test_fields() {
        let query = Query::matching(Filter::eq("address", "London").and(Filter::like("name", "%")))
            .order_by(OrderBy::asc("rating"));
        let fields = query.fields();

        assert_eq!(fields.len(), 3);
        assert!(fields.contains("address"));
        assert!(fields.contains("name"));
        assert!(fields.contains("rating"));
    }
}
