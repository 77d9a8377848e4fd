//! Dynamic list filtering: query-string conditions compiled to SQL.
//!
//! List endpoints accept `field=value` (implicit equals) and
//! `field[operator]=value` pairs alongside the pagination/sort/search
//! parameters. Parsing validates fields and operators against the
//! caller's allow-list and produces typed conditions; compilation turns
//! those conditions (or a free-text search term) into a WHERE fragment
//! with numbered placeholders and the bind values to go with it.

use crate::error::AppError;

/// Query-string keys consumed by pagination/sort/search, never filters.
pub const RESERVED_PARAMS: &[&str] = &["skip", "limit", "sort_by", "sort_dir", "search"];

/// Comparison operators accepted in `field[operator]=value` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Ne,
    Contains,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 3] =
        [FilterOperator::Eq, FilterOperator::Ne, FilterOperator::Contains];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Contains => "contains",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(FilterOperator::Eq),
            "ne" => Some(FilterOperator::Ne),
            "contains" => Some(FilterOperator::Contains),
            _ => None,
        }
    }

    fn valid_set() -> String {
        Self::ALL
            .iter()
            .map(|op| op.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One validated comparison from the query string.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
}

/// A compiled WHERE fragment plus its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFilter {
    pub clause: String,
    pub binds: Vec<String>,
}

/// Parse raw query pairs into filter conditions.
///
/// Reserved keys are stripped before interpretation. `Ok(None)` means no
/// filtering was requested at all, as opposed to `Ok(Some(vec![]))` where
/// filter-looking keys were present but none survived.
///
/// Bracketed keys are validated strictly: an unknown field or operator is
/// a `BadRequest` naming the valid set. Bare keys outside the allow-list
/// are dropped without error.
pub fn parse_filter_params(
    params: &[(String, String)],
    allowed_fields: &[&str],
    reserved: &[&str],
) -> Result<Option<Vec<FilterCondition>>, AppError> {
    let filter_params: Vec<&(String, String)> = params
        .iter()
        .filter(|(key, _)| !reserved.contains(&key.as_str()))
        .collect();

    if filter_params.is_empty() {
        return Ok(None);
    }

    let mut conditions = Vec::new();

    for (key, value) in filter_params {
        if let Some((field, operator_token)) = split_bracket_key(key) {
            if !allowed_fields.contains(&field) {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Field '{}' is not valid. Valid fields: {}",
                    field,
                    allowed_fields.join(", ")
                )));
            }
            let operator = FilterOperator::parse(operator_token).ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "Operator '{}' is not valid. Valid operators: {}",
                    operator_token,
                    FilterOperator::valid_set()
                ))
            })?;
            conditions.push(FilterCondition {
                field: field.to_string(),
                operator,
                value: value.clone(),
            });
        } else if allowed_fields.contains(&key.as_str()) {
            conditions.push(FilterCondition {
                field: key.clone(),
                operator: FilterOperator::Eq,
                value: value.clone(),
            });
        }
        // Bare keys outside the allow-list fall through untouched.
    }

    Ok(Some(conditions))
}

/// Split `name[operator]` into its parts; both sides must be word
/// characters only. Anything else is treated as a bare key.
fn split_bracket_key(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    if !key.ends_with(']') || key.len() < open + 3 {
        return None;
    }

    let field = &key[..open];
    let operator = &key[open + 1..key.len() - 1];

    if field.is_empty() || operator.is_empty() {
        return None;
    }
    if !is_word(field) || !is_word(operator) {
        return None;
    }

    Some((field, operator))
}

fn is_word(s: &str) -> bool {
    s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Compile conditions into an AND-joined WHERE fragment.
///
/// Placeholders are numbered from `first_param` so the caller can prepend
/// its own binds. Field membership is re-checked here so a caller that
/// bypassed [`parse_filter_params`] cannot smuggle in a column name.
/// An empty condition list compiles to `Ok(None)`, never an empty AND.
pub fn build_query_filter(
    conditions: &[FilterCondition],
    allowed_fields: &[&str],
    first_param: usize,
) -> Result<Option<SqlFilter>, AppError> {
    if conditions.is_empty() {
        return Ok(None);
    }

    let mut fragments = Vec::with_capacity(conditions.len());
    let mut binds = Vec::with_capacity(conditions.len());
    let mut param_idx = first_param;

    for condition in conditions {
        if !allowed_fields.contains(&condition.field.as_str()) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Field '{}' is not valid. Valid fields: {}",
                condition.field,
                allowed_fields.join(", ")
            )));
        }

        let fragment = match condition.operator {
            FilterOperator::Eq => {
                binds.push(condition.value.clone());
                format!("{} = ${}", condition.field, param_idx)
            }
            FilterOperator::Ne => {
                binds.push(condition.value.clone());
                format!("{} <> ${}", condition.field, param_idx)
            }
            FilterOperator::Contains => {
                binds.push(format!("%{}%", condition.value));
                format!("{} ILIKE ${}", condition.field, param_idx)
            }
        };
        fragments.push(fragment);
        param_idx += 1;
    }

    Ok(Some(SqlFilter {
        clause: fragments.join(" AND "),
        binds,
    }))
}

/// Compile a free-text search term into an OR of case-insensitive
/// substring matches over every searchable field.
pub fn build_search_filter(
    term: &str,
    searchable_fields: &[&str],
    first_param: usize,
) -> Option<SqlFilter> {
    if searchable_fields.is_empty() {
        return None;
    }

    let pattern = format!("%{}%", term);
    let mut fragments = Vec::with_capacity(searchable_fields.len());
    let mut binds = Vec::with_capacity(searchable_fields.len());

    for (offset, field) in searchable_fields.iter().enumerate() {
        fragments.push(format!("{} ILIKE ${}", field, first_param + offset));
        binds.push(pattern.clone());
    }

    Some(SqlFilter {
        clause: fragments.join(" OR "),
        binds,
    })
}

/// Check a requested sort field against the allow-list.
///
/// No requested field is always fine; the caller falls back to its
/// default ordering.
pub fn validate_sort_field(
    sort_by: Option<&str>,
    allowed_fields: &[&str],
    entity: &str,
) -> Result<(), AppError> {
    match sort_by {
        Some(field) if !allowed_fields.contains(&field) => Err(AppError::BadRequest(
            anyhow::anyhow!(
                "Sort field '{}' is not valid for {}. Valid fields: {}",
                field,
                entity,
                allowed_fields.join(", ")
            ),
        )),
        _ => Ok(()),
    }
}
