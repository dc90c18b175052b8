use crate::dto::opening_dto::ListingQuery;
use crate::error::Result;
use crate::models::category::CATEGORY_KINDS;
use crate::models::family::FamilyTable;
use crate::utils::time;
use crate::utils::validation::field_error;
use chrono::{DateTime, Utc};

/// A positional bind argument for a compiled listing query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Text(String),
    Int(i64),
    Uuid(uuid::Uuid),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than a literal `asc`/`desc` falls back to descending,
    /// the storefront default. Bad values are coerced, never rejected.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            Some("asc") => Self::Asc,
            Some("desc") => Self::Desc,
            _ => Self::Desc,
        }
    }
}

/// Featured listings first, newest within equal feature windows, id as the
/// final tiebreak so pagination never shuffles rows between pages. NULL
/// feature windows sort after real ones on the default order.
pub fn order_sql(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Desc => {
            "ORDER BY featured_expire_at DESC NULLS LAST, created_at DESC, id DESC"
        }
        SortOrder::Asc => "ORDER BY featured_expire_at ASC NULLS FIRST, created_at DESC, id DESC",
    }
}

/// One optional listing filter, already normalized and parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Keyword(String),
    Experience(String),
    OpportunityType(String),
    Family(String),
    Currency(String),
    SalaryType(String),
    SalaryBounds { min: i64, max: i64 },
    Remote,
    BrowseSlug(String),
    CategorySlug(String),
    ServiceSlug(String),
    Tags(Vec<i64>),
    Country(i64),
    State(i64),
}

#[derive(Debug)]
pub struct CompiledQuery {
    pub clauses: Vec<String>,
    pub args: Vec<SqlArg>,
}

impl CompiledQuery {
    pub fn where_sql(&self) -> String {
        format!("WHERE {}", self.clauses.join(" AND "))
    }

    /// The placeholder number the next appended bind (LIMIT/OFFSET) gets.
    pub fn next_placeholder(&self) -> usize {
        self.args.len() + 1
    }
}

/// Extracts the filter set from a raw listing query. Absent and empty
/// parameters contribute nothing; numeric parameters that fail to parse
/// produce a field-named validation error instead of a silent zero.
pub fn parse_filters(query: &ListingQuery, browse_slug: Option<&str>) -> Result<Vec<Filter>> {
    let mut filters = Vec::new();

    if let Some(keyword) = filled(&query.keyword) {
        filters.push(Filter::Keyword(keyword.to_string()));
    }
    if let Some(experience) = filled(&query.experience) {
        filters.push(Filter::Experience(experience.to_string()));
    }
    if let Some(type_key) = filled(&query.opportunity_type) {
        filters.push(Filter::OpportunityType(type_key.to_string()));
    }
    if let Some(family) = filled(&query.opportunity_category) {
        filters.push(Filter::Family(family.to_string()));
    }
    if let Some(currency) = filled(&query.currency) {
        filters.push(Filter::Currency(currency.to_string()));
    }
    if let (Some(min), Some(max)) = (filled(&query.min_salary), filled(&query.max_salary)) {
        filters.push(Filter::SalaryBounds {
            min: parse_int(min, "min_salary")?,
            max: parse_int(max, "max_salary")?,
        });
    }
    if let Some(salary_type) = filled(&query.salary_type) {
        filters.push(Filter::SalaryType(salary_type.to_string()));
    }
    if filled(&query.is_remote).is_some() {
        filters.push(Filter::Remote);
    }
    if let Some(slug) = browse_slug.filter(|s| !s.trim().is_empty()) {
        filters.push(Filter::BrowseSlug(slug.to_string()));
    }
    if let Some(category) = filled(&query.category) {
        filters.push(Filter::CategorySlug(category.to_string()));
    }
    if let Some(service) = filled(&query.service) {
        filters.push(Filter::ServiceSlug(service.to_string()));
    }
    if let Some(tags) = filled(&query.tags) {
        let ids = tags
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| parse_int(part, "tags"))
            .collect::<Result<Vec<i64>>>()?;
        if !ids.is_empty() {
            filters.push(Filter::Tags(ids));
        }
    }
    if let Some(country) = filled(&query.country) {
        filters.push(Filter::Country(parse_int(country, "country")?));
    }
    if let Some(state) = filled(&query.state) {
        filters.push(Filter::State(parse_int(state, "state")?));
    }

    Ok(filters)
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_int(raw: &str, field: &'static str) -> Result<i64> {
    raw.parse().map_err(|_| {
        field_error(field, "integer", format!("{} must be an integer", field)).into()
    })
}

/// Compiles a filter set into a WHERE conjunction with positional binds. The
/// public visibility constraint (active status, live window open) is always
/// the first clause; an empty filter set compiles to exactly that constraint.
pub fn compile(filters: &[Filter], table: &FamilyTable) -> CompiledQuery {
    let mut clauses = Vec::new();
    let mut args: Vec<SqlArg> = Vec::new();

    clauses.push("status = 1".to_string());
    clauses.push(format!("live_expire_at > ${}", args.len() + 1));
    args.push(SqlArg::Timestamp(time::today_start()));

    for filter in filters {
        match filter {
            Filter::Keyword(keyword) => {
                clauses.push(format!("title ILIKE ${}", args.len() + 1));
                args.push(SqlArg::Text(format!("%{}%", keyword)));
            }
            Filter::Experience(experience) => {
                clauses.push(format!("experience = ${}", args.len() + 1));
                args.push(SqlArg::Text(experience.clone()));
            }
            Filter::OpportunityType(type_key) => {
                clauses.push(format!("type = ${}", args.len() + 1));
                args.push(SqlArg::Text(type_key.clone()));
            }
            Filter::Family(family) => match table.types_of(family) {
                Some(types) => {
                    let placeholders: Vec<String> = types
                        .iter()
                        .enumerate()
                        .map(|(i, _)| format!("${}", args.len() + 1 + i))
                        .collect();
                    clauses.push(format!("type IN ({})", placeholders.join(", ")));
                    for type_key in types {
                        args.push(SqlArg::Text((*type_key).to_string()));
                    }
                }
                // Unknown family names match nothing rather than erroring,
                // mirroring an IN over an empty type list.
                None => clauses.push("FALSE".to_string()),
            },
            Filter::Currency(currency) => {
                clauses.push(format!("currency = ${}", args.len() + 1));
                args.push(SqlArg::Text(currency.clone()));
            }
            Filter::SalaryType(salary_type) => {
                clauses.push(format!("salary_type = ${}", args.len() + 1));
                args.push(SqlArg::Text(salary_type.clone()));
            }
            Filter::SalaryBounds { min, max } => {
                clauses.push(format!(
                    "(salary_min >= ${} AND salary_max <= ${})",
                    args.len() + 1,
                    args.len() + 2
                ));
                args.push(SqlArg::Int(*min));
                args.push(SqlArg::Int(*max));
            }
            Filter::Remote => {
                clauses.push("(meta->>'is_remote')::boolean IS TRUE".to_string());
            }
            Filter::BrowseSlug(slug) => {
                let first = args.len() + 1;
                let second = first + 1;
                clauses.push(format!(
                    "(EXISTS (SELECT 1 FROM category_opening co \
                       JOIN categories c ON c.id = co.category_id \
                       WHERE co.opening_id = openings.id \
                         AND c.kind IN ({kinds}) \
                         AND c.slug ILIKE ${first}) \
                      OR EXISTS (SELECT 1 FROM categories s \
                       WHERE s.id = openings.category_id AND s.slug ILIKE ${second}))",
                    kinds = kind_list(CATEGORY_KINDS),
                    first = first,
                    second = second,
                ));
                args.push(SqlArg::Text(format!("%{}%", slug)));
                args.push(SqlArg::Text(format!("%{}%", slug)));
            }
            Filter::CategorySlug(slug) => {
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM category_opening co \
                       JOIN categories c ON c.id = co.category_id \
                       WHERE co.opening_id = openings.id \
                         AND c.kind IN ({kinds}) \
                         AND c.slug ILIKE ${n})",
                    kinds = kind_list(CATEGORY_KINDS),
                    n = args.len() + 1,
                ));
                args.push(SqlArg::Text(format!("%{}%", slug)));
            }
            Filter::ServiceSlug(slug) => {
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM categories s \
                       WHERE s.id = openings.category_id AND s.slug ILIKE ${})",
                    args.len() + 1,
                ));
                args.push(SqlArg::Text(format!("%{}%", slug)));
            }
            Filter::Tags(ids) => {
                let placeholders: Vec<String> = ids
                    .iter()
                    .enumerate()
                    .map(|(i, _)| format!("${}", args.len() + 1 + i))
                    .collect();
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM category_opening co \
                       WHERE co.opening_id = openings.id \
                         AND co.category_id IN ({}))",
                    placeholders.join(", ")
                ));
                for id in ids {
                    args.push(SqlArg::Int(*id));
                }
            }
            Filter::Country(id) => {
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM location_opening lo \
                       WHERE lo.opening_id = openings.id AND lo.country_id = ${})",
                    args.len() + 1,
                ));
                args.push(SqlArg::Int(*id));
            }
            Filter::State(id) => {
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM location_opening lo \
                       WHERE lo.opening_id = openings.id AND lo.state_id = ${})",
                    args.len() + 1,
                ));
                args.push(SqlArg::Int(*id));
            }
        }
    }

    CompiledQuery { clauses, args }
}

fn kind_list(kinds: &[&str]) -> String {
    kinds
        .iter()
        .map(|k| format!("'{}'", k))
        .collect::<Vec<_>>()
        .join(", ")
}
