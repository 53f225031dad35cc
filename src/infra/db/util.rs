use sqlx::{Postgres, QueryBuilder};

use crate::application::repos::RepoError;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db)
            if db.message().contains("invalid input syntax")
                || db.message().contains("violates") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        other => RepoError::from_persistence(other),
    }
}

pub(super) fn convert_count(value: i64) -> Result<u64, RepoError> {
    value
        .try_into()
        .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
}

/// `LIMIT`/`OFFSET` for a 1-based page.
pub(super) fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page_number: u32, page_size: u32) {
    let offset = i64::from(page_number.saturating_sub(1)) * i64::from(page_size);
    qb.push(" LIMIT ");
    qb.push_bind(i64::from(page_size));
    qb.push(" OFFSET ");
    qb.push_bind(offset);
}

/// Append ` AND <column> ILIKE '%value%'` for a non-blank filter value.
pub(super) fn push_contains<'q>(
    qb: &mut QueryBuilder<'q, Postgres>,
    column: &'static str,
    value: Option<&str>,
) {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return;
    };
    qb.push(" AND ");
    qb.push(column);
    qb.push(" ILIKE ");
    qb.push_bind(format!("%{}%", escape_like(value)));
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Translate a client `orderBy` (`"LastName desc, FirstName"`) into an
/// `ORDER BY` clause over whitelisted columns.
///
/// Unknown fields are skipped; when nothing usable remains `fallback` is
/// used. Column names never come from the client.
pub(super) fn order_clause(
    order_by: Option<&str>,
    columns: &[(&str, &'static str)],
    fallback: &'static str,
) -> String {
    let terms: Vec<String> = order_by
        .unwrap_or_default()
        .split(',')
        .filter_map(|term| {
            let mut parts = term.split_whitespace();
            let field = parts.next()?;
            let column = columns
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(field))
                .map(|(_, column)| *column)?;
            let direction = match parts.next() {
                Some(dir) if dir.eq_ignore_ascii_case("desc") => "DESC",
                _ => "ASC",
            };
            Some(format!("{column} {direction}"))
        })
        .collect();

    if terms.is_empty() {
        fallback.to_string()
    } else {
        terms.join(", ")
    }
}
