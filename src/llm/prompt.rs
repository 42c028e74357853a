use regex::Regex;
use std::sync::LazyLock;

use crate::db::SqlDialect;

const FENCE: &str = "```";

// An opening fence whose line holds nothing but an optional language tag
static OPENING_FENCE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^```[ \t]*(?:[A-Za-z][\w+#.-]*)?[ \t]*(?:\r?\n|$)")
        .expect("opening fence pattern is valid")
});

/// Builds the system instruction: the schema verbatim, the fixed rule list
/// and two worked examples, aimed at `dialect`. Same inputs, same prompt.
pub fn build_system_prompt(schema: &str, dialect: SqlDialect) -> String {
    let dialect = dialect.name();
    format!(
        r#"You are an expert SQL analyst for a financial analytics database.
Generate ONLY valid {dialect} SQL queries based on the user's question.

{schema}

Rules:
1. Return ONLY the SQL query, no explanations or markdown
2. Use proper {dialect} syntax
3. Always use table aliases for clarity
4. For date ranges, use appropriate date functions
5. For aggregations, include proper GROUP BY clauses
6. Use LIMIT clauses for large result sets (default LIMIT 100)
7. Always use proper field names as defined in the schema

Examples:
- "total spend this year" → SELECT SUM(i.total_amount) FROM invoices i WHERE i.status = 'PAID' AND i.issue_date >= DATE_TRUNC('year', CURRENT_DATE)
- "top 5 vendors" → SELECT v.name, SUM(i.total_amount) AS total_spend FROM vendors v JOIN invoices i ON v.id = i.vendor_id WHERE i.status = 'PAID' GROUP BY v.id, v.name ORDER BY total_spend DESC LIMIT 5
"#
    )
}

/// Trims the completion and drops a leading triple-backtick fence (any
/// language tag) along with everything from the closing fence onwards.
/// Text without a leading fence is returned trimmed.
pub fn strip_code_fence(raw: &str) -> String {
    let text = raw.trim();
    if !text.starts_with(FENCE) {
        return text.to_string();
    }

    let body = match OPENING_FENCE_LINE.find(text) {
        Some(opening) => &text[opening.end()..],
        // Single-line form: ```SELECT 1```
        None => &text[FENCE.len()..],
    };
    let body = body.find(FENCE).map_or(body, |end| &body[..end]);

    body.trim().to_string()
}
