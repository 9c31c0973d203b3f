//! Deterministic JQL generation from request wording.

use std::sync::LazyLock;

use regex::Regex;

const ORDER_BY: &str = "ORDER BY created DESC";

/// Used when no wording maps to a clause.
const RECENT_ITEMS: &str = "created >= -7d";

static PROJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?i:\bproject)\s*[:=]?\s*|\bin\s+)([A-Z][A-Z0-9_]{1,9})\b").expect("project pattern compiles")
});

static ASSIGNED_TO_ME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bassigned to (me|myself)\b|\bmy (tickets|issues|tasks|bugs|stories|work)\b|\bmine\b")
        .expect("assigned-to-me pattern compiles")
});

static ASSIGNED_TO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bassigned to ([A-Za-z0-9_.@+-]+)").expect("assigned-to pattern compiles")
});

static CONTAINS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:contains?|containing|mentioning)\s+(?:"([^"]+)"|'([^']+)'|([^\s?.!,]+))"#)
        .expect("contains pattern compiles")
});

/// Status wording. Every match contributes to the status clause.
const STATUSES: &[(&str, &str)] = &[
    (r"\bin progress\b", "In Progress"),
    (r"\b(to do|todo)\b", "To Do"),
    (r"\bopen\b", "Open"),
    (r"\bdone\b", "Done"),
    (r"\bclosed\b", "Closed"),
    (r"\bresolved\b", "Resolved"),
];

const PRIORITIES: &[(&str, &str)] = &[
    ("highest", "Highest"),
    ("high", "High"),
    ("medium", "Medium"),
    ("lowest", "Lowest"),
    ("low", "Low"),
];

const ISSUE_TYPES: &[(&[&str], &str)] = &[
    (&["bug", "bugs"], "Bug"),
    (&["story", "stories"], "Story"),
    (&["epic", "epics"], "Epic"),
    (&["task", "tasks"], "Task"),
];

static STATUS_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    STATUSES
        .iter()
        .map(|(p, s)| (Regex::new(p).expect("status pattern compiles"), *s))
        .collect()
});

/// Build a JQL query for a search request.
pub fn build_jql(request: &str) -> String {
    let lower = request.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let mut clauses = Vec::new();

    if let Some(key) = project_key(request) {
        clauses.push(format!("project = {}", key));
    }

    if lower.contains("unassigned") || lower.contains("not assigned") {
        clauses.push("assignee is EMPTY".to_string());
    } else if ASSIGNED_TO_ME.is_match(&lower) {
        clauses.push("assignee = currentUser()".to_string());
    } else if let Some(who) = ASSIGNED_TO.captures(request).and_then(|c| c.get(1)) {
        clauses.push(format!("assignee = \"{}\"", escape(who.as_str())));
    }

    let statuses: Vec<&str> = STATUS_PATTERNS
        .iter()
        .filter(|(re, _)| re.is_match(&lower))
        .map(|(_, status)| *status)
        .collect();
    match statuses.as_slice() {
        [] => {}
        [one] => clauses.push(format!("status = \"{}\"", one)),
        many => clauses.push(format!(
            "status in ({})",
            many.iter()
                .map(|s| format!("\"{}\"", s))
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }

    if words.contains(&"priority")
        && let Some((_, priority)) = PRIORITIES.iter().find(|(w, _)| words.contains(w))
    {
        clauses.push(format!("priority = {}", priority));
    }

    if let Some((_, issue_type)) = ISSUE_TYPES
        .iter()
        .find(|(forms, _)| forms.iter().any(|f| words.contains(f)))
    {
        clauses.push(format!("issuetype = {}", issue_type));
    }

    for field in ["created", "updated"] {
        if let Some(clause) = date_clause(&lower, field) {
            clauses.push(clause);
        }
    }

    if let Some(caps) = CONTAINS.captures(request) {
        let text = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str());
        if let Some(text) = text {
            clauses.push(format!("text ~ \"{}\"", escape(text)));
        }
    }

    if clauses.is_empty() {
        clauses.push(RECENT_ITEMS.to_string());
    }
    format!("{} {}", clauses.join(" AND "), ORDER_BY)
}

/// Project key named by `project KEY`, `project: KEY` or `in KEY`.
pub(crate) fn project_key(request: &str) -> Option<&str> {
    PROJECT
        .captures(request)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn date_clause(lower: &str, field: &str) -> Option<String> {
    let has = |when: &str| lower.contains(&format!("{} {}", field, when));
    if has("today") {
        Some(format!("{} >= startOfDay()", field))
    } else if has("yesterday") {
        Some(format!("{f} >= startOfDay(-1) AND {f} <= endOfDay(-1)", f = field))
    } else if has("this week") {
        Some(format!("{} >= startOfWeek()", field))
    } else if has("last week") {
        Some(format!("{f} >= startOfWeek(-1) AND {f} <= endOfWeek(-1)", f = field))
    } else {
        None
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assigned_to_me() {
        assert_eq!(
            build_jql("What tickets are assigned to me?"),
            "assignee = currentUser() ORDER BY created DESC"
        );
        assert_eq!(
            build_jql("show my tickets"),
            "assignee = currentUser() ORDER BY created DESC"
        );
    }

    #[test]
    fn test_assigned_to_someone() {
        assert_eq!(
            build_jql("issues assigned to melanie.b"),
            "assignee = \"melanie.b\" ORDER BY created DESC"
        );
        assert_eq!(
            build_jql("list unassigned bugs"),
            "assignee is EMPTY AND issuetype = Bug ORDER BY created DESC"
        );
    }

    #[test]
    fn test_project_status_priority() {
        assert_eq!(
            build_jql("open high priority tickets in project PGA"),
            "project = PGA AND status = \"Open\" AND priority = High ORDER BY created DESC"
        );
        assert_eq!(
            build_jql("what is in progress or to do in OPS"),
            "project = OPS AND status in (\"In Progress\", \"To Do\") ORDER BY created DESC"
        );
    }

    #[test]
    fn test_priority_words_need_priority() {
        assert_eq!(
            build_jql("show me low hanging fruit"),
            "created >= -7d ORDER BY created DESC"
        );
    }

    #[test]
    fn test_dates_and_text() {
        assert_eq!(
            build_jql("stories created this week that contain \"login page\""),
            "issuetype = Story AND created >= startOfWeek() AND text ~ \"login page\" ORDER BY created DESC"
        );
        assert_eq!(
            build_jql("tickets updated yesterday"),
            "updated >= startOfDay(-1) AND updated <= endOfDay(-1) ORDER BY created DESC"
        );
    }

    #[test]
    fn test_default_query() {
        assert_eq!(build_jql("show me tickets"), "created >= -7d ORDER BY created DESC");
    }
}
