use serde::Serialize;

/// Ordered column headers read from the first row of a range.
///
/// The schema is the only authority on column order and column count. It is
/// re-read from the sheet rather than hard-coded, so the same adapter serves
/// any sheet layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    headers: Vec<String>,
}

impl Schema {
    /// Wrap a header row as read from the sheet. Blank headers are kept so
    /// positions stay aligned with the columns.
    pub fn new(headers: Vec<String>) -> Self {
        Schema { headers }
    }

    /// An empty schema signals an uninitialized sheet.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Header at `index`, or `None` past the end.
    pub fn header_at(&self, index: usize) -> Option<&str> {
        self.headers.get(index).map(String::as_str)
    }

    /// Resolve the header at `index`, falling back to `default` when the
    /// column is missing or its header is blank.
    ///
    /// # Arguments
    /// * `index` - Zero-based column position
    /// * `default` - Label used when the sheet has nothing usable there
    ///
    /// # Examples
    /// ```
    /// use sheetdesk::schema::Schema;
    ///
    /// let schema = Schema::new(vec!["Name *".to_string(), " ".to_string()]);
    /// assert_eq!(schema.label_or(0, "Name"), "Name *");
    /// assert_eq!(schema.label_or(1, "Assigned To"), "Assigned To");
    /// assert_eq!(schema.label_or(14, "To Date"), "To Date");
    /// ```
    pub fn label_or<'a>(&'a self, index: usize, default: &'a str) -> &'a str {
        safe_label(self.header_at(index), default)
    }

    /// Position of the first header equal to `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// `value` if it holds non-blank text, otherwise `default`.
pub fn safe_label<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec!["Name".into(), "  ".into(), "Topic".into()])
    }

    #[test]
    fn label_beyond_schema_uses_default() {
        let s = schema();
        assert_eq!(s.label_or(2, "Topic *"), "Topic");
        assert_eq!(s.label_or(3, "Description"), "Description");
        assert_eq!(s.label_or(99, "Submit"), "Submit");
        assert_eq!(s.header_at(3), None);
    }

    #[test]
    fn blank_header_uses_default() {
        assert_eq!(schema().label_or(1, "Assigned To"), "Assigned To");
        assert_eq!(safe_label(None, ""), "");
    }

    #[test]
    fn position_matches_exact_header() {
        let s = schema();
        assert_eq!(s.position("Topic"), Some(2));
        assert_eq!(s.position("topic"), None);
        assert!(!s.is_empty());
        assert!(Schema::default().is_empty());
    }
}
