/// Raw output of one statement
///
/// The text is kept exactly as the server produced it: the literal format is
/// part of what a compatibility run checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    /// Response body, tab-separated fields, newline-terminated rows
    pub output: String,
    /// HTTP status returned with the body
    pub status: u16,
}

impl QueryResult {
    pub fn new(
        output: impl Into<String>,
        status: u16,
    ) -> Self {
        Self {
            output: output.into(),
            status,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Rows split into fields; a trailing newline does not produce an empty row.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        self.output.lines().map(|line| line.split('\t').collect())
    }

    pub fn row_count(&self) -> usize {
        self.output.lines().count()
    }
}
