use std::path::PathBuf;

/// A byte range into a source file. The front end attaches one of these to
/// every typed tree node so the middle tier can point diagnostics back at
/// source code it never reads itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug)]
pub struct SourceFile {
    pub contents: String,
    pub origin: SourceFileOrigin,
}

impl SourceFile {
    pub fn value_of_span(&self, span: Span) -> &str {
        &self.contents[span.start..span.end]
    }

    /// 1-based line number for a byte position
    pub fn row_for_position(&self, position: usize) -> usize {
        self.contents[..position.min(self.contents.len())]
            .bytes()
            .filter(|b| *b == b'\n')
            .count()
            + 1
    }

    /// 1-based column number for a byte position
    pub fn column_for_position(&self, position: usize) -> usize {
        let position = position.min(self.contents.len());
        let line_start = self.contents[..position]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);

        position - line_start + 1
    }

    pub fn line_for_position(&self, position: usize) -> &str {
        let position = position.min(self.contents.len());
        let start = self.contents[..position]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let end = self.contents[position..]
            .find('\n')
            .map(|i| position + i)
            .unwrap_or(self.contents.len());

        &self.contents[start..end]
    }
}

#[derive(Debug)]
pub enum SourceFileOrigin {
    Memory,
    File(PathBuf),
}

impl core::fmt::Display for SourceFileOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFileOrigin::Memory => f.write_str("<memory>"),
            SourceFileOrigin::File(path) => f.write_fmt(format_args!("{}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceFile {
        SourceFile {
            contents: "let x = 1;\nlet y = 2;\n".to_owned(),
            origin: SourceFileOrigin::Memory,
        }
    }

    #[test]
    fn spans_recover_their_source_text() {
        let source = source();
        assert_eq!(source.value_of_span(Span::new(15, 16)), "y");
        assert_eq!(source.value_of_span(Span::new(11, 14)), "let");
    }

    #[test]
    fn joined_spans_cover_both_endpoints() {
        let source = source();
        let keyword = Span::new(11, 14);
        let name = Span::new(15, 16);

        let joined = keyword.to(name);
        assert_eq!(joined, Span::new(11, 16));
        assert_eq!(source.value_of_span(joined), "let y");
        // order does not matter
        assert_eq!(name.to(keyword), joined);
    }

    #[test]
    fn positions_map_to_rows_and_columns() {
        let source = source();
        assert_eq!(source.row_for_position(15), 2);
        assert_eq!(source.column_for_position(15), 5);
        assert_eq!(source.line_for_position(15), "let y = 2;");
    }
}
