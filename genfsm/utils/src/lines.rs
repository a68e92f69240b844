use std::fmt;

const INDENT: &str = "  ";

/// Text assembled line by line. Every line remembers its nesting level and
/// is rendered with two spaces per level and no trailing whitespace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Lines {
    lines: Vec<(usize, String)>,
    level: usize,
}

impl Lines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `text` at the current nesting level. Embedded newlines start new
    /// lines at the same level.
    pub fn push<S: AsRef<str>>(&mut self, text: S) {
        for line in text.as_ref().split('\n') {
            self.lines.push((self.level, line.trim_end().to_string()));
        }
    }

    pub fn indent(&mut self) {
        self.level += 1;
    }

    pub fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    /// Append `other` nested under the current level.
    pub fn nest(&mut self, other: Lines) {
        let base = self.level;
        self.lines.extend(
            other.lines.into_iter().map(|(lvl, text)| (base + lvl, text)),
        );
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The rendered lines, without line terminators.
    pub fn rendered(&self) -> impl Iterator<Item = String> + '_ {
        self.lines.iter().map(|(lvl, text)| {
            if text.is_empty() {
                String::new()
            } else {
                format!("{}{}", INDENT.repeat(*lvl), text)
            }
        })
    }
}

impl fmt::Display for Lines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.rendered() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
