/// One nesting level of indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentUnit {
    Tab,
    Spaces(usize),
}

impl IndentUnit {
    /// Width assumed for space indentation when nothing narrower is observed.
    pub const DEFAULT_SPACE_WIDTH: usize = 4;

    /// Detect the dominant indentation style of a set of lines.
    ///
    /// Counts lines starting with a tab against lines starting with a space.
    /// Ties (including no indentation at all) go to tabs. The space width is
    /// the narrowest pure-space indentation seen.
    pub fn detect<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut tab_lines = 0usize;
        let mut space_lines = 0usize;
        let mut narrowest: Option<usize> = None;

        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with('\t') {
                tab_lines += 1;
            } else if line.starts_with(' ') {
                space_lines += 1;
                let lead = leading_whitespace(line);
                if !lead.contains('\t') {
                    narrowest = Some(narrowest.map_or(lead.len(), |n| n.min(lead.len())));
                }
            }
        }

        if space_lines > tab_lines {
            IndentUnit::Spaces(narrowest.unwrap_or(Self::DEFAULT_SPACE_WIDTH))
        } else {
            IndentUnit::Tab
        }
    }

    fn space_width(self) -> usize {
        match self {
            IndentUnit::Tab => Self::DEFAULT_SPACE_WIDTH,
            IndentUnit::Spaces(width) => width.max(1),
        }
    }

    /// Nesting depth of a line. Each tab is one level; spaces count
    /// `width` per level, partial levels rounding down.
    pub fn depth_of(self, line: &str) -> usize {
        let lead = leading_whitespace(line);
        let tabs = lead.chars().filter(|&c| c == '\t').count();
        let spaces = lead.len() - tabs;
        tabs + spaces / self.space_width()
    }

    /// Whitespace for `depth` levels.
    pub fn render(self, depth: usize) -> String {
        match self {
            IndentUnit::Tab => "\t".repeat(depth),
            IndentUnit::Spaces(width) => " ".repeat(width * depth),
        }
    }

    /// Remove at most `levels` levels of leading indentation from `line`.
    pub fn strip_levels(self, line: &str, levels: usize) -> &str {
        let width = self.space_width();
        let mut depth = 0;
        let mut pending_spaces = 0;
        let mut cut = 0;

        for (i, c) in line.char_indices() {
            if depth >= levels {
                break;
            }
            match c {
                '\t' => {
                    depth += 1;
                    pending_spaces = 0;
                    cut = i + 1;
                }
                ' ' => {
                    pending_spaces += 1;
                    if pending_spaces == width {
                        depth += 1;
                        pending_spaces = 0;
                        cut = i + 1;
                    }
                }
                _ => break,
            }
        }

        &line[cut..]
    }
}

/// The run of tabs and spaces at the start of `line`.
pub fn leading_whitespace(line: &str) -> &str {
    let end = line
        .find(|c: char| c != '\t' && c != ' ')
        .unwrap_or(line.len());
    &line[..end]
}

/// True if the leading whitespace of `line` contains both tabs and spaces.
pub fn has_mixed_indentation(line: &str) -> bool {
    let lead = leading_whitespace(line);
    lead.contains('\t') && lead.contains(' ')
}
