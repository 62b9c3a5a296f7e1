//! Structural view of a substituted pattern: anchored segments, relative marker, trailing slash.

use std::path::{Component, Path, PathBuf};

use crate::domain::errors::PatternError;

const SEPARATOR: char = '/';

/// One path component of a pattern, kept in glob source form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    raw: String,
    wildcard: bool,
}

impl Segment {
    fn from_raw(raw: &str, extended: bool) -> Self {
        Self {
            raw: raw.to_owned(),
            wildcard: has_wildcard(raw, extended),
        }
    }

    /// A segment naming exactly `name`, with glob metacharacters escaped.
    pub fn literal(name: &str) -> Self {
        Self {
            raw: escape(name),
            wildcard: false,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// The filesystem name of a literal segment.
    pub fn name(&self) -> String {
        unescape(&self.raw)
    }
}

/// An absolute pattern split into segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternPath {
    segments: Vec<Segment>,
    /// Number of segments preceding the first `/./`.
    marker: Option<usize>,
    trailing_slash: bool,
}

impl PatternPath {
    /// Parse substituted pattern text. Relative text is anchored at `base`.
    pub fn parse(text: &str, base: &Path, extended: bool) -> Result<Self, PatternError> {
        if text.is_empty() {
            return Err(PatternError::parse("empty pattern"));
        }

        let absolute = text.starts_with(SEPARATOR);
        let mut segments = Vec::new();
        if !absolute {
            if !base.is_absolute() {
                return Err(PatternError::configuration(format!(
                    "base directory {} is not absolute",
                    base.display()
                )));
            }
            for component in base.components() {
                match component {
                    Component::Normal(name) => {
                        segments.push(Segment::literal(&name.to_string_lossy()))
                    }
                    Component::ParentDir => segments.push(Segment::literal("..")),
                    _ => {}
                }
            }
        }

        let parts: Vec<&str> = text.split(SEPARATOR).collect();
        let last = parts.len() - 1;
        let mut marker = None;
        for (index, part) in parts.iter().enumerate() {
            match *part {
                "" => {}
                "." => {
                    // `/./` needs a separator on both sides; a leading `./` is just the base.
                    let preceded = index > 0;
                    if marker.is_none() && preceded && index < last {
                        marker = Some(segments.len());
                    }
                }
                raw => segments.push(Segment::from_raw(raw, extended)),
            }
        }

        Ok(Self {
            segments,
            marker,
            trailing_slash: text.len() > 1 && text.ends_with(SEPARATOR),
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn marker(&self) -> Option<usize> {
        self.marker
    }

    pub fn has_trailing_slash(&self) -> bool {
        self.trailing_slash
    }

    pub fn first_wildcard(&self) -> Option<usize> {
        self.segments.iter().position(Segment::is_wildcard)
    }

    pub fn has_wildcard(&self) -> bool {
        self.first_wildcard().is_some()
    }

    /// The path named by a wildcard-free pattern.
    pub fn literal_path(&self) -> PathBuf {
        let mut path = PathBuf::from(SEPARATOR.to_string());
        for segment in &self.segments {
            path.push(segment.name());
        }
        path
    }

    /// Segments after the first `depth`, rejoined as glob text.
    pub fn implied_part(&self, depth: usize) -> String {
        let mut part = self.segments[depth.min(self.segments.len())..]
            .iter()
            .map(Segment::raw)
            .collect::<Vec<_>>()
            .join("/");
        if self.trailing_slash && !part.is_empty() {
            part.push(SEPARATOR);
        }
        part
    }

    /// Replace the first `depth` segments with the components of `root`.
    /// Returns the new pattern and the depth of `root`.
    pub fn reroot(&self, depth: usize, root: &Path) -> Result<(Self, usize), PatternError> {
        if depth >= self.segments.len() {
            return Err(PatternError::configuration(
                "empty implied part cannot be re-rooted",
            ));
        }
        let mut segments: Vec<Segment> = root
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(Segment::literal(&name.to_string_lossy())),
                Component::ParentDir => Some(Segment::literal("..")),
                _ => None,
            })
            .collect();
        let new_depth = segments.len();
        segments.extend(self.segments[depth..].iter().cloned());
        Ok((
            Self {
                segments,
                marker: Some(new_depth),
                trailing_slash: self.trailing_slash,
            },
            new_depth,
        ))
    }
}

/// Whether `raw` contains an unescaped glob operator.
pub fn has_wildcard(raw: &str, extended: bool) -> bool {
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '(' if extended && i > 0 && matches!(chars[i - 1], '?' | '*' | '+' | '@' | '!') => {
                if chars[i + 1..].contains(&')') {
                    return true;
                }
            }
            '*' | '?' => return true,
            '[' => {
                if class_end(&chars, i).is_some() {
                    return true;
                }
            }
            _ => {}
        }
        i += 1;
    }
    false
}

/// Index of the `]` closing the bracket expression opened at `open`.
pub(crate) fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut i = open + 1;
    if matches!(chars.get(i), Some('!' | '^')) {
        i += 1;
    }
    // A `]` right after the opening bracket is a member, not the terminator.
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            ']' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

pub fn escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '\\' | '*' | '?' | '[' | ']' | '{' | '}' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> PatternPath {
        PatternPath::parse(text, Path::new("/work"), false).expect("pattern parses")
    }

    fn raws(pattern: &PatternPath) -> Vec<&str> {
        pattern.segments().iter().map(Segment::raw).collect()
    }

    #[test]
    fn relative_patterns_are_anchored_at_base() {
        let pattern = parse("./docs//notes.txt");
        assert_eq!(raws(&pattern), ["work", "docs", "notes.txt"]);
        assert_eq!(pattern.marker(), None);
    }

    #[test]
    fn records_only_first_relative_marker() {
        let pattern = parse("/home/u/./a/./b");
        assert_eq!(pattern.marker(), Some(2));
        assert_eq!(raws(&pattern), ["home", "u", "a", "b"]);

        let relative = parse("src/./lib");
        assert_eq!(relative.marker(), Some(2));
    }

    #[test]
    fn trailing_slash_is_recorded_without_a_segment() {
        let pattern = parse("/srv/data/");
        assert!(pattern.has_trailing_slash());
        assert_eq!(raws(&pattern), ["srv", "data"]);
        assert_eq!(pattern.implied_part(1), "data/");
    }

    #[test]
    fn detects_wildcards_and_escapes() {
        assert!(has_wildcard("*.txt", false));
        assert!(has_wildcard("file[0-9]", false));
        assert!(!has_wildcard(r"file\*", false));
        assert!(!has_wildcard("file[", false));
        assert!(!has_wildcard("@(a|b)", false));
        assert!(has_wildcard("@(a|b)", true));
        assert!(has_wildcard("!(core)", true));
    }

    #[test]
    fn literal_segments_escape_metacharacters() {
        let segment = Segment::literal("odd[1]*");
        assert!(!segment.is_wildcard());
        assert_eq!(segment.name(), "odd[1]*");
        assert_eq!(unescape(r"a\#b\\"), r"a#b\");
    }

    #[test]
    fn reroot_replaces_implied_prefix() -> anyhow::Result<()> {
        let pattern = parse("/home/u/*/bar");
        let (rerooted, depth) = pattern.reroot(2, Path::new("/mnt/snap"))?;
        assert_eq!(depth, 2);
        assert_eq!(raws(&rerooted), ["mnt", "snap", "*", "bar"]);

        let err = parse("/home/u/file").reroot(3, Path::new("/mnt")).unwrap_err();
        assert!(matches!(err, PatternError::Configuration(_)));
        Ok(())
    }
}
