use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use sfbank_model::IoKind;

use super::types::{SfzFile, SfzSection, SfzSectionType};
use crate::error::{Result, SfzError};

/// A header or an opcode once directives are applied.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Header(SfzSectionType),
    /// Header this parser does not know; its opcodes are skipped.
    Unknown(String),
    Opcode(String, String),
}

/// Parse SFZ text. `#include` paths are taken relative to the working
/// directory.
pub fn parse_sfz(content: &str) -> Result<SfzFile> {
    let mut pre = Preprocessor::default();
    pre.process_text(content)?;
    Ok(pre.finish(None))
}

/// Parse an SFZ file with its includes.
///
/// # SFZ File Format
///
/// 1. **Headers** in angle brackets, like `<region>` or `<global>`
/// 2. **Opcodes**: `name=value` pairs, several per line allowed. A value
///    may contain spaces and runs to the next `name=` or header
/// 3. **Comments**: `//` to the end of the line, `/* ... */` blocks
/// 4. **Directives**: `#define $NAME value` and `#include "file.sfz"`
///
/// Included paths are relative to the including file. A file that ends up
/// including itself is rejected with [`SfzError::InclusionCycle`].
pub fn parse_sfz_path(path: &Path) -> Result<SfzFile> {
    let mut pre = Preprocessor::default();
    let canonical = pre.process_file(path)?;
    Ok(pre.finish(Some(canonical)))
}

#[derive(Default)]
struct Preprocessor {
    /// Sorted longest name first so that `$AB` wins over `$A`.
    defines: Vec<(String, String)>,
    /// Canonical paths of the files being read, outermost first.
    stack: Vec<PathBuf>,
    includes: Vec<PathBuf>,
    tokens: Vec<Token>,
}

impl Preprocessor {
    fn process_file(&mut self, path: &Path) -> Result<PathBuf> {
        let canonical = fs::canonicalize(path).map_err(|e| SfzError::io(path, &e, IoKind::Read))?;
        if self.stack.contains(&canonical) {
            let mut chain = self.stack.clone();
            chain.push(canonical.clone());
            return Err(SfzError::InclusionCycle {
                path: canonical,
                chain,
            });
        }
        let text = fs::read_to_string(&canonical)
            .map_err(|e| SfzError::io(&canonical, &e, IoKind::Read))?;
        if !self.stack.is_empty() {
            debug!("Including {}", canonical.display());
            self.includes.push(canonical.clone());
        }
        self.stack.push(canonical.clone());
        let result = self.process_text(&text);
        self.stack.pop();
        result.map(|_| canonical)
    }

    fn process_text(&mut self, text: &str) -> Result<()> {
        let text = self.strip_comments(text)?;
        for (index, line) in text.lines().enumerate() {
            let number = index + 1;
            let trimmed = line.trim_start();
            let column = line.len() - trimmed.len() + 1;
            if let Some(rest) = trimmed.strip_prefix("#define") {
                self.define(rest, number, column)?;
            } else if let Some(rest) = trimmed.strip_prefix("#include") {
                self.include(rest, number, column)?;
            } else {
                let line = self.substitute(line);
                self.tokenize(&line, number)?;
            }
        }
        Ok(())
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> SfzError {
        SfzError::ParseAt {
            path: self.stack.last().cloned().unwrap_or_default(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Replace comments with blanks, keeping line breaks so that positions
    /// stay meaningful.
    fn strip_comments(&self, text: &str) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.char_indices().peekable();
        let mut line = 1;
        let mut line_start = 0;
        while let Some((index, c)) = chars.next() {
            let next = chars.peek().map(|&(_, n)| n);
            if c == '/' && next == Some('/') {
                while let Some(&(_, n)) = chars.peek() {
                    if n == '\n' {
                        break;
                    }
                    chars.next();
                }
            } else if c == '/' && next == Some('*') {
                chars.next();
                let (open_line, open_column) = (line, index - line_start + 1);
                let mut previous = '\0';
                let mut closed = false;
                for (i, n) in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                        line += 1;
                        line_start = i + 1;
                    }
                    if previous == '*' && n == '/' {
                        closed = true;
                        break;
                    }
                    previous = n;
                }
                if !closed {
                    return Err(self.error(open_line, open_column, "unterminated block comment"));
                }
                out.push(' ');
            } else {
                if c == '\n' {
                    line += 1;
                    line_start = index + 1;
                }
                out.push(c);
            }
        }
        Ok(out)
    }

    fn define(&mut self, rest: &str, line: usize, column: usize) -> Result<()> {
        let rest = rest.trim();
        let (name, value) = match rest.split_once(char::is_whitespace) {
            Some((name, value)) => (name, value.trim()),
            None => (rest, ""),
        };
        if name.len() < 2 || !name.starts_with('$') {
            return Err(self.error(line, column, "expected $NAME after #define"));
        }
        self.defines.retain(|(n, _)| n != name);
        self.defines.push((name.to_string(), value.to_string()));
        self.defines.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Ok(())
    }

    fn substitute(&self, line: &str) -> String {
        if !line.contains('$') {
            return line.to_string();
        }
        self.defines
            .iter()
            .fold(line.to_string(), |line, (name, value)| line.replace(name.as_str(), value))
    }

    fn include(&mut self, rest: &str, line: usize, column: usize) -> Result<()> {
        let rest = self.substitute(rest.trim());
        let relative = rest
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .filter(|r| !r.is_empty())
            .ok_or_else(|| self.error(line, column, "expected a quoted path after #include"))?;
        let relative = super::path_utils::normalize_path(relative);
        let path = match self.stack.last().and_then(|p| p.parent()) {
            Some(dir) => dir.join(&relative),
            None => PathBuf::from(&relative),
        };
        self.process_file(&path).map(|_| ())
    }

    fn tokenize(&mut self, line: &str, number: usize) -> Result<()> {
        let mut pos = 0;
        while pos < line.len() {
            let rest = &line[pos..];
            let trimmed = rest.trim_start();
            pos += rest.len() - trimmed.len();
            if trimmed.is_empty() {
                break;
            }

            if trimmed.starts_with('<') {
                let close = trimmed
                    .find('>')
                    .ok_or_else(|| self.error(number, pos + 1, "header is missing '>'"))?;
                let name = trimmed[1..close].trim();
                self.tokens.push(match SfzSectionType::from_header(name) {
                    Some(section_type) => Token::Header(section_type),
                    None => {
                        warn!("Skipping unsupported header <{}>", name);
                        Token::Unknown(name.to_string())
                    }
                });
                pos += close + 1;
                continue;
            }

            let eq = trimmed.find('=').ok_or_else(|| {
                self.error(
                    number,
                    pos + 1,
                    format!("expected opcode=value, found '{}'", trimmed.trim_end()),
                )
            })?;
            let name = &trimmed[..eq];
            if name.is_empty() || !name.chars().all(is_opcode_char) {
                return Err(self.error(number, pos + 1, format!("invalid opcode name '{}'", name)));
            }
            let value_len = value_len(&trimmed[eq + 1..]);
            let value = trimmed[eq + 1..eq + 1 + value_len].trim();
            self.tokens
                .push(Token::Opcode(name.to_string(), value.to_string()));
            pos += eq + 1 + value_len;
        }
        Ok(())
    }

    fn finish(self, source_file: Option<PathBuf>) -> SfzFile {
        let mut assembler = Assembler::default();
        for token in self.tokens {
            assembler.push(token);
        }
        let mut sfz = assembler.finish();
        sfz.source_file = source_file;
        sfz.includes = self.includes;
        sfz
    }
}

fn is_opcode_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Length of an opcode value: up to the next header or the next `name=`.
fn value_len(text: &str) -> usize {
    for (i, c) in text.char_indices() {
        if c == '<' {
            return i;
        }
        if c.is_whitespace() {
            let next = text[i..].trim_start();
            let word = next.find(|c: char| !is_opcode_char(c)).unwrap_or(next.len());
            if word > 0 && next[word..].starts_with('=') {
                return i;
            }
        }
    }
    text.len()
}

/// Builds the section tree, flattening inherited opcodes into each section.
#[derive(Default)]
struct Assembler {
    sfz: SfzFile,
    current: Option<SfzSection>,
    skipping: bool,
    global: HashMap<String, String>,
    master: Option<HashMap<String, String>>,
    group: Option<HashMap<String, String>>,
}

impl Assembler {
    fn push(&mut self, token: Token) {
        match token {
            Token::Header(section_type) => {
                self.close();
                self.skipping = false;
                match section_type {
                    SfzSectionType::Global => {
                        self.master = None;
                        self.group = None;
                    }
                    SfzSectionType::Master => self.group = None,
                    _ => {}
                }
                self.current = Some(SfzSection::new(section_type));
            }
            Token::Unknown(_) => {
                self.close();
                self.skipping = true;
            }
            Token::Opcode(name, value) => match self.current.as_mut() {
                Some(section) => section.add_opcode(name, value),
                None if !self.skipping => warn!("Ignoring opcode '{}' outside of any header", name),
                None => {}
            },
        }
    }

    fn close(&mut self) {
        let Some(section) = self.current.take() else {
            return;
        };
        let mut opcodes = match section.section_type {
            SfzSectionType::Master => self.global.clone(),
            SfzSectionType::Group => self.master.clone().unwrap_or_else(|| self.global.clone()),
            SfzSectionType::Region => self
                .group
                .clone()
                .or_else(|| self.master.clone())
                .unwrap_or_else(|| self.global.clone()),
            _ => HashMap::new(),
        };
        opcodes.extend(section.opcodes);
        match section.section_type {
            SfzSectionType::Global => self.global = opcodes.clone(),
            SfzSectionType::Master => self.master = Some(opcodes.clone()),
            SfzSectionType::Group => self.group = Some(opcodes.clone()),
            _ => {}
        }
        self.sfz.add_section(SfzSection {
            section_type: section.section_type,
            opcodes,
        });
    }

    fn finish(mut self) -> SfzFile {
        self.close();
        self.sfz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_sfz() {
        let content = r#"
        <control>
        default_path=samples/piano/

        <global>
        volume=0

        <region>
        sample=piano_C3.wav
        key=60
        "#;

        let sfz = parse_sfz(content).expect("Failed to parse SFZ");

        let control = sfz.control.as_ref().unwrap();
        assert_eq!(control.get_opcode_str("default_path"), Some("samples/piano/"));
        assert_eq!(sfz.global.as_ref().unwrap().get_opcode_str("volume"), Some("0"));

        assert_eq!(sfz.regions.len(), 1);
        let region = &sfz.regions[0];
        assert_eq!(region.get_opcode_str("sample"), Some("piano_C3.wav"));
        assert_eq!(region.get_opcode_str("key"), Some("60"));
        assert_eq!(region.get_opcode_str("volume"), Some("0"));
    }

    #[test]
    fn test_several_opcodes_per_line() {
        let sfz = parse_sfz("<region> sample=Grand Piano C4.wav lokey=c4 hikey=d4<region>key=62").unwrap();
        assert_eq!(sfz.regions.len(), 2);
        let first = &sfz.regions[0];
        assert_eq!(first.get_opcode_str("sample"), Some("Grand Piano C4.wav"));
        assert_eq!(first.get_opcode_str("lokey"), Some("c4"));
        assert_eq!(first.get_opcode_str("hikey"), Some("d4"));
        assert_eq!(sfz.regions[1].get_opcode_str("key"), Some("62"));
    }

    #[test]
    fn test_inheritance_order() {
        let sfz = parse_sfz(
            "<global> volume=-1 pan=10 tune=5
             <master> volume=-2 pan=20
             <group> volume=-3
             <region> sample=a.wav
             <region> sample=b.wav volume=-4
             <master> lovel=64
             <region> sample=c.wav",
        )
        .unwrap();
        let volume = |i: usize| sfz.regions[i].get_opcode_str("volume");
        assert_eq!(volume(0), Some("-3"));
        assert_eq!(volume(1), Some("-4"));
        assert_eq!(sfz.regions[0].get_opcode_str("pan"), Some("20"));
        assert_eq!(sfz.regions[0].get_opcode_str("tune"), Some("5"));
        // a new master drops the previous group and master
        assert_eq!(volume(2), Some("-1"));
        assert_eq!(sfz.regions[2].get_opcode_str("lovel"), Some("64"));
        assert_eq!(sfz.groups.len(), 1);
        assert_eq!(sfz.masters.len(), 2);
    }

    #[test]
    fn test_comments_are_ignored() {
        let sfz = parse_sfz(
            "// header comment
             <region> sample=a.wav // trailing
             /* block
                key=10 */ key=20",
        )
        .unwrap();
        assert_eq!(sfz.regions[0].get_opcode_str("sample"), Some("a.wav"));
        assert_eq!(sfz.regions[0].get_opcode_str("key"), Some("20"));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = parse_sfz("<region>\n  /* never closed\nkey=1").unwrap_err();
        assert!(matches!(err, SfzError::ParseAt { line: 2, column: 3, .. }));
    }

    #[test]
    fn test_define_substitution() {
        let sfz = parse_sfz(
            "#define $KEY 60
             #define $KEYS 48
             <region> sample=a.wav key=$KEY lokey=$KEYS",
        )
        .unwrap();
        assert_eq!(sfz.regions[0].get_opcode_str("key"), Some("60"));
        assert_eq!(sfz.regions[0].get_opcode_str("lokey"), Some("48"));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            parse_sfz("<region\nkey=1"),
            Err(SfzError::ParseAt { line: 1, .. })
        ));
        assert!(matches!(
            parse_sfz("<region>\nsample a.wav"),
            Err(SfzError::ParseAt { line: 2, column: 1, .. })
        ));
        assert!(matches!(
            parse_sfz("#define KEY 60"),
            Err(SfzError::ParseAt { .. })
        ));
    }

    #[test]
    fn test_unknown_header_is_skipped() {
        let sfz = parse_sfz("<midi> foo=1 <region> sample=a.wav").unwrap();
        assert_eq!(sfz.regions.len(), 1);
        assert!(!sfz.regions[0].has_opcode("foo"));
    }
}
