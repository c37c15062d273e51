//! Syntax styling for the text layer, computed lazily up to the deepest line
//! the viewer has painted so far.

use std::path::Path;

use ratatui::prelude::{Color, Style};
use syntect::highlighting::{
    HighlightIterator, HighlightState, Highlighter, Style as SynStyle, Theme, ThemeSet,
};
use syntect::parsing::{ParseState, ScopeStack, SyntaxReference, SyntaxSet};
use tracing::{debug, warn};

use crate::lines::SourceLine;

const DEFAULT_THEME: &str = "base16-ocean.dark";

#[derive(Clone, Debug, PartialEq)]
pub struct StyledSegment {
    pub text: String,
    pub style: Style,
}

pub struct Tokenizer {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl Tokenizer {
    pub fn new(theme_name: Option<&str>) -> Self {
        let theme_set = ThemeSet::load_defaults();
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme: resolve_theme(&theme_set, theme_name),
        }
    }

    fn find_syntax(&self, display_name: &str) -> Option<&SyntaxReference> {
        let by_extension = Path::new(display_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.syntax_set.find_syntax_by_extension(ext));
        by_extension
            .or_else(|| self.syntax_set.find_syntax_by_token(display_name))
            .filter(|syntax| syntax.name != "Plain Text")
    }

    /// Starts styling a document. Unknown names give a plain session.
    pub fn session(&self, display_name: &str) -> HighlightSession {
        let parse_state = match self.find_syntax(display_name) {
            Some(syntax) => {
                debug!(target: "syntax", display_name, syntax = %syntax.name, "syntax_selected");
                Some(ParseState::new(syntax))
            }
            None => {
                debug!(target: "syntax", display_name, "no_syntax_plain_text");
                None
            }
        };
        let highlighter = Highlighter::new(&self.theme);
        HighlightSession {
            parse_state,
            highlight_state: HighlightState::new(&highlighter, ScopeStack::new()),
            styled: Vec::new(),
        }
    }
}

fn resolve_theme(theme_set: &ThemeSet, requested: Option<&str>) -> Theme {
    if let Some(theme) = requested.and_then(|name| theme_set.themes.get(name)) {
        return theme.clone();
    }
    if let Some(name) = requested {
        warn!(target: "syntax", theme = name, "unknown_theme_using_default");
    }
    if let Some(theme) = theme_set.themes.get(DEFAULT_THEME) {
        return theme.clone();
    }
    theme_set
        .themes
        .values()
        .next()
        .cloned()
        .unwrap_or_default()
}

fn foreground(style: SynStyle) -> Style {
    Style::default().fg(Color::Rgb(
        style.foreground.r,
        style.foreground.g,
        style.foreground.b,
    ))
}

/// Styled segments per line, extended in order as deeper lines are needed.
pub struct HighlightSession {
    /// `None` once the document is plain text.
    parse_state: Option<ParseState>,
    highlight_state: HighlightState,
    styled: Vec<Vec<StyledSegment>>,
}

impl HighlightSession {
    pub fn is_plain(&self) -> bool {
        self.parse_state.is_none()
    }

    /// Segments computed so far, indexed by line index.
    pub fn styled(&self) -> &[Vec<StyledSegment>] {
        &self.styled
    }

    /// Styles every line up to and including `last_index`.
    pub fn extend_to(&mut self, tokenizer: &Tokenizer, lines: &[SourceLine], last_index: usize) {
        let target = last_index.saturating_add(1).min(lines.len());
        if self.styled.len() >= target {
            return;
        }
        let highlighter = Highlighter::new(&tokenizer.theme);

        for line in &lines[self.styled.len()..target] {
            let segments = match self.parse_state.as_mut() {
                Some(parse_state) => {
                    let with_ending = format!("{}\n", line.text);
                    match parse_state.parse_line(&with_ending, &tokenizer.syntax_set) {
                        Ok(ops) => HighlightIterator::new(
                            &mut self.highlight_state,
                            &ops,
                            &with_ending,
                            &highlighter,
                        )
                        .filter_map(|(style, token)| {
                            let token = token.trim_end_matches('\n');
                            (!token.is_empty()).then(|| StyledSegment {
                                text: token.to_string(),
                                style: foreground(style),
                            })
                        })
                        .collect(),
                        Err(err) => {
                            warn!(target: "syntax", line = line.display_number, %err, "parse_failed_falling_back_to_plain");
                            self.parse_state = None;
                            plain(line)
                        }
                    }
                }
                None => plain(line),
            };
            self.styled.push(segments);
        }
    }
}

fn plain(line: &SourceLine) -> Vec<StyledSegment> {
    if line.text.is_empty() {
        return Vec::new();
    }
    vec![StyledSegment {
        text: line.text.clone(),
        style: Style::default(),
    }]
}
