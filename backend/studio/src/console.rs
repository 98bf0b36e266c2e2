//! Compiler console output: split text on SGR escape sequences into styled
//! segments.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// No explicit colour; rendered muted.
    #[default]
    Muted,
    Gray,
    /// Any explicit foreground colour.
    Accent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Style {
    pub bold: bool,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub style: Style,
}

/// Parse `text` into runs of identically styled output. Escape sequences
/// themselves never appear in the result; unknown codes are ignored.
pub fn parse_ansi(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut style = Style::default();
    let mut rest = text;

    while !rest.is_empty() {
        let Some(start) = rest.find("\x1b[") else {
            push(&mut segments, rest, style);
            break;
        };
        push(&mut segments, &rest[..start], style);

        let after = &rest[start + 2..];
        let params_len = after
            .find(|c: char| !(c.is_ascii_digit() || c == ';'))
            .unwrap_or(after.len());

        if after[params_len..].starts_with('m') {
            apply_codes(&mut style, &after[..params_len]);
            rest = &after[params_len + 1..];
        } else {
            // Not an SGR sequence; keep it as plain text.
            push(&mut segments, &rest[start..start + 2], style);
            rest = after;
        }
    }
    segments
}

fn push(segments: &mut Vec<Segment>, text: &str, style: Style) {
    if text.is_empty() {
        return;
    }
    match segments.last_mut() {
        Some(last) if last.style == style => last.text.push_str(text),
        _ => segments.push(Segment {
            text: text.to_string(),
            style,
        }),
    }
}

fn apply_codes(style: &mut Style, params: &str) {
    // `ESC[m` is a reset.
    let mut codes = params
        .split(';')
        .map(|c| if c.is_empty() { 0 } else { c.parse::<u32>().unwrap_or(u32::MAX) });

    while let Some(code) = codes.next() {
        match code {
            0 => *style = Style::default(),
            1 => style.bold = true,
            22 => style.bold = false,
            90 => style.tone = Tone::Gray,
            30..=37 | 91..=97 => style.tone = Tone::Accent,
            38 => {
                style.tone = Tone::Accent;
                // 38;5;n or 38;2;r;g;b
                match codes.next() {
                    Some(5) => {
                        codes.next();
                    }
                    Some(2) => {
                        codes.nth(2);
                    }
                    _ => {}
                }
            }
            39 => style.tone = Tone::Muted,
            _ => {}
        }
    }
}
