//! Language profiles for the editor, and the registry that installs each
//! one at most once per application lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::debug;

pub const RUST_LANGUAGE_ID: &str = "rust";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    Class,
    Field,
    Snippet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionItem {
    pub label: &'static str,
    pub kind: CompletionKind,
    pub detail: &'static str,
    pub documentation: &'static str,
    /// Snippet syntax (`${1:name}`) when `kind` is not `Class`
    pub insert_text: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hover {
    /// Rendered as a fenced code block
    pub signature: String,
    pub documentation: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Keyword,
    TypeKeyword,
    Identifier,
}

#[derive(Debug, Clone)]
pub struct LanguageProfile {
    pub id: &'static str,
    pub line_comment: &'static str,
    pub block_comment: (&'static str, &'static str),
    pub brackets: &'static [(char, char)],
    pub auto_closing_pairs: &'static [(char, char)],
    pub keywords: &'static [&'static str],
    pub type_keywords: &'static [&'static str],
    sdk_types: &'static [CompletionItem],
    storage_types: &'static [CompletionItem],
    method_snippets: &'static [CompletionItem],
}

impl LanguageProfile {
    /// Rust with the Stylus SDK vocabulary.
    pub fn stylus() -> Self {
        Self {
            id: RUST_LANGUAGE_ID,
            line_comment: "//",
            block_comment: ("/*", "*/"),
            brackets: &[('{', '}'), ('[', ']'), ('(', ')')],
            auto_closing_pairs: &[('{', '}'), ('[', ']'), ('(', ')'), ('"', '"'), ('\'', '\'')],
            keywords: RUST_KEYWORDS,
            type_keywords: RUST_TYPE_KEYWORDS,
            sdk_types: STYLUS_SDK_TYPES,
            storage_types: STORAGE_TYPES,
            method_snippets: METHOD_SNIPPETS,
        }
    }

    pub fn classify(&self, word: &str) -> TokenClass {
        if self.type_keywords.contains(&word) {
            TokenClass::TypeKeyword
        } else if self.keywords.contains(&word) {
            TokenClass::Keyword
        } else {
            TokenClass::Identifier
        }
    }

    /// Suggestions for the cursor's line: storage fields inside a storage
    /// declaration, method snippets on an `impl` line, SDK types always.
    pub fn completions(&self, line: &str) -> Vec<&CompletionItem> {
        let mut items = Vec::new();
        if line.contains("sol_storage!") || line.contains("struct") {
            items.extend(self.storage_types);
        }
        if line.contains("impl") {
            items.extend(self.method_snippets);
        }
        items.extend(self.sdk_types);
        items
    }

    /// Documentation for the word under the 1-based `column` of `line`.
    pub fn hover(&self, line: &str, column: usize) -> Option<Hover> {
        let word = word_at(line, column)?;
        self.sdk_types
            .iter()
            .chain(self.storage_types)
            .chain(self.method_snippets)
            .find(|item| item.label == word)
            .map(|item| Hover {
                signature: format!("```rust\n{}\n```", item.detail),
                documentation: item.documentation,
            })
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// The identifier touching 1-based `column`, if any.
pub fn word_at(line: &str, column: usize) -> Option<&str> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let idx = column.checked_sub(1)?;
    // A cursor just past the end of a word still counts.
    let hit = match chars.get(idx) {
        Some((_, c)) if is_word_char(*c) => idx,
        _ if idx > 0 && chars.get(idx - 1).is_some_and(|(_, c)| is_word_char(*c)) => idx - 1,
        _ => return None,
    };

    let start = (0..=hit)
        .rev()
        .take_while(|&i| is_word_char(chars[i].1))
        .last()
        .unwrap_or(hit);
    let end = (hit..chars.len())
        .take_while(|&i| is_word_char(chars[i].1))
        .last()
        .unwrap_or(hit);

    let from = chars[start].0;
    let to = chars[end].0 + chars[end].1.len_utf8();
    Some(&line[from..to])
}

/// Profiles installed in this application, keyed by language id.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    profiles: Arc<Mutex<HashMap<&'static str, Arc<LanguageProfile>>>>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the profile built by `build` unless `id` is already present.
    /// Returns whether this call installed it.
    pub fn register_once<F>(&self, id: &'static str, build: F) -> bool
    where
        F: FnOnce() -> LanguageProfile,
    {
        let mut profiles = self.profiles.lock().unwrap_or_else(PoisonError::into_inner);
        if profiles.contains_key(id) {
            return false;
        }
        profiles.insert(id, Arc::new(build()));
        debug!("Registered language profile {id}");
        true
    }

    pub fn get(&self, id: &str) -> Option<Arc<LanguageProfile>> {
        self.profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

// ─────────────────────────────────────────────────────────
// Vocabulary
// ─────────────────────────────────────────────────────────

static RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "try", "box", "union",
];

static RUST_TYPE_KEYWORDS: &[&str] = &[
    "bool", "u8", "u16", "u32", "u64", "u128", "i8", "i16", "i32", "i64", "i128", "f32", "f64",
    "usize", "isize", "str", "char", "Vec", "String", "Option", "Result", "Box",
];

static STYLUS_SDK_TYPES: &[CompletionItem] = &[
    CompletionItem {
        label: "U256",
        kind: CompletionKind::Class,
        detail: "stylus_sdk::alloy_primitives::U256",
        documentation: "256-bit unsigned integer type for Ethereum compatibility",
        insert_text: "U256",
    },
    CompletionItem {
        label: "Address",
        kind: CompletionKind::Class,
        detail: "stylus_sdk::alloy_primitives::Address",
        documentation: "Ethereum address type",
        insert_text: "Address",
    },
    CompletionItem {
        label: "sol_storage",
        kind: CompletionKind::Snippet,
        detail: "stylus_sdk::sol_storage",
        documentation: "Define contract storage layout",
        insert_text: "sol_storage! {\n    #[entrypoint]\n    pub struct ${1:Contract} {\n        ${2:// Storage variables}\n    }\n}",
    },
    CompletionItem {
        label: "public",
        kind: CompletionKind::Snippet,
        detail: "stylus_sdk::public",
        documentation: "Define public contract interface",
        insert_text: "#[public]\nimpl ${1:Contract} {\n    ${2:// Public methods}\n}",
    },
];

static STORAGE_TYPES: &[CompletionItem] = &[
    CompletionItem {
        label: "uint256",
        kind: CompletionKind::Field,
        detail: "sol_storage field",
        documentation: "256-bit unsigned integer storage field",
        insert_text: "uint256 ${1:name};",
    },
    CompletionItem {
        label: "string",
        kind: CompletionKind::Field,
        detail: "sol_storage field",
        documentation: "String storage field",
        insert_text: "string ${1:name};",
    },
    CompletionItem {
        label: "mapping",
        kind: CompletionKind::Field,
        detail: "sol_storage field",
        documentation: "Key-value storage mapping",
        insert_text: "mapping(${1:key_type} => ${2:value_type}) ${3:name};",
    },
    CompletionItem {
        label: "bool",
        kind: CompletionKind::Field,
        detail: "sol_storage field",
        documentation: "Boolean storage field",
        insert_text: "bool ${1:name};",
    },
];

static METHOD_SNIPPETS: &[CompletionItem] = &[
    CompletionItem {
        label: "view_method",
        kind: CompletionKind::Snippet,
        detail: "View method template",
        documentation: "Create a read-only view method",
        insert_text: "pub fn ${1:method_name}(&self) -> ${2:U256} {\n    ${3:self.value.get()}\n}",
    },
    CompletionItem {
        label: "mut_method",
        kind: CompletionKind::Snippet,
        detail: "Mutable method template",
        documentation: "Create a state-changing method",
        insert_text: "pub fn ${1:method_name}(&mut self, ${2:value: U256}) {\n    ${3:self.value.set(value);}\n}",
    },
];
