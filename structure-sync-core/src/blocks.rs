//! Typed model of the document API's blocks.
//!
//! A block carries a `type` tag plus a payload under a key of the same name,
//! e.g. `{"type": "toggle", "toggle": {...}}`. [`BlockContent`] mirrors that
//! shape so the same enum serves for reads and for append requests. Types we
//! do not handle deserialise to [`BlockContent::Unsupported`] and are skipped.

use serde::{Deserialize, Serialize};

/// Maximum characters in one rich-text `content` field.
pub const MAX_TEXT_LEN: usize = 2000;

pub const COLOR_DEFAULT: &str = "default";

/// A block as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub content: BlockContent,
}

impl Block {
    pub fn is_toggle(&self) -> bool {
        matches!(self.content, BlockContent::Toggle { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockContent {
    Toggle { toggle: Toggle },
    Callout { callout: Callout },
    Paragraph { paragraph: Paragraph },
    Code { code: Code },
    Divider { divider: Divider },
    #[serde(other)]
    Unsupported,
}

impl BlockContent {
    pub fn toggle(rich_text: Vec<RichText>, children: Vec<BlockContent>) -> Self {
        BlockContent::Toggle {
            toggle: Toggle {
                rich_text,
                color: None,
                children,
            },
        }
    }

    pub fn callout(rich_text: Vec<RichText>, icon: Icon, color: &str) -> Self {
        BlockContent::Callout {
            callout: Callout {
                rich_text,
                icon: Some(icon),
                color: Some(color.to_string()),
            },
        }
    }

    pub fn paragraph(rich_text: Vec<RichText>) -> Self {
        BlockContent::Paragraph {
            paragraph: Paragraph {
                rich_text,
                color: None,
            },
        }
    }

    pub fn code(text: &str, language: &str) -> Self {
        BlockContent::Code {
            code: Code {
                rich_text: RichText::chunked(text),
                language: language.to_string(),
                caption: Vec::new(),
            },
        }
    }

    pub fn divider() -> Self {
        BlockContent::Divider {
            divider: Divider {},
        }
    }

    /// Rich text of text-bearing blocks.
    pub fn rich_text(&self) -> &[RichText] {
        match self {
            BlockContent::Toggle { toggle } => &toggle.rich_text,
            BlockContent::Callout { callout } => &callout.rich_text,
            BlockContent::Paragraph { paragraph } => &paragraph.rich_text,
            BlockContent::Code { code } => &code.rich_text,
            BlockContent::Divider { .. } | BlockContent::Unsupported => &[],
        }
    }

    /// Concatenated plain text of the block.
    pub fn plain_text(&self) -> String {
        self.rich_text().iter().map(RichText::plain).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toggle {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Only used when creating; reads never include children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BlockContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callout {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default = "plain_language")]
    pub language: String,
    #[serde(default)]
    pub caption: Vec<RichText>,
}

fn plain_language() -> String {
    "plain text".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divider {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Icon {
    Emoji { emoji: String },
    External { external: ExternalFile },
    #[serde(other)]
    Other,
}

impl Icon {
    pub fn external(url: &str) -> Self {
        Icon::External {
            external: ExternalFile {
                url: url.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalFile {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    #[serde(rename = "type", default = "text_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// Filled in by the API on reads.
    #[serde(default, skip_serializing)]
    pub plain_text: Option<String>,
}

fn text_kind() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl RichText {
    pub fn plain(&self) -> String {
        match (&self.plain_text, &self.text) {
            (Some(plain), _) => plain.clone(),
            (None, Some(text)) => text.content.clone(),
            (None, None) => String::new(),
        }
    }

    /// A single unannotated text run. Callers keep `content` within
    /// [`MAX_TEXT_LEN`]; use [`RichText::chunked`] for longer text.
    pub fn text(content: &str) -> Self {
        RichText {
            kind: text_kind(),
            text: Some(Text {
                content: content.to_string(),
                link: None,
            }),
            annotations: None,
            plain_text: None,
        }
    }

    pub fn link(content: &str, url: &str) -> Self {
        let mut rt = RichText::text(content);
        if let Some(text) = rt.text.as_mut() {
            text.link = Some(Link {
                url: url.to_string(),
            });
        }
        rt
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Splits `text` into runs of at most [`MAX_TEXT_LEN`] UTF-16 code
    /// units, the unit the API measures length in. Surrogate pairs are never
    /// split.
    pub fn chunked(text: &str) -> Vec<RichText> {
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut units = 0;
        for (idx, ch) in text.char_indices() {
            let width = ch.len_utf16();
            if units + width > MAX_TEXT_LEN {
                chunks.push(RichText::text(&text[start..idx]));
                start = idx;
                units = 0;
            }
            units += width;
        }
        chunks.push(RichText::text(&text[start..]));
        chunks
    }
}

/// One page of `list_children` results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildrenPage {
    #[serde(default)]
    pub results: Vec<Block>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}
