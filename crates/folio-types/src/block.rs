//! Block kinds and their capability table.
//!
//! `BlockType` is a closed enum. Per-type behavior lives in a static table of
//! [`BlockTypeSpec`] rows looked up by [`BlockType::spec`], so adding a kind
//! means adding one variant and one row. There is no registry and no dynamic dispatch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Kind of a block record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BlockType {
    #[default]
    Text,
    Page,
    Header,
    SubHeader,
    SubSubHeader,
    Todo,
    BulletedList,
    NumberedList,
    Toggle,
    Quote,
    Divider,
    Code,
}

/// Static capabilities and Markdown rendering for one block type.
#[derive(Clone, Copy)]
pub struct BlockTypeSpec {
    pub kind: BlockType,
    pub name: &'static str,
    /// Whether the block carries editable title text.
    pub has_title: bool,
    /// Markdown prefix typed at the start of a text block to convert into this kind.
    pub markdown_prefix: Option<&'static str>,
    /// Render one line of Markdown from the plain title and the `checked` flag.
    pub render: fn(&str, bool) -> String,
}

impl fmt::Debug for BlockTypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockTypeSpec")
            .field("kind", &self.kind)
            .field("has_title", &self.has_title)
            .field("markdown_prefix", &self.markdown_prefix)
            .finish()
    }
}

fn render_plain(title: &str, _checked: bool) -> String {
    title.to_string()
}

fn render_page(title: &str, _checked: bool) -> String {
    format!("[{title}]")
}

fn render_h1(title: &str, _checked: bool) -> String {
    format!("# {title}")
}

fn render_h2(title: &str, _checked: bool) -> String {
    format!("## {title}")
}

fn render_h3(title: &str, _checked: bool) -> String {
    format!("### {title}")
}

fn render_todo(title: &str, checked: bool) -> String {
    if checked {
        format!("- [x] {title}")
    } else {
        format!("- [ ] {title}")
    }
}

fn render_bullet(title: &str, _checked: bool) -> String {
    format!("- {title}")
}

fn render_numbered(title: &str, _checked: bool) -> String {
    format!("1. {title}")
}

fn render_quote(title: &str, _checked: bool) -> String {
    format!("> {title}")
}

fn render_divider(_title: &str, _checked: bool) -> String {
    "---".to_string()
}

fn render_code(title: &str, _checked: bool) -> String {
    format!("```\n{title}\n```")
}

const fn spec(
    kind: BlockType,
    name: &'static str,
    has_title: bool,
    markdown_prefix: Option<&'static str>,
    render: fn(&str, bool) -> String,
) -> BlockTypeSpec {
    BlockTypeSpec {
        kind,
        name,
        has_title,
        markdown_prefix,
        render,
    }
}

static SPECS: [BlockTypeSpec; 12] = [
    spec(BlockType::Text, "text", true, None, render_plain),
    spec(BlockType::Page, "page", true, None, render_page),
    spec(BlockType::Header, "header", true, Some("# "), render_h1),
    spec(BlockType::SubHeader, "sub_header", true, Some("## "), render_h2),
    spec(BlockType::SubSubHeader, "sub_sub_header", true, Some("### "), render_h3),
    spec(BlockType::Todo, "todo", true, Some("[] "), render_todo),
    spec(BlockType::BulletedList, "bulleted_list", true, Some("- "), render_bullet),
    spec(BlockType::NumberedList, "numbered_list", true, Some("1. "), render_numbered),
    spec(BlockType::Toggle, "toggle", true, None, render_bullet),
    spec(BlockType::Quote, "quote", true, Some("> "), render_quote),
    spec(BlockType::Divider, "divider", false, Some("---"), render_divider),
    spec(BlockType::Code, "code", true, Some("```"), render_code),
];

impl BlockType {
    /// All kinds, in table order.
    pub const ALL: [BlockType; 12] = [
        BlockType::Text,
        BlockType::Page,
        BlockType::Header,
        BlockType::SubHeader,
        BlockType::SubSubHeader,
        BlockType::Todo,
        BlockType::BulletedList,
        BlockType::NumberedList,
        BlockType::Toggle,
        BlockType::Quote,
        BlockType::Divider,
        BlockType::Code,
    ];

    pub fn spec(&self) -> &'static BlockTypeSpec {
        // Table rows are declared in variant order.
        &SPECS[*self as usize]
    }

    pub fn as_str(&self) -> &'static str {
        self.spec().name
    }

    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// The kind whose Markdown prefix is exactly `prefix`.
    pub fn from_markdown_prefix(prefix: &str) -> Option<Self> {
        SPECS
            .iter()
            .find(|spec| spec.markdown_prefix == Some(prefix))
            .map(|spec| spec.kind)
    }

    pub fn is_page(&self) -> bool {
        matches!(self, BlockType::Page)
    }

    /// Render one Markdown line for a block of this kind.
    pub fn render_markdown(&self, title: &str, checked: bool) -> String {
        (self.spec().render)(title, checked)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
