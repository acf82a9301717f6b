//! How records and branch groupings are laid out as blocks.

use crate::blocks::{Annotations, Block, BlockContent, Icon, RichText};
use crate::version::VersionRecord;

pub const GIT_ICON_URL: &str = "https://cdn.simpleicons.org/git/F05032";
pub const CALLOUT_COLOR: &str = "red_background";

const ACTIVE_PREFIX: &str = "🌿 ";
const DELETED_PREFIX: &str = "🗑️ ";
const DELETED_SUFFIX: &str = " (deleted)";

const TITLE_MESSAGE_LEN: usize = 120;
const CALLOUT_MESSAGE_LEN: usize = 100;

/// Title of the grouping block holding a branch's records.
pub fn grouping_title(branch: &str) -> String {
    format!("{ACTIVE_PREFIX}{branch}")
}

pub fn deleted_grouping_title(branch: &str) -> String {
    format!("{DELETED_PREFIX}{branch}{DELETED_SUFFIX}")
}

/// Branch state encoded in a grouping title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingTitle {
    pub branch: String,
    pub deleted: bool,
}

pub fn parse_grouping_title(title: &str) -> Option<GroupingTitle> {
    if let Some(branch) = title.strip_prefix(ACTIVE_PREFIX) {
        return Some(GroupingTitle {
            branch: branch.to_string(),
            deleted: false,
        });
    }
    title
        .strip_prefix(DELETED_PREFIX)
        .and_then(|rest| rest.strip_suffix(DELETED_SUFFIX))
        .map(|branch| GroupingTitle {
            branch: branch.to_string(),
            deleted: true,
        })
}

/// Grouping state of `block`, if it is a grouping toggle.
pub fn grouping_of(block: &Block) -> Option<GroupingTitle> {
    if !block.is_toggle() {
        return None;
    }
    parse_grouping_title(&block.content.plain_text())
}

pub fn grouping_block(branch: &str) -> BlockContent {
    BlockContent::toggle(
        vec![RichText::text(&grouping_title(branch)).with_annotations(Annotations {
            bold: true,
            ..Default::default()
        })],
        Vec::new(),
    )
}

/// Grouping toggle payload for a removed branch.
pub fn deleted_grouping_block(branch: &str) -> BlockContent {
    let mut block = BlockContent::toggle(
        vec![
            RichText::text(&deleted_grouping_title(branch)).with_annotations(Annotations {
                bold: true,
                strikethrough: true,
                ..Default::default()
            }),
        ],
        Vec::new(),
    );
    if let BlockContent::Toggle { toggle } = &mut block {
        toggle.color = Some("red".to_string());
    }
    block
}

/// Text of the record callout. The `Hash:` line is read back for change
/// detection.
pub fn callout_text(record: &VersionRecord) -> String {
    format!(
        "Version: {}\nAuthor: {}\nBranch: {}\nCommit: {}\n{}\nHash: {}",
        record.version,
        record.author,
        record.branch,
        record.short_sha(),
        truncate_chars(&record.commit_message, CALLOUT_MESSAGE_LEN),
        record.content_hash,
    )
}

/// `<sha> — <author> — <date> — <message>` toggle title.
pub fn record_title(record: &VersionRecord) -> String {
    let sha = if record.commit_sha.is_empty() {
        "unknown"
    } else {
        record.short_sha()
    };
    let date = record.timestamp.format("%b %-d, %Y, %H:%M UTC");
    let message = truncate_chars(&record.commit_message, TITLE_MESSAGE_LEN);
    let ellipsis = if record.commit_message.chars().count() > TITLE_MESSAGE_LEN {
        "…"
    } else {
        ""
    };
    format!(
        "{sha} — {} — {date} — {}{ellipsis}",
        record.author,
        message.trim()
    )
}

/// The full record toggle: callout, optional commit link, diagram.
pub fn record_block(record: &VersionRecord) -> BlockContent {
    let mut children = vec![BlockContent::callout(
        RichText::chunked(&callout_text(record)),
        Icon::external(GIT_ICON_URL),
        CALLOUT_COLOR,
    )];

    if !record.commit_url.is_empty() {
        children.push(BlockContent::paragraph(vec![
            RichText::text("View commit: "),
            RichText::link(record.short_sha(), &record.commit_url).with_annotations(Annotations {
                code: true,
                ..Default::default()
            }),
        ]));
    }

    children.push(BlockContent::code(&record.diagram_text, "mermaid"));

    BlockContent::toggle(
        vec![RichText::text(&record_title(record)).with_annotations(Annotations {
            bold: true,
            ..Default::default()
        })],
        children,
    )
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
