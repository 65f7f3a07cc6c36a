//! Markdown export of a page's block tree.

use crate::store::BlockStore;

/// Render `page` and its blocks as Markdown.
///
/// The page title becomes a level-one heading. Blocks render through their
/// type's render function, nested children indented by two spaces per level.
pub fn export_markdown(page: &BlockStore) -> String {
    let mut out = format!("# {}\n\n", page.plain_title());
    page.walk(|block, depth| {
        let rendered = block
            .block_type()
            .render_markdown(&block.plain_title(), block.is_checked());
        let indent = "  ".repeat(depth);
        for line in rendered.lines() {
            out.push_str(&indent);
            out.push_str(line);
            out.push('\n');
        }
    });
    out
}
