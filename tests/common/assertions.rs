//! Tree navigation and bundle inspection helpers

use std::io::Read;
use std::path::Path;
use kb_harvest::{ChannelTree, NodeKind, TreeNode};

/// Category of `tree` with the given title, panicking with the titles present
pub fn category<'a>(tree: &'a ChannelTree, title: &str) -> &'a TreeNode {
    tree.children.iter().find(|c| c.title == title).unwrap_or_else(|| {
        let titles: Vec<&str> = tree.children.iter().map(|c| c.title.as_str()).collect();
        panic!("no category `{title}` in {titles:?}")
    })
}

/// Child of `node` with the given title
pub fn child<'a>(node: &'a TreeNode, title: &str) -> &'a TreeNode {
    node.children.iter().find(|c| c.title == title).unwrap_or_else(|| {
        let titles: Vec<&str> = node.children.iter().map(|c| c.title.as_str()).collect();
        panic!("no child `{title}` under `{}` in {titles:?}", node.title)
    })
}

/// Every leaf of `tree` in depth-first order
pub fn leaves(tree: &ChannelTree) -> Vec<&TreeNode> {
    fn walk<'a>(node: &'a TreeNode, out: &mut Vec<&'a TreeNode>) {
        if node.kind != NodeKind::Topic {
            out.push(node);
        }
        for child in &node.children {
            walk(child, out);
        }
    }
    let mut out = Vec::new();
    for category in &tree.children {
        walk(category, &mut out);
    }
    out
}

/// Sorted entry names of a bundle archive
pub fn bundle_entries(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).expect("open bundle");
    let archive = zip::ZipArchive::new(file).expect("read bundle");
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

/// `index.html` of a bundle archive
pub fn bundle_index(path: &Path) -> String {
    let file = std::fs::File::open(path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(file).expect("read bundle");
    let mut index = String::new();
    archive
        .by_name("index.html")
        .expect("index.html entry")
        .read_to_string(&mut index)
        .expect("utf-8 index");
    index
}
