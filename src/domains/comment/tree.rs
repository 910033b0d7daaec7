use serde::Serialize;
use std::collections::HashMap;

use crate::core::CommentId;
use crate::models::{Comment, VoteType};

/// Deepest reply level kept as nesting. Replies below it are attached, in order, to their
/// ancestor on this level; `parent_id` still names the real parent.
pub const MAX_REPLY_DEPTH: usize = 32;

#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_name: Option<String>,
    pub user_vote: Option<VoteType>,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn new(comment: Comment) -> Self {
        Self {
            comment,
            author_name: None,
            user_vote: None,
            replies: Vec::new(),
        }
    }

    pub fn id(&self) -> CommentId {
        self.comment.id
    }
}

// Hand-built chains can be arbitrarily deep, so unwind replies with a heap stack.
impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

/// Assemble a thread from flat rows in chronological order.
///
/// Roots and each node's replies keep input order. Nesting stops at `MAX_REPLY_DEPTH`,
/// and nothing here recurses. A reply whose parent is not among the rows is dropped.
pub fn build_comment_tree(rows: Vec<CommentNode>) -> Vec<CommentNode> {
    let index: HashMap<CommentId, usize> = rows
        .iter()
        .enumerate()
        .map(|(position, node)| (node.id(), position))
        .collect();

    // Resolve each row's parent slot; replies to missing parents are marked orphaned
    let parents: Vec<Option<Option<usize>>> = rows
        .iter()
        .map(|node| match node.comment.parent_id {
            None => Some(None),
            Some(parent) => index.get(&parent).map(|&slot| Some(slot)),
        })
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
    let mut roots = Vec::new();
    for (position, parent) in parents.iter().enumerate() {
        match parent {
            Some(None) => roots.push(position),
            Some(Some(slot)) => children[*slot].push(position),
            None => {}
        }
    }

    // Walk parents before children, pinning each row to the nearest ancestor that may
    // still take replies
    let mut holder: Vec<Option<usize>> = vec![None; rows.len()];
    let mut depth = vec![0usize; rows.len()];
    let mut walk: Vec<usize> = roots.clone();
    while let Some(position) = walk.pop() {
        for &child in &children[position] {
            let anchor = match holder[position] {
                Some(anchor) if depth[position] >= MAX_REPLY_DEPTH => anchor,
                _ => position,
            };
            holder[child] = Some(anchor);
            depth[child] = depth[anchor] + 1;
            walk.push(child);
        }
    }
    let mut attached: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
    for (position, anchor) in holder.iter().enumerate() {
        if let Some(anchor) = anchor {
            attached[*anchor].push(position);
        }
    }
    let children = attached;

    // Children are attached before their parent is moved, by walking a post-order
    // sequence produced with an explicit stack
    let mut order = Vec::with_capacity(rows.len());
    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();
    while let Some((position, expanded)) = stack.pop() {
        if expanded {
            order.push(position);
            continue;
        }
        stack.push((position, true));
        for &child in children[position].iter().rev() {
            stack.push((child, false));
        }
    }

    let mut slots: Vec<Option<CommentNode>> = rows.into_iter().map(Some).collect();
    for position in order {
        let mut replies = Vec::with_capacity(children[position].len());
        for &child in &children[position] {
            if let Some(node) = slots[child].take() {
                replies.push(node);
            }
        }
        if let Some(node) = slots[position].as_mut() {
            node.replies = replies;
        }
    }

    roots
        .into_iter()
        .filter_map(|position| slots[position].take())
        .collect()
}
