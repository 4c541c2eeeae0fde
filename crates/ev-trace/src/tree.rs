//! Span trees — link spans to their parents within a trace.

use ev_core::trace::{Span, SpanNode};
use std::collections::HashMap;

/// Build the forest for `spans`. A span whose parent is missing from the
/// input (or lives in another trace) becomes a root. Siblings and roots are
/// ordered by start time.
pub fn build_tree(spans: &[Span]) -> Vec<SpanNode> {
    let mut by_id: HashMap<(&str, &str), usize> = HashMap::new();
    let mut unique: Vec<&Span> = Vec::with_capacity(spans.len());
    for span in spans {
        let key = (span.trace_id.as_str(), span.span_id.as_str());
        if by_id.contains_key(&key) {
            tracing::debug!(trace_id = %span.trace_id, span_id = %span.span_id, "duplicate span ignored");
            continue;
        }
        by_id.insert(key, unique.len());
        unique.push(span);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); unique.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (idx, span) in unique.iter().enumerate() {
        let parent = span
            .parent_span_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .and_then(|p| by_id.get(&(span.trace_id.as_str(), p)).copied())
            .filter(|&p| p != idx);
        match parent {
            Some(p) => children[p].push(idx),
            None => roots.push(idx),
        }
    }

    let by_start = |a: &usize, b: &usize| unique[*a].start_time.cmp(&unique[*b].start_time);
    for list in &mut children {
        list.sort_by(by_start);
    }
    roots.sort_by(by_start);

    let mut visited = vec![false; unique.len()];
    let mut forest: Vec<SpanNode> = roots
        .iter()
        .map(|&r| assemble(r, &unique, &children, &mut visited))
        .collect();

    // Parent cycles leave spans unreachable from any root; surface them as
    // roots rather than dropping them.
    for idx in 0..unique.len() {
        if !visited[idx] {
            tracing::warn!(span_id = %unique[idx].span_id, "span parent cycle broken");
            forest.push(assemble(idx, &unique, &children, &mut visited));
        }
    }
    forest
}

/// Build the subtree under `root` without recursing, so chains of any depth
/// are safe. Spans already placed elsewhere are skipped.
fn assemble(root: usize, spans: &[&Span], children: &[Vec<usize>], visited: &mut [bool]) -> SpanNode {
    // Preorder: every span comes after its parent.
    let mut order = Vec::new();
    let mut stack = vec![root];
    visited[root] = true;
    while let Some(idx) = stack.pop() {
        order.push(idx);
        for &child in &children[idx] {
            if !visited[child] {
                visited[child] = true;
                stack.push(child);
            }
        }
    }

    let mut built: HashMap<usize, SpanNode> = HashMap::with_capacity(order.len());
    for &idx in order.iter().rev() {
        let mut node = SpanNode::leaf(spans[idx].clone());
        node.children = children[idx]
            .iter()
            .filter_map(|child| built.remove(child))
            .collect();
        built.insert(idx, node);
    }
    built
        .remove(&root)
        .unwrap_or_else(|| SpanNode::leaf(spans[root].clone()))
}

/// Depth-first walk, parents before children.
pub fn flatten(forest: &[SpanNode]) -> Vec<&Span> {
    let mut out = Vec::new();
    let mut stack: Vec<&SpanNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(&node.span);
        stack.extend(node.children.iter().rev());
    }
    out
}
