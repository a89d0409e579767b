use std::collections::HashMap;

/// Typo/prefix/infix dictionary over one field's term vocabulary.
///
/// Built as an arena of nodes addressed by tagged `u32` handles rather
/// than `Box<Node>` children, so the trie can hold cross-references
/// (shared suffix chains collapsed during compression) without
/// self-referential ownership. The top 2 bits of a handle select the
/// node kind; the low 30 bits index into that kind's arena Vec
/// (spec.md §4.4).
const TAG_SHIFT: u32 = 30;
const TAG_INTERNAL: u32 = 0;
const TAG_LEAF: u32 = 1;
const TAG_COMPRESSED: u32 = 2;
const TAG_NONE: u32 = 3;
const INDEX_MASK: u32 = (1 << TAG_SHIFT) - 1;
const NONE_HANDLE: u32 = TAG_NONE << TAG_SHIFT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Internal,
    Leaf,
    Compressed,
}

fn make_handle(kind: NodeKind, index: usize) -> u32 {
    let tag = match kind {
        NodeKind::Internal => TAG_INTERNAL,
        NodeKind::Leaf => TAG_LEAF,
        NodeKind::Compressed => TAG_COMPRESSED,
    };
    (tag << TAG_SHIFT) | (index as u32 & INDEX_MASK)
}

fn handle_kind(handle: u32) -> NodeKind {
    match handle >> TAG_SHIFT {
        TAG_INTERNAL => NodeKind::Internal,
        TAG_LEAF => NodeKind::Leaf,
        TAG_COMPRESSED => NodeKind::Compressed,
        _ => unreachable!("NONE handles are never traversed"),
    }
}

fn handle_index(handle: u32) -> usize {
    (handle & INDEX_MASK) as usize
}

#[derive(Debug, Clone)]
struct InternalNode {
    children: HashMap<u8, u32>,
    terminal: bool,
    doc_freq: u32,
}

#[derive(Debug, Clone)]
struct LeafNode {
    suffix: Vec<u8>,
    doc_freq: u32,
}

#[derive(Debug, Clone)]
struct CompressedNode {
    edge: Vec<u8>,
    child: u32,
}

/// How infix (substring) queries are served for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixMode {
    Off,
    Always,
    Fallback,
}

/// Typo-tolerant dictionary of a field's vocabulary: exact/prefix lookup
/// plus bounded edit-distance (k in {0,1,2}) fuzzy lookup, and an
/// auxiliary reversed trie serving infix queries by suffix.
#[derive(Clone)]
pub struct TypoDictionary {
    internal: Vec<InternalNode>,
    leaf: Vec<LeafNode>,
    compressed: Vec<CompressedNode>,
    root: u32,
    reverse: Option<Box<TypoDictionary>>,
    infix_mode: InfixMode,
}

impl TypoDictionary {
    fn new_empty() -> Self {
        TypoDictionary {
            internal: vec![InternalNode { children: HashMap::new(), terminal: false, doc_freq: 0 }],
            leaf: Vec::new(),
            compressed: Vec::new(),
            root: make_handle(NodeKind::Internal, 0),
            reverse: None,
            infix_mode: InfixMode::Off,
        }
    }

    /// Build a dictionary over `terms` (text, doc_freq pairs). When
    /// `infix_mode` is not `Off`, a second trie over reversed terms is
    /// built to serve substring queries by their suffix.
    pub fn build<I>(terms: I, infix_mode: InfixMode) -> Self
    where
        I: IntoIterator<Item = (String, u32)>,
    {
        let terms: Vec<(String, u32)> = terms.into_iter().collect();

        let mut forward = TypoDictionary::new_empty();
        for (term, freq) in &terms {
            forward.insert(term.as_bytes(), *freq);
        }
        forward.root = forward.compress(forward.root);
        forward.infix_mode = infix_mode;

        if infix_mode != InfixMode::Off {
            let mut reverse = TypoDictionary::new_empty();
            for (term, freq) in &terms {
                let reversed: String = term.chars().rev().collect();
                reverse.insert(reversed.as_bytes(), *freq);
            }
            reverse.root = reverse.compress(reverse.root);
            forward.reverse = Some(Box::new(reverse));
        }

        forward
    }

    fn alloc_leaf(&mut self, suffix: Vec<u8>, doc_freq: u32) -> u32 {
        self.leaf.push(LeafNode { suffix, doc_freq });
        make_handle(NodeKind::Leaf, self.leaf.len() - 1)
    }

    fn alloc_internal(&mut self) -> u32 {
        self.internal.push(InternalNode { children: HashMap::new(), terminal: false, doc_freq: 0 });
        make_handle(NodeKind::Internal, self.internal.len() - 1)
    }

    fn insert(&mut self, key: &[u8], doc_freq: u32) {
        let root = self.root;
        let updated = self.insert_at(root, key, doc_freq);
        self.root = updated;
    }

    fn insert_at(&mut self, handle: u32, key: &[u8], doc_freq: u32) -> u32 {
        match handle_kind(handle) {
            NodeKind::Internal => {
                let idx = handle_index(handle);
                if key.is_empty() {
                    self.internal[idx].terminal = true;
                    self.internal[idx].doc_freq = doc_freq;
                    return handle;
                }
                let first = key[0];
                if let Some(&child) = self.internal[idx].children.get(&first) {
                    let new_child = self.insert_at(child, &key[1..], doc_freq);
                    self.internal[idx].children.insert(first, new_child);
                } else {
                    let new_leaf = self.alloc_leaf(key[1..].to_vec(), doc_freq);
                    self.internal[idx].children.insert(first, new_leaf);
                }
                handle
            }
            NodeKind::Leaf => {
                let idx = handle_index(handle);
                let existing = self.leaf[idx].clone();
                if key == existing.suffix.as_slice() {
                    self.leaf[idx].doc_freq = doc_freq;
                    return handle;
                }
                // Diverging insert: explode this leaf's remaining suffix
                // into a chain of internal nodes, then continue inserting
                // both the old and new keys from there.
                let exploded = self.explode_leaf(&existing.suffix, existing.doc_freq);
                self.insert_at(exploded, key, doc_freq)
            }
            NodeKind::Compressed => unreachable!("insert runs before compression"),
        }
    }

    /// Replace a leaf's implicit single-path chain with real internal
    /// nodes, one per byte, terminating in a (possibly empty) internal
    /// node carrying the leaf's original doc_freq.
    fn explode_leaf(&mut self, suffix: &[u8], doc_freq: u32) -> u32 {
        let terminal = self.alloc_internal();
        {
            let idx = handle_index(terminal);
            self.internal[idx].terminal = true;
            self.internal[idx].doc_freq = doc_freq;
        }
        let mut handle = terminal;
        for &byte in suffix.iter().rev() {
            let parent = self.alloc_internal();
            let parent_idx = handle_index(parent);
            self.internal[parent_idx].children.insert(byte, handle);
            handle = parent;
        }
        handle
    }

    /// Bottom-up pass collapsing single-child, non-terminal internal
    /// chains into `Compressed` edges.
    fn compress(&mut self, handle: u32) -> u32 {
        match handle_kind(handle) {
            NodeKind::Leaf => handle,
            NodeKind::Compressed => handle,
            NodeKind::Internal => {
                let idx = handle_index(handle);
                let children: Vec<(u8, u32)> =
                    self.internal[idx].children.iter().map(|(&b, &h)| (b, h)).collect();
                let mut new_children = HashMap::with_capacity(children.len());
                for (byte, child) in children {
                    let compressed_child = self.compress(child);
                    new_children.insert(byte, compressed_child);
                }
                self.internal[idx].children = new_children;

                let terminal = self.internal[idx].terminal;
                if !terminal && self.internal[idx].children.len() == 1 {
                    let (&byte, &child) = self.internal[idx].children.iter().next().unwrap();
                    let merged_edge = match handle_kind(child) {
                        NodeKind::Compressed => {
                            let cidx = handle_index(child);
                            let mut edge = vec![byte];
                            edge.extend_from_slice(&self.compressed[cidx].edge);
                            Some((edge, self.compressed[cidx].child))
                        }
                        NodeKind::Internal | NodeKind::Leaf => Some((vec![byte], child)),
                    };
                    if let Some((edge, target)) = merged_edge {
                        self.compressed.push(CompressedNode { edge, child: target });
                        return make_handle(NodeKind::Compressed, self.compressed.len() - 1);
                    }
                }
                handle
            }
        }
    }

    fn is_terminal(&self, handle: u32) -> Option<u32> {
        match handle_kind(handle) {
            NodeKind::Internal => {
                let node = &self.internal[handle_index(handle)];
                node.terminal.then_some(node.doc_freq)
            }
            NodeKind::Leaf => {
                let node = &self.leaf[handle_index(handle)];
                node.suffix.is_empty().then_some(node.doc_freq)
            }
            NodeKind::Compressed => None,
        }
    }

    fn child_byte(&self, handle: u32, byte: u8) -> Option<(u32, usize)> {
        match handle_kind(handle) {
            NodeKind::Internal => {
                self.internal[handle_index(handle)].children.get(&byte).map(|&h| (h, 1))
            }
            NodeKind::Leaf => {
                let node = &self.leaf[handle_index(handle)];
                (node.suffix.first() == Some(&byte)).then(|| (handle, 1))
            }
            NodeKind::Compressed => None,
        }
    }

    /// Exact lookup; returns the term's doc_freq if present.
    pub fn exact(&self, word: &str) -> Option<u32> {
        self.descend(self.root, word.as_bytes())
    }

    fn descend(&self, handle: u32, remaining: &[u8]) -> Option<u32> {
        if remaining.is_empty() {
            return self.is_terminal(handle);
        }
        match handle_kind(handle) {
            NodeKind::Internal => {
                let child = *self.internal[handle_index(handle)].children.get(&remaining[0])?;
                self.descend(child, &remaining[1..])
            }
            NodeKind::Leaf => {
                let node = &self.leaf[handle_index(handle)];
                (node.suffix == remaining).then_some(node.doc_freq)
            }
            NodeKind::Compressed => {
                let node = &self.compressed[handle_index(handle)];
                let edge_len = node.edge.len();
                if remaining.len() < edge_len || &remaining[..edge_len] != node.edge.as_slice() {
                    None
                } else {
                    self.descend(node.child, &remaining[edge_len..])
                }
            }
        }
    }

    /// All terms with the given prefix, each with its doc_freq.
    pub fn prefix_search(&self, prefix: &str) -> Vec<(String, u32)> {
        let mut out = Vec::new();
        self.prefix_walk(self.root, prefix.as_bytes(), prefix.as_bytes().to_vec(), &mut out);
        out
    }

    fn prefix_walk(&self, handle: u32, remaining: &[u8], path: Vec<u8>, out: &mut Vec<(String, u32)>) {
        if remaining.is_empty() {
            self.collect_all(handle, path, out);
            return;
        }
        match handle_kind(handle) {
            NodeKind::Internal => {
                if let Some(&child) = self.internal[handle_index(handle)].children.get(&remaining[0]) {
                    let mut next_path = path;
                    next_path.push(remaining[0]);
                    self.prefix_walk(child, &remaining[1..], next_path, out);
                }
            }
            NodeKind::Leaf => {
                let node = &self.leaf[handle_index(handle)];
                let take = remaining.len().min(node.suffix.len());
                if node.suffix[..take] == remaining[..take] {
                    let mut full_path = path;
                    full_path.extend_from_slice(&node.suffix);
                    if remaining.len() <= node.suffix.len() {
                        if let Ok(s) = String::from_utf8(full_path) {
                            out.push((s, node.doc_freq));
                        }
                    }
                }
            }
            NodeKind::Compressed => {
                let node = &self.compressed[handle_index(handle)];
                let overlap = remaining.len().min(node.edge.len());
                if node.edge[..overlap] != remaining[..overlap] {
                    return;
                }
                let mut next_path = path;
                next_path.extend_from_slice(&node.edge);
                self.prefix_walk(node.child, &remaining[overlap..], next_path, out);
            }
        }
    }

    fn collect_all(&self, handle: u32, path: Vec<u8>, out: &mut Vec<(String, u32)>) {
        if let Some(freq) = self.is_terminal(handle) {
            if let Ok(s) = String::from_utf8(path.clone()) {
                out.push((s, freq));
            }
        }
        match handle_kind(handle) {
            NodeKind::Internal => {
                for (&byte, &child) in &self.internal[handle_index(handle)].children {
                    let mut next_path = path.clone();
                    next_path.push(byte);
                    self.collect_all(child, next_path, out);
                }
            }
            NodeKind::Compressed => {
                let node = &self.compressed[handle_index(handle)];
                let mut next_path = path;
                next_path.extend_from_slice(&node.edge);
                self.collect_all(node.child, next_path, out);
            }
            NodeKind::Leaf => {}
        }
    }

    /// Bounded edit-distance search (k in {0,1,2} per spec.md §4.4),
    /// walking the trie while pruning branches whose minimum achievable
    /// distance already exceeds `max_distance`.
    pub fn typo_search(&self, word: &str, max_distance: u8) -> Vec<(String, u32, u8)> {
        let word_chars: Vec<char> = word.chars().collect();
        let initial_row: Vec<u32> = (0..=word_chars.len() as u32).collect();
        let mut out = Vec::new();
        self.typo_walk(self.root, &word_chars, &initial_row, String::new(), max_distance, &mut out);
        out
    }

    fn typo_walk(
        &self,
        handle: u32,
        word: &[char],
        prev_row: &[u32],
        path: String,
        max_distance: u8,
        out: &mut Vec<(String, u32, u8)>,
    ) {
        if let Some(freq) = self.is_terminal(handle) {
            let distance = prev_row[word.len()];
            if distance <= max_distance as u32 {
                out.push((path.clone(), freq, distance as u8));
            }
        }
        match handle_kind(handle) {
            NodeKind::Internal => {
                for (&byte, &child) in &self.internal[handle_index(handle)].children {
                    self.step(child, byte as char, word, prev_row, path.clone(), max_distance, out);
                }
            }
            NodeKind::Compressed => {
                let node = &self.compressed[handle_index(handle)];
                let mut row = prev_row.to_vec();
                let mut current_path = path;
                let mut pruned = false;
                for &byte in &node.edge {
                    row = next_row(&row, word, byte as char);
                    current_path.push(byte as char);
                    if *row.iter().min().unwrap() > max_distance as u32 {
                        pruned = true;
                        break;
                    }
                }
                if !pruned {
                    self.typo_walk(node.child, word, &row, current_path, max_distance, out);
                }
            }
            NodeKind::Leaf => {
                let node = &self.leaf[handle_index(handle)];
                let mut row = prev_row.to_vec();
                let mut current_path = path;
                let mut pruned = false;
                for &byte in &node.suffix {
                    row = next_row(&row, word, byte as char);
                    current_path.push(byte as char);
                    if *row.iter().min().unwrap() > max_distance as u32 {
                        pruned = true;
                        break;
                    }
                }
                if !pruned {
                    let distance = row[word.len()];
                    if distance <= max_distance as u32 {
                        out.push((current_path, node.doc_freq, distance as u8));
                    }
                }
            }
        }
    }

    fn step(
        &self,
        child: u32,
        byte: char,
        word: &[char],
        prev_row: &[u32],
        mut path: String,
        max_distance: u8,
        out: &mut Vec<(String, u32, u8)>,
    ) {
        let row = next_row(prev_row, word, byte);
        if *row.iter().min().unwrap() > max_distance as u32 {
            return;
        }
        path.push(byte);
        self.typo_walk(child, word, &row, path, max_distance, out);
    }

    /// Infix (substring) search, served by scanning the reversed trie
    /// for terms ending with the query as a suffix, combined with a
    /// prefix scan for terms starting with it. `InfixMode::Off` returns
    /// no matches.
    pub fn infix_search(&self, substring: &str) -> Vec<(String, u32)> {
        if self.infix_mode == InfixMode::Off {
            return Vec::new();
        }
        let mut out = self.prefix_search(substring);
        if let Some(reverse) = &self.reverse {
            let reversed: String = substring.chars().rev().collect();
            for (term, freq) in reverse.prefix_search(&reversed) {
                let restored: String = term.chars().rev().collect();
                if !out.iter().any(|(t, _)| t == &restored) {
                    out.push((restored, freq));
                }
            }
        }
        out.sort();
        out.dedup();
        out
    }
}

/// Compute the next DP row of the Levenshtein table after consuming one
/// more trie byte (as a `char`), given the previous row.
fn next_row(prev_row: &[u32], word: &[char], byte: char) -> Vec<u32> {
    let mut row = vec![0u32; word.len() + 1];
    row[0] = prev_row[0] + 1;
    for j in 1..=word.len() {
        let cost = if word[j - 1] == byte { 0 } else { 1 };
        row[j] = (prev_row[j] + 1).min(row[j - 1] + 1).min(prev_row[j - 1] + cost);
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(words: &[&str]) -> TypoDictionary {
        TypoDictionary::build(words.iter().map(|w| (w.to_string(), 1)), InfixMode::Always)
    }

    #[test]
    fn exact_lookup_finds_inserted_terms() {
        let d = dict(&["apple", "application", "banana"]);
        assert_eq!(d.exact("apple"), Some(1));
        assert_eq!(d.exact("orange"), None);
    }

    #[test]
    fn prefix_search_finds_all_matches() {
        let d = dict(&["apple", "application", "banana"]);
        let mut results: Vec<String> = d.prefix_search("app").into_iter().map(|(t, _)| t).collect();
        results.sort();
        assert_eq!(results, vec!["apple".to_string(), "application".to_string()]);
    }

    #[test]
    fn typo_search_tolerates_one_edit() {
        let d = dict(&["apple", "application", "banana"]);
        let results = d.typo_search("appel", 2);
        assert!(results.iter().any(|(t, _, dist)| t == "apple" && *dist <= 2));
    }

    #[test]
    fn typo_search_respects_distance_zero() {
        let d = dict(&["apple", "banana"]);
        let results = d.typo_search("apple", 0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "apple");
    }

    #[test]
    fn infix_search_matches_substring_in_middle() {
        let d = dict(&["strawberry", "blueberry", "banana"]);
        let mut results: Vec<String> = d.infix_search("berry").into_iter().map(|(t, _)| t).collect();
        results.sort();
        assert_eq!(results, vec!["blueberry".to_string(), "strawberry".to_string()]);
    }

    #[test]
    fn infix_search_off_mode_returns_nothing() {
        let d = TypoDictionary::build(vec![("strawberry".to_string(), 1)], InfixMode::Off);
        assert!(d.infix_search("berry").is_empty());
    }
}
