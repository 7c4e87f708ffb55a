//! Multi-pattern signature matching.
//!
//! A classical Aho-Corasick automaton over the byte alphabet: keyword trie,
//! BFS failure links, output sets merged across failure links so a single
//! forward pass reports every registered magic at every position. The carver
//! feeds it overlapping dump windows; `max_pattern_len` tells the caller how
//! much overlap is required so no match is lost at a window seam.

use std::collections::VecDeque;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("magic for pattern {0} is shorter than 2 bytes")]
    MagicTooShort(String),
    #[error("pattern {0} added after build")]
    AlreadyBuilt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchHit {
    pub signature_id: &'static str,
    pub magic_len: usize,
    pub offset: u64,
}

struct Node {
    next: [i32; 256],
    fail: u32,
    // pattern indexes accepted at this node, merged across failure links
    outputs: Vec<u32>,
}

impl Node {
    fn new() -> Self {
        Self {
            next: [-1; 256],
            fail: 0,
            outputs: Vec::new(),
        }
    }
}

struct Pattern {
    id: &'static str,
    magic: &'static [u8],
}

/// Aho-Corasick automaton over all registered signature magics.
pub struct SignatureMatcher {
    patterns: Vec<Pattern>,
    nodes: Vec<Node>,
    built: bool,
    max_len: usize,
}

impl SignatureMatcher {
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
            nodes: vec![Node::new()],
            built: false,
            max_len: 0,
        }
    }

    /// Register a magic before sealing. Magics shorter than two bytes are
    /// rejected; they would fan out on nearly every byte of the dump.
    pub fn add_pattern(
        &mut self,
        id: &'static str,
        magic: &'static [u8],
    ) -> Result<(), MatcherError> {
        if self.built {
            return Err(MatcherError::AlreadyBuilt(id.to_string()));
        }
        if magic.len() < 2 {
            return Err(MatcherError::MagicTooShort(id.to_string()));
        }
        self.patterns.push(Pattern { id, magic });
        self.max_len = self.max_len.max(magic.len());
        Ok(())
    }

    /// Seal the pattern set: build the trie, compute BFS failure links, and
    /// merge output sets so every accepting node carries its full report
    /// list. Idempotent while the pattern set is unchanged.
    pub fn build(&mut self) {
        if self.built {
            return;
        }

        for (pat_idx, pattern) in self.patterns.iter().enumerate() {
            let mut state = 0usize;
            for &byte in pattern.magic {
                let next = self.nodes[state].next[byte as usize];
                state = if next >= 0 {
                    next as usize
                } else {
                    let new_idx = self.nodes.len();
                    self.nodes.push(Node::new());
                    self.nodes[state].next[byte as usize] = new_idx as i32;
                    new_idx
                };
            }
            self.nodes[state].outputs.push(pat_idx as u32);
        }

        let mut queue = VecDeque::new();
        for byte in 0..256 {
            let child = self.nodes[0].next[byte];
            if child >= 0 {
                self.nodes[child as usize].fail = 0;
                queue.push_back(child as usize);
            }
        }

        while let Some(state) = queue.pop_front() {
            for byte in 0..256usize {
                let child = self.nodes[state].next[byte];
                if child < 0 {
                    continue;
                }
                let child = child as usize;
                queue.push_back(child);

                // Walk failure links of the parent until a state with a
                // transition on this byte is found (or the root).
                let mut fail = self.nodes[state].fail as usize;
                let fail_of_child = loop {
                    let next = self.nodes[fail].next[byte];
                    if next >= 0 {
                        break next as usize;
                    }
                    if fail == 0 {
                        break 0;
                    }
                    fail = self.nodes[fail].fail as usize;
                };
                self.nodes[child].fail = fail_of_child as u32;

                let inherited = self.nodes[fail_of_child].outputs.clone();
                self.nodes[child].outputs.extend(inherited);
            }
        }

        self.built = true;
    }

    /// Report every occurrence of every pattern in `slice`. Offsets are
    /// absolute: `base_offset + end_index - magic_len + 1` for a match ending
    /// at `end_index`. Two magics ending at the same byte both fire.
    pub fn search(&self, slice: &[u8], base_offset: u64) -> Vec<MatchHit> {
        debug_assert!(self.built, "search before build");
        let mut hits = Vec::new();
        let mut state = 0usize;

        for (i, &byte) in slice.iter().enumerate() {
            loop {
                let next = self.nodes[state].next[byte as usize];
                if next >= 0 {
                    state = next as usize;
                    break;
                }
                if state == 0 {
                    break;
                }
                state = self.nodes[state].fail as usize;
            }

            for &pat_idx in &self.nodes[state].outputs {
                let pattern = &self.patterns[pat_idx as usize];
                hits.push(MatchHit {
                    signature_id: pattern.id,
                    magic_len: pattern.magic.len(),
                    offset: base_offset + i as u64 + 1 - pattern.magic.len() as u64,
                });
            }
        }

        hits
    }

    /// Longest registered magic; the carver overlaps successive scan windows
    /// by this much.
    pub fn max_pattern_len(&self) -> usize {
        self.max_len
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl Default for SignatureMatcher {
    fn default() -> Self {
        Self::new()
    }
}
