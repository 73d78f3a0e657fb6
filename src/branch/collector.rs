//! Branch Collector
//!
//! Consumes parse events and materializes one repeating branch at a time.
//! Outside a branch only the open element path is kept; inside a branch an
//! explicit stack of node builders holds the elements not yet closed. A
//! completed branch is moved out to the caller and nothing refers to it
//! afterwards.

use std::collections::HashSet;

use super::node::BranchNode;
use super::path::RepeatPath;
use crate::error::{IngestError, Result};
use crate::reader::{EventSource, ParseEvent};

/// Iterator of completed branches over an event source
pub struct BranchCollector<S> {
    source: S,
    path: RepeatPath,
    /// Direct children of the repeating element that are dropped unread
    ignore: HashSet<String>,
    /// Element names from the document root to the current position
    open: Vec<String>,
    /// Elements of the active branch not yet closed; empty outside a branch
    stack: Vec<BranchNode>,
    /// Depth of the ignored element being skipped
    skip_depth: Option<usize>,
    completed: u64,
    done: bool,
}

impl<S: EventSource> BranchCollector<S> {
    pub fn new(source: S, path: RepeatPath) -> Self {
        BranchCollector {
            source,
            path,
            ignore: HashSet::new(),
            open: Vec::new(),
            stack: Vec::new(),
            skip_depth: None,
            completed: 0,
            done: false,
        }
    }

    /// Drop these direct children of the repeating element
    pub fn with_ignore<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.ignore.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn repeat_path(&self) -> &RepeatPath {
        &self.path
    }

    /// Branches handed out so far
    pub fn branches_completed(&self) -> u64 {
        self.completed
    }

    /// Byte offset of the underlying source
    pub fn offset(&self) -> u64 {
        self.source.offset()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Next completed branch, or `None` at end of input
    pub fn next_branch(&mut self) -> Result<Option<BranchNode>> {
        if self.done {
            return Ok(None);
        }
        let result = self.collect();
        match &result {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                self.done = true;
                self.stack.clear();
            }
        }
        result
    }

    fn collect(&mut self) -> Result<Option<BranchNode>> {
        loop {
            let event = match self.source.next_event()? {
                Some(event) => event,
                None if self.stack.is_empty() => return Ok(None),
                None => {
                    return Err(IngestError::malformed(
                        format!("input ended inside <{}>", self.open_path()),
                        self.source.offset(),
                    ))
                }
            };

            match event {
                ParseEvent::ElementStart { name, attributes } => {
                    self.open.push(name);
                    if self.skip_depth.is_some() {
                        continue;
                    }
                    self.start_element(attributes)?;
                }
                ParseEvent::Text(text) => {
                    if self.skip_depth.is_some() {
                        continue;
                    }
                    if let Some(top) = self.stack.last_mut() {
                        top.text.push_str(&text);
                    }
                }
                ParseEvent::ElementEnd { .. } => {
                    let depth = self.open.len();
                    self.open.pop();
                    if let Some(skip) = self.skip_depth {
                        if depth == skip {
                            self.skip_depth = None;
                        }
                        continue;
                    }
                    if let Some(branch) = self.end_element() {
                        self.completed += 1;
                        return Ok(Some(branch));
                    }
                }
            }
        }
    }

    /// Handle the element just pushed onto `open`
    fn start_element(&mut self, attributes: Vec<(String, String)>) -> Result<()> {
        let Some(name) = self.open.last() else {
            return Ok(());
        };

        if self.stack.is_empty() {
            if self.path.matches(&self.open) {
                self.stack.push(BranchNode::new(name.clone(), attributes));
            }
            return Ok(());
        }

        if self.stack.len() == 1 && self.ignore.contains(name) {
            self.skip_depth = Some(self.open.len());
            return Ok(());
        }
        if self.repeats_below_branch() {
            return Err(IngestError::RecursiveBranch {
                path: self.open_path(),
                offset: self.source.offset(),
            });
        }

        self.stack.push(BranchNode::new(name.clone(), attributes));
        Ok(())
    }

    /// Close the top node; returns the branch when its root closes
    fn end_element(&mut self) -> Option<BranchNode> {
        let node = self.stack.pop()?;
        match self.stack.last_mut() {
            Some(parent) => {
                parent.children.push(node);
                None
            }
            None => Some(node),
        }
    }

    /// The repeat path occurs again, rooted at the branch element
    ///
    /// `r/item/r/item` for `r/item`, or `item/item` for `item`. Deeper
    /// elements that share a name with the repeat path are ordinary children.
    fn repeats_below_branch(&self) -> bool {
        let depth = self.path.depth();
        self.open.len() == 2 * depth && self.open[depth..] == *self.path.segments()
    }

    fn open_path(&self) -> String {
        self.open.join("/")
    }
}

impl<S: EventSource> Iterator for BranchCollector<S> {
    type Item = Result<BranchNode>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_branch().transpose()
    }
}

impl<S: EventSource> std::iter::FusedIterator for BranchCollector<S> {}
