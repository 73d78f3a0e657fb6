//! In-progress and completed branch sub-trees

/// One element of a repeating branch, with everything below it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchNode {
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order
    pub children: Vec<BranchNode>,
    /// Concatenation of all text chunks directly inside this element
    pub text: String,
}

impl BranchNode {
    pub fn new(name: impl Into<String>, attributes: Vec<(String, String)>) -> Self {
        BranchNode {
            name: name.into(),
            attributes,
            children: Vec::new(),
            text: String::new(),
        }
    }

    /// Builder: add an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Builder: add a child element
    pub fn with_child(mut self, child: BranchNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder: append text
    pub fn with_text(mut self, text: impl AsRef<str>) -> Self {
        self.text.push_str(text.as_ref());
        self
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Number of elements in this sub-tree, including this one
    pub fn element_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(&node.children);
        }
        count
    }
}

// Children are released level by level; call stack use does not grow with depth
impl Drop for BranchNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}
