//! Minimal document model for the simulated page
//!
//! Supports the selector subset the specs use: compounds of tag, `#id`, and
//! `.class`, joined by the descendant combinator (whitespace).

use std::collections::BTreeMap;

use crate::error::{E2eError, E2eResult};

pub type NodeId = usize;

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    /// Own text, for leaf elements
    pub text: String,
    /// Current value, for form controls
    pub value: Option<String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Arena-backed element tree rooted at `<html>`
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                tag: "html".to_string(),
                ..Default::default()
            }],
        }
    }

    /// Create an element and append it to `parent`
    pub fn append(&mut self, parent: NodeId, tag: &str, id: Option<&str>, classes: &[&str]) -> NodeId {
        let node = self.nodes.len();
        self.nodes.push(Node {
            tag: tag.to_string(),
            id: id.map(String::from),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            parent: Some(parent),
            ..Default::default()
        });
        self.nodes[parent].children.push(node);
        node
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// Detach `id` from its parent. The subtree stays in the arena but is no
    /// longer reachable by queries.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&child| child != id);
        }
    }

    /// Number of nodes in the arena, attached or not
    #[cfg(test)]
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn set_class(&mut self, id: NodeId, class: &str, on: bool) {
        let node = &mut self.nodes[id];
        let present = node.has_class(class);
        if on && !present {
            node.classes.push(class.to_string());
        } else if !on && present {
            node.classes.retain(|c| c != class);
        }
    }

    /// Whether the node is reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == Self::ROOT {
                return true;
            }
            match self.nodes[current].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// `textContent`: own text followed by descendants' text in order
    pub fn text_content(&self, id: NodeId) -> String {
        let node = &self.nodes[id];
        let mut text = node.text.clone();
        for &child in &node.children {
            text.push_str(&self.text_content(child));
        }
        text
    }

    /// Ancestors from the parent upwards
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id].parent, move |&n| self.nodes[n].parent)
    }

    /// Attached nodes in document order
    fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }

    /// All attached elements matching `selector`, in document order
    pub fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|&id| selector.matches(self, id))
            .collect()
    }
}

/// One compound selector: optional tag, optional id, any number of classes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(selector: &str, part: &str) -> E2eResult<Self> {
        let invalid = |reason: &str| E2eError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        };

        let mut compound = Compound::default();
        let mut rest = part;

        let tag_end = rest.find(['#', '.']).unwrap_or(rest.len());
        if tag_end > 0 {
            compound.tag = Some(rest[..tag_end].to_ascii_lowercase());
        }
        rest = &rest[tag_end..];

        while !rest.is_empty() {
            let marker = rest.as_bytes()[0];
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() {
                return Err(invalid("empty id or class name"));
            }
            if !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(invalid("unsupported character"));
            }
            match marker {
                b'#' if compound.id.is_some() => return Err(invalid("more than one id")),
                b'#' => compound.id = Some(name.to_string()),
                _ => compound.classes.push(name.to_string()),
            }
            rest = &body[end..];
        }

        if let Some(tag) = &compound.tag {
            if !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(invalid("unsupported character"));
            }
        }

        Ok(compound)
    }

    fn matches(&self, node: &Node) -> bool {
        self.tag.as_deref().map_or(true, |t| node.tag == t)
            && self
                .id
                .as_deref()
                .map_or(true, |id| node.id.as_deref() == Some(id))
            && self.classes.iter().all(|c| node.has_class(c))
    }
}

/// A parsed selector: compounds joined by descendant combinators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    parts: Vec<Compound>,
}

impl Selector {
    pub fn parse(selector: &str) -> E2eResult<Self> {
        let parts = selector
            .split_whitespace()
            .map(|part| Compound::parse(selector, part))
            .collect::<E2eResult<Vec<_>>>()?;

        if parts.is_empty() {
            return Err(E2eError::InvalidSelector {
                selector: selector.to_string(),
                reason: "empty selector".to_string(),
            });
        }

        Ok(Self { parts })
    }

    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some((last, ancestors)) = self.parts.split_last() else {
            return false;
        };
        if !last.matches(doc.node(id)) {
            return false;
        }

        // Match the remaining compounds right to left against the ancestor
        // chain, taking the nearest ancestor that fits each one.
        let mut chain = doc.ancestors(id);
        ancestors
            .iter()
            .rev()
            .all(|compound| chain.any(|a| compound.matches(doc.node(a))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let body = doc.append(Document::ROOT, "body", None, &[]);
        let list = doc.append(body, "section", Some("card-list"), &["card-list"]);
        let card = doc.append(list, "article", None, &["card"]);
        let img = doc.append(card, "img", None, &["card-img"]);
        doc.append(body, "img", None, &["card-img", "outside"]);
        (doc, list, img)
    }

    #[test]
    fn test_descendant_selector() {
        let (doc, _, img) = sample();
        let sel = Selector::parse("#card-list .card-img").unwrap();
        assert_eq!(doc.query_all(&sel), vec![img]);

        let sel = Selector::parse(".card-img").unwrap();
        assert_eq!(doc.query_all(&sel).len(), 2);

        let sel = Selector::parse("section article img.card-img").unwrap();
        assert_eq!(doc.query_all(&sel), vec![img]);
    }

    #[test]
    fn test_detached_nodes_are_not_matched() {
        let (mut doc, list, img) = sample();
        let card = doc.node(list).children[0];
        doc.detach(card);
        assert!(!doc.is_attached(img));
        assert!(doc.node(list).children.is_empty());

        let sel = Selector::parse("#card-list .card-img").unwrap();
        assert!(doc.query_all(&sel).is_empty());
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("#").is_err());
        assert!(Selector::parse("#a#b").is_err());
        assert!(Selector::parse("[data-x=1]").is_err());
        assert!(Selector::parse("div > p").is_err());
    }

    #[test]
    fn test_text_content_and_classes() {
        let mut doc = Document::new();
        let div = doc.append(Document::ROOT, "div", Some("fb"), &["invalid-feedback"]);
        doc.node_mut(div).text = "Please ".to_string();
        let span = doc.append(div, "span", None, &[]);
        doc.node_mut(span).text = "type".to_string();
        assert_eq!(doc.text_content(div), "Please type");

        doc.set_class(div, "d-block", true);
        doc.set_class(div, "d-block", true);
        assert_eq!(doc.node(div).classes, vec!["invalid-feedback", "d-block"]);
        doc.set_class(div, "d-block", false);
        assert!(!doc.node(div).has_class("d-block"));
    }
}
