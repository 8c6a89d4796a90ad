//! The value model shared by the AST and CST: [`Node`], plus [`Ast`], the
//! insertion-ordered name-to-value mapping a rule's named captures build up.

use indexmap::IndexMap;
use std::fmt;

use crate::bowstring::BowString;

/// A value produced while parsing: a matched token, a nested AST (the
/// result of some rule), or a list built up by repetition/promotion.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Token(BowString),
    Ast(Ast),
    List(Vec<Node>),
}

impl Node {
    pub fn token(s: impl Into<BowString>) -> Self {
        Node::Token(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Token(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ast(&self) -> Option<&Ast> {
        match self {
            Node::Ast(a) => Some(a),
            _ => None,
        }
    }

    /// Append `seq` onto this node, turning a scalar into a list the first
    /// time two values land in the same slot. Used to build a `Sequence`'s
    /// result out of its children's non-`None` results.
    pub fn push(into: &mut Option<Node>, value: Node) {
        *into = Some(match into.take() {
            None => value,
            Some(Node::List(mut v)) => {
                v.push(value);
                Node::List(v)
            }
            Some(prev) => Node::List(vec![prev, value]),
        });
    }

    /// Flatten `other` into `into`, as done by the `try` scope merging a
    /// child CST slot into its parent's.
    pub fn extend(into: &mut Option<Node>, other: Option<Node>) {
        let Some(other) = other else { return };
        *into = Some(match (into.take(), other) {
            (None, o) => o,
            (Some(Node::List(mut v)), Node::List(o)) => {
                v.extend(o);
                Node::List(v)
            }
            (Some(Node::List(mut v)), o) => {
                v.push(o);
                Node::List(v)
            }
            (Some(prev), Node::List(o)) => {
                let mut v = vec![prev];
                v.extend(o);
                Node::List(v)
            }
            (Some(prev), o) => Node::List(vec![prev, o]),
        });
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Token(s) => write!(f, "{s}"),
            Node::Ast(a) => write!(f, "{a}"),
            Node::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Key used to override a rule's result wholesale: a rule whose body binds
/// `@something` yields exactly that value rather than an [`Ast`].
pub const OVERRIDE_KEY: &str = "@";

/// Key under which [`crate::context::ParseInfo`] is attached when enabled.
pub const PARSEINFO_KEY: &str = "parseinfo";

/// Insertion-ordered mapping from capture name to value, with the
/// scalar-then-list promotion discipline described for named captures:
/// the first `add` stores the value as-is (or as a one-element list if
/// `force_list` was requested), a second `add` to the same key promotes it
/// to a list, and later `add`s simply append.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ast {
    elements: IndexMap<String, Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.elements.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.elements.contains_key(key)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Node> {
        self.elements.iter()
    }

    pub fn add(&mut self, key: impl Into<String>, value: Node, force_list: bool) {
        let key = key.into();
        match self.elements.get_mut(&key) {
            None => {
                let stored = if force_list {
                    Node::List(vec![value])
                } else {
                    value
                };
                self.elements.insert(key, stored);
            }
            Some(Node::List(list)) => list.push(value),
            Some(existing) => {
                let prev = std::mem::replace(existing, Node::List(Vec::new()));
                *existing = Node::List(vec![prev, value]);
            }
        }
    }

    /// Merge `other`'s keys into `self` using the rule described for the
    /// `try` scope: absent keys are copied; if self already holds a list
    /// and other's value is a list, they're concatenated; otherwise
    /// `other`'s value is folded in with `add`'s scalar-to-list promotion
    /// (prepending self's existing scalar when `other`'s is a list).
    pub fn update(&mut self, other: Ast) {
        for (key, value) in other.elements {
            match (self.elements.get_mut(&key), value) {
                (None, value) => {
                    self.elements.insert(key, value);
                }
                (Some(Node::List(list)), Node::List(more)) => list.extend(more),
                (Some(existing), Node::List(mut more)) => {
                    let prev = std::mem::replace(existing, Node::List(Vec::new()));
                    let mut merged = vec![prev];
                    merged.append(&mut more);
                    *existing = Node::List(merged);
                }
                (Some(existing), value) => {
                    let prev = std::mem::replace(existing, Node::List(Vec::new()));
                    match prev {
                        Node::List(mut list) => {
                            list.push(value);
                            *existing = Node::List(list);
                        }
                        prev => *existing = Node::List(vec![prev, value]),
                    }
                }
            }
        }
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_discipline_promotes_to_list_on_second_write() {
        let mut ast = Ast::new();
        ast.add("items", Node::token("a"), false);
        assert_eq!(ast.get("items"), Some(&Node::token("a")));
        ast.add("items", Node::token("b"), false);
        ast.add("items", Node::token("c"), false);
        assert_eq!(
            ast.get("items"),
            Some(&Node::List(vec![Node::token("a"), Node::token("b"), Node::token("c")]))
        );
    }

    #[test]
    fn force_list_always_stores_a_list() {
        let mut ast = Ast::new();
        ast.add("items", Node::token("a"), true);
        assert_eq!(ast.get("items"), Some(&Node::List(vec![Node::token("a")])));
    }

    #[test]
    fn missing_key_reads_as_none() {
        let ast = Ast::new();
        assert_eq!(ast.get("nope"), None);
    }

    #[test]
    fn update_merges_using_add_discipline() {
        let mut a = Ast::new();
        a.add("x", Node::token("1"), false);
        let mut b = Ast::new();
        b.add("x", Node::token("2"), false);
        b.add("y", Node::token("3"), false);
        a.update(b);
        assert_eq!(
            a.get("x"),
            Some(&Node::List(vec![Node::token("1"), Node::token("2")]))
        );
        assert_eq!(a.get("y"), Some(&Node::token("3")));
    }

    #[test]
    fn cst_push_ignores_nothing_and_promotes_on_second_add() {
        let mut slot: Option<Node> = None;
        Node::push(&mut slot, Node::token("a"));
        assert_eq!(slot, Some(Node::token("a")));
        Node::push(&mut slot, Node::token("b"));
        assert_eq!(slot, Some(Node::List(vec![Node::token("a"), Node::token("b")])));
        Node::push(&mut slot, Node::token("c"));
        assert_eq!(
            slot,
            Some(Node::List(vec![Node::token("a"), Node::token("b"), Node::token("c")]))
        );
    }

    #[test]
    fn cst_extend_flattens_child_into_parent() {
        let mut parent: Option<Node> = Some(Node::token("a"));
        let child = Some(Node::List(vec![Node::token("b"), Node::token("c")]));
        Node::extend(&mut parent, child);
        assert_eq!(
            parent,
            Some(Node::List(vec![Node::token("a"), Node::token("b"), Node::token("c")]))
        );
    }
}
