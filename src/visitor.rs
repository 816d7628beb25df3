//! The visitor pipeline that runs between evaluation and emission.
//!
//! Order matters: `JoinSelectors` computes every ruleset's output paths by
//! resolving `&` against the enclosing paths, the extend passes
//! ([`crate::extend`]) graft matched selectors onto those paths, and
//! [`ToCss`] prunes everything that must not reach the output (variables,
//! mixin frames, invisible nodes, empty blocks) and folds `+`/`+_` merge
//! declarations.

use crate::declaration::Merge;
use crate::expression::{Expression, ValueList};
use crate::node::{Node, NodeKind};
use crate::selector::{Combinator, Element, Selector};

/// A tree pass.  Host-provided visitors implement this and slot into the
/// pipeline before or after evaluation according to `is_pre_eval`.
pub trait NodeVisitor {
    /// Runs before evaluation instead of after.
    fn is_pre_eval(&self) -> bool {
        false
    }

    /// The visitor replaces nodes rather than only mutating them in place.
    /// Both styles receive `&mut Node`; the flag is advisory, mirroring how
    /// host runtimes describe their visitors.
    fn is_replacing(&self) -> bool {
        false
    }

    fn visit(&mut self, root: &mut Node);
}

/// Resolves `&` and computes `paths` for every ruleset.
pub struct JoinSelectors;

impl NodeVisitor for JoinSelectors {
    fn is_replacing(&self) -> bool {
        true
    }

    fn visit(&mut self, root: &mut Node) {
        join_node(root, &[]);
    }
}

fn join_node(node: &mut Node, context: &[Selector]) {
    match &mut node.kind {
        NodeKind::Ruleset(rs) => {
            if rs.root {
                for rule in &mut rs.rules {
                    join_node(rule, &[]);
                }
            } else if rs.selectors.is_empty() {
                // Transparent container (at-rule body, bubbled-block
                // wrapper, multi-block group): inherit the enclosing paths.
                rs.paths = context.to_vec();
                let paths = rs.paths.clone();
                for rule in &mut rs.rules {
                    join_node(rule, &paths);
                }
            } else {
                let paths = join_selector_list(context, &rs.selectors);
                rs.paths = paths.clone();
                for rule in &mut rs.rules {
                    join_node(rule, &paths);
                }
            }
        }
        NodeKind::Media(m) => {
            for rule in &mut m.body.rules {
                join_node(rule, context);
            }
        }
        NodeKind::Container(c) => {
            for rule in &mut c.body.rules {
                join_node(rule, context);
            }
        }
        NodeKind::AtRule(a) => {
            let inner: &[Selector] = if a.is_rooted { &[] } else { context };
            for rule in &mut a.body.rules {
                join_node(rule, inner);
            }
        }
        _ => {}
    }
}

/// Joins each selector against every context path.  Selectors without `&`
/// nest under each context path; each `&` occurrence substitutes a context
/// path, multiplying paths when several are in scope.
pub fn join_selector_list(context: &[Selector], selectors: &[Selector]) -> Vec<Selector> {
    let mut out = Vec::new();

    for selector in selectors {
        if !selector.evald_condition {
            continue;
        }

        if !selector.has_parent_ref() {
            if context.is_empty() {
                out.push(derive(selector, selector.elements.clone()));
            } else {
                for ctx_path in context {
                    let mut elements = ctx_path.elements.clone();
                    for (i, el) in selector.elements.iter().enumerate() {
                        let mut el = el.clone();
                        if i == 0 && el.combinator.value.is_empty() {
                            el.combinator = Combinator::descendant();
                        }
                        elements.push(el);
                    }
                    out.push(derive(selector, elements));
                }
            }
            continue;
        }

        // `&` substitution.  Every occurrence branches over all context
        // paths, so `& + &` against `.a, .b` yields the full product.
        let mut partials: Vec<Vec<Element>> = vec![Vec::new()];
        let mut just_substituted = false;

        for el in &selector.elements {
            if el.is_parent_ref() {
                if context.is_empty() {
                    // `&` at the root substitutes nothing.
                    just_substituted = true;
                    continue;
                }
                let mut next = Vec::with_capacity(partials.len() * context.len());
                for partial in &partials {
                    for ctx_path in context {
                        let mut p = partial.clone();
                        for (i, ctx_el) in ctx_path.elements.iter().enumerate() {
                            let mut ctx_el = ctx_el.clone();
                            if i == 0 && !el.combinator.value.is_empty()
                                && el.combinator.value != " "
                            {
                                ctx_el.combinator = el.combinator.clone();
                            } else if i == 0 && !p.is_empty()
                                && ctx_el.combinator.value.is_empty()
                            {
                                ctx_el.combinator = Combinator::descendant();
                            }
                            p.push(ctx_el);
                        }
                        next.push(p);
                    }
                }
                partials = next;
                just_substituted = true;
            } else {
                let merge_suffix = just_substituted
                    && el.combinator.value.is_empty()
                    && !el.value.is_empty();
                for partial in &mut partials {
                    if merge_suffix {
                        if let Some(last) = partial.last_mut() {
                            last.value.push_str(&el.value);
                            continue;
                        }
                    }
                    partial.push(el.clone());
                }
                just_substituted = false;
            }
        }

        for partial in partials {
            if !partial.is_empty() {
                out.push(derive(selector, partial));
            }
        }
    }

    out
}

/// A joined path keeps the source selector's extends, guard result, and
/// visibility.
fn derive(source: &Selector, elements: Vec<Element>) -> Selector {
    let mut joined = Selector::new(elements);
    joined.extend_list = source.extend_list.clone();
    joined.evald_condition = source.evald_condition;
    joined.visibility = source.visibility;
    joined
}

/// Final cleanup before emission.
pub struct ToCss {
    charset_seen: bool,
}

impl ToCss {
    pub fn new() -> ToCss {
        ToCss {
            charset_seen: false,
        }
    }
}

impl Default for ToCss {
    fn default() -> Self {
        ToCss::new()
    }
}

impl NodeVisitor for ToCss {
    fn is_replacing(&self) -> bool {
        true
    }

    fn visit(&mut self, root: &mut Node) {
        if let NodeKind::Ruleset(rs) = &mut root.kind {
            self.clean_rules(&mut rs.rules);
            merge_declarations(&mut rs.rules);
        }
    }
}

impl ToCss {
    fn clean_rules(&mut self, rules: &mut Vec<Node>) {
        for rule in rules.iter_mut() {
            match &mut rule.kind {
                NodeKind::Ruleset(rs) => {
                    // Hidden rulesets survive only through paths an extend
                    // re-exposed.
                    if rule.visibility.blocks_visibility()
                        && rule.visibility.node_visible() != Some(false)
                    {
                        rs.paths.retain(|p| p.visibility.node_visible() == Some(true));
                    }
                    self.clean_rules(&mut rs.rules);
                    merge_declarations(&mut rs.rules);
                }
                NodeKind::Media(m) => self.clean_rules(&mut m.body.rules),
                NodeKind::Container(c) => self.clean_rules(&mut c.body.rules),
                NodeKind::AtRule(a) => self.clean_rules(&mut a.body.rules),
                _ => {}
            }
        }

        rules.retain(|rule| self.keep(rule));
    }

    fn keep(&mut self, rule: &Node) -> bool {
        match &rule.kind {
            NodeKind::Declaration(d) => !d.is_variable && rule.is_visible(),
            NodeKind::Comment(c) => !c.is_line_comment && rule.is_visible(),
            NodeKind::MixinDefinition(_)
            | NodeKind::MixinCall(_)
            | NodeKind::VariableCall(_)
            | NodeKind::DetachedRuleset(_)
            | NodeKind::Extend(_)
            | NodeKind::Condition(_) => false,
            NodeKind::Ruleset(rs) => {
                if rs.rules.is_empty() {
                    return false;
                }
                if rule.visibility.node_visible() == Some(false) {
                    return false;
                }
                if rule.visibility.blocks_visibility()
                    && rule.visibility.node_visible() != Some(true)
                {
                    // Kept only when an extend re-exposed one of its paths.
                    return !rs.paths.is_empty()
                        && rs
                            .paths
                            .iter()
                            .any(|p| p.visibility.node_visible() == Some(true));
                }
                true
            }
            NodeKind::Media(m) => rule.is_visible() && !m.body.rules.is_empty(),
            NodeKind::Container(c) => rule.is_visible() && !c.body.rules.is_empty(),
            NodeKind::AtRule(a) => {
                if !rule.is_visible() {
                    return false;
                }
                if a.name.eq_ignore_ascii_case("@charset") {
                    // The first @charset wins; the rest disappear.
                    if self.charset_seen {
                        log::warn!("dropping repeated @charset rule");
                        return false;
                    }
                    self.charset_seen = true;
                    return true;
                }
                a.has_body() || a.body.value.is_some()
            }
            NodeKind::Import(_) => rule.is_visible(),
            NodeKind::Anonymous(an) => rule.is_visible() && !an.value.is_empty(),
            _ => rule.is_visible(),
        }
    }
}

/// Folds `prop+: v` (comma) and `prop+_: v` (space) declarations into the
/// first declaration of each merge group.
fn merge_declarations(rules: &mut Vec<Node>) {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();

    for (i, rule) in rules.iter().enumerate() {
        if let NodeKind::Declaration(d) = &rule.kind {
            if d.merge.is_some() && !d.is_variable {
                match groups.iter_mut().find(|(name, _)| *name == d.name) {
                    Some((_, indices)) => indices.push(i),
                    None => groups.push((d.name.clone(), vec![i])),
                }
            }
        }
    }

    let mut remove = Vec::new();
    for (_, indices) in &groups {
        if indices.len() < 2 {
            continue;
        }

        // Build comma groups; a spaced merge appends to the current group.
        let mut comma_groups: Vec<Vec<Node>> = Vec::new();
        let mut important = false;
        for &i in indices {
            let NodeKind::Declaration(d) = &rules[i].kind else {
                continue;
            };
            important = important || d.important;
            match d.merge {
                Some(Merge::Spaced) if !comma_groups.is_empty() => {
                    comma_groups.last_mut().unwrap().push(d.value.clone());
                }
                _ => comma_groups.push(vec![d.value.clone()]),
            }
        }

        let parts: Vec<Node> = comma_groups
            .into_iter()
            .map(|group| {
                if group.len() == 1 {
                    group.into_iter().next().unwrap()
                } else {
                    Node::from_kind(NodeKind::Expression(Expression::new(group)))
                }
            })
            .collect();

        let merged_value = if parts.len() == 1 {
            parts.into_iter().next().unwrap()
        } else {
            Node::from_kind(NodeKind::Value(ValueList::new(parts)))
        };

        let first = indices[0];
        if let NodeKind::Declaration(d) = &mut rules[first].kind {
            d.value = merged_value;
            d.important = d.important || important;
        }
        remove.extend(indices[1..].iter().copied());
    }

    remove.sort_unstable();
    for &i in remove.iter().rev() {
        rules.remove(i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::Declaration;
    use crate::ruleset::Ruleset;

    fn sel(value: &str) -> Selector {
        Selector::from_value(value)
    }

    #[test]
    fn nesting_without_parent_ref_prepends_context() {
        let paths = join_selector_list(&[sel(".a")], &[sel(".b")]);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].css_text(), ".a .b");
    }

    #[test]
    fn parent_ref_substitutes_context() {
        let mut hover = sel("&");
        hover.elements.push(Element::new(Combinator::none(), ":hover"));
        let paths = join_selector_list(&[sel(".a")], &[hover]);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].css_text(), ".a:hover");
    }

    #[test]
    fn double_parent_ref_multiplies_paths() {
        let double = Selector::new(vec![
            Element::new(Combinator::none(), "&"),
            Element::new(Combinator::new("+"), "&"),
        ]);
        let paths = join_selector_list(&[sel(".a"), sel(".b")], &[double]);
        let css: Vec<String> = paths.iter().map(Selector::css_text).collect();
        assert_eq!(css, vec![".a + .a", ".a + .b", ".b + .a", ".b + .b"]);
    }

    #[test]
    fn parent_suffix_merges_into_last_element() {
        let suffix = Selector::new(vec![
            Element::new(Combinator::none(), "&"),
            Element::new(Combinator::none(), "-wide"),
        ]);
        let paths = join_selector_list(&[sel(".box")], &[suffix]);
        assert_eq!(paths[0].css_text(), ".box-wide");
    }

    #[test]
    fn merge_declarations_joins_with_commas() {
        let mut d1 = Declaration::new("box-shadow", Node::anonymous("inset 0 0 10px #555"));
        d1.merge = Some(Merge::Comma);
        let mut d2 = Declaration::new("box-shadow", Node::anonymous("0 0 20px black"));
        d2.merge = Some(Merge::Comma);

        let mut rules = vec![
            Node::from_kind(NodeKind::Declaration(Box::new(d1))),
            Node::from_kind(NodeKind::Declaration(Box::new(d2))),
        ];
        merge_declarations(&mut rules);

        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules[0].to_css_string(),
            "box-shadow: inset 0 0 10px #555, 0 0 20px black;"
        );
    }

    #[test]
    fn to_css_drops_empty_and_invisible_rulesets() {
        let empty = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
            vec![sel(".empty")],
            vec![],
        ))));

        let mut hidden = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
            vec![sel(".hidden")],
            vec![Node::from_kind(NodeKind::Declaration(Box::new(
                Declaration::new("color", Node::keyword("red")),
            )))],
        ))));
        hidden.visibility.add_block();

        let kept = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
            vec![sel(".kept")],
            vec![Node::from_kind(NodeKind::Declaration(Box::new(
                Declaration::new("color", Node::keyword("red")),
            )))],
        ))));

        let mut root = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::file_root(vec![
            empty, hidden, kept,
        ]))));

        ToCss::new().visit(&mut root);

        let NodeKind::Ruleset(rs) = &root.kind else {
            panic!("expected ruleset");
        };
        assert_eq!(rs.rules.len(), 1);
    }
}
