//! The extend engine: collecting `:extend` targets and propagating matched
//! selectors.
//!
//! Both passes run on the evaluated tree after selector joining.  The
//! finder gathers every extend with the full selector paths of the ruleset
//! hosting it; the processor then appends synthesized paths to every
//! ruleset whose paths match an extend target, iterating until a pass adds
//! nothing new (bounded by extends times selectors).

use crate::node::{Node, NodeKind, Visibility};
use crate::selector::{Element, Selector};

/// Matching mode of one `:extend` target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ExtendOption {
    /// The target must equal a whole selector path.
    Exact,

    /// `all`: the target may appear anywhere inside a path; the matched
    /// span is replaced.
    All,
}

/// An `:extend(...)` occurrence, either inline on a selector or as a
/// standalone `&:extend(...)` rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Extend {
    /// The target selector.
    pub selector: Node,
    pub option: ExtendOption,

    /// Stable identity assigned by the finder, for deduplication.
    pub object_id: usize,
}

impl Extend {
    pub fn new(selector: Node, option: ExtendOption) -> Extend {
        Extend {
            selector,
            option,
            object_id: 0,
        }
    }
}

/// A collected extend, ready for matching.
#[derive(Debug, Clone)]
pub struct FoundExtend {
    pub target: Selector,
    pub option: ExtendOption,

    /// Joined paths of the ruleset the extend sits in; these are what get
    /// grafted onto matching rulesets.
    pub self_paths: Vec<Selector>,

    pub visibility: Visibility,

    /// Stable identity, assigned in collection order.
    pub object_id: usize,
}

/// Walks the evaluated tree and collects every extend with its host
/// ruleset's paths, deduplicated.
pub fn find_extends(root: &Node) -> Vec<FoundExtend> {
    let mut found = Vec::new();
    collect(root, &mut found);

    let mut seen = std::collections::HashSet::new();
    let mut deduped = Vec::with_capacity(found.len());
    for mut f in found {
        let key = (
            f.target.css_text(),
            f.option,
            f.self_paths
                .iter()
                .map(Selector::css_text)
                .collect::<Vec<_>>()
                .join(","),
        );
        if seen.insert(key) {
            f.object_id = deduped.len() + 1;
            f.self_paths
                .retain(|p| !p.media_empty && !p.elements.is_empty());
            deduped.push(f);
        }
    }
    deduped
}

fn collect(node: &Node, out: &mut Vec<FoundExtend>) {
    match &node.kind {
        NodeKind::Ruleset(rs) => {
            let host_paths: Vec<Selector> = if rs.paths.is_empty() {
                rs.selectors.clone()
            } else {
                rs.paths.clone()
            };

            // Inline form: `.b:extend(.a)` rides on the joined paths.
            for path in &host_paths {
                for extend_node in &path.extend_list {
                    if let Some(found) =
                        to_found(extend_node, std::slice::from_ref(path), node)
                    {
                        out.push(found);
                    }
                }
            }

            // Standalone form: `&:extend(.a);` applies to every path.
            for rule in &rs.rules {
                if matches!(rule.kind, NodeKind::Extend(_)) {
                    if let Some(found) = to_found(rule, &host_paths, rule) {
                        out.push(found);
                    }
                }
                collect(rule, out);
            }
        }
        NodeKind::Media(m) => m.body.rules.iter().for_each(|r| collect(r, out)),
        NodeKind::Container(c) => c.body.rules.iter().for_each(|r| collect(r, out)),
        NodeKind::AtRule(a) => a.body.rules.iter().for_each(|r| collect(r, out)),
        _ => {}
    }
}

fn to_found(extend_node: &Node, self_paths: &[Selector], origin: &Node) -> Option<FoundExtend> {
    let NodeKind::Extend(extend) = &extend_node.kind else {
        return None;
    };
    let NodeKind::Selector(target) = &extend.selector.kind else {
        return None;
    };
    Some(FoundExtend {
        target: (**target).clone(),
        option: extend.option,
        self_paths: self_paths.to_vec(),
        visibility: origin.visibility,
        object_id: 0,
    })
}

/// Appends synthesized paths to every ruleset whose paths match an extend,
/// repeating until a whole pass adds nothing (chained extends resolve one
/// pass per link).
pub fn process_extends(root: &mut Node) {
    let extends = find_extends(root);
    if extends.is_empty() {
        return;
    }

    let selector_count = count_selectors(root).max(1);
    let max_passes = extends.len() * selector_count;

    for _ in 0..max_passes {
        let mut added = false;
        apply(root, &extends, &mut added);
        if !added {
            break;
        }
    }
    log::debug!("processed {} extend target(s)", extends.len());
}

fn count_selectors(node: &Node) -> usize {
    let mut count = 0;
    match &node.kind {
        NodeKind::Ruleset(rs) => {
            count += rs.paths.len().max(rs.selectors.len());
            count += rs.rules.iter().map(count_selectors).sum::<usize>();
        }
        NodeKind::Media(m) => count += m.body.rules.iter().map(count_selectors).sum::<usize>(),
        NodeKind::Container(c) => {
            count += c.body.rules.iter().map(count_selectors).sum::<usize>()
        }
        NodeKind::AtRule(a) => count += a.body.rules.iter().map(count_selectors).sum::<usize>(),
        _ => {}
    }
    count
}

fn apply(node: &mut Node, extends: &[FoundExtend], added: &mut bool) {
    match &mut node.kind {
        NodeKind::Ruleset(rs) => {
            if rs.paths.is_empty() && !rs.selectors.is_empty() {
                rs.paths = rs.selectors.clone();
            }

            let mut new_paths: Vec<Selector> = Vec::new();
            for extend in extends {
                for path in &rs.paths {
                    if path.media_empty {
                        continue;
                    }
                    for synthesized in synthesize(path, extend) {
                        let exists = rs
                            .paths
                            .iter()
                            .chain(new_paths.iter())
                            .any(|p| p.elements == synthesized.elements);
                        if !exists {
                            new_paths.push(synthesized);
                        }
                    }
                }
            }

            if !new_paths.is_empty() {
                *added = true;
                node.visibility.ensure_visibility();
                rs.paths.extend(new_paths);
            }

            for rule in &mut rs.rules {
                apply(rule, extends, added);
            }
        }
        NodeKind::Media(m) => m.body.rules.iter_mut().for_each(|r| apply(r, extends, added)),
        NodeKind::Container(c) => c
            .body
            .rules
            .iter_mut()
            .for_each(|r| apply(r, extends, added)),
        NodeKind::AtRule(a) => a
            .body
            .rules
            .iter_mut()
            .for_each(|r| apply(r, extends, added)),
        _ => {}
    }
}

/// Paths the extend grafts onto a matching `path`, empty when it does not
/// match.
fn synthesize(path: &Selector, extend: &FoundExtend) -> Vec<Selector> {
    let target = &extend.target.elements;
    if target.is_empty() {
        return Vec::new();
    }

    match extend.option {
        ExtendOption::Exact => {
            if !elements_equal(&path.elements, target) {
                return Vec::new();
            }
            extend
                .self_paths
                .iter()
                .map(|self_path| stamp(self_path.clone(), extend))
                .collect()
        }
        ExtendOption::All => {
            let spans = find_spans(&path.elements, target);
            if spans.is_empty() {
                return Vec::new();
            }
            let mut out = Vec::new();
            for self_path in &extend.self_paths {
                let mut elements = Vec::with_capacity(path.elements.len());
                let mut i = 0;
                while i < path.elements.len() {
                    if spans.contains(&i) {
                        let lead_combinator = path.elements[i].combinator.clone();
                        for (j, el) in self_path.elements.iter().enumerate() {
                            let mut el = el.clone();
                            if j == 0 {
                                el.combinator = lead_combinator.clone();
                            }
                            elements.push(el);
                        }
                        i += target.len();
                    } else {
                        elements.push(path.elements[i].clone());
                        i += 1;
                    }
                }
                out.push(stamp(Selector::new(elements), extend));
            }
            out
        }
    }
}

fn stamp(mut selector: Selector, extend: &FoundExtend) -> Selector {
    selector.extend_list.clear();
    if extend.visibility.is_visible() {
        selector.visibility.ensure_visibility();
    } else {
        selector.visibility.copy_from(&extend.visibility);
    }
    selector
}

fn elements_equal(a: &[Element], b: &[Element]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).enumerate().all(|(i, (x, y))| {
            x.value == y.value && (i == 0 || combinator_equal(x, y))
        })
}

fn combinator_equal(a: &Element, b: &Element) -> bool {
    normalize(&a.combinator.value) == normalize(&b.combinator.value)
}

fn normalize(c: &str) -> &str {
    if c.is_empty() {
        " "
    } else {
        c
    }
}

/// Start indices of non-overlapping occurrences of `target` in `elements`.
fn find_spans(elements: &[Element], target: &[Element]) -> Vec<usize> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i + target.len() <= elements.len() {
        let window = &elements[i..i + target.len()];
        let matches = window.iter().zip(target.iter()).enumerate().all(|(j, (x, y))| {
            x.value == y.value && (j == 0 || combinator_equal(x, y))
        });
        if matches {
            spans.push(i);
            i += target.len();
        } else {
            i += 1;
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Combinator;

    fn sel(values: &[&str]) -> Selector {
        Selector::new(
            values
                .iter()
                .map(|v| Element::new(Combinator::none(), *v))
                .collect(),
        )
    }

    fn found(target: Selector, option: ExtendOption, self_path: Selector) -> FoundExtend {
        FoundExtend {
            target,
            option,
            self_paths: vec![self_path],
            visibility: Visibility::default(),
            object_id: 0,
        }
    }

    #[test]
    fn exact_match_replaces_whole_path() {
        let extend = found(sel(&[".a"]), ExtendOption::Exact, sel(&[".b"]));
        let paths = synthesize(&sel(&[".a"]), &extend);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].css_text(), ".b");
    }

    #[test]
    fn exact_match_rejects_longer_paths() {
        let extend = found(sel(&[".a"]), ExtendOption::Exact, sel(&[".b"]));
        let longer = Selector::new(vec![
            Element::new(Combinator::none(), ".a"),
            Element::new(Combinator::descendant(), ".c"),
        ]);
        assert!(synthesize(&longer, &extend).is_empty());
    }

    #[test]
    fn all_match_replaces_inner_span() {
        let extend = found(sel(&[".a"]), ExtendOption::All, sel(&[".b"]));
        let path = Selector::new(vec![
            Element::new(Combinator::none(), ".x"),
            Element::new(Combinator::descendant(), ".a"),
            Element::new(Combinator::descendant(), ".y"),
        ]);
        let paths = synthesize(&path, &extend);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].css_text(), ".x .b .y");
    }

    #[test]
    fn fixpoint_handles_chained_extends() {
        use crate::declaration::Declaration;
        use crate::ruleset::Ruleset;

        // .a { color: red }  .b:extend(.a) {}  .c:extend(.b) {}
        let target_a = Node::from_kind(NodeKind::Selector(Box::new(sel(&[".a"]))));
        let target_b = Node::from_kind(NodeKind::Selector(Box::new(sel(&[".b"]))));

        let mut sel_b = sel(&[".b"]);
        sel_b.extend_list = vec![Node::from_kind(NodeKind::Extend(Box::new(Extend::new(
            target_a,
            ExtendOption::Exact,
        ))))];
        let mut sel_c = sel(&[".c"]);
        sel_c.extend_list = vec![Node::from_kind(NodeKind::Extend(Box::new(Extend::new(
            target_b,
            ExtendOption::Exact,
        ))))];

        let rs_a = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
            vec![sel(&[".a"])],
            vec![Node::from_kind(NodeKind::Declaration(Box::new(
                Declaration::new("color", Node::keyword("red")),
            )))],
        ))));
        let rs_b = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
            vec![sel_b],
            vec![],
        ))));
        let rs_c = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
            vec![sel_c],
            vec![],
        ))));

        let mut root = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::file_root(vec![
            rs_a, rs_b, rs_c,
        ]))));

        process_extends(&mut root);

        let NodeKind::Ruleset(root_rs) = &root.kind else {
            panic!("expected root");
        };
        let NodeKind::Ruleset(a) = &root_rs.rules[0].kind else {
            panic!("expected ruleset");
        };
        let paths: Vec<String> = a.paths.iter().map(Selector::css_text).collect();
        assert!(paths.contains(&".a".to_string()));
        assert!(paths.contains(&".b".to_string()));
        assert!(paths.contains(&".c".to_string()));
    }
}
