//! Minimal selector engine backing `document.querySelector` in snippets.
//! Supports: tag, .class, #id, [attr], [attr=value], *, compound selectors,
//! descendant and child combinators, and comma-separated lists.
//! Pseudo-classes are not supported and make the selector match nothing.

use crate::dom::{DomNode, NodeType};

/// A single selector (one part of a comma-separated list).
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub parts: Vec<SelectorPart>,
}

/// A component of a selector chain.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorPart {
    Tag(String),
    Class(String),
    Id(String),
    Attribute(String, Option<String>),
    Universal,
    Descendant,
    Child,
}

/// Parse a comma-separated selector list. Invalid members are dropped.
pub fn parse_selector_list(input: &str) -> Vec<Selector> {
    input
        .split(',')
        .filter_map(|s| parse_selector(s.trim()))
        .collect()
}

/// Parse a single selector string.
pub fn parse_selector(input: &str) -> Option<Selector> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            '.' | '#' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                let ident = read_ident(&mut chars);
                if ident.is_empty() {
                    return None;
                }
                parts.push(if ch == '.' {
                    SelectorPart::Class(ident)
                } else {
                    SelectorPart::Id(ident)
                });
            }
            '[' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                let mut attr = String::new();
                let mut value = None;
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some('=') => {
                            let mut val = String::new();
                            let quote = chars.peek().copied().filter(|q| *q == '"' || *q == '\'');
                            if quote.is_some() {
                                chars.next();
                            }
                            while let Some(&vc) = chars.peek() {
                                if Some(vc) == quote {
                                    chars.next();
                                    break;
                                }
                                if quote.is_none() && vc == ']' {
                                    break;
                                }
                                val.push(vc);
                                chars.next();
                            }
                            value = Some(val);
                        }
                        Some(c) => attr.push(c),
                        None => return None,
                    }
                }
                parts.push(SelectorPart::Attribute(attr.trim().to_string(), value));
            }
            ':' => return None,
            '>' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                skip_whitespace(&mut chars);
                parts.push(SelectorPart::Child);
            }
            ' ' | '\t' | '\n' | '\r' => {
                flush_tag(&mut current, &mut parts);
                skip_whitespace(&mut chars);
                if let Some(&next) = chars.peek() {
                    if next != '>' {
                        parts.push(SelectorPart::Descendant);
                    }
                }
            }
            '*' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                parts.push(SelectorPart::Universal);
            }
            _ => {
                current.push(ch);
                chars.next();
            }
        }
    }

    flush_tag(&mut current, &mut parts);

    let dangling = matches!(
        parts.first().zip(parts.last()),
        Some((SelectorPart::Child | SelectorPart::Descendant, _))
            | Some((_, SelectorPart::Child | SelectorPart::Descendant))
    );
    if parts.is_empty() || dangling {
        None
    } else {
        Some(Selector { parts })
    }
}

fn flush_tag(current: &mut String, parts: &mut Vec<SelectorPart>) {
    let tag = current.trim();
    if !tag.is_empty() {
        parts.push(SelectorPart::Tag(tag.to_lowercase()));
    }
    current.clear();
}

fn read_ident(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

/// Check if a selector matches an element, given its ancestry
/// (`ancestors` runs from the document root to the parent).
pub fn matches_element(selector: &Selector, node: &DomNode, ancestors: &[&DomNode]) -> bool {
    if node.node_type != NodeType::Element {
        return false;
    }

    // Split into compound segments; each carries the combinator that
    // links it to the segment on its right.
    let mut segments: Vec<(Vec<&SelectorPart>, Option<&SelectorPart>)> = Vec::new();
    let mut current: Vec<&SelectorPart> = Vec::new();
    for part in &selector.parts {
        match part {
            SelectorPart::Descendant | SelectorPart::Child => {
                if !current.is_empty() {
                    segments.push((std::mem::take(&mut current), Some(part)));
                }
            }
            _ => current.push(part),
        }
    }
    if current.is_empty() {
        return false;
    }

    if !segment_matches(&current, node) {
        return false;
    }

    // Walk ancestors right to left for the remaining segments.
    let mut anc_idx = ancestors.len();
    for (segment, combinator) in segments.iter().rev() {
        let is_child = matches!(combinator, Some(SelectorPart::Child));
        let mut found = false;
        while anc_idx > 0 {
            anc_idx -= 1;
            let ancestor = ancestors[anc_idx];
            if ancestor.node_type == NodeType::Element && segment_matches(segment, ancestor) {
                found = true;
                break;
            }
            if is_child {
                return false;
            }
        }
        if !found {
            return false;
        }
    }
    true
}

fn segment_matches(segment: &[&SelectorPart], node: &DomNode) -> bool {
    segment.iter().all(|part| match part {
        SelectorPart::Tag(t) => *t == node.tag,
        SelectorPart::Class(c) => node.classes().contains(&c.as_str()),
        SelectorPart::Id(i) => node.get_attr("id") == Some(i.as_str()),
        SelectorPart::Attribute(name, expected) => match (node.get_attr(name), expected) {
            (Some(actual), Some(val)) => actual == val,
            (Some(_), None) => true,
            (None, _) => false,
        },
        SelectorPart::Universal | SelectorPart::Descendant | SelectorPart::Child => true,
    })
}

/// Child-index path of the first element in document order that matches
/// any selector in `selectors`.
pub fn query_first(root: &DomNode, selectors: &[Selector]) -> Option<Vec<usize>> {
    if selectors.is_empty() {
        return None;
    }
    root.find_path(&|node: &DomNode, ancestors: &[&DomNode]| {
        selectors.iter().any(|s| matches_element(s, node, ancestors))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn first_tag(html: &str, selector: &str) -> Option<String> {
        let doc = parse_html(html);
        let path = query_first(&doc, &parse_selector_list(selector))?;
        doc.node_at(&path).map(|n| n.tag.clone())
    }

    #[test]
    fn parses_compound_and_combinators() {
        let sel = parse_selector("ul#menu > li.item").unwrap();
        assert_eq!(
            sel.parts,
            vec![
                SelectorPart::Tag("ul".into()),
                SelectorPart::Id("menu".into()),
                SelectorPart::Child,
                SelectorPart::Tag("li".into()),
                SelectorPart::Class("item".into()),
            ]
        );
    }

    #[test]
    fn pseudo_classes_are_rejected() {
        assert!(parse_selector("li:first-child").is_none());
        assert!(parse_selector("> li").is_none());
    }

    #[test]
    fn finds_first_match_in_document_order() {
        let html = r#"<body><div class="a"><span>x</span></div><p class="a">y</p></body>"#;
        assert_eq!(first_tag(html, ".a").as_deref(), Some("div"));
        assert_eq!(first_tag(html, "p.a").as_deref(), Some("p"));
        assert_eq!(first_tag(html, "div span").as_deref(), Some("span"));
        assert_eq!(first_tag(html, "body > span"), None);
    }

    #[test]
    fn attribute_selectors() {
        let html = r#"<body><input type="text"><input type="checkbox" checked></body>"#;
        let doc = parse_html(html);
        let path = query_first(&doc, &parse_selector_list("[type='checkbox']")).unwrap();
        assert_eq!(doc.node_at(&path).unwrap().get_attr("checked"), Some(""));
        assert!(query_first(&doc, &parse_selector_list("[disabled]")).is_none());
    }
}
