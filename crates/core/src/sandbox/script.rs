//! Pattern-based script execution.
//!
//! The sandbox does not embed a JavaScript engine. Instead it interprets the
//! top-level statements tutorial snippets use to manipulate the document
//! (`getElementById(..).innerHTML = ..`, `classList.toggle(..)`,
//! `createElement` + `appendChild`, ...) and applies their effects to the
//! parsed tree. Function bodies and control flow are skipped: they only run
//! on user events, which the preview never fires.

use std::collections::HashMap;

use tracing::debug;

use super::selector;
use crate::dom::{self, DomNode, NodeType};

/// Error raised by a script during load, formatted like the browser console.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ScriptError {
    pub kind: &'static str,
    pub message: String,
}

impl ScriptError {
    fn type_error(message: String) -> Self {
        Self {
            kind: "TypeError",
            message,
        }
    }

    fn too_deep(max_depth: usize) -> Self {
        Self {
            kind: "RangeError",
            message: format!("Maximum DOM depth of {max_depth} exceeded"),
        }
    }
}

/// How a statement refers to an element.
#[derive(Debug, Clone, PartialEq)]
enum Receiver {
    ById(String),
    Query(String),
    Body,
    Head,
    DocumentElement,
    Path(Vec<usize>),
    Binding(String),
}

/// Where a receiver currently points.
#[derive(Debug, Clone, PartialEq)]
enum Resolved {
    Attached(Vec<usize>),
    Detached(String),
}

/// Run every inline script of `doc` in document order.
///
/// Returns the number of statements that had an effect on the document.
/// Insertions that would nest the document deeper than `max_depth` raise a
/// `RangeError`.
pub fn run_scripts(doc: &mut DomNode, max_depth: usize) -> Result<usize, ScriptError> {
    let sources = collect_scripts(doc);
    let mut interpreter = Interpreter::new(max_depth);
    let mut applied = 0;
    for source in &sources {
        for statement in split_statements(source) {
            if interpreter.execute(doc, &statement)? {
                applied += 1;
            }
        }
    }
    debug!(scripts = sources.len(), applied, "scripts executed");
    Ok(applied)
}

fn collect_scripts(doc: &DomNode) -> Vec<String> {
    fn walk(node: &DomNode, out: &mut Vec<String>) {
        if node.is_element("script") {
            if let Some(src) = node.get_attr("src") {
                debug!(src, "external script skipped");
                return;
            }
            let is_js = match node.get_attr("type").map(|t| t.trim().to_ascii_lowercase()) {
                None => true,
                Some(t) => matches!(
                    t.as_str(),
                    "" | "text/javascript" | "application/javascript" | "module"
                ),
            };
            if is_js {
                out.push(node.raw_text_content());
            }
            return;
        }
        for child in &node.children {
            walk(child, out);
        }
    }
    let mut out = Vec::new();
    walk(doc, &mut out);
    out
}

/// Split script text into top-level statements.
///
/// Statements end at `;`, at a newline (unless the next line continues a
/// member chain with `.`), or at the closing brace of a top-level block.
/// Strings and comments are respected.
pub fn split_statements(source: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;
    let mut braces = 0i32;
    let mut parens = 0i32;
    let mut pending_break = false;

    let flush = |current: &mut String, statements: &mut Vec<String>| {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            statements.push(trimmed.to_string());
        }
        current.clear();
    };

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        if pending_break && !c.is_whitespace() {
            pending_break = false;
            if c != '.' && !current.trim_end().ends_with(['+', '=', ',', '(']) {
                flush(&mut current, &mut statements);
            }
        }

        match c {
            '/' if chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
                if braces == 0 && parens == 0 {
                    pending_break = true;
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '{' => {
                braces += 1;
                current.push(c);
            }
            '}' => {
                braces -= 1;
                current.push(c);
                if braces <= 0 && parens <= 0 {
                    braces = 0;
                    if chars.peek().is_some_and(|n| *n == ')' || *n == ',') {
                        continue;
                    }
                    pending_break = true;
                }
            }
            '(' => {
                parens += 1;
                current.push(c);
            }
            ')' => {
                parens -= 1;
                current.push(c);
            }
            ';' if braces == 0 && parens <= 0 => flush(&mut current, &mut statements),
            '\n' if braces == 0 && parens <= 0 => pending_break = true,
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut statements);
    statements
}

struct Interpreter {
    bindings: HashMap<String, Receiver>,
    detached: HashMap<String, DomNode>,
    max_depth: usize,
}

impl Interpreter {
    fn new(max_depth: usize) -> Self {
        Self {
            bindings: HashMap::new(),
            detached: HashMap::new(),
            max_depth,
        }
    }

    /// Levels that may still be added below `resolved`.
    fn room_below(&self, resolved: &Resolved) -> usize {
        let depth = match resolved {
            Resolved::Attached(path) => path.len(),
            Resolved::Detached(_) => 0,
        };
        self.max_depth.saturating_sub(depth)
    }

    /// Execute one statement. Returns whether it changed the document.
    fn execute(&mut self, doc: &mut DomNode, statement: &str) -> Result<bool, ScriptError> {
        let stmt = statement.trim().trim_end_matches(';').trim();
        if stmt.is_empty() {
            return Ok(false);
        }

        if let Some(rest) = stmt.strip_prefix("throw ") {
            return Err(parse_throw(rest.trim()));
        }

        let first_word = stmt
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .next()
            .unwrap_or("");
        if matches!(
            first_word,
            "function" | "async" | "class" | "if" | "for" | "while" | "do" | "switch" | "try"
                | "return"
        ) {
            debug!(statement = stmt, "control flow or declaration skipped");
            return Ok(false);
        }

        if let Some((name, expr)) = parse_declaration(stmt) {
            return Ok(self.declare(name, expr));
        }

        if let Some(rest) = stmt.strip_prefix("document.title") {
            if let Some(value) = rest.trim().strip_prefix('=').and_then(parse_value) {
                set_document_title(doc, &value);
                return Ok(true);
            }
        }

        let Some((receiver, rest)) = parse_receiver(stmt) else {
            debug!(statement = stmt, "unrecognized statement ignored");
            return Ok(false);
        };
        self.apply(doc, &receiver, rest.trim(), stmt)
    }

    fn declare(&mut self, name: &str, expr: &str) -> bool {
        if let Some(tag) = call_argument(expr, "document.createElement") {
            self.detached
                .insert(name.to_string(), DomNode::new_element(&tag.to_ascii_lowercase()));
            self.bindings
                .insert(name.to_string(), Receiver::Binding(name.to_string()));
            return false;
        }
        if let Some(text) = call_argument(expr, "document.createTextNode") {
            self.detached.insert(name.to_string(), DomNode::new_text(&text));
            self.bindings
                .insert(name.to_string(), Receiver::Binding(name.to_string()));
            return false;
        }
        match parse_receiver(expr) {
            Some((receiver, rest)) if rest.trim().is_empty() => {
                self.bindings.insert(name.to_string(), receiver);
            }
            _ => debug!(name, expr, "declaration ignored"),
        }
        false
    }

    fn resolve(&self, doc: &DomNode, receiver: &Receiver) -> Option<Resolved> {
        // Follow alias chains (`var a = b`) until a concrete receiver; a
        // cycle resolves to null.
        let mut receiver = receiver;
        let mut seen: Vec<&str> = Vec::new();
        while let Receiver::Binding(name) = receiver {
            if self.detached.contains_key(name) {
                return Some(Resolved::Detached(name.clone()));
            }
            if seen.contains(&name.as_str()) {
                debug!(name = name.as_str(), "cyclic binding resolves to null");
                return None;
            }
            seen.push(name.as_str());
            receiver = self.bindings.get(name)?;
        }

        let path = match receiver {
            Receiver::ById(id) => doc.find_path(&|n: &DomNode, _: &[&DomNode]| {
                n.node_type == NodeType::Element && n.get_attr("id") == Some(id.as_str())
            }),
            Receiver::Query(sel) => {
                selector::query_first(doc, &selector::parse_selector_list(sel))
            }
            Receiver::Body => child_path(doc, &["html", "body"]),
            Receiver::Head => child_path(doc, &["html", "head"]),
            Receiver::DocumentElement => child_path(doc, &["html"]),
            Receiver::Path(path) => doc.node_at(path).map(|_| path.clone()),
            Receiver::Binding(_) => None,
        };
        path.map(Resolved::Attached)
    }

    fn node_mut<'a>(
        doc: &'a mut DomNode,
        detached: &'a mut HashMap<String, DomNode>,
        resolved: &Resolved,
    ) -> Option<&'a mut DomNode> {
        match resolved {
            Resolved::Attached(path) => doc.node_at_mut(path),
            Resolved::Detached(name) => detached.get_mut(name),
        }
    }

    fn apply(
        &mut self,
        doc: &mut DomNode,
        receiver: &Receiver,
        rest: &str,
        stmt: &str,
    ) -> Result<bool, ScriptError> {
        let member = rest
            .trim_start_matches('.')
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .next()
            .unwrap_or("")
            .to_string();
        if member.is_empty() {
            debug!(statement = stmt, "bare expression ignored");
            return Ok(false);
        }

        if let Receiver::Binding(name) = receiver {
            if !self.bindings.contains_key(name) {
                debug!(statement = stmt, name = name.as_str(), "undeclared receiver ignored");
                return Ok(false);
            }
        }

        let Some(resolved) = self.resolve(doc, receiver) else {
            let verb = if is_assignment(rest) { "set" } else { "read" };
            let gerund = if verb == "set" { "setting" } else { "reading" };
            return Err(ScriptError::type_error(format!(
                "Cannot {verb} properties of null ({gerund} '{member}')"
            )));
        };

        // Calls that move nodes between the detached pool and the document.
        if let Some(arg) =
            call_argument_raw(rest, ".appendChild").or_else(|| call_argument_raw(rest, ".append"))
        {
            return self.append(doc, &resolved, &arg);
        }
        if rest == ".remove()" {
            return Ok(match resolved {
                Resolved::Attached(path) => doc.remove_at(&path).is_some(),
                Resolved::Detached(name) => self.detached.remove(&name).is_some(),
            });
        }

        let room = self.room_below(&resolved);
        let max_depth = self.max_depth;
        let Some(node) = Self::node_mut(doc, &mut self.detached, &resolved) else {
            return Ok(false);
        };
        apply_member(node, rest, stmt, room).ok_or_else(|| ScriptError::too_deep(max_depth))
    }

    fn append(
        &mut self,
        doc: &mut DomNode,
        parent: &Resolved,
        arg: &str,
    ) -> Result<bool, ScriptError> {
        let child = if let Some(text) = parse_value(arg) {
            DomNode::new_text(&text)
        } else if let Some(node) = self.detached.remove(arg.trim()) {
            node
        } else {
            debug!(arg, "append argument not resolvable");
            return Ok(false);
        };
        if child.depth() + 1 > self.room_below(parent) {
            return Err(ScriptError::too_deep(self.max_depth));
        }

        let Some(parent_node) = Self::node_mut(doc, &mut self.detached, parent) else {
            return Ok(false);
        };
        parent_node.children.push(child);
        let index = parent_node.children.len() - 1;

        if let Resolved::Attached(path) = parent {
            let name = arg.trim();
            if self.bindings.contains_key(name) {
                let mut child_path = path.clone();
                child_path.push(index);
                self.bindings
                    .insert(name.to_string(), Receiver::Path(child_path));
            }
        }
        Ok(true)
    }
}

/// Apply a property assignment or method call to a resolved node that has
/// `room` levels left below it. Returns whether the node changed, or `None`
/// when new markup would nest deeper than that.
fn apply_member(node: &mut DomNode, rest: &str, stmt: &str, room: usize) -> Option<bool> {
    if let Some((prop, op, value)) = parse_assignment(rest) {
        let append = op == "+=";
        match prop {
            "innerHTML" => {
                let markup = if append {
                    format!("{}{}", serialize_children(node), value)
                } else {
                    value
                };
                let children = dom::parse_fragment(&markup);
                if children.iter().any(|c| c.depth() + 1 > room) {
                    return None;
                }
                node.children = children;
            }
            "textContent" | "innerText" => {
                let text = if append {
                    format!("{}{}", node.raw_text_content(), value)
                } else {
                    value
                };
                node.set_text_content(&text);
            }
            "id" => node.set_attr("id", &value),
            "className" => node.set_attr("class", &value),
            "value" | "href" | "src" | "title" | "alt" | "type" | "name" => {
                node.set_attr(prop, &value)
            }
            _ => match prop.strip_prefix("style.") {
                Some(style_prop) => set_style_property(node, style_prop, &value),
                None => {
                    debug!(statement = stmt, prop, "unsupported property ignored");
                    return Some(false);
                }
            },
        }
        return Some(true);
    }

    if let Some(args) = call_arguments(rest, ".setAttribute") {
        if let [name, value] = args.as_slice() {
            node.set_attr(name, value);
            return Some(true);
        }
    }
    if let Some(name) = call_argument(rest, ".removeAttribute") {
        return Some(node.remove_attr(&name).is_some());
    }
    for method in ["add", "remove", "toggle"] {
        if let Some(classes) = call_arguments(rest, &format!(".classList.{method}")) {
            for class in &classes {
                update_class(node, class, method);
            }
            return Some(!classes.is_empty());
        }
    }

    debug!(statement = stmt, "unsupported member ignored");
    Some(false)
}

fn update_class(node: &mut DomNode, class: &str, method: &str) {
    let mut classes: Vec<String> = node.classes().into_iter().map(String::from).collect();
    let present = classes.iter().any(|c| c == class);
    match (method, present) {
        ("add", false) | ("toggle", false) => classes.push(class.to_string()),
        ("remove", true) | ("toggle", true) => classes.retain(|c| c != class),
        _ => return,
    }
    node.set_attr("class", &classes.join(" "));
}

/// Set one declaration of the inline `style` attribute (camelCase → kebab-case).
fn set_style_property(node: &mut DomNode, prop: &str, value: &str) {
    let mut css_prop = String::new();
    for c in prop.chars() {
        if c.is_ascii_uppercase() {
            css_prop.push('-');
            css_prop.push(c.to_ascii_lowercase());
        } else {
            css_prop.push(c);
        }
    }

    let mut declarations: Vec<(String, String)> = node
        .get_attr("style")
        .unwrap_or("")
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .filter(|(k, _)| !k.is_empty())
        .collect();

    declarations.retain(|(k, _)| *k != css_prop);
    if !value.is_empty() {
        declarations.push((css_prop, value.to_string()));
    }

    if declarations.is_empty() {
        node.remove_attr("style");
    } else {
        let style = declarations
            .iter()
            .map(|(k, v)| format!("{k}: {v};"))
            .collect::<Vec<_>>()
            .join(" ");
        node.set_attr("style", &style);
    }
}

fn set_document_title(doc: &mut DomNode, title: &str) {
    let Some(head_path) = child_path(doc, &["html", "head"]) else {
        return;
    };
    let Some(head) = doc.node_at_mut(&head_path) else {
        return;
    };
    match head.children.iter_mut().find(|c| c.is_element("title")) {
        Some(existing) => existing.set_text_content(title),
        None => {
            let mut node = DomNode::new_element("title");
            node.set_text_content(title);
            head.children.push(node);
        }
    }
}

/// Serialize children back to markup for `innerHTML +=`.
fn serialize_children(node: &DomNode) -> String {
    let mut out = String::new();
    for child in &node.children {
        serialize_node(child, &mut out);
    }
    out
}

fn serialize_node(node: &DomNode, out: &mut String) {
    match node.node_type {
        NodeType::Text => out.push_str(&escape_text(&node.text)),
        NodeType::Element => {
            out.push('<');
            out.push_str(&node.tag);
            for (name, value) in &node.attributes {
                out.push_str(&format!(" {}=\"{}\"", name, value.replace('"', "&quot;")));
            }
            out.push('>');
            for child in &node.children {
                serialize_node(child, out);
            }
            if !is_void_element(&node.tag) {
                out.push_str(&format!("</{}>", node.tag));
            }
        }
        NodeType::Document | NodeType::Other => {}
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "source" | "track" | "wbr"
    )
}

fn child_path(doc: &DomNode, tags: &[&str]) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    let mut node = doc;
    for tag in tags {
        let idx = node.children.iter().position(|c| c.is_element(tag))?;
        path.push(idx);
        node = &node.children[idx];
    }
    Some(path)
}

// ---------------------------------------------------------------------------
// Expression parsing
// ---------------------------------------------------------------------------

/// Parse the element expression at the start of `s`, returning the rest.
fn parse_receiver(s: &str) -> Option<(Receiver, &str)> {
    let s = s.trim();
    for (prefix, make) in [
        ("document.getElementById", Receiver::ById as fn(String) -> Receiver),
        ("document.querySelector", Receiver::Query as fn(String) -> Receiver),
    ] {
        if let Some(after) = s.strip_prefix(prefix) {
            if after.starts_with("All") {
                return None;
            }
            let (args, rest) = split_call(after)?;
            let arg = parse_value(args)?;
            return Some((make(arg), rest));
        }
    }
    for (prefix, receiver) in [
        ("document.body", Receiver::Body),
        ("document.head", Receiver::Head),
        ("document.documentElement", Receiver::DocumentElement),
    ] {
        if let Some(rest) = s.strip_prefix(prefix) {
            if rest.is_empty() || rest.starts_with(['.', ' ', '=']) {
                return Some((receiver, rest));
            }
        }
    }

    let ident_len = s
        .find(|c: char| !c.is_alphanumeric() && c != '_' && c != '$')
        .unwrap_or(s.len());
    let ident = &s[..ident_len];
    if ident.is_empty() || ident == "document" || ident.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some((Receiver::Binding(ident.to_string()), &s[ident_len..]))
}

/// `(const|let|var) name = expr`
fn parse_declaration(stmt: &str) -> Option<(&str, &str)> {
    let rest = ["const ", "let ", "var "]
        .iter()
        .find_map(|kw| stmt.strip_prefix(kw))?;
    let (name, expr) = rest.split_once('=')?;
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        return None;
    }
    Some((name, expr.trim()))
}

/// `.prop = value` / `.style.color = value` / `.prop += value`
fn parse_assignment(rest: &str) -> Option<(&str, &'static str, String)> {
    let rest = rest.strip_prefix('.')?;
    let (lhs, op, rhs) = split_assignment(rest)?;
    let lhs = lhs.trim();
    if !lhs.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return None;
    }
    Some((lhs, op, parse_value(rhs)?))
}

/// Split at the first `=` or `+=` outside string literals. Comparisons
/// (`==`, `===`, `!=`, `<=`, `>=`) are not assignments.
fn split_assignment(s: &str) -> Option<(&str, &'static str, &str)> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev: Option<char> = None;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '=' => {
                let rhs = &s[i + 1..];
                if rhs.starts_with('=') || matches!(prev, Some('!' | '<' | '>' | '=')) {
                    return None;
                }
                return Some(if prev == Some('+') {
                    (&s[..i - 1], "+=", rhs)
                } else {
                    (&s[..i], "=", rhs)
                });
            }
            _ => {}
        }
        prev = Some(c);
    }
    None
}

fn is_assignment(rest: &str) -> bool {
    split_assignment(rest).is_some()
}

fn parse_throw(expr: &str) -> ScriptError {
    for kind in ["Error", "TypeError", "RangeError", "ReferenceError", "SyntaxError"] {
        if let Some(message) = call_argument(expr, &format!("new {kind}")) {
            return ScriptError { kind, message };
        }
    }
    ScriptError {
        kind: "Uncaught",
        message: parse_value(expr).unwrap_or_else(|| expr.to_string()),
    }
}

/// Split `(args)rest` at the matching parenthesis.
fn split_call(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if !s.starts_with('(') {
        return None;
    }
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&s[1..i], &s[i + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

/// Raw argument text of `<name>(...)` when the whole expression is that call.
fn call_argument_raw(expr: &str, name: &str) -> Option<String> {
    let after = expr.trim().strip_prefix(name)?;
    let (args, rest) = split_call(after)?;
    if !rest.trim().is_empty() {
        return None;
    }
    Some(args.trim().to_string())
}

/// Single string argument of `<name>(...)`.
fn call_argument(expr: &str, name: &str) -> Option<String> {
    let raw = call_argument_raw(expr, name)?;
    parse_value(&raw).or_else(|| {
        // Bare identifiers are passed through (appendChild(item)).
        raw.chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
            .then_some(raw)
            .filter(|r| !r.is_empty())
    })
}

/// Comma-separated string arguments of `<name>(...)`.
fn call_arguments(expr: &str, name: &str) -> Option<Vec<String>> {
    let raw = call_argument_raw(expr, name)?;
    split_top_level(&raw, ',')
        .into_iter()
        .map(|arg| parse_value(&arg))
        .collect()
}

fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in s.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c == sep {
            parts.push(std::mem::take(&mut current));
            continue;
        }
        if matches!(c, '\'' | '"' | '`') {
            quote = Some(c);
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Evaluate a string expression: literals (quoted or numeric) joined by `+`.
pub fn parse_value(expr: &str) -> Option<String> {
    let parts = split_top_level(expr.trim(), '+');
    if parts.is_empty() {
        return None;
    }
    let mut out = String::new();
    for part in parts {
        out.push_str(&parse_literal(part.trim())?);
    }
    Some(out)
}

fn parse_literal(s: &str) -> Option<String> {
    let mut chars = s.chars();
    let quote = chars.next()?;
    if !matches!(quote, '\'' | '"' | '`') {
        return s
            .parse::<f64>()
            .ok()
            .filter(|_| !s.is_empty())
            .map(|_| s.to_string());
    }
    let mut out = String::new();
    let mut escaped = false;
    let mut closed = false;
    for c in chars.by_ref() {
        if escaped {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            closed = true;
            break;
        } else {
            out.push(c);
        }
    }
    let interpolated = quote == '`' && out.contains("${");
    if !closed || !chars.as_str().trim().is_empty() || interpolated {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_semicolons_newlines_and_blocks() {
        let src = r#"
            const a = document.getElementById('x');
            a.textContent = 'hi'
            function later() {
                a.textContent = 'nope';
            }
            document.getElementById('y')
                .innerHTML = '<b>y</b>'
        "#;
        let statements = split_statements(src);
        assert_eq!(statements.len(), 4);
        assert!(statements[2].starts_with("function later()"));
        assert!(statements[3].contains(".innerHTML"));
    }

    #[test]
    fn comments_and_strings_do_not_split() {
        let src = "// comment; here\nx.textContent = 'a; b' /* c; d */";
        assert_eq!(split_statements(src), vec!["x.textContent = 'a; b'"]);
    }

    #[test]
    fn parses_string_expressions() {
        assert_eq!(parse_value("'a' + \"b\" + `c`").as_deref(), Some("abc"));
        assert_eq!(parse_value("'it\\'s'").as_deref(), Some("it's"));
        assert_eq!(parse_value("42").as_deref(), Some("42"));
        assert_eq!(parse_value("name"), None);
        assert_eq!(parse_value("`hi ${name}`"), None);
    }

    #[test]
    fn assignment_operator_is_found_outside_strings() {
        assert_eq!(
            split_assignment("textContent = 'a += b'"),
            Some(("textContent ", "=", " 'a += b'"))
        );
        assert_eq!(
            split_assignment("title += \"x = y\""),
            Some(("title ", "+=", " \"x = y\""))
        );
        assert_eq!(split_assignment("value === 'a'"), None);
        assert_eq!(split_assignment("remove()"), None);
    }

    #[test]
    fn throw_produces_console_style_error() {
        let err = parse_throw("new Error('boom')");
        assert_eq!(err.to_string(), "Error: boom");
    }

    #[test]
    fn style_properties_convert_to_kebab_case() {
        let mut node = DomNode::new_element("p");
        node.set_attr("style", "color: red;");
        set_style_property(&mut node, "backgroundColor", "blue");
        set_style_property(&mut node, "color", "green");
        assert_eq!(
            node.get_attr("style"),
            Some("background-color: blue; color: green;")
        );
    }
}
