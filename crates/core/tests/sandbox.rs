//! Sandboxed execution: script effects, failures and policy.

use domplay_core::graph;
use domplay_core::sandbox::{
    error_banner, DocumentHandle, ExecutionError, ExtractionError, Executor, SandboxExecutor,
    SandboxPolicy,
};
use domplay_core::snapshot_graph;
use pretty_assertions::assert_eq;

fn body_names(html: &str) -> Vec<String> {
    let g = snapshot_graph(html, SandboxPolicy::default()).unwrap();
    g.nodes.iter().skip(3).map(|n| n.name.clone()).collect()
}

#[test]
fn test_inner_html_replaces_children() {
    let html = r#"<div id="out">old</div>
    <script>document.getElementById('out').innerHTML = '<b>bold</b> text';</script>"#;
    assert_eq!(
        body_names(html),
        vec!["div", "id=\"out\"", "b", "\"bold\"", "\"text\""]
    );
}

#[test]
fn test_create_and_append_elements() {
    let html = r#"<ul id="list"></ul>
    <script>
        const list = document.getElementById('list');
        const item = document.createElement('li');
        item.textContent = 'Item 1';
        list.appendChild(item);
        item.className = 'first';
    </script>"#;
    assert_eq!(
        body_names(html),
        vec!["ul", "id=\"list\"", "li", "class=\"first\"", "\"Item 1\""]
    );
}

#[test]
fn test_attribute_class_and_style_updates() {
    let html = r#"<p id="p" class="a b" hidden>x</p>
    <script>
        const p = document.querySelector('#p');
        p.classList.remove('a');
        p.classList.add('c');
        p.removeAttribute('hidden');
        p.setAttribute('data-x', '1');
        p.style.fontSize = '2em';
    </script>"#;
    assert_eq!(
        body_names(html),
        vec![
            "p",
            "id=\"p\"",
            "class=\"b c\"",
            "data-x=\"1\"",
            "style=\"font-size: 2em;\"",
            "\"x\""
        ]
    );
}

#[test]
fn test_remove_and_document_title() {
    let html = r#"<head></head><body><p class="gone">bye</p><i>stay</i>
    <script>document.querySelector('p.gone').remove(); document.title = 'Changed';</script></body>"#;
    let g = snapshot_graph(html, SandboxPolicy::default()).unwrap();
    let names: Vec<&str> = g.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Document", "html", "head", "title", "\"Changed\"", "body", "i", "\"stay\""]
    );
}

#[test]
fn test_event_handlers_do_not_run() {
    let html = r#"<p id="p">before</p>
    <script>
        function clicked() {
            document.getElementById('p').textContent = 'after';
        }
        document.getElementById('p').addEventListener('click', () => {
            document.getElementById('p').textContent = 'after';
        });
        console.log('loaded');
    </script>"#;
    assert_eq!(body_names(html), vec!["p", "id=\"p\"", "\"before\""]);
}

#[test]
fn test_thrown_error_aborts_load() {
    let err = SandboxExecutor::default()
        .render("<p>x</p><script>throw new Error('boom')</script>")
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Script(_)));
    assert_eq!(err.to_string(), "Error: boom");
}

#[test]
fn test_null_receiver_is_a_type_error() {
    let err = SandboxExecutor::default()
        .render("<script>document.getElementById('missing').textContent = 'x';</script>")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "TypeError: Cannot set properties of null (setting 'textContent')"
    );
}

#[test]
fn test_cyclic_bindings_resolve_to_null() {
    let err = SandboxExecutor::default()
        .render("<p>x</p><script>var a = b; var b = a; a.textContent = 'x';</script>")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "TypeError: Cannot set properties of null (setting 'textContent')"
    );
}

#[test]
fn test_assignment_operators_inside_strings() {
    let html = r#"<p id="p">old</p><script>
        const p = document.getElementById('p');
        p.textContent += ' = new';
        p.title = 'a += b';
    </script>"#;
    assert_eq!(
        body_names(html),
        vec!["p", "id=\"p\"", "title=\"a += b\"", "\"old = new\""]
    );
}

#[test]
fn test_deeply_nested_source_is_refused() {
    let html = "<div>".repeat(3_000);
    let err = SandboxExecutor::default().render(&html).unwrap_err();
    assert_eq!(err, ExecutionError::TooDeep { depth: 3_002, max: 512 });
}

#[test]
fn test_script_nesting_past_the_limit_is_a_range_error() {
    let policy = SandboxPolicy {
        max_depth: 6,
        ..SandboxPolicy::default()
    };
    let err = SandboxExecutor::new(policy)
        .render(
            "<div id='d'></div><script>document.getElementById('d').innerHTML = '<b><i><u>x</u></i></b>';</script>",
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "RangeError: Maximum DOM depth of 6 exceeded");

    let policy = SandboxPolicy {
        max_depth: 4,
        ..SandboxPolicy::default()
    };
    let html = "<script>
        const a = document.createElement('div');
        const b = document.createElement('div');
        const c = document.createElement('div');
        b.appendChild(c);
        a.appendChild(b);
        document.body.appendChild(a);
    </script>";
    let err = SandboxExecutor::new(policy).render(html).unwrap_err();
    assert!(matches!(err, ExecutionError::Script(_)));
    assert_eq!(err.to_string(), "RangeError: Maximum DOM depth of 4 exceeded");
}

#[test]
fn test_scripts_disabled_by_policy() {
    let policy = SandboxPolicy {
        allow_scripts: false,
        ..SandboxPolicy::default()
    };
    let html = "<p id='p'>a</p><script>throw new Error('never')</script>";
    let g = snapshot_graph(html, policy).unwrap();
    assert_eq!(g.nodes.len(), 6);
}

#[test]
fn test_oversized_source_is_refused() {
    let policy = SandboxPolicy {
        max_source_bytes: 8,
        ..SandboxPolicy::default()
    };
    let err = SandboxExecutor::new(policy).render("<p>too long</p>").unwrap_err();
    assert_eq!(err, ExecutionError::SourceTooLarge { len: 15, max: 8 });
}

#[test]
fn test_denied_introspection_yields_empty_graph() {
    let policy = SandboxPolicy {
        allow_same_origin: false,
        ..SandboxPolicy::default()
    };
    let handle = SandboxExecutor::new(policy).execute("<p>secret</p>").unwrap();
    assert_eq!(handle.snapshot().unwrap_err(), ExtractionError::AccessDenied);
    let g = graph::extract_from(handle.as_ref());
    assert!(g.nodes.is_empty());
    assert!(!g.is_renderable());
}

#[test]
fn test_runs_are_isolated() {
    let executor = SandboxExecutor::default();
    let first = executor
        .execute("<div id='d'></div><script>document.getElementById('d').id = 'changed'</script>")
        .unwrap();
    let second = executor.execute("<div id='d'></div>").unwrap();
    let id_of = |h: &dyn DocumentHandle| {
        let doc = h.snapshot().unwrap();
        doc.body().unwrap().children[0].get_attr("id").map(String::from)
    };
    assert_eq!(id_of(first.as_ref()).as_deref(), Some("changed"));
    assert_eq!(id_of(second.as_ref()).as_deref(), Some("d"));
}

#[test]
fn test_error_banner_escapes_message() {
    assert_eq!(
        error_banner("<oops> & more"),
        "<div style=\"color: #ff5555; padding: 1rem;\"><strong>Error:</strong> &lt;oops&gt; &amp; more</div>"
    );
}
