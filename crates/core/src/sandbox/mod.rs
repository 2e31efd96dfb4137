//! Isolated execution of user snippets.
//!
//! Every run parses the source into a brand-new document and executes its
//! inline scripts against that document only. Nothing is shared between
//! runs or with the host. Hosts that own a real browser context plug in
//! their own [`Executor`].

pub mod script;
pub mod selector;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom::{self, DomNode};

/// Capability policy of the sandbox, mirroring the iframe `sandbox` tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxPolicy {
    /// `allow-scripts`: run inline scripts while loading.
    pub allow_scripts: bool,
    /// `allow-same-origin`: let the host introspect the rendered document.
    pub allow_same_origin: bool,
    /// Sources larger than this are refused before parsing.
    pub max_source_bytes: usize,
    /// Deepest element nesting a rendered document may reach.
    pub max_depth: usize,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            allow_scripts: true,
            allow_same_origin: true,
            max_source_bytes: 1024 * 1024,
            max_depth: 512,
        }
    }
}

/// The rendered document could not be produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("source is {len} bytes, sandbox limit is {max}")]
    SourceTooLarge { len: usize, max: usize },
    #[error("document nesting depth {depth} exceeds sandbox limit {max}")]
    TooDeep { depth: usize, max: usize },
    #[error("{0}")]
    Script(#[from] script::ScriptError),
    #[error("sandbox unavailable: {0}")]
    Unavailable(String),
}

/// The rendered document exists but cannot be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("sandbox denies introspection of the rendered document")]
    AccessDenied,
    #[error("no rendered document is loaded")]
    NotLoaded,
}

/// A live, queryable rendered document scoped to one sandbox run.
pub trait DocumentHandle: Send {
    /// Read access to the document tree.
    fn snapshot(&self) -> Result<&DomNode, ExtractionError>;
}

/// Turns source text into a rendered document.
pub trait Executor: Send {
    fn execute(&self, source: &str) -> Result<Box<dyn DocumentHandle>, ExecutionError>;
}

/// Document produced by [`SandboxExecutor`].
#[derive(Debug, Clone)]
pub struct SandboxDocument {
    root: DomNode,
    introspectable: bool,
}

impl SandboxDocument {
    /// Wrap an already rendered tree, e.g. one mirrored from a host browser.
    pub fn new(root: DomNode, introspectable: bool) -> Self {
        Self {
            root,
            introspectable,
        }
    }
}

impl DocumentHandle for SandboxDocument {
    fn snapshot(&self) -> Result<&DomNode, ExtractionError> {
        if self.introspectable {
            Ok(&self.root)
        } else {
            Err(ExtractionError::AccessDenied)
        }
    }
}

/// In-process sandbox: html5ever parsing plus pattern-based script execution.
#[derive(Debug, Clone, Default)]
pub struct SandboxExecutor {
    policy: SandboxPolicy,
}

impl SandboxExecutor {
    pub fn new(policy: SandboxPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    /// Render `source` into a concrete document.
    pub fn render(&self, source: &str) -> Result<SandboxDocument, ExecutionError> {
        if source.len() > self.policy.max_source_bytes {
            return Err(ExecutionError::SourceTooLarge {
                len: source.len(),
                max: self.policy.max_source_bytes,
            });
        }

        let mut root = dom::parse_html(source);
        self.check_depth(&root)?;
        if self.policy.allow_scripts {
            script::run_scripts(&mut root, self.policy.max_depth)?;
            self.check_depth(&root)?;
        } else {
            debug!("scripts disabled by sandbox policy");
        }

        Ok(SandboxDocument::new(root, self.policy.allow_same_origin))
    }

    fn check_depth(&self, root: &DomNode) -> Result<(), ExecutionError> {
        let depth = root.depth();
        if depth > self.policy.max_depth {
            return Err(ExecutionError::TooDeep {
                depth,
                max: self.policy.max_depth,
            });
        }
        Ok(())
    }
}

impl Executor for SandboxExecutor {
    fn execute(&self, source: &str) -> Result<Box<dyn DocumentHandle>, ExecutionError> {
        Ok(Box::new(self.render(source)?))
    }
}

/// Inline markup shown in place of the preview when execution fails.
pub fn error_banner(message: &str) -> String {
    format!(
        "<div style=\"color: #ff5555; padding: 1rem;\"><strong>Error:</strong> {}</div>",
        escape_html(message)
    )
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
