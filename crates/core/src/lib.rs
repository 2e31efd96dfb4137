pub mod dom;
pub mod graph;
pub mod layout;
pub mod playground;
pub mod render;
pub mod sandbox;

use graph::Graph;
use sandbox::{ExecutionError, SandboxExecutor, SandboxPolicy};

pub use playground::{Playground, PlaygroundConfig, PlaygroundError, RunOutcome};

/// Render an HTML snippet in a fresh sandbox and extract its graph.
/// This is the one-shot entry point used by the CLI.
pub fn snapshot_graph(html: &str, policy: SandboxPolicy) -> Result<Graph, ExecutionError> {
    let document = SandboxExecutor::new(policy).render(html)?;
    Ok(graph::extract_from(&document))
}
