//! Per-editor orchestration: run, extract, lay out, render.
//!
//! A [`Playground`] is the single registry of editor instances. Each
//! [`Instance`] exclusively owns its source, rendered document, simulation
//! and visualization surface, so instances never share state.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::graph::{self, Graph};
use crate::layout::{Canvas, ForceConfig, Simulation};
use crate::render::{self, NodeRadii, Scene, VisualSurface};
use crate::sandbox::{
    error_banner, DocumentHandle, ExecutionError, ExtractionError, Executor, SandboxExecutor,
    SandboxPolicy,
};

/// Configuration for a playground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    pub policy: SandboxPolicy,
    pub forces: ForceConfig,
    pub radii: NodeRadii,
    /// Smallest canvas a simulation is laid out on.
    pub min_canvas: Canvas,
    /// Surface size of instances the host has not measured yet.
    pub default_surface: Canvas,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            policy: SandboxPolicy::default(),
            forces: ForceConfig::default(),
            radii: NodeRadii::default(),
            min_canvas: Canvas::new(400.0, 300.0),
            default_surface: Canvas::new(0.0, 0.0),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlaygroundConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaygroundError {
    #[error("unknown instance: {0}")]
    UnknownInstance(String),
    #[error("instance already registered: {0}")]
    DuplicateInstance(String),
    #[error("instance {instance} has no node {node}")]
    UnknownNode { instance: String, node: usize },
}

/// Where an instance is in its run cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Executing,
    Hidden,
    Extracting,
    Rendering,
}

/// What the preview surface currently shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Preview {
    /// Never run.
    Blank,
    Loading { generation: u64 },
    /// The rendered document of `generation` is loaded.
    Ready { generation: u64 },
    /// The inline error banner replaces the preview.
    Failed {
        generation: u64,
        message: String,
        banner: String,
    },
}

/// Result of a run or a toggle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A newer run started first; the result was discarded.
    Stale,
    ExecutionFailed { message: String },
    Rendered { nodes: usize, edges: usize },
    /// Nothing beyond the document root was extracted.
    NothingToShow,
    /// The tree view is toggled off; no extraction was done.
    Hidden,
    /// A run is in flight; its completion extracts and renders.
    Pending,
}

/// Identifies one execution of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTicket {
    pub instance: String,
    pub generation: u64,
}

/// One editor instance.
pub struct Instance {
    source: String,
    generation: u64,
    state: RunState,
    tree_visible: bool,
    preview: Preview,
    document: Option<Box<dyn DocumentHandle>>,
    simulation: Option<Simulation>,
    surface: VisualSurface,
    /// Measured box of the visualization surface, as reported by the host.
    surface_size: Canvas,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("tree_visible", &self.tree_visible)
            .field("preview", &self.preview)
            .field("loaded", &self.document.is_some())
            .field("surface_size", &self.surface_size)
            .finish()
    }
}

impl Instance {
    fn new(source: String, tree_visible: bool, surface_size: Canvas) -> Self {
        Self {
            source,
            generation: 0,
            state: RunState::Idle,
            tree_visible,
            preview: Preview::Blank,
            document: None,
            simulation: None,
            surface: VisualSurface::new(),
            surface_size,
        }
    }

    fn transition(&mut self, state: RunState) {
        debug!(from = ?self.state, to = ?state, generation = self.generation, "run state");
        self.state = state;
    }

    fn stop_simulation(&mut self) {
        if let Some(sim) = &mut self.simulation {
            sim.stop();
        }
    }

    fn teardown(&mut self) {
        self.stop_simulation();
        self.simulation = None;
        self.surface.clear();
        self.document = None;
    }

    fn canvas(&self, min: Canvas) -> Canvas {
        Canvas::floored(self.surface_size.width, self.surface_size.height, min)
    }

    /// Extract from the loaded document and draw the result.
    fn show_tree(&mut self, config: &PlaygroundConfig) -> RunOutcome {
        self.transition(RunState::Extracting);
        let graph = match &self.document {
            Some(doc) => graph::extract_from(doc.as_ref()),
            None => {
                warn!(error = %ExtractionError::NotLoaded, "nothing to extract");
                Graph::empty()
            }
        };
        debug!(nodes = graph.nodes.len(), edges = graph.edges.len(), "extracted graph");

        self.transition(RunState::Rendering);
        self.stop_simulation();
        self.surface.clear();
        let outcome = if graph.is_renderable() {
            let (nodes, edges) = (graph.nodes.len(), graph.edges.len());
            let canvas = self.canvas(config.min_canvas);
            let sim = Simulation::new(graph, config.forces.clone(), canvas);
            self.surface.render(&sim, &config.radii);
            self.simulation = Some(sim);
            RunOutcome::Rendered { nodes, edges }
        } else {
            self.simulation = None;
            RunOutcome::NothingToShow
        };
        self.transition(RunState::Idle);
        outcome
    }
}

/// Registry of editor instances sharing one executor and configuration.
pub struct Playground<E: Executor = SandboxExecutor> {
    executor: E,
    config: PlaygroundConfig,
    instances: BTreeMap<String, Instance>,
}

impl Playground<SandboxExecutor> {
    /// Playground backed by the in-process sandbox.
    pub fn new(config: PlaygroundConfig) -> Self {
        let executor = SandboxExecutor::new(config.policy.clone());
        Self::with_executor(executor, config)
    }
}

impl Default for Playground<SandboxExecutor> {
    fn default() -> Self {
        Self::new(PlaygroundConfig::default())
    }
}

impl<E: Executor> Playground<E> {
    pub fn with_executor(executor: E, config: PlaygroundConfig) -> Self {
        Self {
            executor,
            config,
            instances: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &PlaygroundConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Register an instance with the tree view on.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), PlaygroundError> {
        self.register_with_toggle(id, source, true)
    }

    pub fn register_with_toggle(
        &mut self,
        id: impl Into<String>,
        source: impl Into<String>,
        tree_visible: bool,
    ) -> Result<(), PlaygroundError> {
        let id = id.into();
        if self.instances.contains_key(&id) {
            return Err(PlaygroundError::DuplicateInstance(id));
        }
        debug!(instance = %id, tree_visible, "registered instance");
        let instance = Instance::new(source.into(), tree_visible, self.config.default_surface);
        self.instances.insert(id, instance);
        Ok(())
    }

    /// Replace the editor text. Takes effect on the next run.
    pub fn set_source(&mut self, id: &str, source: impl Into<String>) -> Result<(), PlaygroundError> {
        self.instance_mut(id)?.source = source.into();
        Ok(())
    }

    /// The host measured the instance's visualization surface. The canvas
    /// is that box, floored at `min_canvas`.
    pub fn resize(&mut self, id: &str, width: f64, height: f64) -> Result<(), PlaygroundError> {
        let min = self.config.min_canvas;
        let radii = self.config.radii.clone();
        let instance = self.instance_mut(id)?;
        instance.surface_size = Canvas::new(width, height);
        let canvas = instance.canvas(min);
        if let Some(sim) = &mut instance.simulation {
            sim.resize(canvas);
            instance.surface.render(sim, &radii);
        }
        Ok(())
    }

    /// Tear down one instance, stopping its simulation.
    pub fn remove(&mut self, id: &str) -> Result<(), PlaygroundError> {
        let mut instance = self
            .instances
            .remove(id)
            .ok_or_else(|| PlaygroundError::UnknownInstance(id.to_string()))?;
        instance.teardown();
        debug!(instance = %id, "removed instance");
        Ok(())
    }

    /// Tear down every instance, e.g. when the page content is replaced.
    pub fn clear(&mut self) {
        for instance in self.instances.values_mut() {
            instance.teardown();
        }
        let n = self.instances.len();
        self.instances.clear();
        if n > 0 {
            debug!(instances = n, "cleared playground");
        }
    }

    /// Execute the instance's source and, if the tree view is on, extract
    /// and render the result.
    pub fn run(&mut self, id: &str) -> Result<RunOutcome, PlaygroundError> {
        let ticket = self.begin_run(id)?;
        let source = self.instance(id)?.source.clone();
        let result = self.executor.execute(&source);
        self.complete_run(ticket, result)
    }

    /// Start a new run generation. Any ticket handed out earlier for the
    /// same instance becomes stale.
    pub fn begin_run(&mut self, id: &str) -> Result<RunTicket, PlaygroundError> {
        let instance = self.instance_mut(id)?;
        instance.generation += 1;
        instance.transition(RunState::Executing);
        instance.preview = Preview::Loading {
            generation: instance.generation,
        };
        instance.document = None;
        instance.stop_simulation();
        debug!(instance = %id, generation = instance.generation, "executing source");
        Ok(RunTicket {
            instance: id.to_string(),
            generation: instance.generation,
        })
    }

    /// Apply the executor's result for `ticket`.
    pub fn complete_run(
        &mut self,
        ticket: RunTicket,
        result: Result<Box<dyn DocumentHandle>, ExecutionError>,
    ) -> Result<RunOutcome, PlaygroundError> {
        let config = &self.config;
        let Some(instance) = self.instances.get_mut(&ticket.instance) else {
            debug!(instance = %ticket.instance, "run finished after teardown, discarding");
            return Ok(RunOutcome::Stale);
        };
        if instance.generation != ticket.generation {
            debug!(
                instance = %ticket.instance,
                ticket = ticket.generation,
                current = instance.generation,
                "discarding stale run"
            );
            return Ok(RunOutcome::Stale);
        }

        let document = match result {
            Ok(document) => document,
            Err(e) => {
                warn!(instance = %ticket.instance, error = %e, "execution failed");
                let message = e.to_string();
                instance.preview = Preview::Failed {
                    generation: ticket.generation,
                    banner: error_banner(&message),
                    message: message.clone(),
                };
                instance.transition(RunState::Idle);
                return Ok(RunOutcome::ExecutionFailed { message });
            }
        };
        instance.document = Some(document);
        instance.preview = Preview::Ready {
            generation: ticket.generation,
        };

        if !instance.tree_visible {
            instance.transition(RunState::Hidden);
            instance.transition(RunState::Idle);
            return Ok(RunOutcome::Hidden);
        }

        let outcome = instance.show_tree(config);
        info!(instance = %ticket.instance, outcome = ?outcome, "run complete");
        Ok(outcome)
    }

    /// Flip the tree view. Turning it on re-extracts from the current
    /// preview; turning it off stops the simulation and clears the surface.
    /// The source is never re-run.
    pub fn toggle(&mut self, id: &str, visible: bool) -> Result<RunOutcome, PlaygroundError> {
        let config = &self.config;
        let instance = self
            .instances
            .get_mut(id)
            .ok_or_else(|| PlaygroundError::UnknownInstance(id.to_string()))?;
        instance.tree_visible = visible;
        if !visible {
            instance.stop_simulation();
            instance.simulation = None;
            instance.surface.clear();
            debug!(instance = %id, "tree view off");
            return Ok(RunOutcome::Hidden);
        }
        if instance.state == RunState::Executing {
            debug!(instance = %id, "tree view on, waiting for the pending run");
            return Ok(RunOutcome::Pending);
        }
        debug!(instance = %id, "tree view on");
        Ok(instance.show_tree(config))
    }

    /// One timer tick for an instance. Returns whether its simulation is
    /// still running.
    pub fn tick(&mut self, id: &str) -> Result<bool, PlaygroundError> {
        let instance = self.instance_mut(id)?;
        Ok(step_instance(instance))
    }

    /// One timer tick for every instance. Returns how many are still running.
    pub fn tick_all(&mut self) -> usize {
        self.instances
            .values_mut()
            .map(step_instance)
            .filter(|running| *running)
            .count()
    }

    pub fn drag_start(&mut self, id: &str, node: usize) -> Result<(), PlaygroundError> {
        self.with_simulation(id, node, |sim| sim.drag_start(node))
    }

    pub fn drag_to(&mut self, id: &str, node: usize, x: f64, y: f64) -> Result<(), PlaygroundError> {
        self.with_simulation(id, node, |sim| sim.drag_to(node, x, y))
    }

    pub fn drag_end(&mut self, id: &str, node: usize) -> Result<(), PlaygroundError> {
        self.with_simulation(id, node, |sim| sim.drag_end(node))
    }

    /// Laid-out graph of the last render, if the tree is shown.
    pub fn graph(&self, id: &str) -> Result<Option<&Graph>, PlaygroundError> {
        Ok(self.instance(id)?.simulation.as_ref().map(Simulation::graph))
    }

    pub fn simulation(&self, id: &str) -> Result<Option<&Simulation>, PlaygroundError> {
        Ok(self.instance(id)?.simulation.as_ref())
    }

    pub fn scene(&self, id: &str) -> Result<Option<&Scene>, PlaygroundError> {
        Ok(self.instance(id)?.surface.scene())
    }

    pub fn svg(&self, id: &str) -> Result<Option<String>, PlaygroundError> {
        Ok(self.scene(id)?.map(render::to_svg))
    }

    pub fn preview(&self, id: &str) -> Result<&Preview, PlaygroundError> {
        Ok(&self.instance(id)?.preview)
    }

    pub fn state(&self, id: &str) -> Result<RunState, PlaygroundError> {
        Ok(self.instance(id)?.state)
    }

    pub fn source(&self, id: &str) -> Result<&str, PlaygroundError> {
        Ok(&self.instance(id)?.source)
    }

    pub fn is_tree_visible(&self, id: &str) -> Result<bool, PlaygroundError> {
        Ok(self.instance(id)?.tree_visible)
    }

    pub fn generation(&self, id: &str) -> Result<u64, PlaygroundError> {
        Ok(self.instance(id)?.generation)
    }

    pub fn instance_ids(&self) -> Vec<&str> {
        self.instances.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn instance(&self, id: &str) -> Result<&Instance, PlaygroundError> {
        self.instances
            .get(id)
            .ok_or_else(|| PlaygroundError::UnknownInstance(id.to_string()))
    }

    fn instance_mut(&mut self, id: &str) -> Result<&mut Instance, PlaygroundError> {
        self.instances
            .get_mut(id)
            .ok_or_else(|| PlaygroundError::UnknownInstance(id.to_string()))
    }

    fn with_simulation(
        &mut self,
        id: &str,
        node: usize,
        f: impl FnOnce(&mut Simulation) -> bool,
    ) -> Result<(), PlaygroundError> {
        let instance = self.instance_mut(id)?;
        let unknown = || PlaygroundError::UnknownNode {
            instance: id.to_string(),
            node,
        };
        let sim = instance.simulation.as_mut().ok_or_else(unknown)?;
        if !f(sim) {
            return Err(unknown());
        }
        instance.surface.sync(sim);
        Ok(())
    }
}

fn step_instance(instance: &mut Instance) -> bool {
    let Some(sim) = &mut instance.simulation else {
        return false;
    };
    let running = sim.step();
    instance.surface.sync(sim);
    running
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config = PlaygroundConfig::from_json(r#"{"min_canvas": {"width": 500, "height": 350}}"#)
            .unwrap();
        assert_eq!(config.min_canvas, Canvas::new(500.0, 350.0));
        assert_eq!(config.default_surface, Canvas::new(0.0, 0.0));
        assert_eq!(config.forces, ForceConfig::default());
        assert!(config.policy.allow_scripts);
    }

    #[test]
    fn invalid_config_is_a_json_error() {
        let err = PlaygroundConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let err = PlaygroundConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn unknown_instance_is_reported() {
        let mut pg = Playground::default();
        assert_eq!(
            pg.run("missing"),
            Err(PlaygroundError::UnknownInstance("missing".into()))
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut pg = Playground::default();
        pg.register("a", "<p>x</p>").unwrap();
        assert_eq!(
            pg.register("a", "<p>y</p>"),
            Err(PlaygroundError::DuplicateInstance("a".into()))
        );
    }
}
