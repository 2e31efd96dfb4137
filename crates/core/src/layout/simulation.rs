use std::collections::HashMap;
use std::f64::consts::PI;

use tracing::debug;

use super::quadtree::QuadTree;
use super::{assign_target_y, Canvas, ForceConfig};
use crate::graph::Graph;

const INITIAL_RADIUS: f64 = 10.0;
const CENTER_STRENGTH: f64 = 1.0;
const COLLIDE_STRENGTH: f64 = 1.0;
const DISTANCE_MIN2: f64 = 1.0;
/// Barnes–Hut accuracy, squared: a cell is far when `size / distance < 0.9`.
const THETA2: f64 = 0.81;

/// Velocity-Verlet style force simulation over a [`Graph`].
///
/// The simulation is driven from outside: the host calls [`Simulation::step`]
/// from its animation or timer loop. Energy (`alpha`) decays toward
/// `alpha_target` every tick and the simulation stops itself once it drops
/// below `alpha_min`.
#[derive(Debug, Clone)]
pub struct Simulation {
    graph: Graph,
    config: ForceConfig,
    canvas: Canvas,
    alpha: f64,
    alpha_target: f64,
    running: bool,
    active_drags: usize,
    random: Lcg,
    ticks: u64,
}

impl Simulation {
    /// Assign layer targets and seed positions on a phyllotaxis spiral
    /// around the canvas center.
    pub fn new(mut graph: Graph, config: ForceConfig, canvas: Canvas) -> Self {
        assign_target_y(&mut graph, &config);

        let (cx, cy) = canvas.center();
        let angle_step = PI * (3.0 - 5f64.sqrt());
        for (i, node) in graph.nodes.iter_mut().enumerate() {
            let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
            let angle = i as f64 * angle_step;
            node.x = node.fx.unwrap_or(cx + radius * angle.cos());
            node.y = node.fy.unwrap_or(cy + radius * angle.sin());
            node.vx = 0.0;
            node.vy = 0.0;
        }

        Self {
            graph,
            config,
            canvas,
            alpha: 1.0,
            alpha_target: 0.0,
            running: true,
            active_drags: 0,
            random: Lcg::default(),
            ticks: 0,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f64 {
        self.alpha_target
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Stop the timer. Positions are kept.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Resume the timer without resetting alpha.
    pub fn restart(&mut self) {
        self.running = true;
    }

    /// Re-center the forces on a new canvas size and reheat slightly.
    pub fn resize(&mut self, canvas: Canvas) {
        self.canvas = canvas;
        self.alpha = self.alpha.max(0.3);
        self.restart();
    }

    /// Timer callback: tick once if running. Returns whether the simulation
    /// is still running afterwards.
    pub fn step(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.tick();
        if self.alpha < self.config.alpha_min {
            debug!(ticks = self.ticks, "simulation settled");
            self.running = false;
        }
        self.running
    }

    /// Step until the simulation stops or `max_ticks` ticks have run.
    /// Returns the number of ticks performed.
    pub fn run_until_settled(&mut self, max_ticks: usize) -> usize {
        let mut n = 0;
        while n < max_ticks && self.running {
            self.step();
            n += 1;
        }
        n
    }

    /// Advance one tick regardless of the running state.
    pub fn tick(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        let alpha = self.alpha;

        self.apply_links(alpha);
        self.apply_charge(alpha);
        self.apply_center();
        self.apply_axis(alpha);
        self.apply_collide();

        let retain = 1.0 - self.config.velocity_decay;
        for node in &mut self.graph.nodes {
            match node.fx {
                Some(fx) => {
                    node.x = fx;
                    node.vx = 0.0;
                }
                None => {
                    node.vx *= retain;
                    node.x += node.vx;
                }
            }
            match node.fy {
                Some(fy) => {
                    node.y = fy;
                    node.vy = 0.0;
                }
                None => {
                    node.vy *= retain;
                    node.y += node.vy;
                }
            }
        }
        self.ticks += 1;
    }

    /// Pin `id` at its current position. The first concurrent drag raises
    /// the alpha target so the graph keeps moving while dragged.
    pub fn drag_start(&mut self, id: usize) -> bool {
        let Some(node) = self.graph.nodes.get_mut(id) else {
            return false;
        };
        node.fx = Some(node.x);
        node.fy = Some(node.y);
        if self.active_drags == 0 {
            self.alpha_target = self.config.drag_alpha_target;
            self.restart();
        }
        self.active_drags += 1;
        true
    }

    /// Move the pin of a dragged node to the pointer position.
    pub fn drag_to(&mut self, id: usize, x: f64, y: f64) -> bool {
        let Some(node) = self.graph.nodes.get_mut(id) else {
            return false;
        };
        node.fx = Some(x);
        node.fy = Some(y);
        true
    }

    /// Unpin `id`. The last drag to end lets alpha decay to rest again.
    pub fn drag_end(&mut self, id: usize) -> bool {
        let Some(node) = self.graph.nodes.get_mut(id) else {
            return false;
        };
        node.fx = None;
        node.fy = None;
        self.active_drags = self.active_drags.saturating_sub(1);
        if self.active_drags == 0 {
            self.alpha_target = 0.0;
        }
        true
    }

    fn jiggle(&mut self) -> f64 {
        (self.random.next_f64() - 0.5) * 1e-6
    }

    /// Springs along edges toward `link_distance`.
    fn apply_links(&mut self, alpha: f64) {
        let n = self.graph.nodes.len();
        let mut degree = vec![0usize; n];
        for edge in &self.graph.edges {
            if edge.source < n && edge.target < n {
                degree[edge.source] += 1;
                degree[edge.target] += 1;
            }
        }

        let strength = self.config.link_strength;
        let distance = self.config.link_distance;
        for i in 0..self.graph.edges.len() {
            let edge = self.graph.edges[i];
            let (s, t) = (edge.source, edge.target);
            if s >= n || t >= n || s == t {
                continue;
            }
            let (src, tgt) = (&self.graph.nodes[s], &self.graph.nodes[t]);
            let mut x = tgt.x + tgt.vx - src.x - src.vx;
            let mut y = tgt.y + tgt.vy - src.y - src.vy;
            if x == 0.0 {
                x = self.jiggle();
            }
            if y == 0.0 {
                y = self.jiggle();
            }
            let mut l = (x * x + y * y).sqrt();
            l = (l - distance) / l * alpha * strength;
            x *= l;
            y *= l;

            let bias = degree[s] as f64 / (degree[s] + degree[t]) as f64;
            let tgt = &mut self.graph.nodes[t];
            tgt.vx -= x * bias;
            tgt.vy -= y * bias;
            let src = &mut self.graph.nodes[s];
            src.vx += x * (1.0 - bias);
            src.vy += y * (1.0 - bias);
        }
    }

    /// Many-body force; negative strength repels. Distant cells of the
    /// quadtree act as a single body at their centroid.
    fn apply_charge(&mut self, alpha: f64) {
        let positions: Vec<(f64, f64)> = self.graph.nodes.iter().map(|p| (p.x, p.y)).collect();
        let Some(tree) = QuadTree::new(&positions) else {
            return;
        };
        let strength = self.config.charge_strength * alpha;
        let mut stack = Vec::new();
        for (i, &(xi, yi)) in positions.iter().enumerate() {
            let (mut dvx, mut dvy) = (0.0, 0.0);
            stack.push(0);
            while let Some(q) = stack.pop() {
                let quad = &tree.quads[q];
                if !quad.children.is_empty() {
                    let (x, y) = (quad.cx - xi, quad.cy - yi);
                    if quad.size * quad.size / THETA2 < x * x + y * y {
                        let (fx, fy) = self.repulse(x, y, strength * quad.count);
                        dvx += fx;
                        dvy += fy;
                    } else {
                        stack.extend_from_slice(&quad.children);
                    }
                    continue;
                }
                for &j in &quad.points {
                    if j == i {
                        continue;
                    }
                    let (xj, yj) = positions[j];
                    let (fx, fy) = self.repulse(xj - xi, yj - yi, strength);
                    dvx += fx;
                    dvy += fy;
                }
            }
            let node = &mut self.graph.nodes[i];
            node.vx += dvx;
            node.vy += dvy;
        }
    }

    /// Velocity change toward a body at offset `(x, y)` with `weight`.
    fn repulse(&mut self, mut x: f64, mut y: f64, weight: f64) -> (f64, f64) {
        let mut l = x * x + y * y;
        if x == 0.0 {
            x = self.jiggle();
            l += x * x;
        }
        if y == 0.0 {
            y = self.jiggle();
            l += y * y;
        }
        if l < DISTANCE_MIN2 {
            l = (DISTANCE_MIN2 * l).sqrt();
        }
        let w = weight / l;
        (x * w, y * w)
    }

    /// Translate all nodes so their mean sits on the canvas center.
    fn apply_center(&mut self) {
        let n = self.graph.nodes.len();
        if n == 0 {
            return;
        }
        let (cx, cy) = self.canvas.center();
        let (sx, sy) = self
            .graph
            .nodes
            .iter()
            .fold((0.0, 0.0), |(sx, sy), node| (sx + node.x, sy + node.y));
        let dx = (sx / n as f64 - cx) * CENTER_STRENGTH;
        let dy = (sy / n as f64 - cy) * CENTER_STRENGTH;
        for node in &mut self.graph.nodes {
            node.x -= dx;
            node.y -= dy;
        }
    }

    /// Layer pull on y, weak centering on x.
    fn apply_axis(&mut self, alpha: f64) {
        let (cx, _) = self.canvas.center();
        let (ys, xs) = (self.config.y_strength, self.config.x_strength);
        for node in &mut self.graph.nodes {
            node.vy += (node.target_y - node.y) * ys * alpha;
            node.vx += (cx - node.x) * xs * alpha;
        }
    }

    /// Push apart nodes whose predicted positions overlap.
    fn apply_collide(&mut self) {
        let r = self.config.collide_radius;
        if r <= 0.0 {
            return;
        }
        let reach = r + r;

        // Only nodes in the same or a neighbouring grid cell can overlap.
        let cell_of = |x: f64, y: f64| ((x / reach).floor() as i64, (y / reach).floor() as i64);
        let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i, node) in self.graph.nodes.iter().enumerate() {
            grid.entry(cell_of(node.x + node.vx, node.y + node.vy))
                .or_default()
                .push(i);
        }

        let n = self.graph.nodes.len();
        let mut candidates = Vec::new();
        for i in 0..n {
            let (xi, yi) = {
                let node = &self.graph.nodes[i];
                (node.x + node.vx, node.y + node.vy)
            };
            let (gx, gy) = cell_of(xi, yi);
            candidates.clear();
            for dx in -1..=1 {
                for dy in -1..=1 {
                    if let Some(cell) = grid.get(&(gx + dx, gy + dy)) {
                        candidates.extend(cell.iter().copied().filter(|&j| j > i));
                    }
                }
            }
            candidates.sort_unstable();

            for &j in &candidates {
                let (xj, yj) = {
                    let other = &self.graph.nodes[j];
                    (other.x + other.vx, other.y + other.vy)
                };
                let mut x = xi - xj;
                let mut y = yi - yj;
                let mut l = x * x + y * y;
                if l >= reach * reach {
                    continue;
                }
                if x == 0.0 {
                    x = self.jiggle();
                    l += x * x;
                }
                if y == 0.0 {
                    y = self.jiggle();
                    l += y * y;
                }
                let dist = l.sqrt();
                let push = (reach - dist) / dist * COLLIDE_STRENGTH;
                x *= push;
                y *= push;
                // Equal radii split the correction evenly.
                let share = 0.5;
                let node = &mut self.graph.nodes[i];
                node.vx += x * share;
                node.vy += y * share;
                let other = &mut self.graph.nodes[j];
                other.vx -= x * (1.0 - share);
                other.vy -= y * (1.0 - share);
            }
        }
    }
}

/// Linear congruential generator used for deterministic jitter.
#[derive(Debug, Clone)]
struct Lcg(u64);

impl Default for Lcg {
    fn default() -> Self {
        Self(1)
    }
}

impl Lcg {
    const A: u64 = 1_664_525;
    const C: u64 = 1_013_904_223;
    const M: u64 = 1 << 32;

    fn next_f64(&mut self) -> f64 {
        self.0 = (Self::A * self.0 + Self::C) % Self::M;
        self.0 as f64 / Self::M as f64
    }
}
