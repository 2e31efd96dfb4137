use std::error::Error;
use std::io::Read;

use clap::{Parser, Subcommand};
use domplay_core::graph::{self, Graph};
use domplay_core::layout::{measure_panes, Canvas};
use domplay_core::sandbox::{DocumentHandle, SandboxExecutor, SandboxPolicy};
use domplay_core::{Playground, PlaygroundConfig, RunOutcome};
use tracing_subscriber::EnvFilter;

const INSTANCE: &str = "cli";

#[derive(Parser)]
#[command(name = "domplay", about = "Visualize the DOM tree an HTML/JS snippet produces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a snippet in the sandbox and print its DOM graph
    Graph {
        /// The HTML file to run (use - for stdin)
        file: String,

        /// Output as JSON instead of the indented listing
        #[arg(long)]
        json: bool,

        /// Keep meta tags, empty titles and extension attributes
        #[arg(long)]
        raw: bool,

        /// Do not execute inline scripts
        #[arg(long)]
        no_scripts: bool,
    },
    /// Lay out a snippet's DOM graph and write it as SVG
    Render {
        /// The HTML file to run (use - for stdin)
        file: String,

        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<String>,

        /// Panel size as WxH; the tree gets the right-hand pane
        #[arg(long, default_value = "800x400")]
        size: String,

        /// Maximum simulation ticks before the snapshot is taken
        #[arg(long, default_value_t = 300)]
        ticks: usize,

        /// Playground configuration (JSON)
        #[arg(long)]
        config: Option<String>,
    },
    /// Start the REST server
    #[cfg(feature = "serve")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 3848)]
        port: u16,

        /// Playground configuration (JSON)
        #[arg(long)]
        config: Option<String>,
    },
}

fn parse_size(s: &str) -> (f64, f64) {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() == 2 {
        let w = parts[0].parse().unwrap_or(800.0);
        let h = parts[1].parse().unwrap_or(400.0);
        (w, h)
    } else {
        (800.0, 400.0)
    }
}

fn read_source(file: &str) -> std::io::Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(file)
    }
}

fn load_config(path: Option<&str>) -> Result<PlaygroundConfig, Box<dyn Error>> {
    Ok(match path {
        Some(path) => PlaygroundConfig::load(path)?,
        None => PlaygroundConfig::default(),
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Graph {
            file,
            json,
            raw,
            no_scripts,
        } => {
            let html = read_source(&file)?;
            let policy = SandboxPolicy {
                allow_scripts: !no_scripts,
                ..SandboxPolicy::default()
            };
            let graph = if raw {
                let document = SandboxExecutor::new(policy).render(&html)?;
                graph::extract_subtree(document.snapshot()?)
            } else {
                domplay_core::snapshot_graph(&html, policy)?
            };
            print_graph(&graph, json)?;
        }
        Commands::Render {
            file,
            out,
            size,
            ticks,
            config,
        } => {
            let html = read_source(&file)?;
            let config = load_config(config.as_deref())?;
            let (w, h) = parse_size(&size);
            let tree = measure_panes(Canvas::new(w, h), true).tree;

            let mut playground = Playground::new(config);
            playground.register(INSTANCE, html)?;
            playground.resize(INSTANCE, tree.width, tree.height)?;
            match playground.run(INSTANCE)? {
                RunOutcome::Rendered { .. } => {}
                RunOutcome::ExecutionFailed { message } => return Err(message.into()),
                other => {
                    eprintln!("nothing to render ({other:?})");
                    return Ok(());
                }
            }

            let mut n = 0;
            while n < ticks && playground.tick(INSTANCE)? {
                n += 1;
            }
            tracing::debug!(ticks = n, "layout snapshot taken");

            let Some(svg) = playground.svg(INSTANCE)? else {
                return Err("no scene was drawn".into());
            };
            match out {
                Some(path) => std::fs::write(path, svg)?,
                None => print!("{svg}"),
            }
        }
        #[cfg(feature = "serve")]
        Commands::Serve { port, config } => serve(port, config.as_deref())?,
    }
    Ok(())
}

#[cfg(feature = "serve")]
fn serve(port: u16, config: Option<&str>) -> Result<(), Box<dyn Error>> {
    let server_config = domplay_server::ServerConfig {
        port,
        playground: load_config(config)?,
        ..Default::default()
    };
    eprintln!("domplay server starting on http://localhost:{port}");
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(domplay_server::serve(server_config))?;
    Ok(())
}

fn print_graph(graph: &Graph, as_json: bool) -> Result<(), serde_json::Error> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(graph)?);
    } else {
        println!("nodes: {}", graph.nodes.len());
        println!("edges: {}", graph.edges.len());
        println!("---");
        print!("{}", graph::to_compact_string(graph));
    }
    Ok(())
}
