//! Shelfview - render a model's preview to PNG without a browser
//!
//! Goes through the same path as the interactive front-end: switch to a
//! view, let the visibility scheduler pick the loads, run the render loop
//! for a few frames, and save what was blitted into the container.

use std::path::PathBuf;
use std::rc::Rc;

use shelfview::animation::FrameLoop;
use shelfview::core::{logging, Error, Result, ViewerConfig};
use shelfview::host::{ContainerContent, ContainerId, ContainerRegistry};
use shelfview::preview::PreviewService;
use shelfview::render::{GpuContextFactory, RendererPool};
use shelfview::view::{View, ViewController, ViewState};
use shelfview_api::ApiClient;

const DEFAULT_FRAMES: u32 = 3;

#[derive(Debug)]
struct Args {
    model_id: i64,
    detail: bool,
    out: PathBuf,
    config: Option<PathBuf>,
    frames: u32,
}

fn parse_args() -> std::result::Result<Args, String> {
    let mut args = std::env::args().skip(1);

    let mut model_id = None;
    let mut detail = false;
    let mut out = None;
    let mut config = None;
    let mut frames = DEFAULT_FRAMES;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-m" | "--model" => {
                let v = args.next().ok_or("--model needs a value")?;
                model_id = Some(v.parse().map_err(|_| format!("Invalid model id: {}", v))?);
            }
            "-d" | "--detail" => detail = true,
            "-o" | "--out" => out = args.next().map(PathBuf::from),
            "-c" | "--config" => config = args.next().map(PathBuf::from),
            "-f" | "--frames" => {
                let v = args.next().ok_or("--frames needs a value")?;
                frames = v.parse().map_err(|_| format!("Invalid frame count: {}", v))?;
            }
            "-h" | "--help" | "help" => return Err("show_help".to_string()),
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }

    Ok(Args {
        model_id: model_id.ok_or("--model is required")?,
        detail,
        out: out.ok_or("--out is required")?,
        config,
        frames: frames.max(1),
    })
}

fn print_help() {
    println!("Shelfview preview renderer");
    println!();
    println!("Usage: shelfview --model <ID> --out <PNG> [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -m, --model <ID>      Model to preview");
    println!("  -o, --out <PATH>      Output PNG");
    println!("  -d, --detail          Render the detail preview instead of the card");
    println!("  -c, --config <PATH>   JSON config file");
    println!("  -f, --frames <N>      Frames to run before saving (default: 3)");
    println!();
    println!("Environment:");
    println!("  SHELFVIEW_API_BASE    API root (default: http://localhost:3000/api)");
    println!("  RUST_LOG              Log filter (default: info)");
}

fn main() {
    logging::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            if e == "show_help" {
                print_help();
                return;
            }
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = ViewerConfig::load(args.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, render_preview(args, config))
}

async fn render_preview(args: Args, config: ViewerConfig) -> Result<()> {
    let frames = FrameLoop::new();
    let pool = RendererPool::shared(Box::new(GpuContextFactory::new(config.preview_size)), frames.clone());
    let containers = ContainerRegistry::shared();
    let source = Rc::new(ApiClient::new(config.api_base.clone()));
    let service = PreviewService::new(source, pool.clone(), containers.clone(), Rc::new(config));
    let mut controller = ViewController::new(service);

    let view = if args.detail { View::ModelDetail(args.model_id) } else { View::Models };
    controller.switch_view(view).await?;

    let container = target_container(&controller, args.model_id)
        .ok_or_else(|| Error::Config(format!("Model {} has no preview container", args.model_id)))?;
    let viewport = controller
        .containers()
        .get(container)
        .map(|c| c.bounds)
        .ok_or(Error::ContainerDetached(container.0))?;

    let loads: Vec<_> = controller
        .observe(viewport)
        .into_iter()
        .filter(|load| load.container() == container)
        .collect();
    controller.run_loads(loads).await;

    // Asking for this model on the command line counts as the user action
    let manual = match controller.containers().content(container) {
        Some(ContainerContent::ManualTrigger { file_id, .. }) => Some(*file_id),
        _ => None,
    };
    if let Some(file_id) = manual {
        controller.load_preview(file_id, container, true).await;
    }

    for _ in 0..args.frames {
        frames.tick();
    }

    let registry = containers.borrow();
    let shown = registry.get(container).ok_or(Error::ContainerDetached(container.0))?;
    match (&shown.content, &shown.surface) {
        (ContainerContent::Canvas | ContainerContent::Image, Some(surface)) => {
            surface.save(&args.out)?;
            log::info!("Wrote {}x{} preview to {}", surface.width(), surface.height(), args.out.display());
        }
        (content, _) => {
            return Err(Error::Config(format!("Preview not rendered, container shows {:?}", content)));
        }
    }

    drop(registry);
    pool.borrow_mut().release_all();
    pool.borrow_mut().dispose_all();
    Ok(())
}

/// The card of `model_id`, or the first preview box of its detail view
fn target_container(controller: &ViewController<ApiClient>, model_id: i64) -> Option<ContainerId> {
    match controller.state()? {
        ViewState::Models { cards } => cards.iter().find(|c| c.model_id == model_id).map(|c| c.container),
        ViewState::ModelDetail { files, .. } => {
            files.iter().find(|f| f.is_preview && f.container.is_some())
                .or_else(|| files.iter().find(|f| f.container.is_some()))
                .and_then(|f| f.container)
        }
        _ => None,
    }
}
