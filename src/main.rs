use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};
use simplelog::{Config, LevelFilter, WriteLogger};

use planmark::catalog::{CategoryCatalog, CategoryDraft};
use planmark::data::{DataAccess, Entity, JsonFileStore, RecordId, field_u64};
use planmark::geometry::NormPoint;
use planmark::host::{DocumentRef, import_document, list_documents};
use planmark::regions::{Geometry, PendingRegion, RegionStore};
use planmark::render::{ContentRasterizer, RenderOutcome, SharedRasterizer};
use planmark::session::Command;
use planmark::settings::{self, Settings};
use planmark::{AnnotationViewer, RasterizerFactory, ViewerConfig, panic_handler};

const DEFAULT_STORE: &str = "planmark.json";
const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(
    name = "planmark",
    about = "Mark and categorize regions on document pages",
    version
)]
struct Cli {
    /// JSON record store (defaults to the configured store or ./planmark.json)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Log level: off, error, warn, info, debug, trace
    #[arg(long, global = true)]
    log_level: Option<LevelFilter>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a PDF or image file as a document
    Import {
        path: PathBuf,

        #[arg(long)]
        scope: Option<RecordId>,
    },

    /// List documents
    Documents {
        #[arg(long)]
        scope: Option<RecordId>,

        /// Case-insensitive name fragment
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Render a page with its regions to a PNG file
    Render {
        document: RecordId,

        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Container width to fit the page into
        #[arg(short, long)]
        width: Option<f32>,

        /// Explicit scale (e.g. 1.5); overrides fitting
        #[arg(short, long)]
        zoom: Option<f32>,

        #[arg(short, long, default_value = "page.png")]
        output: PathBuf,
    },

    /// Manage categories
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// Create a region from normalized coordinates ("x,y" pairs)
    Mark {
        document: RecordId,

        #[arg(short, long, default_value_t = 1)]
        page: usize,

        #[arg(short, long)]
        category: RecordId,

        /// One pair for a point, three or more for a polygon
        #[arg(required = true, num_args = 1..)]
        points: Vec<String>,

        #[arg(short, long)]
        note: Option<String>,

        #[arg(long)]
        scope: Option<RecordId>,
    },

    /// Inspect or delete regions
    Regions {
        #[command(subcommand)]
        action: RegionAction,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// List categories with their region counts
    List {
        #[arg(long)]
        scope: Option<RecordId>,
    },
    /// Add a category; dimensions are filled from a same-named category
    Add {
        name: String,

        #[arg(long)]
        scope: Option<RecordId>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        material: Option<String>,

        #[arg(long)]
        quantity: Option<u32>,
    },
    /// Rename or re-describe a category
    Edit {
        id: RecordId,

        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        material: Option<String>,
    },
    /// Delete a category and its regions
    Remove { id: RecordId },
    /// Change a category's quantity by one
    Bump {
        id: RecordId,

        /// Decrease instead of increase
        #[arg(long)]
        down: bool,
    },
}

#[derive(Subcommand)]
enum RegionAction {
    /// List the regions of a page
    List {
        document: RecordId,

        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Delete a region
    Remove { document: RecordId, id: RecordId },
}

fn main() -> Result<()> {
    panic_handler::initialize_panic_handler();

    let cli = Cli::parse();
    settings::load_settings();
    let settings = settings::current();

    let level = cli.log_level.unwrap_or_else(|| settings.log_level_filter());
    WriteLogger::init(level, Config::default(), File::create(&settings.log_file)?)?;
    info!("Starting planmark");

    let store_path = cli
        .store
        .clone()
        .or_else(|| settings.store_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE));
    let store = JsonFileStore::open(&store_path).with_context(|| format!("opening {}", store_path.display()))?;

    let res = run(cli.command, store, &settings);
    if let Err(err) = &res {
        log::error!("Command failed: {err:?}");
    }
    info!("Shutting down planmark");
    res
}

fn run(command: Commands, mut store: JsonFileStore, settings: &Settings) -> Result<()> {
    match command {
        Commands::Import { path, scope } => {
            let id = import_document(&mut store, &path, scope)?;
            println!("{id}");
        }

        Commands::Documents { scope, filter } => {
            for doc in list_documents(&store, scope, filter.as_deref()) {
                println!("{:>6}  {}", doc.attachment_id, doc.name);
            }
        }

        Commands::Render {
            document,
            page,
            width,
            zoom,
            output,
        } => render(store, settings, document, page, width, zoom, &output)?,

        Commands::Categories { action } => categories(&mut store, settings, action)?,

        Commands::Mark {
            document,
            page,
            category,
            points,
            note,
            scope,
        } => {
            let points = points.iter().map(|p| parse_point(p)).collect::<Result<Vec<_>>>()?;
            let geometry = if points.len() == 1 {
                Geometry::Point(points[0])
            } else {
                Geometry::polygon(points).context("a polygon needs at least three points")?
            };
            let mut catalog = CategoryCatalog::new(settings.palette());
            catalog.list(&store, scope);
            if catalog.get(category).is_none() {
                bail!("unknown category #{category}");
            }

            let pending = PendingRegion {
                attachment_id: document,
                page,
                geometry,
            };
            let mut regions = RegionStore::new();
            regions.load(&store, document, page);
            let id = regions.create(&mut store, &pending, category, catalog.color_of(category), note.as_deref())?;
            println!("{id}");
        }

        Commands::Regions { action } => match action {
            RegionAction::List { document, page } => {
                let mut regions = RegionStore::new();
                regions.load(&store, document, page);
                for region in regions.regions() {
                    let anchor = region.geometry.anchor();
                    println!(
                        "{:>6}  {:<8} ({:.3}, {:.3})  {}  {}",
                        region.id,
                        if region.geometry.is_polygon() { "polygon" } else { "point" },
                        anchor.x,
                        anchor.y,
                        region.category_name.as_deref().unwrap_or("-"),
                        region.note.as_deref().unwrap_or("")
                    );
                }
            }
            RegionAction::Remove { document, id } => {
                let page = store
                    .get(Entity::Region, &[id], &["page_number"])?
                    .first()
                    .and_then(|r| field_u64(r, "page_number"))
                    .with_context(|| format!("unknown region #{id}"))?;
                let mut regions = RegionStore::new();
                regions.load(&store, document, page as usize);
                regions.delete(&mut store, id)?;
                println!("deleted region #{id}");
            }
        },
    }
    Ok(())
}

fn render(
    store: JsonFileStore,
    settings: &Settings,
    document: RecordId,
    page: usize,
    width: Option<f32>,
    zoom: Option<f32>,
    output: &Path,
) -> Result<()> {
    let factory: RasterizerFactory = Arc::new(|| Ok(Arc::new(ContentRasterizer) as SharedRasterizer));
    let mut viewer = AnnotationViewer::new(Box::new(store), factory, ViewerConfig::from(settings));
    let _mounted = viewer.mount();

    let name = list_documents(viewer.data(), None, None)
        .into_iter()
        .find(|d| d.attachment_id == document)
        .map(|d| d.name)
        .with_context(|| format!("unknown document #{document}"))?;

    let now = Instant::now();
    if let Some(width) = width {
        viewer.on_container_resize(width, now);
    }
    viewer.open_document(DocumentRef::new(document, name), now)?;
    if let Some(scale) = zoom {
        viewer.apply(Command::SetZoom(scale), now);
    }
    viewer.go_to_page(page, now);

    let outcomes = viewer.settle(RENDER_TIMEOUT);
    if let Some(RenderOutcome::Failed { error, .. }) = outcomes.iter().find(|o| matches!(o, RenderOutcome::Failed { .. })) {
        bail!("rendering page {page} failed: {error}");
    }
    let state = viewer.session().context("document closed unexpectedly")?;
    if state.current_page != page {
        warn!("Page {page} is out of range; rendered page {}", state.current_page);
    }

    viewer
        .composite()
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "page {}/{} at {} -> {}",
        state.current_page,
        state.total_pages,
        state.zoom_percent,
        output.display()
    );
    Ok(())
}

fn categories(store: &mut JsonFileStore, settings: &Settings, action: CategoryAction) -> Result<()> {
    let mut catalog = CategoryCatalog::new(settings.palette());
    match action {
        CategoryAction::List { scope } => {
            catalog.list(store, scope);
            for category in catalog.categories() {
                println!(
                    "{:>6}  {}  {:<24} qty {:>3}  regions {}",
                    category.id,
                    category.color.to_hex(),
                    category.name,
                    category.quantity,
                    category.region_count
                );
            }
            println!("total signs: {}", catalog.total_quantity());
        }
        CategoryAction::Add {
            name,
            scope,
            description,
            material,
            quantity,
        } => {
            catalog.list(store, scope);
            let mut draft = CategoryDraft {
                description,
                material,
                quantity,
                ..CategoryDraft::named(name)
            };
            if let Some(fill) = catalog.auto_fill(&draft.name) {
                info!("Filling dimensions from category #{}", fill.source_id);
                draft.apply(&fill);
            }
            println!("{}", catalog.create(store, &draft)?);
        }
        CategoryAction::Edit {
            id,
            name,
            description,
            material,
        } => {
            catalog.list(store, None);
            let current = catalog.get(id).with_context(|| format!("unknown category #{id}"))?;
            let draft = CategoryDraft {
                name,
                description: description.or_else(|| current.description.clone()),
                dimensions: current.dimensions.clone(),
                length: current.length,
                width: current.width,
                has_window: current.has_window,
                material: material.or_else(|| current.material.clone()),
                mounting: current.mounting.clone(),
                notes: current.notes.clone(),
                quantity: None,
                confirmed: current.confirmed,
            };
            catalog.update(store, id, &draft)?;
        }
        CategoryAction::Remove { id } => {
            catalog.list(store, None);
            let removed = catalog.delete(store, id)?;
            println!("deleted category #{id} and {removed} region(s)");
        }
        CategoryAction::Bump { id, down } => {
            catalog.list(store, None);
            let quantity = if down {
                catalog.decrement_quantity(store, id)?
            } else {
                catalog.increment_quantity(store, id)?
            };
            println!("{quantity}");
        }
    }
    Ok(())
}

fn parse_point(value: &str) -> Result<NormPoint> {
    let (x, y) = value
        .split_once(',')
        .with_context(|| format!("expected x,y but got '{value}'"))?;
    let point = NormPoint::new(x.trim().parse()?, y.trim().parse()?);
    if !(0.0..=1.0).contains(&point.x) || !(0.0..=1.0).contains(&point.y) {
        bail!("coordinates must be normalized to [0, 1], got '{value}'");
    }
    Ok(point)
}
