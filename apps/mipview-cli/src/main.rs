use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures::executor::LocalPool;
use glam::UVec2;
use mipview_assets::{AssetManifest, FsSource};
use mipview_material::MaterialBinder;
use mipview_persist::{CameraSnapshot, CameraStateStore, PoseFile};
use mipview_render::{CaptureConfig, NoControls, ViewCapture, VirtualCamera};
use mipview_render_wgpu::{HeadlessGpu, OffscreenCapture, WgpuRenderer};
use mipview_scene::{GridLayout, Scene};
use mipview_stream::{LodConfig, MAX_TEST_PATTERN_SIZE, MipChain, StreamedTexture, TextureLoader, ktx2};
use mipview_tools::ViewerInspector;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mipview-cli", about = "CLI tool for mipview operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and default configuration
    Info,
    /// Describe the mip chain of a KTX2 texture
    Inspect {
        /// Path to the .ktx2 file
        path: PathBuf,
    },
    /// Write an uncompressed RGBA8 KTX2 test texture with a full mip chain
    MakeTexture {
        /// Output file
        #[arg(short, long, default_value = "assets/texture.ktx2")]
        out: PathBuf,
        /// Base level size in pixels, rounded up to a power of two
        #[arg(
            short,
            long,
            default_value = "1024",
            value_parser = clap::value_parser!(u32).range(1..=MAX_TEST_PATTERN_SIZE as i64)
        )]
        size: u32,
        /// Mark the texels linear instead of sRGB
        #[arg(long)]
        linear: bool,
        /// Also write a default asset manifest next to the texture
        #[arg(long)]
        manifest: bool,
    },
    /// Render the cube grid headlessly and write a WebP still
    Capture {
        /// front, side, top, isometric or current
        #[arg(short, long, default_value = "isometric")]
        angle: String,
        #[arg(long, default_value = "./assets")]
        assets: PathBuf,
        /// Camera state used for the `current` angle
        #[arg(long)]
        pose_file: Option<PathBuf>,
        #[arg(long, default_value = "1280")]
        width: u32,
        #[arg(long, default_value = "720")]
        height: u32,
        #[arg(long, default_value = "12")]
        grid_size: u32,
        #[arg(long, default_value = "1.2")]
        spacing: f32,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Show or reset a persisted camera pose
    Pose {
        #[command(subcommand)]
        action: PoseAction,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Info => "info",
            Commands::Inspect { .. } => "inspect",
            Commands::MakeTexture { .. } => "make-texture",
            Commands::Capture { .. } => "capture",
            Commands::Pose { .. } => "pose",
        }
    }
}

#[derive(Subcommand)]
enum PoseAction {
    /// Print the stored pose
    Show {
        #[arg(long, default_value = "camera.json")]
        file: PathBuf,
    },
    /// Write the default pose, keeping the stored projection
    Reset {
        #[arg(long, default_value = "camera.json")]
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();
    match cli.command {
        Commands::Info => {
            println!("mipview-cli v{}", env!("CARGO_PKG_VERSION"));
            let lod = LodConfig::default();
            println!("lod: cadence={}ms order={:?}", lod.cadence.as_millis(), lod.order);
            let grid = GridLayout::default();
            println!("grid: {}x{} spacing={}", grid.size, grid.size, grid.spacing);
            let manifest = AssetManifest::default();
            println!(
                "assets: texture={} normal={} roughness={} fallback={}",
                manifest.texture, manifest.normal_map, manifest.roughness_map, manifest.fallback
            );
            println!("capture: radius={}", CaptureConfig::default().radius);
        }
        Commands::Inspect { path } => inspect(&path)?,
        Commands::MakeTexture {
            out,
            size,
            linear,
            manifest,
        } => {
            let chain = MipChain::test_pattern(size);
            let bytes = ktx2::write_rgba8(&chain.levels, !linear);
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out, &bytes).with_context(|| format!("writing {}", out.display()))?;
            tracing::debug!(path = %out.display(), levels = chain.len(), "test texture written");
            println!(
                "Wrote {} ({} levels, {} bytes)",
                out.display(),
                chain.len(),
                bytes.len()
            );
            if manifest {
                let file_name = out
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let path = out.with_file_name("manifest.json");
                AssetManifest {
                    texture: file_name,
                    ..AssetManifest::default()
                }
                .save(&path)?;
                println!("Wrote {}", path.display());
            }
        }
        Commands::Capture {
            angle,
            assets,
            pose_file,
            width,
            height,
            grid_size,
            spacing,
            out,
        } => {
            let scene = Scene::new(GridLayout {
                size: grid_size,
                spacing,
            })?;
            let snapshot = match &pose_file {
                Some(path) => PoseFile::new(path).load()?,
                None => None,
            };
            let store = match snapshot {
                Some(snapshot) => CameraStateStore::from_snapshot(&snapshot)?,
                None => CameraStateStore::new(),
            };
            let live = VirtualCamera::from_pose(&store.pose(), store.projection(), UVec2::new(width, height));
            capture(&scene, &assets, &angle, &live, &out)?;
        }
        Commands::Pose { action } => match action {
            PoseAction::Show { file } => {
                let Some(snapshot) = PoseFile::new(&file).load()? else {
                    println!("{}: no pose stored", file.display());
                    return Ok(());
                };
                print_snapshot(&snapshot);
            }
            PoseAction::Reset { file } => {
                let pose_file = PoseFile::new(&file);
                let mut store = match pose_file.load()? {
                    Some(snapshot) => CameraStateStore::from_snapshot(&snapshot)?,
                    None => CameraStateStore::new(),
                };
                store.reset_position();
                pose_file.save(&store.snapshot())?;
                println!("Reset {}", file.display());
                print_snapshot(&store.snapshot());
            }
        },
    }

    Ok(())
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let header = ktx2::Header::parse(&bytes)?;
    println!(
        "{}: vk_format={} supercompression={} {}x{} levels={}",
        path.display(),
        header.vk_format,
        header.supercompression_scheme,
        header.pixel_width,
        header.pixel_height,
        header.stored_levels()
    );
    let chain = ktx2::parse(&bytes)?;
    println!("format: {:?}", chain.format);
    for (i, level) in chain.levels.iter().enumerate() {
        println!(
            "  level {i}: {}x{} ({} bytes)",
            level.width,
            level.height,
            level.data.len()
        );
    }
    Ok(())
}

/// Load the texture to completion, refine it to the finest level and render
/// one still from `angle`.
fn capture(scene: &Scene, assets: &Path, angle: &str, live: &VirtualCamera, out: &Path) -> anyhow::Result<()> {
    let manifest_path = assets.join("manifest.json");
    let manifest = if manifest_path.exists() {
        AssetManifest::load(&manifest_path)?
    } else {
        AssetManifest::default()
    };

    let mut materials = MaterialBinder::new();
    for id in scene.ids() {
        materials.attach(id);
    }
    let loader = Arc::new(TextureLoader::new(Arc::new(FsSource::new(assets))));
    let mut pool = LocalPool::new();
    let mut texture = StreamedTexture::new(manifest, LodConfig::default());
    texture.request(loader, &pool.spawner())?;
    // File reads arrive from a reader thread; run the load tasks to completion.
    pool.run();

    // Resolve the load, then let every LOD step fall due at once.
    texture.poll(Duration::ZERO, &mut materials);
    texture.poll(Duration::from_secs(3600), &mut materials);
    if texture.is_loading() {
        bail!("texture load did not complete");
    }
    println!("{}", ViewerInspector::summary(scene, &materials, texture.resource()));

    let gpu = HeadlessGpu::new()?;
    let mut renderer = WgpuRenderer::new(&gpu.device, &gpu.queue, HeadlessGpu::FORMAT, live.viewport.x, live.viewport.y)?;
    renderer.set_scene(&gpu.queue, scene);
    let frame = materials.frame();
    renderer.apply_material(&gpu.device, &gpu.queue, &frame, |id| texture.chain_for(id));

    let capture = ViewCapture::new(CaptureConfig::default());
    let mut offscreen = OffscreenCapture::new(&gpu.device, &gpu.queue, &mut renderer);
    let image = capture.capture_named(angle, live, &mut offscreen, &mut NoControls)?;

    std::fs::create_dir_all(out)?;
    let path = out.join(image.file_name());
    std::fs::write(&path, image.bytes()).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), angle = %image.angle, "capture written");
    println!("Wrote {} ({}x{}, {} bytes)", path.display(), image.width, image.height, image.bytes().len());

    texture.teardown(&mut materials);
    renderer.release_all(&gpu.device);
    Ok(())
}

fn print_snapshot(snapshot: &CameraSnapshot) {
    let pose = snapshot.pose();
    println!("position: {:?}", pose.position.to_array());
    println!("rotation: {:?}", pose.rotation.to_array());
    println!("target:   {:?}", pose.target.to_array());
    println!("projection: {:?}", snapshot.projection());
}
