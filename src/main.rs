//! DocScan - document scanning from the command line
//!
//! Runs the detection loop over still images, rectifies a photo with
//! detected or hand-picked corners, and tags recognized text.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use docscan::analysis::{TagClassifier, TagTable};
use docscan::capture::{CapturedFrame, DetectionSession, StaticFrames};
use docscan::config::{self, AppConfig};
use docscan::editor::PhotoItem;
use docscan::shared::DetectionEvent;
use docscan::storage;
use docscan::vision::{ContourDetector, CornerSet, FilterKind, PerspectiveRectifier, Point};

/// DocScan - document edge detection and classification
#[derive(Parser, Debug)]
#[command(name = "docscan")]
#[command(about = "Detect, rectify and classify photographed documents")]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the detection loop over images as if they were consecutive frames
    Detect {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Rectify a photo and write the result as PNG
    Rectify {
        image: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Corners as x1,y1,x2,y2,x3,y3,x4,y4 (TL, TR, BR, BL)
        #[arg(long, value_parser = parse_corners)]
        corners: Option<CornerSet>,

        /// original, enhance, sharpen, mono, scan or remove_shadow
        #[arg(short, long, default_value = "original")]
        filter: FilterKind,
    },
    /// Classify the text in a file into document tags
    Tag {
        text: PathBuf,

        /// Tag table JSON (defaults to the user's table, else the built-in one)
        #[arg(long)]
        tags: Option<PathBuf>,

        /// Maximum number of tags
        #[arg(long)]
        max: Option<usize>,

        /// Print per-category keyword hits and scores
        #[arg(long)]
        explain: bool,
    },
}

fn parse_corners(s: &str) -> std::result::Result<CornerSet, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("{}: {}", v, e)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if values.len() != 8 {
        return Err(format!("expected 8 numbers, got {}", values.len()));
    }
    let points: Vec<Point> = values.chunks(2).map(|c| Point::new(c[0], c[1])).collect();
    CornerSet::from_slice(&points).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = config::load_or_default(args.config.as_deref())?;

    match args.command {
        Command::Detect { images } => run_detect(&config, &images).await,
        Command::Rectify {
            image,
            output,
            corners,
            filter,
        } => run_rectify(&config, &image, &output, corners, filter).await,
        Command::Tag {
            text,
            tags,
            max,
            explain,
        } => run_tag(&config, &text, tags.as_deref(), max, explain),
    }
}

fn load_image(path: &Path) -> Result<image::RgbaImage> {
    let img = image::open(path).with_context(|| format!("Failed to open image {}", path.display()))?;
    Ok(img.to_rgba8())
}

async fn run_detect(config: &AppConfig, images: &[PathBuf]) -> Result<()> {
    let frames = images.iter().map(|p| load_image(p)).collect::<Result<Vec<_>>>()?;
    info!("Running detection over {} frames", frames.len());

    let session = DetectionSession::new(
        config.detection.clone(),
        config.stabilizer.clone(),
        config.capture.clone(),
    );
    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = session.spawn(StaticFrames::from_images(frames), tx);
    let summary = handle.join().await?;

    for event in rx.try_iter() {
        match event {
            DetectionEvent::Overlay {
                frame_index,
                corners: Some(c),
            } => {
                let p = c.points();
                println!(
                    "frame {}: ({:.1},{:.1}) ({:.1},{:.1}) ({:.1},{:.1}) ({:.1},{:.1})",
                    frame_index,
                    p[0].x, p[0].y, p[1].x, p[1].y, p[2].x, p[2].y, p[3].x, p[3].y
                );
            }
            DetectionEvent::Overlay { frame_index, corners: None } => {
                println!("frame {}: no document", frame_index);
            }
            DetectionEvent::Error(e) => println!("error: {}", e),
            DetectionEvent::Stopped => {}
        }
    }

    println!(
        "{} frames, {} detections, {} errors",
        summary.frames, summary.detections, summary.errors
    );
    Ok(())
}

async fn run_rectify(
    config: &AppConfig,
    image: &Path,
    output: &Path,
    corners: Option<CornerSet>,
    filter: FilterKind,
) -> Result<()> {
    let frame = CapturedFrame::from_image(load_image(image)?);

    let explicit = corners;
    let corners = match corners {
        Some(c) => Some(c),
        None => {
            let detector = ContourDetector::with_config(config.detection.clone());
            let detected = tokio::task::spawn_blocking({
                let frame = frame.clone();
                move || detector.detect_frame(&frame)
            })
            .await??;
            detected.corners().copied()
        }
    };
    if corners.is_none() {
        info!("No document found, using the full frame");
    }

    let rectifier = PerspectiveRectifier::with_config(config.rectify.clone());
    let mut photo = match explicit {
        // Hand-picked corners must rectify; detected ones fall back to the raw frame
        Some(c) => {
            let mut photo = PhotoItem::new(frame.to_image()?, c);
            photo
                .rectify_with(c, &rectifier)
                .with_context(|| format!("Could not rectify {} with the given corners", image.display()))?;
            photo
        }
        None => PhotoItem::capture(&frame, corners, &rectifier)?,
    };
    photo.set_filter(filter);

    if photo.rectified().is_none() && photo.filtered().is_none() {
        println!("No transform needed, {} left as is", image.display());
        return Ok(());
    }

    let out = photo.display_image();
    out.save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {}x{} image to {}", out.width(), out.height(), output.display());
    Ok(())
}

fn run_tag(config: &AppConfig, text: &Path, tags: Option<&Path>, max: Option<usize>, explain: bool) -> Result<()> {
    let content = std::fs::read_to_string(text).with_context(|| format!("Failed to read {}", text.display()))?;

    let table = match tags {
        Some(path) => storage::load_tag_table(path)?,
        None => match storage::default_tag_table_path() {
            Ok(path) => storage::load_tag_table_or_builtin(&path),
            Err(_) => TagTable::builtin(),
        },
    };
    let classifier = TagClassifier::with_config(table, config.classifier.clone(), config.matcher.clone());

    if explain {
        for score in classifier.score_tags(&content) {
            println!(
                "{:<20} score {:.3}  avg weight {:.3}  exact {}  hits {}",
                score.id,
                score.score,
                score.average_weight,
                score.exact_hits,
                score.hits.join(" ")
            );
        }
        for (tag, hits) in classifier.explain(&content) {
            for hit in hits {
                println!("  {:<18} {:?} {:.3} \"{}\"", tag, hit.match_type, hit.score, hit.keyword);
            }
        }
    }

    let max_results = max.unwrap_or(classifier.config().max_results);
    let tags = classifier.generate_tags_with(&content, &classifier.config().default_tags, max_results);
    println!("{}", tags.join(", "));
    Ok(())
}
