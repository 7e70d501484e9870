// Command-line runner for the `waldo_blobs` library: loads one or more images,
// runs the blob detector over them and prints the blobs as text or JSON.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::info;
use serde::Serialize;

use waldo_blobs::core_modules::utils::image_helper::{load_frame, save_blob_overlay};
use waldo_blobs::parallel_pipeline::WorkerPool;
use waldo_blobs::{Blob, BlobConfig, BlobPipeline, Margins, MergeConfig, PixelKind, Rect, Threshold};

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Format {
    Binary,
    Grayscale,
    Rgb565,
}

impl From<Format> for PixelKind {
    fn from(format: Format) -> Self {
        match format {
            Format::Binary => PixelKind::Binary,
            Format::Grayscale => PixelKind::Grayscale,
            Format::Rgb565 => PixelKind::Rgb565,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "waldo_blobs")]
#[command(about = "Find connected regions of threshold-passing pixels in images")]
struct Cli {
    /// Images to scan. More than one is processed in parallel.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    #[arg(long, value_enum, default_value_t = Format::Grayscale)]
    format: Format,
    /// Luma cutoff used when converting to a binary image.
    #[arg(long, default_value_t = 128)]
    binary_cutoff: u8,
    /// `lmin,lmax` or `lmin,lmax,amin,amax,bmin,bmax`. Repeat for more passes;
    /// earlier thresholds win contested pixels.
    #[arg(long = "threshold", required = true)]
    thresholds: Vec<Threshold>,
    #[arg(long)]
    invert: bool,
    /// Scan window as `x,y,w,h`.
    #[arg(long, value_parser = parse_quad)]
    roi: Option<[i32; 4]>,
    #[arg(long, default_value_t = 1)]
    pixels_threshold: u32,
    #[arg(long, default_value_t = 1)]
    area_threshold: u64,
    #[arg(long, default_value_t = 1)]
    x_stride: usize,
    #[arg(long, default_value_t = 1)]
    y_stride: usize,
    #[arg(long)]
    merge: bool,
    /// Merge margins as `left,top,right,bottom`.
    #[arg(long, value_parser = parse_quad, requires = "merge")]
    margins: Option<[i32; 4]>,
    /// Scratch memory budget in bytes.
    #[arg(long)]
    scratch_limit: Option<usize>,
    /// Write a PNG with the blobs drawn over the input (single input only).
    #[arg(long)]
    overlay: Option<PathBuf>,
    #[arg(long)]
    json: bool,
}

fn parse_quad(text: &str) -> std::result::Result<[i32; 4], String> {
    let values = text
        .split(',')
        .map(|part| part.trim().parse::<i32>().map_err(|e| format!("{part:?}: {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    values
        .try_into()
        .map_err(|values: Vec<i32>| format!("expected 4 comma-separated values, got {}", values.len()))
}

impl Cli {
    fn blob_config(&self) -> BlobConfig {
        BlobConfig {
            roi: self.roi.map(|[x, y, w, h]| Rect::new(x, y, w, h)),
            x_stride: self.x_stride,
            y_stride: self.y_stride,
            invert: self.invert,
            area_threshold: self.area_threshold,
            pixels_threshold: self.pixels_threshold,
            merge: self.merge.then(|| MergeConfig {
                margins: self
                    .margins
                    .map(|[l, t, r, b]| Margins::new(l, t, r, b))
                    .unwrap_or_default(),
            }),
            scratch_limit: self.scratch_limit,
        }
    }
}

#[derive(Serialize)]
struct ImageReport<'a> {
    input: &'a PathBuf,
    blobs: &'a [Blob],
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.overlay.is_some() && cli.inputs.len() > 1 {
        bail!("--overlay takes a single input, got {}", cli.inputs.len());
    }

    let kind = PixelKind::from(cli.format);
    let pipeline = BlobPipeline::new(
        cli.blob_config(),
        cli.thresholds.iter().map(|t| t.normalized()).collect(),
    )?;

    let frames = cli
        .inputs
        .iter()
        .map(|path| {
            load_frame(path, kind, cli.binary_cutoff).with_context(|| format!("loading {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let results: Vec<Vec<Blob>> = if frames.len() == 1 {
        vec![pipeline.process_frame(&frames[0])?]
    } else {
        let pool = WorkerPool::new(pipeline.clone());
        let reports = pool.process_batch(frames.clone()).await;
        pool.shutdown().await;
        reports
            .into_iter()
            .zip(&cli.inputs)
            .map(|(report, path)| {
                let report = report.with_context(|| format!("scanning {}", path.display()))?;
                info!("{}: {} blob(s) in {:?}", path.display(), report.blobs.len(), report.elapsed);
                Ok(report.blobs)
            })
            .collect::<Result<_>>()?
    };

    if let Some(path) = &cli.overlay {
        save_blob_overlay(path, &frames[0], &results[0])
            .with_context(|| format!("writing overlay {}", path.display()))?;
        info!("overlay written to {}", path.display());
    }

    if cli.json {
        let reports: Vec<ImageReport> = cli
            .inputs
            .iter()
            .zip(&results)
            .map(|(input, blobs)| ImageReport { input, blobs })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for (input, blobs) in cli.inputs.iter().zip(&results) {
            println!("{}: {} blob(s)", input.display(), blobs.len());
            for blob in blobs {
                println!(
                    "  rect={} pixels={} perimeter={} centroid=({}, {}) rotation={:.4} code={:#b} count={}",
                    blob.rect,
                    blob.pixels,
                    blob.perimeter,
                    blob.centroid.x,
                    blob.centroid.y,
                    blob.rotation,
                    blob.code,
                    blob.count
                );
            }
        }
    }

    Ok(())
}
