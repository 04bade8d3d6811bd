//! Extract the dominant colors of an image by performing k-means clustering on a sample of its pixels.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::unreadable_literal
)]

mod cli;

#[allow(clippy::wildcard_imports)]
use cli::*;

use std::{
    fmt::{self, Display},
    path::Path,
    process::ExitCode,
    time::Instant,
};

use clap::Parser;
use colored::Colorize;
use image::{DynamicImage, GenericImageView};
use palette::{FromColor, Okhsl, Oklab, Srgb};
use swatches::ClusterResult;
use tracing::{debug, warn};
use tracing_subscriber::{fmt as log_fmt, prelude::*, EnvFilter};

/// Record the running time of an expression and log the elapsed time
macro_rules! time {
    ($name: literal, $func_call: expr) => {{
        let start = Instant::now();
        let result = $func_call;
        debug!("{} took {}ms", $name, start.elapsed().as_millis());
        result
    }};
}

/// Error cases for setting up and loading an image
#[derive(Debug)]
enum Error {
    /// Failed to read or decode the image file
    ImageLoad(image::ImageError),
    /// Failed to read the avif file
    #[cfg(feature = "avif")]
    AvifRead(std::io::Error),
    /// Failed to decode the avif file
    #[cfg(feature = "avif")]
    AvifDecode(libavif_image::Error),
    /// Failed to build the thread pool
    #[cfg(feature = "threads")]
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ImageLoad(e) => write!(f, "Failed to load the image file: {e}"),
            #[cfg(feature = "avif")]
            Error::AvifRead(e) => write!(f, "Failed to read the avif file: {e}"),
            #[cfg(feature = "avif")]
            Error::AvifDecode(e) => write!(f, "Failed to decode the avif file: {e}"),
            #[cfg(feature = "threads")]
            Error::ThreadPool(e) => write!(f, "Failed to start the thread pool: {e}"),
        }
    }
}

fn main() -> ExitCode {
    let options = Options::parse();

    init_logging(options.verbose);

    let result = run_generate_and_print_palette(&options);

    // Returning Result<_> uses Debug printing instead of Display
    if let Err(e) = result {
        eprintln!("{e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// The log filter used when RUST_LOG is not set
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,swatches=debug"
    } else {
        "warn"
    }
}

/// Install a stderr logger, keeping stdout for the palette itself
fn init_logging(verbose: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            log_fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();
}

/// Builds a thread pool and then runs `generate_and_print_palette`
#[cfg(feature = "threads")]
fn run_generate_and_print_palette(options: &Options) -> Result<(), Error> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(usize::from(options.threads))
        .build()
        .map_err(Error::ThreadPool)?;

    debug!("Using {} threads", pool.current_num_threads());

    pool.install(|| generate_and_print_palette(options))
}

/// Runs `generate_and_print_palette` on a single thread
#[cfg(not(feature = "threads"))]
fn run_generate_and_print_palette(options: &Options) -> Result<(), Error> {
    generate_and_print_palette(options)
}

/// Load an image, extract its palette, and print the result using the given options
fn generate_and_print_palette(options: &Options) -> Result<(), Error> {
    // Input
    let img = time!("Image loading", load_image(&options.image))?;
    let img = generate_thumbnail(img, options.max_pixels);
    let img = img.into_rgba8();

    // Processing
    let samples = time!(
        "Sampling",
        swatches::sample_image(&img, options.sample_stride)
    );

    debug!(
        "Sampled {} opaque pixels from {}x{} pixels",
        samples.len(),
        img.width(),
        img.height()
    );

    if samples.is_empty() {
        warn!(
            "No opaque pixels were sampled from {}",
            options.image.display()
        );
        return Ok(());
    }

    let result = time!(
        "k-means",
        swatches::run(&samples, options.k, options.max_iter)
    );

    debug!(
        "k-means found {} colors in {} iterations",
        result.clusters.len(),
        result.iterations
    );

    // Output
    let total = swatches::total_count(&result.clusters);
    let clusters = sorted_clusters(result.clusters, options);
    print_palette(&clusters, total, options);

    Ok(())
}

/// Load the image at the given path
#[cfg(feature = "avif")]
fn load_image(path: &Path) -> Result<DynamicImage, Error> {
    if path.extension().map_or(false, |ext| ext == "avif") {
        let buf = std::fs::read(path).map_err(Error::AvifRead)?;
        libavif_image::read(&buf).map_err(Error::AvifDecode)
    } else {
        image::open(path).map_err(Error::ImageLoad)
    }
}

/// Load the image at the given path
#[cfg(not(feature = "avif"))]
fn load_image(path: &Path) -> Result<DynamicImage, Error> {
    image::open(path).map_err(Error::ImageLoad)
}

/// Create a thumbnail with at most `max_pixels` pixels if the image has more than `max_pixels` pixels
fn generate_thumbnail(image: DynamicImage, max_pixels: u32) -> DynamicImage {
    // The number of pixels should be < u64::MAX, since image dimensions are (u32, u32)
    let (width, height) = image.dimensions();
    let pixels = u64::from(width) * u64::from(height);
    if pixels <= u64::from(max_pixels) {
        debug!("Skipping image thumbnail since pixels was below max pixels");
        image
    } else {
        // (u64 as f64) only gives inaccurate results for very large u64
        #[allow(clippy::cast_precision_loss)]
        let scale = (f64::from(max_pixels) / pixels as f64).sqrt();

        // multiplying by a positive factor < 1
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (thumb_width, thumb_height) = (
            (f64::from(width) * scale) as u32,
            (f64::from(height) * scale) as u32,
        );

        debug!("Creating a thumbnail with dimensions {thumb_width}x{thumb_height}");

        time!(
            "Image thumbnail",
            image.thumbnail(thumb_width, thumb_height)
        )
    }
}

/// Convert an sRGB color to [`Okhsl`] for sorting
fn okhsl(color: Srgb<u8>) -> Okhsl {
    let oklab: Oklab = Oklab::from_color(color.into_linear::<f32>());
    Okhsl::from_color(oklab)
}

/// Sort the clusters by the given metric.
fn sorted_clusters(clusters: Vec<ClusterResult>, options: &Options) -> Vec<ClusterResult> {
    let mut clusters = clusters
        .into_iter()
        .map(|cluster| (okhsl(cluster.color), cluster))
        .collect::<Vec<_>>();

    match options.sort {
        SortOutput::H => clusters.sort_by(|(x, _), (y, _)| {
            f32::total_cmp(&x.hue.into_positive_degrees(), &y.hue.into_positive_degrees())
        }),
        SortOutput::S => {
            clusters.sort_by(|(x, _), (y, _)| f32::total_cmp(&x.saturation, &y.saturation));
        }
        SortOutput::L => {
            clusters.sort_by(|(x, _), (y, _)| f32::total_cmp(&x.lightness, &y.lightness));
        }
        SortOutput::N => clusters.sort_by_key(|(_, cluster)| std::cmp::Reverse(cluster.count)),
    }

    if options.reverse {
        clusters.reverse();
    }

    clusters.into_iter().map(|(_, cluster)| cluster).collect()
}

/// Print the given clusters based off the provided options
fn print_palette(clusters: &[ClusterResult], total: usize, options: &Options) {
    match options.output {
        FormatOutput::Hex => color_format_print(clusters, options, |cluster| cluster.hex.clone()),

        FormatOutput::Rgb => color_format_print(clusters, options, |cluster| {
            let Srgb { red, green, blue, .. } = cluster.color;
            format!("({red},{green},{blue})")
        }),

        FormatOutput::Swatch => print_colors(clusters, "", |cluster| {
            let Srgb { red, green, blue, .. } = cluster.color;
            "   ".on_truecolor(red, green, blue).to_string()
        }),
    }

    if options.percentages {
        println!("{}", format_percentages(clusters, total));
    }
}

/// Format the share of `total` for each cluster
fn format_percentages(clusters: &[ClusterResult], total: usize) -> String {
    clusters
        .iter()
        .map(|cluster| format!("{:.1}%", cluster.percentage(total)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print a line of colors using the given format
fn print_colors(
    clusters: &[ClusterResult],
    delimiter: &str,
    format: impl Fn(&ClusterResult) -> String,
) {
    println!(
        "{}",
        clusters.iter().map(format).collect::<Vec<_>>().join(delimiter)
    );
}

/// Format, colorize, and then print the text for all colors
fn color_format_print(
    clusters: &[ClusterResult],
    options: &Options,
    format: impl Fn(&ClusterResult) -> String,
) {
    match options.colorize {
        Some(ColorizeOutput::Fg) => print_colors(clusters, " ", |cluster| {
            let Srgb { red, green, blue, .. } = cluster.color;
            format(cluster).truecolor(red, green, blue).to_string()
        }),

        Some(ColorizeOutput::Bg) => print_colors(clusters, " ", |cluster| {
            let Srgb { red, green, blue, .. } = cluster.color;
            format(cluster).on_truecolor(red, green, blue).to_string()
        }),

        None => print_colors(clusters, " ", format),
    }
}
