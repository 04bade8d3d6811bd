//! Specifies the CLI and handles arg parsing

use clap::{Parser, ValueEnum};
use std::{
    fmt::{Debug, Display},
    ops::RangeBounds,
    path::PathBuf,
    str::FromStr,
};
use swatches::{DEFAULT_MAX_ITERATIONS, DEFAULT_SAMPLE_STRIDE};

/// Supported output formats for the final colors
#[derive(Copy, Clone, ValueEnum)]
pub enum FormatOutput {
    /// sRGB hexcode
    Hex,
    /// sRGB (r,g,b) triple
    Rgb,
    /// Whitespace with true color background
    Swatch,
}

/// Sort orders for the final colors
#[derive(Copy, Clone, ValueEnum)]
pub enum SortOutput {
    /// Ascending hue
    H,
    /// Ascending saturation
    S,
    /// Ascending lightness
    L,
    /// Descending number of pixels
    N,
}

/// Ways to colorize the output text
#[derive(Copy, Clone, ValueEnum)]
pub enum ColorizeOutput {
    /// Foreground
    Fg,
    /// Background
    Bg,
}

/// Extract the dominant colors of an image by performing k-means clustering on a sample of its pixels.
///
/// Mostly transparent pixels are ignored.
#[derive(Parser)]
#[command(version)]
pub struct Options {
    /// The path to the input image
    pub image: PathBuf,

    /// The (maximum) number of colors to find
    ///
    /// Fewer colors are printed if the image does not contain enough distinct colors.
    #[arg(short, default_value_t = 6, value_parser = clap::value_parser!(u8).range(2..=20))]
    pub k: u8,

    /// Only every n-th pixel of the image is sampled
    ///
    /// Higher values are faster but may miss small areas of color.
    /// A value of 1 samples every pixel.
    #[arg(short = 's', long, default_value_t = DEFAULT_SAMPLE_STRIDE, value_parser = parse_valid_stride)]
    pub sample_stride: usize,

    /// The maximum number of k-means iterations
    ///
    /// k-means stops early once the colors no longer change noticeably.
    /// You can use the --verbose option to see how many iterations were needed.
    #[arg(short = 'i', long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iter: u32,

    /// The maximum image size, in number of pixels, before a thumbnail is created
    ///
    /// Multiple pixels in the original image are interpolated to form a pixel in the thumbnail,
    /// so this may slightly shift the resulting colors.
    #[arg(short = 'p', long, default_value_t = u32::MAX)]
    pub max_pixels: u32,

    /// The format to print the colors in
    #[arg(short, long, default_value = "hex")]
    pub output: FormatOutput,

    /// Color the foreground or background for each printed color
    #[arg(short, long)]
    pub colorize: Option<ColorizeOutput>,

    /// The order to print the colors in
    ///
    /// The h, s, and l options refer to Okhsl component values and not the HSL color space.
    #[arg(long, default_value = "n")]
    pub sort: SortOutput,

    /// Reverse the printed order of the colors
    #[arg(short, long)]
    pub reverse: bool,

    /// Print the percentage of sampled pixels belonging to each color on a second line
    #[arg(long)]
    pub percentages: bool,

    /// The number of threads to use
    ///
    /// A value of 0 lets the thread pool pick the number of threads.
    #[cfg(feature = "threads")]
    #[arg(short, long, default_value_t = 0)]
    pub threads: u8,

    /// Print timing and other diagnostic information to stderr
    ///
    /// The RUST_LOG environment variable takes precedence over this option.
    #[arg(long)]
    pub verbose: bool,
}

/// Parse a value and ensure it is in the provided, valid range
fn parse_in_range<T>(s: &str, range: impl RangeBounds<T> + Debug) -> Result<T, String>
where
    T: FromStr + Display + PartialOrd,
    T::Err: Display,
{
    let value: T = s.parse().map_err(|e| format!("{e}"))?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in {range:?}"))
    }
}

/// Parse the sample stride and ensure it is >= `1`
fn parse_valid_stride(s: &str) -> Result<usize, String> {
    parse_in_range(s, 1..)
}
