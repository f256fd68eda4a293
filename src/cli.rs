// ============================================================================
// Retouch CLI — headless batch editing via command-line arguments
// ============================================================================
//
// Usage examples:
//   retouch -i photo.jpg -o out.png --rotate 90 --contrast 20
//   retouch -i "shots/*.jpg" --output-dir done/ --effect sepia --effect pixelate:8
//   retouch -i scan.tiff --crop 10,10,800,600 --resize 400x300 -o small.tiff --tiff-compression lzw
//
// Every file runs through the same engine an interactive front-end drives:
// geometry + tone first, then resize, then crop, then effects in the order
// given.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::SelectionRect;
use crate::editor::Editor;
use crate::error::EditorError;
use crate::io::{SaveFormat, SaveOptions, TiffCompression};
use crate::ops::effects::Effect;
use crate::ops::tone::ToneState;
use crate::ops::transform::Interpolation;
use crate::settings::EditorSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Retouch headless image editor.
#[derive(Parser, Debug)]
#[command(
    name = "retouch",
    version,
    about = "Retouch headless batch image editor",
    long_about = "Apply rotations, flips, tone adjustments, resizing, cropping and\n\
                  catalog effects to image files without a GUI. Reads and writes\n\
                  PNG, JPEG, BMP and TIFF.\n\n\
                  Example:\n  \
                  retouch -i photo.jpg -o out.png --rotate 90 --warmth 20\n  \
                  retouch -i \"*.png\" --output-dir out/ --effect vintage-film"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    /// Files are written here with the original stem and the target format's extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Clockwise rotation in degrees: 90, 180 or 270.
    #[arg(long, value_name = "DEGREES", allow_negative_numbers = true)]
    pub rotate: Option<i32>,

    /// Mirror left-right (after rotation).
    #[arg(long)]
    pub flip_h: bool,

    /// Mirror top-bottom (after rotation and horizontal flip).
    #[arg(long)]
    pub flip_v: bool,

    /// Brightness offset, -100..100.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub brightness: i32,

    /// Contrast, -100..100 (each 50 doubles or halves).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub contrast: i32,

    /// Saturation offset, -100..100.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub saturation: i32,

    /// Unsharp-mask strength, 0..100.
    #[arg(long, default_value_t = 0)]
    pub sharpness: i32,

    /// Warmth, -50 (cool) .. 50 (warm).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub warmth: i32,

    /// Hue shift in degrees, -90..90.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub hue: i32,

    /// Resize to WIDTHxHEIGHT.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub resize: Option<(u32, u32)>,

    /// Resampling filter for --resize: nearest, bilinear, bicubic, lanczos3.
    #[arg(long, value_name = "FILTER")]
    pub filter: Option<Interpolation>,

    /// Crop to X,Y,WIDTH,HEIGHT (after resize).
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_crop)]
    pub crop: Option<SelectionRect>,

    /// Effect to apply, repeatable, in order: NAME or NAME:PARAM
    /// (e.g. sepia, pixelate:8, puzzle:3, hue-shift:-30, color-pop:#ff0000).
    #[arg(short, long, value_name = "NAME[:PARAM]")]
    pub effect: Vec<Effect>,

    /// Output format: png, jpeg, bmp, tiff.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<SaveFormat>,

    /// JPEG quality (1–100). Defaults to the saved setting.
    #[arg(short, long, value_name = "1-100", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// TIFF compression mode: none, lzw, deflate (default: none).
    #[arg(long, default_value = "none", value_name = "MODE")]
    pub tiff_compression: TiffCompression,

    /// Echo the session log to stderr and print per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    fn tone(&self) -> ToneState {
        ToneState {
            brightness: self.brightness,
            contrast: self.contrast,
            saturation: self.saturation,
            sharpness: self.sharpness,
            warmth: self.warmth,
            hue: self.hue,
        }
    }
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w = w.trim().parse::<u32>().map_err(|e| format!("width: {}", e))?;
    let h = h.trim().parse::<u32>().map_err(|e| format!("height: {}", e))?;
    Ok((w, h))
}

fn parse_crop(s: &str) -> Result<SelectionRect, String> {
    let parts: Vec<u32> = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("crop: {}", e))?;
    match parts[..] {
        [x, y, width, height] => Ok(SelectionRect { x, y, width, height }),
        _ => Err(format!("expected X,Y,W,H, got '{}'", s)),
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs, mut settings: EditorSettings) -> ExitCode {
    crate::logger::set_echo(args.verbose);

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let save_format = pick_format(args.format, args.output.as_deref());
    let options = SaveOptions {
        format: save_format,
        quality: args.quality.unwrap_or(settings.jpeg_quality),
        tiff_compression: args.tiff_compression,
    };
    if let Some(filter) = args.filter {
        settings.resize_filter = filter;
    }
    // Batch runs never undo; keep only the latest snapshot around.
    settings.max_undo_steps = 1;

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref(), save_format)
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        let mut editor = Editor::new(settings.clone());
        match run_one(&mut editor, &args, input_path, &output_path, options) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    editor: &mut Editor,
    args: &CliArgs,
    input: &Path,
    output: &Path,
    options: SaveOptions,
) -> Result<(), EditorError> {
    editor.load(input)?;

    // -- Step 1: Geometry + tone ------------------------------------------
    if let Some(deg) = args.rotate {
        editor.set_rotation(deg)?;
    }
    if args.flip_h {
        editor.flip_horizontal()?;
    }
    if args.flip_v {
        editor.flip_vertical()?;
    }
    editor.apply_tone(args.tone())?;

    // -- Step 2: Resize, then crop ----------------------------------------
    if let Some((w, h)) = args.resize {
        editor.resize(w, h)?;
    }
    if let Some(rect) = args.crop {
        editor.crop(rect)?;
    }

    // -- Step 3: Effects in order -----------------------------------------
    for effect in &args.effect {
        editor.apply_effect(*effect)?;
    }

    // -- Step 4: Save ----------------------------------------------------
    editor.save_with(output, options)
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand `--input` arguments into image files. An existing path is taken
/// as is; anything else is a glob whose matches are filtered down to files
/// with a readable image extension. Order is kept, duplicates dropped.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut inputs: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let literal = Path::new(pattern);
        let found: Vec<PathBuf> = if literal.exists() {
            vec![literal.to_path_buf()]
        } else {
            match glob::glob(pattern) {
                Ok(entries) => entries.flatten().filter(|p| is_image_file(p)).collect(),
                Err(e) => {
                    eprintln!("warning: invalid glob '{}': {}", pattern, e);
                    continue;
                }
            }
        };

        if found.is_empty() {
            eprintln!("warning: '{}' matched no image files.", pattern);
        }
        for path in found {
            if !inputs.contains(&path) {
                inputs.push(path);
            }
        }
    }

    inputs
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SaveFormat::from_extension(e).is_some())
}

/// `--format` wins; otherwise the output extension; otherwise PNG.
fn pick_format(format_arg: Option<SaveFormat>, output: Option<&Path>) -> SaveFormat {
    format_arg
        .or_else(|| output.and_then(|o| SaveFormat::from_path(o).ok()))
        .unwrap_or_default()
}

/// Where the edited copy of `input` is written: `--output` as given,
/// otherwise `<stem>.<ext>` in `--output-dir` or next to the input. A name
/// that would land on the input itself gets an `_edited` suffix, so the
/// source image is never overwritten.
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy();
    let dir = output_dir.or_else(|| input.parent()).unwrap_or(Path::new("."));
    let named = |suffix: &str| dir.join(format!("{}{}.{}", stem, suffix, format.extension()));

    let target = named("");
    Some(if target == input { named("_edited") } else { target })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_pipeline_flags() {
        let args = CliArgs::try_parse_from([
            "retouch", "-i", "a.png", "--rotate", "270", "--flip-h", "--contrast", "-20",
            "--resize", "640x480", "--crop", "0,0,100,50", "--effect", "sepia",
            "--effect", "pixelate:8", "--tiff-compression", "lzw",
        ])
        .unwrap();
        assert_eq!(args.rotate, Some(270));
        assert!(args.flip_h && !args.flip_v);
        assert_eq!(args.tone().contrast, -20);
        assert_eq!(args.resize, Some((640, 480)));
        assert_eq!(args.crop, Some(SelectionRect { x: 0, y: 0, width: 100, height: 50 }));
        assert_eq!(args.effect, vec![Effect::Sepia, Effect::Pixelate(8)]);
        assert_eq!(args.tiff_compression, TiffCompression::Lzw);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(parse_size("640*480").is_err());
        assert!(parse_crop("1,2,3").is_err());
        assert!(CliArgs::try_parse_from(["retouch", "-i", "a.png", "--effect", "nope"]).is_err());
        assert!(CliArgs::try_parse_from(["retouch", "-i", "a.png", "-q", "0"]).is_err());
    }

    #[test]
    fn output_path_rules() {
        let input = Path::new("dir/photo.png");
        assert_eq!(pick_format(None, Some(Path::new("x.JPG"))), SaveFormat::Jpeg);
        assert_eq!(pick_format(None, None), SaveFormat::Png);
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), SaveFormat::Tiff),
            Some(PathBuf::from("out/photo.tiff"))
        );
        assert_eq!(
            build_output_path(input, None, None, SaveFormat::Png),
            Some(PathBuf::from("dir/photo_edited.png"))
        );
        assert_eq!(
            build_output_path(input, None, None, SaveFormat::Jpeg),
            Some(PathBuf::from("dir/photo.jpg"))
        );
        // An output directory that is the input's own directory is guarded too.
        assert_eq!(
            build_output_path(input, None, Some(Path::new("dir")), SaveFormat::Png),
            Some(PathBuf::from("dir/photo_edited.png"))
        );
    }

    #[test]
    fn inputs_keep_only_image_files_once() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.JPG", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();
        let all = dir.path().join("*").to_string_lossy().into_owned();
        let a = dir.path().join("a.png").to_string_lossy().into_owned();

        let found = resolve_inputs(&[a.clone(), all, a]);
        let names: Vec<_> = found.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["a.png", "b.JPG"]);
        assert!(resolve_inputs(&[dir.path().join("*.gif").to_string_lossy().into_owned()]).is_empty());
    }

    #[test]
    fn batch_run_writes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png"] {
            let img = image::RgbImage::from_pixel(8, 6, image::Rgb([40, 80, 120]));
            img.save(dir.path().join(name)).unwrap();
        }
        let out = dir.path().join("out");
        let pattern = dir.path().join("*.png").to_string_lossy().into_owned();
        let args = CliArgs::try_parse_from([
            "retouch", "-i", &pattern, "--output-dir", out.to_str().unwrap(),
            "--rotate", "90", "--effect", "sepia", "--format", "bmp",
        ])
        .unwrap();
        assert_eq!(run(args, EditorSettings::default()), ExitCode::SUCCESS);
        let a = crate::io::load_image(&out.join("a.bmp")).unwrap();
        assert_eq!(a.dimensions(), (6, 8));
        assert!(out.join("b.bmp").exists());
    }
}
