// ============================================================================
// AintPro CLI: headless canvas editing via command-line arguments
// ============================================================================
//
// Usage examples:
//   aintpro -i photo.png --op rotate:90 --op flip:h -o result.png
//   aintpro -i "shots/*.jpg" --op crop --output-dir cropped/ --format png
//   aintpro --new 320x200 --op fill:10,10,#ff8800 --op shape:star:40,40,120,120 -o star.png
//   aintpro --new 64x64 --op stroke:brush:4,4;60,60 --op undo -o blank.png
//
// Every op runs through an EditorSession, so undo/redo in the op list behave
// exactly like the interactive editor.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::Rgba;

use crate::components::colors::parse_hex_color;
use crate::components::tools::Tool;
use crate::error::CanvasError;
use crate::io::{load_image_file, SaveFormat};
use crate::ops::transform::{CropRect, FlipAxis};
use crate::session::{EditorSession, PointerEvent};
use crate::settings::EngineSettings;
use crate::{log_err, log_info, logger};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// AintPro headless canvas editor.
#[derive(Parser, Debug)]
#[command(
    name = "aintpro",
    about = "AintPro headless canvas editor",
    long_about = "Apply canvas operations (strokes, shapes, fills, rotate, flip, crop,\n\
                  resize, undo/redo) to image files or a new blank canvas and save the\n\
                  result as PNG, JPEG, WEBP, BMP or TGA.\n\n\
                  Ops:\n  \
                  rotate:DEG  flip:h|v  crop  crop:X,Y,W,H  resize:W,H  clear\n  \
                  fill:X,Y[,#RRGGBB]  shape:KIND:X0,Y0,X1,Y1  stroke:TOOL:X,Y;X,Y;...\n  \
                  undo  redo"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, num_args = 1.., conflicts_with = "new")]
    pub input: Vec<String>,

    /// Start from a blank canvas of the given size instead of an input file.
    #[arg(long, value_name = "WxH")]
    pub new: Option<String>,

    /// Canvas operation, applied in order. Repeatable.
    #[arg(long = "op", value_name = "OP")]
    pub ops: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, webp, bmp, tga.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Primary colour (#rgb, #rrggbb or #rrggbbaa).
    #[arg(long, value_name = "HEX")]
    pub color: Option<String>,

    /// Secondary colour, used by the eraser, clear and resize.
    #[arg(long, value_name = "HEX")]
    pub secondary: Option<String>,

    /// Brush / stroke size in pixels.
    #[arg(long, value_name = "PX")]
    pub size: Option<f32>,

    /// Settings file to read defaults from (key=value lines).
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Write a session log to this path.
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print per-file timing and echo log lines to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Canvas operations
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum CanvasOp {
    Rotate(f32),
    Flip(FlipAxis),
    /// `None` crops with the default inset.
    Crop(Option<CropRect>),
    Resize(u32, u32),
    Clear,
    Fill {
        x: f32,
        y: f32,
        color: Option<Rgba<u8>>,
    },
    Shape {
        tool: Tool,
        from: (f32, f32),
        to: (f32, f32),
    },
    Stroke {
        tool: Tool,
        points: Vec<(f32, f32)>,
    },
    Undo,
    Redo,
}

/// Parse one `--op` argument.
pub fn parse_op(spec: &str) -> Result<CanvasOp, String> {
    let (name, rest) = match spec.split_once(':') {
        Some((n, r)) => (n.trim().to_ascii_lowercase(), Some(r.trim())),
        None => (spec.trim().to_ascii_lowercase(), None),
    };

    match (name.as_str(), rest) {
        ("rotate", Some(deg)) => deg
            .parse::<f32>()
            .map(CanvasOp::Rotate)
            .map_err(|_| format!("bad rotation angle '{}'", deg)),
        ("flip", Some(axis)) => match axis.to_ascii_lowercase().as_str() {
            "h" | "horizontal" => Ok(CanvasOp::Flip(FlipAxis::Horizontal)),
            "v" | "vertical" => Ok(CanvasOp::Flip(FlipAxis::Vertical)),
            other => Err(format!("bad flip axis '{}' (expected h or v)", other)),
        },
        ("crop", None) => Ok(CanvasOp::Crop(None)),
        ("crop", Some(args)) => {
            let n = parse_numbers::<u32>(args, 4)?;
            Ok(CanvasOp::Crop(Some(CropRect::new(n[0], n[1], n[2], n[3]))))
        }
        ("resize", Some(args)) => {
            let n = parse_numbers::<u32>(args, 2)?;
            Ok(CanvasOp::Resize(n[0], n[1]))
        }
        ("clear", None) => Ok(CanvasOp::Clear),
        ("fill", Some(args)) => {
            let mut parts = args.splitn(3, ',');
            let x = parse_number::<f32>(parts.next())?;
            let y = parse_number::<f32>(parts.next())?;
            let color = parts
                .next()
                .map(|c| parse_hex_color(c).map_err(|e| e.to_string()))
                .transpose()?;
            Ok(CanvasOp::Fill { x, y, color })
        }
        ("shape", Some(args)) => {
            let (kind, coords) = args
                .split_once(':')
                .ok_or_else(|| "shape op needs KIND:X0,Y0,X1,Y1".to_string())?;
            let tool = Tool::from_name(kind)
                .filter(|t| t.shape_kind().is_some())
                .ok_or_else(|| format!("unknown shape '{}'", kind))?;
            let n = parse_numbers::<f32>(coords, 4)?;
            Ok(CanvasOp::Shape {
                tool,
                from: (n[0], n[1]),
                to: (n[2], n[3]),
            })
        }
        ("stroke", Some(args)) => {
            let (kind, coords) = args
                .split_once(':')
                .ok_or_else(|| "stroke op needs TOOL:X,Y;X,Y;...".to_string())?;
            let tool = Tool::from_name(kind)
                .filter(|t| t.is_stroke())
                .ok_or_else(|| format!("unknown stroke tool '{}'", kind))?;
            let points = coords
                .split(';')
                .filter(|p| !p.trim().is_empty())
                .map(|p| parse_numbers::<f32>(p, 2).map(|n| (n[0], n[1])))
                .collect::<Result<Vec<_>, _>>()?;
            if points.is_empty() {
                return Err("stroke op needs at least one point".to_string());
            }
            Ok(CanvasOp::Stroke { tool, points })
        }
        ("undo", None) => Ok(CanvasOp::Undo),
        ("redo", None) => Ok(CanvasOp::Redo),
        _ => Err(format!("unknown op '{}'", spec)),
    }
}

fn parse_number<T: std::str::FromStr>(part: Option<&str>) -> Result<T, String> {
    let part = part.ok_or_else(|| "missing number".to_string())?.trim();
    part.parse::<T>().map_err(|_| format!("bad number '{}'", part))
}

fn parse_numbers<T: std::str::FromStr>(args: &str, count: usize) -> Result<Vec<T>, String> {
    let values = args
        .split(',')
        .map(|p| parse_number::<T>(Some(p)))
        .collect::<Result<Vec<T>, String>>()?;
    if values.len() != count {
        return Err(format!("expected {} numbers, got {} in '{}'", count, values.len(), args));
    }
    Ok(values)
}

/// Apply one op to the session, driving pointer gestures where the op is a tool.
pub fn apply_op(session: &mut EditorSession, op: &CanvasOp) -> Result<(), CanvasError> {
    match op {
        CanvasOp::Rotate(deg) => session.rotate(*deg),
        CanvasOp::Flip(axis) => session.flip(*axis),
        CanvasOp::Crop(Some(rect)) => session.crop(*rect),
        CanvasOp::Crop(None) => session.crop_default(),
        CanvasOp::Resize(w, h) => session.resize(*w, *h),
        CanvasOp::Clear => session.clear(),
        CanvasOp::Fill { x, y, color } => {
            session.set_tool(Tool::Fill)?;
            let saved = session.colors();
            if let Some(c) = color {
                let mut colors = saved;
                colors.primary = *c;
                session.set_colors(colors);
            }
            let result = session.pointer_down(PointerEvent::primary(*x, *y));
            session.set_colors(saved);
            result.map(|_| ())
        }
        CanvasOp::Shape { tool, from, to } => {
            session.set_tool(*tool)?;
            session.pointer_down(PointerEvent::primary(from.0, from.1))?;
            session.pointer_move(PointerEvent::primary(to.0, to.1));
            session.pointer_up(PointerEvent::primary(to.0, to.1)).map(|_| ())
        }
        CanvasOp::Stroke { tool, points } => {
            session.set_tool(*tool)?;
            let Some((&first, rest)) = points.split_first() else { return Ok(()) };
            session.pointer_down(PointerEvent::primary(first.0, first.1))?;
            for p in rest {
                session.pointer_move(PointerEvent::primary(p.0, p.1));
            }
            let last = rest.last().copied().unwrap_or(first);
            session.pointer_up(PointerEvent::primary(last.0, last.1)).map(|_| ())
        }
        CanvasOp::Undo => session.undo().map(|_| ()),
        CanvasOp::Redo => session.redo().map(|_| ()),
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    if let Some(path) = &args.log {
        logger::init_at(path);
    }
    logger::set_echo_stderr(args.verbose);
    logger::set_min_level(if args.verbose { logger::Level::Debug } else { logger::Level::Info });

    let ops = match args.ops.iter().map(|s| parse_op(s)).collect::<Result<Vec<_>, _>>() {
        Ok(ops) => ops,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings = match build_settings(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let save_format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // -- Blank canvas mode ---------------------------------------------------
    if let Some(size) = &args.new {
        let Some(output) = args.output.as_deref() else {
            eprintln!("error: --new requires --output.");
            return ExitCode::FAILURE;
        };
        let result = parse_size(size).and_then(|(w, h)| {
            let settings = EngineSettings {
                canvas_width: w,
                canvas_height: h,
                ..settings.clone()
            };
            let session = EditorSession::new(&settings).map_err(|e| e.to_string())?;
            run_session(session, &ops, output, save_format, args.quality)
        });
        return match result {
            Ok(()) => {
                if args.verbose {
                    println!("  -> {}", output.display());
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // Resolve glob patterns / literal paths -> concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s). Use --input or --new.");
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

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &settings, &ops, save_format, args.quality) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
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
    input: &Path,
    output: &Path,
    settings: &EngineSettings,
    ops: &[CanvasOp],
    format: SaveFormat,
    quality: u8,
) -> Result<(), String> {
    let image = load_image_file(input).map_err(|e| format!("load failed: {}", e))?;
    let session = EditorSession::from_image(image, settings).map_err(|e| e.to_string())?;
    run_session(session, ops, output, format, quality)
}

fn run_session(
    mut session: EditorSession,
    ops: &[CanvasOp],
    output: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), String> {
    for op in ops {
        apply_op(&mut session, op).map_err(|e| format!("{:?} failed: {}", op, e))?;
    }
    // Close any half-finished text or polygon before export.
    session.set_tool(Tool::default()).map_err(|e| e.to_string())?;
    session
        .save(output, format, quality)
        .map_err(|e| format!("save failed: {}", e))?;
    log_info!("{} ops applied, {} history entries", ops.len(), session.history().len());
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn build_settings(args: &CliArgs) -> Result<EngineSettings, String> {
    let mut settings = match &args.settings {
        Some(path) => EngineSettings::load_from(path),
        None => EngineSettings::default(),
    };
    if let Some(hex) = &args.color {
        settings.primary_color = parse_hex_color(hex).map_err(|e| e.to_string())?;
    }
    if let Some(hex) = &args.secondary {
        settings.secondary_color = parse_hex_color(hex).map_err(|e| e.to_string())?;
    }
    if let Some(size) = args.size {
        settings.brush_size = size.clamp(1.0, 100.0);
    }
    Ok(settings)
}

/// Parse `WxH` (also accepts `X` or `,` as separator).
fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let lower = s.to_ascii_lowercase();
    let (w, h) = lower
        .split_once('x')
        .or_else(|| lower.split_once(','))
        .ok_or_else(|| format!("bad canvas size '{}' (expected WxH)", s))?;
    let w = parse_number::<u32>(Some(w))?;
    let h = parse_number::<u32>(Some(h))?;
    Ok((w, h))
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the [`SaveFormat`] from the `--format` string or infer it from the
/// output file extension. Unknown extensions fall back to PNG; an unknown
/// `--format` is an error.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<SaveFormat, String> {
    if let Some(f) = format_arg {
        return SaveFormat::from_name(f).ok_or_else(|| format!("unsupported format '{}'", f));
    }

    Ok(output
        .and_then(|out| out.extension())
        .and_then(|e| e.to_str())
        .and_then(SaveFormat::from_name)
        .unwrap_or(SaveFormat::Png))
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
///    (appends `_out` to stem if it would collide with the input path)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    // Avoid silent overwrite of the input
    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transform_ops() {
        assert_eq!(parse_op("rotate:90").unwrap(), CanvasOp::Rotate(90.0));
        assert_eq!(parse_op("flip:V").unwrap(), CanvasOp::Flip(FlipAxis::Vertical));
        assert_eq!(parse_op("crop").unwrap(), CanvasOp::Crop(None));
        assert_eq!(
            parse_op("crop:1,2,3,4").unwrap(),
            CanvasOp::Crop(Some(CropRect::new(1, 2, 3, 4)))
        );
        assert_eq!(parse_op("resize:640,480").unwrap(), CanvasOp::Resize(640, 480));
        assert_eq!(parse_op("undo").unwrap(), CanvasOp::Undo);
    }

    #[test]
    fn parses_tool_ops() {
        assert_eq!(
            parse_op("fill:3,4,#ff0000").unwrap(),
            CanvasOp::Fill {
                x: 3.0,
                y: 4.0,
                color: Some(Rgba([255, 0, 0, 255]))
            }
        );
        assert_eq!(
            parse_op("shape:star:0,0,10,10").unwrap(),
            CanvasOp::Shape {
                tool: Tool::Star,
                from: (0.0, 0.0),
                to: (10.0, 10.0)
            }
        );
        assert_eq!(
            parse_op("stroke:pencil:1,1;5,5").unwrap(),
            CanvasOp::Stroke {
                tool: Tool::Pencil,
                points: vec![(1.0, 1.0), (5.0, 5.0)]
            }
        );
    }

    #[test]
    fn rejects_bad_ops() {
        assert!(parse_op("rotate").is_err());
        assert!(parse_op("flip:x").is_err());
        assert!(parse_op("crop:1,2,3").is_err());
        assert!(parse_op("shape:pencil:0,0,1,1").is_err());
        assert!(parse_op("stroke:rect:0,0").is_err());
        assert!(parse_op("explode").is_err());
    }

    #[test]
    fn format_from_flag_or_extension() {
        assert_eq!(parse_format(Some("JPG"), None).unwrap(), SaveFormat::Jpeg);
        assert!(parse_format(Some("tiff"), None).is_err());
        assert_eq!(parse_format(None, Some(Path::new("a/b.webp"))).unwrap(), SaveFormat::Webp);
        assert_eq!(parse_format(None, Some(Path::new("a/b.xyz"))).unwrap(), SaveFormat::Png);
        assert_eq!(parse_format(None, None).unwrap(), SaveFormat::Png);
    }

    #[test]
    fn output_path_avoids_overwriting_input() {
        let p = build_output_path(Path::new("dir/pic.png"), None, None, SaveFormat::Png).unwrap();
        assert_eq!(p, Path::new("dir").join("pic_out.png"));
        let p = build_output_path(Path::new("dir/pic.png"), None, Some(Path::new("out")), SaveFormat::Jpeg).unwrap();
        assert_eq!(p, Path::new("out").join("pic.jpg"));
    }

    #[test]
    fn canvas_size_parsing() {
        assert_eq!(parse_size("320x200").unwrap(), (320, 200));
        assert_eq!(parse_size("32X20").unwrap(), (32, 20));
        assert!(parse_size("320").is_err());
    }

    #[test]
    fn ops_run_through_session() {
        let settings = EngineSettings {
            canvas_width: 20,
            canvas_height: 20,
            ..EngineSettings::default()
        };
        let mut session = EditorSession::new(&settings).unwrap();
        apply_op(&mut session, &parse_op("fill:1,1,#00ff00").unwrap()).unwrap();
        assert_eq!(session.read_pixel(19, 19), Some(Rgba([0, 255, 0, 255])));
        // Fill colour override does not stick.
        assert_eq!(session.colors().primary, Rgba([0, 0, 0, 255]));
        apply_op(&mut session, &CanvasOp::Undo).unwrap();
        assert_eq!(session.read_pixel(19, 19), Some(Rgba([255, 255, 255, 255])));
        apply_op(&mut session, &CanvasOp::Resize(30, 10)).unwrap();
        assert_eq!(session.dimensions(), (30, 10));
    }
}
