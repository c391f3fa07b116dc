use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use fashion_embed::clip::download;
use fashion_embed::config::Config;
use fashion_embed::discovery::{discover_images, DEFAULT_EXTENSIONS};
use fashion_embed::export::{self, ExportFormat};
use fashion_embed::logging::{self, LogTarget};
use fashion_embed::{ClipModel, EmbeddingService, ImageInput, TopK};

/// Parsed command line.
struct CliArgs {
    command: String,
    operands: Vec<String>,
    config_path: Option<PathBuf>,
    log_stderr: bool,
    batch_size: Option<usize>,
    k: usize,
    format: Option<ExportFormat>,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            command: String::new(),
            operands: Vec::new(),
            config_path: None,
            log_stderr: false,
            batch_size: None,
            k: 5,
            format: None,
        }
    }
}

fn main() -> Result<()> {
    let args = parse_args();

    let target = if args.log_stderr {
        LogTarget::Stderr
    } else {
        LogTarget::Auto
    };
    if let Err(e) = logging::init(target, None) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let batch_size = args.batch_size.unwrap_or(config.service.batch_size);

    match args.command.as_str() {
        "download" => {
            download::ensure_all(&config.model)?;
            println!("Model files ready in {}", config.model.models_dir.display());
        }
        "dimension" => {
            let service = open_service(&config)?;
            println!("{}", service.dimension());
        }
        "embed-image" => {
            let inputs = args
                .operands
                .iter()
                .map(|reference| ImageInput::parse(reference))
                .collect::<Result<Vec<_>, _>>()?;
            let sources: Vec<String> = inputs.iter().map(ImageInput::describe).collect();

            let mut service = open_service(&config)?;
            let embeddings = service.embed_images_batched(&inputs, batch_size)?;
            print_json(&export::records(&sources, &embeddings)?)?;
        }
        "embed-text" => {
            let mut service = open_service(&config)?;
            let embeddings = service.embed_text(&args.operands, batch_size)?;
            print_json(&export::records(&args.operands, &embeddings)?)?;
        }
        "search" => {
            let (dir, query) = two_operands(&args, "search <dir> <text>")?;
            let paths = images_in(Path::new(dir))?;

            let mut service = open_service(&config)?;
            let candidates = embed_paths(&mut service, &paths, batch_size)?;
            let text = service.embed_text(&[query], 1)?;
            let ranked = service.top_k(text.row(0), candidates.view(), args.k)?;
            print_json(&matches(&paths, &ranked))?;
        }
        "similar" => {
            let (image, dir) = two_operands(&args, "similar <image> <dir>")?;
            let query = ImageInput::parse(image)?;
            let paths = images_in(Path::new(dir))?;

            let mut service = open_service(&config)?;
            let embedding = service.embed_image(&query)?;
            let candidates = embed_paths(&mut service, &paths, batch_size)?;
            let ranked = service.top_k(embedding.view(), candidates.view(), args.k)?;
            print_json(&matches(&paths, &ranked))?;
        }
        "export" => {
            let (dir, output) = two_operands(&args, "export <dir> <output>")?;
            let output = Path::new(output);
            let paths = images_in(Path::new(dir))?;

            let mut service = open_service(&config)?;
            let embeddings = embed_paths(&mut service, &paths, batch_size)?;
            let sources: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
            let records = export::records(&sources, &embeddings)?;

            let format = args.format.unwrap_or_else(|| ExportFormat::from_path(output));
            let count = export::export_embeddings(&records, output, format)?;
            println!("Exported {} embeddings to {}", count, output.display());
        }
        "" => {
            print_help();
            std::process::exit(1);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("fashion-embed {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                cli.config_path = Some(PathBuf::from(flag_value(&args, i, "--config")));
                i += 1;
            }
            "--log-stderr" => {
                cli.log_stderr = true;
            }
            "--batch-size" | "-b" => {
                match flag_value(&args, i, "--batch-size").parse() {
                    Ok(size) if size > 0 => cli.batch_size = Some(size),
                    _ => {
                        eprintln!("Error: --batch-size must be a positive number");
                        std::process::exit(1);
                    }
                }
                i += 1;
            }
            "-k" | "--top" => {
                match flag_value(&args, i, "-k").parse() {
                    Ok(k) => cli.k = k,
                    Err(_) => {
                        eprintln!("Error: -k must be a number");
                        std::process::exit(1);
                    }
                }
                i += 1;
            }
            "--format" | "-f" => {
                let value = flag_value(&args, i, "--format");
                match ExportFormat::parse(value) {
                    Some(format) => cli.format = Some(format),
                    None => {
                        eprintln!("Error: unknown format '{}' (expected json or csv)", value);
                        std::process::exit(1);
                    }
                }
                i += 1;
            }
            arg if arg.starts_with('-') && arg.len() > 1 => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
            arg => {
                if cli.command.is_empty() {
                    cli.command = arg.to_string();
                } else {
                    cli.operands.push(arg.to_string());
                }
            }
        }
        i += 1;
    }

    cli
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value.as_str(),
        None => {
            eprintln!("Error: {} requires an argument", flag);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"fashion-embed - CLIP image and text embeddings

USAGE:
    fashion-embed [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    download                 Fetch model files into the models directory
    dimension                Print the embedding dimension
    embed-image <input>...   Embed image files or data: URLs, print JSON
    embed-text <text>...     Embed texts, print JSON
    search <dir> <text>      Rank images under <dir> against a text query
    similar <image> <dir>    Rank images under <dir> against an image
    export <dir> <output>    Write embeddings of images under <dir> to a file

OPTIONS:
    --config, -c PATH        Path to config file
    --batch-size, -b N       Inputs per model call (default from config)
    -k, --top N              Number of results for search/similar (default: 5)
    --format, -f FORMAT      Export format: json or csv (default: from extension)
    --log-stderr             Log to stderr instead of journald/log file
    --version, -V            Show version
    --help, -h               Show this help message

ENVIRONMENT:
    FASHION_EMBED_CONFIG     Path to config file (overrides default location)
    FASHION_EMBED_LOG        Log filter (trace, debug, info, warn, error)
"#
    );
}

fn open_service(config: &Config) -> Result<EmbeddingService<ClipModel>> {
    EmbeddingService::from_config(config).context("Failed to start embedding service")
}

fn two_operands<'a>(args: &'a CliArgs, usage: &str) -> Result<(&'a str, &'a str)> {
    match args.operands.as_slice() {
        [first, second] => Ok((first.as_str(), second.as_str())),
        _ => bail!("usage: fashion-embed {}", usage),
    }
}

fn images_in(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let paths = discover_images(dir, DEFAULT_EXTENSIONS);
    info!(count = paths.len(), dir = ?dir, "Discovered images");
    Ok(paths)
}

fn embed_paths(
    service: &mut EmbeddingService<ClipModel>,
    paths: &[PathBuf],
    batch_size: usize,
) -> Result<fashion_embed::EmbeddingMatrix> {
    let inputs: Vec<ImageInput> = paths.iter().map(|p| ImageInput::from_path(p)).collect();
    Ok(service.embed_images_batched(&inputs, batch_size)?)
}

#[derive(Serialize)]
struct Match<'a> {
    rank: usize,
    path: &'a Path,
    score: f32,
}

fn matches<'a>(paths: &'a [PathBuf], ranked: &TopK) -> Vec<Match<'a>> {
    ranked
        .iter()
        .enumerate()
        .map(|(rank, (index, score))| Match {
            rank: rank + 1,
            path: &paths[index],
            score,
        })
        .collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
