//! CLI binary for menucraft.
//!
//! A thin shim over the library crate: flags map to `ExtractionConfig`,
//! menu files are plain JSON in the wire shape.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use menucraft::server::{self, AppState};
use menucraft::{
    decode_saved_document, export_png, load_local_image, render_menu_async, resolve_model, to_data_uri,
    Backend, DocumentField, Edit, ExtractionConfig, ItemField, MenuDocument, MenuEditor,
    MenuSession, RenderOptions,
};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a menu photo to JSON
  menucraft extract menu.jpg -o menu.json

  # Extract and render menu.png in one go
  menucraft extract menu.jpg -o menu.json --png-dir out/

  # Edit fields in place
  menucraft edit menu.json title="DINNER" item:0:2:price='$14'

  # Swap an item picture for a local photo
  menucraft edit menu.json image:1:0=photos/latte.jpg

  # Render menu.json to out/menu.png
  menucraft export menu.json -o out/

  # Run the HTTP API
  menucraft serve --addr 0.0.0.0:3000

EDIT SYNTAX:
  title=<text>  restaurant=<text>  phone=<text>  address=<text>
  section:<s>=<name>
  item:<s>:<i>:<name|price|image>=<text>
  image:<s>:<i>=<path to local image>
  Indices are 0-based.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default backend)
  OPENAI_API_KEY, …       Keys for --provider backends
  RUST_LOG                Override log filter
  A .env file in the working directory is loaded first.
"#;

/// Turn a photo of a restaurant menu into an editable document.
#[derive(Parser, Debug)]
#[command(
    name = "menucraft",
    version,
    about = "Turn a photo of a restaurant menu into an editable document and export it as PNG",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MENUCRAFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MENUCRAFT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Listen address.
        #[arg(long, env = "MENUCRAFT_ADDR", default_value = "127.0.0.1:3000")]
        addr: SocketAddr,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Extract a menu photo into menu JSON.
    Extract {
        /// Menu photo (PNG, JPEG, WebP, GIF, HEIC).
        image: PathBuf,

        /// Write JSON to this file instead of stdout.
        #[arg(short, long, env = "MENUCRAFT_OUTPUT")]
        output: Option<PathBuf>,

        /// Also render menu.png into this directory.
        #[arg(long)]
        png_dir: Option<PathBuf>,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Apply edits to a menu JSON file.
    Edit {
        /// Menu JSON file.
        menu: PathBuf,

        /// Edits, applied in order (see EDIT SYNTAX in --help).
        #[arg(required = true)]
        edits: Vec<String>,

        /// Write the result here instead of overwriting the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a menu JSON file to menu.png.
    Export {
        /// Menu JSON file.
        menu: PathBuf,

        /// Output directory.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Surface width in pixels, clamped to 600..=4000.
        #[arg(long, env = "MENUCRAFT_WIDTH", default_value_t = 1200)]
        width: u32,
    },
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Backend: gemini (default) or any edgequake-llm provider
    /// (openai, anthropic, ollama, …).
    #[arg(long, env = "MENUCRAFT_PROVIDER", default_value = "gemini")]
    provider: String,

    /// Model ID. Default: gemini-1.5-flash, or gpt-4.1-nano for other providers.
    #[arg(long, env = "MENUCRAFT_MODEL")]
    model: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "MENUCRAFT_TEMPERATURE", default_value_t = 1.0)]
    temperature: f32,

    /// Max output tokens.
    #[arg(long, env = "MENUCRAFT_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: u32,

    /// Model call timeout in seconds.
    #[arg(long, env = "MENUCRAFT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Largest accepted image in MiB.
    #[arg(long, env = "MENUCRAFT_MAX_IMAGE_MB", default_value_t = 20)]
    max_image_mb: usize,

    /// Do not ask the server to enforce the response schema.
    #[arg(long)]
    no_schema: bool,

    /// Path to a text file with a custom extraction prompt.
    #[arg(long, env = "MENUCRAFT_PROMPT")]
    prompt: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn,menucraft=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve { addr, model } => {
            let config = build_config(&model).await?;
            let vision = resolve_model(&config).context("Failed to initialise the vision model")?;
            server::serve(addr, AppState::new(vision, config))
                .await
                .context("Server stopped")?;
        }
        Command::Extract {
            image,
            output,
            png_dir,
            model,
        } => run_extract(&image, output, png_dir, &model, cli.quiet).await?,
        Command::Edit {
            menu,
            edits,
            output,
        } => run_edit(&menu, &edits, output, cli.quiet).await?,
        Command::Export {
            menu,
            output,
            width,
        } => {
            let doc = read_menu(&menu).await?;
            let options = RenderOptions {
                width,
                ..RenderOptions::default()
            };
            let surface = render_menu_async(Arc::new(doc), options).await?;
            let path = export_png(Some(&surface), &output)
                .await
                .context("Export failed")?;
            if let (Some(path), false) = (path, cli.quiet) {
                eprintln!(
                    "{} {}x{}  →  {}",
                    green("✔"),
                    surface.width(),
                    surface.height(),
                    bold(&path.display().to_string())
                );
            }
        }
    }

    Ok(())
}

async fn run_extract(
    image: &Path,
    output: Option<PathBuf>,
    png_dir: Option<PathBuf>,
    args: &ModelArgs,
    quiet: bool,
) -> Result<()> {
    let config = build_config(args).await?;
    let model = resolve_model(&config).context("Failed to initialise the vision model")?;
    let max_bytes = config.max_image_bytes;
    let session = MenuSession::new(model, config);

    let upload = load_local_image(image, max_bytes)
        .await
        .with_context(|| format!("Cannot use {}", image.display()))?;

    let spinner = (!quiet).then(|| extraction_spinner(image));
    let result = session
        .extract(upload.bytes, Some(upload.mime_type.as_str()))
        .await;
    if let Some(ref bar) = spinner {
        bar.finish_and_clear();
    }
    let doc = result.context("Extraction failed")?;

    let json = doc.to_json_pretty();
    match output {
        Some(ref path) => write_atomic(path, json.as_bytes()).await?,
        None => println!("{json}"),
    }

    if let Some(dir) = png_dir {
        session.render().await?;
        if let Some(path) = session.export(&dir).await.context("Export failed")? {
            if !quiet {
                eprintln!("{} {}", green("✔"), bold(&path.display().to_string()));
            }
        }
    }

    if !quiet {
        eprintln!(
            "{} {}  {}",
            green("✔"),
            bold(&doc.restaurant_name),
            dim(&format!(
                "{} sections, {} items",
                doc.sections.len(),
                doc.item_count()
            ))
        );
    }
    Ok(())
}

async fn run_edit(menu: &Path, edits: &[String], output: Option<PathBuf>, quiet: bool) -> Result<()> {
    let mut editor = MenuEditor::new(read_menu(menu).await?);

    for raw in edits {
        let edit = match parse_edit(raw)? {
            CliEdit::Ready(edit) => edit,
            CliEdit::LocalImage {
                section,
                item,
                path,
            } => {
                let upload = load_local_image(&path, ExtractionConfig::default().max_image_bytes)
                    .await
                    .with_context(|| format!("Cannot use {}", path.display()))?;
                Edit::ReplaceItemImage {
                    section,
                    item,
                    image: to_data_uri(&upload),
                }
            }
        };
        editor
            .apply(edit)
            .with_context(|| format!("Edit '{raw}' failed"))?;
    }

    let target = output.unwrap_or_else(|| menu.to_path_buf());
    write_atomic(&target, editor.document().to_json_pretty().as_bytes()).await?;
    if !quiet {
        eprintln!(
            "{} {} edit(s)  →  {}",
            green("✔"),
            edits.len(),
            bold(&target.display().to_string())
        );
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(args: &ModelArgs) -> Result<ExtractionConfig> {
    let backend = match args.provider.to_ascii_lowercase().as_str() {
        "gemini" => Backend::Gemini,
        other => Backend::Provider(other.to_string()),
    };

    let mut builder = ExtractionConfig::builder()
        .backend(backend)
        .temperature(args.temperature)
        .max_output_tokens(args.max_tokens)
        .api_timeout_secs(args.api_timeout)
        .max_image_bytes(args.max_image_mb * 1024 * 1024)
        .enforce_schema(!args.no_schema);

    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref path) = args.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

async fn read_menu(path: &Path) -> Result<MenuDocument> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    decode_saved_document(&value)
        .with_context(|| format!("{} is not a menu document", path.display()))
}

/// Atomic write: temp file, then rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn extraction_spinner(image: &Path) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Extracting");
    bar.set_message(image.display().to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

// ── Edit parsing ─────────────────────────────────────────────────────────────

enum CliEdit {
    Ready(Edit),
    LocalImage {
        section: usize,
        item: usize,
        path: PathBuf,
    },
}

fn parse_edit(raw: &str) -> Result<CliEdit> {
    let Some((target, value)) = raw.split_once('=') else {
        bail!("Edit '{raw}' must look like <target>=<value>");
    };
    let value = value.to_string();
    let parts: Vec<&str> = target.split(':').collect();

    let edit = match parts.as_slice() {
        ["section", s] => Edit::RenameSection {
            section: index(s)?,
            name: value,
        },
        ["item", s, i, field] => Edit::UpdateItemField {
            section: index(s)?,
            item: index(i)?,
            field: field.parse::<ItemField>().map_err(anyhow::Error::msg)?,
            value,
        },
        ["image", s, i] => {
            return Ok(CliEdit::LocalImage {
                section: index(s)?,
                item: index(i)?,
                path: PathBuf::from(value),
            })
        }
        [field] => Edit::ReplaceField {
            field: field.parse::<DocumentField>().map_err(anyhow::Error::msg)?,
            value,
        },
        _ => bail!("Unrecognised edit target '{target}'"),
    };
    Ok(CliEdit::Ready(edit))
}

fn index(s: &str) -> Result<usize> {
    s.parse()
        .with_context(|| format!("'{s}' is not a valid index"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(raw: &str) -> Edit {
        match parse_edit(raw).unwrap() {
            CliEdit::Ready(edit) => edit,
            CliEdit::LocalImage { .. } => panic!("'{raw}' parsed as a local image"),
        }
    }

    #[test]
    fn section_rename() {
        assert_eq!(
            ready("section:1=Drinks"),
            Edit::RenameSection {
                section: 1,
                name: "Drinks".into()
            }
        );
    }

    #[test]
    fn item_field_update_keeps_value_verbatim() {
        assert_eq!(
            ready("item:0:2:price= $4 = two"),
            Edit::UpdateItemField {
                section: 0,
                item: 2,
                field: ItemField::Price,
                value: " $4 = two".into(),
            }
        );
    }

    #[test]
    fn document_fields_accept_empty_values() {
        assert_eq!(
            ready("title=Dinner"),
            Edit::ReplaceField {
                field: DocumentField::Title,
                value: "Dinner".into()
            }
        );
        assert_eq!(
            ready("contact.phone="),
            Edit::ReplaceField {
                field: DocumentField::ContactPhone,
                value: String::new()
            }
        );
    }

    #[test]
    fn image_edit_defers_to_local_file() {
        match parse_edit("image:2:0=photos/soup.jpg").unwrap() {
            CliEdit::LocalImage {
                section,
                item,
                path,
            } => {
                assert_eq!((section, item), (2, 0));
                assert_eq!(path, PathBuf::from("photos/soup.jpg"));
            }
            CliEdit::Ready(edit) => panic!("unexpected edit {edit:?}"),
        }
    }

    #[test]
    fn malformed_edits_are_rejected() {
        for (raw, expected) in [
            ("title", "must look like"),
            ("section:x=Drinks", "not a valid index"),
            ("item:0:-1:name=Soup", "not a valid index"),
            ("item:0:0:colour=red", "unknown item field"),
            ("footer=hi", "unknown document field"),
            ("section:0:1=Drinks", "Unrecognised edit target"),
        ] {
            let err = parse_edit(raw).err().unwrap_or_else(|| panic!("'{raw}' parsed"));
            assert!(err.to_string().contains(expected), "{raw}: {err:#}");
        }
    }

    #[tokio::test]
    async fn saved_menu_reads_back_unchanged() {
        let doc = menucraft::normalize_response(
            r#"{"sections":[{"name":"Mains","items":[{"name":"Soup","price":"$4 "}]}]}"#,
        )
        .unwrap();
        let mut editor = MenuEditor::new(doc);
        editor.replace_field(DocumentField::ContactPhone, "");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("menu.json");
        write_atomic(&path, editor.document().to_json_pretty().as_bytes())
            .await
            .unwrap();

        let back = read_menu(&path).await.unwrap();
        assert_eq!(back.contact.phone, "");
        assert_eq!(back.item(0, 0).unwrap().price, "$4 ");
        assert_eq!(&back, editor.document());
    }
}
