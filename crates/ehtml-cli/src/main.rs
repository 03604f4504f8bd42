use clap::{Parser, Subcommand};
use ehtml_codegen::{compile, compile_standalone, Options, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "ehtml")]
#[command(about = "EHTML: embedded HTML template compiler")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template to stdout
    Render {
        /// Template file
        path: PathBuf,
        /// JSON file with the template data
        #[arg(long)]
        data: Option<PathBuf>,
        /// JSON file with compile options
        #[arg(long)]
        options: Option<PathBuf>,
    },

    /// Compile a template to standalone template script
    Compile {
        /// Template file
        path: PathBuf,
        /// Also write `<stem>.js.map`
        #[arg(long)]
        source_map: bool,
        /// Output directory (defaults to the template's directory)
        #[arg(long)]
        out: Option<PathBuf>,
        /// JSON file with compile options
        #[arg(long)]
        options: Option<PathBuf>,
    },

    /// Check a template for errors without generating output
    Check {
        /// Template file
        path: PathBuf,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Render {
            path,
            data,
            options,
        } => cmd_render(&path, data.as_deref(), options.as_deref()),
        Command::Compile {
            path,
            source_map,
            out,
            options,
        } => cmd_compile(&path, source_map, out.as_deref(), options.as_deref()),
        Command::Check { path } => cmd_check(&path),
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn read_file(path: &Path) -> String {
    if !path.exists() {
        fail(format!("Error: file not found: {}", path.display()));
    }
    match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => fail(format!("Error reading {}: {e}", path.display())),
    }
}

fn read_json(path: &Path) -> serde_json::Value {
    match serde_json::from_str(&read_file(path)) {
        Ok(value) => value,
        Err(e) => fail(format!("Invalid JSON in {}: {e}", path.display())),
    }
}

/// Options from `options_path`, or defaults named after the template.
fn load_options(template: &Path, options_path: Option<&Path>) -> Options {
    match options_path {
        Some(path) => match serde_json::from_value(read_json(path)) {
            Ok(options) => options,
            Err(e) => fail(format!("Invalid options in {}: {e}", path.display())),
        },
        None => Options::new().filename(template.display().to_string()),
    }
}

fn write_file(path: &Path, contents: &str) {
    if let Err(e) = std::fs::write(path, contents) {
        fail(format!("Error writing {}: {e}", path.display()));
    }
}

fn cmd_render(path: &Path, data: Option<&Path>, options_path: Option<&Path>) {
    let source = read_file(path);
    let options = load_options(path, options_path);
    let locals = data.map_or(Value::Undefined, |data| Value::from(read_json(data)));

    let template = match compile(&source, &options) {
        Ok(template) => template,
        Err(e) => fail(format!("Compile error: {e}")),
    };
    match template.render(&locals) {
        Ok(html) => print!("{html}"),
        Err(e) => fail(format!("Render error: {e}")),
    }
}

fn cmd_compile(path: &Path, source_map: bool, out: Option<&Path>, options_path: Option<&Path>) {
    let source = read_file(path);
    let mut options = load_options(path, options_path);
    options.source_map |= source_map;

    let standalone = match compile_standalone(&source, &options) {
        Ok(standalone) => standalone,
        Err(e) => fail(format!("Compile error: {e}")),
    };

    let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
        fail(format!("Error: no file name in {}", path.display()));
    };
    let dir = out
        .or_else(|| path.parent())
        .unwrap_or(Path::new("."));

    let js_path = dir.join(format!("{stem}.js"));
    write_file(&js_path, &standalone.code);
    if let Some(map) = &standalone.map {
        write_file(&dir.join(format!("{stem}.js.map")), map);
    }

    eprintln!("Compiled: {}", js_path.display());
}

fn cmd_check(path: &Path) {
    let source = read_file(path);
    let options = load_options(path, None);

    if let Err(e) = compile(&source, &options) {
        fail(format!("Error: {e}"));
    }

    eprintln!("OK: {}", path.display());
}
