use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser};

use docx_converter::config::{init_default_config, resolve_config, ListMode};
use docx_converter::model::{parse_fragment, text_fragment};
use docx_converter::{Converter, ExportOptions, ModelDocument, ModelNode};

#[derive(Parser, Debug)]
#[command(name = "docx-converter")]
#[command(about = "DOCX <-> editor document model converter with round-trip preservation", long_about = None)]
struct Args {
    /// Generate a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file to (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input .docx
    #[arg(value_name = "DOCX")]
    input: Option<PathBuf>,

    /// Output .docx (default: <input_stem>_converted.docx)
    #[arg(short, long, value_name = "DOCX")]
    output: Option<PathBuf>,

    /// Config file path (default: search for docx-converter.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the imported document model as JSON
    #[arg(long, value_name = "JSON")]
    json: Option<PathBuf>,

    /// Export this document model JSON instead of the imported one
    #[arg(long, value_name = "JSON")]
    from_json: Option<PathBuf>,

    /// Group numbered paragraphs into nested multi-item lists on import
    #[arg(long)]
    legacy_lists: bool,

    /// Upgrade multi-item lists to single-item lists before export
    #[arg(long)]
    migrate_lists: bool,

    /// Write inline structured content as plain runs
    #[arg(long)]
    final_doc: bool,

    /// Skip the relationship and numbering repair passes
    #[arg(long)]
    no_validate: bool,

    /// Only run the repair passes on the input and write the result
    #[arg(long)]
    validate_only: bool,

    /// Print the package metadata as JSON, then exit
    #[arg(long)]
    metadata: bool,

    /// Insert content before export: a .json model fragment, or plain text (one paragraph per line)
    #[arg(long, value_name = "FILE")]
    insert: Option<PathBuf>,

    /// Block index to insert at (default: end of document)
    #[arg(long, value_name = "INDEX", requires = "insert")]
    insert_at: Option<usize>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn read_fragment(path: &Path) -> anyhow::Result<Vec<ModelNode>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read fragment: {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        parse_fragment(&text).with_context(|| format!("parse fragment: {}", path.display()))
    } else {
        Ok(text_fragment(&text))
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let input = match args.input {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  docx-converter <input.docx> [-o output.docx] [--json model.json]\n\nTIPS:\n  - Default config search: docx-converter.toml (upwards from the current and input directories).\n"
            );
            return Ok(());
        }
    };
    let output = match args.output {
        Some(p) => p,
        None => {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output")
                .to_string();
            input.with_file_name(format!("{stem}_converted.docx"))
        }
    };

    let workdir = input
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut cfg = resolve_config(args.config.as_deref(), &workdir).context("load config")?;
    if args.legacy_lists {
        cfg.import.list_mode = ListMode::Legacy;
    }
    let mut options = ExportOptions::from(&cfg.export);
    options.final_doc |= args.final_doc;
    options.run_validators &= !args.no_validate;

    let mut converter = Converter::from_docx_path(&input, cfg)?;

    if args.metadata {
        println!("{}", serde_json::to_string_pretty(&converter.metadata())?);
        return Ok(());
    }

    if args.validate_only {
        let report = converter.validate()?;
        if report.modified {
            converter.write_docx(&output)?;
            eprintln!("{} repair(s); wrote {}", report.results.len(), output.display());
        } else {
            eprintln!("nothing to repair");
        }
        return Ok(());
    }

    let mut doc = match &args.from_json {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read model json: {}", path.display()))?;
            ModelDocument::from_json(&text).with_context(|| format!("parse model json: {}", path.display()))?
        }
        None => converter.import()?,
    };

    if let Some(path) = &args.insert {
        let nodes = read_fragment(path)?;
        let added = converter.insert_content(&mut doc, nodes, args.insert_at)?;
        eprintln!("inserted {added} block(s) from {}", path.display());
    }

    if args.migrate_lists {
        let report = converter.migrate_lists(&mut doc)?;
        if report.changed() {
            eprintln!(
                "migrated {} list(s) into {} single-item list(s)",
                report.migrated_lists, report.created_lists
            );
        }
    }

    if let Some(json_path) = &args.json {
        std::fs::write(json_path, doc.to_json()?)
            .with_context(|| format!("write model json: {}", json_path.display()))?;
        eprintln!("Wrote model: {}", json_path.display());
    }

    let report = converter.export(&doc, options)?;
    for line in &report.validation.results {
        eprintln!("repair: {line}");
    }
    converter.write_docx(&output)?;
    eprintln!(
        "Wrote {} ({} changed part(s))",
        output.display(),
        report.changed_parts.len()
    );
    Ok(())
}
