//! Argument parsing and command dispatch for the `cq4` binary.
//!
//! Mirrors the library's own layering: this crate is a thin boundary
//! over [`cq4`] — it loads a schema, opens a [`cq4::FramedReader`], and
//! renders [`cq4::Message`]s, but no decoding logic lives here.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde_json::json;

use cq4::schema::{Encoding, LogicalType, MessageDef, Schema};
use cq4::{decode_excerpt, Context, FramedReader, Message, Value};

/// Inspect and export Chronicle Queue (`.cq4`) binary log files.
#[derive(Debug, Parser)]
#[command(name = "cq4", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// A schema JSON file to load (repeatable; later files win on name
    /// clashes).
    #[arg(short = 'S', long = "schema", global = true, value_name = "FILE")]
    pub schema: Vec<PathBuf>,

    /// A directory of `.java`/`.class` files to derive a schema from via
    /// the class extractor.
    #[arg(short = 'D', long = "schema-dir", global = true, value_name = "DIR")]
    pub schema_dir: Option<PathBuf>,

    /// Overrides the schema's declared encoding.
    #[arg(short = 'E', long = "encoding", global = true, value_enum)]
    pub encoding: Option<EncodingArg>,

    /// A `.cq4t` tailer metadata file (currently informational only).
    #[arg(short = 'T', long = "tailer", global = true, value_name = "FILE")]
    pub tailer: Option<PathBuf>,

    /// Include metadata excerpts alongside data excerpts.
    #[arg(short = 'm', long = "metadata", global = true, action = ArgAction::SetTrue)]
    pub include_metadata: bool,

    /// Raise the tracing filter level; repeat for more detail.
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EncodingArg {
    Binary,
    Thrift,
    Sbe,
}

impl From<EncodingArg> for Encoding {
    fn from(value: EncodingArg) -> Self {
        match value {
            EncodingArg::Binary => Encoding::Binary,
            EncodingArg::Thrift => Encoding::Thrift,
            EncodingArg::Sbe => Encoding::Sbe,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the `.cq4` roll-cycle files found in a queue directory.
    Open {
        /// Chronicle Queue directory.
        folder: PathBuf,
    },
    /// Print a file's queue header and total excerpt count.
    Info {
        file: PathBuf,
    },
    /// List `index, offset, is_metadata, type_hint` for each message.
    List {
        file: PathBuf,
        #[arg(long, default_value_t = 0)]
        start: u64,
        #[arg(long, default_value_t = 100)]
        limit: u64,
    },
    /// Print one message's fields as pretty JSON.
    Show {
        file: PathBuf,
        index: u64,
    },
    /// Substring-match over each message's rendered field values.
    Search {
        file: PathBuf,
        query: String,
    },
    /// Stream every message as NDJSON (or CSV with `--csv`).
    Export {
        file: PathBuf,
        #[arg(long, action = ArgAction::SetTrue)]
        csv: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the union of field names observed across a sample of messages.
    Fields {
        file: PathBuf,
        #[arg(long, default_value_t = 100)]
        sample: u64,
    },
    /// Print the set of distinct `type_hint` values observed.
    Types {
        file: PathBuf,
        #[arg(long, default_value_t = 100)]
        sample: u64,
    },
    /// Run the class extractor and print the resulting schema as JSON.
    Schema {
        #[arg(long, value_name = "FILE", conflicts_with = "scan_dir")]
        parse: Option<PathBuf>,
        #[arg(long, value_name = "DIR", conflicts_with = "parse")]
        scan_dir: Option<PathBuf>,
        #[arg(long, action = ArgAction::SetTrue)]
        inner_classes: bool,
    },
}

/// Installs a `tracing_subscriber` filter whose verbosity follows `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Builds the [`Context`] a run should decode with, by loading `--schema`
/// files and/or `--schema-dir`, and applying `--encoding` as an override.
pub fn load_context(cli: &Cli) -> anyhow::Result<Context> {
    let mut schemas = Vec::new();

    for path in &cli.schema {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading schema file '{}'", path.display()))?;
        schemas.push(Schema::from_json_str(&text).with_context(|| {
            format!("parsing schema file '{}'", path.display())
        })?);
    }

    if let Some(dir) = &cli.schema_dir {
        schemas.push(
            cq4::classfile::parse_directory(dir, true)
                .with_context(|| format!("scanning schema directory '{}'", dir.display()))?,
        );
    }

    if schemas.is_empty() {
        return Ok(Context::default());
    }

    let mut merged = Schema::merge(schemas);
    if let Some(encoding) = cli.encoding {
        merged.encoding = encoding.into();
    }

    Ok(Context::new(Some(Arc::new(merged))))
}

/// Runs the selected subcommand.
pub fn run(cli: &Cli) -> anyhow::Result<()> {
    let context = load_context(cli)?;

    match &cli.command {
        Command::Open { folder } => open(folder),
        Command::Info { file } => info(file),
        Command::List {
            file,
            start,
            limit,
        } => list(file, cli.include_metadata, *start, *limit),
        Command::Show { file, index } => show(file, &context, cli.include_metadata, *index),
        Command::Search { file, query } => search(file, &context, cli.include_metadata, query),
        Command::Export { file, csv, output } => {
            export(file, &context, cli.include_metadata, *csv, output.as_deref())
        }
        Command::Fields { file, sample } => {
            fields(file, &context, cli.include_metadata, *sample)
        }
        Command::Types { file, sample } => types(file, cli.include_metadata, *sample),
        Command::Schema {
            parse,
            scan_dir,
            inner_classes,
        } => schema_command(parse.as_deref(), scan_dir.as_deref(), *inner_classes),
    }
}

fn open(folder: &Path) -> anyhow::Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(folder)
        .with_context(|| format!("reading directory '{}'", folder.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("cq4"))
        .collect();
    entries.sort();

    for path in entries {
        let reader = FramedReader::open(&path)
            .with_context(|| format!("opening '{}'", path.display()))?;
        let header = reader.header();
        println!(
            "{}\tversion={} index={} count={} rollCycle={:?}",
            path.display(),
            header.version,
            header.index,
            header.count,
            header.roll_cycle
        );
    }
    Ok(())
}

fn info(file: &Path) -> anyhow::Result<()> {
    let reader = FramedReader::open(file).with_context(|| format!("opening '{}'", file.display()))?;
    let header = reader.header();
    let total = reader.count_messages(true);
    println!("version:       {}", header.version);
    println!("index:         {}", header.index);
    println!("count:         {}", header.count);
    println!("rollCycle:     {}", header.roll_cycle);
    println!("indexCount:    {}", header.index_count);
    println!("indexSpacing:  {}", header.index_spacing);
    println!("total excerpts: {total}");
    Ok(())
}

fn list(file: &Path, include_metadata: bool, start: u64, limit: u64) -> anyhow::Result<()> {
    let reader = FramedReader::open(file).with_context(|| format!("opening '{}'", file.display()))?;

    for excerpt in reader
        .iter_excerpts(include_metadata, start)
        .take(limit as usize)
    {
        let mut message_parser = cq4::wire::WireParser::new(excerpt.payload);
        let type_hint = message_parser
            .read_message()
            .ok()
            .flatten()
            .and_then(|m| m.type_hint);
        println!(
            "{}\t{}\t{}\t{}",
            excerpt.index,
            excerpt.offset,
            excerpt.is_metadata,
            type_hint.unwrap_or_default()
        );
    }
    Ok(())
}

fn show(file: &Path, context: &Context, include_metadata: bool, index: u64) -> anyhow::Result<()> {
    let reader = FramedReader::open(file).with_context(|| format!("opening '{}'", file.display()))?;
    let message = reader
        .iter_excerpts(include_metadata, 0)
        .find(|excerpt| excerpt.index == index)
        .map(|excerpt| decode_excerpt(&excerpt, context))
        .ok_or_else(|| anyhow!("no excerpt with index {index}"))?;

    println!("{}", serde_json::to_string_pretty(&message_to_json(&message))?);
    Ok(())
}

fn search(file: &Path, context: &Context, include_metadata: bool, query: &str) -> anyhow::Result<()> {
    let reader = FramedReader::open(file).with_context(|| format!("opening '{}'", file.display()))?;
    for excerpt in reader.iter_excerpts(include_metadata, 0) {
        let message = decode_excerpt(&excerpt, context);
        let rendered = serde_json::to_string(&message_to_json(&message))?;
        if rendered.contains(query) {
            println!("{rendered}");
        }
    }
    Ok(())
}

fn export(
    file: &Path,
    context: &Context,
    include_metadata: bool,
    as_csv: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let reader = FramedReader::open(file).with_context(|| format!("opening '{}'", file.display()))?;
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating '{}'", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    if as_csv {
        export_csv(&reader, context, include_metadata, writer)
    } else {
        export_ndjson(&reader, context, include_metadata, writer)
    }
}

fn export_ndjson(
    reader: &FramedReader,
    context: &Context,
    include_metadata: bool,
    mut writer: Box<dyn Write>,
) -> anyhow::Result<()> {
    for excerpt in reader.iter_excerpts(include_metadata, 0) {
        let message = decode_excerpt(&excerpt, context);
        serde_json::to_writer(&mut writer, &message_to_json(&message))?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

fn export_csv(
    reader: &FramedReader,
    context: &Context,
    include_metadata: bool,
    writer: Box<dyn Write>,
) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut field_names: Vec<String> = Vec::new();
    let mut header_written = false;

    for excerpt in reader.iter_excerpts(include_metadata, 0) {
        let message = decode_excerpt(&excerpt, context);

        if !header_written {
            field_names = message
                .fields
                .iter()
                .filter(|(_, v)| is_scalar(v))
                .map(|(name, _)| name.clone())
                .collect();
            let mut header = vec!["index".to_string(), "offset".to_string(), "type_hint".to_string()];
            header.extend(field_names.iter().cloned());
            csv_writer.write_record(&header)?;
            header_written = true;
        }

        let mut record = vec![
            message.index.to_string(),
            message.offset.to_string(),
            message.type_hint.clone().unwrap_or_default(),
        ];
        for name in &field_names {
            let rendered = message
                .fields
                .get(name.as_str())
                .filter(|v| is_scalar(v))
                .map(scalar_to_string)
                .unwrap_or_default();
            record.push(rendered);
        }
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Map(_) | Value::Seq(_))
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn fields(file: &Path, context: &Context, include_metadata: bool, sample: u64) -> anyhow::Result<()> {
    let reader = FramedReader::open(file).with_context(|| format!("opening '{}'", file.display()))?;
    let mut names = BTreeSet::new();
    for excerpt in reader.iter_excerpts(include_metadata, 0).take(sample as usize) {
        let message = decode_excerpt(&excerpt, context);
        names.extend(message.fields.keys().cloned());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn types(file: &Path, include_metadata: bool, sample: u64) -> anyhow::Result<()> {
    let reader = FramedReader::open(file).with_context(|| format!("opening '{}'", file.display()))?;
    let mut types = BTreeSet::new();
    for excerpt in reader.iter_excerpts(include_metadata, 0).take(sample as usize) {
        let mut parser = cq4::wire::WireParser::new(excerpt.payload);
        if let Ok(Some(message)) = parser.read_message() {
            if let Some(type_hint) = message.type_hint {
                types.insert(type_hint);
            }
        }
    }
    for type_hint in types {
        println!("{type_hint}");
    }
    Ok(())
}

fn schema_command(
    parse: Option<&Path>,
    scan_dir: Option<&Path>,
    inner_classes: bool,
) -> anyhow::Result<()> {
    let schema = if let Some(path) = parse {
        // A single file's own inner classes are always merged in; the
        // `--inner-classes` flag only changes directory-wide scans.
        cq4::classfile::parse_java_file(path)
            .with_context(|| format!("parsing '{}'", path.display()))?
    } else if let Some(dir) = scan_dir {
        cq4::classfile::parse_directory(dir, inner_classes)
            .with_context(|| format!("scanning '{}'", dir.display()))?
    } else {
        return Err(anyhow!("either --parse or --scan-dir must be given"));
    };

    println!("{}", serde_json::to_string_pretty(&schema_to_json(&schema))?);
    Ok(())
}

fn message_to_json(message: &Message) -> serde_json::Value {
    json!({
        "index": message.index,
        "offset": message.offset,
        "type_hint": message.type_hint,
        "is_metadata": message.is_metadata,
        "fields": message.fields,
    })
}

fn schema_to_json(schema: &Schema) -> serde_json::Value {
    let encoding = match schema.encoding {
        Encoding::Binary => "binary",
        Encoding::Thrift => "thrift",
        Encoding::Sbe => "sbe",
    };

    let messages: serde_json::Map<String, serde_json::Value> = schema
        .messages
        .iter()
        .map(|(name, def)| (name.clone(), message_def_to_json(def)))
        .collect();

    json!({
        "encoding": encoding,
        "default": schema.default_message,
        "messages": messages,
    })
}

fn message_def_to_json(def: &MessageDef) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = def
        .fields
        .iter()
        .map(|field| {
            json!({
                "name": field.name,
                "type": logical_type_name(field.logical_type),
                "optional": field.optional,
                "size": field.size_hint,
                "field_id": field.thrift_id,
                "nested_type": field.nested_type,
            })
        })
        .collect();
    json!({ "fields": fields })
}

fn logical_type_name(logical_type: LogicalType) -> &'static str {
    match logical_type {
        LogicalType::Int8 => "int8",
        LogicalType::Int16 => "int16",
        LogicalType::Int32 => "int32",
        LogicalType::Int64 => "int64",
        LogicalType::Uint8 => "uint8",
        LogicalType::Uint16 => "uint16",
        LogicalType::Uint32 => "uint32",
        LogicalType::Uint64 => "uint64",
        LogicalType::Float32 => "float32",
        LogicalType::Float64 => "float64",
        LogicalType::Bool => "bool",
        LogicalType::String => "string",
        LogicalType::Bytes => "bytes",
        LogicalType::StopBit => "stop_bit",
        LogicalType::Padding => "padding",
        LogicalType::Skip => "skip",
        LogicalType::Object => "object",
    }
}
