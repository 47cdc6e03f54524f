//! dumpops - Stream an operation trace through an operator list
//!
//! Reads a JSON trace of the operations an evaluator emits for one page,
//! renders it into chunks the way a page request would, and prints every
//! chunk with its operations, arguments and transfer count.

mod trace;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use quire_core::oplist::SinkMessage;
use quire_core::{
    Arg, ChunkParams, Page, RenderIntent, RenderOptions, TaskRegistry, channel,
    render_page,
};
use serde_json::{Value, json};
use tracing::Level;

use crate::trace::{Trace, TraceEvaluator};

/// Stream an operation trace through an operator list and print the chunks.
#[derive(Parser, Debug)]
#[command(name = "dumpops")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON operation trace
    trace: PathBuf,

    /// Keep the raw operation stream (no queue optimization)
    #[arg(short = 'r', long, action = ArgAction::SetTrue)]
    raw: bool,

    /// Render with the print intent
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "raw")]
    print: bool,

    /// Operations per chunk before an implicit flush
    #[arg(short = 'c', long = "chunk-size", default_value = "1000")]
    chunk_size: usize,

    /// Trace entries replayed per evaluation step
    #[arg(long, default_value = "256")]
    batch: usize,

    /// Print chunks as JSON lines
    #[arg(short = 'j', long, action = ArgAction::SetTrue)]
    json: bool,

    /// Only print chunk summaries
    #[arg(short = 's', long, action = ArgAction::SetTrue)]
    summary: bool,

    /// Output file name ("-" for stdout)
    #[arg(short = 'o', long = "outfile", default_value = "-")]
    outfile: String,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,
}

fn init_logging(debug: bool) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if debug { Level::DEBUG } else { Level::WARN })
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to install logger")?;
    Ok(())
}

fn intent(args: &Args) -> RenderIntent {
    if args.raw {
        RenderIntent::OpList
    } else if args.print {
        RenderIntent::Print
    } else {
        RenderIntent::Display
    }
}

fn describe_arg(arg: &Arg) -> String {
    match arg {
        Arg::Null => "null".to_string(),
        Arg::Bool(v) => v.to_string(),
        Arg::Int(v) => v.to_string(),
        Arg::Number(v) => v.to_string(),
        Arg::Name(v) => format!("/{v}"),
        Arg::String(v) => format!("({} bytes)", v.len()),
        Arg::Array(items) => {
            let inner: Vec<String> = items.iter().map(describe_arg).collect();
            format!("[{}]", inner.join(" "))
        }
        Arg::Rect((x0, y0, x1, y1)) => format!("rect[{x0} {y0} {x1} {y1}]"),
        Arg::Matrix((a, b, c, d, e, f)) => format!("matrix[{a} {b} {c} {d} {e} {f}]"),
        Arg::Image(image) => format!(
            "image({}x{}{})",
            image.width,
            image.height,
            if image.cached { ", cached" } else { "" }
        ),
        Arg::Positions(p) => format!("positions[{}]", p.len() / 2),
        Arg::Placements(map) => format!("placements[{}]", map.len()),
        Arg::MaskGroup(entries) => format!("masks[{}]", entries.len()),
    }
}

fn arg_json(arg: &Arg) -> Value {
    match arg {
        Arg::Null => Value::Null,
        Arg::Bool(v) => json!(v),
        Arg::Int(v) => json!(v),
        Arg::Number(v) => json!(v),
        Arg::Name(v) => json!(v.as_str()),
        Arg::Array(items) => Value::Array(items.iter().map(arg_json).collect()),
        Arg::Rect((x0, y0, x1, y1)) => json!([x0, y0, x1, y1]),
        Arg::Matrix((a, b, c, d, e, f)) => json!([a, b, c, d, e, f]),
        Arg::Positions(p) => json!(p),
        other => json!(describe_arg(other)),
    }
}

fn write_text(out: &mut dyn Write, index: usize, message: &SinkMessage, summary: bool) -> Result<()> {
    let chunk = &message.chunk;
    writeln!(
        out,
        "chunk {index}: {} ops, {} transfers{}",
        chunk.length,
        message.transfers.len(),
        if chunk.last_chunk { ", last" } else { "" }
    )?;
    if summary {
        return Ok(());
    }
    for (op, args) in chunk.ops.iter().zip(&chunk.args) {
        let args: Vec<String> = args.iter().map(describe_arg).collect();
        if args.is_empty() {
            writeln!(out, "  {op}")?;
        } else {
            writeln!(out, "  {op} {}", args.join(" "))?;
        }
    }
    Ok(())
}

fn write_json(out: &mut dyn Write, index: usize, message: &SinkMessage, summary: bool) -> Result<()> {
    let chunk = &message.chunk;
    let mut value = json!({
        "chunk": index,
        "length": chunk.length,
        "lastChunk": chunk.last_chunk,
        "transfers": message.transfers.len(),
    });
    if !summary {
        let ops: Vec<Value> = chunk
            .ops
            .iter()
            .zip(&chunk.args)
            .map(|(op, args)| {
                json!({
                    "op": op.to_string(),
                    "args": args.iter().map(arg_json).collect::<Vec<_>>(),
                })
            })
            .collect();
        value["ops"] = Value::Array(ops);
    }
    serde_json::to_writer(&mut *out, &value)?;
    writeln!(out)?;
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    if args.chunk_size == 0 {
        bail!("--chunk-size must be positive");
    }
    let file = File::open(&args.trace)
        .with_context(|| format!("failed to open trace {}", args.trace.display()))?;
    let trace: Trace = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse trace {}", args.trace.display()))?;
    let page_index = trace.page;
    let steps = trace.into_steps()?;

    let options = RenderOptions {
        intent: intent(args),
        chunking: ChunkParams {
            chunk_size: args.chunk_size,
            ..Default::default()
        },
        ..Default::default()
    };
    let registry = TaskRegistry::new();
    let (sink, chunks) = channel(usize::MAX);
    let mut page = Page::new(page_index, TraceEvaluator::new(steps, args.batch));
    let total = render_page(&registry, &mut page, sink, &options)?;

    let mut out: Box<dyn Write> = if args.outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(&args.outfile)
            .with_context(|| format!("failed to create output file {}", args.outfile))?;
        Box::new(BufWriter::new(file))
    };

    for (index, message) in chunks.enumerate() {
        if args.json {
            write_json(&mut out, index, &message, args.summary)?;
        } else {
            write_text(&mut out, index, &message, args.summary)?;
        }
    }
    if !args.json {
        writeln!(out, "total: {total} ops ({})", options.intent.as_str())?;
    }
    out.flush()?;
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.debug).and_then(|()| run(&args)) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
