//! CLI for chat-refs - Render chat messages with their references block.

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chat_refs::{
    parse_messages, render::find_theme, render::DEFAULT_THEME, source_citations, theme_names,
    try_extract_citations, Citation, Message, MessageView, OutputFormat, RenderOptions,
};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Render chat messages as Markdown with their trailing references block
#[derive(Parser)]
#[command(name = "chat-refs")]
#[command(version)]
#[command(after_help = "\
Examples:
  chat-refs render answer.md
  chat-refs render answer.md --format plain
  chat-refs render messages.jsonl --json -o messages.html
  echo 'Hi' | chat-refs split -
  chat-refs themes")]
struct Cli {
    /// Log parsing decisions to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Input file (use '-' for stdin)
    input: PathBuf,

    /// Input holds JSON message objects (object, array or JSONL) instead of raw text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render messages to HTML or plain text
    #[command(after_help = "\
Examples:
  chat-refs render answer.md --theme InspiredGitHub --no-line-numbers
  chat-refs render answer.md --no-refs
  chat-refs render answer.md --refs-header Sources --strict

Reference syntax (at the end of the message):
  References: [REFERENCES: {\"files\": [\"a.pdf\", \"b.pdf\"]}]")]
    Render {
        #[command(flatten)]
        input: InputArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Html)]
        format: OutputFormat,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Don't include the references section
        #[arg(long)]
        no_refs: bool,

        /// Custom references header
        #[arg(long, default_value = "References")]
        refs_header: String,

        /// Highlighting theme for code blocks (see 'themes' command)
        #[arg(long, default_value = DEFAULT_THEME)]
        theme: String,

        /// Don't number the lines of highlighted code blocks
        #[arg(long)]
        no_line_numbers: bool,

        /// Fail when a references block is present but cannot be parsed
        #[arg(long)]
        strict: bool,
    },

    /// Print the answer, raw references block and citations as JSON
    Split {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Print citations as a {"citations": [...]} payload
    Citations {
        #[command(flatten)]
        input: InputArgs,
    },

    /// List available highlighting themes
    Themes,
}

// ---------------------------------------------------------------------------
// AppError — semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10 — input file not found / unreadable
    InputFile(String),
    /// Exit 11 — message JSON invalid
    MessageFile(String),
    /// Exit 12 — highlighting theme not found
    Theme(String),
    /// Exit 13 — references block present but unparsable (--strict)
    References(String),
    /// Exit 15 — cannot write output file
    OutputFile(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::InputFile(_) => 10,
            AppError::MessageFile(_) => 11,
            AppError::Theme(_) => 12,
            AppError::References(_) => 13,
            AppError::OutputFile(_) => 15,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputFile(msg) => {
                write!(f, "{}\n  hint: verify the file path is correct", msg)
            }
            AppError::MessageFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: with --json the input must be a message object, a JSON array of objects, or JSONL (one object per line)",
                    msg
                )
            }
            AppError::Theme(msg) => {
                write!(
                    f,
                    "{}\n  available themes: {}",
                    msg,
                    theme_names().join(", ")
                )
            }
            AppError::References(msg) => {
                write!(
                    f,
                    "{}\n  hint: the block must look like [REFERENCES: {{\"files\": [\"a.pdf\"]}}]",
                    msg
                )
            }
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose {
        "chat_refs=debug"
    } else {
        "chat_refs=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Render {
            input,
            format,
            output,
            no_refs,
            refs_header,
            theme,
            no_line_numbers,
            strict,
        } => {
            let options = RenderOptions {
                format,
                theme,
                line_numbers: !no_line_numbers,
                show_references: !no_refs,
                references_header: refs_header,
            };
            render_command(&input, &options, output.as_deref(), strict)?;
        }
        Commands::Split { input } => {
            split_command(&input)?;
        }
        Commands::Citations { input } => {
            citations_command(&input)?;
        }
        Commands::Themes => {
            themes_command();
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Read the input (support '-' for stdin) as one raw message or as JSON messages.
fn read_messages(args: &InputArgs) -> Result<Vec<Message>, AppError> {
    let content = if args.input == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| AppError::InputFile(format!("failed to read from stdin: {}", e)))?;
        buf
    } else {
        fs::read_to_string(&args.input)
            .map_err(|e| AppError::InputFile(format!("'{}': {}", args.input.display(), e)))?
    };

    if args.json {
        parse_messages(&content)
            .map_err(|e| AppError::MessageFile(format!("'{}': {}", args.input.display(), e)))
    } else {
        Ok(vec![Message::new(content)])
    }
}

/// Render messages and write them to a file or stdout.
fn render_command(
    input: &InputArgs,
    options: &RenderOptions,
    output: Option<&Path>,
    strict: bool,
) -> Result<(), AppError> {
    // 1. Validate the theme before doing any work
    find_theme(&options.theme).map_err(|e| AppError::Theme(e.to_string()))?;

    // 2. Read messages
    let messages = read_messages(input)?;

    // 3. Render each message
    let mut view = MessageView::new();
    let mut rendered = Vec::with_capacity(messages.len());
    let mut cited = 0;
    for (index, message) in messages.iter().enumerate() {
        view.update(message.text());

        if strict && view.parsed().has_references() {
            try_extract_citations(&view.parsed().references_raw).map_err(|e| {
                AppError::References(format!("message {}: {}", index + 1, e))
            })?;
        }

        let body = view
            .render(options)
            .map_err(|e| AppError::Theme(e.to_string()))?;
        cited += view.citations().len();
        rendered.push(body);
    }

    // 4. Assemble
    let result = if input.json {
        join_messages(&rendered, options.format)
    } else {
        rendered.concat()
    };

    // 5. Write to file or stdout
    if let Some(output_path) = output {
        fs::write(output_path, format!("{}\n", result))
            .map_err(|e| AppError::OutputFile(format!("'{}': {}", output_path.display(), e)))?;
        eprintln!(
            "rendered {} message(s) with {} citation(s), wrote {}",
            messages.len(),
            cited,
            output_path.display()
        );
    } else {
        write_stdout(&result)?;
    }

    Ok(())
}

fn join_messages(rendered: &[String], format: OutputFormat) -> String {
    match format {
        OutputFormat::Html => rendered
            .iter()
            .map(|body| format!("<article class=\"message\">\n{}\n</article>", body))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Plain => rendered.join("\n\n"),
    }
}

#[derive(Serialize)]
struct SplitOutput<'a> {
    answer: &'a str,
    references_raw: &'a str,
    citations: &'a [Citation],
}

/// Print the split and citations of each message as JSON.
fn split_command(input: &InputArgs) -> Result<(), AppError> {
    let messages = read_messages(input)?;

    let values = messages
        .iter()
        .map(|message| {
            let view = MessageView::from_text(message.text());
            serde_json::to_value(SplitOutput {
                answer: view.answer(),
                references_raw: &view.parsed().references_raw,
                citations: view.citations(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(serialize_error)?;

    print_json(values, input.json)
}

/// Print citations in the backend payload shape.
fn citations_command(input: &InputArgs) -> Result<(), AppError> {
    let messages = read_messages(input)?;

    let values = messages
        .iter()
        .map(|message| {
            let view = MessageView::from_text(message.text());
            serde_json::to_value(source_citations(view.citations()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(serialize_error)?;

    print_json(values, input.json)
}

/// Prints one value for raw input, or an array for JSON input.
fn print_json(mut values: Vec<serde_json::Value>, as_array: bool) -> Result<(), AppError> {
    let value = if as_array {
        serde_json::Value::Array(values)
    } else {
        values.pop().unwrap_or(serde_json::Value::Null)
    };
    let text = serde_json::to_string_pretty(&value).map_err(serialize_error)?;
    write_stdout(&text)
}

fn serialize_error(e: serde_json::Error) -> AppError {
    AppError::OutputFile(format!("failed to serialize output: {}", e))
}

fn write_stdout(text: &str) -> Result<(), AppError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", text).map_err(|e| AppError::OutputFile(format!("stdout: {}", e)))
}

/// List available highlighting themes.
fn themes_command() {
    for name in theme_names() {
        println!("{}", name);
    }
}
