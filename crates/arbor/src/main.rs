mod tables;

use anyhow::{Context, bail};
use arbor_errors::{Renderer, syntax_errors};
use arbor_parse::Parser;
use arbor_tree::{InputEdit, Tree};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser as _, Subcommand};
use mimalloc::MiMalloc;
use ropey::Rope;
use text_size::TextSize;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(clap::Parser)]
#[command(about = "Parse files with generated grammar tables")]
struct Options {
    /// Log parser decisions to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the syntax tree of a file.
    Parse {
        /// Built-in table name or path to a serialized table.
        table: String,
        path: Utf8PathBuf,
        /// Print an s-expression instead of the full tree.
        #[arg(long)]
        sexp: bool,
    },
    /// Report syntax errors; fails when there are any.
    Check { table: String, path: Utf8PathBuf },
    /// Summarize a table, optionally writing it out in binary form.
    Tables {
        table: String,
        #[arg(long)]
        output: Option<Utf8PathBuf>,
    },
    /// Apply one edit, reparse, and report what changed.
    Edit {
        table: String,
        path: Utf8PathBuf,
        /// Byte offset of the edit.
        #[arg(long)]
        at: usize,
        /// Bytes removed at the offset.
        #[arg(long, default_value_t = 0)]
        delete: usize,
        /// Text inserted at the offset.
        #[arg(long, default_value = "")]
        insert: String,
    },
}

fn main() -> anyhow::Result<()> {
    let options = Options::parse();
    setup_tracing(options.verbose);

    match options.command {
        Command::Parse { table, path, sexp } => {
            let mut parser = Parser::new(tables::load(&table)?);
            let text = read(&path)?;
            let tree = parser.parse(&text)?;
            tracing::info!(stats = ?parser.stats(), "parsed `{path}`");
            if sexp {
                println!("{}", tree.to_sexp());
            } else {
                print!("{}", tree.debug_tree());
            }
            Ok(())
        }
        Command::Check { table, path } => {
            let mut parser = Parser::new(tables::load(&table)?);
            let text = read(&path)?;
            let tree = parser.parse(&text)?;
            report(&tree, &path, &text)
        }
        Command::Tables { table, output } => {
            let language = tables::load(&table)?;
            print!("{}", tables::summary(&language));
            if let Some(output) = output {
                std::fs::write(&output, language.to_bytes())
                    .with_context(|| format!("failed to write `{output}`"))?;
            }
            Ok(())
        }
        Command::Edit { table, path, at, delete, insert } => {
            let mut parser = Parser::new(tables::load(&table)?);
            let text = read(&path)?;
            let end = at.checked_add(delete).filter(|&end| end <= text.len());
            let Some(end) = end.filter(|&end| text.is_char_boundary(at) && text.is_char_boundary(end))
            else {
                bail!("edit {at}..{at}+{delete} does not fit `{path}` ({} bytes)", text.len());
            };

            let old = parser.parse(&text)?;
            let edit = InputEdit::replace(offset(at)?, offset(delete)?, TextSize::of(insert.as_str()));
            let edited = old.edit(&edit)?;

            let mut rope = Rope::from_str(&text);
            let start_char = rope.byte_to_char(at);
            rope.remove(start_char..rope.byte_to_char(end));
            rope.insert(start_char, &insert);

            let (tree, changed) = parser.reparse(&edited, &rope)?;
            let stats = parser.stats();
            for range in &changed {
                println!("changed {range:?}");
            }
            println!(
                "reused {} nodes, created {}, lexed {} tokens, {} versions at most",
                stats.nodes_reused, stats.nodes_created, stats.tokens_lexed, stats.max_versions
            );
            if tree.has_error() {
                tracing::warn!("edited text has syntax errors");
            }
            Ok(())
        }
    }
}

fn read(path: &Utf8Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read `{path}`"))
}

fn offset(value: usize) -> anyhow::Result<TextSize> {
    let value = u32::try_from(value).context("offset does not fit in 32 bits")?;
    Ok(TextSize::new(value))
}

fn report(tree: &Tree, path: &Utf8Path, text: &str) -> anyhow::Result<()> {
    let diagnostics = syntax_errors(tree, text);
    let renderer = Renderer::styled();
    for diagnostic in &diagnostics {
        eprintln!("{}", diagnostic.render(&renderer, path.as_str(), text));
    }
    match diagnostics.len() {
        0 => Ok(()),
        1 => bail!("1 syntax error in `{path}`"),
        count => bail!("{count} syntax errors in `{path}`"),
    }
}

fn setup_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = if verbose { "arbor_parse=trace,arbor_lexer=debug,info" } else { "warn" };
        EnvFilter::new(directives)
    });
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
