//! Tag unannotated text with a saved model.
//!
//! Reads one sentence per line (tab-separated words) and writes the same
//! line as tab-separated `word_TAG` pairs. Blank lines stay blank. Output is
//! flushed after every line so the tool can sit in a pipe.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use seqtag_core::{CorpusReader, Tagger};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI arguments
#[derive(Parser)]
#[command(name = "tag")]
#[command(about = "Tag raw text with a trained model")]
#[command(version)]
struct Cli {
    /// Model file written by `train`
    #[arg(short, long)]
    model: PathBuf,

    /// Input file; standard input when omitted
    input: Option<PathBuf>,
}

fn tag_stream<R: BufRead, W: Write>(tagger: &Tagger, input: R, mut output: W) -> Result<usize> {
    let reader = CorpusReader::new()?;
    let mut sentences = 0usize;

    for (index, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", index + 1))?;
        let words = reader.parse_raw(&line);
        let tags = tagger
            .tag(&words)
            .with_context(|| format!("tagging line {}", index + 1))?;

        let pairs: Vec<String> = words
            .iter()
            .zip(&tags)
            .map(|(word, tag)| format!("{word}_{tag}"))
            .collect();
        writeln!(output, "{}", pairs.join("\t"))?;
        output.flush()?;

        if !words.is_empty() {
            sentences += 1;
        }
    }
    Ok(sentences)
}

fn run(cli: Cli) -> Result<()> {
    let tagger = Tagger::load(&cli.model)
        .with_context(|| format!("loading model {}", cli.model.display()))?;
    let stdout = io::stdout();
    let output = BufWriter::new(stdout.lock());

    let sentences = match &cli.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            tag_stream(&tagger, BufReader::new(file), output)?
        }
        None => tag_stream(&tagger, io::stdin().lock(), output)?,
    };

    info!(sentences, "tagging complete");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Tagging failed: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqtag_core::{Context, ModelConfig, TaggedSentence};
    use seqtag_trainer::Dataset;
    use std::io::Cursor;

    fn tagger() -> Tagger {
        let reader = CorpusReader::new().unwrap();
        let train: Vec<TaggedSentence> = reader
            .parse_annotated("I_PRP\tsaw_VBD\tit_PRP", 1)
            .unwrap()
            .into_iter()
            .collect();
        let data = Dataset::from_sentences(&train, &[]).unwrap();
        let config = ModelConfig::new().with_word_dim(8).with_tag_dim(4).with_rnn(1, 8);
        Tagger::new(config, data.words, data.tags, &mut Context::new(1)).unwrap()
    }

    #[test]
    fn test_blank_lines_preserved() {
        let tagger = tagger();
        let mut output = Vec::new();
        let sentences = tag_stream(&tagger, Cursor::new("I\tsaw\n\nit\n"), &mut output).unwrap();
        assert_eq!(sentences, 2);

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "");

        let first: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(first.len(), 2);
        assert!(first[0].starts_with("I_"));
        assert!(first[1].starts_with("saw_"));
        assert!(lines[2].starts_with("it_"));
    }

    /// Counts flushes and records how many bytes were buffered at each one.
    #[derive(Default)]
    struct FlushLog {
        written: Vec<u8>,
        flushed_at: Vec<usize>,
    }

    impl Write for FlushLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed_at.push(self.written.len());
            Ok(())
        }
    }

    #[test]
    fn test_each_line_flushed() {
        let tagger = tagger();
        let mut log = FlushLog::default();
        tag_stream(&tagger, Cursor::new("I\tsaw\n\nit\n"), &mut log).unwrap();

        assert_eq!(log.flushed_at.len(), 3);
        assert_eq!(*log.flushed_at.last().unwrap(), log.written.len());
        for &offset in &log.flushed_at {
            assert_eq!(log.written[offset - 1], b'\n');
        }
    }
}
