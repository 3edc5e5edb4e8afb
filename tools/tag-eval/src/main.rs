//! Reads annotated lines on stdin, tags their words with a saved model and
//! prints one JSON record per line, followed by a summary record.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use seqtag_core::{CorpusReader, Stats, Tagger};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "seqtag-eval")]
#[command(about = "Compare model predictions with gold tags")]
struct Cli {
    /// Model file written by `train`
    #[arg(short, long)]
    model: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct LineOutput {
    pub line: usize,
    pub words: Vec<String>,
    pub gold: Vec<String>,
    pub predicted: Vec<String>,
    pub accuracy: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub lines: usize,
    pub errors: usize,
    pub correct: usize,
    pub total: usize,
    pub accuracy: Option<f64>,
}

fn evaluate_line(tagger: &Tagger, reader: &CorpusReader, raw: &str, line: usize) -> Option<LineOutput> {
    let sentence = match reader.parse_annotated(raw, line) {
        Ok(Some(sentence)) => sentence,
        Ok(None) => return None,
        Err(e) => {
            return Some(LineOutput {
                line,
                words: Vec::new(),
                gold: Vec::new(),
                predicted: Vec::new(),
                accuracy: None,
                error: Some(e.to_string()),
            });
        }
    };

    let (predicted, error) = match tagger.tag(&sentence.words) {
        Ok(tags) => (tags, None),
        Err(e) => (Vec::new(), Some(e.to_string())),
    };

    let mut stats = Stats::new();
    for (p, g) in predicted.iter().zip(&sentence.tags) {
        stats.correct += usize::from(p == g);
        stats.total += 1;
    }

    Some(LineOutput {
        line,
        words: sentence.words,
        gold: sentence.tags,
        predicted,
        accuracy: stats.accuracy(),
        error,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let tagger = Tagger::load(&cli.model)?;
    let reader = CorpusReader::new()?;

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let mut summary = Summary {
        lines: 0,
        errors: 0,
        correct: 0,
        total: 0,
        accuracy: None,
    };

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let Some(output) = evaluate_line(&tagger, &reader, &line, index + 1) else {
            continue;
        };

        summary.lines += 1;
        if output.error.is_some() {
            summary.errors += 1;
        }
        for (p, g) in output.predicted.iter().zip(&output.gold) {
            summary.correct += usize::from(p == g);
            summary.total += 1;
        }

        writeln!(stdout, "{}", serde_json::to_string(&output)?)?;
    }

    if summary.total > 0 {
        summary.accuracy = Some(summary.correct as f64 / summary.total as f64);
    }
    writeln!(stdout, "{}", serde_json::to_string(&summary)?)?;
    Ok(())
}
