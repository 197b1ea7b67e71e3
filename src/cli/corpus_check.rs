//! CLI `corpus check` command — validate the corpus file and print a report.

use anyhow::Result;
use std::collections::HashSet;

use crate::config::KotaeConfig;
use crate::corpus::Corpus;

/// Load the configured corpus and report problems that would degrade
/// matching: empty inputs/outputs and duplicate inputs (only the first of a
/// duplicate pair can ever win a tie).
pub fn corpus_check(config: &KotaeConfig) -> Result<()> {
    let path = config.resolved_corpus_path();

    if !path.exists() {
        println!("Corpus: not found at {}", path.display());
        println!("Create it as {{\"conversations\": [{{\"input\": ..., \"output\": ...}}]}}");
        return Ok(());
    }

    let corpus = Corpus::load(&path)?;

    println!("Corpus Report");
    println!("=============");
    println!();
    println!("File:            {}", path.display());
    println!("Entries:         {}", corpus.len());

    if corpus.is_empty() {
        println!();
        println!("WARNING: corpus is empty — every query will get the fallback reply.");
        return Ok(());
    }

    let mut empty_inputs = 0usize;
    let mut empty_outputs = 0usize;
    let mut seen: HashSet<&str> = HashSet::new();
    let mut duplicates: Vec<(usize, &str)> = Vec::new();

    for (i, entry) in corpus.iter().enumerate() {
        if entry.input.trim().is_empty() {
            empty_inputs += 1;
        }
        if entry.output.trim().is_empty() {
            empty_outputs += 1;
        }
        if !seen.insert(entry.input.as_str()) {
            duplicates.push((i, entry.input.as_str()));
        }
    }

    println!("Empty inputs:    {empty_inputs}");
    println!("Empty outputs:   {empty_outputs}");
    println!("Duplicate inputs: {}", duplicates.len());
    for (i, input) in &duplicates {
        println!("  entry {i}: \"{input}\" (shadowed — the earlier entry wins ties)");
    }

    println!();
    if empty_inputs == 0 && empty_outputs == 0 && duplicates.is_empty() {
        println!("Corpus check:    PASSED");
    } else {
        println!("Corpus check:    WARNINGS (see above)");
    }

    Ok(())
}
