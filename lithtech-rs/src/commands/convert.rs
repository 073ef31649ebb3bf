//! Model conversion command

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use lith_model::{read_model_file, AbcWriter, LtaWriter};

pub fn execute(input: &Path, output: &Path) -> Result<()> {
    println!("Loading model: {}", input.display());

    let (model, kind) = read_model_file(input)
        .with_context(|| format!("Failed to read model from {}", input.display()))?;
    println!("Detected format: {kind}");

    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("abc") => {
            let bytes = AbcWriter::new()
                .write(&model)
                .context("Failed to serialize ABC data")?;
            fs::write(output, bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }
        Some("lta") => {
            let text = LtaWriter::new().write(&model);
            fs::write(output, text)
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }
        _ => bail!(
            "unsupported output extension on {}; use .abc or .lta",
            output.display()
        ),
    }

    println!("Wrote {}", output.display());
    Ok(())
}
