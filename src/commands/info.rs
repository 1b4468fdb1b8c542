//! Info subcommand handler

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use castplay::cli::FormatArg;
use castplay::player::render::format_duration;
use castplay::recording::{prepare, PrepareOptions, Recording, Source, SourceSpec};

/// Print a summary of a recording: format, size, duration, markers.
#[cfg(not(tarpaulin_include))]
pub async fn handle(file: PathBuf, format: Option<FormatArg>, timing: Option<PathBuf>) -> Result<()> {
    let spec = SourceSpec {
        format: format.map(Into::into),
        timing,
        ..SourceSpec::new(file)
    };

    let source = Source::load(&spec).await?;
    let parsed = source
        .parse()
        .with_context(|| format!("Failed to parse {}", spec.path.display()))?;
    let prepared = prepare(parsed, &PrepareOptions::default())
        .with_context(|| format!("Failed to read events from {}", spec.path.display()))?;

    let metadata = std::fs::metadata(&spec.path)
        .with_context(|| format!("Failed to stat {}", spec.path.display()))?;
    let modified = metadata
        .modified()
        .ok()
        .map(|time| DateTime::<Local>::from(time).format("%Y-%m-%d %H:%M").to_string());

    print!(
        "{}",
        describe(
            &spec,
            &prepared.recording,
            metadata.len(),
            modified.as_deref()
        )
    );
    Ok(())
}

fn describe(spec: &SourceSpec, recording: &Recording, bytes: u64, modified: Option<&str>) -> String {
    let mut out = String::new();
    let mut field = |name: &str, value: String| {
        out.push_str(&format!("{:<12}{}\n", format!("{name}:"), value));
    };

    field("File", spec.path.display().to_string());
    field("Format", spec.format().to_string());
    field("Size", format!("{}x{}", recording.cols, recording.rows));
    field(
        "Duration",
        format!("{} ({:.1}s)", format_duration(recording.duration), recording.duration),
    );
    if let Some(limit) = recording.idle_time_limit {
        field("Idle limit", format!("{limit}s"));
    }
    field(
        "Events",
        format!("{} output, {} input", recording.output.len(), recording.input.len()),
    );
    field("Markers", recording.markers.len().to_string());
    field("File size", humansize::format_size(bytes, humansize::BINARY));
    if let Some(modified) = modified {
        field("Modified", modified.to_string());
    }

    for marker in &recording.markers {
        let label = if marker.label.is_empty() {
            "(unlabeled)"
        } else {
            marker.label.as_str()
        };
        out.push_str(&format!("  {}  {}\n", format_duration(marker.time), label));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use castplay::Marker;

    #[test]
    fn describe_lists_fields_and_markers() {
        let recording = Recording {
            cols: 100,
            rows: 30,
            output: Vec::new(),
            input: Vec::new(),
            markers: vec![Marker::new(65.0, "build"), Marker::new(70.0, "")],
            duration: 72.5,
            idle_time_limit: Some(2.0),
        };
        let text = describe(&SourceSpec::new("demo.cast"), &recording, 2048, None);

        assert!(text.contains("Format:     asciicast"));
        assert!(text.contains("Size:       100x30"));
        assert!(text.contains("Duration:   01:12 (72.5s)"));
        assert!(text.contains("Idle limit: 2s"));
        assert!(text.contains("File size:  2 KiB"));
        assert!(text.contains("  01:05  build"));
        assert!(text.contains("  01:10  (unlabeled)"));
        assert!(!text.contains("Modified"));
    }
}
