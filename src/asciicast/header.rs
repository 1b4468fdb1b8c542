use serde::Deserialize;

/// asciicast v2/v3 header line.
///
/// Both versions share one shape: v2 carries `width`/`height`, v3 nests the
/// size under `term`. Unknown keys are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub version: u64,
    #[serde(default)]
    pub width: Option<u16>,
    #[serde(default)]
    pub height: Option<u16>,
    #[serde(default)]
    pub term: Option<TermInfo>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub idle_time_limit: Option<f64>,
}

/// Terminal information (v3)
#[derive(Debug, Clone, Deserialize)]
pub struct TermInfo {
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    #[serde(rename = "type")]
    pub term_type: Option<String>,
}

impl Header {
    /// Terminal size, whichever version's keys carry it.
    pub fn size(&self) -> Option<(u16, u16)> {
        let term = self.term.as_ref();
        let cols = self.width.or_else(|| term.and_then(|t| t.cols))?;
        let rows = self.height.or_else(|| term.and_then(|t| t.rows))?;
        Some((cols, rows))
    }
}

/// Legacy single-document asciicast v1.
#[derive(Debug, Clone, Deserialize)]
pub struct V1Document {
    pub version: u64,
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub title: Option<String>,
    /// `[delay, text]` pairs, delays relative to the previous frame.
    pub stdout: Vec<(f64, String)>,
}
