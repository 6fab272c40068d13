//! Text/binary classification from a file prefix

use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Default number of bytes sampled from the start of a file
pub const DEFAULT_SAMPLE_BYTES: usize = 8192;

/// Fraction of control bytes above which a sample counts as binary
const CONTROL_RATIO_THRESHOLD: f64 = 0.30;

/// Classify a byte sample. Returns true for binary content.
///
/// Any null byte is decisive. Otherwise the sample is binary when more than
/// 30% of it is control bytes other than tab, newline and carriage return.
/// An empty sample is text.
pub fn classify_sample(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }

    let control = sample.iter().filter(|&&b| is_suspicious_control(b)).count();
    (control as f64 / sample.len() as f64) > CONTROL_RATIO_THRESHOLD
}

fn is_suspicious_control(byte: u8) -> bool {
    match byte {
        b'\t' | b'\n' | b'\r' => false,
        0x00..=0x1f | 0x7f => true,
        _ => false,
    }
}

/// Read up to `sample_bytes` from `path` and classify them.
///
/// Fails open: if the file cannot be opened or read it is reported as text,
/// and the real error surfaces when the caller reads the file.
pub async fn is_binary(path: &Path, sample_bytes: usize) -> bool {
    match read_sample(path, sample_bytes).await {
        Ok(sample) => classify_sample(&sample),
        Err(e) => {
            debug!("Binary check could not read {}: {}", path.display(), e);
            false
        }
    }
}

async fn read_sample(path: &Path, sample_bytes: usize) -> std::io::Result<Vec<u8>> {
    let file = File::open(path).await?;
    let mut sample = Vec::with_capacity(sample_bytes.min(DEFAULT_SAMPLE_BYTES));
    file.take(sample_bytes as u64).read_to_end(&mut sample).await?;
    Ok(sample)
}
