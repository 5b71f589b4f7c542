//! SER result files and realization statistics

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::LinkResult;

/// Write through a uniquely named temp file in the same directory, then
/// rename it over `path`. The temp file is removed if any step fails.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// `%.18e`: 18 fractional digits, signed two-digit exponent
pub fn format_scientific(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let raw = format!("{:.18e}", value);
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => raw,
    }
}

/// One SER value per line
pub fn write_ser_file(path: &Path, values: &[f64]) -> LinkResult<()> {
    let mut body = String::with_capacity(values.len() * 26);
    for &v in values {
        body.push_str(&format_scientific(v));
        body.push('\n');
    }
    atomic_write(path, body.as_bytes())?;
    Ok(())
}

/// Spread of SER across independent realizations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SerSummary {
    pub realizations: usize,
    pub mean: f64,
    /// Sample standard deviation (n − 1)
    pub std_dev: f64,
    /// Normal-approximation 95% half width of the mean
    pub ci95_half_width: f64,
}

impl SerSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std_dev = if values.len() > 1 {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        Some(Self {
            realizations: values.len(),
            mean,
            std_dev,
            ci95_half_width: 1.96 * std_dev / n.sqrt(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn read_ser_file(path: &Path) -> Vec<f64> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| line.trim().parse().unwrap())
            .collect()
    }

    #[test]
    fn test_scientific_matches_savetxt() {
        assert_eq!(format_scientific(0.9375), "9.375000000000000000e-01");
        assert_eq!(format_scientific(0.0), "0.000000000000000000e+00");
        assert_eq!(format_scientific(1234.5), "1.234500000000000000e+03");
        assert_eq!(format_scientific(2.5e-120), "2.500000000000000000e-120");
        assert_eq!(format_scientific(f64::NAN), "nan");
    }

    #[test]
    fn test_ser_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("SER.txt");
        let values = [0.9375, 0.0125, 1.5e-5];
        write_ser_file(&path, &values).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(read_ser_file(&path), values.to_vec());

        // No temp files left behind
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("SER_no_quantization");
        write_ser_file(&path, &[0.5, 0.25]).unwrap();
        write_ser_file(&path, &[0.1]).unwrap();
        assert_eq!(read_ser_file(&path), vec![0.1]);
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        // Renaming a file over a directory fails
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();

        assert!(write_ser_file(&target, &[0.5]).is_err());
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("occupied")]);
    }

    #[test]
    fn test_concurrent_writers_do_not_collide() {
        let dir = tempdir().unwrap();
        let path = Arc::new(dir.path().join("SER.txt"));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = Arc::clone(&path);
                thread::spawn(move || write_ser_file(&path, &[i as f64; 4]))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let values = read_ser_file(&path);
        assert_eq!(values.len(), 4);
        assert!(values.iter().all(|&v| v == values[0]));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_summary() {
        assert!(SerSummary::from_values(&[]).is_none());

        let single = SerSummary::from_values(&[0.2]).unwrap();
        assert_eq!(single.std_dev, 0.0);
        assert_eq!(single.ci95_half_width, 0.0);

        let s = SerSummary::from_values(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert!((s.mean - 0.25).abs() < 1e-12);
        assert!((s.std_dev - (0.05_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((s.ci95_half_width - 1.96 * s.std_dev / 2.0).abs() < 1e-12);
        assert_eq!(s.realizations, 4);
    }
}
