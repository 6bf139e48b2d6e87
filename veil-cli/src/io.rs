// Copyright 2025 Veil (https://github.com/veil-privacy/veil)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Separator-split CSV reading and writing for the CLI boundary.
//!
//! Values are plain separator-delimited fields without quoting; the
//! engine never sees files, only the decoded rows.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Reads a delimited file into a header row and data rows.
pub fn read_csv(path: &Path, separator: char) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => split(&line?, separator),
        None => bail!("{} is empty", path.display()),
    };

    let mut rows = Vec::new();
    for (number, line) in lines.enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let row = split(&line, separator);
        if row.len() != header.len() {
            bail!(
                "{}: line {} has {} fields, expected {}",
                path.display(),
                number + 2,
                row.len(),
                header.len()
            );
        }
        rows.push(row);
    }
    Ok((header, rows))
}

/// Reads a hierarchy file: one row of generalization strings per
/// distinct value, no header.
pub fn read_hierarchy(path: &Path, separator: char) -> Result<Vec<Vec<String>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut rows = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.is_empty() {
            rows.push(split(&line, separator));
        }
    }
    if rows.is_empty() {
        bail!("hierarchy {} is empty", path.display());
    }
    Ok(rows)
}

/// Reads a research subset file: one row index per line.
pub fn read_subset(path: &Path) -> Result<Vec<usize>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut indices = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let index: usize = trimmed
            .parse()
            .with_context(|| format!("{}: line {} is not a row index", path.display(), number + 1))?;
        indices.push(index);
    }
    Ok(indices)
}

/// Writes header and rows as a delimited file.
pub fn write_csv(
    path: &Path,
    separator: char,
    header: &[String],
    rows: &[Vec<String>],
) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", header.join(&separator.to_string()))?;
    for row in rows {
        writeln!(writer, "{}", row.join(&separator.to_string()))?;
    }
    Ok(())
}

fn split(line: &str, separator: char) -> Vec<String> {
    line.split(separator).map(|s| s.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_read_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "age;gender").unwrap();
        writeln!(file, "34;male").unwrap();
        writeln!(file, "45;female").unwrap();
        drop(file);

        let (header, rows) = read_csv(&path, ';').unwrap();
        assert_eq!(header, vec!["age", "gender"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["34", "male"]);

        let out = dir.path().join("out.csv");
        write_csv(&out, ';', &header, &rows).unwrap();
        let (header2, rows2) = read_csv(&out, ';').unwrap();
        assert_eq!(header, header2);
        assert_eq!(rows, rows2);
    }

    #[test]
    fn test_ragged_line_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "a;b").unwrap();
        writeln!(file, "1;2;3").unwrap();
        drop(file);
        let err = read_csv(&path, ';').unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_read_subset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subset.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "0\n3\n5").unwrap();
        drop(file);
        assert_eq!(read_subset(&path).unwrap(), vec![0, 3, 5]);
    }
}
