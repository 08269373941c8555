use anyhow::Context;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub costs: usize,
    pub time_us: usize,
    pub high_level_expand_nodes: usize,
    pub high_level_generate_nodes: usize,
    pub low_level_invocations: usize,
    pub low_level_expand_nodes: usize,
    pub path_lengths: Vec<usize>,
}

impl Stats {
    pub fn print(&self) {
        info!(
            "Cost {:?} Time(microseconds) {:?} High level expand nodes number: {:?} Low level searches: {:?} Low level expand nodes number {:?}",
            self.costs,
            self.time_us,
            self.high_level_expand_nodes,
            self.low_level_invocations,
            self.low_level_expand_nodes
        );
    }

    /// Appends one row to a CSV file, writing the header if the file is new.
    pub fn append_csv(&self, path: &str, label: &str) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create directory for {path}"))?;
            }
        }

        let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open stats file {path}"))?;

        if is_new {
            writeln!(
                file,
                "label,cost,time_us,high_level_expanded,high_level_generated,low_level_searches,low_level_expanded,path_lengths"
            )?;
        }

        let path_lengths = self
            .path_lengths
            .iter()
            .map(|length| length.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(
            file,
            "{label},{},{},{},{},{},{},{path_lengths}",
            self.costs,
            self.time_us,
            self.high_level_expand_nodes,
            self.high_level_generate_nodes,
            self.low_level_invocations,
            self.low_level_expand_nodes
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_csv_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result").join("stats.csv");
        let path = path.to_str().unwrap();

        let stats = Stats {
            costs: 10,
            path_lengths: vec![4, 6],
            ..Stats::default()
        };
        stats.append_csv(path, "first").unwrap();
        stats.append_csv(path, "second").unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("label,cost"));
        assert_eq!(lines[1], "first,10,0,0,0,0,0,4 6");
        assert!(lines[2].starts_with("second,"));
    }
}
