//! Latest input file discovery.

use crate::config::FilePattern;
use crate::error::{PlannerError, Result, ResultExt};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Most recently modified file in `dir` whose name matches any pattern.
pub fn find_latest_file(dir: &Path, patterns: &[FilePattern]) -> Result<PathBuf> {
    let no_match = || PlannerError::NoInputFile {
        dir: dir.to_path_buf(),
        patterns: patterns.iter().map(ToString::to_string).collect(),
    };

    if !dir.is_dir() {
        warn!("Input directory {} does not exist", dir.display());
        return Err(no_match());
    }

    let mut candidates: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).context(format!("Scanning {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if patterns.iter().any(|p| p.matches(name)) {
            let modified = entry.metadata()?.modified()?;
            debug!("Candidate input: {}", name);
            candidates.push((modified, path));
        }
    }

    if candidates.is_empty() {
        for pattern in patterns {
            warn!("No file matching {}", pattern);
        }
        return Err(no_match());
    }

    // Ties on modification time resolve by name for a stable choice
    candidates.sort();
    let count = candidates.len();
    let (_, latest) = candidates.pop().ok_or_else(no_match)?;
    if count > 1 {
        info!(
            "{} candidate files found, using the most recent: {}",
            count,
            latest.display()
        );
    } else {
        info!("Using input file {}", latest.display());
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("planner_discovery_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(path: &Path, modified: SystemTime) {
        let file = fs::File::create(path).unwrap();
        file.set_modified(modified).unwrap();
    }

    #[test]
    fn test_picks_most_recent_match() {
        let dir = scratch_dir("recent");
        let base = SystemTime::now() - Duration::from_secs(3600);
        touch(&dir.join("TarefasPlanner_old.csv"), base);
        touch(
            &dir.join("Gerenciamento de Projetos.csv"),
            base + Duration::from_secs(60),
        );
        touch(&dir.join("notas.csv"), base + Duration::from_secs(120));

        let found = find_latest_file(&dir, &crate::config::PlannerConfig::default().input_patterns)
            .unwrap();
        assert_eq!(found.file_name().unwrap(), "Gerenciamento de Projetos.csv");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_no_match_lists_patterns() {
        let dir = scratch_dir("empty");
        touch(&dir.join("notas.txt"), SystemTime::now());

        let err = find_latest_file(&dir, &[FilePattern::new("TarefasPlanner", "csv")]).unwrap_err();
        match err {
            PlannerError::NoInputFile { patterns, .. } => {
                assert_eq!(patterns, vec!["TarefasPlanner*.csv".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
        fs::remove_dir_all(&dir).unwrap();
    }
}
