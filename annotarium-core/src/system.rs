//! Filesystem and clock helpers shared by the pipeline and server

use crate::AnnotariumResult;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Current UTC timestamp.
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Relative artifact path for an annotation under the annotations root:
/// `<taxid>/<assembly_accession>/<source_db>_<annotation_id>.gff.gz`
pub fn annotation_relative_path(
    taxid: u32,
    assembly_accession: &str,
    source_db: &str,
    annotation_id: &str,
) -> PathBuf {
    PathBuf::from(taxid.to_string())
        .join(assembly_accession)
        .join(format!("{}_{}.gff.gz", source_db, annotation_id))
}

/// Companion CSI index path for a bgzipped artifact path.
pub fn csi_path_for(bgzipped: &Path) -> PathBuf {
    let mut os = bgzipped.as_os_str().to_os_string();
    os.push(".csi");
    PathBuf::from(os)
}

/// Remove a file below `root`, then prune any parent directories left empty,
/// stopping at `root` itself.
pub fn remove_file_and_empty_parents(root: &Path, file: &Path) -> AnnotariumResult<()> {
    if file.exists() {
        std::fs::remove_file(file)?;
    }
    let mut dir = file.parent();
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) {
            break;
        }
        match std::fs::read_dir(d) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    break;
                }
                std::fs::remove_dir(d)?;
            }
            Err(_) => break,
        }
        dir = d.parent();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_annotation_relative_path() {
        let path = annotation_relative_path(9606, "GCA_000001405.15", "ensembl", "abc123");
        assert_eq!(
            path,
            PathBuf::from("9606/GCA_000001405.15/ensembl_abc123.gff.gz")
        );
    }

    #[test]
    fn test_csi_path_for() {
        let csi = csi_path_for(Path::new("9606/GCA_1/x.gff.gz"));
        assert_eq!(csi, PathBuf::from("9606/GCA_1/x.gff.gz.csi"));
    }

    #[test]
    fn test_remove_file_and_empty_parents() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("9606").join("GCA_1");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("a.gff.gz");
        std::fs::write(&file, b"x").unwrap();

        remove_file_and_empty_parents(root.path(), &file).unwrap();

        assert!(!file.exists());
        assert!(!dir.exists());
        assert!(!root.path().join("9606").exists());
        assert!(root.path().exists());
    }

    #[test]
    fn test_remove_keeps_nonempty_parents() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("9606").join("GCA_1");
        std::fs::create_dir_all(&dir).unwrap();
        let keep = dir.join("keep.gff.gz");
        let gone = dir.join("gone.gff.gz");
        std::fs::write(&keep, b"x").unwrap();
        std::fs::write(&gone, b"y").unwrap();

        remove_file_and_empty_parents(root.path(), &gone).unwrap();

        assert!(keep.exists());
        assert!(dir.exists());
    }
}
