//! Model checkpoints (bincode)

use super::classifier::GatClassifier;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Checkpoint file of a fold (1-based) inside `dir`
pub fn fold_checkpoint_path(dir: &Path, fold: usize) -> PathBuf {
    dir.join(format!("kFold_{}_best_model.bin", fold))
}

/// Write the model state, replacing any existing file
pub fn save_checkpoint(model: &GatClassifier, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, model)?;
    Ok(())
}

/// Read a model state
pub fn load_checkpoint(path: &Path) -> Result<GatClassifier> {
    let reader = BufReader::new(File::open(path)?);
    let model = bincode::deserialize_from(reader)?;
    Ok(model)
}

/// Replace `model` with the checkpoint, which must share its architecture
pub fn restore_checkpoint(model: &mut GatClassifier, path: &Path) -> Result<()> {
    let loaded = load_checkpoint(path)?;
    if loaded.architecture() != model.architecture() {
        return Err(Error::ArchitectureMismatch(format!(
            "checkpoint {} holds {:?}, model is {:?}",
            path.display(),
            loaded.architecture(),
            model.architecture()
        )));
    }
    *model = loaded;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Architecture;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn arch(hidden: usize) -> Architecture {
        Architecture {
            in_channels: 3,
            hidden_channels: hidden,
            num_heads: 2,
            num_layers: 2,
        }
    }

    #[test]
    fn test_save_and_restore() {
        let dir = tempdir().unwrap();
        let path = fold_checkpoint_path(&dir.path().join("nested"), 2);
        assert!(path.ends_with("kFold_2_best_model.bin"));

        let mut rng = StdRng::seed_from_u64(1);
        let saved = GatClassifier::new(arch(4), &mut rng).unwrap();
        save_checkpoint(&saved, &path).unwrap();

        let mut model = GatClassifier::new(arch(4), &mut rng).unwrap();
        assert_ne!(model, saved);
        restore_checkpoint(&mut model, &path).unwrap();
        assert_eq!(model, saved);
    }

    #[test]
    fn test_restore_rejects_other_architecture() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let mut rng = StdRng::seed_from_u64(1);
        save_checkpoint(&GatClassifier::new(arch(4), &mut rng).unwrap(), &path).unwrap();

        let mut model = GatClassifier::new(arch(8), &mut rng).unwrap();
        assert!(matches!(
            restore_checkpoint(&mut model, &path),
            Err(Error::ArchitectureMismatch(_))
        ));
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_checkpoint(&dir.path().join("absent.bin")),
            Err(Error::Io(_))
        ));
    }
}
