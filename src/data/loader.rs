//! Dataset loading from per-sample JSON files

use super::graph::{GraphSample, SampleRecord};
use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Collection of graph samples
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<GraphSample>,
}

impl Dataset {
    /// Build a dataset, requiring one feature width across all samples
    pub fn new(samples: Vec<GraphSample>) -> Result<Self> {
        if let Some(first) = samples.first() {
            let width = first.num_features();
            if let Some(pos) = samples.iter().position(|s| s.num_features() != width) {
                return Err(Error::ArchitectureMismatch(format!(
                    "sample {} has {} features, expected {}",
                    pos,
                    samples[pos].num_features(),
                    width
                )));
            }
        }
        Ok(Self { samples })
    }

    /// Load every `*.json` sample in `dir`, in file-name order
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<PathBuf>>>()?;
        paths.retain(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "json"));
        paths.sort();

        if paths.is_empty() {
            return Err(Error::InsufficientData(format!(
                "no sample files found in {}",
                dir.display()
            )));
        }

        let mut samples = Vec::with_capacity(paths.len());
        let mut width: Option<usize> = None;
        for path in &paths {
            let sample = load_sample(path)?;
            match width {
                None => width = Some(sample.num_features()),
                Some(w) if w != sample.num_features() => {
                    return Err(Error::invalid_sample(
                        path,
                        format!("{} node features, expected {}", sample.num_features(), w),
                    ))
                }
                Some(_) => {}
            }
            debug!("Loaded {} ({} nodes)", path.display(), sample.num_nodes());
            samples.push(sample);
        }

        info!("Loaded {} graph samples from {}", samples.len(), dir.display());
        Ok(Self { samples })
    }

    /// Shuffle sample order in place
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.samples.shuffle(rng);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&GraphSample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[GraphSample] {
        &self.samples
    }

    /// Node feature width shared by all samples
    pub fn num_features(&self) -> Option<usize> {
        self.samples.first().map(GraphSample::num_features)
    }
}

/// Read one sample file
pub fn load_sample(path: &Path) -> Result<GraphSample> {
    let reader = BufReader::new(File::open(path)?);
    let record: SampleRecord = serde_json::from_reader(reader)?;
    GraphSample::from_record(record, path)
}

/// Write one sample file
pub fn save_sample(sample: &GraphSample, path: &Path) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &sample.to_record())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn sample(y: f32, width: usize) -> GraphSample {
        let x = ndarray::Array2::from_elem((2, width), y);
        GraphSample::new(x, vec![(0, 1)], y).unwrap()
    }

    #[test]
    fn test_load_dir_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        save_sample(&sample(0.2, 3), &dir.path().join("b.json")).unwrap();
        save_sample(&sample(0.1, 3), &dir.path().join("a.json")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let dataset = Dataset::load_dir(dir.path()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.num_features(), Some(3));
        assert_eq!(dataset.get(0).unwrap().target(), 0.1);
        assert_eq!(dataset.get(1).unwrap().target(), 0.2);
    }

    #[test]
    fn test_load_dir_rejects_mixed_widths() {
        let dir = tempdir().unwrap();
        save_sample(&sample(0.1, 3), &dir.path().join("a.json")).unwrap();
        save_sample(&sample(0.2, 4), &dir.path().join("b.json")).unwrap();
        assert!(matches!(
            Dataset::load_dir(dir.path()),
            Err(Error::InvalidSample { .. })
        ));
    }

    #[test]
    fn test_load_empty_dir() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Dataset::load_dir(dir.path()),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Dataset::load_dir(dir.path().join("absent")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "{\"x\": 1}").unwrap();
        assert!(matches!(Dataset::load_dir(dir.path()), Err(Error::Json(_))));
    }

    #[test]
    fn test_shuffle_is_seeded_permutation() {
        let samples: Vec<GraphSample> = (0..10).map(|i| sample(i as f32, 2)).collect();
        let mut a = Dataset::new(samples.clone()).unwrap();
        let mut b = Dataset::new(samples).unwrap();
        a.shuffle(&mut StdRng::seed_from_u64(7));
        b.shuffle(&mut StdRng::seed_from_u64(7));
        assert_eq!(a.samples(), b.samples());

        let mut targets: Vec<f32> = a.samples().iter().map(|s| s.target()).collect();
        targets.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert_eq!(targets, (0..10).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_new_rejects_mixed_widths() {
        let a = GraphSample::new(array![[1.0f32, 2.0]], vec![], 0.0).unwrap();
        let b = GraphSample::new(array![[1.0f32]], vec![], 0.0).unwrap();
        assert!(matches!(
            Dataset::new(vec![a, b]),
            Err(Error::ArchitectureMismatch(_))
        ));
    }
}
