//! `bincode` catalogs.
//!
//! Each invocation writes a stream of [`BinaryRecord`]s to
//! `<output_name>.catalog.bin`; with separate files, substructure
//! records go to `<output_name>.sublevels.catalog.bin`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use halo_core::{GroupParticleLists, OutputFormat, Particle, PropBuffer, PropData};
use halo_kernel::{
    CatalogWriter, SimulationSummary, UnitSummary, WriterError, WriterFactory, WriterTarget,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ascii::sublevel_flags;

/// One record of a binary catalog stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BinaryRecord {
    /// Simulation state.
    SimulationInfo(SimulationSummary),
    /// Unit conversions.
    UnitInfo(UnitSummary),
    /// Properties keyed by snapshot-qualified group id.
    Properties(Vec<(u64, PropData)>),
    /// Group sizes and member ids, most bound first.
    GroupCatalog {
        /// Snapshot-qualified group ids.
        ids: Vec<u64>,
        /// Members per group.
        sizes: Vec<u64>,
        /// Member particle ids, group after group.
        particle_ids: Vec<u64>,
    },
    /// Species tags in the order of the group catalog.
    SpeciesCatalog(Vec<i32>),
}

struct Stream {
    path: PathBuf,
    out: BufWriter<File>,
}

impl Stream {
    fn create(path: PathBuf) -> Result<Self, WriterError> {
        let file = File::create(&path).map_err(|e| WriterError::io(&path, e))?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
        })
    }

    fn put(&mut self, record: &BinaryRecord) -> Result<(), WriterError> {
        bincode::serialize_into(&mut self.out, record).map_err(|e| WriterError::Encode {
            reason: format!("{}: {e}", self.path.display()),
        })
    }
}

/// Writes catalogs as `bincode` records.
pub struct BinaryWriter {
    target: WriterTarget,
    halos: Stream,
    sublevels: Option<Stream>,
    sublevel: Vec<bool>,
}

impl BinaryWriter {
    /// Create the stream files for one invocation.
    pub fn open(target: &WriterTarget) -> Result<Self, WriterError> {
        let halos = Stream::create(target.path_with("catalog.bin"))?;
        let sublevels = if target.separate_files {
            Some(Stream::create(target.path_with("sublevels.catalog.bin"))?)
        } else {
            None
        };
        Ok(Self {
            target: target.clone(),
            halos,
            sublevels,
            sublevel: Vec::new(),
        })
    }

    /// Factory for a [`WriterRegistry`](halo_kernel::WriterRegistry).
    pub fn factory() -> WriterFactory {
        Box::new(|target| Ok(Box::new(BinaryWriter::open(target)?) as Box<dyn CatalogWriter>))
    }

    /// Stream for groups whose sublevel flag is `sub`.
    fn stream(&mut self, sub: bool) -> &mut Stream {
        match (&mut self.sublevels, sub) {
            (Some(s), true) => s,
            _ => &mut self.halos,
        }
    }

    /// Split `(index, item)` pairs by stream; unsplit writers use one part.
    fn split<T>(&self, items: impl Iterator<Item = (usize, T)>) -> [Vec<T>; 2] {
        let mut parts = [Vec::new(), Vec::new()];
        for (g, item) in items {
            let sub = self.sublevels.is_some() && self.sublevel.get(g).copied().unwrap_or(false);
            parts[usize::from(sub)].push(item);
        }
        parts
    }

    fn put_split(&mut self, [halos, subs]: [BinaryRecord; 2]) -> Result<(), WriterError> {
        self.stream(false).put(&halos)?;
        if self.sublevels.is_some() {
            self.stream(true).put(&subs)?;
        }
        Ok(())
    }
}

impl CatalogWriter for BinaryWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Binary
    }

    fn write_simulation_info(&mut self, sim: &SimulationSummary) -> Result<(), WriterError> {
        self.halos.put(&BinaryRecord::SimulationInfo(sim.clone()))
    }

    fn write_unit_info(&mut self, units: &UnitSummary) -> Result<(), WriterError> {
        self.halos.put(&BinaryRecord::UnitInfo(units.clone()))
    }

    fn write_properties(&mut self, props: &PropBuffer) -> Result<(), WriterError> {
        self.sublevel = sublevel_flags(props);
        let tag = self.target.snapshot;
        let [halos, subs] = self.split(
            props
                .iter()
                .map(|(g, r)| (g.index(), (tag.qualify(g), r.clone()))),
        );
        self.put_split([BinaryRecord::Properties(halos), BinaryRecord::Properties(subs)])
    }

    fn write_group_catalog(
        &mut self,
        num_in_group: &[usize],
        lists: &GroupParticleLists,
        particles: &[Particle],
    ) -> Result<(), WriterError> {
        let tag = self.target.snapshot;
        let parts = self.split(lists.iter().map(|(g, list)| {
            let size = num_in_group.get(g.index()).copied().unwrap_or(list.len());
            let ids: Vec<u64> = list
                .indices
                .iter()
                .filter_map(|&i| particles.get(i).map(|p| p.id.0))
                .collect();
            (g.index(), (tag.qualify(g), size as u64, ids))
        }));
        let records = parts.map(|groups| {
            let mut ids = Vec::with_capacity(groups.len());
            let mut sizes = Vec::with_capacity(groups.len());
            let mut particle_ids = Vec::new();
            for (id, size, members) in groups {
                ids.push(id);
                sizes.push(size);
                particle_ids.extend(members);
            }
            BinaryRecord::GroupCatalog {
                ids,
                sizes,
                particle_ids,
            }
        });
        self.put_split(records)
    }

    fn write_species_catalog(
        &mut self,
        lists: &GroupParticleLists,
        particles: &[Particle],
    ) -> Result<(), WriterError> {
        let parts = self.split(lists.iter().map(|(g, list)| {
            let tags: Vec<i32> = list
                .indices
                .iter()
                .filter_map(|&i| particles.get(i).map(|p| p.species.tag()))
                .collect();
            (g.index(), tags)
        }));
        let records = parts.map(|groups| BinaryRecord::SpeciesCatalog(groups.concat()));
        self.put_split(records)
    }

    fn finish(&mut self) -> Result<(), WriterError> {
        for stream in std::iter::once(&mut self.halos).chain(self.sublevels.as_mut()) {
            stream
                .out
                .flush()
                .map_err(|e| WriterError::io(&stream.path, e))?;
            debug!(path = %stream.path.display(), "binary catalog written");
        }
        Ok(())
    }
}

/// Read every record of a binary catalog stream.
pub fn read_records(path: &Path) -> Result<Vec<BinaryRecord>, WriterError> {
    let file = File::open(path).map_err(|e| WriterError::io(path, e))?;
    let len = file.metadata().map_err(|e| WriterError::io(path, e))?.len();
    let mut reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut read = 0u64;
    while read < len {
        let record: BinaryRecord =
            bincode::deserialize_from(&mut reader).map_err(|e| WriterError::Encode {
                reason: format!("{}: {e}", path.display()),
            })?;
        read += bincode::serialized_size(&record).map_err(|e| WriterError::Encode {
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use halo_core::{GroupId, GroupParticleList, ParticleId, SnapshotTag, Species};

    fn target(dir: &Path, separate: bool) -> WriterTarget {
        WriterTarget {
            output_name: dir.join("snap_0007"),
            snapshot: SnapshotTag::for_snapshot(7),
            separate_files: separate,
            extended_output: false,
        }
    }

    fn fixture() -> (PropBuffer, GroupParticleLists, Vec<Particle>) {
        let particles: Vec<Particle> = (0..3)
            .map(|k| Particle {
                id: ParticleId(10 + k),
                species: Species::DarkMatter,
                ..Particle::default()
            })
            .collect();
        let mut props = PropBuffer::new(2);
        if let Some(r) = props.get_mut(GroupId(2)) {
            r.parent = Some(GroupId(1));
        }
        let mut lists = GroupParticleLists::new(2);
        lists.set(
            GroupId(1),
            GroupParticleList {
                indices: vec![0, 1],
                energies: vec![-1.0, 0.0],
            },
        );
        lists.set(
            GroupId(2),
            GroupParticleList {
                indices: vec![2],
                energies: vec![-3.0],
            },
        );
        (props, lists, particles)
    }

    #[test]
    fn stream_reads_back_in_call_order() {
        let dir = tempfile::tempdir().unwrap();
        let (props, lists, particles) = fixture();
        let mut w = BinaryWriter::open(&target(dir.path(), false)).unwrap();
        w.write_simulation_info(&SimulationSummary::default()).unwrap();
        w.write_unit_info(&UnitSummary::default()).unwrap();
        w.write_properties(&props).unwrap();
        w.write_group_catalog(&[0, 2, 1], &lists, &particles).unwrap();
        w.write_species_catalog(&lists, &particles).unwrap();
        w.finish().unwrap();

        let records = read_records(&dir.path().join("snap_0007.catalog.bin")).unwrap();
        assert_eq!(records.len(), 5);
        assert!(matches!(records[0], BinaryRecord::SimulationInfo(_)));
        match &records[3] {
            BinaryRecord::GroupCatalog {
                ids,
                sizes,
                particle_ids,
            } => {
                assert_eq!(ids, &vec![7_000_000_000_001, 7_000_000_000_002]);
                assert_eq!(sizes, &vec![2, 1]);
                assert_eq!(particle_ids, &vec![10, 11, 12]);
            }
            other => panic!("unexpected record {other:?}"),
        }
        assert_eq!(records[4], BinaryRecord::SpeciesCatalog(vec![1, 1, 1]));
    }

    #[test]
    fn separate_files_route_substructure() {
        let dir = tempfile::tempdir().unwrap();
        let (props, lists, particles) = fixture();
        let mut w = BinaryWriter::open(&target(dir.path(), true)).unwrap();
        w.write_properties(&props).unwrap();
        w.write_group_catalog(&[0, 2, 1], &lists, &particles).unwrap();
        w.finish().unwrap();

        let subs = read_records(&dir.path().join("snap_0007.sublevels.catalog.bin")).unwrap();
        assert_eq!(subs.len(), 2);
        match &subs[1] {
            BinaryRecord::GroupCatalog { particle_ids, .. } => {
                assert_eq!(particle_ids, &vec![12])
            }
            other => panic!("unexpected record {other:?}"),
        }
    }
}
