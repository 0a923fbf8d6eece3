//! Whitespace-separated text catalogs.
//!
//! One file per record kind, named `<output_name>.<suffix>`:
//!
//! | suffix | content |
//! |---|---|
//! | `siminfo` | simulation state, `key value` per line |
//! | `units` | unit conversions, `key value` per line |
//! | `properties` | one row per group |
//! | `catalog_groups` | group count, then `id size offset` per group |
//! | `catalog_particles` | particle count, then member ids, most bound first |
//! | `catalog_parttypes` | particle count, then member species tags |
//!
//! With separate files, substructure rows go to `<output_name>.sublevels.<suffix>`
//! and field halos stay in the plain files. Group ids are qualified with the
//! snapshot tag.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use halo_core::{GroupId, GroupParticleLists, OutputFormat, Particle, PropBuffer};
use halo_kernel::{
    CatalogWriter, SimulationSummary, UnitSummary, WriterError, WriterFactory, WriterTarget,
};
use tracing::debug;

/// Which groups are substructure, indexed by group id (slot 0 unused).
pub(crate) fn sublevel_flags(props: &PropBuffer) -> Vec<bool> {
    let mut flags = vec![false; props.ngroups() + 1];
    for (g, record) in props.iter() {
        flags[g.index()] = record.parent.is_some();
    }
    flags
}

/// Writes catalogs as text.
#[derive(Debug)]
pub struct AsciiWriter {
    target: WriterTarget,
    sublevel: Vec<bool>,
    written: Vec<PathBuf>,
}

/// One output file and the groups it receives.
#[derive(Clone, Copy)]
struct Part {
    sublevels: bool,
    filtered: bool,
}

impl AsciiWriter {
    /// A writer for one invocation.
    pub fn open(target: &WriterTarget) -> Result<Self, WriterError> {
        Ok(Self {
            target: target.clone(),
            sublevel: Vec::new(),
            written: Vec::new(),
        })
    }

    /// Factory for a [`WriterRegistry`](halo_kernel::WriterRegistry).
    pub fn factory() -> WriterFactory {
        Box::new(|target| Ok(Box::new(AsciiWriter::open(target)?) as Box<dyn CatalogWriter>))
    }

    /// Files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn parts(&self) -> &'static [Part] {
        static SINGLE: [Part; 1] = [Part {
            sublevels: false,
            filtered: false,
        }];
        static SPLIT: [Part; 2] = [
            Part {
                sublevels: false,
                filtered: true,
            },
            Part {
                sublevels: true,
                filtered: true,
            },
        ];
        if self.target.separate_files {
            &SPLIT
        } else {
            &SINGLE
        }
    }

    fn includes(&self, part: Part, group: GroupId) -> bool {
        !part.filtered || self.sublevel.get(group.index()).copied().unwrap_or(false) == part.sublevels
    }

    fn write_file(
        &mut self,
        suffix: &str,
        body: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
    ) -> Result<(), WriterError> {
        let path = self.target.path_with(suffix);
        let file = File::create(&path).map_err(|e| WriterError::io(&path, e))?;
        let mut out = BufWriter::new(file);
        body(&mut out)
            .and_then(|_| out.flush())
            .map_err(|e| WriterError::io(&path, e))?;
        debug!(path = %path.display(), "ascii catalog written");
        self.written.push(path);
        Ok(())
    }

    fn suffix(part: Part, kind: &str) -> String {
        if part.sublevels {
            format!("sublevels.{kind}")
        } else {
            kind.to_string()
        }
    }
}

impl CatalogWriter for AsciiWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Ascii
    }

    fn write_simulation_info(&mut self, sim: &SimulationSummary) -> Result<(), WriterError> {
        let sim = sim.clone();
        self.write_file("siminfo", move |out| {
            writeln!(out, "cosmological {}", u8::from(sim.cosmological))?;
            writeln!(out, "scale_factor {}", sim.scale_factor)?;
            writeln!(out, "hubble_param {}", sim.hubble_param)?;
            writeln!(out, "omega_m {}", sim.omega_m)?;
            writeln!(out, "omega_b {}", sim.omega_b)?;
            writeln!(out, "omega_cdm {}", sim.omega_cdm)?;
            writeln!(out, "omega_lambda {}", sim.omega_lambda)?;
            writeln!(out, "w_de {}", sim.w_de)?;
            writeln!(out, "period {}", sim.period)?;
            writeln!(out, "rho_background {}", sim.rho_background)?;
            writeln!(out, "virial_level {}", sim.virial_level)
        })
    }

    fn write_unit_info(&mut self, units: &UnitSummary) -> Result<(), WriterError> {
        let units = units.clone();
        self.write_file("units", move |out| {
            writeln!(out, "length_to_kpc {}", units.length_to_kpc)?;
            writeln!(out, "velocity_to_kms {}", units.velocity_to_kms)?;
            writeln!(out, "mass_to_solar_mass {}", units.mass_to_solar_mass)?;
            writeln!(out, "gravity {}", units.gravity)?;
            writeln!(out, "hubble_unit {}", units.hubble_unit)?;
            writeln!(out, "comoving {}", u8::from(units.comoving))
        })
    }

    fn write_properties(&mut self, props: &PropBuffer) -> Result<(), WriterError> {
        self.sublevel = sublevel_flags(props);
        let tag = self.target.snapshot;
        for &part in self.parts() {
            let rows: Vec<String> = props
                .iter()
                .filter(|(g, _)| self.includes(part, *g))
                .map(|(g, r)| {
                    let parent = r
                        .parent
                        .map_or(-1, |p| tag.qualify(p) as i64);
                    let inc = r.inclusive.unwrap_or_default();
                    format!(
                        "{} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
                        tag.qualify(g),
                        r.num_particles,
                        r.mass,
                        r.center_of_mass[0],
                        r.center_of_mass[1],
                        r.center_of_mass[2],
                        r.bulk_velocity[0],
                        r.bulk_velocity[1],
                        r.bulk_velocity[2],
                        parent,
                        tag.qualify(r.top_parent),
                        r.num_subgroups,
                        r.kind.code(),
                        inc.mass_fof,
                        inc.mass_200crit,
                        inc.r_200crit,
                        inc.mass_virial,
                        inc.r_virial,
                    )
                })
                .collect();
            self.write_file(&Self::suffix(part, "properties"), move |out| {
                writeln!(
                    out,
                    "# id npart mass xc yc zc vxc vyc vzc parent top_parent nsub type \
                     mass_fof mass_200crit r_200crit mass_vir r_vir"
                )?;
                for row in rows {
                    writeln!(out, "{row}")?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    fn write_group_catalog(
        &mut self,
        num_in_group: &[usize],
        lists: &GroupParticleLists,
        particles: &[Particle],
    ) -> Result<(), WriterError> {
        let tag = self.target.snapshot;
        let extended = self.target.extended_output;
        for &part in self.parts() {
            let mut groups = Vec::new();
            let mut members = Vec::new();
            for (g, list) in lists.iter().filter(|(g, _)| self.includes(part, *g)) {
                let size = num_in_group.get(g.index()).copied().unwrap_or(list.len());
                groups.push((tag.qualify(g), size, members.len()));
                for (k, &i) in list.indices.iter().enumerate() {
                    if let Some(p) = particles.get(i) {
                        members.push((p.id.0, list.energies.get(k).copied().unwrap_or(0.0)));
                    }
                }
            }
            self.write_file(&Self::suffix(part, "catalog_groups"), |out| {
                writeln!(out, "{}", groups.len())?;
                for (id, size, offset) in &groups {
                    writeln!(out, "{id} {size} {offset}")?;
                }
                Ok(())
            })?;
            self.write_file(&Self::suffix(part, "catalog_particles"), |out| {
                writeln!(out, "{}", members.len())?;
                for (id, energy) in &members {
                    if extended {
                        writeln!(out, "{id} {energy}")?;
                    } else {
                        writeln!(out, "{id}")?;
                    }
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    fn write_species_catalog(
        &mut self,
        lists: &GroupParticleLists,
        particles: &[Particle],
    ) -> Result<(), WriterError> {
        for &part in self.parts() {
            let tags: Vec<i32> = lists
                .iter()
                .filter(|(g, _)| self.includes(part, *g))
                .flat_map(|(_, list)| list.indices.iter())
                .filter_map(|&i| particles.get(i).map(|p| p.species.tag()))
                .collect();
            self.write_file(&Self::suffix(part, "catalog_parttypes"), |out| {
                writeln!(out, "{}", tags.len())?;
                for t in &tags {
                    writeln!(out, "{t}")?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halo_core::{GroupParticleList, ParticleId, SnapshotTag, Species};
    use std::fs;

    fn target(dir: &std::path::Path, separate: bool) -> WriterTarget {
        WriterTarget {
            output_name: dir.join("snap_0003"),
            snapshot: SnapshotTag::for_snapshot(3),
            separate_files: separate,
            extended_output: false,
        }
    }

    fn fixture() -> (PropBuffer, GroupParticleLists, Vec<Particle>) {
        let particles: Vec<Particle> = (0..4)
            .map(|k| Particle {
                id: ParticleId(100 + k),
                species: if k == 3 { Species::Gas } else { Species::DarkMatter },
                ..Particle::default()
            })
            .collect();
        let mut props = PropBuffer::new(2);
        if let Some(r) = props.get_mut(GroupId(1)) {
            r.num_particles = 2;
            r.top_parent = GroupId(1);
        }
        if let Some(r) = props.get_mut(GroupId(2)) {
            r.num_particles = 1;
            r.parent = Some(GroupId(1));
            r.top_parent = GroupId(1);
        }
        let mut lists = GroupParticleLists::new(2);
        lists.set(
            GroupId(1),
            GroupParticleList {
                indices: vec![0, 1],
                energies: vec![-2.0, -1.0],
            },
        );
        lists.set(
            GroupId(2),
            GroupParticleList {
                indices: vec![3],
                energies: vec![-0.5],
            },
        );
        (props, lists, particles)
    }

    #[test]
    fn single_file_catalogs() {
        let dir = tempfile::tempdir().unwrap();
        let (props, lists, particles) = fixture();
        let mut w = AsciiWriter::open(&target(dir.path(), false)).unwrap();
        w.write_properties(&props).unwrap();
        w.write_group_catalog(&[1, 2, 1], &lists, &particles).unwrap();
        w.write_species_catalog(&lists, &particles).unwrap();
        assert_eq!(w.written().len(), 4);

        let groups = fs::read_to_string(dir.path().join("snap_0003.catalog_groups")).unwrap();
        assert_eq!(groups, "2\n3000000000001 2 0\n3000000000002 1 2\n");
        let ids = fs::read_to_string(dir.path().join("snap_0003.catalog_particles")).unwrap();
        assert_eq!(ids, "3\n100\n101\n103\n");
        let types = fs::read_to_string(dir.path().join("snap_0003.catalog_parttypes")).unwrap();
        assert_eq!(types, "3\n1\n1\n0\n");
        let props_text = fs::read_to_string(dir.path().join("snap_0003.properties")).unwrap();
        assert_eq!(props_text.lines().count(), 3);
        assert!(props_text.lines().nth(2).unwrap().starts_with("3000000000002 1 "));
    }

    #[test]
    fn separate_files_split_sublevels() {
        let dir = tempfile::tempdir().unwrap();
        let (props, lists, particles) = fixture();
        let mut w = AsciiWriter::open(&target(dir.path(), true)).unwrap();
        w.write_properties(&props).unwrap();
        w.write_group_catalog(&[1, 2, 1], &lists, &particles).unwrap();

        let halos = fs::read_to_string(dir.path().join("snap_0003.catalog_groups")).unwrap();
        assert_eq!(halos, "1\n3000000000001 2 0\n");
        let subs =
            fs::read_to_string(dir.path().join("snap_0003.sublevels.catalog_groups")).unwrap();
        assert_eq!(subs, "1\n3000000000002 1 0\n");
        let sub_ids =
            fs::read_to_string(dir.path().join("snap_0003.sublevels.catalog_particles")).unwrap();
        assert_eq!(sub_ids, "1\n103\n");
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = AsciiWriter::open(&target(&dir.path().join("absent"), false)).unwrap();
        let err = w.write_unit_info(&UnitSummary::default()).unwrap_err();
        assert!(matches!(err, WriterError::Io { .. }));
    }
}
