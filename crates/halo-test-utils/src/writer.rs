//! A catalog writer that keeps everything in memory.

use std::sync::{Arc, Mutex, MutexGuard};

use halo_core::{GroupParticleLists, OutputFormat, Particle, ParticleId, PropBuffer, Species};
use halo_kernel::{
    CatalogWriter, SimulationSummary, UnitSummary, WriterError, WriterRegistry, WriterTarget,
};

/// Everything handed to [`RecordingWriter`]s sharing one recording.
#[derive(Clone, Debug, Default)]
pub struct Recording {
    /// Method names in call order, across every writer opened.
    pub calls: Vec<&'static str>,
    pub targets: Vec<WriterTarget>,
    pub sim: Option<SimulationSummary>,
    pub units: Option<UnitSummary>,
    pub props: Option<PropBuffer>,
    pub num_in_group: Vec<usize>,
    pub lists: Option<GroupParticleLists>,
    /// Member ids per group in list order; entry 0 is always empty.
    pub group_ids: Vec<Vec<ParticleId>>,
    /// Member species per group in list order; entry 0 is always empty.
    pub species: Vec<Vec<Species>>,
}

/// Writer that copies its inputs into a shared [`Recording`].
pub struct RecordingWriter {
    format: OutputFormat,
    shared: Arc<Mutex<Recording>>,
}

impl RecordingWriter {
    pub fn new(format: OutputFormat, shared: Arc<Mutex<Recording>>) -> Self {
        Self { format, shared }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Recording>, WriterError> {
        self.shared.lock().map_err(|_| WriterError::Encode {
            reason: "recording lock poisoned".to_string(),
        })
    }
}

fn per_group<T>(
    lists: &GroupParticleLists,
    particles: &[Particle],
    f: impl Fn(&Particle) -> T,
) -> Vec<Vec<T>> {
    let mut out: Vec<Vec<T>> = (0..=lists.ngroups()).map(|_| Vec::new()).collect();
    for (group, list) in lists.iter() {
        out[group.index()] = list
            .indices
            .iter()
            .filter_map(|&i| particles.get(i).map(&f))
            .collect();
    }
    out
}

impl CatalogWriter for RecordingWriter {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn write_simulation_info(&mut self, sim: &SimulationSummary) -> Result<(), WriterError> {
        let mut rec = self.lock()?;
        rec.calls.push("simulation_info");
        rec.sim = Some(sim.clone());
        Ok(())
    }

    fn write_unit_info(&mut self, units: &UnitSummary) -> Result<(), WriterError> {
        let mut rec = self.lock()?;
        rec.calls.push("unit_info");
        rec.units = Some(units.clone());
        Ok(())
    }

    fn write_properties(&mut self, props: &PropBuffer) -> Result<(), WriterError> {
        let mut rec = self.lock()?;
        rec.calls.push("properties");
        rec.props = Some(props.clone());
        Ok(())
    }

    fn write_group_catalog(
        &mut self,
        num_in_group: &[usize],
        lists: &GroupParticleLists,
        particles: &[Particle],
    ) -> Result<(), WriterError> {
        let mut rec = self.lock()?;
        rec.calls.push("group_catalog");
        rec.num_in_group = num_in_group.to_vec();
        rec.lists = Some(lists.clone());
        rec.group_ids = per_group(lists, particles, |p| p.id);
        Ok(())
    }

    fn write_species_catalog(
        &mut self,
        lists: &GroupParticleLists,
        particles: &[Particle],
    ) -> Result<(), WriterError> {
        let mut rec = self.lock()?;
        rec.calls.push("species_catalog");
        rec.species = per_group(lists, particles, |p| p.species);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), WriterError> {
        self.lock()?.calls.push("finish");
        Ok(())
    }
}

/// A registry whose only backend records into the returned handle.
pub fn recording_registry(format: OutputFormat) -> (WriterRegistry, Arc<Mutex<Recording>>) {
    let shared = Arc::new(Mutex::new(Recording::default()));
    let handle = Arc::clone(&shared);
    let registry = WriterRegistry::new().with(
        format,
        Box::new(move |target| {
            if let Ok(mut rec) = shared.lock() {
                rec.targets.push(target.clone());
            }
            Ok(Box::new(RecordingWriter::new(format, Arc::clone(&shared)))
                as Box<dyn CatalogWriter>)
        }),
    );
    (registry, handle)
}

/// Snapshot of a shared recording, tolerating a poisoned lock.
pub fn snapshot(shared: &Arc<Mutex<Recording>>) -> Recording {
    shared.lock().unwrap_or_else(|p| p.into_inner()).clone()
}
