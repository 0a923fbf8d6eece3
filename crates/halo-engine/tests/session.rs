//! Integration tests: initialisation and invocation through a session.

use std::fs;

use halo_core::{BaryonMode, OutputFormat, SearchType, SourceParticle, Species};
use halo_engine::{
    configuration_path, ConfigError, CosmoInfo, InMemoryParams, InvokeError, InvokeRequest,
    PipelineError, RunConfig, Session, SessionOptions, SimInfo, SourceCounts, Stage, StatusCode,
    TomlParamFile, UnitInfo,
};
use halo_kernel::{KernelSet, WriterRegistry};
use halo_kernels::{
    AsciiWriter, GridFof, GridSubstructure, NearestDarkMatter, ParentLinkHierarchy,
    PotentialBindingSort, SphericalOverdensity,
};
use halo_test_utils::{clump, hydro_count, recording_registry, snapshot, FailingFof};

fn reference_kernels() -> KernelSet {
    KernelSet {
        fof: Box::new(GridFof),
        substructure: Box::new(GridSubstructure::default()),
        inclusive_mass: Box::new(SphericalOverdensity),
        baryons: Box::new(NearestDarkMatter),
        hierarchy: Box::new(ParentLinkHierarchy),
        binding: Box::new(PotentialBindingSort),
    }
}

fn options() -> SessionOptions {
    SessionOptions {
        threads: 2,
        ..SessionOptions::default()
    }
}

fn counts(particles: &[SourceParticle]) -> SourceCounts {
    SourceCounts {
        num_gravity: particles.len(),
        num_hydro: hydro_count(particles),
    }
}

/// Two dense dark matter clumps with gas sitting inside the first.
fn clumps_with_gas() -> Vec<SourceParticle> {
    let mut particles = clump(21, [2.0, 2.0, 2.0], 200, 0.25, Species::DARK_MATTER_TAG, 0);
    particles.extend(clump(22, [6.0, 6.0, 6.0], 160, 0.2, Species::DARK_MATTER_TAG, 200));
    particles.extend(clump(23, [2.0, 2.0, 2.0], 30, 0.1, Species::GAS_TAG, 1000));
    particles
}

// ── Full run ─────────────────────────────────────────────────────────

#[test]
fn reference_kernels_write_ascii_catalogs() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig {
        baryon_mode: BaryonMode::Substructure,
        inclusive_halo: true,
        ..RunConfig::default()
    };
    let sim = SimInfo {
        has_gas: true,
        ..SimInfo::default()
    };
    let writers = WriterRegistry::new().with(OutputFormat::Ascii, AsciiWriter::factory());
    let dump = dir.path().join("run.configuration");
    let mut session = Session::init(
        &InMemoryParams::new(config).with_dump(&dump),
        UnitInfo::default(),
        &sim,
        reference_kernels(),
        writers,
        options(),
    )
    .unwrap();
    assert!(fs::read_to_string(&dump).unwrap().contains("linking_length"));

    let particles = clumps_with_gas();
    let output_name = dir.path().join("snap_0002");
    let report = session
        .invoke(InvokeRequest {
            snapshot: 2,
            output_name: output_name.clone(),
            cosmology: CosmoInfo::default(),
            sim,
            counts: counts(&particles),
            particles: &particles,
        })
        .unwrap();

    let summary = &report.summary;
    assert_eq!(summary.nhalos, 2);
    assert!(summary.ngroups >= 2);
    assert_eq!(summary.num_roots, 2);
    assert!(summary.grouped_particles >= 360);
    assert!(summary.species_catalog);
    assert_eq!(summary.metrics.stage_us[0].0, Stage::Partition);
    assert!(summary.metrics.ran(Stage::Baryons));

    for suffix in [
        "siminfo",
        "units",
        "properties",
        "catalog_groups",
        "catalog_particles",
        "catalog_parttypes",
    ] {
        let path = dir.path().join(format!("snap_0002.{suffix}"));
        assert!(path.exists(), "missing {}", path.display());
    }
    let groups = fs::read_to_string(dir.path().join("snap_0002.catalog_groups")).unwrap();
    let first = groups.lines().nth(1).unwrap();
    assert!(first.starts_with("2000000000001 "), "{first}");
}

#[test]
fn derived_values_follow_each_invocation() {
    let (writers, recording) = recording_registry(OutputFormat::Ascii);
    let mut session = Session::init(
        &InMemoryParams::new(RunConfig::default()),
        UnitInfo::default(),
        &SimInfo::default(),
        reference_kernels(),
        writers,
        options(),
    )
    .unwrap();
    let particles = clump(31, [1.0, 1.0, 1.0], 40, 0.2, Species::DARK_MATTER_TAG, 0);
    let cosmological = SimInfo {
        period: 100.0,
        cosmological: true,
        ..SimInfo::default()
    };
    let lcdm = |a: f64| CosmoInfo {
        scale_factor: a,
        hubble_param: 0.7,
        omega_m: 0.3,
        omega_b: 0.05,
        omega_cdm: 0.25,
        omega_lambda: 0.7,
        w_de: -1.0,
    };

    let mut virial = Vec::new();
    let mut period = Vec::new();
    for a in [0.5, 1.0] {
        session
            .invoke(InvokeRequest {
                snapshot: 1,
                output_name: "derived".into(),
                cosmology: lcdm(a),
                sim: cosmological.clone(),
                counts: counts(&particles),
                particles: &particles,
            })
            .unwrap();
        let sim = snapshot(&recording).sim.unwrap();
        virial.push(sim.virial_level);
        period.push(sim.period);
    }
    assert!(virial[0] < virial[1]);
    assert_eq!(period, vec![50.0, 100.0]);
}

// ── Initialisation codes ─────────────────────────────────────────────

#[test]
fn parameter_file_missing_a_required_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("halo.toml");
    fs::write(&path, "linking_length = 0.2\n").unwrap();
    let (writers, _) = recording_registry(OutputFormat::Ascii);
    let err = Session::init(
        &TomlParamFile::new(&path),
        UnitInfo::default(),
        &SimInfo::default(),
        reference_kernels(),
        writers,
        options(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        ConfigError::Missing {
            option: "min_size".to_string()
        }
    );
    assert_eq!(StatusCode::from(&err).code(), 8);
    assert!(!configuration_path(&path).exists());
}

#[test]
fn parameter_file_is_loaded_and_dumped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("halo.toml");
    fs::write(
        &path,
        "linking_length = 0.3\nmin_size = 12\nsearch_type = \"all\"\n\n[output]\nseparate_files = true\n",
    )
    .unwrap();
    let (writers, _) = recording_registry(OutputFormat::Ascii);
    let session = Session::init(
        &TomlParamFile::new(&path),
        UnitInfo::default(),
        &SimInfo::default(),
        reference_kernels(),
        writers,
        options(),
    )
    .unwrap();
    let config = session.config();
    assert_eq!(config.linking_length, 0.3);
    assert_eq!(config.search_type, SearchType::All);
    assert_eq!(config.halo_min_size, Some(12));
    assert!(config.output.separate_files);

    let dumped: RunConfig =
        toml::from_str(&fs::read_to_string(configuration_path(&path)).unwrap()).unwrap();
    assert_eq!(dumped.min_size, 12);
    assert_eq!(dumped.halo_min_size, Some(12));
}

#[test]
fn unwritable_dump_does_not_fail_initialisation() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("no_such_dir").join("run.configuration");
    let (writers, _) = recording_registry(OutputFormat::Ascii);
    let session = Session::init(
        &InMemoryParams::new(RunConfig::default()).with_dump(&dump),
        UnitInfo::default(),
        &SimInfo::default(),
        reference_kernels(),
        writers,
        options(),
    );
    assert!(session.is_ok());
    assert!(!dump.exists());
}

#[test]
fn unregistered_format_is_an_option_error() {
    let config = RunConfig {
        output: halo_engine::OutputConfig {
            format: OutputFormat::Hdf,
            ..Default::default()
        },
        ..RunConfig::default()
    };
    let (writers, _) = recording_registry(OutputFormat::Ascii);
    let err = Session::init(
        &InMemoryParams::new(config),
        UnitInfo::default(),
        &SimInfo::default(),
        reference_kernels(),
        writers,
        options(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        ConfigError::Unavailable {
            format: OutputFormat::Hdf
        }
    );
    assert_eq!(StatusCode::from(&err), StatusCode::OptionError);
}

#[test]
fn negative_growth_factor_is_an_option_error() {
    let config = RunConfig {
        memory: halo_engine::MemoryConfig {
            growth_factor: -0.5,
        },
        ..RunConfig::default()
    };
    let (writers, _) = recording_registry(OutputFormat::Ascii);
    let err = Session::init(
        &InMemoryParams::new(config),
        UnitInfo::default(),
        &SimInfo::default(),
        reference_kernels(),
        writers,
        options(),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Arena(_)));
    assert_eq!(StatusCode::from(&err), StatusCode::OptionError);
}

// ── Invocation failures ──────────────────────────────────────────────

#[test]
fn kernel_failure_maps_to_failure_code() {
    let (writers, recording) = recording_registry(OutputFormat::Ascii);
    let mut kernels = reference_kernels();
    kernels.fof = Box::new(FailingFof::new("tree exhausted"));
    let mut session = Session::init(
        &InMemoryParams::new(RunConfig::default()),
        UnitInfo::default(),
        &SimInfo::default(),
        kernels,
        writers,
        options(),
    )
    .unwrap();
    let particles = clump(41, [1.0, 1.0, 1.0], 10, 0.2, Species::DARK_MATTER_TAG, 0);
    let err = session
        .invoke(InvokeRequest {
            snapshot: 0,
            output_name: "failing".into(),
            cosmology: CosmoInfo::default(),
            sim: SimInfo::default(),
            counts: counts(&particles),
            particles: &particles,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        InvokeError::Pipeline(PipelineError::Kernel {
            stage: Stage::Fof,
            ..
        })
    ));
    assert_eq!(StatusCode::from(&err).code(), 0);
    let calls = snapshot(&recording).calls;
    assert!(!calls.contains(&"properties"));
    assert!(!calls.contains(&"finish"));
}

#[test]
fn count_mismatch_fails_the_invocation() {
    let (writers, _) = recording_registry(OutputFormat::Ascii);
    let mut session = Session::init(
        &InMemoryParams::new(RunConfig::default()),
        UnitInfo::default(),
        &SimInfo::default(),
        reference_kernels(),
        writers,
        options(),
    )
    .unwrap();
    let particles = clump(42, [1.0, 1.0, 1.0], 10, 0.2, Species::DARK_MATTER_TAG, 0);
    let err = session
        .invoke(InvokeRequest {
            snapshot: 0,
            output_name: "mismatch".into(),
            cosmology: CosmoInfo::default(),
            sim: SimInfo::default(),
            counts: SourceCounts {
                num_gravity: 11,
                num_hydro: 0,
            },
            particles: &particles,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        InvokeError::Pipeline(PipelineError::Ingest(_))
    ));
    assert_eq!(StatusCode::from(&err), StatusCode::Failure);
}
