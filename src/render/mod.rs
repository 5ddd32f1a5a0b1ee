//! Projection of a fully committed job state onto the execution engine's
//! XML job description.
//!
//! Pure and stateless: the same state renders to the byte-identical
//! document every time. One module per committed entity, in commit order,
//! plus the fixed zero-momentum point sink every contraction references.

pub mod xml;

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::schema::{Action, ActionParams, Contraction, GaugeField, ObservableKind, Propagator, Solver, SolverParams, Source, SourceParams};
use crate::state::JobState;
use xml::{space_separated, XmlElement};

/// Module name of the gauge field every action references.
const GAUGE_MODULE: &str = "gauge";

/// Module name of the shared measurement sink.
const SINK_MODULE: &str = "sink";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Cannot render an incomplete job state; pending stages: {0}")]
    Incomplete(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render the job description document. Fails if any stage is pending.
pub fn render_document(state: &JobState, run_id: &str) -> Result<String, RenderError> {
    if !state.is_complete() {
        let pending: Vec<&str> = state.pending_stages().iter().map(|s| s.as_str()).collect();
        return Err(RenderError::Incomplete(pending.join(", ")));
    }

    let mut root = XmlElement::new("grid");
    root.push(parameters(state, run_id));
    root.push(modules(state));
    Ok(root.to_document())
}

/// Render and write the document to `path` in one shot.
pub fn write_document(state: &JobState, run_id: &str, path: &Path) -> Result<(), RenderError> {
    let document = render_document(state, run_id)?;
    fs::write(path, document)?;
    tracing::info!(path = %path.display(), "Job description written");
    Ok(())
}

fn parameters(state: &JobState, run_id: &str) -> XmlElement {
    let gauge = state.gauge.as_ref().expect("state is complete");
    let (start, end, step) = gauge.trajectory_range();

    let mut parameters = XmlElement::new("parameters");

    let traj = parameters.push(XmlElement::new("trajCounter"));
    traj.push_value("start", start)
        .push_value("end", end)
        .push_value("step", step);

    let database = parameters.push(XmlElement::new("database"));
    database
        .push_value("applicationDb", "app.db")
        .push_value("resultDb", "results.db")
        .push_value("restoreModules", "false")
        .push_value("restoreMemoryProfile", "false")
        .push_value("restoreSchedule", "false")
        .push_value("statDbBase", "stats.db")
        .push_value("statDbPeriodMs", 1000)
        .push_value("statDbAllRanks", "false");

    let genetic = parameters.push(XmlElement::new("genetic"));
    genetic
        .push_value("popSize", 20)
        .push_value("maxGen", 100)
        .push_value("maxCstGen", 100)
        .push_value("mutationRate", 0.1);

    parameters
        .push_value("graphFile", "")
        .push_value("scheduleFile", "")
        .push_value("saveSchedule", "false")
        .push_value("parallelWriteMaxRetry", -1)
        .push_value("runId", run_id);

    parameters
}

/// One module per committed entity, in commit order, then the fixed sink.
fn modules(state: &JobState) -> XmlElement {
    let mut modules = XmlElement::new("modules");

    for action in state.actions.as_deref().expect("state is complete") {
        modules.push(action_module(action));
    }
    for source in state.sources.as_deref().expect("state is complete") {
        modules.push(source_module(source));
    }
    for solver in state.solvers.as_deref().expect("state is complete") {
        modules.push(solver_module(solver));
    }
    for propagator in state.propagators.as_deref().expect("state is complete") {
        modules.push(propagator_module(propagator));
    }
    for contraction in state.contractions.as_deref().expect("state is complete") {
        modules.push(contraction_module(contraction));
    }
    modules.push(gauge_module(state.gauge.as_ref().expect("state is complete")));
    modules.push(sink_module());

    modules
}

fn module(name: &str, module_type: &str) -> (XmlElement, XmlElement) {
    let mut element = XmlElement::new("module");
    let id = element.push(XmlElement::new("id"));
    id.push_value("name", name).push_value("type", module_type);
    let options = XmlElement::new("options");
    (element, options)
}

fn finish(mut element: XmlElement, options: XmlElement) -> XmlElement {
    element.push(options);
    element
}

fn action_module(action: &Action) -> XmlElement {
    match &action.params {
        ActionParams::Dwf { ls, mass, m5 } => {
            let (element, mut options) = module(&action.name, "MAction::DWF");
            options
                .push_value("gauge", GAUGE_MODULE)
                .push_value("Ls", ls)
                .push_value("mass", mass)
                .push_value("M5", m5)
                .push_value("boundary", "1 1 1 -1")
                .push_value("twist", "0. 0. 0. 0.");
            finish(element, options)
        }
        ActionParams::WilsonClover { mass, csw_r, csw_t } => {
            let (element, mut options) = module(&action.name, "MAction::WilsonClover");
            options
                .push_value("gauge", GAUGE_MODULE)
                .push_value("mass", mass)
                .push_value("csw_r", csw_r)
                .push_value("csw_t", csw_t);
            let anisotropy = options.push(XmlElement::new("clover_anisotropy"));
            anisotropy
                .push_value("isAnisotropic", "false")
                .push_value("t_direction", 3)
                .push_value("xi_0", "1.0")
                .push_value("nu", "1.0");
            options
                .push_value("boundary", "1 1 1 -1")
                .push_value("twist", "0. 0. 0. 0.");
            finish(element, options)
        }
    }
}

fn source_module(source: &Source) -> XmlElement {
    match &source.params {
        SourceParams::Point { location } => {
            let (element, mut options) = module(&source.name, "MSource::Point");
            options.push_value("position", space_separated(location.iter()));
            finish(element, options)
        }
        SourceParams::Wall { timeslice, momentum } => {
            let (element, mut options) = module(&source.name, "MSource::Wall");
            let mom = match momentum {
                Some(p) => space_separated(p.iter()),
                None => "0. 0. 0. 0.".to_string(),
            };
            options.push_value("tW", timeslice).push_value("mom", mom);
            finish(element, options)
        }
    }
}

fn solver_module(solver: &Solver) -> XmlElement {
    match &solver.params {
        SolverParams::RbPrecCg {
            residual,
            max_iteration,
        } => {
            let (element, mut options) = module(&solver.name, "MSolver::RBPrecCG");
            options
                .push_value("action", &solver.action)
                .push_value("maxIteration", max_iteration)
                .push_value("residual", residual)
                .push_value("guesser", "");
            finish(element, options)
        }
    }
}

fn propagator_module(propagator: &Propagator) -> XmlElement {
    let (element, mut options) = module(&propagator.name, "MFermion::GaugeProp");
    options
        .push_value("source", &propagator.source)
        .push_value("solver", &propagator.solver);
    finish(element, options)
}

fn contraction_module(contraction: &Contraction) -> XmlElement {
    let (element, mut options) = module(&contraction.name, "MContraction::Meson");
    let gammas = match contraction.kind {
        ObservableKind::Pion2pt => "(Gamma5 Gamma5)",
        ObservableKind::Vector2pt => "(GammaX GammaX)(GammaY GammaY)(GammaZ GammaZ)",
    };
    options
        .push_value("q1", &contraction.propagators[0])
        .push_value("q2", &contraction.propagators[1])
        .push_value("gammas", gammas)
        .push_value("sink", SINK_MODULE)
        .push_value("output", format!("mesons/{}", contraction.name));
    finish(element, options)
}

fn gauge_module(gauge: &GaugeField) -> XmlElement {
    match gauge {
        GaugeField::Load { stub, .. } => {
            let (element, mut options) = module(GAUGE_MODULE, "MIO::LoadNersc");
            options.push_value("file", stub);
            finish(element, options)
        }
        GaugeField::Unit => {
            let (element, options) = module(GAUGE_MODULE, "MGauge::Unit");
            finish(element, options)
        }
        GaugeField::Random => {
            let (element, options) = module(GAUGE_MODULE, "MGauge::Random");
            finish(element, options)
        }
    }
}

/// The fixed terminal module: a zero-momentum point sink shared by every
/// contraction.
fn sink_module() -> XmlElement {
    let (element, mut options) = module(SINK_MODULE, "MSink::Point");
    options.push_value("mom", "0 0 0");
    finish(element, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Observable;

    fn complete_state() -> JobState {
        JobState {
            observables: Some(vec![
                Observable {
                    name: "pion_a".into(),
                    kind: ObservableKind::Pion2pt,
                    user_info: String::new(),
                },
                Observable {
                    name: "vector_a".into(),
                    kind: ObservableKind::Vector2pt,
                    user_info: String::new(),
                },
            ]),
            actions: Some(vec![Action {
                name: "dwf_m0.01".into(),
                params: ActionParams::Dwf {
                    ls: 12,
                    mass: 0.01,
                    m5: 1.8,
                },
            }]),
            sources: Some(vec![
                Source {
                    name: "wall_t0".into(),
                    params: SourceParams::Wall {
                        timeslice: 0,
                        momentum: None,
                    },
                    observables: vec!["pion_a".into()],
                },
                Source {
                    name: "pt_0".into(),
                    params: SourceParams::Point {
                        location: [0, 0, 0, 0],
                    },
                    observables: vec!["vector_a".into()],
                },
            ]),
            solvers: Some(vec![Solver {
                name: "cg_m0.01".into(),
                params: SolverParams::RbPrecCg {
                    residual: 1e-8,
                    max_iteration: 10_000,
                },
                action: "dwf_m0.01".into(),
            }]),
            propagators: Some(vec![
                Propagator {
                    name: "prop_wall".into(),
                    source: "wall_t0".into(),
                    solver: "cg_m0.01".into(),
                    user_info: String::new(),
                },
                Propagator {
                    name: "prop_pt".into(),
                    source: "pt_0".into(),
                    solver: "cg_m0.01".into(),
                    user_info: String::new(),
                },
            ]),
            contractions: Some(vec![
                Contraction {
                    name: "pion_a".into(),
                    kind: ObservableKind::Pion2pt,
                    propagators: ["prop_wall".into(), "prop_wall".into()],
                },
                Contraction {
                    name: "vector_a".into(),
                    kind: ObservableKind::Vector2pt,
                    propagators: ["prop_wall".into(), "prop_pt".into()],
                },
            ]),
            gauge: Some(GaugeField::Load {
                stub: "/data/ckpoint_lat".into(),
                start: 1500,
                step: 20,
                end: 1520,
            }),
        }
    }

    #[test]
    fn rendering_is_idempotent() {
        let state = complete_state();
        let first = render_document(&state, "pion_run").unwrap();
        let second = render_document(&state, "pion_run").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn incomplete_state_is_refused() {
        let mut state = complete_state();
        state.gauge = None;
        let err = render_document(&state, "run").unwrap_err();
        assert!(matches!(err, RenderError::Incomplete(_)));
        assert!(err.to_string().contains("gauge field"));
    }

    #[test]
    fn trajectory_counter_comes_from_the_gauge_entity() {
        let document = render_document(&complete_state(), "run").unwrap();
        assert!(document.contains("<start>1500</start>"));
        assert!(document.contains("<end>1520</end>"));
        assert!(document.contains("<step>20</step>"));
    }

    #[test]
    fn one_module_per_entity_plus_gauge_and_sink() {
        let document = render_document(&complete_state(), "run").unwrap();
        // 1 action + 2 sources + 1 solver + 2 propagators + 2 contractions
        // + gauge + sink = 9 modules.
        assert_eq!(document.matches("<module>").count(), 9);
        assert!(document.contains("<type>MIO::LoadNersc</type>"));
        assert!(document.contains("<type>MSink::Point</type>"));
    }

    #[test]
    fn sink_module_is_terminal_and_zero_momentum() {
        let document = render_document(&complete_state(), "run").unwrap();
        let sink_at = document.find("<name>sink</name>").unwrap();
        let last_module_at = document.rfind("<module>").unwrap();
        assert!(sink_at > last_module_at);
        assert!(document.contains("<mom>0 0 0</mom>"));
    }

    #[test]
    fn cross_references_are_emitted_by_name() {
        let document = render_document(&complete_state(), "run").unwrap();
        assert!(document.contains("<source>wall_t0</source>"));
        assert!(document.contains("<solver>cg_m0.01</solver>"));
        assert!(document.contains("<q1>prop_wall</q1>"));
        assert!(document.contains("<q2>prop_pt</q2>"));
        assert!(document.contains("<action>dwf_m0.01</action>"));
    }

    #[test]
    fn meson_gammas_follow_the_observable_kind() {
        let document = render_document(&complete_state(), "run").unwrap();
        assert!(document.contains("<gammas>(Gamma5 Gamma5)</gammas>"));
        assert!(document
            .contains("<gammas>(GammaX GammaX)(GammaY GammaY)(GammaZ GammaZ)</gammas>"));
    }

    #[test]
    fn unit_gauge_renders_one_pseudo_trajectory() {
        let mut state = complete_state();
        state.gauge = Some(GaugeField::Unit);
        let document = render_document(&state, "run").unwrap();
        assert!(document.contains("<start>0</start>"));
        assert!(document.contains("<end>1</end>"));
        assert!(document.contains("<type>MGauge::Unit</type>"));
    }

    #[test]
    fn written_file_round_trips_the_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hadrons.xml");
        let state = complete_state();

        write_document(&state, "pion_run", &path).unwrap();
        let on_disk = fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, render_document(&state, "pion_run").unwrap());
        assert!(on_disk.starts_with("<?xml version='1.0' encoding='utf-8'?>"));
    }
}
