mod common;

use proptest::prelude::*;
use spotred_core::{ModelKind, ParametersModel, SpotId, SpotKind, ValueModel};
use spotred_expr::{Expression, Function, Node, Operation, ERROR_VALUE};
use spotred_stats::{wtdav, CoherenceOutcome};
use spotred_task::{OvercountMode, Progress, ReductionHandle, Task, TaskConfig, OVERCOUNT_207};

#[test]
fn standard_weighted_mean_rejects_the_outlier() {
    let mut task = common::task(TaskConfig::default());
    task.evaluate_all(&Progress::new()).unwrap();

    let entry = task.summary("WtdAge", SpotKind::ReferenceMaterial).unwrap();
    assert_eq!(entry.outcome, CoherenceOutcome::Coherent);
    assert_eq!(entry.details.selection.rejected_ids(), vec![SpotId::from("TEM-4")]);
    let record = entry.details.record().unwrap();
    assert_eq!(record.n_included, 4);
    assert_eq!(record.n_total, 5);
    assert!(record.probability >= 0.05);
    assert!(task.summary("WtdAge", SpotKind::Unknown).is_none());

    let ratio = task
        .results()
        .per_spot_results()["AgeRatio"][&SpotId::from("UNK-1")][0];
    assert!((ratio - 420.0 / record.mean).abs() < 1e-12);
}

#[test]
fn correction_207_then_none_is_neutral() {
    let mut task = common::task(TaskConfig::default());
    task.evaluate_all(&Progress::new()).unwrap();
    let before = task.results().clone();
    let raw: Vec<_> = task
        .spots_of(SpotKind::Unknown)
        .iter()
        .map(|spot| spot.ratio("204/206").unwrap())
        .collect();

    task.apply_correction_207().unwrap();
    assert_eq!(task.overcount_mode(), OvercountMode::Fr207);
    assert!(task.is_changed());
    let first = task.spot(&SpotId::from("UNK-1")).unwrap().ratio("204/206").unwrap();
    let expected = (0.0600 - 0.0550) / (15.6 - 0.0550 * 18.7);
    assert!((first.value - expected).abs() < 1e-15);
    assert!((first.one_sigma_abs - 0.0006 / (15.6 - 0.0550 * 18.7)).abs() < 1e-15);
    let corrected = task.results().per_spot_results()["Pb204_206"][&SpotId::from("UNK-1")][0];
    assert!((corrected - expected).abs() < 1e-15);
    let standard = task.spot(&SpotId::from("TEM-1")).unwrap().ratio("204/206").unwrap();
    assert_eq!(standard.value, 0.0001);

    task.apply_no_correction().unwrap();
    assert_eq!(task.overcount_mode(), OvercountMode::None);
    let after: Vec<_> = task
        .spots_of(SpotKind::Unknown)
        .iter()
        .map(|spot| spot.ratio("204/206").unwrap())
        .collect();
    assert_eq!(raw, after);
    assert_eq!(&before, task.results());
}

#[test]
fn correction_208_uses_thorogenic_ratios() {
    let mut task = common::task(TaskConfig::default());
    task.apply_correction_208().unwrap();
    let ratio = task.spot(&SpotId::from("UNK-1")).unwrap().ratio("204/206").unwrap();
    let expected = (0.0340 - 0.0300) / (38.6 - 0.0300 * 18.7);
    assert!((ratio.value - expected).abs() < 1e-15);
    assert!(task.results().per_spot_results().contains_key(OVERCOUNT_207));
}

#[test]
fn configured_mode_is_installed_at_construction() {
    let config = TaskConfig {
        overcount_mode: OvercountMode::Fr207,
        ..TaskConfig::default()
    };
    let task = common::task(config);
    assert_eq!(task.overcount_mode(), OvercountMode::Fr207);
    assert!(!task.is_changed());
    let spot = task.spot(&SpotId::from("UNK-2")).unwrap();
    assert_ne!(spot.ratio("204/206"), spot.raw_ratio("204/206"));
}

#[test]
fn parallel_pass_matches_sequential_pass() {
    let mut sequential = common::task(TaskConfig::default());
    sequential.evaluate_all(&Progress::new()).unwrap();
    let mut parallel = common::task(TaskConfig {
        parallel: true,
        threads: 3,
        ..TaskConfig::default()
    });
    parallel.evaluate_all(&Progress::new()).unwrap();
    assert_eq!(sequential.results(), parallel.results());
    assert_eq!(sequential.summaries(), parallel.summaries());
}

#[test]
fn worker_reports_monotone_progress_to_completion() {
    let handle = ReductionHandle::spawn(common::task(TaskConfig::default()));
    let progress = handle.progress().clone();
    let mut last = 0;
    while !handle.is_finished() {
        let now = progress.completed();
        assert!(now >= last);
        last = now;
        std::thread::yield_now();
    }
    let task = handle.join().unwrap();
    assert!(progress.is_finished());
    assert_eq!(progress.completed(), progress.total());
    assert!(task.summary("WtdAge", SpotKind::ReferenceMaterial).is_some());
}

#[test]
fn parameter_edits_are_validated_then_invalidate_results() {
    let mut task = common::task(TaskConfig::default());
    task.evaluate_all(&Progress::new()).unwrap();
    let parameters = task.parameters().clone();

    let err = task
        .update_parameter(ModelKind::CommonPb, ValueModel::abs("r209_204", 1.0, 0.1))
        .unwrap_err();
    assert_eq!(err.info().code, "unknown-value");
    assert_eq!(task.parameters(), &parameters);
    assert!(!task.results().is_empty());
    assert!(!task.is_changed());

    task.update_parameter(ModelKind::CommonPb, ValueModel::abs("r206_204", 18.9, 0.3))
        .unwrap();
    assert!(task.is_changed());
    assert!(task.results().is_empty());
    let covariance = task.parameters().model(ModelKind::CommonPb).unwrap().covariance();
    assert!((covariance.get("r206_204", "r206_204").unwrap() - 0.09).abs() < 1e-12);
}

#[test]
fn structural_edits_leave_the_registry_untouched() {
    let mut task = common::task(TaskConfig::default());
    let order = task.order().clone();
    let cyclic = Expression::per_spot(
        "Loop",
        Node::op(Operation::Add, vec![Node::reference("Loop"), Node::number(1.0)]),
    );
    let err = task.add_expression(cyclic).unwrap_err();
    assert!(err.is_fatal());
    assert!(task.registry().get("Loop").is_none());
    assert_eq!(task.order(), &order);

    assert!(task.remove_expression("Age").is_err());
    assert!(task.registry().get("Age").is_some());
}

#[test]
fn cyclic_registry_aborts_construction() {
    let mut expressions = common::expressions();
    expressions.push(Expression::per_spot("A", Node::reference("B")));
    expressions.push(Expression::per_spot("B", Node::reference("A")));
    let err = Task::new(
        TaskConfig::default(),
        common::parameters(),
        expressions,
        common::spots(),
    )
    .unwrap_err();
    assert_eq!(err.info().code, "expression-cycle");
}

#[test]
fn evaluation_failures_are_absorbed_as_sentinels() {
    let mut expressions = common::expressions();
    expressions.push(
        Expression::summary(
            "UnknownMean",
            Node::func(spotred_expr::Function::WeightedMean, vec![Node::reference("Age")]),
        )
        .unknown_only(),
    );
    expressions.push(
        Expression::per_spot("NeedsUnknownMean", Node::reference("UnknownMean"))
            .reference_material_only(),
    );
    let mut task = Task::new(
        TaskConfig::default(),
        common::parameters(),
        expressions,
        common::spots(),
    )
    .unwrap();
    task.evaluate_all(&Progress::new()).unwrap();
    let rows = &task.results().per_spot_results()["NeedsUnknownMean"];
    assert_eq!(rows.len(), 5);
    assert!(rows.values().all(|row| row == &vec![ERROR_VALUE]));
}

#[test]
fn manual_rejection_recomputes_the_summary() {
    let config = TaskConfig {
        auto_reject: false,
        ..TaskConfig::default()
    };
    let mut task = common::task(config);
    task.evaluate_all(&Progress::new()).unwrap();
    let entry = task.summary("WtdAge", SpotKind::ReferenceMaterial).unwrap();
    assert_eq!(entry.outcome, CoherenceOutcome::Exhausted);

    let entry = task
        .set_rejected("WtdAge", SpotKind::ReferenceMaterial, &SpotId::from("TEM-4"), true)
        .unwrap();
    assert_eq!(entry.outcome, CoherenceOutcome::Coherent);
    assert_eq!(entry.details.record().unwrap().n_included, 4);
    assert!(task
        .set_rejected("WtdAge", SpotKind::ReferenceMaterial, &SpotId::from("UNK-1"), true)
        .is_err());
}

#[test]
fn ratio_leaf_weighted_mean_covers_every_included_spot() {
    let mut expressions = common::expressions();
    expressions.push(
        Expression::summary(
            "LeafWtdAge",
            Node::func(Function::WeightedMean, vec![Node::ratio("age_ma")]),
        )
        .reference_material_only(),
    );
    let mut task = Task::new(
        TaskConfig::default(),
        common::parameters(),
        expressions,
        common::spots(),
    )
    .unwrap();
    task.evaluate_all(&Progress::new()).unwrap();

    let leaf = task.summary("LeafWtdAge", SpotKind::ReferenceMaterial).unwrap();
    let reference = task.summary("WtdAge", SpotKind::ReferenceMaterial).unwrap();
    assert_eq!(leaf.outcome, CoherenceOutcome::Coherent);
    assert_eq!(leaf.details.selection.rejected_ids(), vec![SpotId::from("TEM-4")]);

    let record = leaf.details.record().unwrap();
    let row = leaf.details.values.as_ref().unwrap();
    assert_eq!(record.n_included, 4);
    assert_eq!(row.get(0, wtdav::COUNT), Some(4.0));
    assert_eq!(record, reference.details.record().unwrap());
}

#[test]
fn parameter_edit_restores_correlation_of_newly_uncertain_value() {
    let mut parameters = common::parameters();
    parameters.insert(
        ParametersModel::new("Stacey-Kramers 0 Ma", ModelKind::CommonPb)
            .with_value(ValueModel::abs("r206_204", 18.7, 0.1))
            .with_value(ValueModel::abs("r207_204", 15.6, 0.0))
            .with_value(ValueModel::abs("r208_204", 38.6, 0.2))
            .with_rho("r206_204", "r207_204", 0.5),
    );
    let mut task = Task::new(
        TaskConfig::default(),
        parameters,
        common::expressions(),
        common::spots(),
    )
    .unwrap();
    let model = task.parameters().model(ModelKind::CommonPb).unwrap();
    assert!(model.covariance().index_of("r207_204").is_none());

    task.update_parameter(ModelKind::CommonPb, ValueModel::abs("r207_204", 15.6, 0.2))
        .unwrap();
    let model = task.parameters().model(ModelKind::CommonPb).unwrap();
    assert_eq!(model.correlation().dim(), 3);
    let covariance = model.covariance().get("r206_204", "r207_204").unwrap();
    assert!((covariance - 0.01).abs() < 1e-15);
    assert_eq!(model.covariance().get("r207_204", "r208_204"), Some(0.0));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn parallel_pass_matches_sequential_for_generated_standards(
        ages in prop::collection::vec(50.0f64..500.0, 1..9),
        threads in 1usize..4,
    ) {
        let build = |config: TaskConfig| {
            Task::new(
                config,
                common::parameters(),
                common::expressions(),
                common::spots_with_standard_ages(&ages),
            )
            .unwrap()
        };
        let mut sequential = build(TaskConfig::default());
        sequential.evaluate_all(&Progress::new()).unwrap();
        let mut parallel = build(TaskConfig {
            parallel: true,
            threads,
            ..TaskConfig::default()
        });
        parallel.evaluate_all(&Progress::new()).unwrap();

        prop_assert_eq!(sequential.results(), parallel.results());
        prop_assert_eq!(sequential.summaries(), parallel.summaries());
        if let Some(record) = sequential
            .summary("WtdAge", SpotKind::ReferenceMaterial)
            .and_then(|entry| entry.details.record())
        {
            prop_assert!(record.n_included >= 3);
            prop_assert!(record.n_included <= ages.len());
        }
    }
}
