#![allow(dead_code)]

use spotred_core::{ModelKind, ParameterSet, ParametersModel, Spot, SpotKind, ValueModel};
use spotred_expr::{Expression, Function, Node, Operation};
use spotred_task::{Task, TaskConfig};

pub const STANDARD_AGES: [f64; 5] = [100.0, 102.0, 101.0, 250.0, 99.0];

pub fn parameters() -> ParameterSet {
    ParameterSet::new()
        .with_model(
            ParametersModel::new("Decay constants", ModelKind::PhysicalConstants)
                .with_value(ValueModel::abs("lambda238", 1.55125e-10, 0.0))
                .with_value(ValueModel::abs("lambda235", 9.8485e-10, 0.0))
                .with_value(ValueModel::abs("U238_235", 137.88, 0.0)),
        )
        .with_model(
            ParametersModel::new("TEMORA-2", ModelKind::ReferenceMaterial)
                .with_value(ValueModel::abs("r207_206r", 0.0550, 0.0002))
                .with_value(ValueModel::abs("r208_206r", 0.0300, 0.0002))
                .with_value(ValueModel::pct("r206_238r", 0.0668, 0.15))
                .with_rho("r207_206r", "r206_238r", 0.2),
        )
        .with_model(
            ParametersModel::new("Stacey-Kramers 0 Ma", ModelKind::CommonPb)
                .with_value(ValueModel::abs("r206_204", 18.7, 0.1))
                .with_value(ValueModel::abs("r207_204", 15.6, 0.1))
                .with_value(ValueModel::abs("r208_204", 38.6, 0.2)),
        )
}

pub fn spots() -> Vec<Spot> {
    spots_with_standard_ages(&STANDARD_AGES)
}

pub fn spots_with_standard_ages(ages: &[f64]) -> Vec<Spot> {
    let species = || vec!["204".to_string(), "206".to_string(), "207".to_string(), "208".to_string()];
    let mut spots: Vec<Spot> = ages
        .iter()
        .enumerate()
        .map(|(i, age)| {
            Spot::new(format!("TEM-{}", i + 1), SpotKind::ReferenceMaterial, species())
                .with_ratio("age_ma", *age, 2.0)
                .with_ratio("204/206", 0.0001, 0.00001)
                .with_ratio("207/206", 0.0551, 0.0005)
                .with_ratio("208/206", 0.0302, 0.0004)
        })
        .collect();
    for i in 0..4 {
        let offset = i as f64;
        spots.push(
            Spot::new(format!("UNK-{}", i + 1), SpotKind::Unknown, species())
                .with_ratio("age_ma", 420.0 + offset, 3.0)
                .with_ratio("204/206", 0.0004 + offset * 1e-5, 0.00002)
                .with_ratio("207/206", 0.0600 + offset * 1e-4, 0.0006)
                .with_ratio("208/206", 0.0340 + offset * 1e-4, 0.0005),
        );
    }
    spots
}

pub fn expressions() -> Vec<Expression> {
    vec![
        Expression::per_spot("Age", Node::ratio("age_ma")),
        Expression::summary(
            "WtdAge",
            Node::func(Function::WeightedMean, vec![Node::reference("Age")]),
        )
        .reference_material_only(),
        Expression::per_spot(
            "AgeRatio",
            Node::op(
                Operation::Divide,
                vec![
                    Node::func(Function::Value, vec![Node::reference("Age")]),
                    Node::func(Function::Value, vec![Node::reference("WtdAge")]),
                ],
            ),
        )
        .unknown_only(),
        Expression::per_spot(
            "Pb204_206",
            Node::func(Function::Value, vec![Node::ratio("204/206")]),
        ),
    ]
}

pub fn task(config: TaskConfig) -> Task {
    Task::new(config, parameters(), expressions(), spots()).expect("fixture task is valid")
}
