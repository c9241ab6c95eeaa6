use spotred_core::{
    correlation_from_covariance, covariance_from_correlation, ModelKind, NamedMatrix,
    ParametersModel, ValueModel,
};
use proptest::prelude::*;

fn relative_close(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(f64::MIN_POSITIVE);
    (a - b).abs() / scale <= 1e-9
}

proptest! {
    #[test]
    fn covariance_survives_round_trip(
        sigmas in prop::collection::vec(1e-6f64..1e3, 2..6),
        rho_seed in prop::collection::vec(-0.95f64..0.95, 15),
    ) {
        let names: Vec<String> = (0..sigmas.len()).map(|idx| format!("v{idx}")).collect();
        let mut correlation = NamedMatrix::zeros(names.clone());
        let mut k = 0;
        for row in 0..names.len() {
            correlation.set(row, row, 1.0);
            for col in (row + 1)..names.len() {
                correlation.set_symmetric(row, col, rho_seed[k % rho_seed.len()]);
                k += 1;
            }
        }
        let covariance = covariance_from_correlation(&names, &sigmas, &correlation);
        let back = correlation_from_covariance(&names, &sigmas, &covariance);
        let again = covariance_from_correlation(&names, &sigmas, &back);
        for row in 0..names.len() {
            for col in 0..names.len() {
                prop_assert!(relative_close(covariance.at(row, col), again.at(row, col)));
                prop_assert!(relative_close(correlation.at(row, col), back.at(row, col)));
            }
        }
    }
}

#[test]
fn model_round_trip_preserves_covariance() {
    let mut model = ParametersModel::new("Decay constants", ModelKind::PhysicalConstants)
        .with_value(ValueModel::abs("lambda238", 1.55125e-10, 8.3e-14))
        .with_value(ValueModel::abs("lambda235", 9.8485e-10, 6.7e-13))
        .with_value(ValueModel::abs("lambda232", 4.9475e-11, 0.0))
        .with_rho("lambda238", "lambda235", 0.2);
    model.initialize_correlations().unwrap();
    model.generate_covariances_from_correlations().unwrap();
    let original = model.covariance().clone();

    model.generate_correlations_from_covariances().unwrap();
    model.generate_covariances_from_correlations().unwrap();

    assert_eq!(original.names(), model.covariance().names());
    for row in 0..original.dim() {
        for col in 0..original.dim() {
            assert!(relative_close(original.at(row, col), model.covariance().at(row, col)));
        }
    }
}
