use dvi::*;

#[allow(dead_code)]
pub fn config(update_rule: UpdateRule, centering: Centering) -> DviConfig {
    DviConfig {
        update_rule,
        centering,
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn assert_non_increasing(residuals: &[f64]) {
    for (k, w) in residuals.windows(2).enumerate() {
        assert!(
            w[1] <= w[0] + 1e-12,
            "residual rose at sweep {}: {} -> {}",
            k + 2,
            w[0],
            w[1]
        );
    }
}
