use itertools::Itertools;

use super::convergence::midpoint;
use crate::config::{Centering, DviConfig, ReferenceSelection};

/// Outcome of centering one sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centered {
    /// Amount subtracted from every entry.
    pub offset: f64,
    /// Uniform drift of the sweep read off the residual vector; the gain
    /// estimate is built from it.
    pub shift: f64,
    /// Reference state used this sweep, if any.
    pub reference: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenteringPolicy {
    scheme: Centering,
    reference_state: usize,
    selection: ReferenceSelection,
}

impl CenteringPolicy {
    pub fn new(scheme: Centering, reference_state: usize, selection: ReferenceSelection) -> Self {
        Self {
            scheme,
            reference_state,
            selection,
        }
    }

    pub fn from_config(config: &DviConfig) -> Self {
        Self::new(config.centering, config.reference_state, config.reference_selection)
    }

    pub fn is_enabled(&self) -> bool {
        self.scheme != Centering::Disabled
    }

    fn reference(&self, residual: &[f64]) -> usize {
        // Lowest index wins ties in both directions.
        let pick = match self.selection {
            ReferenceSelection::Fixed => None,
            ReferenceSelection::MaxResidual => residual.iter().position_min_by(|a, b| b.total_cmp(a)),
            ReferenceSelection::MinResidual => residual.iter().position_min_by(|a, b| a.total_cmp(b)),
        };
        pick.unwrap_or(self.reference_state)
    }

    /// Subtracts the scheme's reference quantity from every entry of `v`.
    /// `residual` is this sweep's `v_new - v_old` before centering.
    pub fn center(&self, v: &mut [f64], residual: &[f64]) -> Centered {
        let (offset, shift, reference) = match self.scheme {
            Centering::ReferenceState => {
                let r = self.reference(residual);
                (v[r], residual[r], Some(r))
            }
            Centering::SpanMidpoint => (midpoint(v), midpoint(residual), None),
            Centering::Disabled => (0., midpoint(residual), None),
        };

        if offset != 0. {
            v.iter_mut().for_each(|x| *x -= offset);
        }

        Centered {
            offset,
            shift,
            reference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::*;
    use rstest::rstest;

    #[test]
    fn reference_state_ends_at_zero() {
        let c = CenteringPolicy::new(Centering::ReferenceState, 1, ReferenceSelection::Fixed);
        let v = &mut vec![3.5, 1.25, -0.75];

        let out = c.center(v, &[0.5, 0.25, 0.]);

        assert_eq!(v[1], 0.);
        assert_eq!(out.offset, 1.25);
        assert_eq!(out.shift, 0.25);
        assert_eq!(out.reference, Some(1));
        assert_float_eq!(*v, vec![2.25, 0., -2.], abs_all <= 1e-12);
    }

    #[test]
    fn span_midpoint_ends_symmetric() {
        let c = CenteringPolicy::new(Centering::SpanMidpoint, 0, ReferenceSelection::Fixed);
        let v = &mut vec![10., 4., 2.];

        let out = c.center(v, &[1., 1., 1.]);

        assert_eq!(out.offset, 6.);
        assert_eq!(out.shift, 1.);
        assert_eq!(midpoint(v), 0.);
    }

    #[test]
    fn disabled_leaves_values_alone() {
        let c = CenteringPolicy::new(Centering::Disabled, 0, ReferenceSelection::Fixed);
        let v = &mut vec![10., 4.];

        let out = c.center(v, &[3., 1.]);

        assert_eq!(*v, vec![10., 4.]);
        assert_eq!(out.offset, 0.);
        assert_eq!(out.shift, 2.);
        assert!(!c.is_enabled());
    }

    #[rstest]
    #[case(ReferenceSelection::Fixed, 2)]
    #[case(ReferenceSelection::MaxResidual, 1)]
    #[case(ReferenceSelection::MinResidual, 0)]
    fn reference_selection(#[case] selection: ReferenceSelection, #[case] expected: usize) {
        let c = CenteringPolicy::new(Centering::ReferenceState, 2, selection);
        let v = &mut vec![1., 2., 3., 4.];

        let out = c.center(v, &[-1., 5., 0., 5.]);

        assert_eq!(out.reference, Some(expected));
        assert_eq!(v[expected], 0.);
    }

    #[test]
    fn pairwise_differences_survive() {
        for scheme in [Centering::ReferenceState, Centering::SpanMidpoint] {
            let c = CenteringPolicy::new(scheme, 0, ReferenceSelection::Fixed);
            let v = &mut vec![0.3, -7.1, 2.9];
            c.center(v, &[0., 0., 0.]);

            assert_float_eq!(v[0] - v[1], 7.4, abs <= 1e-12);
            assert_float_eq!(v[2] - v[1], 10., abs <= 1e-12);
        }
    }
}
