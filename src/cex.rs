//! Counter-examples of safety properties, their replay and their justification.

use log::debug;

use crate::Aig;

/// A trace making primary output `po` true at frame `frame`.
///
/// `regs` are the latch values at frame 0, `inputs[k]` the primary input values at frame `k`,
/// for every frame `0..=frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cex {
    pub po: usize,
    pub frame: usize,
    pub regs: Vec<bool>,
    pub inputs: Vec<Vec<bool>>,
}

impl Cex {
    pub fn n_frames(&self) -> usize {
        self.frame + 1
    }

    fn is_well_formed(&self, aig: &Aig) -> bool {
        self.po < aig.n_outputs()
            && self.regs.len() == aig.n_latches()
            && self.inputs.len() == self.n_frames()
            && self.inputs.iter().all(|i| i.len() == aig.n_inputs())
    }
}

/// Replays `cex` on `aig`: the registers must agree with the latch initial values which are not
/// free, and output `cex.po` must be true at the last frame.
pub fn verify_cex(aig: &Aig, cex: &Cex) -> bool {
    if !cex.is_well_formed(aig) {
        debug!("cex does not match the shape of the AIG");
        return false;
    }
    let resets = (0..aig.n_latches()).all(|k| {
        aig.get_latch_init(k)
            .is_none_or(|init| init == cex.regs[k])
    });
    if !resets {
        debug!("cex starts outside of the initial states");
        return false;
    }
    let frames = aig.simulate(&cex.regs, &cex.inputs);
    frames[cex.frame][aig.get_outputs()[cex.po]]
}

/// Finds the pseudo-inputs a counter-example of an abstraction actually depends on.
///
/// `abs` has `n_real_pis` real inputs followed by pseudo-inputs. Starting from every input fixed
/// to its value in `cex`, each pseudo-input in turn is made unknown at every frame; if ternary
/// simulation still sets the output at the last frame, it stays unknown. The pseudo-inputs that
/// had to keep their value are returned, as indices relative to the first pseudo-input.
///
/// An empty result means that the failure does not depend on the abstracted logic.
pub fn filter_inputs(abs: &Aig, n_real_pis: usize, cex: &Cex) -> Vec<usize> {
    assert!(n_real_pis <= abs.n_inputs());
    assert!(cex.is_well_formed(abs), "cex does not match the abstraction");
    let regs: Vec<Option<bool>> = cex.regs.iter().map(|&v| Some(v)).collect();
    let mut inputs: Vec<Vec<Option<bool>>> = cex
        .inputs
        .iter()
        .map(|frame| frame.iter().map(|&v| Some(v)).collect())
        .collect();
    let po = abs.get_outputs()[cex.po];
    let fails = |inputs: &[Vec<Option<bool>>]| {
        abs.simulate_ternary(&regs, inputs)[cex.frame][po] == Some(true)
    };
    assert!(fails(&inputs), "cex does not fail on the abstraction");

    let mut needed = Vec::new();
    for ppi in n_real_pis..abs.n_inputs() {
        let saved: Vec<Option<bool>> = inputs.iter().map(|frame| frame[ppi]).collect();
        for frame in inputs.iter_mut() {
            frame[ppi] = None;
        }
        if !fails(&inputs) {
            for (frame, v) in inputs.iter_mut().zip(saved) {
                frame[ppi] = v;
            }
            needed.push(ppi - n_real_pis);
        }
    }
    debug!(
        "filter inputs: {} out of {} pseudo-inputs needed",
        needed.len(),
        abs.n_inputs() - n_real_pis
    );
    needed
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn toggle() -> Aig {
        let mut aig = Aig::new();
        let en = aig.add_input();
        let l = aig.add_latch(Some(false));
        let n = aig.xor(l, en);
        aig.set_latch_next(0, n).unwrap();
        aig.add_output(l);
        aig
    }

    #[test]
    fn verify_cex_test() {
        let aig = toggle();
        let cex = Cex {
            po: 0,
            frame: 1,
            regs: vec![false],
            inputs: vec![vec![true], vec![false]],
        };
        assert!(verify_cex(&aig, &cex));

        let idle = Cex {
            inputs: vec![vec![false], vec![false]],
            ..cex.clone()
        };
        assert!(!verify_cex(&aig, &idle));

        // Not an initial state
        let bad_reset = Cex {
            regs: vec![true],
            frame: 0,
            inputs: vec![vec![false]],
            ..cex.clone()
        };
        assert!(!verify_cex(&aig, &bad_reset));

        let short = Cex {
            inputs: vec![vec![true]],
            ..cex
        };
        assert!(!verify_cex(&aig, &short));
    }

    #[test]
    fn verify_cex_free_init_test() {
        let mut aig = Aig::new();
        let l = aig.add_latch(None);
        aig.set_latch_next(0, l).unwrap();
        aig.add_output(l);
        let cex = Cex {
            po: 0,
            frame: 2,
            regs: vec![true],
            inputs: vec![vec![]; 3],
        };
        assert!(verify_cex(&aig, &cex));
    }

    #[test]
    fn filter_inputs_test() {
        // a & (p0 | p1) with a real, p0 and p1 pseudo-inputs
        let mut aig = Aig::new();
        let a = aig.add_input();
        let p0 = aig.add_input();
        let p1 = aig.add_input();
        let p = aig.or(p0, p1);
        let out = aig.and(a, p);
        aig.add_output(out);

        let cex = Cex {
            po: 0,
            frame: 0,
            regs: vec![],
            inputs: vec![vec![true, true, true]],
        };
        // p0 can be dropped since p1 alone justifies the output, but then p1 is needed
        assert_eq!(filter_inputs(&aig, 1, &cex), vec![1]);

        let cex = Cex {
            inputs: vec![vec![true, true, false]],
            ..cex
        };
        assert_eq!(filter_inputs(&aig, 1, &cex), vec![0]);

        // With every input considered real, nothing is left to refine
        assert!(filter_inputs(&aig, 3, &cex).is_empty());
    }

    #[test]
    fn filter_inputs_sequential_test() {
        // The pseudo-input only matters through a latch, one frame later
        let mut aig = Aig::new();
        let ppi = aig.add_input();
        let l = aig.add_latch(Some(false));
        aig.set_latch_next(0, ppi).unwrap();
        aig.add_output(l);
        let cex = Cex {
            po: 0,
            frame: 1,
            regs: vec![false],
            inputs: vec![vec![true], vec![false]],
        };
        assert!(verify_cex(&aig, &cex));
        assert_eq!(filter_inputs(&aig, 0, &cex), vec![0]);
    }
}
