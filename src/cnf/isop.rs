//! Irredundant sum-of-products of functions of up to six variables (Minato-Morreale).

use crate::cnf::cut::{ELEMENTARY, MAX_TRUTH_LEAVES};

/// A product term, two bits per variable: `01` when the variable appears negative
/// (the cube requires it to be 0), `10` when it appears positive, `00` when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cube(pub u32);

/// Polarity of a variable within a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeLit {
    Negative,
    Positive,
}

impl Cube {
    pub fn lit(self, var: usize) -> Option<CubeLit> {
        match (self.0 >> (2 * var)) & 3 {
            1 => Some(CubeLit::Negative),
            2 => Some(CubeLit::Positive),
            _ => None,
        }
    }

    fn with(self, var: usize, lit: CubeLit) -> Self {
        let code = match lit {
            CubeLit::Negative => 1u32,
            CubeLit::Positive => 2,
        };
        Cube(self.0 | code << (2 * var))
    }

    /// Truth table of the cube.
    pub fn truth(self, n_vars: usize) -> u64 {
        (0..n_vars).fold(!0, |acc, v| match self.lit(v) {
            Some(CubeLit::Positive) => acc & ELEMENTARY[v],
            Some(CubeLit::Negative) => acc & !ELEMENTARY[v],
            None => acc,
        })
    }

    /// Number of literals.
    pub fn size(self) -> u32 {
        (0..16u32).filter(|&v| (self.0 >> (2 * v)) & 3 != 0).count() as u32
    }
}

fn cofactor0(t: u64, var: usize) -> u64 {
    let shift = 1 << var;
    let low = t & !ELEMENTARY[var];
    low | (low << shift)
}

fn cofactor1(t: u64, var: usize) -> u64 {
    let shift = 1 << var;
    let high = t & ELEMENTARY[var];
    high | (high >> shift)
}

fn depends_on(t: u64, var: usize) -> bool {
    cofactor0(t, var) != cofactor1(t, var)
}

/// Computes an irredundant cover `c` with `on <= c <= ondc`, returns the truth table of the cover.
fn isop_rec(on: u64, ondc: u64, n_vars: usize, cubes: &mut Vec<Cube>) -> u64 {
    debug_assert_eq!(on & !ondc, 0);
    if on == 0 {
        return 0;
    }
    if ondc == !0 {
        cubes.push(Cube::default());
        return !0;
    }
    let Some(var) = (0..n_vars)
        .rev()
        .find(|&v| depends_on(on, v) || depends_on(ondc, v))
    else {
        unreachable!("non constant interval without support");
    };

    let (on0, on1) = (cofactor0(on, var), cofactor1(on, var));
    let (ondc0, ondc1) = (cofactor0(ondc, var), cofactor1(ondc, var));

    let start0 = cubes.len();
    let r0 = isop_rec(on0 & !ondc1, ondc0, var, cubes);
    let start1 = cubes.len();
    let r1 = isop_rec(on1 & !ondc0, ondc1, var, cubes);
    let start2 = cubes.len();
    let r2 = isop_rec((on0 & !r0) | (on1 & !r1), ondc0 & ondc1, var, cubes);

    for cube in &mut cubes[start0..start1] {
        *cube = cube.with(var, CubeLit::Negative);
    }
    for cube in &mut cubes[start1..start2] {
        *cube = cube.with(var, CubeLit::Positive);
    }
    (r0 & !ELEMENTARY[var]) | (r1 & ELEMENTARY[var]) | r2
}

/// Irredundant sum-of-products of the function `truth` of `n_vars` variables.
///
/// `truth` must not depend on variables `n_vars..6`.
pub fn isop(truth: u64, n_vars: usize) -> Vec<Cube> {
    assert!(n_vars <= MAX_TRUTH_LEAVES);
    let mut cubes = Vec::new();
    let cover = isop_rec(truth, truth, n_vars, &mut cubes);
    debug_assert_eq!(cover, truth);
    cubes
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn cover(cubes: &[Cube], n_vars: usize) -> u64 {
        cubes.iter().fold(0, |acc, c| acc | c.truth(n_vars))
    }

    #[test]
    fn constants_test() {
        assert!(isop(0, 3).is_empty());
        assert_eq!(isop(!0, 3), vec![Cube(0)]);
    }

    #[test]
    fn and_or_test() {
        let and = ELEMENTARY[0] & ELEMENTARY[1];
        let cubes = isop(and, 2);
        assert_eq!(cubes, vec![Cube(0b1010)]);
        assert_eq!(cubes[0].lit(0), Some(CubeLit::Positive));
        assert_eq!(cubes[0].size(), 2);

        let nand = !and;
        let cubes = isop(nand, 2);
        assert_eq!(cubes.len(), 2);
        assert_eq!(cover(&cubes, 2), nand);
        assert!(cubes.iter().all(|c| c.size() == 1));
    }

    #[test]
    fn xor_test() {
        let xor = ELEMENTARY[0] ^ ELEMENTARY[1] ^ ELEMENTARY[2];
        let cubes = isop(xor, 3);
        assert_eq!(cubes.len(), 4);
        assert_eq!(cover(&cubes, 3), xor);
    }

    #[test]
    fn mux_test() {
        // c ? a : b with a = x0, b = x1, c = x2
        let mux = (ELEMENTARY[2] & ELEMENTARY[0]) | (!ELEMENTARY[2] & ELEMENTARY[1]);
        let cubes = isop(mux, 3);
        assert_eq!(cover(&cubes, 3), mux);
        assert!(cubes.len() <= 3);
        let cubes = isop(!mux, 3);
        assert_eq!(cover(&cubes, 3), !mux);
    }

    #[test]
    fn pseudo_random_covers_test() {
        // Cheap xorshift generator to sweep many six-input functions
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        for _ in 0..200 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let cubes = isop(state, 6);
            assert_eq!(cover(&cubes, 6), state);
            // Irredundant: dropping any cube loses minterms
            for k in 0..cubes.len() {
                let mut rest = cubes.clone();
                rest.remove(k);
                assert_ne!(cover(&rest, 6), state);
            }
        }
    }
}
