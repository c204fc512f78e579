use std::{fmt, ops::Not};

/// A SAT variable. Variable 0 is never used in clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(pub u32);

impl Var {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn lit(self, negated: bool) -> Lit {
        Lit::new(self, negated)
    }

    pub fn pos(self) -> Lit {
        Lit::new(self, false)
    }

    pub fn neg(self) -> Lit {
        Lit::new(self, true)
    }
}

/// A SAT literal, packed as `2 * var + negated` like in MiniSat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit(u32);

impl Lit {
    pub fn new(var: Var, negated: bool) -> Self {
        Lit(var.0 << 1 | negated as u32)
    }

    pub fn from_code(code: u32) -> Self {
        Lit(code)
    }

    pub fn code(self) -> u32 {
        self.0
    }

    pub fn var(self) -> Var {
        Var(self.0 >> 1)
    }

    pub fn is_negated(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn not_if(self, c: bool) -> Self {
        Lit(self.0 ^ c as u32)
    }

    /// Signed DIMACS form: the variable index, negative if the literal is negated.
    pub fn to_dimacs(self) -> i64 {
        let v = self.var().0 as i64;
        if self.is_negated() { -v } else { v }
    }
}

impl Not for Lit {
    type Output = Self;

    fn not(self) -> Self::Output {
        Lit(self.0 ^ 1)
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}
