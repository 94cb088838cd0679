// Condition code model and predicate translation. The M68k conditional
// instructions test flag patterns in the CCR, so every abstract comparison
// predicate must be translated into one member of the closed CondCode
// enumeration. Integer translation is a total one-to-one map with three
// cheaper-encoding rewrites applied first (X > -1, X < 0, X < 1). Floating
// predicates the hardware cannot test directly are handled by swapping both
// operands and the predicate together: OLT/OGT, OLE/OGE, UGT/ULT and UGE/ULE
// form the documented swap pairs, and the translation is self-consistent
// under that pairing. OEQ and UNE have no single-flag encoding and translate
// to Invalid; the invariant downstream is that Invalid never survives to code
// emission.

//! Condition codes and predicate translation.

use crate::lower::node::Value;

/// M68k condition codes, as tested by Bcc/Scc/DBcc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CondCode {
    /// Always true.
    T,
    /// Always false.
    F,
    /// Unsigned higher.
    Hi,
    /// Unsigned lower or same.
    Ls,
    /// Carry clear (unsigned >=).
    Cc,
    /// Carry set (unsigned <).
    Cs,
    Ne,
    Eq,
    /// Overflow clear.
    Vc,
    /// Overflow set.
    Vs,
    /// Plus (sign clear).
    Pl,
    /// Minus (sign set).
    Mi,
    Ge,
    Lt,
    Gt,
    Le,
    /// Produced for float predicates with no single-flag encoding.
    /// Must never reach code emission.
    Invalid,
}

impl CondCode {
    /// The logically opposite branch condition.
    ///
    /// Panics on `Invalid`; an invalid code on a path that needs its
    /// opposite is an upstream legalization bug.
    pub fn opposite(self) -> CondCode {
        use CondCode::*;
        match self {
            T => F,
            F => T,
            Hi => Ls,
            Ls => Hi,
            Cc => Cs,
            Cs => Cc,
            Ne => Eq,
            Eq => Ne,
            Vc => Vs,
            Vs => Vc,
            Pl => Mi,
            Mi => Pl,
            Ge => Lt,
            Lt => Ge,
            Gt => Le,
            Le => Gt,
            Invalid => panic!("opposite of an invalid condition code"),
        }
    }

    pub fn is_valid(self) -> bool {
        self != CondCode::Invalid
    }
}

/// Abstract integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

/// Abstract floating comparison predicates (ordered/unordered forms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    Int(IntPredicate),
    Float(FloatPredicate),
}

/// Total one-to-one translation of an integer predicate.
pub fn translate_integer_cc(pred: IntPredicate) -> CondCode {
    match pred {
        IntPredicate::Eq => CondCode::Eq,
        IntPredicate::Ne => CondCode::Ne,
        IntPredicate::Gt => CondCode::Gt,
        IntPredicate::Ge => CondCode::Ge,
        IntPredicate::Lt => CondCode::Lt,
        IntPredicate::Le => CondCode::Le,
        IntPredicate::Ult => CondCode::Cs,
        IntPredicate::Uge => CondCode::Cc,
        IntPredicate::Ugt => CondCode::Hi,
        IntPredicate::Ule => CondCode::Ls,
    }
}

/// Translate an abstract predicate to a condition code, rewriting the
/// comparison operands where a cheaper encoding exists.
///
/// Integer rewrites: `X > -1` becomes a compare against zero testing the
/// sign flag clear, `X < 0` tests the sign flag directly, `X < 1` becomes
/// `X <= 0`. Float predicates the target cannot test directly swap both
/// operands and the predicate simultaneously.
pub fn translate_cond_code(pred: Predicate, lhs: &mut Value, rhs: &mut Value) -> CondCode {
    match pred {
        Predicate::Int(p) => {
            if let Value::Imm(c) = *rhs {
                if p == IntPredicate::Gt && c == -1 {
                    // X > -1   -> X == 0, test !sign.
                    *rhs = Value::Imm(0);
                    return CondCode::Pl;
                }
                if p == IntPredicate::Lt && c == 0 {
                    // X < 0   -> test sign.
                    return CondCode::Mi;
                }
                if p == IntPredicate::Lt && c == 1 {
                    // X < 1   -> X <= 0
                    *rhs = Value::Imm(0);
                    return CondCode::Le;
                }
            }
            translate_integer_cc(p)
        }
        Predicate::Float(p) => {
            // Flip the comparisons the hardware cannot test directly.
            // Swapping operands and predicate together keeps the meaning.
            let flipped = matches!(
                p,
                FloatPredicate::Olt | FloatPredicate::Ole | FloatPredicate::Ugt | FloatPredicate::Uge
            );
            if flipped {
                std::mem::swap(lhs, rhs);
            }
            match p {
                FloatPredicate::Ueq => CondCode::Eq,
                // Olt flipped to Ogt.
                FloatPredicate::Olt | FloatPredicate::Ogt => CondCode::Hi,
                // Ole flipped to Oge.
                FloatPredicate::Ole | FloatPredicate::Oge => CondCode::Cc,
                // Ugt flipped to Ult.
                FloatPredicate::Ugt | FloatPredicate::Ult => CondCode::Cs,
                // Uge flipped to Ule.
                FloatPredicate::Uge | FloatPredicate::Ule => CondCode::Ls,
                FloatPredicate::One => CondCode::Ne,
                // Equality needs two flag tests at once.
                FloatPredicate::Oeq | FloatPredicate::Une => CondCode::Invalid,
                // Pure (un)ordered tests need the FPU parity-style flag.
                FloatPredicate::Ord | FloatPredicate::Uno => CondCode::Invalid,
            }
        }
    }
}
